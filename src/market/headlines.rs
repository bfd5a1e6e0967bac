use anyhow::{anyhow, bail, Result};
use reqwest::Url;
use scraper::{Html, Selector};

/// `h3` elements carrying the `Mb(5px)` utility class on Yahoo quote pages.
pub const DEFAULT_HEADLINE_SELECTOR: &str = r#"h3[class~="Mb(5px)"]"#;

/// Pulls headline strings out of a quote page.
///
/// Returns an empty `Vec` when nothing matches.
pub trait HeadlineExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Vec<String>;
}

pub struct SelectorExtractor {
    selector: Selector,
}

impl SelectorExtractor {
    pub fn new(css: &str) -> Result<Self> {
        let selector =
            Selector::parse(css).map_err(|err| anyhow!("invalid selector `{css}`: {err:?}"))?;
        Ok(Self { selector })
    }
}

impl HeadlineExtractor for SelectorExtractor {
    fn extract(&self, html: &str) -> Vec<String> {
        Html::parse_document(html)
            .select(&self.selector)
            .map(|element| element.text().collect::<String>())
            .collect()
    }
}

pub struct HeadlineSource {
    client: reqwest::Client,
    base_url: Url,
    extractor: Box<dyn HeadlineExtractor>,
}

impl HeadlineSource {
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self> {
        let extractor = SelectorExtractor::new(DEFAULT_HEADLINE_SELECTOR)?;
        Self::with_extractor(client, base_url, Box::new(extractor))
    }

    pub fn with_extractor(
        client: reqwest::Client,
        base_url: &str,
        extractor: Box<dyn HeadlineExtractor>,
    ) -> Result<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
            extractor,
        })
    }

    /// The ticker is percent-encoded both as a path segment and as the `p`
    /// query value.
    pub fn quote_url(&self, ticker: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("quote").push(ticker);
        }
        url.query_pairs_mut()
            .append_pair("p", ticker)
            .append_pair(".tsrc", "fin-srch");
        url
    }

    /// Fails on transport errors and non-2xx statuses.
    pub async fn fetch(&self, ticker: &str) -> std::result::Result<Vec<String>, reqwest::Error> {
        let html = self
            .client
            .get(self.quote_url(ticker))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(self.extractor.extract(&html))
    }
}

/// Parses a service root that path segments can be appended to.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url).map_err(|err| anyhow!("invalid base url `{base_url}`: {err}"))?;
    if url.cannot_be_a_base() {
        bail!("`{base_url}` cannot be used as a base url");
    }
    Ok(url)
}
