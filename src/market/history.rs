use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Url;
use serde::Deserialize;

use crate::common::{PriceBar, PriceHistory};
use crate::market::headlines::parse_base_url;

#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    /// One year of daily bars for `ticker`.
    async fn history(&self, ticker: &str) -> Result<PriceHistory>;
}

/// Yahoo Finance v8 chart endpoint.
pub struct YahooChart {
    client: reqwest::Client,
    base_url: Url,
}

impl YahooChart {
    pub fn new(client: reqwest::Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(base_url)?,
        })
    }

    pub fn chart_url(&self, ticker: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v8", "finance", "chart"])
                .push(ticker);
        }
        url.query_pairs_mut()
            .append_pair("range", "1y")
            .append_pair("interval", "1d");
        url
    }
}

#[async_trait]
impl PriceHistoryProvider for YahooChart {
    async fn history(&self, ticker: &str) -> Result<PriceHistory> {
        let response = self.client.get(self.chart_url(ticker)).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Yahoo reports unknown symbols as a 404 carrying a chart error.
            if let Ok(ChartEnvelope {
                chart: Chart {
                    error: Some(error), ..
                },
            }) = serde_json::from_str::<ChartEnvelope>(&body)
            {
                bail!("{} ({})", error.description, error.code);
            }
            bail!("chart request returned HTTP {status}");
        }
        parse_chart(ticker, &body)
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

/// Rows the provider left incomplete are skipped.
fn parse_chart(ticker: &str, body: &str) -> Result<PriceHistory> {
    let envelope: ChartEnvelope = serde_json::from_str(body)?;
    if let Some(error) = envelope.chart.error {
        bail!("{} ({})", error.description, error.code);
    }
    let result = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| anyhow!("chart response for {ticker} has no result"))?;
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let bars = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let at = |column: &Vec<Option<f64>>| column.get(i).copied().flatten();
            Some(PriceBar {
                date: DateTime::from_timestamp(ts, 0)?.date_naive(),
                open: at(&quote.open)?,
                high: at(&quote.high)?,
                low: at(&quote.low)?,
                close: at(&quote.close)?,
                volume: quote.volume.get(i).copied().flatten()?,
            })
        })
        .collect();

    Ok(PriceHistory {
        ticker: ticker.to_string(),
        bars,
    })
}
