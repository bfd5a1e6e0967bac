use anyhow::anyhow;

use crate::common::{DeviceSelector, GenerationRequest, PriceHistory};
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::market::{HeadlineSource, PriceHistoryProvider, YahooChart};
use crate::models::{CandleEngine, InferenceEngine, ModelSpec, Task};

/// Text completion, sentiment, and stock lookups behind one handle.
///
/// The four operations share nothing but configuration. Every failure from
/// an external collaborator is logged once here and then returned with its
/// original cause attached.
pub struct Llm {
    config: ServiceConfig,
    engine: Box<dyn InferenceEngine>,
    headlines: HeadlineSource,
    history: Box<dyn PriceHistoryProvider>,
}

impl Llm {
    /// Candle models from the hub and Yahoo Finance market data.
    pub fn new(config: ServiceConfig) -> anyhow::Result<Self> {
        let engine = CandleEngine::new(config.text_model_file.clone());
        Self::with_engine(config, engine)
    }

    /// Uses `engine` for inference and Yahoo Finance for market data.
    pub fn with_engine(
        config: ServiceConfig,
        engine: impl InferenceEngine + 'static,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        let headlines = HeadlineSource::new(client.clone(), &config.quote_base_url)?;
        let history = YahooChart::new(client, &config.chart_base_url)?;
        Ok(Self::from_parts(
            config,
            Box::new(engine),
            headlines,
            Box::new(history),
        ))
    }

    pub fn from_parts(
        config: ServiceConfig,
        engine: Box<dyn InferenceEngine>,
        headlines: HeadlineSource,
        history: Box<dyn PriceHistoryProvider>,
    ) -> Self {
        Self {
            config,
            engine,
            headlines,
            history,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Continues `request.prompt` and returns the first candidate.
    ///
    /// Blocks for the whole model load and generation. The model is loaded
    /// afresh on every call.
    pub fn complete_text(&self, request: &GenerationRequest) -> Result<String> {
        request.validate()?;

        let spec = ModelSpec::new(Task::TextGeneration, request.model.as_str(), request.device)
            .with_revision(request.revision.clone());
        let mut generator = self.engine.text_generation(&spec).map_err(|source| {
            log::error!("Failed to initialize the text generator {}: {source:#}", spec.model_id);
            Error::ModelLoad {
                model: spec.model_id.clone(),
                source,
            }
        })?;

        let seed = request
            .seed
            .unwrap_or_else(|| self.config.seed_policy.resolve());
        log::info!("Generating with {} (seed {seed})", spec.model_id);

        let candidates = generator
            .generate(&request.prompt, &request.sampling, seed)
            .map_err(|source| {
                log::error!("Failed to generate text: {source:#}");
                Error::Generation(source)
            })?;

        match candidates.into_iter().next() {
            Some(candidate) => Ok(candidate.generated_text),
            None => {
                log::error!("Failed to generate text: {} returned no candidates", spec.model_id);
                Err(Error::Generation(anyhow!(
                    "{} returned no candidates",
                    spec.model_id
                )))
            }
        }
    }

    /// Label of the top prediction for `text`. The text is passed through
    /// unchecked, empty strings included.
    pub fn analyze_sentiment(
        &self,
        text: &str,
        model: &str,
        device: DeviceSelector,
    ) -> Result<String> {
        let spec = ModelSpec::new(Task::SentimentAnalysis, model, device);
        let mut analyzer = self.engine.sentiment_analysis(&spec).map_err(|source| {
            log::error!("Failed to initialize the sentiment analyzer {model}: {source:#}");
            Error::ModelLoad {
                model: model.to_string(),
                source,
            }
        })?;

        let predictions = analyzer.classify(text).map_err(|source| {
            log::error!("Failed to analyze sentiment: {source:#}");
            Error::Classification(source)
        })?;

        match predictions.into_iter().next() {
            Some(top) => Ok(top.label),
            None => {
                log::error!("Failed to analyze sentiment: {model} returned no predictions");
                Err(Error::Classification(anyhow!(
                    "{model} returned no predictions"
                )))
            }
        }
    }

    /// Headlines scraped from the quote page, in page order.
    pub async fn stock_headlines(&self, ticker: &str) -> Result<Vec<String>> {
        self.headlines.fetch(ticker).await.map_err(|source| {
            log::error!("Error fetching stock news for {ticker}: {source}");
            Error::Fetch {
                url: self.headlines.quote_url(ticker).to_string(),
                source,
            }
        })
    }

    /// One year of daily prices.
    pub async fn stock_history(&self, ticker: &str) -> Result<PriceHistory> {
        self.history.history(ticker).await.map_err(|source| {
            log::error!("Error fetching stock data for {ticker}: {source:#}");
            Error::DataProvider {
                ticker: ticker.to_string(),
                source,
            }
        })
    }
}
