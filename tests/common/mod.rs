//! Shared stubs for the integration tests: an inference engine with
//! scripted behaviour, a log capture, and a throwaway HTTP server.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use anyhow::{anyhow, Result};
use axum::Router;
use log::{Level, LevelFilter, Log, Metadata, Record};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tickertext::common::SamplingParams;
use tickertext::models::{
    GeneratedSequence, InferenceEngine, ModelSpec, SentimentAnalysis, SentimentPrediction,
    TextGeneration,
};

// ---------------------------------------------------------------------------
// Stub engine
// ---------------------------------------------------------------------------

const VOCAB: &[&str] = &[
    "market", "rally", "shares", "fell", "earnings", "beat", "guidance", "rose",
];

#[derive(Clone)]
pub enum TextBehavior {
    /// Appends seeded pseudo-random words to the prompt.
    Seeded,
    /// Returns these candidates regardless of input.
    Candidates(Vec<String>),
    FailLoad(String),
    FailGenerate(String),
}

#[derive(Clone)]
pub enum SentimentBehavior {
    Predictions(Vec<SentimentPrediction>),
    FailLoad(String),
    FailClassify(String),
}

/// Counters shared between a test and the engine it hands to `Llm`.
#[derive(Default)]
pub struct Calls {
    pub loads: AtomicUsize,
    pub seeds: Mutex<Vec<u64>>,
    pub texts: Mutex<Vec<String>>,
    pub specs: Mutex<Vec<ModelSpec>>,
}

impl Calls {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn seeds(&self) -> Vec<u64> {
        self.seeds.lock().unwrap().clone()
    }
}

pub struct StubEngine {
    pub text: TextBehavior,
    pub sentiment: SentimentBehavior,
    pub calls: Arc<Calls>,
}

impl StubEngine {
    pub fn new(text: TextBehavior) -> Self {
        Self {
            text,
            sentiment: SentimentBehavior::Predictions(vec![positive(0.99)]),
            calls: Arc::new(Calls::default()),
        }
    }

    pub fn sentiment(sentiment: SentimentBehavior) -> Self {
        Self {
            text: TextBehavior::Seeded,
            sentiment,
            calls: Arc::new(Calls::default()),
        }
    }
}

pub fn positive(score: f32) -> SentimentPrediction {
    SentimentPrediction {
        label: "POSITIVE".to_string(),
        score,
    }
}

struct StubGenerator {
    behavior: TextBehavior,
    calls: Arc<Calls>,
}

impl TextGeneration for StubGenerator {
    fn generate(
        &mut self,
        prompt: &str,
        params: &SamplingParams,
        seed: u64,
    ) -> Result<Vec<GeneratedSequence>> {
        self.calls.seeds.lock().unwrap().push(seed);
        match &self.behavior {
            TextBehavior::Seeded => {
                let mut rng = StdRng::seed_from_u64(seed);
                let candidates = (0..params.num_return_sequences)
                    .map(|_| {
                        let words: Vec<&str> = (0..12)
                            .map(|_| VOCAB[rng.gen_range(0..VOCAB.len())])
                            .collect();
                        GeneratedSequence {
                            generated_text: format!("{prompt} {}", words.join(" ")),
                        }
                    })
                    .collect();
                Ok(candidates)
            }
            TextBehavior::Candidates(texts) => Ok(texts
                .iter()
                .map(|text| GeneratedSequence {
                    generated_text: text.clone(),
                })
                .collect()),
            TextBehavior::FailGenerate(message) => Err(anyhow!("{message}")),
            TextBehavior::FailLoad(_) => unreachable!("load already failed"),
        }
    }
}

struct StubClassifier {
    behavior: SentimentBehavior,
    calls: Arc<Calls>,
}

impl SentimentAnalysis for StubClassifier {
    fn classify(&mut self, text: &str) -> Result<Vec<SentimentPrediction>> {
        self.calls.texts.lock().unwrap().push(text.to_string());
        match &self.behavior {
            SentimentBehavior::Predictions(predictions) => Ok(predictions.clone()),
            SentimentBehavior::FailClassify(message) => Err(anyhow!("{message}")),
            SentimentBehavior::FailLoad(_) => unreachable!("load already failed"),
        }
    }
}

impl InferenceEngine for StubEngine {
    fn text_generation(&self, spec: &ModelSpec) -> Result<Box<dyn TextGeneration>> {
        self.calls.loads.fetch_add(1, Ordering::SeqCst);
        self.calls.specs.lock().unwrap().push(spec.clone());
        if let TextBehavior::FailLoad(message) = &self.text {
            return Err(anyhow!("{message}"));
        }
        Ok(Box::new(StubGenerator {
            behavior: self.text.clone(),
            calls: self.calls.clone(),
        }))
    }

    fn sentiment_analysis(&self, spec: &ModelSpec) -> Result<Box<dyn SentimentAnalysis>> {
        self.calls.loads.fetch_add(1, Ordering::SeqCst);
        self.calls.specs.lock().unwrap().push(spec.clone());
        if let SentimentBehavior::FailLoad(message) = &self.sentiment {
            return Err(anyhow!("{message}"));
        }
        Ok(Box::new(StubClassifier {
            behavior: self.sentiment.clone(),
            calls: self.calls.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CaptureLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

impl CaptureLogger {
    /// Error records mentioning `needle`. Tests run in parallel, so each test
    /// should search for something only it logs.
    pub fn errors_mentioning(&self, needle: &str) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(level, message)| *level == Level::Error && message.contains(needle))
            .map(|(_, message)| message.clone())
            .collect()
    }
}

pub fn logs() -> &'static CaptureLogger {
    static LOGGER: OnceLock<&'static CaptureLogger> = OnceLock::new();
    LOGGER.get_or_init(|| {
        let logger: &'static CaptureLogger = Box::leak(Box::new(CaptureLogger::default()));
        log::set_logger(logger).expect("logger already installed");
        log::set_max_level(LevelFilter::Trace);
        logger
    })
}

// ---------------------------------------------------------------------------
// HTTP stub
// ---------------------------------------------------------------------------

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
