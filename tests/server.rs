//! JSON API routes served over a real socket.

mod common;

use std::sync::Arc;

use serde_json::{json, Value};

use common::{StubEngine, TextBehavior};
use tickertext::config::{SeedPolicy, ServiceConfig};
use tickertext::{server, Llm};

async fn start(engine: StubEngine) -> String {
    let config = ServiceConfig {
        seed_policy: SeedPolicy::Fixed(42),
        ..ServiceConfig::default()
    };
    let llm = Llm::with_engine(config, engine).unwrap();
    common::serve(server::router(Arc::new(llm))).await
}

#[tokio::test]
async fn complete_returns_generated_text() {
    let base = start(StubEngine::new(TextBehavior::Candidates(vec![
        "What a day".to_string(),
        "What else".to_string(),
    ])))
    .await;

    let res = reqwest::Client::new()
        .post(format!("{base}/api/complete"))
        .json(&json!({"prompt": "What", "model": "gpt2", "sampling": {"num_return_sequences": 2}}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["text"], "What a day");
}

#[tokio::test]
async fn blank_prompt_is_a_bad_request() {
    let engine = StubEngine::new(TextBehavior::Seeded);
    let calls = engine.calls.clone();
    let base = start(engine).await;

    let res = reqwest::Client::new()
        .post(format!("{base}/api/complete"))
        .json(&json!({"prompt": "  ", "model": "gpt2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Prompt cannot be empty"));
    assert_eq!(calls.loads(), 0);
}

#[tokio::test]
async fn model_load_failure_is_a_server_error() {
    let base = start(StubEngine::new(TextBehavior::FailLoad(
        "server-load-failure".to_string(),
    )))
    .await;

    let res = reqwest::Client::new()
        .post(format!("{base}/api/complete"))
        .json(&json!({"prompt": "What", "model": "gpt2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn sentiment_defaults_to_configured_model() {
    let engine = StubEngine::new(TextBehavior::Seeded);
    let calls = engine.calls.clone();
    let base = start(engine).await;

    let res = reqwest::Client::new()
        .post(format!("{base}/api/sentiment"))
        .json(&json!({"text": "Great quarter"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"label": "POSITIVE"}));

    let specs = calls.specs.lock().unwrap().clone();
    assert_eq!(specs[0].model_id, ServiceConfig::default().sentiment_model);
}

#[tokio::test]
async fn unreachable_market_data_is_a_bad_gateway() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let config = ServiceConfig {
        quote_base_url: dead.clone(),
        chart_base_url: dead,
        ..ServiceConfig::default()
    };
    let llm = Llm::with_engine(config, StubEngine::new(TextBehavior::Seeded)).unwrap();
    let base = common::serve(server::router(Arc::new(llm))).await;

    for path in ["headlines", "history"] {
        let res = reqwest::get(format!("{base}/api/{path}/AAPL")).await.unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::BAD_GATEWAY, "{path}");
    }
}
