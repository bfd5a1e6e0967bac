use anyhow::Result;

use std::io::Write;

use crate::common::{GenerationRequest, TextGenResponse};

/// Prompt loop against a running server.
pub async fn run_client(port: u16, model: String) -> Result<()> {
    println!("Running client...");

    let reqwest_client = reqwest::Client::new();
    let mut prompt = String::new();

    loop {
        print!("llm> ");
        std::io::stdout().flush()?;

        prompt.clear();
        if std::io::stdin().read_line(&mut prompt)? == 0 {
            break;
        }
        if prompt.trim().is_empty() {
            continue;
        }

        let req = GenerationRequest::new(prompt.trim(), model.clone());

        let start_time = std::time::Instant::now();
        let res = reqwest_client
            .post(format!("http://localhost:{port}/api/complete"))
            .json(&req)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await?;
            log::error!("Completion failed with {status}: {body}");
            continue;
        }

        let TextGenResponse { text } = res.json().await?;
        println!("{text}");
        println!(
            "Completed in {:.2} seconds",
            start_time.elapsed().as_secs_f32()
        );
    }

    Ok(())
}
