use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use tickertext::common::{DeviceSelector, GenerationRequest, SamplingParams};
use tickertext::config::{
    ServiceConfig, SeedPolicy, DEFAULT_SENTIMENT_MODEL, DEFAULT_TEXT_MODEL,
    DEFAULT_TEXT_MODEL_FILE,
};
use tickertext::{client, server, Llm};

const RUST_LOG: &str = "RUST_LOG";

const DEFAULT_HTTP_PORT: u16 = 8000;

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[derive(Debug)]
struct Cli {
    #[arg(short, long, default_value_t = DEFAULT_HTTP_PORT)]
    port: u16,

    /// Model the interactive client asks the server for
    #[arg(short, long, default_value_t = DEFAULT_TEXT_MODEL.to_string())]
    model: String,

    #[command(flatten)]
    service: ServiceArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// GGUF weights file inside the text model repo
    #[arg(long, global = true, default_value_t = DEFAULT_TEXT_MODEL_FILE.to_string())]
    gguf_file: String,

    /// `cpu`, `-1`, or an accelerator index
    #[arg(long, global = true, default_value_t = DeviceSelector::Cpu, value_parser = parse_device)]
    device: DeviceSelector,

    /// Seed for requests without one: `fresh` or a fixed number
    #[arg(long, global = true, default_value = "fresh", value_parser = parse_seed_policy)]
    seed_policy: SeedPolicy,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API
    Serve {
        #[arg(short, long, default_value_t = DEFAULT_HTTP_PORT)]
        port: u16,
    },
    /// Continue a prompt
    Complete {
        prompt: String,

        #[arg(short, long, default_value_t = DEFAULT_TEXT_MODEL.to_string())]
        model: String,

        #[arg(long)]
        revision: Option<String>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, default_value_t = 100)]
        max_length: usize,

        #[arg(long, default_value_t = 30)]
        min_length: usize,

        #[arg(long, default_value_t = 0.7)]
        temperature: f64,

        #[arg(long, default_value_t = 50)]
        top_k: usize,

        #[arg(long, default_value_t = 0.95)]
        top_p: f64,

        #[arg(long, default_value_t = 1)]
        num_return_sequences: usize,

        /// Greedy decoding
        #[arg(long)]
        no_sample: bool,

        /// Fail instead of truncating over-long prompts
        #[arg(long)]
        no_truncation: bool,
    },
    /// Classify the sentiment of a text
    Sentiment {
        text: String,

        #[arg(short, long, default_value_t = DEFAULT_SENTIMENT_MODEL.to_string())]
        model: String,
    },
    /// Scrape news headlines for a ticker
    Headlines { ticker: String },
    /// Fetch one year of daily prices for a ticker
    History { ticker: String },
}

fn parse_device(s: &str) -> Result<DeviceSelector, String> {
    s.parse()
}

fn parse_seed_policy(s: &str) -> Result<SeedPolicy, String> {
    s.parse()
}

impl ServiceArgs {
    fn config(&self) -> ServiceConfig {
        ServiceConfig {
            text_model_file: self.gguf_file.clone(),
            device: self.device,
            seed_policy: self.seed_policy,
            ..ServiceConfig::default()
        }
    }
}

fn init_logging() {
    // Hacky way to set default logging level
    if std::env::var(RUST_LOG).is_err() {
        std::env::set_var(RUST_LOG, "info");
    }
    env_logger::init();
}

async fn run(cli: Cli) -> Result<()> {
    let command = match cli.command {
        Some(command) => command,
        None => return client::run_client(cli.port, cli.model).await,
    };

    log::info!("Service settings: {:?}", cli.service);
    let config = cli.service.config();
    let device = config.device;
    let llm = Llm::new(config)?;

    match command {
        Commands::Serve { port } => server::start_server(port, llm).await?,
        Commands::Complete {
            prompt,
            model,
            revision,
            seed,
            max_length,
            min_length,
            temperature,
            top_k,
            top_p,
            num_return_sequences,
            no_sample,
            no_truncation,
        } => {
            let mut request = GenerationRequest::new(prompt, model)
                .with_device(device)
                .with_sampling(SamplingParams {
                    max_length,
                    min_length,
                    do_sample: !no_sample,
                    temperature,
                    top_k,
                    top_p,
                    num_return_sequences,
                    truncation: !no_truncation,
                });
            if let Some(revision) = revision {
                request = request.with_revision(revision);
            }
            if let Some(seed) = seed {
                request = request.with_seed(seed);
            }
            let text = tokio::task::spawn_blocking(move || llm.complete_text(&request)).await??;
            println!("{text}");
        }
        Commands::Sentiment { text, model } => {
            let label =
                tokio::task::spawn_blocking(move || llm.analyze_sentiment(&text, &model, device))
                    .await??;
            println!("{label}");
        }
        Commands::Headlines { ticker } => {
            for headline in llm.stock_headlines(&ticker).await? {
                println!("{headline}");
            }
        }
        Commands::History { ticker } => {
            let history = llm.stock_history(&ticker).await?;
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    let exit_code = match run(cli).await {
        Ok(_) => 0,
        Err(err) => {
            log::error!("{:#}", err);
            1
        }
    };

    std::process::exit(exit_code);
}
