//! brchat - a minimal terminal chat client for Bedrock-hosted Claude models.
//!
//! Keeps a short conversation with the model and lets the user save the last
//! reply (or the code blocks in it) as a file or script.

mod config;
mod conversation;
mod export;
mod llm;
mod model;
mod session;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use conversation::MessageLog;
use llm::BedrockEndpoint;
use model::Model;
use session::{Session, SessionSettings};

#[derive(Parser)]
#[command(name = "brchat")]
#[command(author, version, about = "A minimal terminal chat client for Bedrock-hosted Claude models")]
#[command(long_about = "Chat with a Claude model on Amazon Bedrock.\n\nType 'scribe' in the chat to save the last reply as a Python, shell, markdown or text file.")]
struct Cli {
    /// Read settings from a TOML file
    #[arg(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the model identifier
    #[arg(short = 'm', long, value_name = "MODEL")]
    model: Option<String>,

    /// AWS region of the Bedrock runtime endpoint
    #[arg(long, value_name = "REGION")]
    region: Option<String>,

    /// Send requests to this base URL instead of the regional endpoint
    #[arg(long, value_name = "URL")]
    endpoint_url: Option<String>,

    /// Retries after a throttled request
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    /// Base backoff delay in seconds, doubled on every retry
    #[arg(long, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    retry_delay: Option<u64>,

    /// Replace the default system prompt
    #[arg(long, value_name = "PROMPT")]
    system: Option<String>,

    /// Directory exported files are written to (default: current directory)
    #[arg(short = 'o', long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Do not ask the model to introduce itself at startup
    #[arg(long)]
    no_greeting: bool,

    /// Skip the startup credential check
    #[arg(long)]
    skip_verify: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply(&self, mut config: Config) -> Config {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(region) = &self.region {
            config.endpoint.region = region.clone();
        }
        if let Some(url) = &self.endpoint_url {
            config.endpoint.base_url = Some(url.clone());
        }
        if let Some(max_retries) = self.max_retries {
            config.retry.max_retries = max_retries;
        }
        if let Some(delay) = self.retry_delay {
            config.retry.base_delay_secs = delay;
        }
        if let Some(system) = &self.system {
            config.system_prompt = system.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = cli.apply(Config::load(cli.config.as_deref())?);
    config.validate().context("Invalid configuration")?;

    // Everything below up to the session is configuration: any failure exits
    // before a conversation exists.
    let model = Model::resolve(&config.model).context("Invalid model configuration")?;
    println!("Using model: {} ({})", model.family.name(), model.id);

    let endpoint = BedrockEndpoint::from_config(&config.endpoint)
        .context("Failed to initialize Bedrock client")?;
    info!("Endpoint: {}", endpoint.base_url());

    if !cli.skip_verify {
        llm::probe(&endpoint, &model).await.with_context(|| {
            format!(
                "Failed to reach {} with the configured credentials. Please ensure your \
                 Bedrock credentials are properly configured.",
                endpoint.base_url()
            )
        })?;
        println!("Credentials accepted. Starting chat session.");
    }

    let output_dir = match &cli.output_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    let settings = SessionSettings {
        model,
        params: config.generation,
        history_window: config.history_window,
        retry: config.retry.policy(),
        output_dir,
    };
    let log = MessageLog::with_system_prompt(config.system_prompt.clone());
    let mut session = Session::new(endpoint, settings, log);

    let mut stdout = std::io::stdout();
    if !cli.no_greeting {
        session.greet(&mut stdout).await?;
    }
    session.run(std::io::stdin().lock(), &mut stdout).await
}

/// Initialize stderr logging; `RUST_LOG` directives are honoured too.
fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("brchat={}", level).parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();
    Ok(())
}
