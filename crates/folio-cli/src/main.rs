use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use folio_llm::{ChatInput, ChatOptions, LlmConfig, ModelRouter, Provider, normalize_history};

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant answering recruiter questions about the site owner.";

#[derive(Parser)]
#[command(name = "folio")]
#[command(version)]
#[command(about = "Folio recruiter chat LLM backend")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one question through the fallback chain
    Ask {
        /// The message to send
        message: String,

        /// Model to try first
        #[arg(short, long)]
        model: Option<String>,

        /// System prompt text
        #[arg(long, conflicts_with = "system_file")]
        system: Option<String>,

        /// Read the system prompt from a file
        #[arg(long)]
        system_file: Option<PathBuf>,

        /// Prior conversation as a JSON array of messages or plain strings
        #[arg(long)]
        history: Option<PathBuf>,

        #[arg(long, default_value_t = 0.7)]
        temperature: f32,

        #[arg(long, default_value_t = 1000)]
        max_tokens: u32,
    },

    /// Show the fallback chain a call would walk
    Chain {
        /// Model to try first
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Show which provider serves each model name
    Detect {
        #[arg(required = true)]
        models: Vec<String>,
    },

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask {
            message,
            model,
            system,
            system_file,
            history,
            temperature,
            max_tokens,
        } => {
            let options = ChatOptions {
                temperature,
                max_tokens,
                model,
            };
            cmd_ask(
                cli.config.as_deref(),
                message,
                system,
                system_file.as_deref(),
                history.as_deref(),
                &options,
            )
            .await
        }
        Commands::Chain { model } => cmd_chain(cli.config.as_deref(), model),
        Commands::Detect { models } => {
            cmd_detect(&models);
            Ok(())
        }
        Commands::Config => cmd_config(cli.config.as_deref()),
    }
}

async fn cmd_ask(
    config_path: Option<&Path>,
    message: String,
    system: Option<String>,
    system_file: Option<&Path>,
    history_path: Option<&Path>,
    options: &ChatOptions,
) -> Result<()> {
    let config = LlmConfig::load(config_path)?;
    let router = ModelRouter::from_config(&config).context("Failed to initialize LLM providers")?;

    let system = match (system, system_file) {
        (Some(text), _) => text,
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt at {}", path.display()))?,
        (None, None) => DEFAULT_SYSTEM_PROMPT.to_string(),
    };

    let mut messages = match history_path {
        Some(path) => load_history(path).await?,
        None => Vec::new(),
    };
    messages.push(message.into());
    debug!("Sending {} message(s)", messages.len());

    let response = router.chat(&messages, &system, options).await?;

    println!("{}", response.content);
    eprintln!(
        "\n[{} | prompt {} + completion {} = {} tokens | finish {}]",
        response.model,
        response.usage.prompt_tokens,
        response.usage.completion_tokens,
        response.usage.total_tokens,
        response.finish_reason.as_deref().unwrap_or("-")
    );
    Ok(())
}

async fn load_history(path: &Path) -> Result<Vec<folio_llm::ChatMessage>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read history at {}", path.display()))?;
    let inputs: Vec<ChatInput> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse history at {}", path.display()))?;
    Ok(normalize_history(inputs))
}

fn cmd_chain(config_path: Option<&Path>, model: Option<String>) -> Result<()> {
    let config = LlmConfig::load(config_path)?;
    let router = ModelRouter::from_config(&config)?;
    let options = ChatOptions {
        model,
        ..ChatOptions::default()
    };

    for (idx, entry) in router.chain_for(&options).iter().enumerate() {
        let configured = !config.vendor(entry.provider).api_key.is_empty();
        println!(
            "{}. {:<18} {:<10} {}{}",
            idx + 1,
            entry.reason.to_string(),
            entry.provider.to_string(),
            entry.model,
            if configured { "" } else { "  (no API key)" }
        );
    }
    Ok(())
}

fn cmd_detect(models: &[String]) {
    for model in models {
        println!("{:<32} {}", model, Provider::detect(model));
    }
}

fn cmd_config(config_path: Option<&Path>) -> Result<()> {
    let config = LlmConfig::load(config_path)?;
    println!("{:#?}", config);
    Ok(())
}
