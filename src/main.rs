//! # faqdesk CLI
//!
//! ```bash
//! faqdesk --config ./config/faqdesk.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `faqdesk serve` | Start the HTTP server |
//! | `faqdesk ask "<message>"` | Resolve one message from the terminal |

mod cache;
mod config;
mod db;
mod error;
mod llm;
mod message;
mod models;
mod pipeline;
mod retriever;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::models::PipelineOutcome;
use crate::pipeline::{PipelineSettings, QueryResolutionPipeline};
use crate::retriever::KnowledgeRetriever;

/// faqdesk, a retrieval-grounded FAQ answering service.
#[derive(Parser)]
#[command(
    name = "faqdesk",
    about = "faqdesk - a retrieval-grounded FAQ answering service",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/faqdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve,

    /// Resolve a single message and print the reply.
    Ask {
        /// The question to resolve.
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "faqdesk=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Arc::new(config::load_config(&cli.config)?);

    match cli.command {
        Commands::Serve => {
            let (pipeline, retriever) = build_pipeline(&config).await?;
            server::run_server(config, pipeline, retriever).await
        }
        Commands::Ask { message } => {
            message::validate(&message, &config.limits)?;
            let (pipeline, _) = build_pipeline(&config).await?;
            run_ask(&pipeline, &message).await
        }
    }
}

/// Wire the pipeline from configuration. Returns the retriever handle
/// separately for the server's health probe.
async fn build_pipeline(
    config: &Config,
) -> Result<(Arc<QueryResolutionPipeline>, Arc<dyn KnowledgeRetriever>)> {
    let retriever = retriever::create_retriever(&config.retrieval)?;
    let (rephraser, generator) = llm::create_llm(&config.llm)?;
    let cache = cache::create_cache(&config.cache).await?;

    let pipeline = Arc::new(QueryResolutionPipeline::new(
        retriever.clone(),
        rephraser,
        generator,
        cache,
        PipelineSettings::from_config(config),
    ));

    Ok((pipeline, retriever))
}

async fn run_ask(pipeline: &QueryResolutionPipeline, message: &str) -> Result<()> {
    match pipeline.resolve(message).await {
        PipelineOutcome::Answered(text)
        | PipelineOutcome::Fallback(text)
        | PipelineOutcome::GreetingReply(text)
        | PipelineOutcome::EmptyInputReply(text) => {
            println!("{}", text);
            Ok(())
        }
        PipelineOutcome::Failed(e) => Err(e.into()),
    }
}
