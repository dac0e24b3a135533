//! SqlSage - Feedback & Learning Engine for NL-to-SQL Translation
//!
//! Main entry point: a CLI over the learning engine plus the HTTP API
//! server used by the surrounding analytics platform.

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlsage_core::{
    api::{self, ApiServerConfig},
    FeedbackLearner, FeedbackSubmission, LearnerConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlsage")]
#[command(about = "Feedback and learning engine for natural-language-to-SQL translation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); SQLSAGE_* env vars override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides the configured one)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Set log level
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Listen address
        #[arg(long, default_value = "127.0.0.1:8475")]
        addr: String,
    },

    /// Record one feedback judgment
    Feedback {
        /// The natural-language query as asked
        query: String,

        /// The SQL that was generated for it
        sql: String,

        /// The translation was helpful
        #[arg(long, conflicts_with = "not_helpful")]
        helpful: bool,

        /// The translation was not helpful
        #[arg(long)]
        not_helpful: bool,

        /// Star rating, 1-5
        #[arg(long)]
        rating: Option<u8>,

        /// Free-text improvement suggestion
        #[arg(long)]
        suggestion: Option<String>,

        /// Chart type the result was rendered as
        #[arg(long)]
        chart_type: Option<String>,

        /// SQL execution time in seconds
        #[arg(long)]
        execution_time: Option<f64>,

        /// Row count of the result
        #[arg(long)]
        result_count: Option<u64>,
    },

    /// Show what the engine has learned about a query
    Suggest {
        /// The natural-language query
        query: String,
    },

    /// Print a prompt with learned context appended
    Enhance {
        /// The natural-language query
        query: String,

        /// Base prompt to enhance
        #[arg(long, default_value = "Translate the question into SQL.")]
        prompt: String,
    },

    /// Print the accuracy report
    Report,

    /// Discard the aggregate snapshot and rebuild from the feedback log
    Rebuild,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone())),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config =
        LearnerConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Commands::Serve { addr } => {
            let learner = Arc::new(FeedbackLearner::open(config).await?);
            let api_config = ApiServerConfig {
                addr: addr.parse().context("Invalid listen address")?,
            };
            api::serve(learner, api_config).await?;
        }

        Commands::Feedback {
            query,
            sql,
            helpful,
            not_helpful,
            rating,
            suggestion,
            chart_type,
            execution_time,
            result_count,
        } => {
            if helpful == not_helpful {
                anyhow::bail!("Pass exactly one of --helpful or --not-helpful");
            }

            let learner = FeedbackLearner::open(config).await?;
            let record_id = learner
                .record_feedback(FeedbackSubmission {
                    original_query: query,
                    generated_sql: sql,
                    was_helpful: helpful,
                    user_rating: rating,
                    improvement_suggestion: suggestion,
                    chart_type,
                    execution_time,
                    result_count,
                })
                .await?;
            learner.flush().await?;

            println!("✓ Feedback recorded: {}", record_id);
        }

        Commands::Suggest { query } => {
            let learner = FeedbackLearner::open(config).await?;
            let bundle = learner.suggest(&query).await?;
            println!("{}", serde_json::to_string_pretty(&bundle)?);
        }

        Commands::Enhance { query, prompt } => {
            let learner = FeedbackLearner::open(config).await?;
            let enhanced = learner.enhance_prompt(&prompt, &query).await?;
            println!("{}", enhanced);
        }

        Commands::Report => {
            let learner = FeedbackLearner::open(config).await?;
            let report = learner.report().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Rebuild => {
            let learner = FeedbackLearner::open(config).await?;
            learner.rebuild().await?;
            println!("✓ Aggregates rebuilt from {} records", learner.record_count());
        }
    }

    Ok(())
}
