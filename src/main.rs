use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use sift::config::Config;
use sift::db::Database;
use sift::error::SiftError;
use sift::extract::ReadabilityExtractor;
use sift::learner::{LearnOutcome, ProfileLearner};
use sift::logging;
use sift::run::run_sources;
use sift::types::Relevance;

// Exit status contract: 0 success, 1 hard failure, 2 no-op (nothing new to
// process, or rating threshold not met).
const EXIT_NOOP: u8 = 2;

#[derive(Parser)]
#[command(name = "sift", about = "Feed ingestion with LLM relevance scoring")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process all configured feed sources once
    Run,
    /// Generate or evolve the preference profile from accumulated ratings
    Learn,
    /// Overwrite the profile with user-supplied preferences (no model call)
    SetProfile {
        /// Semicolon-separated preference phrases
        #[arg(long, value_delimiter = ';')]
        likes: Vec<String>,
        #[arg(long, value_delimiter = ';')]
        dislikes: Vec<String>,
    },
    /// Rate an article as relevant or not-relevant
    Rate {
        id: String,
        #[arg(value_parser = ["relevant", "not-relevant"])]
        verdict: String,
    },
    /// Clear an article's rating
    Unrate { id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::configure_logging();
    let cli = Cli::parse();

    match dispatch(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Command) -> anyhow::Result<ExitCode> {
    let config = Config::from_env()?;
    let db = Database::new(&config.database_path).await?;

    match command {
        Command::Run => {
            let cancel_rx = spawn_ctrl_c_listener();
            let summary = run_sources(
                &config,
                &db,
                &config.gateway,
                &ReadabilityExtractor,
                &cancel_rx,
            )
            .await?;
            if summary.is_noop() {
                Ok(ExitCode::from(EXIT_NOOP))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Command::Learn => {
            let learner = ProfileLearner::new(&db, &config.gateway);
            match learner.generate().await? {
                LearnOutcome::Updated(profile) => {
                    println!("Profile updated: {}", profile.changelog);
                    Ok(ExitCode::SUCCESS)
                }
                LearnOutcome::InsufficientData {
                    relevant,
                    not_relevant,
                } => {
                    println!(
                        "Not enough ratings yet: {} relevant, {} not-relevant.",
                        relevant, not_relevant
                    );
                    Ok(ExitCode::from(EXIT_NOOP))
                }
            }
        }
        Command::SetProfile { likes, dislikes } => {
            let learner = ProfileLearner::new(&db, &config.gateway);
            let profile = learner.set_manual(likes, dislikes).await?;
            println!(
                "Profile saved: {} likes, {} dislikes.",
                profile.likes.len(),
                profile.dislikes.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Rate { id, verdict } => {
            let relevance = Relevance::parse(&verdict).ok_or_else(|| {
                SiftError::ConfigurationInvalid(format!("unknown verdict: {}", verdict))
            })?;
            rate(&db, &id, relevance).await
        }
        Command::Unrate { id } => rate(&db, &id, Relevance::Unrated).await,
    }
}

async fn rate(db: &Database, id: &str, relevance: Relevance) -> anyhow::Result<ExitCode> {
    if db.rate_article(id, relevance).await? {
        println!("Article {} marked {}.", id, relevance.as_str());
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("error: no article with id {}", id);
        Ok(ExitCode::FAILURE)
    }
}

fn spawn_ctrl_c_listener() -> watch::Receiver<bool> {
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_err() {
            error!("Failed to listen for ctrl-c");
        }
        info!("Ctrl-C received, finishing the current article before stopping.");
        let _ = cancel_tx.send(true);
    });
    cancel_rx
}
