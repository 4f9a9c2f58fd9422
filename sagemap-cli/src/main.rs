// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Sagemap CLI
//!
//! Processes journal entries into a belief graph kept in a JSON snapshot.
//! Results are printed to stdout as JSON; logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sagemap_pipeline::{
    generate_reflection_questions, process_submission, JournalSubmission, ReflectionRequest,
    SagemapConfig,
};
use sagemap_store::{BeliefGraphStore, ExportData};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sagemap")]
#[command(about = "Sagemap - map the beliefs in your journal", long_about = None)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Belief graph snapshot file
    #[arg(
        long,
        global = true,
        env = "SAGEMAP_DATA_FILE",
        default_value = "./sagemap-data.json"
    )]
    data_file: PathBuf,

    /// API key for this invocation (overrides config and environment)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Verbose mode
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract beliefs from a journal entry and merge them into the graph
    Journal {
        /// Entry text; read from --file or stdin when omitted
        text: Option<String>,

        /// Read the entry from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,

        /// Print the result without saving it
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate reflection questions about the stored beliefs
    Reflect,

    /// Check that the API key is accepted by the provider
    TestKey,

    /// Print graph nodes and edges
    Graph,

    /// Print belief and connection counts
    Stats,

    /// Export all stored data
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace all stored data with an export
    Import {
        /// Export file to load
        path: PathBuf,
    },

    /// Delete all stored data
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Serialize)]
struct KeyTestReport {
    success: bool,
    message: String,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "sagemap=debug" } else { "sagemap=info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_entry(text: Option<String>, file: Option<&Path>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read journal file {:?}", path));
    }

    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read journal entry from stdin")?;
    Ok(content)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = SagemapConfig::load(cli.config.clone())?;

    let store = match cli.command {
        // Key check needs no store
        Commands::TestKey => return test_key(&config, cli.api_key.as_deref()).await,
        _ => BeliefGraphStore::open(&cli.data_file)
            .await
            .with_context(|| format!("Failed to open belief graph at {:?}", cli.data_file))?,
    };

    match cli.command {
        Commands::TestKey => {}
        Commands::Journal {
            text,
            file,
            dry_run,
        } => {
            let submission = JournalSubmission {
                content: read_entry(text, file.as_deref())?,
                existing_beliefs: store.list_beliefs().await,
                api_key: cli.api_key,
            };

            match process_submission(&config, &submission, &store).await {
                Ok(outcome) => {
                    if dry_run {
                        let ids: Vec<String> =
                            outcome.beliefs.iter().map(|b| b.belief.id.clone()).collect();
                        store.release_reserved_ids(&ids).await;
                        info!("Dry run, nothing saved");
                    } else {
                        let beliefs = outcome.new_beliefs();
                        store
                            .commit(outcome.journal_entry.clone(), beliefs, outcome.edges.clone())
                            .await?;
                    }
                    print_json(&outcome)?;
                }
                Err(failure) => {
                    print_json(&failure.to_json())?;
                    bail!(failure.message);
                }
            }
        }

        Commands::Reflect => {
            let request = ReflectionRequest {
                beliefs: store.list_beliefs().await,
                api_key: cli.api_key,
            };
            let questions = generate_reflection_questions(&config, &request)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            print_json(&serde_json::json!({ "questions": questions }))?;
        }

        Commands::Graph => print_json(&store.graph_data().await)?,

        Commands::Stats => print_json(&store.stats().await)?,

        Commands::Export { output } => {
            let data = store.export().await;
            match output {
                Some(path) => {
                    std::fs::write(&path, serde_json::to_string_pretty(&data)?)
                        .with_context(|| format!("Failed to write export to {:?}", path))?;
                    info!(
                        beliefs = data.beliefs.len(),
                        edges = data.edges.len(),
                        "Exported belief graph to {:?}",
                        path
                    );
                }
                None => print_json(&data)?,
            }
        }

        Commands::Import { path } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read export {:?}", path))?;
            let data: ExportData =
                serde_json::from_str(&content).context("Export file is not valid")?;
            store.import(data).await?;
            print_json(&store.stats().await)?;
        }

        Commands::Clear { yes } => {
            if !yes {
                bail!("Refusing to delete all data without --yes");
            }
            store.clear().await?;
            info!("Cleared belief graph at {:?}", cli.data_file);
        }
    }

    Ok(())
}

async fn test_key(config: &SagemapConfig, api_key: Option<&str>) -> Result<()> {
    match config.model.verify_api_key(api_key).await {
        Ok(()) => print_json(&KeyTestReport {
            success: true,
            message: "API key is valid".to_string(),
        }),
        Err(e) => {
            print_json(&KeyTestReport {
                success: false,
                message: e.key_test_message().to_string(),
            })?;
            bail!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "sagemap",
            "journal",
            "I value honesty",
            "--data-file",
            "/tmp/graph.json",
            "--api-key",
            "sk-test",
        ])
        .unwrap();

        assert_eq!(cli.data_file, PathBuf::from("/tmp/graph.json"));
        assert_eq!(cli.api_key.as_deref(), Some("sk-test"));
        match cli.command {
            Commands::Journal { text, dry_run, .. } => {
                assert_eq!(text.as_deref(), Some("I value honesty"));
                assert!(!dry_run);
            }
            _ => panic!("expected journal command"),
        }
    }

    #[test]
    fn test_text_and_file_conflict() {
        let result = Cli::try_parse_from(["sagemap", "journal", "text", "--file", "entry.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_read_entry_prefers_text_then_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entry.txt");
        std::fs::write(&path, "From a file").unwrap();

        assert_eq!(read_entry(Some("Inline".into()), Some(&path)).unwrap(), "Inline");
        assert_eq!(read_entry(None, Some(&path)).unwrap(), "From a file");
        assert!(read_entry(None, Some(&dir.path().join("missing.txt"))).is_err());
    }
}
