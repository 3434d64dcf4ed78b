//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::client::HistoryCommand;
use crate::filtering::TierFilter;

#[derive(Parser, Debug)]
#[command(
    name = "qtriage",
    version,
    about = "Security questionnaire ingestion and confidence triage",
    long_about = "qtriage submits security questionnaires to an answering service, classifies every \
                  suggested answer by confidence, lets a reviewer approve or reject answers and \
                  exports the reviewed batch as CSV."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/qtriage/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply (e.g., "staging")
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a saved batch response and show the triage summary
    Ingest {
        /// Batch response JSON (`{ "results": [...] }` or a bare array)
        payload: PathBuf,

        /// Show only one tier: all, high, medium, low or unknown
        #[arg(short, long, default_value = "all")]
        tier: TierFilter,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ingest a saved batch response, apply verdicts and write the CSV
    Export {
        /// Batch response JSON
        payload: PathBuf,

        /// Output directory (defaults to export.output_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Mark a question as approved
        #[arg(long, value_name = "ID")]
        approve: Vec<String>,

        /// Mark a question as rejected
        #[arg(long, value_name = "ID")]
        reject: Vec<String>,
    },

    /// Upload a questionnaire to the answering service
    Submit {
        /// Questionnaire file (csv, xlsx, xls or pdf)
        questionnaire: PathBuf,

        /// Write the CSV export after a successful submission
        #[arg(long)]
        export: bool,

        /// Show only one tier
        #[arg(short, long, default_value = "all")]
        tier: TierFilter,
    },

    /// Ask a single free-form question
    Ask {
        /// Question to ask
        message: String,
    },

    /// Manage conversation history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Resolve document citations to links
    Resolve {
        /// Citations as cited by the answering service
        #[arg(required = true)]
        citations: Vec<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// List saved conversations
    List,
    /// Open a saved conversation
    Select {
        /// Conversation id
        id: String,
    },
    /// Start a new conversation
    New,
    /// Delete the active conversation
    Delete,
    /// Edit the active conversation
    Edit,
    /// Rename the active conversation
    Rename {
        /// New title
        title: String,
    },
}

impl From<HistoryAction> for HistoryCommand {
    fn from(action: HistoryAction) -> Self {
        match action {
            HistoryAction::List => HistoryCommand::List,
            HistoryAction::Select { id } => HistoryCommand::Select(id),
            HistoryAction::New => HistoryCommand::New,
            HistoryAction::Delete => HistoryCommand::Delete,
            HistoryAction::Edit => HistoryCommand::Edit,
            HistoryAction::Rename { title } => HistoryCommand::Rename(title),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration and document mapping table
    Init {
        /// Force overwrite existing files
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_export_flags_repeat() {
        let cli = Cli::try_parse_from([
            "qtriage", "export", "batch.json", "--approve", "Q1", "--approve", "Q2", "--reject",
            "Q3",
        ])
        .unwrap();

        match cli.command {
            Commands::Export {
                approve, reject, ..
            } => {
                assert_eq!(approve, vec!["Q1", "Q2"]);
                assert_eq!(reject, vec!["Q3"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_tier_filter_argument() {
        let cli = Cli::try_parse_from(["qtriage", "ingest", "batch.json", "--tier", "medium"])
            .unwrap();
        match cli.command {
            Commands::Ingest { tier, .. } => assert_eq!(tier.to_string(), "medium"),
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["qtriage", "ingest", "batch.json", "--tier", "bogus"]).is_err());
    }

    #[test]
    fn test_history_rename_maps_to_command() {
        let cli = Cli::try_parse_from(["qtriage", "history", "rename", "Vendor A"]).unwrap();
        match cli.command {
            Commands::History { action } => assert_eq!(
                HistoryCommand::from(action),
                HistoryCommand::Rename("Vendor A".to_string())
            ),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
