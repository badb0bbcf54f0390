//! CLI argument definitions.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::task::SourceType;

/// Top-level CLI parser for `tasksync`.
#[derive(Debug, Parser)]
#[command(
    name = "tasksync",
    version,
    about = "Keep local task documents and remote issues in sync"
)]
pub struct Cli {
    /// Log applied actions to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Push local changes and pull remote changes.
    Sync {
        /// Which documents to consider.
        #[command(flatten)]
        scope: Scope,
        /// Create issues for documents without a number.
        #[arg(long)]
        create_new: bool,
        /// Offer to delete documents whose issue no longer exists.
        #[arg(long)]
        clean_orphans: bool,
        /// Remove the number from documents whose issue no longer exists.
        #[arg(long)]
        strip_orphans: bool,
    },
    /// Push local changes only.
    Push {
        /// Which documents to consider.
        #[command(flatten)]
        scope: Scope,
    },
    /// Pull remote changes only.
    Pull {
        /// Which documents to consider.
        #[command(flatten)]
        scope: Scope,
    },
    /// Show what a sync would do without changing anything.
    Status {
        /// Which documents to consider.
        #[command(flatten)]
        scope: Scope,
    },
    /// Create issues for documents without a number.
    Create {
        /// Which documents to consider.
        #[command(flatten)]
        scope: Scope,
    },
}

/// Selection flags shared by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct Scope {
    /// Only this document.
    #[arg(long, conflicts_with = "number")]
    pub file: Option<PathBuf>,
    /// Only the document linked to this issue number.
    #[arg(long)]
    pub number: Option<u64>,
    /// Only these backends (repeatable): numbered, grouped.
    #[arg(long = "source", value_name = "SOURCE")]
    pub sources: Vec<SourceType>,
    /// Send titles as written instead of stripping leading `[tag]` markers.
    #[arg(long)]
    pub keep_title_prefixes: bool,
}

impl Scope {
    /// Selected backends, `None` when unrestricted.
    #[must_use]
    pub fn source_set(&self) -> Option<BTreeSet<SourceType>> {
        if self.sources.is_empty() {
            None
        } else {
            Some(self.sources.iter().copied().collect())
        }
    }
}

impl Command {
    /// The selection flags of this subcommand.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        match self {
            Self::Sync { scope, .. }
            | Self::Push { scope }
            | Self::Pull { scope }
            | Self::Status { scope }
            | Self::Create { scope } => scope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use crate::task::SourceType;
    use clap::Parser;

    #[test]
    fn parses_sync_flags() {
        let cli = Cli::parse_from(["tasksync", "sync", "--create-new", "--strip-orphans"]);
        let Command::Sync { create_new, clean_orphans, strip_orphans, .. } = cli.command else {
            panic!("expected sync");
        };
        assert!(create_new);
        assert!(!clean_orphans);
        assert!(strip_orphans);
    }

    #[test]
    fn parses_repeated_sources() {
        let cli =
            Cli::parse_from(["tasksync", "push", "--source", "numbered", "--source", "grouped"]);
        let sources = cli.command.scope().source_set().unwrap();
        assert!(sources.contains(&SourceType::Numbered));
        assert!(sources.contains(&SourceType::Grouped));
    }

    #[test]
    fn rejects_unknown_source() {
        assert!(Cli::try_parse_from(["tasksync", "pull", "--source", "jira"]).is_err());
    }

    #[test]
    fn file_and_number_are_exclusive() {
        let result =
            Cli::try_parse_from(["tasksync", "sync", "--file", "a.md", "--number", "3"]);
        assert!(result.is_err());
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::parse_from(["tasksync", "status", "-v", "--number", "12"]);
        assert!(cli.verbose);
        assert_eq!(cli.command.scope().number, Some(12));
        assert!(cli.command.scope().source_set().is_none());
    }
}
