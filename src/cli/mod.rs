//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Signal Chat Export - Export Signal Desktop chats to Markdown and HTML.
///
/// Re-running with `--old` merges into a previous export without losing
/// anything it already holds.
#[derive(Parser, Debug)]
#[command(name = "signal-chat-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to the user config directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where to read messages from.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Signal Desktop data directory.
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Already-decrypted database; skips sqlcipher.
    #[arg(long)]
    pub decrypted: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export conversations into a directory.
    Export {
        /// Destination directory.
        dest: PathBuf,

        #[command(flatten)]
        source: SourceArgs,

        /// Attachment store (defaults to <source>/attachments.noindex).
        #[arg(long)]
        attachments: Option<PathBuf>,

        /// Previous export to merge with; it is never modified.
        #[arg(short, long)]
        old: Option<PathBuf>,

        /// Write into a destination that is not empty.
        #[arg(long)]
        overwrite: bool,

        /// Leave quoted replies out.
        #[arg(long)]
        no_quote: bool,

        /// Messages per HTML page (0 = one page).
        #[arg(short, long)]
        paginate: Option<usize>,

        /// Skip the HTML output.
        #[arg(long)]
        no_html: bool,

        /// Only these chats (comma-separated display names).
        #[arg(short, long, value_delimiter = ',')]
        chats: Vec<String>,

        /// Worker threads (0 = available parallelism).
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// List chats with their message counts.
    List {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Show resolved Signal and configuration paths.
    Paths {
        /// Signal Desktop data directory.
        #[arg(short, long)]
        source: Option<PathBuf>,
    },

    /// Print a commented default configuration file.
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_export() {
        let cli = Cli::parse_from([
            "signal-chat-export",
            "-vv",
            "export",
            "out",
            "--old",
            "prev",
            "--chats",
            "Aya,Book Club",
            "--no-html",
            "--paginate",
            "0",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Export {
            dest,
            old,
            chats,
            no_html,
            paginate,
            overwrite,
            ..
        } = cli.command
        else {
            panic!("expected export");
        };
        assert_eq!(dest, PathBuf::from("out"));
        assert_eq!(old, Some(PathBuf::from("prev")));
        assert_eq!(chats, vec!["Aya".to_string(), "Book Club".to_string()]);
        assert!(no_html);
        assert_eq!(paginate, Some(0));
        assert!(!overwrite);
    }

    #[test]
    fn test_parse_list_with_decrypted_db() {
        let cli = Cli::parse_from(["signal-chat-export", "list", "--decrypted", "plain.db"]);
        let Commands::List { source } = cli.command else {
            panic!("expected list");
        };
        assert_eq!(source.decrypted, Some(PathBuf::from("plain.db")));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
