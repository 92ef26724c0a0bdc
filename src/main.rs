//! Signal Chat Export - Export Signal Desktop conversations to Markdown and HTML.
//!
//! Reads a decrypted copy of the Signal Desktop database and writes one
//! directory per conversation (`index.md`, `index.html`, `media/`). Passing
//! a previous export with `--old` merges into it non-destructively.
//!
//!   signal-chat-export list                       # Chats and message counts
//!   signal-chat-export export out/                # Fresh export
//!   signal-chat-export export new/ --old out/     # Merge with a previous export
//!   signal-chat-export export out/ --decrypted plain.sqlite

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::path::Path;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    format_chats_table, format_report, load_chats, run_export, summarize, ChatFilter,
    ExportOptions, RenderOptions,
};
use cli::{Cli, Commands, SourceArgs};
use domain::{AppConfig, SourceRow};
use infrastructure::{
    load_config, Decryptor, PreDecrypted, SignalDbReader, SignalPaths, SqlcipherCli,
    DEFAULT_CONFIG,
};

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: Cli) -> domain::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Export {
            dest,
            source,
            attachments,
            old,
            overwrite,
            no_quote,
            paginate,
            no_html,
            chats,
            workers,
        } => {
            let mut config = config;
            if let Some(paginate) = paginate {
                config.export.paginate = paginate;
            }
            if let Some(workers) = workers {
                config.export.workers = workers;
            }
            if no_quote {
                config.export.quotes = false;
            }
            if no_html {
                config.export.html = false;
            }

            let signal_dir = source
                .source
                .clone()
                .unwrap_or_else(|| config.signal_dir());
            let options = ExportOptions {
                dest,
                old,
                overwrite,
                attachments_root: attachments
                    .unwrap_or_else(|| SignalPaths::new(&signal_dir).attachments),
                render: RenderOptions {
                    timezone: config.export.timezone,
                    quotes: config.export.quotes,
                },
                html: config.export.html,
                paginate: config.export.paginate,
                workers: config.worker_count(),
            };
            cmd_export(&config, &source, &ChatFilter::new(chats), &options)?;
        }
        Commands::List { source } => {
            cmd_list(&config, &source)?;
        }
        Commands::Paths { source } => {
            cmd_paths(&config, source.as_deref());
        }
        Commands::Config => {
            print!("{DEFAULT_CONFIG}");
        }
    }

    Ok(())
}

/// Decrypt (or accept) the database and read every row.
fn read_source(config: &AppConfig, args: &SourceArgs) -> domain::Result<Vec<SourceRow>> {
    let decryptor: Box<dyn Decryptor> = match &args.decrypted {
        Some(path) => Box::new(PreDecrypted { path: path.clone() }),
        None => {
            let signal_dir = args.source.clone().unwrap_or_else(|| config.signal_dir());
            let paths = SignalPaths::discover(&signal_dir)?;
            Box::new(SqlcipherCli::new(config.source.sqlcipher_bin.clone(), paths))
        }
    };

    let db = decryptor.decrypt()?;
    let rows = SignalDbReader::open(db.path())?.rows()?;
    tracing::info!(rows = rows.len(), "Read source database");
    Ok(rows)
}

/// Export command.
fn cmd_export(
    config: &AppConfig,
    source: &SourceArgs,
    filter: &ChatFilter,
    options: &ExportOptions,
) -> domain::Result<()> {
    let rows = read_source(config, source)?;
    let loaded = load_chats(rows, filter);

    if loaded.chats.is_empty() && options.old.is_none() {
        println!("{}", "No chats matched; nothing to export.".yellow());
        return Ok(());
    }

    let report = run_export(loaded, options)?;

    println!("{}", format_report(&report));
    if report.has_issues() {
        println!();
        println!(
            "{}",
            "Some items were skipped; the export is otherwise complete.".yellow()
        );
    }
    println!();
    println!(
        "{} {}",
        "✅ Export written to".green(),
        options.dest.display()
    );

    Ok(())
}

/// List chats command.
fn cmd_list(config: &AppConfig, source: &SourceArgs) -> domain::Result<()> {
    let rows = read_source(config, source)?;
    let loaded = load_chats(rows, &ChatFilter::default());
    let summaries = summarize(&loaded.chats);

    println!("{}", format_chats_table(&summaries, config.export.timezone));
    println!();
    println!(
        "Total: {} chat(s), {} message(s), {} row(s) skipped",
        summaries.len(),
        summaries.iter().map(|s| s.message_count).sum::<usize>(),
        loaded.row_defects.len()
    );

    Ok(())
}

/// Show resolved paths.
fn cmd_paths(config: &AppConfig, source: Option<&Path>) {
    let signal_dir = source.map_or_else(|| config.signal_dir(), Path::to_path_buf);
    let paths = SignalPaths::new(&signal_dir);

    println!("{}", "📂 Signal Chat Export Paths".bold());
    println!();

    let entries = [
        ("signal dir", &paths.dir),
        ("database", &paths.db),
        ("key file", &paths.key_file),
        ("attachments", &paths.attachments),
    ];
    for (label, path) in entries {
        let marker = if path.exists() {
            "found".green()
        } else {
            "missing".red()
        };
        println!("  {:<12} [{}] {}", label, marker, path.display());
    }

    let config_file = AppConfig::config_file_path();
    let marker = if config_file.exists() {
        "found".green()
    } else {
        "default".blue()
    };
    println!("  {:<12} [{}] {}", "config", marker, config_file.display());
}

/// Setup tracing subscriber for logging.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
