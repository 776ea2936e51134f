use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use sql_scope::loader::{collect_sql_files, read_sql_file, scan_files};
use sql_scope::{context_for_text, parse, tokenize, EngineConfig, StaticMetadata};

#[derive(Parser)]
#[command(name = "sql-scope")]
#[command(author, version, about = "Context-aware SQL completion engine")]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides the level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON engine config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the token stream of a SQL file
    Tokenize {
        file: PathBuf,
    },

    /// Print the parsed statement chunks of a SQL file
    Parse {
        file: PathBuf,
    },

    /// Classify a cursor position
    Context {
        file: PathBuf,

        /// 1-based cursor line
        #[arg(short, long)]
        line: usize,

        /// 1-based cursor column
        #[arg(short, long)]
        col: usize,

        /// Schema names known to exist
        #[arg(long = "schema")]
        schemas: Vec<String>,

        /// Disable the text fallback strategy
        #[arg(long)]
        no_fallback: bool,
    },

    /// Parse files, directories or glob patterns and print per-file summaries
    Scan {
        #[arg(required = true)]
        paths: Vec<String>,

        /// Glob patterns to skip
        #[arg(long)]
        exclude: Vec<String>,
    },
}

fn init_tracing(verbose: bool) {
    if !verbose && std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "sql_scope=debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Tokenize { file } => {
            let text = read_sql_file(&file)?;
            print_json(&tokenize(&text))?;
        }
        Commands::Parse { file } => {
            let text = read_sql_file(&file)?;
            print_json(&parse(&text))?;
        }
        Commands::Context {
            file,
            line,
            col,
            schemas,
            no_fallback,
        } => {
            if no_fallback {
                config.fallback_enabled = false;
            }
            let text = read_sql_file(&file)?;
            let metadata = schemas
                .iter()
                .fold(StaticMetadata::new(), |meta, schema| meta.with_schema(schema));
            print_json(&context_for_text(&text, line, col, &config, &metadata))?;
        }
        Commands::Scan { paths, exclude } => {
            let files = collect_sql_files(&paths, &exclude)?;
            let scanned = scan_files(&files, config.max_scope_depth)?;
            let summaries: Vec<_> = scanned.iter().map(|f| f.summary()).collect();
            print_json(&summaries)?;
        }
    }

    Ok(())
}
