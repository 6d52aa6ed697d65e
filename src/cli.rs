use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "codeseer",
    version,
    about = "Cross-file symbol graph: blast radius and dead code",
    after_help = r#"Examples:
  codeseer ingest --repo .
  codeseer impact parse --file libs/utils.py
  codeseer impact Store.save --depth 2 --format json
  codeseer impact parse --format dot | dot -Tsvg > impact.svg
  codeseer unused --limit 100 --exclude 'scripts/*'
  codeseer overview
"#
)]
pub struct Args {
    /// Log filter used when RUST_LOG is unset (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImpactFormat {
    Text,
    Json,
    /// Node/edge JSON document.
    Graph,
    /// Graphviz DOT.
    Dot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Extract symbols, imports and calls, then resolve them.
    Ingest {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        /// Project name; defaults to the repository directory name.
        #[arg(long)]
        name: Option<String>,
        /// Project key; defaults to the file:// URL of the repository.
        #[arg(long)]
        url: Option<String>,
        /// Include files ignored by .gitignore.
        #[arg(long)]
        no_ignore: bool,
        /// Extraction threads; defaults to CODESEER_INGEST_WORKERS.
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Show what calls a symbol, directly and transitively.
    Impact {
        symbol: String,
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        url: Option<String>,
        /// Pick the symbol defined in this file (path or path suffix).
        #[arg(long)]
        file: Option<String>,
        /// Caller levels to follow; defaults to CODESEER_IMPACT_MAX_DEPTH.
        #[arg(long)]
        depth: Option<usize>,
        #[arg(long, value_enum, default_value = "text")]
        format: ImpactFormat,
    },
    /// List functions, methods and classes no resolved call reaches.
    Unused {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        /// Skip symbols in files matching this glob (repeatable).
        #[arg(long)]
        exclude: Vec<String>,
        /// Test-file globs, replacing the default `*test*` (repeatable).
        #[arg(long)]
        test_pattern: Vec<String>,
        #[arg(long, value_enum, default_value = "text")]
        format: ListFormat,
    },
    /// Print counts for the stored graph.
    Overview {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        url: Option<String>,
    },
}
