use anyhow::{Context, Result};
use clap::Parser;
use codeseer::impact::{self, ImpactOutcome, ImpactQuery};
use codeseer::{cli, db, deadcode, indexer, report, util};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status for a symbol that is not in the graph.
const EXIT_NOT_FOUND: u8 = 2;

fn default_db_path(repo: &Path) -> PathBuf {
    repo.join(".codeseer").join("codeseer.sqlite")
}

fn canonical(repo: &Path) -> PathBuf {
    std::fs::canonicalize(repo).unwrap_or_else(|_| repo.to_path_buf())
}

fn repo_url(repo: &Path, url: Option<String>) -> String {
    url.unwrap_or_else(|| util::file_url(&canonical(repo)))
}

fn project_name(repo: &Path) -> String {
    canonical(repo)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("project")
        .to_string()
}

fn open_db(repo: &Path, db: Option<PathBuf>) -> Result<db::Db> {
    let db_path = db.unwrap_or_else(|| default_db_path(repo));
    db::Db::new(&db_path).with_context(|| format!("open {}", db_path.display()))
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let args = cli::Args::parse();
    init_tracing(&args.log_level);

    match args.command {
        cli::Command::Ingest {
            repo,
            db,
            name,
            url,
            no_ignore,
            workers,
        } => {
            let db_path = db.unwrap_or_else(|| default_db_path(&repo));
            let name = name.unwrap_or_else(|| project_name(&repo));
            let url = repo_url(&repo, url);
            let mut indexer = indexer::Indexer::new_with_options(
                repo,
                db_path,
                indexer::scan::ScanOptions::new(no_ignore),
            )?;
            if let Some(workers) = workers {
                indexer = indexer.with_workers(workers);
            }
            let summary = indexer.ingest(&name, &url)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Impact {
            symbol,
            repo,
            db,
            url,
            file,
            depth,
            format,
        } => {
            let db = open_db(&repo, db)?;
            let project = db.require_project(&repo_url(&repo, url))?;
            let mut query = ImpactQuery::new(symbol);
            if let Some(file) = file {
                query = query.in_file(file);
            }
            if let Some(depth) = depth {
                query = query.with_depth(depth);
            }
            let outcome = impact::analyze_impact(&db, project.id, &query)?;
            let report = match outcome {
                ImpactOutcome::NotFound { ref symbol } => {
                    if format == cli::ImpactFormat::Text {
                        eprintln!("symbol not found: {symbol}");
                    } else {
                        println!("{}", serde_json::to_string_pretty(&outcome)?);
                    }
                    return Ok(ExitCode::from(EXIT_NOT_FOUND));
                }
                ImpactOutcome::Found(report) => report,
            };
            match format {
                cli::ImpactFormat::Text => {
                    let root = canonical(&repo);
                    print!("{}", report::render_impact(&report, Some(root.as_path())));
                }
                cli::ImpactFormat::Json => {
                    let outcome = ImpactOutcome::Found(report);
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                }
                cli::ImpactFormat::Graph => {
                    let graph = impact::graph::export(&report);
                    println!("{}", serde_json::to_string_pretty(&graph)?);
                }
                cli::ImpactFormat::Dot => {
                    print!("{}", impact::graph::export(&report).to_dot());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Unused {
            repo,
            db,
            url,
            limit,
            exclude,
            test_pattern,
            format,
        } => {
            let db = open_db(&repo, db)?;
            let project = db.require_project(&repo_url(&repo, url))?;
            let mut options = deadcode::DeadCodeOptions::default();
            if let Some(limit) = limit {
                options.limit = limit;
            }
            if !test_pattern.is_empty() {
                options.test_patterns = test_pattern;
            }
            options.exclude = exclude;
            let found = deadcode::find_dead_code(&db, project.id, &options)?;
            match format {
                cli::ListFormat::Text => print!("{}", report::render_dead_code(&found)),
                cli::ListFormat::Json => println!("{}", serde_json::to_string_pretty(&found)?),
            }
            Ok(ExitCode::SUCCESS)
        }
        cli::Command::Overview { repo, db, url } => {
            let db = open_db(&repo, db)?;
            let project = db.require_project(&repo_url(&repo, url))?;
            let overview = db.overview(project)?;
            println!("{}", serde_json::to_string_pretty(&overview)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
