// Configuration module for codeseer
// Reads from environment variables with sensible defaults

use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::warn;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection pool size (CODESEER_POOL_SIZE)
    pub pool_size: u32,

    /// Database connection pool minimum idle connections (CODESEER_POOL_MIN_IDLE)
    pub pool_min_idle: u32,

    /// Worker threads for per-file extraction (CODESEER_INGEST_WORKERS)
    pub ingest_workers: usize,

    /// Rows per transaction in the resolver passes (CODESEER_RESOLVE_BATCH_SIZE)
    pub resolve_batch_size: usize,

    /// Default traversal depth for impact queries (CODESEER_IMPACT_MAX_DEPTH)
    pub impact_max_depth: usize,

    /// Wall-clock budget for one impact query (CODESEER_IMPACT_TIMEOUT_MS)
    pub impact_timeout_ms: u64,

    /// Caller tuples collected before an impact query stops (CODESEER_IMPACT_MAX_RESULTS)
    pub impact_max_results: usize,

    /// Page size of the dead-code report (CODESEER_DEAD_CODE_LIMIT)
    pub dead_code_limit: usize,

    /// Files larger than this are skipped during ingestion (CODESEER_MAX_FILE_BYTES)
    pub max_file_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            pool_size: 10,
            pool_min_idle: 2,
            ingest_workers: workers,
            resolve_batch_size: 1000,
            impact_max_depth: 5,
            impact_timeout_ms: 5_000,
            impact_max_results: 10_000,
            dead_code_limit: 50,
            max_file_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let mut config = Config::default();
        read_var("CODESEER_POOL_SIZE", &mut config.pool_size);
        read_var("CODESEER_POOL_MIN_IDLE", &mut config.pool_min_idle);
        read_var("CODESEER_INGEST_WORKERS", &mut config.ingest_workers);
        read_var("CODESEER_RESOLVE_BATCH_SIZE", &mut config.resolve_batch_size);
        read_var("CODESEER_IMPACT_MAX_DEPTH", &mut config.impact_max_depth);
        read_var("CODESEER_IMPACT_TIMEOUT_MS", &mut config.impact_timeout_ms);
        read_var("CODESEER_IMPACT_MAX_RESULTS", &mut config.impact_max_results);
        read_var("CODESEER_DEAD_CODE_LIMIT", &mut config.dead_code_limit);
        read_var("CODESEER_MAX_FILE_BYTES", &mut config.max_file_bytes);

        config.ingest_workers = config.ingest_workers.max(1);
        config.resolve_batch_size = config.resolve_batch_size.max(1);
        config
    }

    /// Get the global configuration instance
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }
}

fn read_var<T>(key: &str, slot: &mut T)
where
    T: FromStr + std::fmt::Display,
{
    let Ok(val) = env::var(key) else {
        return;
    };
    match parse_value::<T>(&val) {
        Some(parsed) => *slot = parsed,
        None => warn!(key, value = %val, default = %slot, "invalid config value, using default"),
    }
}

fn parse_value<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}
