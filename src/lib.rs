pub mod cli;
pub mod config;
pub mod db;
pub mod deadcode;
pub mod error;
pub mod impact;
pub mod indexer;
pub mod model;
pub mod report;
pub mod util;
