pub mod bedrock;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
mod metrics;
pub mod normalize;
pub mod searcher;
pub mod server;

pub use config::Opts;
pub use searcher::{SearchOutcome, Searcher};
