pub mod catalog;
pub mod config;
pub mod db;
pub mod ingest;
pub mod output;
pub mod quotes;
pub mod session;
pub mod sync;
