pub mod app;
pub mod bioc;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod ids;
pub mod layout;
pub mod merger;
pub mod output;
pub mod progress_log;
pub mod pubtator;
pub mod rate_limit;
