pub mod ai;
pub mod config;
pub mod db;
pub mod jobs;
pub mod listing_manager;
pub mod models;
pub mod pricing;
pub mod scheduler;
pub mod scraper;
pub mod storage;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::Database;
pub use utils::error::{AppError, Result};
