pub mod analytics;
pub mod generate;
pub mod listings;
pub mod scheduler;
