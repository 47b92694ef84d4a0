pub mod backgrounds;
pub mod error;
pub mod health;
pub mod jobs;
pub mod metrics;
