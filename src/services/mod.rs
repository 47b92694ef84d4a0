pub mod backgrounds;
pub mod context;
pub mod exporter;
pub mod fetcher;
pub mod job_manager;
pub mod job_store;
pub mod media;
pub mod pipeline;
pub mod stages;
pub mod subtitles;
pub mod transcriber;
pub mod upload;
pub mod window_selector;
