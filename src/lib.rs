//! Creaclips clip generation service
//!
//! Turns a long-form video (YouTube link, direct URL or upload) into short
//! vertical clips: the loudest moments or fixed intervals are cut,
//! optionally subtitled, recomposed over a background and exported per
//! platform. Jobs run asynchronously on a bounded worker pool and are
//! observed by polling.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
