//! Axum gateway for the attention pipeline.
//!
//! This crate provides:
//! - Frame ingestion over HTTP and WebSocket
//! - Live per-meeting attention updates and alerts over WebSocket
//! - Health and Prometheus metrics endpoints

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
