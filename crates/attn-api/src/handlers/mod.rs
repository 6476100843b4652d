//! HTTP handlers.

pub mod frames;
pub mod health;

pub use frames::submit_frame;
pub use health::health;
