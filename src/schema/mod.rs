//! Schema module - Configuration types for encoding and playback.

mod config;

pub use config::*;
