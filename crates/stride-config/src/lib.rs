//! Configuration system for the stride movement core.
//!
//! Provides runtime-configurable settings that persist to disk as RON files.
//! The movement tuning surface (wall repulsion, walkable slope, correction
//! tolerance) lives here so that client and server read identical values.

mod config;
mod error;

pub use config::{Config, DebugConfig, MovementConfig, NetworkConfig, PredictionConfig};
pub use error::ConfigError;
