//! Configuration for the terrain engine.
//!
//! Runtime-configurable settings persisted to disk as RON, with CLI
//! overrides via clap. Every tuning constant the LOD core consults is a
//! named field here with a conservative default.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, FormationConfig, LodConfig};
pub use error::ConfigError;
