//! Decline Configuration Module
//!
//! Provides fitting, conditioning, validation and per-product settings loaded
//! from TOML files, replacing hardcoded constants with operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `DECLINE_CONFIG` environment variable (path to TOML file)
//! 2. `decline_config.toml` in the current working directory
//! 3. Built-in defaults (see `defaults`)
//!
//! ## Usage
//!
//! Load once and pass by reference; fits running in parallel share it
//! read-only:
//!
//! ```ignore
//! let config = DeclineConfig::load();
//! let report = DeclinePipeline::new(&config).run_batch(&wells);
//! ```

mod decline_config;
pub mod defaults;
pub mod validation;

pub use decline_config::*;
