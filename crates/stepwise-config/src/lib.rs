//! Configuration management for stepwise.
//!
//! Loads and saves `.stepwise/config.yaml` and discovers the `.stepwise/`
//! directory in the filesystem.

pub mod config;
pub mod stepwise_dir;

pub use config::{ConfigError, StepwiseConfig, load_config, save_config};
pub use stepwise_dir::{ensure_stepwise_dir, find_stepwise_dir, find_stepwise_dir_or_error};
