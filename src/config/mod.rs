//! Configuration module for MC Runner.
//!
//! This module handles parsing, validation, and access to configuration
//! settings for managed servers. Configurations load from JSON or YAML files,
//! or from strings.
//!
//! # Examples
//!
//! Loading a configuration from a file:
//!
//! ```no_run
//! use mc_runner::config::Config;
//!
//! let config = Config::from_file("config.json").unwrap();
//! println!("Loaded configuration with {} servers", config.servers.len());
//! ```
//!
//! Creating a configuration programmatically:
//!
//! ```
//! use mc_runner::config::{validate_config, Config, ServerConfig};
//!
//! let config = Config::with_servers(vec![ServerConfig {
//!     name: "Survival".to_string(),
//!     directory: "/srv/mc/survival".into(),
//!     public: true,
//! }]);
//! validate_config(&config).unwrap();
//! ```
mod parser;
pub mod validator;

pub use parser::{
    Config, RestartPolicy, ServerConfig, StatusConfig, SupervisorConfig,
    DEFAULT_ENTRY_POINT, DEFAULT_MAX_RUNNING_PUBLIC, DEFAULT_PROBE_TIMEOUT_MS,
    DEFAULT_READY_MARKER, DEFAULT_SHUTDOWN_COMMAND, DEFAULT_STATUS_HOST,
};
pub use validator::validate_config;
