//! Configuration module for jobcrawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so a run can be configured entirely from the
//! command line.
//!
//! # Example
//!
//! ```no_run
//! use jobcrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("jobcrawl.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, ExtractorConfig, OutputConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, parse_config, read_config, resolve_database_path};
pub use validation::validate;
