pub mod toml_config;

pub use toml_config::{BatchConfig, ConsoleConfig, LoggingConfig, ServiceConfig, SessionConfig};
