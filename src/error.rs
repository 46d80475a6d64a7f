// src/error.rs
use std::io;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, AgentError>;

/// Custom Error type for the hostgauge library
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl AgentError {
    /// Build a config error for an option whose value has the wrong shape
    pub fn invalid_option(option: &str, expected: &str, found: impl std::fmt::Display) -> Self {
        AgentError::Config(format!(
            "option '{}' expects {}, found '{}'",
            option, expected, found
        ))
    }
}
