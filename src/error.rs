//! Error types for the ladon crate.
//!
//! Everything in here is either fatal at startup (rule loading, compilation,
//! workspace allocation, configuration) or a scan failure reported by the
//! engine. Per-request failures are folded into [`crate::QueryResult`] and
//! never reach clients as a `LadonError`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LadonError>;

#[derive(Debug, Error)]
pub enum LadonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Empty rule set: no valid rule lines found")]
    EmptyRuleSet,

    #[error("Invalid rule id {value:?} on line {line}")]
    InvalidRuleId { line: usize, value: String },

    #[error("Compilation error in rule {rule_id}: {message}")]
    Compile { rule_id: u32, message: String },

    #[error("Database build error: {0}")]
    Database(String),

    #[error("Unknown compile flag '{0}'")]
    InvalidFlag(char),

    #[error("Workspace allocation failed: {0}")]
    ScratchAlloc(String),

    #[error("Scan error: {0}")]
    Scan(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl LadonError {
    /// True for the errors that abort process startup.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LadonError::Scan(_))
    }
}
