//! Error types for Parley.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Pattern record error ({path}): {reason}")]
    PatternRecord { path: PathBuf, reason: String },

    #[error("Knowledge record error ({path}): {reason}")]
    KnowledgeRecord { path: PathBuf, reason: String },

    #[error("Failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Fact store error: {0}")]
    Facts(String),

    #[error("Remote error: {0}")]
    Remote(#[from] crate::remote::RemoteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChatError {
    /// Short category label used in log lines and stats output.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Config(_) => "config",
            ChatError::PatternRecord { .. } => "pattern_record",
            ChatError::KnowledgeRecord { .. } => "knowledge_record",
            ChatError::Persist { .. } => "persist",
            ChatError::Facts(_) => "facts",
            ChatError::Remote(_) => "remote",
            ChatError::Io(_) => "io",
            ChatError::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
