use std::path::PathBuf;

/// Errors produced while extracting, synchronising, or synthesising tutor audio.
///
/// Only [`Error::Config`], [`Error::CorpusNotFound`] and [`Error::NoTemplates`]
/// abort a run. The remaining variants are raised per template or per key and
/// are absorbed into the [`RunSummary`](crate::pipeline::RunSummary).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Corpus not found at {}", .0.display())]
    CorpusNotFound(PathBuf),
    #[error("No tutor text found under {}", .0.display())]
    NoTemplates(PathBuf),
    #[error("Template {template:?} references undeclared parameter '{name}'")]
    MissingParameter { template: String, name: String },
    #[error("Synthesis failed: {0}")]
    Synthesis(String),
    #[error("Alignment unavailable: {0}")]
    Alignment(String),
}

pub type Result<T> = std::result::Result<T, Error>;
