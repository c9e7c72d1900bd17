use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Cannot build an index from an empty document batch")]
    EmptyDocumentSet,

    #[error("Index not loaded; build the index first")]
    IndexNotLoaded,

    #[error("session_id is required and must be non-empty")]
    InvalidSession,

    #[error("question is required and must be non-empty")]
    InvalidQuestion,

    #[error("Embedding backend error: {0}")]
    EmbeddingBackend(String),

    #[error("Generation backend error: {0}")]
    GenerationBackend(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod engine;
pub mod generation;
pub mod index;
pub mod prompt;
pub mod server;
pub mod session;
pub mod store;
