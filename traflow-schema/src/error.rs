use std::path::PathBuf;
use thiserror::Error;
use traflow_core::TraflowError;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("IO error on path `{path}`: {error}")]
    IO { path: PathBuf, error: std::io::Error },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("diagram `{name}` is invalid: {error}")]
    InvalidDiagram { name: String, error: TraflowError },
    #[error("diagram `{0}` defines both a backward wave speed and a capacity")]
    OverdeterminedDiagram(String),
    #[error("diagram with name {0} not found")]
    DiagramNotFound(String),
    #[error("node `{name}` is invalid: {error}")]
    InvalidNode { name: String, error: TraflowError },
    #[error("node `{name}` could not be solved: {error}")]
    NodeSolve { name: String, error: TraflowError },
    #[error("{kind} name `{name}` already exists")]
    DuplicateName { kind: &'static str, name: String },
    #[error("traflow core error: {0}")]
    TraflowCore(#[from] TraflowError),
}
