use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("could not read scenario file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("scenario contains no agents")]
    EmptyScenario,

    #[error("not enough agents: need {requested} starting at index {start}, have {available}")]
    InsufficientAgents {
        requested: usize,
        start: usize,
        available: usize,
    },
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("could not write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not serialize run result: {0}")]
    Json(#[from] serde_json::Error),
}
