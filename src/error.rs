use scrivener_xslt::{ExecutionError, XsltError};
use thiserror::Error;

/// Errors surfaced by the facade and the command line tool.
#[derive(Error, Debug)]
pub enum ScrivenerError {
    #[error(transparent)]
    Xslt(#[from] XsltError),

    #[error("Execution failed: {0}")]
    Execution(#[from] ExecutionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Scheduled call failed to complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}
