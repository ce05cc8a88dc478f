//! Error: facade error taxonomy.

use thiserror::Error;

use crate::exec::ExecutionError;

/// Output from the runtime could not be turned into a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to parse {what}: {reason}")]
pub struct ParseError {
    pub what: &'static str,
    pub reason: String,
}

impl ParseError {
    pub fn new(what: &'static str, reason: impl Into<String>) -> Self {
        Self {
            what,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DockerError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl From<bollard::errors::Error> for DockerError {
    fn from(err: bollard::errors::Error) -> Self {
        DockerError::Execution(ExecutionError::new(err.to_string()))
    }
}

/// Map a bollard error for a call against `container_id`, folding 404 into
/// the same text the Docker CLI prints.
pub(crate) fn container_error(container_id: &str, err: bollard::errors::Error) -> DockerError {
    match err {
        bollard::errors::Error::DockerResponseServerError { status_code: 404, .. } => {
            DockerError::Execution(ExecutionError::new(format!(
                "No such container: {}",
                container_id
            )))
        }
        other => DockerError::from(other),
    }
}
