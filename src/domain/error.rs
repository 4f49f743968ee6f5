// Workbench error taxonomy
use super::access::Capability;
use thiserror::Error;

pub type WorkbenchResult<T> = std::result::Result<T, WorkbenchError>;

#[derive(Debug, Error)]
pub enum WorkbenchError {
    /// A required connection parameter is missing; nothing was attempted.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("capability denied: {} required", .0.as_str())]
    CapabilityDenied(Capability),

    #[error("invalid input: {0}")]
    Validation(String),

    /// The remote call succeeded but produced nothing usable.
    #[error("empty result: {0}")]
    EmptyResult(String),

    #[error("transport error: {0:#}")]
    Transport(#[from] anyhow::Error),
}
