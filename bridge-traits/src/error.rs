use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns `true` when the failure came from the network rather than local storage.
    pub fn is_network(&self) -> bool {
        matches!(self, BridgeError::NetworkUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
