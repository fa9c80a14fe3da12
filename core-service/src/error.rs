use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] core_cache::CacheError),
}

impl From<bridge_traits::error::BridgeError> for CoreError {
    fn from(err: bridge_traits::error::BridgeError) -> Self {
        CoreError::InitializationFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
