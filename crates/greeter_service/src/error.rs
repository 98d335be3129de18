//! Error types for the hello service.

use greeter_core::CoreError;
use thiserror::Error;

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors returned to service callers.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The request is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The service has not been initialized, failed to initialize, or has
    /// shut down.
    #[error("service not ready: {0}")]
    NotReady(String),

    /// The registry cannot serve requests until the pipeline is reset.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// An administrative commit was not acknowledged in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Registry error.
    #[error("registry error: {0}")]
    Registry(#[source] CoreError),
}

impl ServiceError {
    /// Returns true if the caller is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ServiceError::InvalidRequest(_))
    }

    /// Returns true if the service is at fault.
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidName | CoreError::KeyMismatch { .. } => {
                ServiceError::InvalidRequest(err.to_string())
            }
            CoreError::ChainBroken { .. } | CoreError::PipelineClosed => {
                ServiceError::Unavailable(err.to_string())
            }
            CoreError::CommitTimeout { .. } => ServiceError::Timeout(err.to_string()),
            other => ServiceError::Registry(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greeter_core::TransactionId;
    use std::time::Duration;

    #[test]
    fn error_classification() {
        assert!(ServiceError::InvalidRequest("empty name".into()).is_client_error());
        assert!(ServiceError::NotReady("uninitialized".into()).is_server_error());
        assert!(!ServiceError::InvalidRequest("bad".into()).is_server_error());
    }

    #[test]
    fn core_errors_mapped() {
        assert!(matches!(
            ServiceError::from(CoreError::InvalidName),
            ServiceError::InvalidRequest(_)
        ));
        assert!(matches!(
            ServiceError::from(CoreError::ChainBroken {
                txid: None,
                cause: "closed".into()
            }),
            ServiceError::Unavailable(_)
        ));
        assert!(matches!(
            ServiceError::from(CoreError::PipelineClosed),
            ServiceError::Unavailable(_)
        ));
        assert!(matches!(
            ServiceError::from(CoreError::CommitTimeout {
                txid: TransactionId::new(1),
                waited: Duration::from_secs(1)
            }),
            ServiceError::Timeout(_)
        ));
        assert!(matches!(
            ServiceError::from(CoreError::StoreClosed),
            ServiceError::Registry(CoreError::StoreClosed)
        ));
    }
}
