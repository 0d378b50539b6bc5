// Error taxonomy for the GATT bridge.
//
// Facade calls never raise these: they report drops through `Dispatch`.
// Lifecycle, configuration and codec entry points return `Result<_, BridgeError>`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Bridge not initialized")]
    NotInitialized,
    #[error("Malformed device address: {0:?}")]
    MalformedAddress(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid attribute row {index}: {reason}")]
    InvalidRow { index: usize, reason: String },
    #[error("Value too long: {len} bytes (max {max})")]
    ValueTooLong { len: usize, max: usize },
    #[error("Stack rejected request with status {0}")]
    StackRejected(i32),
    #[error("Event dropped: no delivery sink installed")]
    Dropped,
    #[error("Pending request cancelled")]
    Cancelled,
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<anyhow::Error> for BridgeError {
    fn from(err: anyhow::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::ValueTooLong { len: 601, max: 600 };
        assert_eq!(err.to_string(), "Value too long: 601 bytes (max 600)");

        let err = BridgeError::MalformedAddress("AA:BB".to_string());
        assert!(err.to_string().contains("AA:BB"));
    }

    #[test]
    fn test_error_from_anyhow() {
        let err: BridgeError = anyhow::anyhow!("bad file").into();
        assert_eq!(err, BridgeError::Config("bad file".to_string()));
    }
}
