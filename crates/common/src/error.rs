//! Error types shared across capshare crates.

/// Opaque failure reported by the extension bridge or the install flow.
///
/// The core never interprets the reason; it is handed to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct BridgeError {
    reason: String,
}

impl BridgeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The reason exactly as the bridge reported it.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Result type for bridge round trips.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Top-level error type for capshare operations.
#[derive(Debug, thiserror::Error)]
pub enum CapshareError {
    /// No acquisition strategy applies to the current environment.
    #[error("Unsupported: {message}")]
    Unsupported { message: String },

    /// The auto-install fallback ran but capture is still unavailable.
    #[error("Install failed: {message}")]
    InstallFailed { message: String },

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CapshareError.
pub type CapshareResult<T> = Result<T, CapshareError>;

impl CapshareError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    pub fn install_failed(msg: impl Into<String>) -> Self {
        Self::InstallFailed {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    pub fn is_install_failed(&self) -> bool {
        matches!(self, Self::InstallFailed { .. })
    }

    /// The bridge failure carried by this error, if any.
    pub fn as_bridge(&self) -> Option<&BridgeError> {
        match self {
            Self::Bridge(err) => Some(err),
            _ => None,
        }
    }
}
