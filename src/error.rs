//! Error types for the compile bridge
//!
//! Load and boot failures reject the call (and every caller sharing the same
//! attempt). A module that runs and exits non-zero is not an error here; that
//! is encoded in the compile result.

use std::fmt;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors surfaced to callers of `init` and `compile`
///
/// `Clone` so one shared in-flight load or boot can hand the same failure to
/// every waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Artifact fetch failed, returned a non-success status, or the bytes
    /// were not an acceptable module
    Load { reason: String },

    /// Instantiation failed or the module never came up
    Boot { reason: String },

    /// Resident entry point used before readiness was established
    Unavailable,

    /// The command line could not be split into arguments
    InvalidCommand { reason: String },

    /// The request's file map could not be written to the volume (for
    /// example a file and a directory at the same path)
    InvalidFiles { reason: String },

    /// The module handed back a payload we could not decode
    Protocol { reason: String },
}

impl BridgeError {
    pub fn load(reason: impl Into<String>) -> Self {
        Self::Load {
            reason: reason.into(),
        }
    }

    pub fn boot(reason: impl Into<String>) -> Self {
        Self::Boot {
            reason: reason.into(),
        }
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    /// Error class name, carried as `name` on RPC error payloads
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load { .. } => "LoadError",
            Self::Boot { .. } => "BootError",
            Self::Unavailable => "UnavailableError",
            Self::InvalidCommand { .. } | Self::InvalidFiles { .. } => "TypeError",
            Self::Protocol { .. } => "ProtocolError",
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { reason } => write!(f, "failed to load module: {}", reason),
            Self::Boot { reason } => write!(f, "failed to boot module: {}", reason),
            Self::Unavailable => write!(f, "compile entry point is not available"),
            Self::InvalidCommand { reason } => write!(f, "invalid command: {}", reason),
            Self::InvalidFiles { reason } => write!(f, "invalid file map: {}", reason),
            Self::Protocol { reason } => write!(f, "malformed module response: {}", reason),
        }
    }
}

impl std::error::Error for BridgeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::load("HTTP 404");
        assert_eq!(err.to_string(), "failed to load module: HTTP 404");

        let err = BridgeError::Unavailable;
        assert_eq!(err.to_string(), "compile entry point is not available");

        let err = BridgeError::InvalidCommand {
            reason: "unterminated \" quote".to_string(),
        };
        assert!(err.to_string().contains("unterminated"));
        assert_eq!(err.name(), "TypeError");
    }

    #[test]
    fn test_error_names() {
        assert_eq!(BridgeError::load("x").name(), "LoadError");
        assert_eq!(BridgeError::boot("x").name(), "BootError");
        assert_eq!(BridgeError::Unavailable.name(), "UnavailableError");
    }
}
