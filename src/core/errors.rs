//! Error taxonomy for the scanner.
//!
//! Input errors (`InvalidTemplate`, `InvalidAxisCount`) are raised before any device or
//! network call. Everything else is fatal for the running operation.

use std::path::PathBuf;
use thiserror::Error;

/// Remediation text shown when the HID layer cannot reach a device.
pub const DEVICE_REMEDIATION: &str = "Make sure the Ledger is connected, unlocked and the Ethereum app is open. \
On Linux the Ledger udev rules and the hidapi system library must be installed.";

/// Remediation text shown when the binary was built without HID support.
pub const BINDINGS_REMEDIATION: &str =
    "This build has no hardware support. Rebuild with `--features ledger` to talk to a Ledger device.";

#[derive(Debug, Error)]
pub enum ScanError {
    /// The template is missing its innermost axis or cannot be derived.
    #[error("{0}")]
    InvalidTemplate(String),

    /// A present axis was given a count of zero.
    #[error("Invalid {axis} count")]
    InvalidAxisCount { axis: String },

    /// The transport to the device could not be established.
    #[error("Ledger device unavailable: {reason}. {remediation}")]
    DeviceUnavailable { reason: String, remediation: String },

    /// The device answered with a non-success status or a malformed payload.
    #[error("Device error: {0}")]
    Device(String),

    #[error("Device response for {path} did not include a valid chain code")]
    InvalidChainCode { path: String },

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Failed to fetch balance for {address}: {reason}")]
    BalanceFetchFailed { address: String, reason: String },

    #[error("Output file already exists: {}", .0.display())]
    OutputAlreadyExists(PathBuf),

    /// A CSV input file could not be parsed.
    #[error("Invalid input {}: {reason}", path.display())]
    InvalidInput { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScanError {
    pub fn device_unavailable(reason: impl Into<String>) -> Self {
        ScanError::DeviceUnavailable {
            reason: reason.into(),
            remediation: DEVICE_REMEDIATION.to_string(),
        }
    }

    pub fn bindings_missing() -> Self {
        ScanError::DeviceUnavailable {
            reason: "HID bindings are not compiled in".to_string(),
            remediation: BINDINGS_REMEDIATION.to_string(),
        }
    }

    /// Errors caused by bad user input, detected before touching the device or network.
    pub fn is_input_error(&self) -> bool {
        matches!(self, ScanError::InvalidTemplate(_) | ScanError::InvalidAxisCount { .. })
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScanError::BalanceFetchFailed { .. })
    }
}
