//! Hardware key source
//!
//! The scanner only needs two things from a device: an extended public key for a
//! path-prefix, and a single address for a full path.

pub mod ledger;

use crate::core::errors::ScanError;
use crate::crypto::derivation::ExtendedPublicKey;
use std::time::Duration;

/// A device that derives keys for concrete (token-free) paths.
///
/// Calls are blocking and strictly sequential.
pub trait HardwareKeySource {
    /// Public key and chain code at `path`.
    fn get_extended_public_key(&mut self, path: &str) -> Result<ExtendedPublicKey, ScanError>;

    /// Checksummed address at `path`.
    fn get_address(&mut self, path: &str) -> Result<String, ScanError>;
}

impl<T: HardwareKeySource + ?Sized> HardwareKeySource for Box<T> {
    fn get_extended_public_key(&mut self, path: &str) -> Result<ExtendedPublicKey, ScanError> {
        (**self).get_extended_public_key(path)
    }

    fn get_address(&mut self, path: &str) -> Result<String, ScanError> {
        (**self).get_address(path)
    }
}

/// Opens the Ledger Ethereum app.
#[cfg(feature = "ledger")]
pub fn connect_ledger(timeout: Duration) -> Result<Box<dyn HardwareKeySource>, ScanError> {
    Ok(Box::new(ledger::LedgerEthereumApp::connect(timeout)?))
}

/// Opens the Ledger Ethereum app. This build has no HID support.
#[cfg(not(feature = "ledger"))]
pub fn connect_ledger(_timeout: Duration) -> Result<Box<dyn HardwareKeySource>, ScanError> {
    Err(ScanError::bindings_missing())
}
