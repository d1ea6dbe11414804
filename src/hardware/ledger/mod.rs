//! Ledger hardware wallet integration
//!
//! APDU encoding, HID framing and response parsing are plain code; only the HID session
//! itself needs the `ledger` feature.

pub mod apdu;
pub mod device;
pub mod ethereum_app;
pub mod path;
pub mod transport;

#[cfg(feature = "ledger")]
pub use device::LedgerDevice;
#[cfg(feature = "ledger")]
pub use ethereum_app::LedgerEthereumApp;
#[cfg(feature = "ledger")]
pub use transport::LedgerTransport;
