//! Ledger device session

use crate::core::errors::ScanError;

/// Ethereum app configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAppInfo {
    pub version: String,
    pub flags: u8,
}

impl LedgerAppInfo {
    /// Parses the `GET_APP_CONFIGURATION` payload: `flags || major || minor || patch`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ScanError> {
        match data {
            [flags, major, minor, patch, ..] => Ok(Self {
                version: format!("{}.{}.{}", major, minor, patch),
                flags: *flags,
            }),
            _ => Err(ScanError::Device("app configuration response incomplete".to_string())),
        }
    }
}

#[cfg(feature = "ledger")]
pub use session::LedgerDevice;

#[cfg(feature = "ledger")]
mod session {
    use super::LedgerAppInfo;
    use crate::core::errors::ScanError;
    use crate::hardware::ledger::apdu::{ApduClass, ApduCommand, ApduInstruction, ApduResponse};
    use crate::hardware::ledger::transport::LedgerTransport;
    use std::time::Duration;
    use tracing::info;

    /// An open Ledger device
    pub struct LedgerDevice {
        transport: LedgerTransport,
    }

    impl LedgerDevice {
        pub fn connect(timeout: Duration) -> Result<Self, ScanError> {
            let transport = LedgerTransport::open(timeout)?;
            Ok(Self { transport })
        }

        /// Queries the running app. Fails when the Ethereum app is not open.
        pub fn get_app_configuration(&self) -> Result<LedgerAppInfo, ScanError> {
            let command = ApduCommand::new(
                ApduClass::Standard,
                ApduInstruction::GetAppConfiguration,
                0x00,
                0x00,
                vec![],
            );

            let response = self.transport.exchange(&command)?.into_success("get app configuration")?;
            let info = LedgerAppInfo::from_bytes(&response.data)?;
            info!("Ethereum app v{}", info.version);
            Ok(info)
        }

        pub fn exchange(&self, command: &ApduCommand) -> Result<ApduResponse, ScanError> {
            self.transport.exchange(command)
        }
    }
}
