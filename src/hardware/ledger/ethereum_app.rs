//! Ledger Ethereum app: `GET_ETH_PUBLIC_ADDRESS`

use super::path::Bip32Path;
use crate::core::errors::ScanError;
use crate::crypto::derivation::{to_checksum_address, CHAIN_CODE_LEN};

/// Parsed `GET_ETH_PUBLIC_ADDRESS` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthAddressResponse {
    pub public_key: Vec<u8>,
    /// Checksummed, `0x`-prefixed
    pub address: String,
    pub chain_code: Option<[u8; CHAIN_CODE_LEN]>,
}

impl EthAddressResponse {
    /// Layout: `pk_len || pk || addr_len || addr (ASCII hex, no 0x) || chain_code?`
    pub fn from_bytes(data: &[u8]) -> Result<Self, ScanError> {
        let incomplete = || ScanError::Device("address response incomplete".to_string());

        let pk_len = *data.first().ok_or_else(incomplete)? as usize;
        let public_key = data.get(1..1 + pk_len).ok_or_else(incomplete)?.to_vec();

        let mut offset = 1 + pk_len;
        let addr_len = *data.get(offset).ok_or_else(incomplete)? as usize;
        offset += 1;
        let raw_address = data.get(offset..offset + addr_len).ok_or_else(incomplete)?;
        offset += addr_len;

        let address = std::str::from_utf8(raw_address)
            .map_err(|_| ScanError::Device("address is not ASCII".to_string()))?;

        let chain_code = data
            .get(offset..offset + CHAIN_CODE_LEN)
            .and_then(|cc| <[u8; CHAIN_CODE_LEN]>::try_from(cc).ok());

        Ok(Self {
            public_key,
            address: to_checksum_address(address),
            chain_code,
        })
    }
}

/// APDU payload for a path.
pub fn address_request_payload(path: &str) -> Result<Vec<u8>, ScanError> {
    let path: Bip32Path = path.parse()?;
    Ok(path.to_bytes())
}

#[cfg(feature = "ledger")]
pub use app::LedgerEthereumApp;

#[cfg(feature = "ledger")]
mod app {
    use super::*;
    use crate::crypto::derivation::ExtendedPublicKey;
    use crate::hardware::ledger::apdu::{
        ApduClass, ApduCommand, ApduInstruction, P1_NO_DISPLAY, P2_CHAIN_CODE, P2_NO_CHAIN_CODE,
    };
    use crate::hardware::ledger::device::LedgerDevice;
    use crate::hardware::HardwareKeySource;
    use std::time::Duration;
    use tracing::debug;

    /// Ledger Ethereum app
    pub struct LedgerEthereumApp {
        device: LedgerDevice,
    }

    impl LedgerEthereumApp {
        pub fn new(device: LedgerDevice) -> Self {
            Self { device }
        }

        /// Connects and checks that the Ethereum app answers.
        pub fn connect(timeout: Duration) -> Result<Self, ScanError> {
            let device = LedgerDevice::connect(timeout)?;
            device.get_app_configuration()?;
            Ok(Self::new(device))
        }

        fn get_public_address(&self, path: &str, chain_code: bool) -> Result<EthAddressResponse, ScanError> {
            debug!("Requesting public key for {}", path);

            let p2 = if chain_code { P2_CHAIN_CODE } else { P2_NO_CHAIN_CODE };
            let command = ApduCommand::new(
                ApduClass::Standard,
                ApduInstruction::GetEthPublicAddress,
                P1_NO_DISPLAY,
                p2,
                address_request_payload(path)?,
            );

            let response = self.device.exchange(&command)?.into_success("get public address")?;
            EthAddressResponse::from_bytes(&response.data)
        }
    }

    impl HardwareKeySource for LedgerEthereumApp {
        fn get_extended_public_key(&mut self, path: &str) -> Result<ExtendedPublicKey, ScanError> {
            let response = self.get_public_address(path, true)?;
            let chain_code = response
                .chain_code
                .ok_or_else(|| ScanError::InvalidChainCode { path: path.to_string() })?;
            ExtendedPublicKey::from_parts(&response.public_key, &chain_code)
        }

        fn get_address(&mut self, path: &str) -> Result<String, ScanError> {
            Ok(self.get_public_address(path, false)?.address)
        }
    }
}
