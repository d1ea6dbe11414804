//! APDU (Application Protocol Data Unit) encoding for the Ledger Ethereum app

use crate::core::errors::ScanError;
use tracing::debug;

/// APDU class byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ApduClass {
    /// Standard CLA (0xE0 for all Ledger apps)
    Standard = 0xE0,
}

/// APDU instruction byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ApduInstruction {
    /// Ethereum app: public key, address and optionally the chain code for a path
    GetEthPublicAddress = 0x02,
    /// Ethereum app: flags and version
    GetAppConfiguration = 0x06,
}

/// P1 for `GetEthPublicAddress`: return without on-screen confirmation
pub const P1_NO_DISPLAY: u8 = 0x00;
/// P2 for `GetEthPublicAddress`: do not return the chain code
pub const P2_NO_CHAIN_CODE: u8 = 0x00;
/// P2 for `GetEthPublicAddress`: append the chain code to the response
pub const P2_CHAIN_CODE: u8 = 0x01;

/// APDU command
#[derive(Debug, Clone)]
pub struct ApduCommand {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Vec<u8>,
}

impl ApduCommand {
    pub fn new(cla: ApduClass, ins: ApduInstruction, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self {
            cla: cla as u8,
            ins: ins as u8,
            p1,
            p2,
            data,
        }
    }

    /// Serializes to `CLA INS P1 P2 Lc data`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ScanError> {
        let lc = u8::try_from(self.data.len()).map_err(|_| {
            ScanError::Device(format!("APDU payload too long: {} bytes", self.data.len()))
        })?;

        let mut bytes = Vec::with_capacity(5 + self.data.len());
        bytes.push(self.cla);
        bytes.push(self.ins);
        bytes.push(self.p1);
        bytes.push(self.p2);
        bytes.push(lc);
        bytes.extend_from_slice(&self.data);

        debug!(
            "APDU command: CLA={:02X} INS={:02X} P1={:02X} P2={:02X} Len={}",
            self.cla, self.ins, self.p1, self.p2, self.data.len()
        );

        Ok(bytes)
    }
}

/// APDU response
#[derive(Debug, Clone)]
pub struct ApduResponse {
    pub data: Vec<u8>,
    pub sw1: u8,
    pub sw2: u8,
}

impl ApduResponse {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ScanError> {
        if bytes.len() < 2 {
            return Err(ScanError::Device("APDU response too short".to_string()));
        }

        let len = bytes.len();
        let sw1 = bytes[len - 2];
        let sw2 = bytes[len - 1];
        let data = bytes[..len - 2].to_vec();

        debug!("APDU response: SW1={:02X} SW2={:02X} DataLen={}", sw1, sw2, data.len());

        Ok(Self { data, sw1, sw2 })
    }

    pub fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    pub fn status_code(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    pub fn error_description(&self) -> String {
        match (self.sw1, self.sw2) {
            (0x90, 0x00) => "success".to_string(),
            (0x55, 0x15) => "device is locked".to_string(),
            (0x69, 0x82) => "security status not satisfied".to_string(),
            (0x69, 0x85) => "conditions of use not satisfied (request rejected?)".to_string(),
            (0x6A, 0x80) => "invalid data".to_string(),
            (0x6A, 0x82) => "file not found".to_string(),
            (0x6B, 0x00) => "incorrect parameters".to_string(),
            (0x6D, 0x00) => "instruction not supported (is the Ethereum app open?)".to_string(),
            (0x6E, 0x00) => "class not supported (is the Ethereum app open?)".to_string(),
            (0x67, 0x00) => "wrong data length".to_string(),
            (0x6F, 0x00) => "unknown error".to_string(),
            _ => format!("unknown status: {:04X}", self.status_code()),
        }
    }

    /// Turns a non-success status into a `Device` error.
    pub fn into_success(self, context: &str) -> Result<Self, ScanError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ScanError::Device(format!(
                "{} failed: {} ({:04X})",
                context,
                self.error_description(),
                self.status_code()
            )))
        }
    }
}
