//! Ledger HID transport
//!
//! APDUs are split into 64-byte HID reports carrying a channel id, a tag and a sequence
//! number; the first report of a message also carries the total length.

use super::apdu::{ApduCommand, ApduResponse};
use crate::core::errors::ScanError;

/// Ledger USB parameters
pub const LEDGER_VENDOR_ID: u16 = 0x2C97;
pub const LEDGER_USAGE_PAGE: u16 = 0xFFA0;

/// HID report size
const HID_PACKET_SIZE: usize = 64;

/// APDU channel
const CHANNEL: u16 = 0x0101;

/// HID command tag
const TAG_APDU: u8 = 0x05;

/// Upper bound on reports per response
const MAX_RESPONSE_PACKETS: u16 = 100;

/// Splits an APDU into HID reports, each prefixed with report id 0.
pub(crate) fn build_hid_packets(apdu: &[u8]) -> Vec<Vec<u8>> {
    let mut packets = Vec::new();
    let total_len = apdu.len();
    let mut offset = 0;
    let mut sequence = 0u16;

    while offset < total_len || sequence == 0 {
        let mut packet = vec![0u8; HID_PACKET_SIZE + 1]; // +1 for report ID
        packet[1..3].copy_from_slice(&CHANNEL.to_be_bytes());
        packet[3] = TAG_APDU;
        packet[4..6].copy_from_slice(&sequence.to_be_bytes());

        let data_start = if sequence == 0 {
            packet[6..8].copy_from_slice(&(total_len as u16).to_be_bytes());
            8
        } else {
            6
        };
        let chunk_size = (HID_PACKET_SIZE + 1 - data_start).min(total_len - offset);
        packet[data_start..data_start + chunk_size].copy_from_slice(&apdu[offset..offset + chunk_size]);
        offset += chunk_size;

        packets.push(packet);
        sequence += 1;
    }

    packets
}

/// Reassembles a response from HID reports (without report id).
#[derive(Debug, Default)]
pub(crate) struct ResponseAssembler {
    data: Vec<u8>,
    sequence: u16,
    total_len: Option<usize>,
}

impl ResponseAssembler {
    /// Feeds one report. Returns the complete payload once all bytes have arrived.
    /// Reports on foreign channels or with another tag are ignored.
    pub(crate) fn push(&mut self, packet: &[u8]) -> Result<Option<Vec<u8>>, ScanError> {
        if packet.len() < 5 {
            return Err(ScanError::Device(format!("HID report too short: {} bytes", packet.len())));
        }
        if u16::from_be_bytes([packet[0], packet[1]]) != CHANNEL || packet[2] != TAG_APDU {
            return Ok(None);
        }

        let seq = u16::from_be_bytes([packet[3], packet[4]]);
        if seq != self.sequence {
            return Err(ScanError::Device(format!(
                "HID sequence mismatch: expected {}, got {}",
                self.sequence, seq
            )));
        }

        if seq == 0 {
            if packet.len() < 7 {
                return Err(ScanError::Device("HID report missing length header".to_string()));
            }
            self.total_len = Some(u16::from_be_bytes([packet[5], packet[6]]) as usize);
            self.data.extend_from_slice(&packet[7..]);
        } else {
            self.data.extend_from_slice(&packet[5..]);
        }

        if let Some(len) = self.total_len {
            if self.data.len() >= len {
                let mut data = std::mem::take(&mut self.data);
                data.truncate(len);
                return Ok(Some(data));
            }
        }

        self.sequence += 1;
        if self.sequence > MAX_RESPONSE_PACKETS {
            return Err(ScanError::Device("too many HID reports in response".to_string()));
        }
        Ok(None)
    }
}

#[cfg(feature = "ledger")]
pub use hid::LedgerTransport;

#[cfg(feature = "ledger")]
mod hid {
    use super::*;
    use hidapi::{HidApi, HidDevice};
    use std::time::Duration;
    use tracing::{debug, info, warn};

    /// Ledger HID transport
    pub struct LedgerTransport {
        device: HidDevice,
        timeout: Duration,
    }

    impl LedgerTransport {
        /// Opens the first Ledger found on the bus.
        pub fn open(timeout: Duration) -> Result<Self, ScanError> {
            info!("Connecting to Ledger device...");

            let api = HidApi::new()
                .map_err(|e| ScanError::device_unavailable(format!("HID API initialization failed: {}", e)))?;

            let device_info = api
                .device_list()
                .filter(|d| d.vendor_id() == LEDGER_VENDOR_ID)
                .find(|d| d.usage_page() == LEDGER_USAGE_PAGE)
                .ok_or_else(|| ScanError::device_unavailable("no Ledger device found"))?;

            let device = device_info
                .open_device(&api)
                .map_err(|e| ScanError::device_unavailable(format!("cannot open Ledger device: {}", e)))?;

            if let Some(product) = device_info.product_string() {
                info!("Connected to {}", product);
            }

            Ok(Self { device, timeout })
        }

        /// Sends an APDU and waits for the response.
        pub fn exchange(&self, command: &ApduCommand) -> Result<ApduResponse, ScanError> {
            debug!("Sending APDU: CLA={:02X} INS={:02X}", command.cla, command.ins);

            let packets = build_hid_packets(&command.to_bytes()?);
            for (i, packet) in packets.iter().enumerate() {
                debug!("Writing HID report {}/{}", i + 1, packets.len());
                self.device
                    .write(packet)
                    .map_err(|e| ScanError::Device(format!("HID write failed: {}", e)))?;
            }

            let response = ApduResponse::from_bytes(&self.receive_response()?)?;
            if !response.is_success() {
                warn!(
                    "APDU failed: {:04X} - {}",
                    response.status_code(),
                    response.error_description()
                );
            }
            Ok(response)
        }

        fn receive_response(&self) -> Result<Vec<u8>, ScanError> {
            let mut assembler = ResponseAssembler::default();
            let timeout_ms = i32::try_from(self.timeout.as_millis()).unwrap_or(i32::MAX);

            loop {
                let mut packet = [0u8; HID_PACKET_SIZE];
                let read_len = self
                    .device
                    .read_timeout(&mut packet, timeout_ms)
                    .map_err(|e| ScanError::Device(format!("HID read failed: {}", e)))?;

                if read_len == 0 {
                    return Err(ScanError::Device(format!(
                        "timed out after {:?} waiting for the device (confirm on screen?)",
                        self.timeout
                    )));
                }

                if let Some(data) = assembler.push(&packet[..read_len])? {
                    return Ok(data);
                }
            }
        }
    }
}
