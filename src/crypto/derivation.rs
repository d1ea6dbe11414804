//! Software-side BIP32 public derivation
//!
//! The device hands out one extended public key per path-prefix. Every address below it
//! is derived here with non-hardened `CKDpub`, so no further device round-trips are
//! needed for the innermost axis.

use crate::core::errors::ScanError;
use crate::core::path_template::AxisRange;
use hmac::{Hmac, Mac};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, ProjectivePoint, PublicKey, Scalar};
use sha2::Sha512;
use sha3::{Digest, Keccak256};
use std::fmt;
use tracing::debug;

type HmacSha512 = Hmac<Sha512>;

/// First hardened child index.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

pub const CHAIN_CODE_LEN: usize = 32;

/// Public key plus chain code of one path-prefix.
///
/// Together they allow computing every non-hardened child address, so they are only
/// written out on an explicit export.
#[derive(Clone, PartialEq, Eq)]
pub struct ExtendedPublicKey {
    public_key: PublicKey,
    chain_code: [u8; CHAIN_CODE_LEN],
}

impl ExtendedPublicKey {
    /// Builds a key from SEC1 bytes (compressed or uncompressed) and a 32-byte chain code.
    pub fn from_parts(public_key: &[u8], chain_code: &[u8]) -> Result<Self, ScanError> {
        let public_key = PublicKey::from_sec1_bytes(public_key)
            .map_err(|e| ScanError::KeyDerivationFailed(format!("invalid public key: {}", e)))?;
        let chain_code: [u8; CHAIN_CODE_LEN] = chain_code.try_into().map_err(|_| {
            ScanError::KeyDerivationFailed(format!(
                "chain code must be {} bytes, got {}",
                CHAIN_CODE_LEN,
                chain_code.len()
            ))
        })?;
        Ok(Self { public_key, chain_code })
    }

    /// Parses hex-encoded parts, with or without `0x` prefixes.
    pub fn from_hex(public_key: &str, chain_code: &str) -> Result<Self, ScanError> {
        let pk = hex::decode(strip_0x(public_key))
            .map_err(|e| ScanError::KeyDerivationFailed(format!("invalid public key hex: {}", e)))?;
        let cc = hex::decode(strip_0x(chain_code))
            .map_err(|e| ScanError::KeyDerivationFailed(format!("invalid chain code hex: {}", e)))?;
        Self::from_parts(&pk, &cc)
    }

    /// Uncompressed SEC1 encoding, the form the Ledger Ethereum app returns.
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public_key.to_encoded_point(false).as_bytes().to_vec()
    }

    pub fn chain_code(&self) -> &[u8; CHAIN_CODE_LEN] {
        &self.chain_code
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key_bytes())
    }

    pub fn chain_code_hex(&self) -> String {
        hex::encode(self.chain_code)
    }

    /// Non-hardened child public key at `index` (BIP32 `CKDpub`).
    pub fn derive_child(&self, index: u32) -> Result<PublicKey, ScanError> {
        if index >= HARDENED_OFFSET {
            return Err(ScanError::KeyDerivationFailed(format!(
                "index {} is hardened and cannot be derived from a public key",
                index
            )));
        }

        let parent = self.public_key.to_encoded_point(true);
        let mut mac = HmacSha512::new_from_slice(&self.chain_code)
            .map_err(|e| ScanError::KeyDerivationFailed(format!("HMAC initialization failed: {}", e)))?;
        mac.update(parent.as_bytes());
        mac.update(&index.to_be_bytes());
        let i = mac.finalize().into_bytes();

        let tweak: Option<Scalar> = Scalar::from_repr(FieldBytes::clone_from_slice(&i[..32])).into();
        let tweak = tweak.ok_or_else(|| {
            ScanError::KeyDerivationFailed(format!("tweak for index {} is not a valid scalar", index))
        })?;

        let child = ProjectivePoint::GENERATOR * tweak + self.public_key.to_projective();
        PublicKey::from_affine(child.to_affine()).map_err(|_| {
            ScanError::KeyDerivationFailed(format!("child {} is the point at infinity", index))
        })
    }

    /// Checksummed Ethereum address of the child at `index`.
    pub fn derive_address(&self, index: u32) -> Result<String, ScanError> {
        let child = self.derive_child(index)?;
        Ok(public_key_to_address(&child))
    }

    /// Derives every address of `range` in ascending index order.
    pub fn derive_range(&self, range: AxisRange) -> Result<Vec<(u32, String)>, ScanError> {
        debug!("Deriving {} addresses from index {}", range.count, range.start);
        range.indices().map(|i| self.derive_address(i).map(|a| (i, a))).collect()
    }
}

impl fmt::Debug for ExtendedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the chain code is left out of logs
        f.debug_struct("ExtendedPublicKey")
            .field("public_key", &self.public_key_hex())
            .field("chain_code", &"<redacted>")
            .finish()
    }
}

/// Ethereum address of a secp256k1 public key: last 20 bytes of keccak256 over the
/// uncompressed point, EIP-55 checksummed.
pub fn public_key_to_address(public_key: &PublicKey) -> String {
    let encoded = public_key.to_encoded_point(false);
    let hash = Keccak256::digest(&encoded.as_bytes()[1..]);
    to_checksum_address(&hex::encode(&hash[12..]))
}

/// EIP-55 mixed-case checksum of a 40-hex-digit address (prefix optional).
pub fn to_checksum_address(address: &str) -> String {
    let lower = strip_0x(address).to_ascii_lowercase();
    let hash = Keccak256::digest(lower.as_bytes());

    let body: String = lower
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let nibble = (hash[i / 2] >> (4 * (1 - (i % 2)))) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect();

    format!("0x{}", body)
}

fn strip_0x(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}
