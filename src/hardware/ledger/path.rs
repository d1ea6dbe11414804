//! BIP32 path encoding for APDU payloads

use crate::core::errors::ScanError;
use crate::crypto::derivation::HARDENED_OFFSET;
use std::fmt;
use std::str::FromStr;

/// Ledger apps accept at most ten path components.
pub const MAX_DEPTH: usize = 10;

/// A concrete (token-free) derivation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bip32Path {
    pub path: Vec<u32>,
}

impl Bip32Path {
    pub fn new(path: Vec<u32>) -> Self {
        Self { path }
    }

    /// Encodes as `depth || index_0 BE || index_1 BE || ...`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.path.len() * 4);
        bytes.push(self.path.len() as u8);
        for index in &self.path {
            bytes.extend_from_slice(&index.to_be_bytes());
        }
        bytes
    }
}

impl FromStr for Bip32Path {
    type Err = ScanError;

    /// Parses `m/44'/60'/0'/0/0`. Both `'` and `h` mark a hardened component.
    fn from_str(path_str: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ScanError::KeyDerivationFailed(format!("{}: {}", reason, path_str));

        let rest = path_str
            .strip_prefix("m/")
            .ok_or_else(|| invalid("path must start with m/"))?;
        if rest.is_empty() {
            return Err(invalid("path has no components"));
        }

        let mut path = Vec::new();
        for part in rest.split('/') {
            let hardened = part.ends_with('\'') || part.ends_with('h');
            let digits = part.trim_end_matches('\'').trim_end_matches('h');
            if digits.is_empty() {
                return Err(invalid("empty path component"));
            }

            let num: u32 = digits.parse().map_err(|_| invalid("invalid path component"))?;
            if num >= HARDENED_OFFSET {
                return Err(invalid("path component out of range"));
            }
            path.push(if hardened { HARDENED_OFFSET | num } else { num });
        }

        if path.len() > MAX_DEPTH {
            return Err(invalid("path too deep"));
        }

        Ok(Self { path })
    }
}

impl fmt::Display for Bip32Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for index in &self.path {
            if index & HARDENED_OFFSET != 0 {
                write!(f, "/{}'", index & !HARDENED_OFFSET)?;
            } else {
                write!(f, "/{}", index)?;
            }
        }
        Ok(())
    }
}
