//! CSV import and export
//!
//! Writers refuse to overwrite an existing file and create missing parent directories.
//! Readers skip the header row and blank lines.

use crate::core::amount::format_amount;
use crate::core::domain::{AddressCandidate, ScanResult, ETH_SYMBOL};
use crate::core::errors::ScanError;
use crate::crypto::derivation::ExtendedPublicKey;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;
use tracing::{info, warn};

pub const PUBKEYS_HEADER: [&str; 3] = ["Public Key", "Chain Code", "Data/Path"];

/// An extended public key together with the path-prefix it was obtained for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubkeyRecord {
    pub key: ExtendedPublicKey,
    /// Path-prefix, still carrying the innermost token
    pub path: String,
}

/// One `(index, address, path)` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub index: usize,
    pub address: String,
    pub path: String,
}

impl From<AddressRecord> for AddressCandidate {
    fn from(record: AddressRecord) -> Self {
        AddressCandidate::new(record.path, record.address)
    }
}

/// Header of the scan/address export.
pub fn scan_header(include_balance: bool) -> Vec<String> {
    let mut header = vec!["Index".to_string(), "Address".to_string()];
    if include_balance {
        header.push(format!("Balance ({})", ETH_SYMBOL));
    }
    header.push("Path".to_string());
    header
}

/// Writes `Index,Address,[Balance (ETH),]Path`, one row per address in discovery order.
pub fn export_scan_csv(path: &Path, result: &ScanResult, include_balance: bool) -> Result<(), ScanError> {
    let mut writer = create_output(path)?;
    write_row(&mut writer, &scan_header(include_balance))?;

    for entry in result.addresses() {
        let mut row = vec![entry.ordinal.to_string(), entry.address.clone()];
        if include_balance {
            row.push(entry.balance.as_ref().map(format_amount).unwrap_or_default());
        }
        row.push(entry.path.clone());
        write_row(&mut writer, &row)?;
    }

    writer.flush()?;
    info!("Wrote {} addresses to {}", result.len(), path.display());
    Ok(())
}

/// Writes `Public Key,Chain Code,Data/Path`.
///
/// Anyone holding this file can derive every address below these keys.
pub fn export_pubkeys_csv(path: &Path, records: &[PubkeyRecord]) -> Result<(), ScanError> {
    let mut writer = create_output(path)?;
    write_row(&mut writer, &PUBKEYS_HEADER)?;

    for record in records {
        write_row(
            &mut writer,
            &[record.key.public_key_hex(), record.key.chain_code_hex(), record.path.clone()],
        )?;
    }

    writer.flush()?;
    warn!(
        "Wrote {} extended public keys to {}. Keep this file private: it reveals every derived address.",
        records.len(),
        path.display()
    );
    Ok(())
}

/// Reads `(publicKey, chainCode, path)` rows.
pub fn read_pubkeys_csv(path: &Path) -> Result<Vec<PubkeyRecord>, ScanError> {
    read_rows(path, &[3])?
        .into_iter()
        .map(|(line, fields)| {
            let key = ExtendedPublicKey::from_hex(&fields[0], &fields[1]).map_err(|e| invalid(path, line, e))?;
            Ok(PubkeyRecord { key, path: fields[2].clone() })
        })
        .collect()
}

/// Reads `(index, address, path)` rows. A scan export with a balance column is accepted
/// too; the balance is ignored.
pub fn read_addresses_csv(path: &Path) -> Result<Vec<AddressRecord>, ScanError> {
    read_rows(path, &[3, 4])?
        .into_iter()
        .map(|(line, fields)| {
            let index = fields[0]
                .parse::<usize>()
                .map_err(|_| invalid(path, line, format!("invalid index '{}'", fields[0])))?;
            let address = fields[1].clone();
            if address.is_empty() {
                return Err(invalid(path, line, "empty address"));
            }
            let path_field = fields[fields.len() - 1].clone();
            Ok(AddressRecord { index, address, path: path_field })
        })
        .collect()
}

fn invalid(path: &Path, line: usize, reason: impl std::fmt::Display) -> ScanError {
    ScanError::InvalidInput {
        path: path.to_path_buf(),
        reason: format!("line {}: {}", line, reason),
    }
}

fn create_output(path: &Path) -> Result<BufWriter<File>, ScanError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => ScanError::OutputAlreadyExists(path.to_path_buf()),
            _ => ScanError::Io(e),
        })?;
    Ok(BufWriter::new(file))
}

fn write_row<W: Write, S: AsRef<str>>(writer: &mut W, fields: &[S]) -> Result<(), ScanError> {
    let line: Vec<String> = fields.iter().map(|f| escape_field(f.as_ref())).collect();
    writeln!(writer, "{}", line.join(","))?;
    Ok(())
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Splits one line into fields, honouring double quotes.
fn split_line(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' if in_quotes => in_quotes = false,
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(current.trim().to_string());
    Ok(fields)
}

/// Data rows with their 1-based line numbers. The first non-blank line is the header.
fn read_rows(path: &Path, column_counts: &[usize]) -> Result<Vec<(usize, Vec<String>)>, ScanError> {
    let file = File::open(path).map_err(|e| ScanError::InvalidInput {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut rows = Vec::new();
    let mut header_seen = false;

    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let line_no = i + 1;
        if line.trim().is_empty() {
            continue;
        }
        if !header_seen {
            header_seen = true;
            continue;
        }

        let fields = split_line(&line).map_err(|e| invalid(path, line_no, e))?;
        if !column_counts.contains(&fields.len()) {
            return Err(invalid(
                path,
                line_no,
                format!("expected {:?} columns, found {}", column_counts, fields.len()),
            ));
        }
        rows.push((line_no, fields));
    }

    Ok(rows)
}
