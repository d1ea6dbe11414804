//! Domain types shared by the derivation, scanning and reporting stages.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Symbol of the single asset the balance oracle reports.
pub const ETH_SYMBOL: &str = "ETH";

/// An address produced by derivation (or read from a file) that still awaits its balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressCandidate {
    pub path: String,
    pub address: String,
}

impl AddressCandidate {
    pub fn new(path: impl Into<String>, address: impl Into<String>) -> Self {
        Self { path: path.into(), address: address.into() }
    }
}

/// One row of the final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedAddress {
    /// 1-based display index, in discovery order.
    pub ordinal: usize,
    pub path: String,
    pub address: String,
    pub balance: Option<Decimal>,
}

/// A balance lookup that failed while the scan kept going.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub path: String,
    pub address: String,
    pub reason: String,
}

/// Hide policy applied after each balance has been fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BalanceFilter {
    /// Show every address.
    #[default]
    Disabled,
    /// Hide addresses whose balance is exactly zero.
    HideZero,
    /// Hide addresses whose balance is less than or equal to the threshold.
    HideAtOrBelow(Decimal),
}

impl BalanceFilter {
    pub fn hides(&self, balance: &Decimal) -> bool {
        match self {
            BalanceFilter::Disabled => false,
            BalanceFilter::HideZero => balance.is_zero(),
            BalanceFilter::HideAtOrBelow(threshold) => balance <= threshold,
        }
    }
}

impl FromStr for BalanceFilter {
    type Err = String;

    /// Accepts `true`/empty (hide zero), `false`/`0` (disabled) or a decimal threshold.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        match value.to_ascii_lowercase().as_str() {
            "" | "true" => return Ok(BalanceFilter::HideZero),
            "false" | "0" => return Ok(BalanceFilter::Disabled),
            _ => {}
        }
        Decimal::from_str(value)
            .or_else(|_| Decimal::from_scientific(value))
            .map(BalanceFilter::HideAtOrBelow)
            .map_err(|_| format!("expected true, false or a decimal amount, got '{}'", value))
    }
}

impl fmt::Display for BalanceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceFilter::Disabled => f.write_str("disabled"),
            BalanceFilter::HideZero => f.write_str("hide empty"),
            BalanceFilter::HideAtOrBelow(t) => write!(f, "hide <= {}", t),
        }
    }
}

/// Addresses in discovery order plus their per-asset amounts.
///
/// Keyed by address: recording an address twice overwrites the first entry in place
/// (keeping its position and ordinal).
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    entries: Vec<DerivedAddress>,
    positions: HashMap<String, usize>,
    amounts: HashMap<String, BTreeMap<String, Decimal>>,
    failures: Vec<FetchFailure>,
}

impl ScanResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an address, with its amount for `symbol` when a balance was fetched.
    ///
    /// Re-recording an address replaces its path and amounts in place. Only recorded
    /// occurrences count: when a later occurrence of an address is hidden by the filter it
    /// is never recorded, so the earlier row stays as it was.
    pub fn record(&mut self, candidate: AddressCandidate, amount: Option<(&str, Decimal)>) {
        let balance = amount.map(|(_, value)| value);
        match amount {
            Some((symbol, value)) => {
                self.amounts.entry(candidate.address.clone()).or_default().insert(symbol.to_string(), value);
            }
            None => {
                self.amounts.remove(&candidate.address);
            }
        }

        match self.positions.get(&candidate.address) {
            Some(&pos) => {
                let entry = &mut self.entries[pos];
                entry.path = candidate.path;
                entry.balance = balance;
            }
            None => {
                let ordinal = self.entries.len() + 1;
                self.positions.insert(candidate.address.clone(), self.entries.len());
                self.entries.push(DerivedAddress {
                    ordinal,
                    path: candidate.path,
                    address: candidate.address,
                    balance,
                });
            }
        }
    }

    pub fn record_failure(&mut self, failure: FetchFailure) {
        self.failures.push(failure);
    }

    pub fn addresses(&self) -> &[DerivedAddress] {
        &self.entries
    }

    pub fn get(&self, address: &str) -> Option<&DerivedAddress> {
        self.positions.get(address).map(|&pos| &self.entries[pos])
    }

    pub fn amount(&self, address: &str, symbol: &str) -> Option<Decimal> {
        self.amounts.get(address).and_then(|m| m.get(symbol)).copied()
    }

    pub fn failures(&self) -> &[FetchFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all recorded balances.
    pub fn total_balance(&self) -> Decimal {
        self.entries.iter().filter_map(|e| e.balance).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_filter_parse() {
        assert_eq!("true".parse::<BalanceFilter>().unwrap(), BalanceFilter::HideZero);
        assert_eq!("".parse::<BalanceFilter>().unwrap(), BalanceFilter::HideZero);
        assert_eq!("false".parse::<BalanceFilter>().unwrap(), BalanceFilter::Disabled);
        assert_eq!("0".parse::<BalanceFilter>().unwrap(), BalanceFilter::Disabled);
        assert_eq!("0.01".parse::<BalanceFilter>().unwrap(), BalanceFilter::HideAtOrBelow(dec("0.01")));
        assert!("lots".parse::<BalanceFilter>().is_err());
    }

    #[test]
    fn test_filter_hides() {
        assert!(!BalanceFilter::Disabled.hides(&Decimal::ZERO));
        assert!(BalanceFilter::HideZero.hides(&Decimal::ZERO));
        assert!(!BalanceFilter::HideZero.hides(&dec("0.000001")));

        let threshold = BalanceFilter::HideAtOrBelow(dec("0.01"));
        assert!(threshold.hides(&dec("0.01")));
        assert!(threshold.hides(&dec("0.001")));
        assert!(!threshold.hides(&dec("10.25")));
    }

    #[test]
    fn test_record_assigns_ordinals_in_discovery_order() {
        let mut result = ScanResult::new();
        result.record(AddressCandidate::new("m/0", "0xa"), Some((ETH_SYMBOL, dec("1"))));
        result.record(AddressCandidate::new("m/1", "0xb"), None);

        let rows = result.addresses();
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].ordinal, rows[0].address.as_str()), (1, "0xa"));
        assert_eq!((rows[1].ordinal, rows[1].address.as_str()), (2, "0xb"));
        assert_eq!(result.amount("0xa", ETH_SYMBOL), Some(dec("1")));
        assert_eq!(result.amount("0xb", ETH_SYMBOL), None);
    }

    #[test]
    fn test_record_last_write_wins() {
        let mut result = ScanResult::new();
        result.record(AddressCandidate::new("m/0'/0", "0xa"), Some((ETH_SYMBOL, dec("1"))));
        result.record(AddressCandidate::new("m/0'/1", "0xb"), Some((ETH_SYMBOL, dec("2"))));
        result.record(AddressCandidate::new("m/1'/0", "0xa"), Some((ETH_SYMBOL, dec("3"))));

        assert_eq!(result.len(), 2);
        let a = result.get("0xa").unwrap();
        assert_eq!(a.ordinal, 1);
        assert_eq!(a.path, "m/1'/0");
        assert_eq!(a.balance, Some(dec("3")));
        assert_eq!(result.total_balance(), dec("5"));
    }

    #[test]
    fn test_rerecord_without_amount_clears_it() {
        let mut result = ScanResult::new();
        result.record(AddressCandidate::new("m/0", "0xa"), Some((ETH_SYMBOL, dec("1"))));
        result.record(AddressCandidate::new("m/1", "0xa"), None);

        let a = result.get("0xa").unwrap();
        assert_eq!(a.balance, None);
        assert_eq!(result.amount("0xa", ETH_SYMBOL), None);
        assert_eq!(result.total_balance(), Decimal::ZERO);

        result.record(AddressCandidate::new("m/2", "0xa"), Some((ETH_SYMBOL, dec("4"))));
        assert_eq!(result.get("0xa").unwrap().balance, result.amount("0xa", ETH_SYMBOL));
    }
}
