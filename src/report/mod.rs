//! Report rendering
//!
//! The table lists addresses in discovery order. CSV import/export lives in [`csv`].

pub mod csv;

use crate::core::amount::format_amount;
use crate::core::domain::{ScanResult, ETH_SYMBOL};

pub const EMPTY_NOTICE: &str = "No addresses to show.";

/// Renders `result` as an ASCII table: index, address, optional balance, path.
pub fn render(result: &ScanResult, show_balance: bool) -> String {
    let mut out = String::new();

    if result.is_empty() {
        out.push_str(EMPTY_NOTICE);
        out.push('\n');
    } else {
        let balance_header = format!("Balance ({})", ETH_SYMBOL);
        let mut headers = vec!["#", "Address"];
        if show_balance {
            headers.push(balance_header.as_str());
        }
        headers.push("Path");

        let rows: Vec<Vec<String>> = result
            .addresses()
            .iter()
            .map(|entry| {
                let mut row = vec![entry.ordinal.to_string(), entry.address.clone()];
                if show_balance {
                    row.push(entry.balance.as_ref().map(format_amount).unwrap_or_else(|| "-".to_string()));
                }
                row.push(entry.path.clone());
                row
            })
            .collect();

        // numeric columns are right-aligned
        let right_aligned: Vec<bool> = headers.iter().map(|h| *h == "#" || h.starts_with("Balance")).collect();
        let widths: Vec<usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| rows.iter().map(|r| r[i].chars().count()).chain([h.len()]).max().unwrap_or(0))
            .collect();

        let separator = format!(
            "+{}+\n",
            widths.iter().map(|w| "-".repeat(w + 2)).collect::<Vec<_>>().join("+")
        );
        let format_row = |cells: &[&str]| {
            let padded: Vec<String> = cells
                .iter()
                .enumerate()
                .map(|(i, cell)| {
                    if right_aligned[i] {
                        format!(" {:>width$} ", cell, width = widths[i])
                    } else {
                        format!(" {:<width$} ", cell, width = widths[i])
                    }
                })
                .collect();
            format!("|{}|\n", padded.join("|"))
        };

        out.push_str(&separator);
        out.push_str(&format_row(&headers));
        out.push_str(&separator);
        for row in &rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            out.push_str(&format_row(&cells));
        }
        out.push_str(&separator);

        if show_balance {
            out.push_str(&format!(
                "{} addresses, total {} {}\n",
                result.len(),
                format_amount(&result.total_balance()),
                ETH_SYMBOL
            ));
        }
    }

    if !result.failures().is_empty() {
        out.push_str(&format!("\n{} balance lookups failed:\n", result.failures().len()));
        for failure in result.failures() {
            out.push_str(&format!("  {} ({}): {}\n", failure.address, failure.path, failure.reason));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{AddressCandidate, FetchFailure};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn sample() -> ScanResult {
        let mut result = ScanResult::new();
        result.record(
            AddressCandidate::new("m/44'/60'/0'/0/0", "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"),
            Some((ETH_SYMBOL, Decimal::from_str("1234.567").unwrap())),
        );
        result.record(
            AddressCandidate::new("m/44'/60'/0'/0/1", "0x742d35Cc6634C0532925a3b844Bc454e4438f44e"),
            Some((ETH_SYMBOL, Decimal::from_str("0.00005").unwrap())),
        );
        result
    }

    #[test]
    fn test_empty_result_notice() {
        assert_eq!(render(&ScanResult::new(), true), format!("{}\n", EMPTY_NOTICE));
    }

    #[test]
    fn test_table_with_balances() {
        let table = render(&sample(), true);
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[1].contains("Balance (ETH)"));
        assert!(lines[3].starts_with("| 1 | 0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf |"));
        assert!(lines[3].contains("1,234.57"));
        assert!(lines[4].contains("<0.0001"));
        assert!(lines[4].ends_with("| m/44'/60'/0'/0/1 |"));
        assert!(table.contains("2 addresses, total 1,234.57 ETH"));

        // every table line has the same width
        let width = lines[0].len();
        assert!(lines[..6].iter().all(|l| l.len() == width));
    }

    #[test]
    fn test_table_without_balances() {
        let table = render(&sample(), false);
        assert!(!table.contains("Balance"));
        assert!(!table.contains("total"));
        assert!(table.contains("| # | Address"));
    }

    #[test]
    fn test_failures_listed() {
        let mut result = sample();
        result.record_failure(FetchFailure {
            path: "m/44'/60'/0'/0/2".into(),
            address: "0xdead".into(),
            reason: "timeout".into(),
        });
        let table = render(&result, true);
        assert!(table.contains("1 balance lookups failed"));
        assert!(table.contains("0xdead (m/44'/60'/0'/0/2): timeout"));
    }
}
