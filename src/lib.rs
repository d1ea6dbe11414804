//! Enumerates Ledger-derived Ethereum addresses over a multi-axis derivation path
//! template and reports their balances.

pub mod blockchain;
pub mod cli;
pub mod core;
pub mod crypto;
pub mod hardware;
pub mod report;
pub mod scanner;
pub mod service;
