pub mod amount;
pub mod config;
pub mod domain;
pub mod errors;
pub mod expander;
pub mod path_template;

pub use domain::{AddressCandidate, BalanceFilter, DerivedAddress, ScanResult};
pub use errors::ScanError;
