pub mod deriver;
pub mod scan;

pub use deriver::{DerivationStrategy, KeyDeriver};
pub use scan::{export_addresses, export_pubkeys, PathRequest, ScanOptions, ScanService};
