pub mod derivation;

pub use self::derivation::{public_key_to_address, to_checksum_address, ExtendedPublicKey};
