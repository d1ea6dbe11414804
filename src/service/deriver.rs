//! Address derivation over a validated plan
//!
//! When the innermost token is the last, non-hardened path component, each path-prefix
//! costs one device call and the innermost range is derived locally. Otherwise every
//! address is requested from the device individually.

use crate::core::domain::AddressCandidate;
use crate::core::errors::ScanError;
use crate::core::expander::expand_plan;
use crate::core::path_template::{split_leaf, substitute_axis, AxisPlan, AxisRange, AxisSpec, PathTemplate, INNER_TOKEN};
use crate::hardware::HardwareKeySource;
use crate::report::csv::PubkeyRecord;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationStrategy {
    /// One extended key per path-prefix, addresses derived locally.
    Hybrid,
    /// One device round-trip per address.
    PerAddress,
}

impl DerivationStrategy {
    pub fn for_plan(plan: &AxisPlan) -> Self {
        if split_leaf(plan.template.as_str(), &plan.innermost.token).is_some() {
            DerivationStrategy::Hybrid
        } else {
            DerivationStrategy::PerAddress
        }
    }
}

/// Derives addresses through a connected device.
pub struct KeyDeriver<D> {
    device: D,
}

impl<D: HardwareKeySource> KeyDeriver<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }

    /// Fetches the extended key for `prefix`, whose last component must be the innermost
    /// token.
    pub fn get_extended_key(&mut self, prefix: &str, token: &str) -> Result<PubkeyRecord, ScanError> {
        let parent = split_leaf(prefix, token).ok_or_else(|| not_derivable(token))?;
        debug!("Requesting extended public key for {}", parent);
        let key = self.device.get_extended_public_key(parent)?;
        Ok(PubkeyRecord { key, path: prefix.to_string() })
    }

    /// Extended keys for every path-prefix of `plan`, in expansion order.
    pub fn extended_keys(&mut self, plan: &AxisPlan) -> Result<Vec<PubkeyRecord>, ScanError> {
        let token = plan.innermost.token.as_str();
        if DerivationStrategy::for_plan(plan) != DerivationStrategy::Hybrid {
            return Err(not_derivable(token));
        }

        info!("Fetching {} extended public keys from the device", plan.prefix_count());
        expand_plan(plan).map(|prefix| self.get_extended_key(&prefix, token)).collect()
    }

    /// Every address of `plan`: outer-major, innermost index ascending within a prefix.
    pub fn derive_plan(&mut self, plan: &AxisPlan) -> Result<Vec<AddressCandidate>, ScanError> {
        let strategy = DerivationStrategy::for_plan(plan);
        info!(
            "Deriving {} addresses over {} path-prefixes",
            plan.address_count(),
            plan.prefix_count()
        );

        match strategy {
            DerivationStrategy::Hybrid => {
                let records = self.extended_keys(plan)?;
                derive_from_records(&records, &plan.innermost)
            }
            DerivationStrategy::PerAddress => {
                warn!(
                    "{} is not the last non-hardened component of {}; requesting all {} addresses from the device",
                    plan.innermost.token,
                    plan.template,
                    plan.address_count()
                );
                let mut candidates = Vec::new();
                for prefix in expand_plan(plan) {
                    for index in plan.innermost.range.indices() {
                        let path = substitute_axis(&prefix, &plan.innermost.token, index);
                        let address = self.device.get_address(&path)?;
                        candidates.push(AddressCandidate::new(path, address));
                    }
                }
                Ok(candidates)
            }
        }
    }
}

/// Local derivation from already known extended keys; no device involved.
pub fn derive_from_records(
    records: &[PubkeyRecord],
    innermost: &AxisSpec,
) -> Result<Vec<AddressCandidate>, ScanError> {
    let mut candidates = Vec::with_capacity(records.len() * innermost.range.count as usize);
    for record in records {
        for (index, address) in record.key.derive_range(innermost.range)? {
            let path = substitute_axis(&record.path, &innermost.token, index);
            candidates.push(AddressCandidate::new(path, address));
        }
    }
    Ok(candidates)
}

/// Checks the path of each imported record the way templates are checked, then derives
/// `inner` below each.
pub fn derive_imported(records: &[PubkeyRecord], inner: AxisRange) -> Result<Vec<AddressCandidate>, ScanError> {
    let innermost = AxisSpec::required(INNER_TOKEN, inner);
    for record in records {
        let plan = PathTemplate::new(record.path.as_str()).plan(std::slice::from_ref(&innermost))?;
        if DerivationStrategy::for_plan(&plan) != DerivationStrategy::Hybrid {
            return Err(not_derivable(INNER_TOKEN));
        }
    }
    derive_from_records(records, &innermost)
}

fn not_derivable(token: &str) -> ScanError {
    ScanError::InvalidTemplate(format!(
        "{} must be the last, non-hardened path component to derive from a public key",
        token
    ))
}
