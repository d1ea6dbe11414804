use crate::blockchain::traits::BalanceOracle;
use crate::core::domain::{AddressCandidate, BalanceFilter, ScanResult};
use crate::core::errors::ScanError;
use crate::core::path_template::{standard_axes, AxisPlan, AxisRange, PathTemplate};
use crate::hardware::HardwareKeySource;
use crate::report::csv::{self, PubkeyRecord};
use crate::scanner::BalanceScanner;
use crate::service::deriver::{derive_imported, KeyDeriver};
use std::path::Path;
use tracing::info;

/// A template plus the range of each of its axes.
#[derive(Debug, Clone)]
pub struct PathRequest {
    pub template: PathTemplate,
    pub outer: AxisRange,
    pub middle: AxisRange,
    pub inner: AxisRange,
}

impl PathRequest {
    /// Validates the request. Never touches the device.
    pub fn plan(&self) -> Result<AxisPlan, ScanError> {
        self.template.plan(&standard_axes(self.outer, self.middle, self.inner))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    pub skip_balance: bool,
    pub filter: BalanceFilter,
}

/// Runs the scan pipelines. Inputs are validated before the device is connected.
pub struct ScanService<O> {
    balances: BalanceScanner,
    oracle: O,
}

impl<O: BalanceOracle> ScanService<O> {
    pub fn new(balances: BalanceScanner, oracle: O) -> Self {
        Self { balances, oracle }
    }

    /// Template → device → derivation → balances.
    pub async fn scan<D, C>(&self, request: &PathRequest, options: ScanOptions, connect: C) -> Result<ScanResult, ScanError>
    where
        D: HardwareKeySource,
        C: FnOnce() -> Result<D, ScanError>,
    {
        let plan = request.plan()?;
        let candidates = KeyDeriver::new(connect()?).derive_plan(&plan)?;
        self.fetch(candidates, options).await
    }

    /// Imported extended keys → local derivation → balances. No device involved.
    pub async fn scan_pubkeys(&self, input: &Path, inner: AxisRange, options: ScanOptions) -> Result<ScanResult, ScanError> {
        let records = csv::read_pubkeys_csv(input)?;
        info!("Loaded {} extended public keys from {}", records.len(), input.display());
        let candidates = derive_imported(&records, inner)?;
        self.fetch(candidates, options).await
    }

    /// Imported addresses → balances, in ascending `Index` order.
    pub async fn scan_addresses(&self, input: &Path, options: ScanOptions) -> Result<ScanResult, ScanError> {
        let mut records = csv::read_addresses_csv(input)?;
        info!("Loaded {} addresses from {}", records.len(), input.display());
        // the index column is the original discovery order
        records.sort_by_key(|r| r.index);
        let candidates = records.into_iter().map(AddressCandidate::from).collect();
        self.fetch(candidates, options).await
    }

    async fn fetch(&self, candidates: Vec<AddressCandidate>, options: ScanOptions) -> Result<ScanResult, ScanError> {
        self.balances
            .scan(candidates, options.skip_balance, options.filter, &self.oracle)
            .await
    }
}

/// Writes the extended key of every path-prefix to `output`.
pub fn export_pubkeys<D, C>(request: &PathRequest, output: &Path, connect: C) -> Result<Vec<PubkeyRecord>, ScanError>
where
    D: HardwareKeySource,
    C: FnOnce() -> Result<D, ScanError>,
{
    let plan = request.plan()?;
    ensure_new_output(output)?;
    let records = KeyDeriver::new(connect()?).extended_keys(&plan)?;
    csv::export_pubkeys_csv(output, &records)?;
    Ok(records)
}

/// Writes every derived address to `output` without fetching balances.
pub fn export_addresses<D, C>(request: &PathRequest, output: &Path, connect: C) -> Result<ScanResult, ScanError>
where
    D: HardwareKeySource,
    C: FnOnce() -> Result<D, ScanError>,
{
    let plan = request.plan()?;
    ensure_new_output(output)?;

    let mut result = ScanResult::new();
    for candidate in KeyDeriver::new(connect()?).derive_plan(&plan)? {
        result.record(candidate, None);
    }
    csv::export_scan_csv(output, &result, false)?;
    Ok(result)
}

/// Fails before any device work when the export target is taken.
fn ensure_new_output(output: &Path) -> Result<(), ScanError> {
    if output.exists() {
        return Err(ScanError::OutputAlreadyExists(output.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::derivation::ExtendedPublicKey;
    use async_trait::async_trait;
    use k256::elliptic_curve::sec1::ToEncodedPoint;
    use rust_decimal::Decimal;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Answers with a distinct key per path.
    struct PathKeyDevice;

    impl HardwareKeySource for PathKeyDevice {
        fn get_extended_public_key(&mut self, path: &str) -> Result<ExtendedPublicKey, ScanError> {
            let mut seed = [9u8; 32];
            for (i, b) in path.bytes().enumerate() {
                seed[i % 32] ^= b;
            }
            let secret = k256::SecretKey::from_slice(&seed).unwrap();
            ExtendedPublicKey::from_parts(secret.public_key().to_encoded_point(true).as_bytes(), &seed)
        }

        fn get_address(&mut self, path: &str) -> Result<String, ScanError> {
            Ok(format!("addr:{}", path))
        }
    }

    /// Answers with the same key whatever the path.
    struct SharedKeyDevice;

    impl HardwareKeySource for SharedKeyDevice {
        fn get_extended_public_key(&mut self, _path: &str) -> Result<ExtendedPublicKey, ScanError> {
            let secret = k256::SecretKey::from_slice(&[9u8; 32]).unwrap();
            ExtendedPublicKey::from_parts(secret.public_key().to_encoded_point(true).as_bytes(), &[4u8; 32])
        }

        fn get_address(&mut self, path: &str) -> Result<String, ScanError> {
            Ok(format!("addr:{}", path))
        }
    }

    /// Every address holds its position in the call sequence, starting at zero.
    #[derive(Default)]
    struct CountingOracle {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BalanceOracle for CountingOracle {
        async fn get_balance(&self, _address: &str) -> Result<Decimal, ScanError> {
            Ok(Decimal::from(self.calls.fetch_add(1, Ordering::SeqCst)))
        }

        fn native_symbol(&self) -> &str {
            "ETH"
        }
    }

    fn request(template: &str, inner: u32) -> PathRequest {
        PathRequest {
            template: PathTemplate::new(template),
            outer: AxisRange::new(0, 2),
            middle: AxisRange::new(0, 1),
            inner: AxisRange::new(0, inner),
        }
    }

    fn service() -> ScanService<CountingOracle> {
        ScanService::new(BalanceScanner::default(), CountingOracle::default())
    }

    #[tokio::test]
    async fn test_invalid_template_never_connects() {
        let connected = Cell::new(false);
        let connect = || {
            connected.set(true);
            Ok(PathKeyDevice)
        };

        let err = service()
            .scan(&request("m/44'/60'/M'/N", 5), ScanOptions::default(), connect)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Missing O index component");
        assert!(!connected.get());
    }

    #[tokio::test]
    async fn test_device_unavailable_propagates() {
        let err = service()
            .scan(&request("m/44'/60'/M'/N/O", 5), ScanOptions::default(), || {
                Err::<PathKeyDevice, _>(ScanError::bindings_missing())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::DeviceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_scan_filters_first_zero_balance() {
        let options = ScanOptions { skip_balance: false, filter: BalanceFilter::HideZero };
        let result = service()
            .scan(&request("m/44'/60'/M'/N/O", 3), options, || Ok(PathKeyDevice))
            .await
            .unwrap();

        // first fetched address has balance 0 and is hidden
        assert_eq!(result.len(), 5);
        assert_eq!(result.addresses()[0].path, "m/44'/60'/0'/0/1");
        assert_eq!(result.addresses()[0].ordinal, 1);
    }

    #[tokio::test]
    async fn test_skip_balance_records_all() {
        let svc = service();
        let options = ScanOptions { skip_balance: true, filter: BalanceFilter::HideZero };
        let result = svc.scan(&request("m/44'/60'/M'/N/O", 3), options, || Ok(PathKeyDevice)).await.unwrap();

        assert_eq!(result.len(), 6);
        assert_eq!(svc.oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_same_address_across_prefixes_last_write_wins() {
        let svc = service();
        let options = ScanOptions { skip_balance: true, filter: BalanceFilter::Disabled };
        let result = svc.scan(&request("m/44'/60'/M'/N/O", 3), options, || Ok(SharedKeyDevice)).await.unwrap();

        // both outer prefixes derive the same three addresses
        assert_eq!(result.len(), 3);
        let rows: Vec<(usize, &str)> = result.addresses().iter().map(|e| (e.ordinal, e.path.as_str())).collect();
        assert_eq!(
            rows,
            vec![(1, "m/44'/60'/1'/0/0"), (2, "m/44'/60'/1'/0/1"), (3, "m/44'/60'/1'/0/2")]
        );
    }

    #[tokio::test]
    async fn test_scan_addresses_follows_index_column() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("addresses.csv");
        std::fs::write(&input, "Index,Address,Path\n3,0xc,m/2\n1,0xa,m/0\n2,0xb,m/1\n").unwrap();

        let options = ScanOptions { skip_balance: true, filter: BalanceFilter::Disabled };
        let result = service().scan_addresses(&input, options).await.unwrap();

        let rows: Vec<(usize, &str)> = result.addresses().iter().map(|e| (e.ordinal, e.address.as_str())).collect();
        assert_eq!(rows, vec![(1, "0xa"), (2, "0xb"), (3, "0xc")]);
    }

    #[tokio::test]
    async fn test_export_pubkeys_then_scan_pubkeys() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("pubkeys.csv");
        let req = request("m/44'/60'/M'/N/O", 4);

        let records = export_pubkeys(&req, &output, || Ok(PathKeyDevice)).unwrap();
        assert_eq!(records.len(), 2);

        let options = ScanOptions { skip_balance: true, filter: BalanceFilter::Disabled };
        let svc = service();
        let from_file = svc.scan_pubkeys(&output, AxisRange::new(0, 4), options).await.unwrap();
        let from_device = svc.scan(&req, options, || Ok(PathKeyDevice)).await.unwrap();
        assert_eq!(from_file.addresses(), from_device.addresses());
    }

    #[tokio::test]
    async fn test_export_addresses_then_scan_addresses() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out/addresses.csv");

        let exported = export_addresses(&request("m/44'/60'/M'/N/O", 2), &output, || Ok(PathKeyDevice)).unwrap();
        assert_eq!(exported.len(), 4);

        let svc = service();
        let options = ScanOptions { skip_balance: false, filter: BalanceFilter::Disabled };
        let scanned = svc.scan_addresses(&output, options).await.unwrap();
        let addresses: Vec<&str> = scanned.addresses().iter().map(|e| e.address.as_str()).collect();
        let expected: Vec<&str> = exported.addresses().iter().map(|e| e.address.as_str()).collect();
        assert_eq!(addresses, expected);
        assert_eq!(svc.oracle.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_export_refuses_existing_file_before_connecting() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("taken.csv");
        std::fs::write(&output, "").unwrap();

        let connected = Cell::new(false);
        let err = export_addresses(&request("m/44'/60'/M'/N/O", 2), &output, || {
            connected.set(true);
            Ok(PathKeyDevice)
        })
        .unwrap_err();

        assert!(matches!(err, ScanError::OutputAlreadyExists(_)));
        assert!(!connected.get());
    }
}
