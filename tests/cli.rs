//! End-to-end runs of the binary. None of these reach a device or a node.

use assert_cmd::Command;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use ledger_scanner::crypto::ExtendedPublicKey;
use ledger_scanner::report::csv::{export_pubkeys_csv, PubkeyRecord};
use std::path::Path;
use tempfile::TempDir;

const ALICE: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";
const BOB: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

fn scanner(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ledger-scanner").unwrap();
    cmd.current_dir(workdir)
        .env_remove("CONFIG_PATH")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_template_without_innermost_axis_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = scanner(dir.path())
        .args(["scan", "--path", "m/44'/60'/M'/N", "--skip-balance"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr_of(&output).contains("Missing O index component"));
}

#[test]
fn test_zero_count_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = scanner(dir.path())
        .args(["scan", "-p", "m/44'/60'/M'/N/O", "--outer-count", "0", "-s"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr_of(&output).contains("Invalid M count"));
}

#[test]
fn test_index_range_past_hardened_offset_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = scanner(dir.path())
        .args(["scan", "--outer-start", "2147483647", "--outer-count", "2", "-s"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr_of(&output).contains("M indices must stay below 2147483648"));
}

#[test]
fn test_bad_hide_threshold_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = scanner(dir.path()).args(["scan", "-H", "lots"]).output().unwrap();

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("lots"));
}

#[test]
fn test_missing_explicit_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let output = scanner(dir.path())
        .args(["--config", "absent.toml", "scan-addresses", "-i", "a.csv", "-s"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("absent.toml"));
}

#[test]
fn test_scan_addresses_without_balances() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("addresses.csv"),
        format!("Index,Address,Path\n1,{},m/44'/60'/0'/0/0\n2,{},m/44'/60'/0'/0/1\n", ALICE, BOB),
    )
    .unwrap();

    let output = scanner(dir.path())
        .args(["scan-addresses", "-i", "addresses.csv", "-s", "-r", "out/report.csv"])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains(ALICE));
    assert!(stdout.contains("m/44'/60'/0'/0/1"));
    assert!(!stdout.contains("Balance"));

    let report = std::fs::read_to_string(dir.path().join("out/report.csv")).unwrap();
    assert!(report.starts_with("Index,Address,Path\n"));
    assert_eq!(report.lines().count(), 3);

    // a second run must not overwrite the report, but still prints the table
    let again = scanner(dir.path())
        .args(["scan-addresses", "-i", "addresses.csv", "-s", "-r", "out/report.csv"])
        .output()
        .unwrap();
    assert_eq!(again.status.code(), Some(1));
    assert!(stdout_of(&again).contains(ALICE));
    assert!(stderr_of(&again).contains("Output file already exists"));
}

#[test]
fn test_scan_pubkeys_derives_locally() {
    let dir = TempDir::new().unwrap();
    let secret = SecretKey::from_slice(&[7u8; 32]).unwrap();
    let key = ExtendedPublicKey::from_parts(secret.public_key().to_encoded_point(true).as_bytes(), &[3u8; 32]).unwrap();
    let expected = [key.derive_address(0).unwrap(), key.derive_address(1).unwrap()];

    export_pubkeys_csv(
        &dir.path().join("pubkeys.csv"),
        &[PubkeyRecord { key, path: "m/44'/60'/0'/0/O".to_string() }],
    )
    .unwrap();

    let output = scanner(dir.path())
        .args(["scan-pubkeys", "-i", "pubkeys.csv", "--address-count", "2", "--skip-balance"])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    let stdout = stdout_of(&output);
    assert!(stdout.contains(&expected[0]));
    assert!(stdout.contains(&expected[1]));
    assert!(stdout.contains("m/44'/60'/0'/0/1"));
    assert!(!stdout.contains("m/44'/60'/0'/0/2"));
}

#[cfg(not(feature = "ledger"))]
#[test]
fn test_device_commands_need_hid_support() {
    let dir = TempDir::new().unwrap();
    let output = scanner(dir.path())
        .args(["export-pubkeys", "-o", "pubkeys.csv"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("--features ledger"));
    assert!(!dir.path().join("pubkeys.csv").exists());
}
