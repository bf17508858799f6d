use assert_cmd::Command;
use std::fs;
use std::path::Path;
use std::str;

/// Run ipfilter with `GEOIP_MMDB_DIR` pointed at `mmdb_dir` and return
/// (success, stderr).
fn run_ipfilter(mmdb_dir: &Path, args: &[&str]) -> (bool, String) {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("ipfilter").unwrap();
    let output = cmd
        .env("GEOIP_MMDB_DIR", mmdb_dir.as_os_str())
        .arg("--no-banner")
        .args(args)
        .output()
        .expect("failed to execute");

    let stderr = str::from_utf8(&output.stderr)
        .expect("Failed to read stderr as UTF-8")
        .to_string();
    (output.status.success(), stderr)
}

#[test]
fn missing_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");
    let (ok, stderr) = run_ipfilter(
        dir.path(),
        &["-i", "no_such_input.txt", "-o", out.to_str().unwrap()],
    );

    assert!(!ok);
    assert!(
        stderr.contains("input file 'no_such_input.txt' not found"),
        "stderr: {stderr}"
    );
    assert!(!out.exists());
}

#[test]
fn missing_city_database() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ips.txt");
    fs::write(&input, "8.8.8.8\n").unwrap();
    let out = dir.path().join("out.txt");

    let (ok, stderr) = run_ipfilter(
        dir.path(),
        &["-i", input.to_str().unwrap(), "-o", out.to_str().unwrap()],
    );

    assert!(!ok);
    assert!(stderr.contains("GeoLite2-City.mmdb"), "stderr: {stderr}");
    assert!(!out.exists());
}

#[test]
fn missing_asn_database_named_when_asn_requested() {
    let dir = tempfile::tempdir().unwrap();
    // only presence is checked before the ASN file is reported
    fs::write(dir.path().join("GeoLite2-City.mmdb"), b"").unwrap();
    let input = dir.path().join("ips.txt");
    fs::write(&input, "8.8.8.8\n").unwrap();
    let out = dir.path().join("out.csv");

    let (ok, stderr) = run_ipfilter(
        dir.path(),
        &["-i", input.to_str().unwrap(), "-o", out.to_str().unwrap(), "--asn"],
    );

    assert!(!ok);
    assert!(stderr.contains("GeoLite2-ASN.mmdb"), "stderr: {stderr}");
}

#[test]
fn corrupt_database_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("GeoLite2-City.mmdb"), b"not a maxmind database").unwrap();
    let input = dir.path().join("ips.txt");
    fs::write(&input, "8.8.8.8\n").unwrap();
    let out = dir.path().join("out.txt");

    let (ok, stderr) = run_ipfilter(
        dir.path(),
        &["-i", input.to_str().unwrap(), "-o", out.to_str().unwrap()],
    );

    assert!(!ok);
    assert!(stderr.contains("failed to open database"), "stderr: {stderr}");
}

#[test]
fn output_required_without_live() {
    let dir = tempfile::tempdir().unwrap();
    let (ok, stderr) = run_ipfilter(dir.path(), &["-i", "ips.txt"]);
    assert!(!ok);
    assert!(stderr.contains("--output"), "stderr: {stderr}");
}

#[test]
fn help_lists_flags() {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("ipfilter").unwrap();
    let output = cmd.arg("--help").output().expect("failed to execute");
    assert!(output.status.success());

    let stdout = str::from_utf8(&output.stdout).unwrap();
    for flag in ["--input", "--output", "--filter", "--country", "--asn", "--split", "--live"] {
        assert!(stdout.contains(flag), "missing {flag} in help");
    }
}
