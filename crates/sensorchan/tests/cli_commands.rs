#![cfg(all(unix, feature = "cli"))]

use std::path::PathBuf;
use std::process::Command;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/sensorchan-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_sensorchan"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("sensorchan {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn doctor_without_daemon_warns_but_passes() {
    let dir = unique_temp_dir("doctor");

    let output = Command::new(env!("CARGO_BIN_EXE_sensorchan"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("doctor")
        .arg("--socket")
        .arg(dir.join("sensord.sock"))
        .output()
        .expect("doctor should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("doctor-report.schema.json"));
    assert!(stdout.contains("\"name\":\"sample_socket\",\"status\":\"warn\""));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn doctor_rejects_non_socket_path() {
    let dir = unique_temp_dir("doctor-file");
    let path = dir.join("sensord.sock");
    std::fs::write(&path, b"").expect("file should be writable");

    let output = Command::new(env!("CARGO_BIN_EXE_sensorchan"))
        .arg("--format")
        .arg("json")
        .arg("doctor")
        .env("SENSORCHAN_SOCKET", &path)
        .output()
        .expect("doctor should run");

    assert_eq!(output.status.code(), Some(30));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"overall\":\"fail\""));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn stream_unknown_sensor_without_interface_is_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_sensorchan"))
        .arg("stream")
        .arg("customsensor")
        .arg("--record-size")
        .arg("8")
        .output()
        .expect("stream should run");

    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pass --interface"));
}
