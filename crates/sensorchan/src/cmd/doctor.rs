use std::os::unix::fs::FileTypeExt;
use std::path::Path;

use sensorchan_bus::{BusKind, ControlBus, SystemBus};
use sensorchan_channel::{MANAGER_INTERFACE, MANAGER_PATH};
use sensorchan_socket::SampleStream;
use serde::Serialize;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    schema_id: &'static str,
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.conn.channel_config()?;
    let checks = vec![
        sample_socket_check(&config.socket.path),
        control_bus_check(config.bus, &config.service_name),
        compiled_features_check(),
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let overall = if has_fail { "fail" } else { "pass" };

    let output = DoctorOutput {
        schema_id: "https://schemas.3leaps.dev/sensorchan/cli/v1/doctor-report.schema.json",
        checks,
        overall,
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("sensorchan doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<18} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Info => "INFO",
    }
}

fn check(name: &str, status: CheckStatus, detail: impl Into<String>) -> CheckResult {
    CheckResult {
        name: name.to_string(),
        status,
        detail: detail.into(),
    }
}

fn sample_socket_check(path: &Path) -> CheckResult {
    const NAME: &str = "sample_socket";

    if path.as_os_str().len() >= SampleStream::MAX_PATH_LEN {
        return check(
            NAME,
            CheckStatus::Fail,
            format!(
                "{} exceeds {} bytes",
                path.display(),
                SampleStream::MAX_PATH_LEN
            ),
        );
    }

    match std::fs::metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            check(NAME, CheckStatus::Pass, format!("{} is a socket", path.display()))
        }
        Ok(_) => check(
            NAME,
            CheckStatus::Fail,
            format!("{} exists but is not a socket", path.display()),
        ),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => check(
            NAME,
            CheckStatus::Warn,
            format!("{} not found (daemon not running?)", path.display()),
        ),
        Err(err) => check(
            NAME,
            CheckStatus::Fail,
            format!("{}: {err}", path.display()),
        ),
    }
}

fn control_bus_check(kind: BusKind, service: &str) -> CheckResult {
    const NAME: &str = "control_bus";

    match SystemBus::connect(kind, service, MANAGER_PATH, MANAGER_INTERFACE) {
        Ok(bus) if bus.is_valid() => check(
            NAME,
            CheckStatus::Pass,
            format!("{service} is registered on the {} bus", kind.name()),
        ),
        Ok(_) => check(
            NAME,
            CheckStatus::Warn,
            format!("{service} has no owner on the {} bus", kind.name()),
        ),
        Err(err) => check(
            NAME,
            CheckStatus::Warn,
            format!("{} bus unavailable: {err}", kind.name()),
        ),
    }
}

fn compiled_features_check() -> CheckResult {
    let mut features = Vec::new();
    if cfg!(feature = "system-bus") {
        features.push("system-bus");
    }
    if cfg!(feature = "cli") {
        features.push("cli");
    }
    check("compiled_features", CheckStatus::Info, features.join(", "))
}
