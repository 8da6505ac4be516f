use std::fmt;

use sensorchan_bus::BusError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn bus_error(context: &str, err: BusError) -> CliError {
    let code = match &err {
        BusError::Connection(_) | BusError::Transport(_) => TRANSPORT_ERROR,
        BusError::Remote { name, .. } if name.ends_with("AccessDenied") => PERMISSION_DENIED,
        BusError::Remote { .. } => FAILURE,
        BusError::ReplyType { .. } => DATA_INVALID,
        BusError::UnsupportedArguments { .. } => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use sensorchan_bus::ValueKind;

    use super::*;

    #[test]
    fn bus_errors_map_to_exit_codes() {
        let denied = BusError::Remote {
            name: "org.freedesktop.DBus.Error.AccessDenied".to_string(),
            message: "not allowed".to_string(),
        };
        assert_eq!(bus_error("request", denied).code, PERMISSION_DENIED);
        assert_eq!(
            bus_error("load", BusError::Connection("no bus".to_string())).code,
            TRANSPORT_ERROR
        );
        let mismatch = BusError::ReplyType {
            method: "hwBuffering".to_string(),
            expected: ValueKind::Bool,
        };
        let err = bus_error("info", mismatch);
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("info: "));
    }
}
