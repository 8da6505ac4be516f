use serde::Serialize;

/// Sensor error codes shared with the daemon.
///
/// The numeric values are wire-stable: the daemon reports them through the
/// `errorCodeInt` property. Values this client does not know are kept as
/// [`SensorError::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, thiserror::Error)]
pub enum SensorError {
    #[default]
    #[error("no error")]
    NoError,
    #[error("not connected")]
    NotConnected,
    #[error("sensor not loaded")]
    NotLoaded,
    #[error("sensor not available")]
    NotAvailable,
    #[error("permission denied")]
    Permission,
    #[error("client socket error")]
    ClientSocketError,
    #[error("unknown error {0}")]
    Unknown(i32),
}

impl SensorError {
    /// Widen a raw wire code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => SensorError::NoError,
            1 => SensorError::NotConnected,
            2 => SensorError::NotLoaded,
            3 => SensorError::NotAvailable,
            4 => SensorError::Permission,
            5 => SensorError::ClientSocketError,
            other => SensorError::Unknown(other),
        }
    }

    /// Raw wire code.
    pub fn code(self) -> i32 {
        match self {
            SensorError::NoError => 0,
            SensorError::NotConnected => 1,
            SensorError::NotLoaded => 2,
            SensorError::NotAvailable => 3,
            SensorError::Permission => 4,
            SensorError::ClientSocketError => 5,
            SensorError::Unknown(code) => code,
        }
    }

    pub fn is_error(self) -> bool {
        self != SensorError::NoError
    }
}

/// Locally raised error of a channel.
///
/// A set local error shadows whatever the daemon reports until it is
/// cleared, so it must be cleared before each operation or a stale error
/// hides a newer remote one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorState {
    code: SensorError,
    message: String,
}

impl ErrorState {
    pub fn clear(&mut self) {
        self.code = SensorError::NoError;
        self.message.clear();
    }

    pub fn set(&mut self, code: SensorError, message: impl Into<String>) {
        self.code = code;
        self.message = message.into();
    }

    pub fn code(&self) -> SensorError {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_set(&self) -> bool {
        self.code.is_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_both_ways() {
        for code in 0..=5 {
            assert_eq!(SensorError::from_code(code).code(), code);
        }
        assert_eq!(SensorError::from_code(5), SensorError::ClientSocketError);
    }

    #[test]
    fn unknown_codes_are_preserved() {
        let err = SensorError::from_code(42);
        assert_eq!(err, SensorError::Unknown(42));
        assert_eq!(err.code(), 42);
        assert_eq!(err.to_string(), "unknown error 42");
        assert!(SensorError::from_code(-3).is_error());
    }

    #[test]
    fn error_state_set_and_clear() {
        let mut state = ErrorState::default();
        assert!(!state.is_set());

        state.set(SensorError::ClientSocketError, "Socket connection failed.");
        assert!(state.is_set());
        assert_eq!(state.code(), SensorError::ClientSocketError);
        assert_eq!(state.message(), "Socket connection failed.");

        state.clear();
        assert_eq!(state, ErrorState::default());
    }
}
