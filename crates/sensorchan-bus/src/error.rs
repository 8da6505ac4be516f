use crate::value::ValueKind;

/// Errors reported by the control bus.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BusError {
    /// Could not connect to the message bus.
    #[error("bus connection failed: {0}")]
    Connection(String),

    /// The remote object answered with an error reply.
    #[error("remote error {name}: {message}")]
    Remote { name: String, message: String },

    /// The reply did not carry the expected type.
    #[error("unexpected reply to {method} (expected {expected})")]
    ReplyType { method: String, expected: ValueKind },

    /// The argument list has no wire mapping.
    #[error("unsupported argument signature for {method}")]
    UnsupportedArguments { method: String },

    /// The call could not be delivered or answered.
    #[error("bus transport error: {0}")]
    Transport(String),
}

#[cfg(feature = "system-bus")]
impl From<zbus::Error> for BusError {
    fn from(err: zbus::Error) -> Self {
        match err {
            zbus::Error::MethodError(name, message, _) => BusError::Remote {
                name: name.to_string(),
                message: message.unwrap_or_default(),
            },
            other => BusError::Transport(other.to_string()),
        }
    }
}

#[cfg(feature = "system-bus")]
impl From<zbus::fdo::Error> for BusError {
    fn from(err: zbus::fdo::Error) -> Self {
        use zbus::DBusError;

        match err {
            zbus::fdo::Error::ZBus(inner) => inner.into(),
            other => BusError::Remote {
                name: other.name().to_string(),
                message: other.description().unwrap_or_default().to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, BusError>;
