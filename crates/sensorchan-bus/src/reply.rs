use crate::error::BusError;

/// Outcome of one blocking bus call.
///
/// A reply is either a valid value or the error that replaced it. Channel
/// operations hand replies back to the caller instead of failing, so the
/// caller decides whether an RPC error matters.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Reply<T> {
    result: Result<T, BusError>,
}

impl<T> Reply<T> {
    pub fn ok(value: T) -> Self {
        Self { result: Ok(value) }
    }

    pub fn err(error: BusError) -> Self {
        Self { result: Err(error) }
    }

    /// True if the call produced a value.
    pub fn is_valid(&self) -> bool {
        self.result.is_ok()
    }

    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&BusError> {
        self.result.as_ref().err()
    }

    pub fn into_value(self) -> Option<T> {
        self.result.ok()
    }

    pub fn into_result(self) -> Result<T, BusError> {
        self.result
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        Reply {
            result: self.result.map(f),
        }
    }
}

impl<T: Default> Reply<T> {
    /// The value, or `T::default()` if the call failed.
    pub fn value_or_default(self) -> T {
        self.result.unwrap_or_default()
    }
}

impl<T> From<Result<T, BusError>> for Reply<T> {
    fn from(result: Result<T, BusError>) -> Self {
        Self { result }
    }
}
