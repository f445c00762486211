use std::time::Duration;

use thiserror::Error;

/// Why an `enter` call returned without admitting the caller.
///
/// In both cases the area's counters are left exactly as they were before
/// the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnterError {
    #[error("wait for area '{area}' was cancelled")]
    Cancelled { area: String },

    #[error("wait for area '{area}' timed out after {after:?}")]
    TimedOut { area: String, after: Duration },
}

impl EnterError {
    pub fn area(&self) -> &str {
        match self {
            EnterError::Cancelled { area } | EnterError::TimedOut { area, .. } => area,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EnterError::Cancelled { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("an area named '{0}' is already registered")]
    Duplicate(String),

    #[error("no area named '{0}'")]
    Unknown(String),
}
