/// Convenience result type used across Strata.
pub type StrataResult<T> = Result<T, StrataError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum StrataError {
    /// Invalid stack index, insertion point, or other caller-supplied data.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation that is well-formed but rejected in the current
    /// document state (merge onto an adjustment layer, reentrant
    /// execution, export in preview mode). Rejections are atomic.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// An adjustment kernel misbehaved (failed, or changed the target
    /// image dimensions).
    #[error("kernel error: {0}")]
    Kernel(String),

    /// Errors when serializing or deserializing stack scripts.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Write failures and unsupported export formats.
    #[error("io error: {0}")]
    Io(String),

    /// Wrapped lower-level error from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StrataError {
    /// Build a [`StrataError::Configuration`] value.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`StrataError::InvalidOperation`] value.
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Build a [`StrataError::Kernel`] value.
    pub fn kernel(msg: impl Into<String>) -> Self {
        Self::Kernel(msg.into())
    }

    /// Build a [`StrataError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build a [`StrataError::Io`] value.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
