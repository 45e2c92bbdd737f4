//! Error types for the alertplot-core crate.

use thiserror::Error;

/// Errors raised while interpreting alert and series data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A sample value could not be converted to a float.
    #[error("sample value not float: {value}")]
    Conversion {
        /// The raw value as returned by the metrics backend.
        value: String,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
