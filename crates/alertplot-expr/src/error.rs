//! Error types for the alertplot-expr crate.

use thiserror::Error;

/// Errors that can occur while analyzing an alerting expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    /// The expression is not valid PromQL.
    #[error("parse error at position {position}: {reason}")]
    Parse {
        /// Byte offset into the expression where the error was detected.
        position: usize,
        /// What went wrong.
        reason: String,
    },
}

impl ExprError {
    pub(crate) fn parse(position: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            position,
            reason: reason.into(),
        }
    }
}

/// Result type for expression operations.
pub type Result<T> = std::result::Result<T, ExprError>;
