//! Shared primitives used across LiveTable crates.

use thiserror::Error;

/// Result alias used across the workspace.
pub type TableResult<T> = Result<T, TableError>;

/// Top-level error type for DOM mutation and table adaptation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// The table reference did not resolve to a `<table>` element, or a
    /// required section vanished after setup.
    #[error("no valid table found: {0}")]
    NotFound(String),
    /// Caller-supplied sizing or options are unusable.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("invalid selector `{0}`")]
    Selector(String),
    /// Tree mutation rejected (cycles, foreign nodes, non-element targets).
    #[error("invalid dom operation: {0}")]
    Dom(String),
}

impl TableError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn selector(selector: impl Into<String>) -> Self {
        Self::Selector(selector.into())
    }

    pub fn dom(message: impl Into<String>) -> Self {
        Self::Dom(message.into())
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "table.not_found",
            Self::Configuration(_) => "table.invalid_config",
            Self::Selector(_) => "dom.invalid_selector",
            Self::Dom(_) => "dom.invalid_operation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TableError;

    #[test]
    fn codes_are_stable_per_kind() {
        assert_eq!(TableError::not_found("#x").code(), "table.not_found");
        assert_eq!(
            TableError::configuration("empty widths").code(),
            "table.invalid_config"
        );
        assert_eq!(TableError::selector("tr[").code(), "dom.invalid_selector");
        assert_eq!(TableError::dom("cycle").code(), "dom.invalid_operation");
    }

    #[test]
    fn display_includes_context() {
        let error = TableError::not_found("#missing");
        assert_eq!(error.to_string(), "no valid table found: #missing");
    }
}
