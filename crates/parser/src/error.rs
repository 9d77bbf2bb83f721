/// Errors raised while lexing, classifying or extracting a statement.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("unterminated {what} starting at offset {offset}")]
    Unterminated { what: &'static str, offset: usize },

    #[error("expected {expected}, found {found}")]
    Expected { expected: String, found: String },

    #[error("no table name after {keyword}")]
    MissingTable { keyword: &'static str },

    /// A statement head or clause outside the accepted dialect.
    #[error("unsupported statement: {0}")]
    UnsupportedStatement(String),

    /// `OR`, parenthesised groups and similar shapes that cannot be expressed
    /// as a flat list of filters.
    #[error("predicate not understood in '{clause}': {reason}")]
    UnsupportedPredicate { clause: String, reason: String },

    /// Positions are 1-based.
    #[error("missing value for parameter #{position}")]
    MissingParameter { position: usize },

    #[error("{unused} parameter(s) left unused after binding {consumed}")]
    UnusedParameters { consumed: usize, unused: usize },

    #[error("INSERT lists {columns} column(s) but {values} value(s)")]
    ColumnCountMismatch { columns: usize, values: usize },

    #[error("invalid datetime modifier '{0}'")]
    InvalidModifier(String),
}

impl ParseError {
    pub(crate) fn expected(expected: impl Into<String>, found: impl Into<String>) -> Self {
        ParseError::Expected {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
