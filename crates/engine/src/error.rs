use crate::request::Method;
use sqlrest_parser::ParseError;
use std::time::Duration;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure to complete an HTTP exchange at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("http error: {0}")]
    Http(String),

    #[error("cannot start the http runtime: {0}")]
    Runtime(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value {value:?} for {name}")]
    InvalidVar { name: &'static str, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot parse `{sql}`: {source}")]
    Parse { sql: String, source: ParseError },

    /// Some WHERE conjuncts matched no known shape; sending the rest would
    /// widen the result set.
    #[error("{count} predicate(s) not understood on {table}: {clause}")]
    UnrecognizedPredicates {
        table: String,
        clause: String,
        count: usize,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The store answered with a status the method does not accept.
    #[error("{method} {table} returned {status}: {body}")]
    Status {
        method: Method,
        table: String,
        status: u16,
        body: String,
    },

    #[error("cannot decode {context}: {source}")]
    Decode {
        context: String,
        source: serde_json::Error,
    },

    #[error("no column named {0:?}")]
    MissingColumn(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
