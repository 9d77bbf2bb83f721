//! Runs SQL statements against a PostgREST-style REST endpoint.
//!
//! ```no_run
//! use serde_json::json;
//! use sqlrest_engine::Connection;
//!
//! let mut db = Connection::from_env()?;
//! db.execute(
//!     "INSERT INTO crm_leads (full_name, phone) VALUES (?, ?)",
//!     &[json!("Juan Pérez"), json!("+56911112222")],
//! )?;
//! let id = db.execute("SELECT last_insert_rowid()", &[])?;
//! println!("{}", id.fetch_one().map(|row| &row[0]).unwrap_or(&json!(null)));
//! # Ok::<(), sqlrest_engine::Error>(())
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod request;
pub mod rows;
pub mod transport;

pub use config::{ErrorPolicy, RestConfig};
pub use connection::{Connection, LAST_INSERT_ID_COLUMN};
pub use error::{ConfigError, Error, Result, TransportError};
pub use request::{Method, RestRequest, plan};
pub use rows::{ResultSet, Row};
pub use transport::{HttpTransport, RestResponse, Transport};

pub use sqlrest_parser as parser;
