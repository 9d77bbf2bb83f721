use crate::config::{DEFAULT_PRIMARY_KEY, ErrorPolicy, RestConfig};
use crate::error::{Error, Result};
use crate::request::{self, Method, RestRequest};
use crate::rows::ResultSet;
use crate::transport::{HttpTransport, Transport};
use log::{debug, warn};
use serde_json::Value;
use sqlrest_parser::{Statement, StatementKind};
use std::cell::Cell;
use std::marker::PhantomData;

/// Column name of the `SELECT last_insert_rowid()` result.
pub const LAST_INSERT_ID_COLUMN: &str = "last_insert_rowid()";

const LOG_BODY_LIMIT: usize = 200;

/// SQL-shaped facade over a PostgREST-style store.
///
/// Every call to [`execute`](Connection::execute) is an independent HTTP
/// request. The only state is the primary key of the last successful
/// insert, which is why a connection belongs to a single caller: it can be
/// moved to another thread but not shared between threads.
///
/// ```compile_fail
/// fn shared<T: Sync>() {}
/// shared::<sqlrest_engine::Connection>();
/// ```
pub struct Connection<T: Transport = HttpTransport> {
    transport: T,
    policy: ErrorPolicy,
    primary_key: String,
    last_insert_id: Option<Value>,
    _not_sync: PhantomData<Cell<()>>,
}

impl Connection<HttpTransport> {
    pub fn open(config: &RestConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::with_transport(transport)
            .set_policy(config.policy)
            .set_primary_key(config.primary_key.clone()))
    }

    pub fn from_env() -> Result<Self> {
        Self::open(&RestConfig::from_env()?)
    }
}

impl<T: Transport> Connection<T> {
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            policy: ErrorPolicy::default(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
            last_insert_id: None,
            _not_sync: PhantomData,
        }
    }

    pub fn set_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Primary key returned by the most recent successful insert.
    pub fn last_insert_id(&self) -> Option<&Value> {
        self.last_insert_id.as_ref()
    }

    /// Run one statement with positional `?` parameters.
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<ResultSet> {
        let statement = sqlrest_parser::parse(sql, params).map_err(|source| Error::Parse {
            sql: sql.to_string(),
            source,
        })?;
        self.run(statement)
    }

    fn run(&mut self, statement: Statement) -> Result<ResultSet> {
        match &statement {
            Statement::LastInsertId => {
                let id = self.last_insert_id.clone().unwrap_or(Value::Null);
                return Ok(ResultSet::single(LAST_INSERT_ID_COLUMN, id));
            }
            Statement::Ignored { table } => {
                debug!(
                    "[db] schema statement on {} ignored",
                    table.as_deref().unwrap_or("<none>")
                );
                return Ok(ResultSet::empty());
            }
            _ => {}
        }

        self.check_predicates(&statement)?;
        let Some(request) = request::plan(&statement, &self.primary_key) else {
            return Ok(ResultSet::empty());
        };
        let rows = self.send(&request)?;

        match statement {
            Statement::Count(count) => Ok(ResultSet::single(
                &count.label,
                Value::from(rows.len() as u64),
            )),
            Statement::Insert(insert) if !rows.is_empty() => {
                let id = rows
                    .fetch_one()
                    .and_then(|row| row.get(&self.primary_key))
                    .cloned();
                if id.is_none() {
                    warn!(
                        "[db] insert into {} returned no {} column",
                        insert.table, self.primary_key
                    );
                }
                self.last_insert_id = id.clone();
                Ok(rows.with_last_insert_id(id))
            }
            _ => Ok(rows),
        }
    }

    /// Unrecognized conjuncts fail the call, except for reads under
    /// [`ErrorPolicy::FailSoft`]. Writes never drop a filter.
    fn check_predicates(&self, statement: &Statement) -> Result<()> {
        let Some(filter) = statement.filter() else {
            return Ok(());
        };
        if filter.is_fully_recognized() {
            return Ok(());
        }
        let table = statement.table().unwrap_or_default();
        let destructive = matches!(
            statement.kind(),
            StatementKind::Update | StatementKind::Delete
        );
        if self.policy == ErrorPolicy::FailSoft && !destructive {
            warn!(
                "[db] {}: skipping {} unrecognized predicate(s): {}",
                table,
                filter.unrecognized.len(),
                filter.unrecognized.join(" AND ")
            );
            return Ok(());
        }
        Err(Error::UnrecognizedPredicates {
            table: table.to_string(),
            clause: filter.text.clone(),
            count: filter.unrecognized.len(),
        })
    }

    fn send(&self, request: &RestRequest) -> Result<ResultSet> {
        debug!("[db] {request}");
        let outcome = self
            .transport
            .send(request)
            .map_err(Error::from)
            .and_then(|response| {
                if !request.method.accepts(response.status) {
                    return Err(Error::Status {
                        method: request.method,
                        table: request.table.clone(),
                        status: response.status,
                        body: truncate(&response.body, LOG_BODY_LIMIT),
                    });
                }
                ResultSet::from_json(&request.table, &response.body)
            });

        match outcome {
            Ok(rows) => {
                if rows.is_empty() && request.method == Method::Get {
                    debug!("[db] {} {}: no rows", request.method, request.table);
                }
                Ok(rows)
            }
            Err(err) if self.policy == ErrorPolicy::FailSoft => {
                warn!(
                    "[db] {} {} failed, continuing with an empty result: {}",
                    request.method, request.table, err
                );
                Ok(ResultSet::empty())
            }
            Err(err) => Err(err),
        }
    }
}

fn truncate(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_bodies_on_char_boundaries() {
        let body = "é".repeat(250);
        let short = truncate(&body, LOG_BODY_LIMIT);
        assert_eq!(short.chars().count(), LOG_BODY_LIMIT + 3);
        assert!(short.ends_with("..."));
        assert_eq!(truncate("not found", LOG_BODY_LIMIT), "not found");
    }
}
