//! Lowering of a bound [`Statement`] into one REST call.

use serde_json::Value;
use sqlrest_parser::{Statement, WhereClause};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Statuses treated as success for this method.
    pub fn accepts(&self, status: u16) -> bool {
        match self {
            Method::Get => status == 200,
            Method::Post => matches!(status, 200 | 201),
            Method::Patch | Method::Delete => matches!(status, 200 | 204),
        }
    }

    /// Writes ask the store to echo the affected rows back.
    pub fn wants_representation(&self) -> bool {
        matches!(self, Method::Post | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: Method,
    pub table: String,
    /// Query parameters in the order they are sent.
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RestRequest {
    pub fn new(method: Method, table: impl Into<String>) -> Self {
        Self {
            method,
            table: table.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_filter(mut self, filter: &WhereClause) -> Self {
        self.query.extend(filter.query_pairs());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Unencoded `k=v&k=v`, as it reads in logs.
    pub fn query_string(&self) -> String {
        self.query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if self.query.is_empty() {
            format!("{base}/rest/v1/{}", self.table)
        } else {
            format!("{base}/rest/v1/{}?{}", self.table, self.query_string())
        }
    }
}

impl fmt::Display for RestRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.table)?;
        if !self.query.is_empty() {
            write!(f, "?{}", self.query_string())?;
        }
        Ok(())
    }
}

/// The REST call for `statement`, or `None` when it is answered locally.
///
/// `COUNT(*)` fetches only `primary_key` and is counted client-side.
pub fn plan(statement: &Statement, primary_key: &str) -> Option<RestRequest> {
    let request = match statement {
        Statement::Select(select) => {
            let mut request =
                RestRequest::new(Method::Get, &select.table).with_filter(&select.filter);
            if let Some(order) = select.order_param() {
                request = request.with_param("order", order);
            }
            if let Some(limit) = select.limit {
                request = request.with_param("limit", limit.to_string());
            }
            if let Some(offset) = select.offset {
                request = request.with_param("offset", offset.to_string());
            }
            request.with_param("select", select.columns.to_select_param())
        }
        Statement::Count(count) => RestRequest::new(Method::Get, &count.table)
            .with_filter(&count.filter)
            .with_param("select", primary_key),
        Statement::Insert(insert) => RestRequest::new(Method::Post, &insert.table)
            .with_body(Value::Object(insert.record.clone())),
        Statement::Update(update) => RestRequest::new(Method::Patch, &update.table)
            .with_filter(&update.filter)
            .with_body(Value::Object(update.assignments.clone())),
        Statement::Delete(delete) => {
            RestRequest::new(Method::Delete, &delete.table).with_filter(&delete.filter)
        }
        Statement::LastInsertId | Statement::Ignored { .. } => return None,
    };
    Some(request)
}
