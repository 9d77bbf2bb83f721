use serde_json::Value;
use std::fmt;

/// Filter operators understood by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    /// Case-insensitive pattern match, sent as `ilike`.
    Like,
    IsNull,
    IsNotNull,
    In,
    NotIn,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    /// Prefix used on the right-hand side of `column=op.value`.
    pub fn prefix(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Like => "ilike",
            FilterOp::IsNull => "is",
            FilterOp::IsNotNull => "not.is",
            FilterOp::In => "in",
            FilterOp::NotIn => "not.in",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Null checks carry no operand.
    None,
    Scalar(Value),
    List(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterTerm {
    pub column: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl FilterTerm {
    pub fn scalar(column: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            column: column.into(),
            op,
            value: FilterValue::Scalar(value),
        }
    }

    pub fn null_check(column: impl Into<String>, negated: bool) -> Self {
        Self {
            column: column.into(),
            op: if negated {
                FilterOp::IsNotNull
            } else {
                FilterOp::IsNull
            },
            value: FilterValue::None,
        }
    }

    pub fn list(column: impl Into<String>, negated: bool, values: Vec<Value>) -> Self {
        Self {
            column: column.into(),
            op: if negated { FilterOp::NotIn } else { FilterOp::In },
            value: FilterValue::List(values),
        }
    }

    /// Right-hand side of the query parameter, e.g. `gte.30` or `in.(1,2)`.
    pub fn encode(&self) -> String {
        let prefix = self.op.prefix();
        match &self.value {
            FilterValue::None => format!("{prefix}.null"),
            FilterValue::Scalar(v) => format!("{prefix}.{}", render_value(v)),
            FilterValue::List(items) => {
                let items: Vec<String> = items.iter().map(render_list_item).collect();
                format!("{prefix}.({})", items.join(","))
            }
        }
    }

    pub fn query_pair(&self) -> (String, String) {
        (self.column.clone(), self.encode())
    }
}

impl fmt::Display for FilterTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.column, self.encode())
    }
}

/// Compiled WHERE clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    /// Clause text as written, for diagnostics.
    pub text: String,
    pub terms: Vec<FilterTerm>,
    /// Conjuncts that matched no known shape, verbatim.
    pub unrecognized: Vec<String>,
}

impl WhereClause {
    pub fn is_fully_recognized(&self) -> bool {
        self.unrecognized.is_empty()
    }

    pub fn query_pairs(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.terms.iter().map(FilterTerm::query_pair)
    }
}

/// Render a scalar the way it appears in a filter or query string.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_list_item(value: &Value) -> String {
    let raw = render_value(value);
    if raw.contains([',', '(', ')', '"']) {
        format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        raw
    }
}
