use crate::error::ParseError;
use crate::extract;
use crate::filter::WhereClause;
use crate::lexer::{Cursor, Lexer, Token, TokenKind};
use crate::params::Params;
use serde_json::{Map, Value};

/// Function name the embedding application uses for "id of previous insert".
pub const LAST_INSERT_ID_FUNCTION: &str = "last_insert_rowid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Schema statements; accepted and answered with an empty result.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: StatementKind,
    pub table: Option<String>,
}

impl Classification {
    fn of(kind: StatementKind, table: Option<String>) -> Result<Self, ParseError> {
        Ok(Self { kind, table })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectColumns {
    All,
    Named(Vec<String>),
}

impl SelectColumns {
    /// Value of the `select=` query parameter.
    pub fn to_select_param(&self) -> String {
        match self {
            SelectColumns::All => "*".to_string(),
            SelectColumns::Named(names) => names.join(","),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: String,
    pub descending: bool,
    pub nulls: Option<NullsOrder>,
}

impl OrderTerm {
    /// `col.asc`, `col.desc`, optionally suffixed with `.nullsfirst`/`.nullslast`.
    pub fn encode(&self) -> String {
        let direction = if self.descending { "desc" } else { "asc" };
        match self.nulls {
            None => format!("{}.{direction}", self.column),
            Some(NullsOrder::First) => format!("{}.{direction}.nullsfirst", self.column),
            Some(NullsOrder::Last) => format!("{}.{direction}.nullslast", self.column),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub table: String,
    pub columns: SelectColumns,
    pub filter: WhereClause,
    pub order: Vec<OrderTerm>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectStatement {
    /// Value of the `order=` query parameter, if any.
    pub fn order_param(&self) -> Option<String> {
        if self.order.is_empty() {
            return None;
        }
        let terms: Vec<String> = self.order.iter().map(OrderTerm::encode).collect();
        Some(terms.join(","))
    }
}

/// `SELECT COUNT(*) FROM t ...`
#[derive(Debug, Clone, PartialEq)]
pub struct CountStatement {
    pub table: String,
    pub filter: WhereClause,
    /// Column name of the synthetic result.
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    pub record: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Map<String, Value>,
    pub filter: WhereClause,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub filter: WhereClause,
}

/// A fully bound statement. Lives for one call into the adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
    Count(CountStatement),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    /// `SELECT last_insert_rowid()`
    LastInsertId,
    Ignored { table: Option<String> },
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        match self {
            Statement::Select(_) | Statement::Count(_) | Statement::LastInsertId => {
                StatementKind::Select
            }
            Statement::Insert(_) => StatementKind::Insert,
            Statement::Update(_) => StatementKind::Update,
            Statement::Delete(_) => StatementKind::Delete,
            Statement::Ignored { .. } => StatementKind::Ignored,
        }
    }

    pub fn table(&self) -> Option<&str> {
        match self {
            Statement::Select(s) => Some(&s.table),
            Statement::Count(s) => Some(&s.table),
            Statement::Insert(s) => Some(&s.table),
            Statement::Update(s) => Some(&s.table),
            Statement::Delete(s) => Some(&s.table),
            Statement::LastInsertId => None,
            Statement::Ignored { table } => table.as_deref(),
        }
    }

    pub fn filter(&self) -> Option<&WhereClause> {
        match self {
            Statement::Select(s) => Some(&s.filter),
            Statement::Count(s) => Some(&s.filter),
            Statement::Update(s) => Some(&s.filter),
            Statement::Delete(s) => Some(&s.filter),
            Statement::Insert(_) | Statement::LastInsertId | Statement::Ignored { .. } => None,
        }
    }
}

/// Determine the statement kind and target table without binding anything.
pub fn classify(sql: &str) -> Result<Classification, ParseError> {
    let tokens = Lexer::new(sql).tokenize()?;
    classify_tokens(&tokens)
}

fn classify_tokens(tokens: &[Token]) -> Result<Classification, ParseError> {
    let mut cursor = Cursor::new(tokens);
    let Some(head) = cursor.advance() else {
        return Err(ParseError::UnsupportedStatement("empty statement".into()));
    };
    let Some(word) = head.word() else {
        return Err(ParseError::UnsupportedStatement(head.describe()));
    };

    match word.to_ascii_lowercase().as_str() {
        "select" => {
            let table = match extract::find_keyword(tokens, 1, "from") {
                Some(from) => {
                    cursor.seek(from + 1);
                    Some(extract::read_table(&mut cursor, "FROM")?)
                }
                None => None,
            };
            Classification::of(StatementKind::Select, table)
        }
        "insert" => {
            if cursor.check_keyword("or") {
                return Err(ParseError::UnsupportedStatement(
                    "INSERT OR ... conflict clauses".into(),
                ));
            }
            cursor.expect_keyword("into")?;
            let table = extract::read_table(&mut cursor, "INTO")?;
            Classification::of(StatementKind::Insert, Some(table))
        }
        "update" => {
            let table = extract::read_table(&mut cursor, "UPDATE")?;
            Classification::of(StatementKind::Update, Some(table))
        }
        "delete" => {
            cursor.expect_keyword("from")?;
            let table = extract::read_table(&mut cursor, "FROM")?;
            Classification::of(StatementKind::Delete, Some(table))
        }
        "create" => {
            cursor.eat_keyword("unique");
            if cursor.eat_keyword("index") {
                skip_if_exists(&mut cursor);
                cursor.advance();
                cursor.expect_keyword("on")?;
                let table = extract::read_table(&mut cursor, "ON")?;
                Classification::of(StatementKind::Ignored, Some(table))
            } else if cursor.eat_keyword("table") {
                skip_if_exists(&mut cursor);
                let table = extract::read_table(&mut cursor, "TABLE")?;
                Classification::of(StatementKind::Ignored, Some(table))
            } else {
                Err(ParseError::UnsupportedStatement(format!(
                    "CREATE {}",
                    crate::lexer::describe(cursor.peek())
                )))
            }
        }
        "alter" => {
            cursor.expect_keyword("table")?;
            let table = extract::read_table(&mut cursor, "TABLE")?;
            Classification::of(StatementKind::Ignored, Some(table))
        }
        "drop" => {
            if cursor.eat_keyword("table") {
                skip_if_exists(&mut cursor);
                let table = extract::read_table(&mut cursor, "TABLE")?;
                Classification::of(StatementKind::Ignored, Some(table))
            } else if cursor.eat_keyword("index") {
                Classification::of(StatementKind::Ignored, None)
            } else {
                Err(ParseError::UnsupportedStatement(format!(
                    "DROP {}",
                    crate::lexer::describe(cursor.peek())
                )))
            }
        }
        "pragma" => Classification::of(StatementKind::Ignored, None),
        other => Err(ParseError::UnsupportedStatement(other.to_ascii_uppercase())),
    }
}

fn skip_if_exists(cursor: &mut Cursor<'_>) {
    if cursor.eat_keyword("if") {
        cursor.eat_keyword("not");
        cursor.eat_keyword("exists");
    }
}

/// Parse `sql` and bind `params` into a [`Statement`].
///
/// Every parameter must be consumed exactly once; DDL ignores its parameters.
pub fn parse(sql: &str, params: &[Value]) -> Result<Statement, ParseError> {
    let mut tokens = Lexer::new(sql).tokenize()?;
    while tokens
        .last()
        .is_some_and(|t| t.kind == TokenKind::Semicolon)
    {
        tokens.pop();
    }

    if tokens.iter().any(|t| t.is_keyword(LAST_INSERT_ID_FUNCTION)) {
        return Ok(Statement::LastInsertId);
    }

    let classification = classify_tokens(&tokens)?;
    let mut params = Params::new(params);
    let statement = match classification.kind {
        StatementKind::Ignored => {
            return Ok(Statement::Ignored {
                table: classification.table,
            });
        }
        StatementKind::Select => extract::select(sql, &tokens, &mut params)?,
        StatementKind::Insert => Statement::Insert(extract::insert(&tokens, &mut params)?),
        StatementKind::Update => Statement::Update(extract::update(sql, &tokens, &mut params)?),
        StatementKind::Delete => Statement::Delete(extract::delete(sql, &tokens, &mut params)?),
    };
    params.finish()?;
    Ok(statement)
}
