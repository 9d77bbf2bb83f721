//! Per-statement clause extractors.

use crate::error::ParseError;
use crate::filter::WhereClause;
use crate::lexer::{CompareOp, Cursor, Token, TokenKind, describe};
use crate::operand::{parse_column, parse_operand};
use crate::params::Params;
use crate::predicate::{compile_where, span_text};
use crate::statement::{
    CountStatement, DeleteStatement, InsertStatement, NullsOrder, OrderTerm, SelectColumns,
    SelectStatement, Statement, UpdateStatement,
};
use serde_json::{Map, Value};

const COUNT_LABEL: &str = "COUNT(*)";

/// Words that end a FROM item; anything else after the table is an alias.
const CLAUSE_WORDS: &[&str] = &[
    "where", "order", "limit", "offset", "group", "having", "union", "join", "left", "right",
    "inner", "outer", "cross", "full", "natural", "on", "using", "returning",
];

const JOIN_WORDS: &[&str] = &[
    "join", "left", "right", "inner", "outer", "cross", "full", "natural",
];

/// Index of the first `keyword` at parenthesis depth zero, starting at `from`.
pub(crate) fn find_keyword(tokens: &[Token], from: usize, keyword: &str) -> Option<usize> {
    find_any(tokens, from, &[keyword])
}

fn find_any(tokens: &[Token], from: usize, keywords: &[&str]) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth = depth.saturating_sub(1),
            _ if idx >= from && depth == 0 && keywords.iter().any(|k| token.is_keyword(k)) => {
                return Some(idx);
            }
            _ => {}
        }
    }
    None
}

/// Table name after FROM/INTO/UPDATE/TABLE/ON: bare, quoted or bracketed,
/// schema prefix dropped, lowercased.
pub(crate) fn read_table(
    cursor: &mut Cursor<'_>,
    keyword: &'static str,
) -> Result<String, ParseError> {
    let name = parse_column(cursor).ok_or(ParseError::MissingTable { keyword })?;
    Ok(name.to_ascii_lowercase())
}

fn skip_alias(cursor: &mut Cursor<'_>) {
    if cursor.eat_keyword("as") {
        cursor.advance();
        return;
    }
    let is_alias = match cursor.peek().map(|t| &t.kind) {
        Some(TokenKind::Word(w)) => !CLAUSE_WORDS.iter().any(|k| w.eq_ignore_ascii_case(k)),
        Some(TokenKind::Quoted(_)) => true,
        _ => false,
    };
    if is_alias {
        cursor.advance();
    }
}

/// Split on commas at parenthesis depth zero.
fn split_list(tokens: &[Token]) -> Vec<&[Token]> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth = depth.saturating_sub(1),
            TokenKind::Comma if depth == 0 => {
                items.push(&tokens[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    items.push(&tokens[start..]);
    items
}

fn unsupported(what: impl Into<String>) -> ParseError {
    ParseError::UnsupportedStatement(what.into())
}

fn where_span(
    sql: &str,
    tokens: &[Token],
    params: &mut Params<'_>,
) -> Result<WhereClause, ParseError> {
    compile_where(span_text(sql, tokens), params)
}

/// SELECT cols FROM table [alias] [WHERE ..] [ORDER BY ..] [LIMIT n] [OFFSET n]
pub(crate) fn select(
    sql: &str,
    tokens: &[Token],
    params: &mut Params<'_>,
) -> Result<Statement, ParseError> {
    let from =
        find_keyword(tokens, 1, "from").ok_or_else(|| unsupported("SELECT without FROM"))?;
    let column_tokens = &tokens[1..from];
    if column_tokens.first().is_some_and(|t| t.is_keyword("distinct")) {
        return Err(unsupported("SELECT DISTINCT"));
    }
    let count_label = count_label(column_tokens)?;
    let columns = match count_label {
        Some(_) => SelectColumns::All,
        None => select_columns(sql, column_tokens)?,
    };

    let mut cursor = Cursor::new(tokens);
    cursor.seek(from + 1);
    let table = read_table(&mut cursor, "FROM")?;
    skip_alias(&mut cursor);

    let mut filter = WhereClause::default();
    let mut order = Vec::new();
    let mut limit = None;
    let mut offset = None;
    while let Some(token) = cursor.peek() {
        if token.is_keyword("where") {
            let start = cursor.position() + 1;
            let end = find_any(
                tokens,
                start,
                &["order", "limit", "offset", "group", "having", "union"],
            )
            .unwrap_or(tokens.len());
            filter = where_span(sql, &tokens[start..end], params)?;
            cursor.seek(end);
        } else if token.is_keyword("order") {
            cursor.advance();
            cursor.expect_keyword("by")?;
            let start = cursor.position();
            let end = find_any(tokens, start, &["limit", "offset", "group", "having", "union"])
                .unwrap_or(tokens.len());
            order = order_terms(sql, &tokens[start..end])?;
            cursor.seek(end);
        } else if token.is_keyword("limit") {
            cursor.advance();
            limit = Some(row_count(&mut cursor, params, "LIMIT")?);
        } else if token.is_keyword("offset") {
            cursor.advance();
            offset = Some(row_count(&mut cursor, params, "OFFSET")?);
        } else if token.kind == TokenKind::Comma || JOIN_WORDS.iter().any(|k| token.is_keyword(k))
        {
            return Err(unsupported("JOIN and multi-table FROM"));
        } else if ["group", "having", "union"]
            .iter()
            .any(|k| token.is_keyword(k))
        {
            return Err(unsupported(format!(
                "{} clause",
                token.word().unwrap_or_default().to_ascii_uppercase()
            )));
        } else {
            return Err(ParseError::expected(
                "WHERE, ORDER BY, LIMIT or OFFSET",
                token.describe(),
            ));
        }
    }

    Ok(match count_label {
        Some(label) => Statement::Count(CountStatement {
            table,
            filter,
            label,
        }),
        None => Statement::Select(SelectStatement {
            table,
            columns,
            filter,
            order,
            limit,
            offset,
        }),
    })
}

/// `COUNT(*)` with an optional alias. Other aggregates are rejected.
fn count_label(tokens: &[Token]) -> Result<Option<String>, ParseError> {
    let mut cursor = Cursor::new(tokens);
    if !cursor.eat_keyword("count") || !cursor.eat(&TokenKind::LParen) {
        return Ok(None);
    }
    if !(cursor.eat(&TokenKind::Star) && cursor.eat(&TokenKind::RParen)) {
        return Err(unsupported("COUNT over an expression"));
    }
    if cursor.at_end() {
        return Ok(Some(COUNT_LABEL.to_string()));
    }
    cursor.eat_keyword("as");
    let label = match cursor.advance().map(|t| &t.kind) {
        Some(TokenKind::Word(w)) | Some(TokenKind::Quoted(w)) => w.clone(),
        _ => return Err(unsupported("COUNT(*) with other columns")),
    };
    if !cursor.at_end() {
        return Err(unsupported("COUNT(*) with other columns"));
    }
    Ok(Some(label))
}

fn select_columns(sql: &str, tokens: &[Token]) -> Result<SelectColumns, ParseError> {
    let mut names = Vec::new();
    let mut all = false;
    for item in split_list(tokens) {
        let is_star = match item {
            [only] => only.kind == TokenKind::Star,
            [_, dot, star] => dot.kind == TokenKind::Dot && star.kind == TokenKind::Star,
            _ => false,
        };
        if is_star {
            all = true;
            continue;
        }
        let bad_column =
            || unsupported(format!("column expression '{}'", span_text(sql, item)));
        let mut cursor = Cursor::new(item);
        let name = parse_column(&mut cursor).ok_or_else(bad_column)?;
        if cursor.eat_keyword("as") {
            cursor.advance();
        } else if cursor
            .peek()
            .is_some_and(|t| matches!(t.kind, TokenKind::Word(_) | TokenKind::Quoted(_)))
        {
            cursor.advance();
        }
        if !cursor.at_end() {
            return Err(bad_column());
        }
        names.push(name);
    }
    Ok(if all || names.is_empty() {
        SelectColumns::All
    } else {
        SelectColumns::Named(names)
    })
}

fn order_terms(sql: &str, tokens: &[Token]) -> Result<Vec<OrderTerm>, ParseError> {
    let mut terms = Vec::new();
    for item in split_list(tokens) {
        let mut cursor = Cursor::new(item);
        let column = parse_column(&mut cursor)
            .ok_or_else(|| ParseError::expected("ORDER BY column", describe(item.first())))?;
        let descending = if cursor.eat_keyword("desc") {
            true
        } else {
            cursor.eat_keyword("asc");
            false
        };
        let mut nulls = None;
        if cursor.eat_keyword("nulls") {
            if cursor.eat_keyword("first") {
                nulls = Some(NullsOrder::First);
            } else {
                cursor.expect_keyword("last")?;
                nulls = Some(NullsOrder::Last);
            }
        }
        if !cursor.at_end() {
            return Err(unsupported(format!(
                "ORDER BY expression '{}'",
                span_text(sql, item)
            )));
        }
        terms.push(OrderTerm {
            column,
            descending,
            nulls,
        });
    }
    Ok(terms)
}

/// Integer literal or `?` after LIMIT/OFFSET.
fn row_count(
    cursor: &mut Cursor<'_>,
    params: &mut Params<'_>,
    clause: &str,
) -> Result<u64, ParseError> {
    let expected = || format!("integer after {clause}");
    let value = match cursor.advance() {
        Some(Token {
            kind: TokenKind::Number(n),
            ..
        }) => n.parse().ok(),
        Some(Token {
            kind: TokenKind::Placeholder,
            ..
        }) => match params.next()? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        },
        other => return Err(ParseError::expected(expected(), describe(other))),
    };
    value.ok_or_else(|| ParseError::expected(expected(), "a non-integer value"))
}

/// INSERT INTO table (c1, ...) VALUES (v1, ...)
pub(crate) fn insert(
    tokens: &[Token],
    params: &mut Params<'_>,
) -> Result<InsertStatement, ParseError> {
    let mut cursor = Cursor::new(tokens);
    cursor.expect_keyword("insert")?;
    cursor.expect_keyword("into")?;
    let table = read_table(&mut cursor, "INTO")?;
    if !cursor.eat(&TokenKind::LParen) {
        return Err(unsupported("INSERT without a column list"));
    }

    let mut columns = Vec::new();
    loop {
        let column = parse_column(&mut cursor)
            .ok_or_else(|| ParseError::expected("column name", describe(cursor.peek())))?;
        columns.push(column);
        if cursor.eat(&TokenKind::RParen) {
            break;
        }
        cursor.expect(&TokenKind::Comma, "',' or ')'")?;
    }

    cursor.expect_keyword("values")?;
    cursor.expect(&TokenKind::LParen, "'('")?;
    let mut values = Vec::new();
    loop {
        let operand = parse_operand(&mut cursor).ok_or_else(|| {
            unsupported(format!("VALUES item {}", describe(cursor.peek())))
        })?;
        values.push(operand);
        if cursor.eat(&TokenKind::RParen) {
            break;
        }
        cursor.expect(&TokenKind::Comma, "',' or ')'")?;
    }
    match cursor.peek() {
        None => {}
        Some(t) if t.kind == TokenKind::Comma => return Err(unsupported("multi-row INSERT")),
        Some(t) => return Err(unsupported(format!("INSERT followed by {}", t.describe()))),
    }

    if columns.len() != values.len() {
        return Err(ParseError::ColumnCountMismatch {
            columns: columns.len(),
            values: values.len(),
        });
    }
    let mut record = Map::new();
    for (column, operand) in columns.into_iter().zip(values) {
        record.insert(column, operand.bind(params)?);
    }
    Ok(InsertStatement { table, record })
}

/// UPDATE table SET c1 = v1, ... [WHERE ..]
///
/// SET values are bound before the WHERE placeholders.
pub(crate) fn update(
    sql: &str,
    tokens: &[Token],
    params: &mut Params<'_>,
) -> Result<UpdateStatement, ParseError> {
    let mut cursor = Cursor::new(tokens);
    cursor.expect_keyword("update")?;
    let table = read_table(&mut cursor, "UPDATE")?;
    cursor.expect_keyword("set")?;

    let start = cursor.position();
    let where_at = find_keyword(tokens, start, "where");
    let set_end = where_at.unwrap_or(tokens.len());
    let mut assignments = Map::new();
    for item in split_list(&tokens[start..set_end]) {
        let mut cursor = Cursor::new(item);
        let column = parse_column(&mut cursor)
            .ok_or_else(|| ParseError::expected("column name", describe(item.first())))?;
        cursor.expect(&TokenKind::Op(CompareOp::Eq), "'='")?;
        let operand = parse_operand(&mut cursor)
            .filter(|_| cursor.at_end())
            .ok_or_else(|| unsupported(format!("assignment '{}'", span_text(sql, item))))?;
        assignments.insert(column, operand.bind(params)?);
    }

    let filter = match where_at {
        Some(idx) => where_span(sql, &tokens[idx + 1..], params)?,
        None => WhereClause::default(),
    };
    Ok(UpdateStatement {
        table,
        assignments,
        filter,
    })
}

/// DELETE FROM table [WHERE ..]
pub(crate) fn delete(
    sql: &str,
    tokens: &[Token],
    params: &mut Params<'_>,
) -> Result<DeleteStatement, ParseError> {
    let mut cursor = Cursor::new(tokens);
    cursor.expect_keyword("delete")?;
    cursor.expect_keyword("from")?;
    let table = read_table(&mut cursor, "FROM")?;
    let filter = if cursor.at_end() {
        WhereClause::default()
    } else {
        cursor.expect_keyword("where")?;
        where_span(sql, &tokens[cursor.position()..], params)?
    };
    Ok(DeleteStatement { table, filter })
}
