use crate::error::ParseError;
use crate::lexer::{Cursor, TokenKind};
use crate::params::Params;
use chrono::{Duration, Utc};
use serde_json::Value;

const SQLITE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Right-hand side of a predicate, an assignment or a VALUES item.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Placeholder,
    Literal(Value),
    /// `datetime('now'[, modifier])` or `CURRENT_TIMESTAMP`, evaluated in UTC.
    Now { modifier: Option<String> },
}

impl Operand {
    pub fn is_null(&self) -> bool {
        matches!(self, Operand::Literal(Value::Null))
    }

    /// Resolve to a concrete value, consuming a parameter for `?`.
    pub fn bind(&self, params: &mut Params<'_>) -> Result<Value, ParseError> {
        match self {
            Operand::Placeholder => params.next(),
            Operand::Literal(v) => Ok(v.clone()),
            Operand::Now { modifier } => now_with_modifier(modifier.as_deref()).map(Value::String),
        }
    }
}

/// `col`, `alias.col`, `"col"` or `[col]`. Qualifiers are dropped.
pub(crate) fn parse_column(cursor: &mut Cursor<'_>) -> Option<String> {
    let mut name = identifier(&cursor.peek()?.kind)?;
    cursor.advance();
    while cursor.peek().is_some_and(|t| t.kind == TokenKind::Dot) {
        let next = cursor.peek_nth(1).and_then(|t| identifier(&t.kind))?;
        cursor.advance();
        cursor.advance();
        name = next;
    }
    Some(name)
}

fn identifier(kind: &TokenKind) -> Option<String> {
    match kind {
        TokenKind::Word(w) if !is_reserved(w) => Some(w.clone()),
        TokenKind::Quoted(q) => Some(q.clone()),
        _ => None,
    }
}

fn is_reserved(word: &str) -> bool {
    const RESERVED: &[&str] = &[
        "and", "or", "not", "null", "is", "in", "like", "between", "where", "from", "order",
        "limit", "offset", "set", "values", "select",
    ];
    RESERVED.iter().any(|r| word.eq_ignore_ascii_case(r))
}

pub(crate) fn parse_operand(cursor: &mut Cursor<'_>) -> Option<Operand> {
    let token = cursor.peek()?;
    let operand = match &token.kind {
        TokenKind::Placeholder => Operand::Placeholder,
        TokenKind::Str(s) => Operand::Literal(Value::String(s.clone())),
        TokenKind::Number(n) => Operand::Literal(number_value(n)),
        TokenKind::Word(w) if w.eq_ignore_ascii_case("null") => Operand::Literal(Value::Null),
        TokenKind::Word(w) if w.eq_ignore_ascii_case("true") => Operand::Literal(Value::Bool(true)),
        TokenKind::Word(w) if w.eq_ignore_ascii_case("false") => {
            Operand::Literal(Value::Bool(false))
        }
        TokenKind::Word(w) if w.eq_ignore_ascii_case("current_timestamp") => {
            Operand::Now { modifier: None }
        }
        TokenKind::Word(w) if w.eq_ignore_ascii_case("datetime") => {
            return parse_datetime_call(cursor);
        }
        TokenKind::Word(w) if !is_reserved(w) => {
            // a bare function call is not a value
            if cursor
                .peek_nth(1)
                .is_some_and(|t| t.kind == TokenKind::LParen)
            {
                return None;
            }
            Operand::Literal(Value::String(w.clone()))
        }
        _ => return None,
    };
    cursor.advance();
    Some(operand)
}

/// `datetime('now')` or `datetime('now', '-7 days')`.
fn parse_datetime_call(cursor: &mut Cursor<'_>) -> Option<Operand> {
    cursor.advance();
    if !cursor.eat(&TokenKind::LParen) {
        return None;
    }
    match cursor.advance().map(|t| &t.kind) {
        Some(TokenKind::Str(s)) if s.eq_ignore_ascii_case("now") => {}
        _ => return None,
    }
    let mut modifier = None;
    if cursor.eat(&TokenKind::Comma) {
        match cursor.advance().map(|t| &t.kind) {
            Some(TokenKind::Str(s)) => modifier = Some(s.clone()),
            _ => return None,
        }
    }
    if !cursor.eat(&TokenKind::RParen) {
        return None;
    }
    Some(Operand::Now { modifier })
}

fn number_value(text: &str) -> Value {
    serde_json::from_str::<serde_json::Number>(text)
        .map(Value::Number)
        .unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Current UTC time shifted by an SQLite-style modifier such as `-7 days`.
pub fn now_with_modifier(modifier: Option<&str>) -> Result<String, ParseError> {
    let mut at = Utc::now();
    if let Some(modifier) = modifier {
        at += parse_modifier(modifier)?;
    }
    Ok(at.format(SQLITE_DATETIME_FORMAT).to_string())
}

fn parse_modifier(modifier: &str) -> Result<Duration, ParseError> {
    let invalid = || ParseError::InvalidModifier(modifier.to_string());
    let mut parts = modifier.split_whitespace();
    let amount: i64 = parts
        .next()
        .and_then(|n| n.trim_start_matches('+').parse().ok())
        .ok_or_else(invalid)?;
    let unit = parts.next().ok_or_else(invalid)?.to_ascii_lowercase();
    if parts.next().is_some() {
        return Err(invalid());
    }
    let duration = match unit.trim_end_matches('s') {
        "second" => Duration::seconds(amount),
        "minute" => Duration::minutes(amount),
        "hour" => Duration::hours(amount),
        "day" => Duration::days(amount),
        "week" => Duration::weeks(amount),
        _ => return Err(invalid()),
    };
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use chrono::NaiveDateTime;
    use serde_json::json;

    fn operand(sql: &str) -> Option<Operand> {
        let tokens = Lexer::new(sql).tokenize().unwrap();
        let mut cursor = Cursor::new(&tokens);
        parse_operand(&mut cursor).filter(|_| cursor.at_end())
    }

    #[test]
    fn literal_operands() {
        assert_eq!(operand("?"), Some(Operand::Placeholder));
        assert_eq!(operand("'sold'"), Some(Operand::Literal(json!("sold"))));
        assert_eq!(operand("42"), Some(Operand::Literal(json!(42))));
        assert_eq!(operand("2.5"), Some(Operand::Literal(json!(2.5))));
        assert_eq!(operand("NULL"), Some(Operand::Literal(Value::Null)));
        assert_eq!(operand("true"), Some(Operand::Literal(json!(true))));
        assert_eq!(operand("agendado"), Some(Operand::Literal(json!("agendado"))));
        assert_eq!(operand("lower(x)"), None);
    }

    #[test]
    fn datetime_call_operands() {
        assert_eq!(
            operand("datetime('now', '-7 days')"),
            Some(Operand::Now {
                modifier: Some("-7 days".into())
            })
        );
        assert_eq!(
            operand("CURRENT_TIMESTAMP"),
            Some(Operand::Now { modifier: None })
        );
        assert_eq!(operand("datetime('2024-01-01')"), None);
    }

    #[test]
    fn modifier_shifts_now() {
        let shifted = now_with_modifier(Some("-7 days")).unwrap();
        let shifted = NaiveDateTime::parse_from_str(&shifted, SQLITE_DATETIME_FORMAT).unwrap();
        let expected = (Utc::now() - Duration::days(7)).naive_utc();
        assert!((expected - shifted).num_seconds().abs() <= 5);
    }

    #[test]
    fn rejects_unknown_modifier() {
        assert_eq!(
            now_with_modifier(Some("start of month")).unwrap_err(),
            ParseError::InvalidModifier("start of month".into())
        );
    }

    #[test]
    fn column_drops_qualifier() {
        let tokens = Lexer::new("c.stage").tokenize().unwrap();
        let mut cursor = Cursor::new(&tokens);
        assert_eq!(parse_column(&mut cursor), Some("stage".to_string()));
        assert!(cursor.at_end());
    }
}
