//! WHERE-clause compiler.
//!
//! A clause is split into `AND` conjuncts, each conjunct is matched against a
//! fixed list of shapes, and matched shapes are bound against the positional
//! parameters and lowered to filter terms. Placeholders are consumed strictly
//! left to right across the whole clause.

use crate::error::ParseError;
use crate::filter::{FilterOp, FilterTerm, WhereClause};
use crate::lexer::{CompareOp, Cursor, Lexer, Token, TokenKind};
use crate::operand::{Operand, parse_column, parse_operand};
use crate::params::Params;
use serde_json::Value;
use std::ops::Range;

/// One recognised conjunct.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `1=1`, used to seed dynamically built clauses.
    Tautology,
    /// `UPPER(col) = UPPER(?)`
    CaseInsensitiveEq { column: String, value: Operand },
    Between {
        column: String,
        low: Operand,
        high: Operand,
    },
    /// `=`, `!=`, `<`, `<=`, `>`, `>=`
    Compare {
        column: String,
        op: CompareOp,
        value: Operand,
    },
    Like { column: String, pattern: Operand },
    NullCheck { column: String, negated: bool },
    InList {
        column: String,
        items: Vec<Operand>,
        negated: bool,
    },
}

impl Predicate {
    /// Bind operands in source order and produce filter terms.
    pub fn bind(&self, params: &mut Params<'_>) -> Result<Vec<FilterTerm>, ParseError> {
        let terms = match self {
            Predicate::Tautology => Vec::new(),
            Predicate::CaseInsensitiveEq { column, value } => {
                let value = escape_like(value.bind(params)?);
                vec![FilterTerm::scalar(column, FilterOp::Like, value)]
            }
            Predicate::Between { column, low, high } => {
                let low = low.bind(params)?;
                let high = high.bind(params)?;
                vec![
                    FilterTerm::scalar(column, FilterOp::Gte, low),
                    FilterTerm::scalar(column, FilterOp::Lte, high),
                ]
            }
            Predicate::Compare { column, op, value } => {
                let value = value.bind(params)?;
                vec![compare_term(column, *op, value)]
            }
            Predicate::Like { column, pattern } => {
                vec![FilterTerm::scalar(column, FilterOp::Like, pattern.bind(params)?)]
            }
            Predicate::NullCheck { column, negated } => {
                vec![FilterTerm::null_check(column, *negated)]
            }
            Predicate::InList {
                column,
                items,
                negated,
            } => {
                let values = items
                    .iter()
                    .map(|item| item.bind(params))
                    .collect::<Result<Vec<_>, _>>()?;
                vec![FilterTerm::list(column, *negated, values)]
            }
        };
        Ok(terms)
    }
}

/// Equality expressed as `ilike` must not treat `%`, `_` or `\` in the value
/// as pattern syntax.
fn escape_like(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let mut escaped = String::with_capacity(s.len());
            for c in s.chars() {
                if matches!(c, '%' | '_' | '\\') {
                    escaped.push('\\');
                }
                escaped.push(c);
            }
            Value::String(escaped)
        }
        other => other,
    }
}

fn compare_term(column: &str, op: CompareOp, value: Value) -> FilterTerm {
    match (op, value) {
        // `col = ?` bound to null means IS NULL, not the string "null"
        (CompareOp::Eq, Value::Null) => FilterTerm::null_check(column, false),
        (CompareOp::NotEq, Value::Null) => FilterTerm::null_check(column, true),
        (op, value) => {
            let op = match op {
                CompareOp::Eq => FilterOp::Eq,
                CompareOp::NotEq => FilterOp::Neq,
                CompareOp::Lt => FilterOp::Lt,
                CompareOp::LtEq => FilterOp::Lte,
                CompareOp::Gt => FilterOp::Gt,
                CompareOp::GtEq => FilterOp::Gte,
            };
            FilterTerm::scalar(column, op, value)
        }
    }
}

/// Compile WHERE text, consuming placeholders from `params`.
///
/// Conjuncts that match no shape are kept verbatim in
/// [`WhereClause::unrecognized`]; their placeholders are skipped so that the
/// remaining parameters stay aligned.
pub fn compile_where(text: &str, params: &mut Params<'_>) -> Result<WhereClause, ParseError> {
    let tokens = Lexer::new(text).tokenize()?;
    let mut clause = WhereClause {
        text: text.trim().to_string(),
        ..WhereClause::default()
    };
    for span in split_conjuncts(text, &tokens)? {
        let conjunct = &tokens[span];
        match match_shape(conjunct) {
            Some(predicate) => clause.terms.extend(predicate.bind(params)?),
            None => {
                let placeholders = conjunct
                    .iter()
                    .filter(|t| t.kind == TokenKind::Placeholder)
                    .count();
                params.skip(placeholders);
                clause.unrecognized.push(span_text(text, conjunct).to_string());
            }
        }
    }
    Ok(clause)
}

/// Functional form: returns the compiled clause and the unconsumed parameters.
pub fn compile_predicate<'p>(
    text: &str,
    params: &'p [Value],
) -> Result<(WhereClause, &'p [Value]), ParseError> {
    let mut cursor = Params::new(params);
    let clause = compile_where(text, &mut cursor)?;
    Ok((clause, cursor.remaining()))
}

pub(crate) fn span_text<'s>(text: &'s str, tokens: &[Token]) -> &'s str {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => &text[first.start..last.end],
        _ => "",
    }
}

/// Split on top-level `AND`, leaving the `AND` of `BETWEEN x AND y` in place.
fn split_conjuncts(text: &str, tokens: &[Token]) -> Result<Vec<Range<usize>>, ParseError> {
    let unsupported = |reason: &str| ParseError::UnsupportedPredicate {
        clause: text.trim().to_string(),
        reason: reason.to_string(),
    };

    let mut spans = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut pending_between = false;
    for (idx, token) in tokens.iter().enumerate() {
        match &token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth = depth.saturating_sub(1),
            TokenKind::Word(_) if token.is_keyword("or") => {
                return Err(unsupported("OR is not supported"));
            }
            TokenKind::Word(_) if depth == 0 && token.is_keyword("between") => {
                pending_between = true;
            }
            TokenKind::Word(_) if depth == 0 && token.is_keyword("and") => {
                if pending_between {
                    pending_between = false;
                } else {
                    spans.push(start..idx);
                    start = idx + 1;
                }
            }
            _ => {}
        }
    }
    spans.push(start..tokens.len());

    for span in &spans {
        match tokens.get(span.start) {
            _ if span.is_empty() => return Err(unsupported("empty condition")),
            Some(first) if first.kind == TokenKind::LParen => {
                return Err(unsupported("parenthesised groups are not supported"));
            }
            _ => {}
        }
    }
    Ok(spans)
}

type Matcher = fn(&mut Cursor<'_>) -> Option<Predicate>;

/// Shapes in priority order; the first one that consumes the whole conjunct wins.
const SHAPES: &[Matcher] = &[
    match_tautology,
    match_case_insensitive_eq,
    match_between,
    match_range,
    match_like,
    match_null_check,
    match_in_list,
    match_equality,
];

pub fn match_shape(conjunct: &[Token]) -> Option<Predicate> {
    SHAPES.iter().find_map(|matcher| {
        let mut cursor = Cursor::new(conjunct);
        matcher(&mut cursor).filter(|_| cursor.at_end())
    })
}

fn match_tautology(cursor: &mut Cursor<'_>) -> Option<Predicate> {
    let lhs = number_text(cursor.advance()?)?;
    if cursor.advance()?.kind != TokenKind::Op(CompareOp::Eq) {
        return None;
    }
    let rhs = number_text(cursor.advance()?)?;
    (lhs == rhs).then_some(Predicate::Tautology)
}

fn number_text(token: &Token) -> Option<&str> {
    match &token.kind {
        TokenKind::Number(n) => Some(n),
        _ => None,
    }
}

fn match_case_insensitive_eq(cursor: &mut Cursor<'_>) -> Option<Predicate> {
    let func = case_fold_function(cursor)?;
    cursor.expect(&TokenKind::LParen, "(").ok()?;
    let column = parse_column(cursor)?;
    cursor.expect(&TokenKind::RParen, ")").ok()?;
    if cursor.advance()?.kind != TokenKind::Op(CompareOp::Eq) {
        return None;
    }
    let value = if cursor.eat_keyword(func) {
        cursor.expect(&TokenKind::LParen, "(").ok()?;
        let value = parse_operand(cursor)?;
        cursor.expect(&TokenKind::RParen, ")").ok()?;
        value
    } else {
        parse_operand(cursor)?
    };
    Some(Predicate::CaseInsensitiveEq { column, value })
}

fn case_fold_function(cursor: &mut Cursor<'_>) -> Option<&'static str> {
    ["upper", "lower"]
        .into_iter()
        .find(|func| cursor.eat_keyword(func))
}

fn match_between(cursor: &mut Cursor<'_>) -> Option<Predicate> {
    let column = parse_column(cursor)?;
    if !cursor.eat_keyword("between") {
        return None;
    }
    let low = parse_operand(cursor)?;
    if !cursor.eat_keyword("and") {
        return None;
    }
    let high = parse_operand(cursor)?;
    Some(Predicate::Between { column, low, high })
}

fn match_range(cursor: &mut Cursor<'_>) -> Option<Predicate> {
    let column = parse_column(cursor)?;
    let op = match cursor.advance()?.kind {
        TokenKind::Op(op @ (CompareOp::Lt | CompareOp::LtEq | CompareOp::Gt | CompareOp::GtEq)) => {
            op
        }
        _ => return None,
    };
    let value = parse_operand(cursor)?;
    if value.is_null() {
        return None;
    }
    Some(Predicate::Compare { column, op, value })
}

fn match_like(cursor: &mut Cursor<'_>) -> Option<Predicate> {
    let column = parse_column(cursor)?;
    if !(cursor.eat_keyword("like") || cursor.eat_keyword("ilike")) {
        return None;
    }
    let pattern = parse_operand(cursor)?;
    Some(Predicate::Like { column, pattern })
}

fn match_null_check(cursor: &mut Cursor<'_>) -> Option<Predicate> {
    let column = parse_column(cursor)?;
    if !cursor.eat_keyword("is") {
        return None;
    }
    let negated = cursor.eat_keyword("not");
    if !cursor.eat_keyword("null") {
        return None;
    }
    Some(Predicate::NullCheck { column, negated })
}

fn match_in_list(cursor: &mut Cursor<'_>) -> Option<Predicate> {
    let column = parse_column(cursor)?;
    let negated = cursor.eat_keyword("not");
    if !cursor.eat_keyword("in") {
        return None;
    }
    cursor.expect(&TokenKind::LParen, "(").ok()?;
    let mut items = Vec::new();
    loop {
        items.push(parse_operand(cursor)?);
        if cursor.eat(&TokenKind::RParen) {
            break;
        }
        cursor.expect(&TokenKind::Comma, ",").ok()?;
    }
    Some(Predicate::InList {
        column,
        items,
        negated,
    })
}

fn match_equality(cursor: &mut Cursor<'_>) -> Option<Predicate> {
    let column = parse_column(cursor)?;
    let op = match cursor.advance()?.kind {
        TokenKind::Op(op @ (CompareOp::Eq | CompareOp::NotEq)) => op,
        _ => return None,
    };
    let value = parse_operand(cursor)?;
    if value.is_null() {
        return Some(Predicate::NullCheck {
            column,
            negated: op == CompareOp::NotEq,
        });
    }
    Some(Predicate::Compare { column, op, value })
}
