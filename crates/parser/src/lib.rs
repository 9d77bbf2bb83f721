//! SQL front end for the REST adapter.
//!
//! Turns one SQL statement plus its positional parameters into a bound
//! [`Statement`] whose WHERE clause is already compiled into filter terms
//! for a PostgREST-style store.

mod error;
mod extract;
mod filter;
mod lexer;
mod operand;
mod params;
mod predicate;
mod statement;

pub use error::ParseError;
pub use filter::{FilterOp, FilterTerm, FilterValue, WhereClause, render_value};
pub use lexer::{CompareOp, Cursor, Lexer, Token, TokenKind};
pub use operand::{Operand, now_with_modifier};
pub use params::Params;
pub use predicate::{Predicate, compile_predicate, compile_where, match_shape};
pub use statement::{
    Classification, CountStatement, DeleteStatement, InsertStatement, LAST_INSERT_ID_FUNCTION,
    NullsOrder, OrderTerm, SelectColumns, SelectStatement, Statement, StatementKind,
    UpdateStatement, classify, parse,
};
