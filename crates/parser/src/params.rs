use crate::error::ParseError;
use serde_json::Value;

/// Hands out positional parameters strictly front to back.
///
/// One cursor is shared by every clause of a statement, so the SET values of
/// an UPDATE and its WHERE placeholders draw from the same flat list.
#[derive(Debug, Clone)]
pub struct Params<'a> {
    values: &'a [Value],
    pos: usize,
}

impl<'a> Params<'a> {
    pub fn new(values: &'a [Value]) -> Self {
        Self { values, pos: 0 }
    }

    pub fn next(&mut self) -> Result<Value, ParseError> {
        let value = self
            .values
            .get(self.pos)
            .cloned()
            .ok_or(ParseError::MissingParameter {
                position: self.pos + 1,
            })?;
        self.pos += 1;
        Ok(value)
    }

    /// Drop `n` parameters without binding them.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.values.len());
    }

    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> &'a [Value] {
        &self.values[self.pos..]
    }

    /// Fails when parameters are left over once a statement is fully bound.
    pub fn finish(&self) -> Result<(), ParseError> {
        match self.remaining().len() {
            0 => Ok(()),
            unused => Err(ParseError::UnusedParameters {
                consumed: self.pos,
                unused,
            }),
        }
    }
}
