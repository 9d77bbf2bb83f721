use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword; keywords are matched case-insensitively.
    Word(String),
    /// `"ident"` or `[ident]`
    Quoted(String),
    Number(String),
    /// `'text'` with `''` unescaped.
    Str(String),
    Placeholder,
    Comma,
    LParen,
    RParen,
    Dot,
    Star,
    Semicolon,
    Op(CompareOp),
    /// Punctuation outside the accepted dialect (`+`, `||`, `%`, ...). Never
    /// matched by a predicate shape or a clause extractor.
    Other(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte span in the lexed source.
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w.eq_ignore_ascii_case(keyword))
    }

    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(w) => Some(w),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Word(w) => format!("'{w}'"),
            TokenKind::Quoted(q) => format!("\"{q}\""),
            TokenKind::Number(n) => n.clone(),
            TokenKind::Str(s) => format!("string '{s}'"),
            TokenKind::Placeholder => "'?'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::Op(op) => format!("'{}'", op.as_str()),
            TokenKind::Other(c) => format!("'{c}'"),
        }
    }
}

pub(crate) fn describe(token: Option<&Token>) -> String {
    token.map_or_else(|| "end of input".to_string(), Token::describe)
}

pub struct Lexer<'a> {
    content: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(content: &'a str) -> Self {
        Self { content, pos: 0 }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments()?;
            let Some(c) = self.peek() else {
                break;
            };
            let start = self.pos;
            let kind = match c {
                '?' => self.single(TokenKind::Placeholder),
                ',' => self.single(TokenKind::Comma),
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '.' => self.single(TokenKind::Dot),
                '*' => self.single(TokenKind::Star),
                ';' => self.single(TokenKind::Semicolon),
                '\'' => TokenKind::Str(self.quoted('\'', "string literal")?),
                '"' => TokenKind::Quoted(self.quoted('"', "quoted identifier")?),
                '[' => TokenKind::Quoted(self.bracketed()?),
                '=' => {
                    self.consume();
                    // SQLite accepts `==`
                    if self.peek() == Some('=') {
                        self.consume();
                    }
                    TokenKind::Op(CompareOp::Eq)
                }
                '!' if self.lookahead("!=") => self.operator(2, CompareOp::NotEq),
                '<' if self.lookahead("<>") => self.operator(2, CompareOp::NotEq),
                '<' if self.lookahead("<=") => self.operator(2, CompareOp::LtEq),
                '<' => self.operator(1, CompareOp::Lt),
                '>' if self.lookahead(">=") => self.operator(2, CompareOp::GtEq),
                '>' => self.operator(1, CompareOp::Gt),
                '-' | '+' if self.next_is_digit() => {
                    let sign = self.consume();
                    let digits = self.number();
                    if sign == '-' {
                        TokenKind::Number(format!("-{digits}"))
                    } else {
                        TokenKind::Number(digits)
                    }
                }
                c if c.is_ascii_digit() => TokenKind::Number(self.number()),
                c if c.is_alphabetic() || c == '_' => TokenKind::Word(
                    self.take_while(|c| c.is_alphanumeric() || c == '_' || c == '$'),
                ),
                other => self.single(TokenKind::Other(other)),
            };
            tokens.push(Token {
                kind,
                start,
                end: self.pos,
            });
        }
        Ok(tokens)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.consume();
        kind
    }

    fn operator(&mut self, width: usize, op: CompareOp) -> TokenKind {
        for _ in 0..width {
            self.consume();
        }
        TokenKind::Op(op)
    }

    fn number(&mut self) -> String {
        self.take_while(|c| c.is_ascii_digit() || c == '.')
    }

    fn quoted(&mut self, quote: char, what: &'static str) -> Result<String, ParseError> {
        let offset = self.pos;
        self.consume();
        let mut buf = String::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::Unterminated { what, offset }),
                Some(c) if c == quote => {
                    self.consume();
                    // doubled quote is an escaped quote
                    if self.peek() == Some(quote) {
                        self.consume();
                        buf.push(quote);
                    } else {
                        return Ok(buf);
                    }
                }
                Some(_) => buf.push(self.consume()),
            }
        }
    }

    fn bracketed(&mut self) -> Result<String, ParseError> {
        let offset = self.pos;
        self.consume();
        let name = self.take_while(|c| c != ']');
        if self.peek() != Some(']') {
            return Err(ParseError::Unterminated {
                what: "bracketed identifier",
                offset,
            });
        }
        self.consume();
        Ok(name)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), ParseError> {
        loop {
            self.take_while(char::is_whitespace);
            if self.lookahead("--") {
                self.take_while(|c| c != '\n');
            } else if self.lookahead("/*") {
                let offset = self.pos;
                match self.content[self.pos + 2..].find("*/") {
                    Some(end) => self.pos += 2 + end + 2,
                    None => {
                        return Err(ParseError::Unterminated {
                            what: "block comment",
                            offset,
                        });
                    }
                }
            } else {
                return Ok(());
            }
        }
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, pred: F) -> String {
        let mut buf = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            buf.push(self.consume());
        }
        buf
    }

    fn next_is_digit(&self) -> bool {
        let mut chars = self.content[self.pos..].chars();
        chars.next();
        chars.next().is_some_and(|c| c.is_ascii_digit())
    }

    fn lookahead(&self, pat: &str) -> bool {
        self.content[self.pos..].starts_with(pat)
    }

    fn peek(&self) -> Option<char> {
        self.content[self.pos..].chars().next()
    }

    fn consume(&mut self) -> char {
        let ch = self.peek().unwrap_or('\0');
        self.pos += ch.len_utf8();
        ch
    }
}

/// Forward-only view over a token slice.
pub struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Cursor<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    pub fn peek_nth(&self, n: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + n)
    }

    pub fn advance(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.tokens.len());
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn check_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(ParseError::expected(
                keyword.to_ascii_uppercase(),
                describe(self.peek()),
            ))
        }
    }

    pub fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek().is_some_and(|t| &t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), ParseError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(ParseError::expected(what, describe(self.peek())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<TokenKind> {
        Lexer::new(sql)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_comparison_operators() {
        assert_eq!(
            kinds("a>=? b<>1 c!=x d<=-2"),
            vec![
                TokenKind::Word("a".into()),
                TokenKind::Op(CompareOp::GtEq),
                TokenKind::Placeholder,
                TokenKind::Word("b".into()),
                TokenKind::Op(CompareOp::NotEq),
                TokenKind::Number("1".into()),
                TokenKind::Word("c".into()),
                TokenKind::Op(CompareOp::NotEq),
                TokenKind::Word("x".into()),
                TokenKind::Word("d".into()),
                TokenKind::Op(CompareOp::LtEq),
                TokenKind::Number("-2".into()),
            ]
        );
    }

    #[test]
    fn unescapes_doubled_quotes() {
        assert_eq!(
            kinds("'O''Higgins'"),
            vec![TokenKind::Str("O'Higgins".into())]
        );
    }

    #[test]
    fn quoted_and_bracketed_identifiers() {
        assert_eq!(
            kinds("\"crm leads\" [cars]"),
            vec![
                TokenKind::Quoted("crm leads".into()),
                TokenKind::Quoted("cars".into())
            ]
        );
    }

    #[test]
    fn spans_cover_source() {
        let sql = "stage = 'agendado'";
        let tokens = Lexer::new(sql).tokenize().unwrap();
        assert_eq!(&sql[tokens[2].start..tokens[2].end], "'agendado'");
    }

    #[test]
    fn skips_line_comments() {
        assert_eq!(
            kinds("id -- trailing\n= 1"),
            vec![
                TokenKind::Word("id".into()),
                TokenKind::Op(CompareOp::Eq),
                TokenKind::Number("1".into()),
            ]
        );
    }

    #[test]
    fn unterminated_string_reports_offset() {
        let err = Lexer::new("name = 'abc").tokenize().unwrap_err();
        assert_eq!(
            err,
            ParseError::Unterminated {
                what: "string literal",
                offset: 7
            }
        );
    }

    #[test]
    fn unknown_punctuation_is_kept_as_opaque_tokens() {
        assert_eq!(
            kinds("a || b % 2"),
            vec![
                TokenKind::Word("a".into()),
                TokenKind::Other('|'),
                TokenKind::Other('|'),
                TokenKind::Word("b".into()),
                TokenKind::Other('%'),
                TokenKind::Number("2".into()),
            ]
        );
        assert_eq!(
            kinds("price - 1"),
            vec![
                TokenKind::Word("price".into()),
                TokenKind::Other('-'),
                TokenKind::Number("1".into()),
            ]
        );
    }

    #[test]
    fn skips_block_comments() {
        assert_eq!(
            kinds("id /* pk */ INTEGER"),
            vec![
                TokenKind::Word("id".into()),
                TokenKind::Word("INTEGER".into()),
            ]
        );
        let err = Lexer::new("id /* pk").tokenize().unwrap_err();
        assert_eq!(
            err,
            ParseError::Unterminated {
                what: "block comment",
                offset: 3
            }
        );
    }
}
