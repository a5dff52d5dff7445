use crate::syntax::span::Span;
use crate::syntax::RawError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    Number(String),
    /// Decoded string contents.
    Str(String),

    And,
    Break,
    Do,
    Else,
    ElseIf,
    End,
    False,
    For,
    Function,
    Goto,
    If,
    In,
    Local,
    Nil,
    Not,
    Or,
    Repeat,
    Return,
    Then,
    True,
    Until,
    While,

    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    Caret,
    Hash,
    Ampersand,
    Tilde,
    Pipe,
    ShiftLeft,
    ShiftRight,
    Eq,
    NotEq,
    LessEq,
    GreaterEq,
    Less,
    Greater,
    Assign,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    DoubleColon,
    Semicolon,
    Colon,
    Comma,
    Dot,
    Concat,
    Ellipsis,

    Eof,
}

impl TokenKind {
    fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "and" => TokenKind::And,
            "break" => TokenKind::Break,
            "do" => TokenKind::Do,
            "else" => TokenKind::Else,
            "elseif" => TokenKind::ElseIf,
            "end" => TokenKind::End,
            "false" => TokenKind::False,
            "for" => TokenKind::For,
            "function" => TokenKind::Function,
            "goto" => TokenKind::Goto,
            "if" => TokenKind::If,
            "in" => TokenKind::In,
            "local" => TokenKind::Local,
            "nil" => TokenKind::Nil,
            "not" => TokenKind::Not,
            "or" => TokenKind::Or,
            "repeat" => TokenKind::Repeat,
            "return" => TokenKind::Return,
            "then" => TokenKind::Then,
            "true" => TokenKind::True,
            "until" => TokenKind::Until,
            "while" => TokenKind::While,
            _ => return None,
        };
        Some(kind)
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Name(_) => "name",
            TokenKind::Number(_) => "number",
            TokenKind::Str(_) => "string",
            TokenKind::And => "and",
            TokenKind::Break => "break",
            TokenKind::Do => "do",
            TokenKind::Else => "else",
            TokenKind::ElseIf => "elseif",
            TokenKind::End => "end",
            TokenKind::False => "false",
            TokenKind::For => "for",
            TokenKind::Function => "function",
            TokenKind::Goto => "goto",
            TokenKind::If => "if",
            TokenKind::In => "in",
            TokenKind::Local => "local",
            TokenKind::Nil => "nil",
            TokenKind::Not => "not",
            TokenKind::Or => "or",
            TokenKind::Repeat => "repeat",
            TokenKind::Return => "return",
            TokenKind::Then => "then",
            TokenKind::True => "true",
            TokenKind::Until => "until",
            TokenKind::While => "while",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::DoubleSlash => "//",
            TokenKind::Percent => "%",
            TokenKind::Caret => "^",
            TokenKind::Hash => "#",
            TokenKind::Ampersand => "&",
            TokenKind::Tilde => "~",
            TokenKind::Pipe => "|",
            TokenKind::ShiftLeft => "<<",
            TokenKind::ShiftRight => ">>",
            TokenKind::Eq => "==",
            TokenKind::NotEq => "~=",
            TokenKind::LessEq => "<=",
            TokenKind::GreaterEq => ">=",
            TokenKind::Less => "<",
            TokenKind::Greater => ">",
            TokenKind::Assign => "=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::DoubleColon => "::",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Concat => "..",
            TokenKind::Ellipsis => "...",
            TokenKind::Eof => "end of file",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Name(n) => write!(f, "name '{}'", n),
            TokenKind::Number(n) => write!(f, "number '{}'", n),
            TokenKind::Str(_) => write!(f, "string literal"),
            TokenKind::Eof => write!(f, "end of file"),
            other => write!(f, "'{}'", other.symbol()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Splits source text into tokens. Comments and whitespace are dropped.
pub fn tokenize(src: &str) -> Result<Vec<Token>, RawError> {
    Lexer::new(src).run().map(|(tokens, _)| tokens)
}

/// Spans of every comment in `src`, opening `--` included.
pub fn comment_spans(src: &str) -> Result<Vec<Span>, RawError> {
    Lexer::new(src).run().map(|(_, comments)| comments)
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    comments: Vec<Span>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            comments: Vec::new(),
        }
    }

    fn run(mut self) -> Result<(Vec<Token>, Vec<Span>), RawError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok((tokens, self.comments));
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> RawError {
        RawError {
            message: message.into(),
            offset,
        }
    }

    fn skip_trivia(&mut self) -> Result<(), RawError> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n' | 0x0b | 0x0c) => self.pos += 1,
                Some(b'-') if self.peek_at(1) == Some(b'-') => {
                    let start = self.pos;
                    self.pos += 2;
                    if let Some(level) = self.long_bracket_level() {
                        self.read_long_bracket(level)
                            .map_err(|_| self.error(start, "unfinished long comment"))?;
                    } else {
                        while let Some(b) = self.peek() {
                            if b == b'\n' {
                                break;
                            }
                            self.pos += 1;
                        }
                    }
                    self.comments.push(Span::new(start, self.pos));
                }
                Some(b'#') if self.pos == 0 && self.peek_at(1) == Some(b'!') => {
                    // shebang line
                    while let Some(b) = self.peek() {
                        if b == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// If positioned at `[`, `[=`, `[==`... followed by `[`, returns the level
    /// without consuming anything.
    fn long_bracket_level(&self) -> Option<usize> {
        if self.peek() != Some(b'[') {
            return None;
        }
        let mut level = 0;
        while self.peek_at(1 + level) == Some(b'=') {
            level += 1;
        }
        (self.peek_at(1 + level) == Some(b'[')).then_some(level)
    }

    /// Consumes a long bracket of the given level and returns its contents.
    fn read_long_bracket(&mut self, level: usize) -> Result<String, ()> {
        self.pos += level + 2;
        // a newline right after the opening bracket is skipped
        if self.peek() == Some(b'\r') {
            self.pos += 1;
        }
        if self.peek() == Some(b'\n') {
            self.pos += 1;
        }
        let content_start = self.pos;
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b']' {
                let mut eq = 0;
                while self.peek_at(1 + eq) == Some(b'=') {
                    eq += 1;
                }
                if eq == level && self.peek_at(1 + eq) == Some(b']') {
                    let content = self.src[content_start..self.pos].to_string();
                    self.pos += level + 2;
                    return Ok(content);
                }
            }
            self.pos += 1;
        }
        Err(())
    }

    fn next_token(&mut self) -> Result<Token, RawError> {
        self.skip_trivia()?;
        let start = self.pos;
        let Some(b) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: Span::new(start, start),
            });
        };

        let kind = match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
                    self.pos += 1;
                }
                let word = &self.src[start..self.pos];
                TokenKind::keyword(word).unwrap_or_else(|| TokenKind::Name(word.to_string()))
            }
            b'0'..=b'9' => self.read_number()?,
            b'.' if matches!(self.peek_at(1), Some(b'0'..=b'9')) => self.read_number()?,
            b'"' | b'\'' => self.read_string(b)?,
            b'[' => match self.long_bracket_level() {
                Some(level) => {
                    let text = self
                        .read_long_bracket(level)
                        .map_err(|_| self.error(start, "unfinished long string"))?;
                    TokenKind::Str(text)
                }
                None => {
                    self.pos += 1;
                    TokenKind::LBracket
                }
            },
            _ => self.read_symbol()?,
        };

        Ok(Token {
            kind,
            span: Span::new(start, self.pos),
        })
    }

    fn read_symbol(&mut self) -> Result<TokenKind, RawError> {
        let start = self.pos;
        let b = self.bytes[self.pos];
        let next = self.peek_at(1);
        let (kind, len) = match (b, next) {
            (b'.', Some(b'.')) if self.peek_at(2) == Some(b'.') => (TokenKind::Ellipsis, 3),
            (b'.', Some(b'.')) => (TokenKind::Concat, 2),
            (b'.', _) => (TokenKind::Dot, 1),
            (b'/', Some(b'/')) => (TokenKind::DoubleSlash, 2),
            (b'/', _) => (TokenKind::Slash, 1),
            (b'<', Some(b'<')) => (TokenKind::ShiftLeft, 2),
            (b'<', Some(b'=')) => (TokenKind::LessEq, 2),
            (b'<', _) => (TokenKind::Less, 1),
            (b'>', Some(b'>')) => (TokenKind::ShiftRight, 2),
            (b'>', Some(b'=')) => (TokenKind::GreaterEq, 2),
            (b'>', _) => (TokenKind::Greater, 1),
            (b'=', Some(b'=')) => (TokenKind::Eq, 2),
            (b'=', _) => (TokenKind::Assign, 1),
            (b'~', Some(b'=')) => (TokenKind::NotEq, 2),
            (b'~', _) => (TokenKind::Tilde, 1),
            (b':', Some(b':')) => (TokenKind::DoubleColon, 2),
            (b':', _) => (TokenKind::Colon, 1),
            (b'+', _) => (TokenKind::Plus, 1),
            (b'-', _) => (TokenKind::Minus, 1),
            (b'*', _) => (TokenKind::Star, 1),
            (b'%', _) => (TokenKind::Percent, 1),
            (b'^', _) => (TokenKind::Caret, 1),
            (b'#', _) => (TokenKind::Hash, 1),
            (b'&', _) => (TokenKind::Ampersand, 1),
            (b'|', _) => (TokenKind::Pipe, 1),
            (b'(', _) => (TokenKind::LParen, 1),
            (b')', _) => (TokenKind::RParen, 1),
            (b'{', _) => (TokenKind::LBrace, 1),
            (b'}', _) => (TokenKind::RBrace, 1),
            (b']', _) => (TokenKind::RBracket, 1),
            (b';', _) => (TokenKind::Semicolon, 1),
            (b',', _) => (TokenKind::Comma, 1),
            _ => {
                let ch = self.src[start..].chars().next().unwrap_or('?');
                return Err(self.error(start, format!("unexpected character '{}'", ch)));
            }
        };
        self.pos += len;
        Ok(kind)
    }

    fn read_number(&mut self) -> Result<TokenKind, RawError> {
        let start = self.pos;
        let hex = self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X'));
        if hex {
            self.pos += 2;
        }
        let is_digit = |c: u8| {
            if hex {
                c.is_ascii_hexdigit()
            } else {
                c.is_ascii_digit()
            }
        };
        while matches!(self.peek(), Some(c) if is_digit(c) || c == b'.') {
            self.pos += 1;
        }
        let exponent: &[u8] = if hex { b"pP" } else { b"eE" };
        let mut missing_exponent = false;
        if matches!(self.peek(), Some(c) if exponent.contains(&c)) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            // the exponent is decimal even for hex numerals
            let digits_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
            missing_exponent = self.pos == digits_start;
        }
        let text = &self.src[start..self.pos];
        let malformed = missing_exponent
            || matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_' || c == b'.')
            || text.matches('.').count() > 1
            || (hex && text.len() == 2);
        if malformed {
            return Err(self.error(start, format!("malformed number near '{}'", text)));
        }
        Ok(TokenKind::Number(text.to_string()))
    }

    fn read_string(&mut self, quote: u8) -> Result<TokenKind, RawError> {
        let start = self.pos;
        self.pos += 1;
        let mut out: Vec<u8> = Vec::new();
        loop {
            let Some(b) = self.peek() else {
                return Err(self.error(start, "unfinished string"));
            };
            match b {
                b'\n' => return Err(self.error(start, "unfinished string")),
                b'\\' => {
                    let escape_at = self.pos;
                    self.pos += 1;
                    self.read_escape(escape_at, &mut out)?;
                }
                _ if b == quote => {
                    self.pos += 1;
                    return Ok(TokenKind::Str(String::from_utf8_lossy(&out).into_owned()));
                }
                _ => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
    }

    fn read_escape(&mut self, escape_at: usize, out: &mut Vec<u8>) -> Result<(), RawError> {
        let Some(c) = self.peek() else {
            return Err(self.error(escape_at, "unfinished string"));
        };
        self.pos += 1;
        match c {
            b'n' => out.push(b'\n'),
            b't' => out.push(b'\t'),
            b'r' => out.push(b'\r'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'v' => out.push(0x0b),
            b'\\' | b'"' | b'\'' => out.push(c),
            b'\n' => out.push(b'\n'),
            b'z' => {
                while matches!(self.peek(), Some(w) if w.is_ascii_whitespace()) {
                    self.pos += 1;
                }
            }
            b'x' => {
                let digits = self.src.get(self.pos..self.pos + 2).unwrap_or("");
                if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(self.error(escape_at, "hexadecimal digit expected"));
                }
                let value = u8::from_str_radix(digits, 16)
                    .map_err(|_| self.error(escape_at, "hexadecimal digit expected"))?;
                self.pos += 2;
                out.push(value);
            }
            b'u' => {
                if self.peek() != Some(b'{') {
                    return Err(self.error(escape_at, "missing '{' in \\u{xxxx}"));
                }
                self.pos += 1;
                let digits_start = self.pos;
                while matches!(self.peek(), Some(h) if h.is_ascii_hexdigit()) {
                    self.pos += 1;
                }
                let digits = &self.src[digits_start..self.pos];
                if self.peek() != Some(b'}') {
                    return Err(self.error(escape_at, "missing '}' in \\u{xxxx}"));
                }
                self.pos += 1;
                let ch = u32::from_str_radix(digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error(escape_at, "UTF-8 value too large"))?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
            b'0'..=b'9' => {
                let mut value: u32 = u32::from(c - b'0');
                for _ in 0..2 {
                    match self.peek() {
                        Some(d @ b'0'..=b'9') => {
                            value = value * 10 + u32::from(d - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                let byte = u8::try_from(value)
                    .map_err(|_| self.error(escape_at, "decimal escape too large"))?;
                out.push(byte);
            }
            _ => return Err(self.error(escape_at, "invalid escape sequence")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn method_call_tokens() {
        assert_eq!(
            kinds("sock:Connect(ip, 23)"),
            vec![
                TokenKind::Name("sock".into()),
                TokenKind::Colon,
                TokenKind::Name("Connect".into()),
                TokenKind::LParen,
                TokenKind::Name("ip".into()),
                TokenKind::Comma,
                TokenKind::Number("23".into()),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let src = "-- line comment\nx --[[ block\ncomment ]] = 1 --[==[ ]] ]==]";
        assert_eq!(
            kinds(src),
            vec![
                TokenKind::Name("x".into()),
                TokenKind::Assign,
                TokenKind::Number("1".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes_decode() {
        assert_eq!(
            kinds(r#""a\tb\65\x42\u{63}" 'it\'s'"#),
            vec![
                TokenKind::Str("a\tbABc".into()),
                TokenKind::Str("it's".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn long_string_drops_leading_newline() {
        assert_eq!(
            kinds("[[\nhello]]"),
            vec![TokenKind::Str("hello".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("3 3.5 .5 1e10 2E-3 0xFF 0x1p4"),
            vec![
                TokenKind::Number("3".into()),
                TokenKind::Number("3.5".into()),
                TokenKind::Number(".5".into()),
                TokenKind::Number("1e10".into()),
                TokenKind::Number("2E-3".into()),
                TokenKind::Number("0xFF".into()),
                TokenKind::Number("0x1p4".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn compound_operators() {
        assert_eq!(
            kinds("a ~= b .. c // d ... << >> == <= >= ::"),
            vec![
                TokenKind::Name("a".into()),
                TokenKind::NotEq,
                TokenKind::Name("b".into()),
                TokenKind::Concat,
                TokenKind::Name("c".into()),
                TokenKind::DoubleSlash,
                TokenKind::Name("d".into()),
                TokenKind::Ellipsis,
                TokenKind::ShiftLeft,
                TokenKind::ShiftRight,
                TokenKind::Eq,
                TokenKind::LessEq,
                TokenKind::GreaterEq,
                TokenKind::DoubleColon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unfinished_string_reports_offset() {
        let err = tokenize("x = 'abc\n").unwrap_err();
        assert_eq!(err.offset, 4);
        assert!(err.message.contains("unfinished string"));
    }

    #[test]
    fn malformed_number() {
        let err = tokenize("x = 3abc").unwrap_err();
        assert!(err.message.contains("malformed number"));
    }

    #[test]
    fn exponent_needs_digits() {
        for src in ["x = 3e", "x = 1e+", "x = 2E-", "x = 0x1p", "x = 1e5e2"] {
            let err = tokenize(src).unwrap_err();
            assert!(err.message.contains("malformed number"), "{}", src);
        }
        assert_eq!(kinds("0x1e")[0], TokenKind::Number("0x1e".into()));
    }

    #[test]
    fn hex_escape_needs_two_hex_digits() {
        for src in [r#"x = "\x+1""#, r#"x = "\xg0""#, r#"x = "\x4""#] {
            let err = tokenize(src).unwrap_err();
            assert!(err.message.contains("hexadecimal digit expected"), "{}", src);
        }
    }

    #[test]
    fn invalid_escape() {
        let err = tokenize(r#"x = "\q""#).unwrap_err();
        assert!(err.message.contains("invalid escape"));
    }

    #[test]
    fn comment_spans_skip_strings() {
        let src = "x = '-- not a comment' -- trailing\n--[[ long\n]] y = 1";
        let spans = comment_spans(src).unwrap();
        let texts: Vec<&str> = spans.iter().map(|s| &src[s.start..s.end]).collect();
        assert_eq!(texts, vec!["-- trailing", "--[[ long\n]]"]);
    }

    #[test]
    fn token_spans() {
        let tokens = tokenize("  foo = 'x'").unwrap();
        assert_eq!(tokens[0].span, Span::new(2, 5));
        assert_eq!(tokens[2].span, Span::new(8, 11));
    }
}
