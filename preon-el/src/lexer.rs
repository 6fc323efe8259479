use crate::{ParseError, Span};
use core::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

/// A lexical token of the expression grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Integer literal, decimal or `0x` hexadecimal.
    Integer(i64),
    /// `true`
    True,
    /// `false`
    False,
    /// Double-quoted string literal, escapes resolved.
    Str(String),
    /// Identifier; `outer` is contextual and lexes as an identifier.
    Ident(String),
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `^`
    Caret,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `and`
    And,
    /// `or`
    Or,
    /// `not`
    Not,
    /// `.`
    Dot,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `(`
    LParen,
    /// `)`
    RParen,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Integer(value) => write!(f, "integer `{value}`"),
            TokenKind::True => f.write_str("`true`"),
            TokenKind::False => f.write_str("`false`"),
            TokenKind::Str(value) => write!(f, "string {value:?}"),
            TokenKind::Ident(name) => write!(f, "identifier `{name}`"),
            TokenKind::Plus => f.write_str("`+`"),
            TokenKind::Minus => f.write_str("`-`"),
            TokenKind::Star => f.write_str("`*`"),
            TokenKind::Slash => f.write_str("`/`"),
            TokenKind::Percent => f.write_str("`%`"),
            TokenKind::Caret => f.write_str("`^`"),
            TokenKind::Lt => f.write_str("`<`"),
            TokenKind::Le => f.write_str("`<=`"),
            TokenKind::Gt => f.write_str("`>`"),
            TokenKind::Ge => f.write_str("`>=`"),
            TokenKind::EqEq => f.write_str("`==`"),
            TokenKind::NotEq => f.write_str("`!=`"),
            TokenKind::And => f.write_str("`and`"),
            TokenKind::Or => f.write_str("`or`"),
            TokenKind::Not => f.write_str("`not`"),
            TokenKind::Dot => f.write_str("`.`"),
            TokenKind::LBracket => f.write_str("`[`"),
            TokenKind::RBracket => f.write_str("`]`"),
            TokenKind::LParen => f.write_str("`(`"),
            TokenKind::RParen => f.write_str("`)`"),
        }
    }
}

/// A token with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What was lexed.
    pub kind: TokenKind,
    /// Where it started.
    pub at: Span,
}

/// Lex a whole expression source into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer {
        chars: source.char_indices().peekable(),
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
    line: u32,
    column: u32,
}

impl Lexer<'_> {
    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.skip_whitespace();
        let at = self.span();
        let Some(ch) = self.bump() else {
            return Ok(None);
        };

        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '^' => TokenKind::Caret,
            '.' => TokenKind::Dot,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '<' => {
                if self.eat('=') {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '=' => {
                if self.eat('=') {
                    TokenKind::EqEq
                } else {
                    return Err(ParseError::UnexpectedChar { found: '=', at });
                }
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::NotEq
                } else {
                    return Err(ParseError::UnexpectedChar { found: '!', at });
                }
            }
            '"' => self.string(at)?,
            ch if ch.is_ascii_digit() => self.number(ch, at)?,
            ch if ch.is_alphabetic() || ch == '_' => self.ident(ch),
            other => return Err(ParseError::UnexpectedChar { found: other, at }),
        };

        Ok(Some(Token { kind, at }))
    }

    fn string(&mut self, at: Span) -> Result<TokenKind, ParseError> {
        let mut value = String::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err(ParseError::UnterminatedString { at });
            };
            match ch {
                '"' => return Ok(TokenKind::Str(value)),
                '\\' => {
                    let escape_at = self.span();
                    let Some(escape) = self.bump() else {
                        return Err(ParseError::UnterminatedString { at });
                    };
                    let resolved = match escape {
                        '"' => '"',
                        '\\' => '\\',
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        '0' => '\0',
                        other => {
                            return Err(ParseError::InvalidEscape {
                                escape: other,
                                at: escape_at,
                            });
                        }
                    };
                    value.push(resolved);
                }
                other => value.push(other),
            }
        }
    }

    fn number(&mut self, first: char, at: Span) -> Result<TokenKind, ParseError> {
        if first == '0' && (self.peek() == Some('x') || self.peek() == Some('X')) {
            self.bump();
            let mut digits = String::new();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_hexdigit() || ch == '_' {
                    if ch != '_' {
                        digits.push(ch);
                    }
                    self.bump();
                } else {
                    break;
                }
            }
            if digits.is_empty() {
                return Err(ParseError::MalformedNumber { at });
            }
            let value =
                u64::from_str_radix(&digits, 16).map_err(|_| ParseError::IntegerOverflow { at })?;
            let value = i64::try_from(value).map_err(|_| ParseError::IntegerOverflow { at })?;
            return Ok(TokenKind::Integer(value));
        }

        let mut digits = String::from(first);
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() || ch == '_' {
                if ch != '_' {
                    digits.push(ch);
                }
                self.bump();
            } else {
                break;
            }
        }
        let value: i64 = digits
            .parse()
            .map_err(|_| ParseError::IntegerOverflow { at })?;
        Ok(TokenKind::Integer(value))
    }

    fn ident(&mut self, first: char) -> TokenKind {
        let mut name = String::from(first);
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                name.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        match name.as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            _ => TokenKind::Ident(name),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn span(&mut self) -> Span {
        Span::new(self.line, self.column)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn bump(&mut self) -> Option<char> {
        let (_, ch) = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_arithmetic() {
        assert_eq!(
            kinds("(n + 1) * 8"),
            vec![
                TokenKind::LParen,
                TokenKind::Ident("n".into()),
                TokenKind::Plus,
                TokenKind::Integer(1),
                TokenKind::RParen,
                TokenKind::Star,
                TokenKind::Integer(8),
            ]
        );
    }

    #[test]
    fn lexes_hex_and_underscores() {
        assert_eq!(
            kinds("0xFF 1_000"),
            vec![TokenKind::Integer(255), TokenKind::Integer(1000)]
        );
    }

    #[test]
    fn lexes_comparisons_and_keywords() {
        assert_eq!(
            kinds("a <= b and not c != true"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Le,
                TokenKind::Ident("b".into()),
                TokenKind::And,
                TokenKind::Not,
                TokenKind::Ident("c".into()),
                TokenKind::NotEq,
                TokenKind::True,
            ]
        );
    }

    #[test]
    fn lexes_string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\n""#),
            vec![TokenKind::Str("a\"b\n".into())]
        );
    }

    #[test]
    fn reports_positions() {
        let tokens = tokenize("a\n  b").unwrap();
        assert_eq!(tokens[0].at, Span::new(1, 1));
        assert_eq!(tokens[1].at, Span::new(2, 3));
    }

    #[test]
    fn rejects_bare_equals() {
        assert_eq!(
            tokenize("a = b").unwrap_err(),
            ParseError::UnexpectedChar {
                found: '=',
                at: Span::new(1, 3)
            }
        );
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(matches!(
            tokenize("\"abc").unwrap_err(),
            ParseError::UnterminatedString { .. }
        ));
    }

    #[test]
    fn rejects_overflowing_literal() {
        assert!(matches!(
            tokenize("99999999999999999999").unwrap_err(),
            ParseError::IntegerOverflow { .. }
        ));
    }
}
