use crate::lexer::{tokenize, Token, TokenKind};
use crate::{
    ArithOp, BindingError, CompareOp, Expr, ParseError, Reference, ReferenceContext, Span,
};
use std::sync::Arc;

/// Parse an expression source against a reference context.
///
/// Every identifier is resolved statically while parsing, so the returned
/// tree is fully typed; parameterless subtrees are folded to literals
/// before it is handed back.
pub fn parse(source: &str, context: &Arc<dyn ReferenceContext>) -> Result<Expr, BindingError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        context,
    };
    let expr = parser.or_expr()?;
    if let Some(token) = parser.peek() {
        return Err(ParseError::UnexpectedToken {
            found: token.kind.to_string(),
            expected: "end of expression",
            at: token.at,
        }
        .into());
    }
    Ok(expr.fold())
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    context: &'a Arc<dyn ReferenceContext>,
}

impl Parser<'_> {
    fn or_expr(&mut self) -> Result<Expr, BindingError> {
        let mut expr = self.and_expr()?;
        while let Some(at) = self.eat(&TokenKind::Or) {
            let rhs = self.and_expr()?;
            expr = Expr::or(expr, rhs, at)?;
        }
        Ok(expr)
    }

    fn and_expr(&mut self) -> Result<Expr, BindingError> {
        let mut expr = self.not_expr()?;
        while let Some(at) = self.eat(&TokenKind::And) {
            let rhs = self.not_expr()?;
            expr = Expr::and(expr, rhs, at)?;
        }
        Ok(expr)
    }

    fn not_expr(&mut self) -> Result<Expr, BindingError> {
        if let Some(at) = self.eat(&TokenKind::Not) {
            let operand = self.not_expr()?;
            return Ok(Expr::not(operand, at)?);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, BindingError> {
        let lhs = self.additive()?;
        let op = match self.peek().map(|token| &token.kind) {
            Some(TokenKind::Lt) => CompareOp::Lt,
            Some(TokenKind::Le) => CompareOp::Le,
            Some(TokenKind::Gt) => CompareOp::Gt,
            Some(TokenKind::Ge) => CompareOp::Ge,
            Some(TokenKind::EqEq) => CompareOp::Eq,
            Some(TokenKind::NotEq) => CompareOp::Ne,
            _ => return Ok(lhs),
        };
        let at = self.bump().expect("operator token was peeked").at;
        let rhs = self.additive()?;
        Ok(Expr::compare(op, lhs, rhs, at)?)
    }

    fn additive(&mut self) -> Result<Expr, BindingError> {
        let mut expr = self.multiplicative()?;
        loop {
            let op = match self.peek().map(|token| &token.kind) {
                Some(TokenKind::Plus) => ArithOp::Add,
                Some(TokenKind::Minus) => ArithOp::Sub,
                _ => return Ok(expr),
            };
            let at = self.bump().expect("operator token was peeked").at;
            let rhs = self.multiplicative()?;
            expr = Expr::arith(op, expr, rhs, at)?;
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, BindingError> {
        let mut expr = self.power()?;
        loop {
            let op = match self.peek().map(|token| &token.kind) {
                Some(TokenKind::Star) => ArithOp::Mul,
                Some(TokenKind::Slash) => ArithOp::Div,
                Some(TokenKind::Percent) => ArithOp::Rem,
                _ => return Ok(expr),
            };
            let at = self.bump().expect("operator token was peeked").at;
            let rhs = self.power()?;
            expr = Expr::arith(op, expr, rhs, at)?;
        }
    }

    fn power(&mut self) -> Result<Expr, BindingError> {
        let base = self.unary()?;
        if let Some(at) = self.eat(&TokenKind::Caret) {
            // Right-associative.
            let exponent = self.power()?;
            return Ok(Expr::arith(ArithOp::Pow, base, exponent, at)?);
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<Expr, BindingError> {
        if let Some(at) = self.eat(&TokenKind::Minus) {
            let operand = self.unary()?;
            return Ok(Expr::negate(operand, at)?);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, BindingError> {
        let Some(token) = self.bump() else {
            return Err(ParseError::UnexpectedEnd {
                expected: "an expression",
            }
            .into());
        };
        match token.kind {
            TokenKind::Integer(value) => Ok(Expr::Integer(value)),
            TokenKind::True => Ok(Expr::Bool(true)),
            TokenKind::False => Ok(Expr::Bool(false)),
            TokenKind::Str(value) => Ok(Expr::Str(value)),
            TokenKind::LParen => {
                let expr = self.or_expr()?;
                self.expect_rparen()?;
                Ok(expr)
            }
            TokenKind::Ident(name) => self.reference(name, token.at),
            other => Err(ParseError::UnexpectedToken {
                found: other.to_string(),
                expected: "an expression",
                at: token.at,
            }
            .into()),
        }
    }

    /// A reference path: zero or more `outer.` prefixes, an attribute, then
    /// any chain of `.attribute` and `[index]` selections.
    fn reference(&mut self, first: String, at: Span) -> Result<Expr, BindingError> {
        let mut reference = Reference::scope(Arc::clone(self.context));
        let mut name = first;
        let mut name_at = at;

        // `outer` is contextual: it walks a scope up only at the head of a
        // path, anywhere else it is an ordinary attribute name.
        while name == "outer" {
            reference = reference.select_outer(name_at)?;
            self.expect_kind(&TokenKind::Dot, "`.` after `outer`")?;
            let ident = self.bump_ident("an attribute after `outer.`")?;
            name = ident.0;
            name_at = ident.1;
        }
        reference = reference.select_attribute(&name, name_at)?;

        loop {
            if let Some(_at) = self.eat(&TokenKind::Dot) {
                let (name, at) = self.bump_ident("an attribute after `.`")?;
                reference = reference.select_attribute(&name, at)?;
            } else if let Some(at) = self.eat(&TokenKind::LBracket) {
                let index = self.or_expr()?;
                self.expect_kind(&TokenKind::RBracket, "`]` after an index")?;
                reference = reference.select_item(index, at)?;
            } else {
                return Ok(Expr::Reference(reference));
            }
        }
    }

    fn bump_ident(&mut self, expected: &'static str) -> Result<(String, Span), BindingError> {
        match self.bump() {
            Some(Token {
                kind: TokenKind::Ident(name),
                at,
            }) => Ok((name, at)),
            Some(token) => Err(ParseError::UnexpectedToken {
                found: token.kind.to_string(),
                expected,
                at: token.at,
            }
            .into()),
            None => Err(ParseError::UnexpectedEnd { expected }.into()),
        }
    }

    fn expect_rparen(&mut self) -> Result<(), BindingError> {
        self.expect_kind(&TokenKind::RParen, "`)`").map(|_| ())
    }

    fn expect_kind(
        &mut self,
        kind: &TokenKind,
        expected: &'static str,
    ) -> Result<Token, BindingError> {
        match self.bump() {
            Some(token) if token.kind == *kind => Ok(token),
            Some(token) => Err(ParseError::UnexpectedToken {
                found: token.kind.to_string(),
                expected,
                at: token.at,
            }
            .into()),
            None => Err(ParseError::UnexpectedEnd { expected }.into()),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Consume the next token when it matches, returning its span.
    fn eat(&mut self, kind: &TokenKind) -> Option<Span> {
        if self.peek().map(|token| &token.kind) == Some(kind) {
            self.bump().map(|token| token.at)
        } else {
            None
        }
    }
}
