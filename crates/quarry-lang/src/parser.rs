//! Recursive descent parser for predicate expressions.

use crate::ast::{BinaryOp, Expr, Literal};
use crate::error::ParseError;
use crate::lexer::{Lexer, SpannedToken, Token};
use crate::span::{Span, Spanned};

/// Parser for a single predicate expression.
pub struct Parser<'source> {
    lexer: Lexer<'source>,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            lexer: Lexer::new(source),
        }
    }

    /// Parse the whole input as one expression.
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        if self.lexer.peek()?.is_none() {
            return Err(ParseError::new(
                "empty expression",
                Span::new(0, self.lexer.source_len()),
            ));
        }

        let expr = self.parse_or()?;

        if let Some(tok) = self.lexer.next_token()? {
            return Err(ParseError::new(
                format!("unexpected {} after end of expression", tok.token.describe()),
                tok.span,
            )
            .with_hint("combine conditions with '&&' or '||'"));
        }

        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(&[BinaryOp::Or], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(&[BinaryOp::And], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(&[BinaryOp::Eq, BinaryOp::Ne], Self::parse_relational)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(
            &[BinaryOp::Lt, BinaryOp::Le, BinaryOp::Gt, BinaryOp::Ge],
            Self::parse_unary,
        )
    }

    /// Left-associative chain of `operand (op operand)*`.
    fn parse_binary(
        &mut self,
        ops: &[BinaryOp],
        operand: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut left = operand(self)?;

        while let Some(op) = self.peek_binary_op()? {
            if !ops.contains(&op) {
                break;
            }
            self.next_token()?;
            let right = operand(self)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.peek_is(&Token::Bang)? {
            let bang = self.next_token()?;
            let operand = self.parse_unary()?;
            let span = bang.span.merge(operand.span());
            return Ok(Expr::Not {
                operand: Box::new(operand),
                span,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        while self.peek_is(&Token::Dot)? {
            self.next_token()?;
            let name = self.expect_ident()?;

            if self.peek_is(&Token::LParen)? {
                self.next_token()?;
                let args = self.parse_args()?;
                let close = self.expect_token(Token::RParen)?;
                let span = expr.span().merge(close.span);
                expr = Expr::Call {
                    target: Box::new(expr),
                    method: name,
                    args,
                    span,
                };
            } else {
                expr = Expr::Member {
                    target: Box::new(expr),
                    member: name,
                };
            }
        }

        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.peek_is(&Token::RParen)? {
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            if !self.peek_is(&Token::Comma)? {
                break;
            }
            self.next_token()?;
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.next_token()?;
        let literal = match tok.token {
            Token::Int(n) => Literal::Int(n),
            Token::Float(n) => Literal::Float(n),
            Token::String(s) => Literal::String(s),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::Null => Literal::Null,
            Token::Ident(name) => return Ok(Expr::Ident(Spanned::new(name, tok.span))),
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect_token(Token::RParen)?;
                return Ok(inner);
            }
            other => {
                return Err(ParseError::new(
                    format!("expected a value, member or '(' but found {}", other.describe()),
                    tok.span,
                ))
            }
        };
        Ok(Expr::Literal(Spanned::new(literal, tok.span)))
    }

    fn peek_binary_op(&mut self) -> Result<Option<BinaryOp>, ParseError> {
        Ok(self.lexer.peek()?.and_then(|tok| match tok.token {
            Token::Or => Some(BinaryOp::Or),
            Token::And => Some(BinaryOp::And),
            Token::Eq => Some(BinaryOp::Eq),
            Token::Ne => Some(BinaryOp::Ne),
            Token::Lt => Some(BinaryOp::Lt),
            Token::Le => Some(BinaryOp::Le),
            Token::Gt => Some(BinaryOp::Gt),
            Token::Ge => Some(BinaryOp::Ge),
            _ => None,
        }))
    }

    fn peek_is(&mut self, expected: &Token) -> Result<bool, ParseError> {
        Ok(self.lexer.peek()?.is_some_and(|tok| &tok.token == expected))
    }

    /// Expect and consume an identifier.
    fn expect_ident(&mut self) -> Result<Spanned<String>, ParseError> {
        let tok = self.next_token()?;
        match tok.token {
            Token::Ident(name) => Ok(Spanned::new(name, tok.span)),
            other => Err(ParseError::new(
                format!("expected member name after '.', found {}", other.describe()),
                tok.span,
            )),
        }
    }

    /// Expect and consume a specific token.
    fn expect_token(&mut self, expected: Token) -> Result<SpannedToken, ParseError> {
        let tok = self.next_token()?;
        if tok.token == expected {
            Ok(tok)
        } else {
            Err(ParseError::new(
                format!(
                    "expected {}, found {}",
                    expected.describe(),
                    tok.token.describe()
                ),
                tok.span,
            ))
        }
    }

    /// Get the next token or error at end of input.
    fn next_token(&mut self) -> Result<SpannedToken, ParseError> {
        let end = self.lexer.source_len();
        self.lexer.next_token()?.ok_or_else(|| {
            ParseError::new("unexpected end of input", Span::at(end))
                .with_hint("the expression is incomplete")
        })
    }
}

/// Parse a source string into an expression.
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    Parser::new(source).parse_expression()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ident(name: &str, start: usize) -> Expr {
        Expr::Ident(Spanned::new(
            name.to_string(),
            Span::new(start, start + name.len()),
        ))
    }

    /// Compact rendering that makes grouping visible.
    fn sexpr(expr: &Expr) -> String {
        match expr {
            Expr::Literal(lit) => format!("{:?}", lit.value),
            Expr::Ident(name) => name.value.clone(),
            Expr::Member { target, member } => format!("{}.{}", sexpr(target), member.value),
            Expr::Call {
                target,
                method,
                args,
                ..
            } => {
                let args: Vec<_> = args.iter().map(sexpr).collect();
                format!("{}.{}({})", sexpr(target), method.value, args.join(", "))
            }
            Expr::Not { operand, .. } => format!("(! {})", sexpr(operand)),
            Expr::Binary { op, left, right } => {
                format!("({} {} {})", op.symbol(), sexpr(left), sexpr(right))
            }
        }
    }

    #[test]
    fn test_parse_member_comparison() {
        let expr = parse(r#"x.FirstName == "John""#).unwrap();
        let Expr::Binary { op, left, right } = expr else {
            panic!("expected binary expression");
        };
        assert_eq!(op, BinaryOp::Eq);
        assert_eq!(
            *left,
            Expr::Member {
                target: Box::new(ident("x", 0)),
                member: Spanned::new("FirstName".into(), Span::new(2, 11)),
            }
        );
        assert_eq!(
            *right,
            Expr::Literal(Spanned::new(Literal::String("John".into()), Span::new(15, 21)))
        );
    }

    #[test]
    fn test_precedence() {
        let expr = parse("x.A || x.B && !x.C == false").unwrap();
        assert_eq!(sexpr(&expr), "(|| x.A (&& x.B (== (! x.C) Bool(false))))");

        let expr = parse("(x.A || x.B) && x.C < 3").unwrap();
        assert_eq!(sexpr(&expr), "(&& (|| x.A x.B) (< x.C Int(3)))");
    }

    #[test]
    fn test_left_associative() {
        let expr = parse("a == b == c").unwrap();
        assert_eq!(sexpr(&expr), "(== (== a b) c)");
    }

    #[test]
    fn test_calls_and_chains() {
        let expr = parse(r#"x.Name.Trim().StartsWith("A", 'b') && x.Name.Length > 2"#).unwrap();
        assert_eq!(
            sexpr(&expr),
            r#"(&& x.Name.Trim().StartsWith(String("A"), String("b")) (> x.Name.Length Int(2)))"#
        );
        assert_eq!(expr.span(), Span::new(0, 55));
    }

    #[test]
    fn test_incomplete_expression() {
        let err = parse("FirstName ==").unwrap_err();
        assert_eq!(err.message, "unexpected end of input");
        assert_eq!(err.span, Span::at(12));
    }

    #[test]
    fn test_trailing_tokens() {
        let err = parse("x.A == 1 x.B").unwrap_err();
        assert!(err.message.contains("after end of expression"));
        assert_eq!(err.span, Span::new(9, 10));
    }

    #[test]
    fn test_empty_and_unbalanced() {
        assert_eq!(parse("   ").unwrap_err().message, "empty expression");
        assert!(parse("(x.A == 1").is_err());
        assert!(parse("x. == 1").is_err());
        assert!(parse("x.A == )").is_err());
    }
}
