//! Lexer for the predicate expression language using logos.

use crate::error::ParseError;
use crate::span::Span;
use logos::Logos;

/// Token types for predicate expressions.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // Comparison operators
    #[token("==")]
    Eq,
    #[token("!=")]
    Ne,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    // Logical operators
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("!")]
    Bang,

    // Literals
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Double- or single-quoted; both produce the same token.
    #[regex(r#""([^"\\]|\\.)*""#, |lex| unquote(lex.slice()))]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| unquote(lex.slice()))]
    String(String),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    #[regex(r"-?[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    // Punctuation
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
}

impl Token {
    /// How the token reads in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Token::Eq => "'=='".into(),
            Token::Ne => "'!='".into(),
            Token::Le => "'<='".into(),
            Token::Ge => "'>='".into(),
            Token::Lt => "'<'".into(),
            Token::Gt => "'>'".into(),
            Token::And => "'&&'".into(),
            Token::Or => "'||'".into(),
            Token::Bang => "'!'".into(),
            Token::True => "'true'".into(),
            Token::False => "'false'".into(),
            Token::Null => "'null'".into(),
            Token::Ident(name) => format!("identifier '{name}'"),
            Token::String(s) => format!("string {s:?}"),
            Token::Int(n) => format!("number {n}"),
            Token::Float(n) => format!("number {n}"),
            Token::Dot => "'.'".into(),
            Token::Comma => "','".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
        }
    }
}

/// Strip the quotes from a string literal and resolve escapes.
fn unquote(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('0') => result.push('\0'),
            Some(escaped @ ('\\' | '"' | '\'')) => result.push(escaped),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}

/// A token with its span in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

/// Lexer that produces spanned tokens with one token of lookahead.
///
/// Unrecognized input is an error, never skipped.
pub struct Lexer<'source> {
    inner: logos::Lexer<'source, Token>,
    peeked: Option<Option<SpannedToken>>,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            inner: Token::lexer(source),
            peeked: None,
        }
    }

    /// Peek at the next token without consuming it.
    pub fn peek(&mut self) -> Result<Option<&SpannedToken>, ParseError> {
        if self.peeked.is_none() {
            let next = self.next_inner()?;
            self.peeked = Some(next);
        }
        Ok(self.peeked.as_ref().and_then(|t| t.as_ref()))
    }

    /// Consume the next token.
    pub fn next_token(&mut self) -> Result<Option<SpannedToken>, ParseError> {
        match self.peeked.take() {
            Some(peeked) => Ok(peeked),
            None => self.next_inner(),
        }
    }

    fn next_inner(&mut self) -> Result<Option<SpannedToken>, ParseError> {
        match self.inner.next() {
            Some(Ok(token)) => Ok(Some(SpannedToken {
                token,
                span: self.inner.span().into(),
            })),
            Some(Err(())) => {
                let span: Span = self.inner.span().into();
                let error = ParseError::new(
                    format!("unrecognized input '{}'", self.inner.slice()),
                    span,
                );
                Err(match self.inner.slice() {
                    "=" => error.with_hint("use '==' for equality comparison"),
                    "&" | "|" => error.with_hint("logical operators are '&&' and '||'"),
                    s if s.starts_with('"') || s.starts_with('\'') => {
                        error.with_hint("string literal is missing its closing quote")
                    }
                    _ => error,
                })
            }
            None => Ok(None),
        }
    }

    /// Byte length of the source, used for end-of-input spans.
    pub fn source_len(&self) -> usize {
        self.inner.source().len()
    }
}

/// Tokenize a whole expression.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}
