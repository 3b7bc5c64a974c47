//! Tokenizer built from `nom` combinators.
//!
//! The driver loop owns whitespace, comments and line tracking; every token
//! itself is recognised by a small combinator so the grammar of literals stays
//! declarative.

use crate::language::{
    span::Span,
    token::{Token, TokenKind},
};
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag, take_until, take_while},
    character::complete::{char as one_char, digit1, none_of, satisfy},
    combinator::{map, map_res, opt, recognize, value},
    sequence::{delimited, pair, preceded},
    IResult,
};

type LexResult<'a, T> = IResult<&'a str, T>;

#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    src: &'a str,
    offset: usize,
    line_start: bool,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            offset: 0,
            line_start: true,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>, Vec<LexError>> {
        while let Some(ch) = self.rest().chars().next() {
            if ch == '\n' {
                self.line_start = true;
                self.offset += 1;
                continue;
            }
            if ch.is_whitespace() {
                self.offset += ch.len_utf8();
                continue;
            }
            let rest = self.rest();
            if rest.starts_with("//") {
                if let Ok((after, _)) = line_comment(rest) {
                    self.skip_to(after);
                }
                continue;
            }
            if rest.starts_with("/*") {
                match block_comment(rest) {
                    Ok((after, body)) => {
                        if body.contains('\n') {
                            self.line_start = true;
                        }
                        self.skip_to(after);
                    }
                    Err(_) => {
                        self.error(self.offset, self.src.len(), "Unterminated block comment");
                        break;
                    }
                }
                continue;
            }
            match token(rest) {
                Ok((after, kind)) => {
                    let start = self.offset;
                    self.skip_to(after);
                    self.push_token(kind, start, self.offset);
                }
                Err(_) if ch == '"' => {
                    self.error(self.offset, self.src.len(), "Unterminated string literal");
                    break;
                }
                Err(_) => {
                    let start = self.offset;
                    self.offset += ch.len_utf8();
                    self.error(start, self.offset, format!("Unexpected character `{ch}`"));
                }
            }
        }
        let end = self.src.len();
        self.push_token(TokenKind::Eof, end, end);

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.offset..]
    }

    fn skip_to(&mut self, after: &str) {
        self.offset = self.src.len() - after.len();
    }

    fn push_token(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, end),
            line_start: self.line_start,
        });
        self.line_start = false;
    }

    fn error(&mut self, start: usize, end: usize, message: impl Into<String>) {
        self.errors.push(LexError {
            message: message.into(),
            span: Span::new(start, end),
        });
    }
}

fn token(i: &str) -> LexResult<TokenKind> {
    alt((
        map(number, TokenKind::Number),
        map(string_literal, TokenKind::String),
        map(identifier, |word| {
            TokenKind::keyword(word).unwrap_or_else(|| TokenKind::Identifier(word.to_string()))
        }),
        symbol,
    ))(i)
}

fn line_comment(i: &str) -> LexResult<&str> {
    preceded(tag("//"), take_while(|c: char| c != '\n'))(i)
}

fn block_comment(i: &str) -> LexResult<&str> {
    delimited(tag("/*"), take_until("*/"), tag("*/"))(i)
}

fn identifier(i: &str) -> LexResult<&str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(i)
}

// Digits may be grouped with underscores: `12_000`.
fn digits(i: &str) -> LexResult<&str> {
    recognize(pair(digit1, take_while(|c: char| c.is_ascii_digit() || c == '_')))(i)
}

fn number(i: &str) -> LexResult<f64> {
    map_res(
        recognize(pair(digits, opt(pair(one_char('.'), digits)))),
        |text: &str| text.replace('_', "").parse::<f64>(),
    )(i)
}

fn string_literal(i: &str) -> LexResult<String> {
    let body = escaped_transform(
        none_of("\\\""),
        '\\',
        alt((
            value("\\", one_char('\\')),
            value("\"", one_char('"')),
            value("\n", one_char('n')),
            value("\t", one_char('t')),
        )),
    );
    map(
        delimited(one_char('"'), opt(body), one_char('"')),
        Option::unwrap_or_default,
    )(i)
}

fn symbol(i: &str) -> LexResult<TokenKind> {
    alt((multi_char_symbol, single_char_symbol))(i)
}

fn multi_char_symbol(i: &str) -> LexResult<TokenKind> {
    alt((
        value(TokenKind::PipeGt, tag("|>")),
        value(TokenKind::Arrow, tag("->")),
        value(TokenKind::FatArrow, tag("=>")),
        value(TokenKind::AmpersandAmpersand, tag("&&")),
        value(TokenKind::PipePipe, tag("||")),
        value(TokenKind::BangEq, tag("!=")),
        value(TokenKind::EqEq, tag("==")),
        value(TokenKind::LtEq, tag("<=")),
        value(TokenKind::GtEq, tag(">=")),
        value(TokenKind::DotDotEq, tag("..=")),
        value(TokenKind::DotDot, tag("..")),
        value(TokenKind::ColonColon, tag("::")),
    ))(i)
}

fn single_char_symbol(i: &str) -> LexResult<TokenKind> {
    alt((
        value(TokenKind::Bang, one_char('!')),
        value(TokenKind::Eq, one_char('=')),
        value(TokenKind::Lt, one_char('<')),
        value(TokenKind::Gt, one_char('>')),
        value(TokenKind::Plus, one_char('+')),
        value(TokenKind::Minus, one_char('-')),
        value(TokenKind::Star, one_char('*')),
        value(TokenKind::Slash, one_char('/')),
        value(TokenKind::Percent, one_char('%')),
        value(TokenKind::Comma, one_char(',')),
        value(TokenKind::Colon, one_char(':')),
        value(TokenKind::Semi, one_char(';')),
        value(TokenKind::LParen, one_char('(')),
        value(TokenKind::RParen, one_char(')')),
        value(TokenKind::LBrace, one_char('{')),
        value(TokenKind::RBrace, one_char('}')),
        value(TokenKind::LBracket, one_char('[')),
        value(TokenKind::RBracket, one_char(']')),
    ))(i)
}
