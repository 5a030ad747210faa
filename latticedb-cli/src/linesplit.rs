//! Splits REPL input into complete statements. This is a different concern
//! from SQL-grammar tokenizing (`latticedb::parser::token`): it only needs
//! to recognize semicolons, comments and quoted strings well enough to
//! know when a statement ends, across possibly many `readline()` calls.

use std::ops::Range;

use logos::{Lexer, Logos};

#[allow(non_camel_case_types)]
#[derive(Logos, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Error,
    EOI,

    #[regex(r"[ \t\r\f]+", logos::skip)]
    Whitespace,

    #[regex(r"--[^\n]*")]
    Comment,

    #[token("/*")]
    CommentBlockStart,
    #[token("*/")]
    CommentBlockEnd,

    #[regex(r"\n")]
    Newline,

    #[regex(r#""([^"\\]|\\.)*""#)]
    #[regex(r#"'([^'\\]|\\.)*'"#)]
    QuotedString,

    #[token(";")]
    SemiColon,

    #[regex(r"[^;\n]")]
    Other,
}

pub struct Token<'a> {
    pub kind: TokenKind,
    pub span: Range<usize>,
    pub slice: &'a str,
}

pub struct Tokenizer<'a> {
    lexer: Lexer<'a, TokenKind>,
    eoi: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Tokenizer { lexer: TokenKind::lexer(source), eoi: false }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lexer.next() {
            Some(Err(())) => Some(Err("unrecognized input".to_string())),
            Some(Ok(kind)) => Some(Ok(Token { kind, span: self.lexer.span(), slice: self.lexer.slice() })),
            None if !self.eoi => {
                self.eoi = true;
                let end = self.lexer.span().end;
                Some(Ok(Token { kind: TokenKind::EOI, span: end..end, slice: "" }))
            }
            None => None,
        }
    }
}
