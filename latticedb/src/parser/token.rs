//! Tokenizer for the SQL surface (C6), built on `logos` in the same shape
//! as the teacher crate's `ast::token_kind`/`ast::tokenizer` pair.

use std::ops::Range;

use logos::{Lexer, Logos};
use strum_macros::EnumIter;

#[allow(non_camel_case_types)]
#[derive(Logos, EnumIter, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Error,
    EOI,

    #[regex(r"[ \t\r\n\f]+", logos::skip)]
    Whitespace,
    #[regex(r"--[^\n]*", logos::skip)]
    Comment,

    #[regex(r#"[_a-zA-Z][_a-zA-Z0-9]*"#)]
    Ident,

    #[regex(r#""([^"\\]|\\.)*""#)]
    #[regex(r#"'([^'\\]|\\.)*'"#)]
    QuotedString,

    #[regex(r"[0-9]+")]
    LiteralInteger,
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?")]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+")]
    LiteralFloat,

    #[token("=")]
    Eq,
    #[token("<>")]
    #[token("!=")]
    NotEq,
    #[token("<=")]
    Lte,
    #[token(">=")]
    Gte,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Period,
    #[token(";")]
    SemiColon,
    #[token("*")]
    Star,
    #[token("-")]
    Minus,

    // Keywords. Matched case-insensitively; `Ident` only wins for anything
    // that doesn't land in this list (table/column names).
    #[token("CREATE", ignore(ascii_case))]
    CREATE,
    #[token("TABLE", ignore(ascii_case))]
    TABLE,
    #[token("DROP", ignore(ascii_case))]
    DROP,
    #[token("PRIMARY", ignore(ascii_case))]
    PRIMARY,
    #[token("KEY", ignore(ascii_case))]
    KEY,
    #[token("MERGE", ignore(ascii_case))]
    MERGE,
    #[token("INSERT", ignore(ascii_case))]
    INSERT,
    #[token("INTO", ignore(ascii_case))]
    INTO,
    #[token("VALUES", ignore(ascii_case))]
    VALUES,
    #[token("ON", ignore(ascii_case))]
    ON,
    #[token("CONFLICT", ignore(ascii_case))]
    CONFLICT,
    #[token("UPDATE", ignore(ascii_case))]
    UPDATE,
    #[token("SET", ignore(ascii_case))]
    SET,
    #[token("WHERE", ignore(ascii_case))]
    WHERE,
    #[token("AND", ignore(ascii_case))]
    AND,
    #[token("IS", ignore(ascii_case))]
    IS,
    #[token("NOT", ignore(ascii_case))]
    NOT,
    #[token("NULL", ignore(ascii_case))]
    NULL,
    #[token("VALID", ignore(ascii_case))]
    VALID,
    #[token("PERIOD", ignore(ascii_case))]
    PERIOD,
    #[token("DELETE", ignore(ascii_case))]
    DELETE,
    #[token("FROM", ignore(ascii_case))]
    FROM,
    #[token("SELECT", ignore(ascii_case))]
    SELECT,
    #[token("JOIN", ignore(ascii_case))]
    JOIN,
    #[token("FOR", ignore(ascii_case))]
    FOR,
    #[token("SYSTEM_TIME", ignore(ascii_case))]
    SYSTEM_TIME,
    #[token("AS", ignore(ascii_case))]
    AS,
    #[token("OF", ignore(ascii_case))]
    OF,
    #[token("TX", ignore(ascii_case))]
    TX,
    #[token("GROUP", ignore(ascii_case))]
    GROUP,
    #[token("BY", ignore(ascii_case))]
    BY,
    #[token("ORDER", ignore(ascii_case))]
    ORDER,
    #[token("DESC", ignore(ascii_case))]
    DESC,
    #[token("LIMIT", ignore(ascii_case))]
    LIMIT,
    #[token("DISTANCE", ignore(ascii_case))]
    DISTANCE,
    #[token("COUNT", ignore(ascii_case))]
    COUNT,
    #[token("SUM", ignore(ascii_case))]
    SUM,
    #[token("AVG", ignore(ascii_case))]
    AVG,
    #[token("MIN", ignore(ascii_case))]
    MIN,
    #[token("MAX", ignore(ascii_case))]
    MAX,
    #[token("DP_COUNT", ignore(ascii_case))]
    DP_COUNT,
    #[token("DP_EPSILON", ignore(ascii_case))]
    DP_EPSILON,
    #[token("SAVE", ignore(ascii_case))]
    SAVE,
    #[token("LOAD", ignore(ascii_case))]
    LOAD,
    #[token("DATABASE", ignore(ascii_case))]
    DATABASE,
    #[token("BEGIN", ignore(ascii_case))]
    BEGIN,
    #[token("TRANSACTION", ignore(ascii_case))]
    TRANSACTION,
    #[token("COMMIT", ignore(ascii_case))]
    COMMIT,
    #[token("END", ignore(ascii_case))]
    END,
    #[token("ROLLBACK", ignore(ascii_case))]
    ROLLBACK,
    #[token("EXIT", ignore(ascii_case))]
    EXIT,
    #[token("QUIT", ignore(ascii_case))]
    QUIT,
    #[token("INT", ignore(ascii_case))]
    INT,
    #[token("INTEGER", ignore(ascii_case))]
    INTEGER,
    #[token("DOUBLE", ignore(ascii_case))]
    DOUBLE,
    #[token("FLOAT", ignore(ascii_case))]
    FLOAT,
    #[token("TEXT", ignore(ascii_case))]
    TEXT,
    #[token("VECTOR", ignore(ascii_case))]
    VECTOR,
    #[token("LWW", ignore(ascii_case))]
    LWW,
    #[token("SUM_BOUNDED", ignore(ascii_case))]
    SUM_BOUNDED,
    #[token("GSET", ignore(ascii_case))]
    GSET,
    #[token("ASC", ignore(ascii_case))]
    ASC,
}

impl TokenKind {
    pub fn is_literal(&self) -> bool {
        matches!(self, TokenKind::LiteralInteger | TokenKind::LiteralFloat | TokenKind::QuotedString)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub source: &'a str,
    pub slice: &'a str,
    pub kind: TokenKind,
    pub span: Range<usize>,
}

impl<'a> Token<'a> {
    fn new_eoi(source: &'a str) -> Self {
        Token { source, slice: "", kind: TokenKind::EOI, span: source.len()..source.len() }
    }

    pub fn text(&self) -> &'a str {
        &self.source[self.span.clone()]
    }
}

impl<'a> std::fmt::Debug for Token<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({:?})", self.kind, self.slice)
    }
}

pub struct Tokenizer<'a> {
    source: &'a str,
    lexer: Lexer<'a, TokenKind>,
    eoi: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Tokenizer { source, lexer: TokenKind::lexer(source), eoi: false }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, String>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.lexer.next() {
            Some(Err(())) => {
                Some(Err(format!("unrecognized token near {:?}", self.lexer.slice())))
            }
            Some(Ok(kind)) => Some(Ok(Token {
                source: self.source,
                slice: self.lexer.slice(),
                kind,
                span: self.lexer.span(),
            })),
            None if !self.eoi => {
                self.eoi = true;
                Some(Ok(Token::new_eoi(self.source)))
            }
            None => None,
        }
    }
}

pub fn tokenize_sql(sql: &str) -> Result<Vec<Token>, String> {
    Tokenizer::new(sql).collect()
}

/// All reserved keywords, lowercased, used by the CLI's completion helper.
pub fn all_reserved_keywords() -> Vec<String> {
    use strum::IntoEnumIterator;
    TokenKind::iter()
        .filter(|k| {
            !matches!(
                k,
                TokenKind::Error
                    | TokenKind::EOI
                    | TokenKind::Whitespace
                    | TokenKind::Comment
                    | TokenKind::Ident
                    | TokenKind::QuotedString
                    | TokenKind::LiteralInteger
                    | TokenKind::LiteralFloat
            ) && !k.is_punctuation()
        })
        .map(|k| format!("{k:?}").to_ascii_lowercase())
        .collect()
}

impl TokenKind {
    fn is_punctuation(&self) -> bool {
        matches!(
            self,
            TokenKind::Eq
                | TokenKind::NotEq
                | TokenKind::Lte
                | TokenKind::Gte
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::LParen
                | TokenKind::RParen
                | TokenKind::LBracket
                | TokenKind::RBracket
                | TokenKind::LBrace
                | TokenKind::RBrace
                | TokenKind::Comma
                | TokenKind::Period
                | TokenKind::SemiColon
                | TokenKind::Star
                | TokenKind::Minus
        )
    }
}
