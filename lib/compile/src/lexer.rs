use crate::diagnostics::{CompileError, LocatableError, Span, Spanned, SyntaxError};
use logos::{Lexer, Logos};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Default, Error, PartialEq, Clone)]
pub enum LexerError {
    #[error("Unknown token")]
    #[default]
    UnknownToken,
    #[error("Invalid integer literal")]
    ParseInt,
    #[error("Invalid float literal")]
    ParseFloat,
    #[error("Unterminated string literal")]
    UnterminatedString,
}

impl From<std::num::ParseIntError> for LexerError {
    fn from(_: std::num::ParseIntError) -> Self {
        LexerError::ParseInt
    }
}

impl From<std::num::ParseFloatError> for LexerError {
    fn from(_: std::num::ParseFloatError) -> Self {
        LexerError::ParseFloat
    }
}

fn ident(lex: &mut Lexer<TokenKind>) -> String {
    lex.slice().to_string()
}

/// Strips the surrounding quotes and collapses doubled `''` escapes.
fn string(lex: &mut Lexer<TokenKind>) -> String {
    let slice = lex.slice();
    slice[1..slice.len() - 1].replace("''", "'")
}

#[derive(Logos, Debug, PartialEq, Clone)]
#[logos(error = LexerError)]
pub enum TokenKind {
    #[regex(r"[ \r\n\t\f]+", logos::skip)]
    #[regex(r"--[^\n]*", logos::skip)]
    Ignored,

    #[token("SELECT", ignore(ascii_case))]
    Select,
    #[token("FROM", ignore(ascii_case))]
    From,
    #[token("WHERE", ignore(ascii_case))]
    Where,
    #[token("INSERT", ignore(ascii_case))]
    Insert,
    #[token("INTO", ignore(ascii_case))]
    Into,
    #[token("VALUES", ignore(ascii_case))]
    Values,
    #[token("UPDATE", ignore(ascii_case))]
    Update,
    #[token("SET", ignore(ascii_case))]
    Set,
    #[token("DELETE", ignore(ascii_case))]
    Delete,
    #[token("CREATE", ignore(ascii_case))]
    Create,
    #[token("DROP", ignore(ascii_case))]
    Drop,
    #[token("DATABASE", ignore(ascii_case))]
    Database,
    #[token("DATABASES", ignore(ascii_case))]
    Databases,
    #[token("TABLE", ignore(ascii_case))]
    Table,
    #[token("TABLES", ignore(ascii_case))]
    Tables,
    #[token("INDEX", ignore(ascii_case))]
    Index,
    #[token("UNIQUE", ignore(ascii_case))]
    Unique,
    #[token("PRIMARY", ignore(ascii_case))]
    Primary,
    #[token("KEY", ignore(ascii_case))]
    Key,
    #[token("REFERENCES", ignore(ascii_case))]
    References,
    #[token("JOIN", ignore(ascii_case))]
    Join,
    #[token("ON", ignore(ascii_case))]
    On,
    #[token("AND", ignore(ascii_case))]
    And,
    #[token("SHOW", ignore(ascii_case))]
    Show,
    #[token("TRUE", ignore(ascii_case))]
    True,
    #[token("FALSE", ignore(ascii_case))]
    False,
    #[token("NULL", ignore(ascii_case))]
    Null,

    #[regex("-?[0-9]+", |lex| lex.slice().parse())]
    Integer(i64),
    #[regex("-?[0-9]+\\.[0-9]+", |lex| lex.slice().parse())]
    Float(f64),
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", ident)]
    Ident(String),
    #[regex(r"'([^']|'')*'", string)]
    String(String),

    #[token("=")]
    #[token("==")]
    Eq,
    #[token("<>")]
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("*")]
    Star,

    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(";")]
    Semi,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    #[regex(r"'([^']|'')*", |_| {
        Err(LexerError::UnterminatedString)
    })]
    UnterminatedString,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Integer(i) => write!(f, "{}", i),
            TokenKind::Float(x) => write!(f, "{}", x),
            TokenKind::Ident(name) => write!(f, "{}", name),
            TokenKind::String(s) => write!(f, "'{}'", s),
            TokenKind::Eq => write!(f, "="),
            TokenKind::NotEq => write!(f, "!="),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::LtEq => write!(f, "<="),
            TokenKind::GtEq => write!(f, ">="),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Semi => write!(f, ";"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            keyword => write!(f, "{}", format!("{:?}", keyword).to_uppercase()),
        }
    }
}

/// Every token of `source` with its span, lexical errors included.
pub fn lex(source: &str) -> impl Iterator<Item = (Result<TokenKind, LexerError>, Span)> + '_ {
    TokenKind::lexer(source).spanned()
}

impl TokenKind {
    pub fn is_keyword(&self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Select | From | Where | Insert | Into | Values | Update | Set | Delete | Create | Drop
                | Database | Databases | Table | Tables | Index | Unique | Primary | Key
                | References | Join | On | And | Show | True | False | Null
        )
    }

    pub fn is_operator(&self) -> bool {
        use TokenKind::*;
        matches!(self, Eq | NotEq | Lt | Gt | LtEq | GtEq)
    }
}

/// Splits `source` into spanned tokens, stopping at the first lexical error.
pub fn tokenize(source: &str) -> Result<Vec<Spanned<TokenKind>>, LocatableError> {
    let mut tokens = Vec::new();
    for (token, span) in TokenKind::lexer(source).spanned() {
        match token {
            Ok(token) => tokens.push((token, span)),
            Err(LexerError::UnterminatedString) => {
                return Err((CompileError::SyntaxError(SyntaxError::UnterminatedString), span))
            }
            Err(err) => {
                let token = source.get(span.clone()).unwrap_or_default().to_string();
                return Err((
                    CompileError::SyntaxError(SyntaxError::InvalidToken {
                        token,
                        reason: err.to_string(),
                    }),
                    span,
                ));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod basic_queries {
    use super::*;
    use pretty_assertions_sorted::assert_eq;
    use TokenKind::*;

    #[test]
    fn test_select() {
        let lexer = TokenKind::lexer("SELECT * FROM d1.users;");

        let tokens = lexer.spanned().collect::<Vec<_>>();

        assert_eq!(
            tokens,
            &[
                (Ok(Select), 0..6),
                (Ok(Star), 7..8),
                (Ok(From), 9..13),
                (Ok(Ident("d1".to_string())), 14..16),
                (Ok(Dot), 16..17),
                (Ok(Ident("users".to_string())), 17..22),
                (Ok(Semi), 22..23),
            ],
        );
    }

    #[test]
    fn test_select_where_bool() {
        let lexer = TokenKind::lexer("select * from users where active = true");

        let tokens = lexer.spanned().collect::<Vec<_>>();

        assert_eq!(
            tokens,
            &[
                (Ok(Select), 0..6),
                (Ok(Star), 7..8),
                (Ok(From), 9..13),
                (Ok(Ident("users".to_string())), 14..19),
                (Ok(Where), 20..25),
                (Ok(Ident("active".to_string())), 26..32),
                (Ok(Eq), 33..34),
                (Ok(True), 35..39),
            ],
        );
    }

    #[test]
    fn test_insert() {
        let lexer =
            TokenKind::lexer("INSERT INTO s.products (name, price) VALUES ('Widget', 19.99);");

        let tokens = lexer.spanned().collect::<Vec<_>>();

        assert_eq!(
            tokens,
            &[
                (Ok(Insert), 0..6),
                (Ok(Into), 7..11),
                (Ok(Ident("s".to_string())), 12..13),
                (Ok(Dot), 13..14),
                (Ok(Ident("products".to_string())), 14..22),
                (Ok(LParen), 23..24),
                (Ok(Ident("name".to_string())), 24..28),
                (Ok(Comma), 28..29),
                (Ok(Ident("price".to_string())), 30..35),
                (Ok(RParen), 35..36),
                (Ok(Values), 37..43),
                (Ok(LParen), 44..45),
                (Ok(String("Widget".to_string())), 45..53),
                (Ok(Comma), 53..54),
                (Ok(Float(19.99)), 55..60),
                (Ok(RParen), 60..61),
                (Ok(Semi), 61..62),
            ],
        );
    }

    #[test]
    fn test_create_table() {
        let lexer = TokenKind::lexer("CREATE TABLE d.t (id INT PRIMARY KEY, o INT REFERENCES u(id))");

        let tokens = lexer.spanned().map(|(t, _)| t).collect::<Vec<_>>();

        assert_eq!(
            tokens,
            vec![
                Ok(Create),
                Ok(Table),
                Ok(Ident("d".to_string())),
                Ok(Dot),
                Ok(Ident("t".to_string())),
                Ok(LParen),
                Ok(Ident("id".to_string())),
                Ok(Ident("INT".to_string())),
                Ok(Primary),
                Ok(Key),
                Ok(Comma),
                Ok(Ident("o".to_string())),
                Ok(Ident("INT".to_string())),
                Ok(References),
                Ok(Ident("u".to_string())),
                Ok(LParen),
                Ok(Ident("id".to_string())),
                Ok(RParen),
                Ok(RParen),
            ],
        );
    }

    #[test]
    fn test_keyword_prefix_is_an_identifier() {
        let tokens = TokenKind::lexer("tables_count index_name")
            .map(|t| t.unwrap())
            .collect::<Vec<_>>();

        assert_eq!(
            tokens,
            vec![
                Ident("tables_count".to_string()),
                Ident("index_name".to_string())
            ]
        );
    }

    #[test]
    fn test_escaped_quote() {
        let tokens = TokenKind::lexer("'it''s'").collect::<Vec<_>>();
        assert_eq!(tokens, vec![Ok(String("it's".to_string()))]);
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = TokenKind::lexer("SHOW DATABASES -- everything")
            .collect::<Vec<_>>();
        assert_eq!(tokens, vec![Ok(Show), Ok(Databases)]);
    }
}
