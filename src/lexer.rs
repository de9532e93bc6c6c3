//! Lexer for matrix scripts using logos
//!
//! Supports tokens like:
//! - Identifiers and keywords: A, x_1, function, end
//! - Numbers: 1, 2.5, 1e-3, imaginary 2i
//! - Strings: 'it''s', "text"
//! - Operators: + - * / \ ^ .* ./ .\ .^ ' .' == ~= < <= > >= & | && || ~
//! - Punctuation: ( ) [ ] { } , ; : = and newlines
//!
//! A single quote is a transpose when it directly follows a value and a
//! string delimiter otherwise, which logos alone cannot decide; [`tokenize`]
//! resolves it from the previous token.

use std::fmt;
use std::ops::Range;

use logos::Logos;

use crate::error::{CompileError, CompileResult};

/// Token types for the matrix script language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"%[^\n]*")]
#[logos(skip r"\.\.\.[^\n]*\n?")]
pub enum Token {
    // Literals
    #[regex(r"[0-9]+", |lex| lex.slice().to_string())]
    Int(String),

    #[regex(r"([0-9]+\.[0-9]*|\.[0-9]+)([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().to_string())]
    Float(String),

    #[regex(r"([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?[ij]", |lex| lex.slice().to_string())]
    Imag(String),

    /// Contents of a string literal, quotes removed
    #[regex(r#""([^"\n]|"")*""#, |lex| unquote(lex.slice(), '"'))]
    Str(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    // Keywords
    #[token("function")]
    Function,

    #[token("end")]
    End,

    #[token("return")]
    Return,

    #[token("break")]
    Break,

    // Operators
    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,

    #[token("\\")]
    Backslash,

    #[token("^")]
    Caret,

    #[token(".*")]
    DotStar,

    #[token("./")]
    DotSlash,

    #[token(".\\")]
    DotBackslash,

    #[token(".^")]
    DotCaret,

    /// Conjugate transpose, or the opening quote of a string
    #[token("'")]
    Apostrophe,

    #[token(".'")]
    DotApostrophe,

    #[token("==")]
    EqEq,

    #[token("~=")]
    #[token("!=")]
    NotEq,

    #[token("<")]
    Less,

    #[token("<=")]
    LessEq,

    #[token(">")]
    Greater,

    #[token(">=")]
    GreaterEq,

    #[token("&")]
    Amp,

    #[token("&&")]
    AmpAmp,

    #[token("|")]
    Pipe,

    #[token("||")]
    PipePipe,

    #[token("~")]
    #[token("!")]
    Tilde,

    #[token("=")]
    Equals,

    // Punctuation
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

    #[token(";")]
    Semicolon,

    #[token(":")]
    Colon,

    #[token("\n")]
    Newline,
}

fn unquote(slice: &str, quote: char) -> String {
    let doubled: String = [quote, quote].iter().collect();
    slice[1..slice.len() - 1].replace(&doubled, &quote.to_string())
}

impl Token {
    /// A quote right after this token is a transpose
    pub fn ends_value(&self) -> bool {
        matches!(
            self,
            Token::Int(_)
                | Token::Float(_)
                | Token::Imag(_)
                | Token::Str(_)
                | Token::Ident(_)
                | Token::End
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
                | Token::Apostrophe
                | Token::DotApostrophe
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Int(s) | Token::Float(s) | Token::Imag(s) | Token::Ident(s) => write!(f, "{}", s),
            Token::Str(s) => write!(f, "'{}'", s),
            Token::Function => write!(f, "function"),
            Token::End => write!(f, "end"),
            Token::Return => write!(f, "return"),
            Token::Break => write!(f, "break"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Backslash => write!(f, "\\"),
            Token::Caret => write!(f, "^"),
            Token::DotStar => write!(f, ".*"),
            Token::DotSlash => write!(f, "./"),
            Token::DotBackslash => write!(f, ".\\"),
            Token::DotCaret => write!(f, ".^"),
            Token::Apostrophe => write!(f, "'"),
            Token::DotApostrophe => write!(f, ".'"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "~="),
            Token::Less => write!(f, "<"),
            Token::LessEq => write!(f, "<="),
            Token::Greater => write!(f, ">"),
            Token::GreaterEq => write!(f, ">="),
            Token::Amp => write!(f, "&"),
            Token::AmpAmp => write!(f, "&&"),
            Token::Pipe => write!(f, "|"),
            Token::PipePipe => write!(f, "||"),
            Token::Tilde => write!(f, "~"),
            Token::Equals => write!(f, "="),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::Colon => write!(f, ":"),
            Token::Newline => write!(f, "newline"),
        }
    }
}

/// A token with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub span: Range<usize>,
    /// Whitespace or a comment separates this token from the previous one
    pub spaced: bool,
}

/// Length of a single-quoted string body up to and including its closing
/// quote, with `''` standing for one quote
fn quoted_length(rest: &str) -> Option<(usize, String)> {
    let mut text = String::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        match c {
            '\'' if chars.peek().map(|&(_, next)| next) == Some('\'') => {
                chars.next();
                text.push('\'');
            }
            '\'' => return Some((offset + 1, text)),
            '\n' => return None,
            other => text.push(other),
        }
    }
    None
}

/// Tokenize a whole source text
pub fn tokenize(source: &str) -> CompileResult<Vec<Spanned>> {
    let mut lexer = Token::lexer(source);
    let mut tokens: Vec<Spanned> = Vec::new();
    let mut last_end = 0;

    while let Some(result) = lexer.next() {
        let start = lexer.span().start;
        let token = match result {
            Ok(Token::Apostrophe) => {
                let transpose = tokens
                    .last()
                    .map_or(false, |prev| prev.token.ends_value() && prev.span.end == start);
                if transpose {
                    Token::Apostrophe
                } else {
                    let (length, text) =
                        quoted_length(lexer.remainder()).ok_or_else(|| CompileError::LexerError {
                            position: start,
                            message: "unterminated string".to_string(),
                        })?;
                    lexer.bump(length);
                    Token::Str(text)
                }
            }
            Ok(token) => token,
            Err(()) => {
                return Err(CompileError::LexerError {
                    position: start,
                    message: format!("unexpected input '{}'", lexer.slice()),
                })
            }
        };
        let end = lexer.span().end;
        tokens.push(Spanned {
            token,
            span: start..end,
            spaced: start > last_end,
        });
        last_end = end;
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn test_assignment() {
        assert_eq!(
            tokens("C = A * B + 2.5"),
            vec![
                Token::Ident("C".to_string()),
                Token::Equals,
                Token::Ident("A".to_string()),
                Token::Star,
                Token::Ident("B".to_string()),
                Token::Plus,
                Token::Float("2.5".to_string()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("3 1e-3 .5 2i 1.5j"),
            vec![
                Token::Int("3".to_string()),
                Token::Float("1e-3".to_string()),
                Token::Float(".5".to_string()),
                Token::Imag("2i".to_string()),
                Token::Imag("1.5j".to_string()),
            ]
        );
    }

    #[test]
    fn test_elementwise_operators() {
        assert_eq!(
            tokens("a.*b./c.\\d.^e"),
            vec![
                Token::Ident("a".to_string()),
                Token::DotStar,
                Token::Ident("b".to_string()),
                Token::DotSlash,
                Token::Ident("c".to_string()),
                Token::DotBackslash,
                Token::Ident("d".to_string()),
                Token::DotCaret,
                Token::Ident("e".to_string()),
            ]
        );
    }

    #[test]
    fn test_transpose_versus_string() {
        assert_eq!(
            tokens("x = a' + 'it''s'"),
            vec![
                Token::Ident("x".to_string()),
                Token::Equals,
                Token::Ident("a".to_string()),
                Token::Apostrophe,
                Token::Plus,
                Token::Str("it's".to_string()),
            ]
        );
        assert_eq!(
            tokens("b = A(1)'.'"),
            vec![
                Token::Ident("b".to_string()),
                Token::Equals,
                Token::Ident("A".to_string()),
                Token::LParen,
                Token::Int("1".to_string()),
                Token::RParen,
                Token::Apostrophe,
                Token::DotApostrophe,
            ]
        );
    }

    #[test]
    fn test_not_equal_spellings() {
        assert_eq!(tokens("a ~= b"), tokens("a != b"));
        assert_eq!(tokens("~a"), tokens("!a"));
    }

    #[test]
    fn test_comments_and_continuation() {
        assert_eq!(
            tokens("x = 1 + ... more\n 2 % note\ny"),
            vec![
                Token::Ident("x".to_string()),
                Token::Equals,
                Token::Int("1".to_string()),
                Token::Plus,
                Token::Int("2".to_string()),
                Token::Newline,
                Token::Ident("y".to_string()),
            ]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            tokens("function endx end"),
            vec![Token::Function, Token::Ident("endx".to_string()), Token::End]
        );
    }

    #[test]
    fn test_spacing_flags() {
        let spanned = tokenize("[a -b]").unwrap();
        let flags: Vec<bool> = spanned.iter().map(|t| t.spaced).collect();
        assert_eq!(flags, vec![false, false, true, false, false]);
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            tokenize("s = 'abc"),
            Err(CompileError::LexerError { position: 4, .. })
        ));
    }
}
