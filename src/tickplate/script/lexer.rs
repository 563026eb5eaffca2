//! Tokenization of script source
//!
//! Raw tokenization is handled entirely by logos; this module pairs tokens with their byte
//! ranges and turns unrecognized input into a positioned error.

use logos::Logos;
use std::ops::Range;

use super::tokens::Token;

/// Input logos could not turn into a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub span: Range<usize>,
}

/// Tokenize source code with location information.
pub fn tokenize_with_locations(source: &str) -> Result<Vec<(Token, Range<usize>)>, LexError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => {
                let span = lexer.span();
                let slice = lexer.slice();
                let message = if slice.starts_with("/*") {
                    "unterminated block comment".to_string()
                } else if slice.starts_with('`') {
                    "unterminated template literal".to_string()
                } else if slice.starts_with('"') || slice.starts_with('\'') {
                    "unterminated or invalid string literal".to_string()
                } else {
                    format!("unrecognized input `{}`", slice)
                };
                return Err(LexError { message, span });
            }
        }
    }

    Ok(tokens)
}
