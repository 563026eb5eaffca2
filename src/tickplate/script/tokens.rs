//! Token definitions for the script language
//!
//! Tokens are produced by the logos derive macro. String literals are unescaped while lexing;
//! template literals keep their raw body, which the parser splits into text and `${...}`
//! substitutions.

use logos::{FilterResult, Lexer, Logos};
use std::fmt;

/// All possible tokens of the script language
#[derive(Logos, Debug, Clone, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    // Keywords
    #[token("let")]
    Let,
    #[token("const")]
    Const,
    #[token("var")]
    Var,
    #[token("function")]
    Function,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("of")]
    Of,
    #[token("in")]
    In,
    #[token("while")]
    While,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("with")]
    With,
    #[token("typeof")]
    Typeof,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    #[token("undefined")]
    Undefined,

    // Literals
    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    Number(String),
    #[regex(r#""([^"\\\n]|\\(.|\n))*""#, unquote)]
    #[regex(r#"'([^'\\\n]|\\(.|\n))*'"#, unquote)]
    Str(String),
    #[token("`", template_body)]
    Template(String),
    /// Skipped by its callback; only an unterminated comment surfaces, as an error.
    #[token("/*", block_comment)]
    BlockComment,

    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("?")]
    Question,
    #[token("=>")]
    Arrow,

    // Operators
    #[token("=")]
    Assign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("===")]
    EqEqEq,
    #[token("!==")]
    NotEqEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("??")]
    Nullish,
}

impl Token {
    /// Keyword spelling, for keywords allowed as property names (`x.default`, `{ if: 1 }`).
    pub fn keyword(&self) -> Option<&'static str> {
        let word = match self {
            Token::Let => "let",
            Token::Const => "const",
            Token::Var => "var",
            Token::Function => "function",
            Token::Return => "return",
            Token::If => "if",
            Token::Else => "else",
            Token::For => "for",
            Token::Of => "of",
            Token::In => "in",
            Token::While => "while",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::With => "with",
            Token::Typeof => "typeof",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::Undefined => "undefined",
            _ => return None,
        };
        Some(word)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(word) = self.keyword() {
            return write!(f, "`{}`", word);
        }
        let symbol = match self {
            Token::Ident(name) => return write!(f, "identifier `{}`", name),
            Token::Number(number) => return write!(f, "number `{}`", number),
            Token::Str(_) => "string",
            Token::Template(_) => "template literal",
            Token::BlockComment => "comment",
            Token::LParen => "`(`",
            Token::RParen => "`)`",
            Token::LBrace => "`{`",
            Token::RBrace => "`}`",
            Token::LBracket => "`[`",
            Token::RBracket => "`]`",
            Token::Comma => "`,`",
            Token::Semicolon => "`;`",
            Token::Colon => "`:`",
            Token::Dot => "`.`",
            Token::Question => "`?`",
            Token::Arrow => "`=>`",
            Token::Assign => "`=`",
            Token::PlusAssign => "`+=`",
            Token::MinusAssign => "`-=`",
            Token::StarAssign => "`*=`",
            Token::SlashAssign => "`/=`",
            Token::PlusPlus => "`++`",
            Token::MinusMinus => "`--`",
            Token::Plus => "`+`",
            Token::Minus => "`-`",
            Token::Star => "`*`",
            Token::Slash => "`/`",
            Token::Percent => "`%`",
            Token::Bang => "`!`",
            Token::EqEq => "`==`",
            Token::NotEq => "`!=`",
            Token::EqEqEq => "`===`",
            Token::NotEqEq => "`!==`",
            Token::Lt => "`<`",
            Token::LtEq => "`<=`",
            Token::Gt => "`>`",
            Token::GtEq => "`>=`",
            Token::AndAnd => "`&&`",
            Token::OrOr => "`||`",
            Token::Nullish => "`??`",
            _ => "keyword",
        };
        f.write_str(symbol)
    }
}

/// Whether `name` can be used as a variable name.
pub fn is_identifier(name: &str) -> bool {
    let mut lexer = Token::lexer(name);
    matches!(lexer.next(), Some(Ok(Token::Ident(_)))) && lexer.next().is_none()
}

/// Strip the quotes of a string literal and resolve its escapes.
fn unquote(lex: &mut Lexer<Token>) -> Option<String> {
    let slice = lex.slice();
    unescape(&slice[1..slice.len() - 1])
}

/// Consume a template literal after its opening backtick and return the raw body.
fn template_body(lex: &mut Lexer<Token>) -> Option<String> {
    let end = template_end(lex.remainder())?;
    let body = lex.remainder()[..end].to_string();
    lex.bump(end + 1);
    Some(body)
}

/// Skip a `/* ... */` comment after its opening delimiter.
fn block_comment(lex: &mut Lexer<Token>) -> FilterResult<(), ()> {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            FilterResult::Skip
        }
        None => {
            lex.bump(lex.remainder().len());
            FilterResult::Error(())
        }
    }
}

/// Byte offset of the backtick closing a template literal whose body starts `source`.
pub(crate) fn template_end(source: &str) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return Some(i),
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                i = substitution_end(source, i + 2)? + 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// Byte offset of the `}` closing a substitution whose expression starts at `start`.
pub(crate) fn substitution_end(source: &str, start: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' if depth == 0 => return Some(i),
            b'}' => depth -= 1,
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'`' => {
                i += 1 + template_end(&source[i + 1..])?;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Resolve backslash escapes in string and template literal text.
pub(crate) fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            '\n' => {}
            'u' => {
                let code = if chars.peek() == Some(&'{') {
                    chars.next();
                    let hex: String = chars.by_ref().take_while(|c| *c != '}').collect();
                    u32::from_str_radix(&hex, 16).ok()?
                } else {
                    let hex: String = chars.by_ref().take(4).collect();
                    if hex.len() != 4 {
                        return None;
                    }
                    u32::from_str_radix(&hex, 16).ok()?
                };
                out.push(char::from_u32(code)?);
            }
            other => out.push(other),
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Token::lexer(source).map(|token| token.unwrap()).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            lex("let letter of offset"),
            vec![
                Token::Let,
                Token::Ident("letter".to_string()),
                Token::Of,
                Token::Ident("offset".to_string()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            lex("1 2.5 1e3 .5"),
            vec![
                Token::Number("1".to_string()),
                Token::Number("2.5".to_string()),
                Token::Number("1e3".to_string()),
                Token::Number(".5".to_string()),
            ]
        );
    }

    #[test]
    fn test_strings_are_unescaped() {
        assert_eq!(
            lex(r#"'a\nb' "it's" 'A\u{1F600}'"#),
            vec![
                Token::Str("a\nb".to_string()),
                Token::Str("it's".to_string()),
                Token::Str("A\u{1F600}".to_string()),
            ]
        );
    }

    #[test]
    fn test_longest_operator_wins() {
        assert_eq!(
            lex("a === b !== c => d ++ ??"),
            vec![
                Token::Ident("a".to_string()),
                Token::EqEqEq,
                Token::Ident("b".to_string()),
                Token::NotEqEq,
                Token::Ident("c".to_string()),
                Token::Arrow,
                Token::Ident("d".to_string()),
                Token::PlusPlus,
                Token::Nullish,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            lex("a // trailing\n/* block\n comment */ b"),
            vec![Token::Ident("a".to_string()), Token::Ident("b".to_string())]
        );
    }

    #[test]
    fn test_block_comments() {
        assert_eq!(
            lex("a /* x */ b /**/ c /* ** / * */ / d"),
            vec![
                Token::Ident("a".to_string()),
                Token::Ident("b".to_string()),
                Token::Ident("c".to_string()),
                Token::Slash,
                Token::Ident("d".to_string()),
            ]
        );
    }

    #[test]
    fn test_unterminated_block_comment_is_an_error() {
        let mut lexer = Token::lexer("a /* never closed");
        assert_eq!(lexer.next(), Some(Ok(Token::Ident("a".to_string()))));
        assert_eq!(lexer.next(), Some(Err(())));
        assert_eq!(lexer.slice(), "/* never closed");
    }

    #[test]
    fn test_template_literal_keeps_raw_body() {
        assert_eq!(
            lex("`Hello, ${name}!\nline \\` two` ;"),
            vec![
                Token::Template("Hello, ${name}!\nline \\` two".to_string()),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_template_literal_with_nested_braces() {
        assert_eq!(
            lex("`${ {a: '}'}.a } ${`inner ${x}`}`"),
            vec![Token::Template(
                "${ {a: '}'}.a } ${`inner ${x}`}".to_string()
            )]
        );
    }

    #[test]
    fn test_unterminated_template_is_an_error() {
        let mut lexer = Token::lexer("`never closed");
        assert_eq!(lexer.next(), Some(Err(())));
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("locals"));
        assert!(is_identifier("$ctx_1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("with"));
        assert!(!is_identifier("a b"));
        assert!(!is_identifier(""));
    }
}
