//! The script language evaluated by compiled templates
//!
//! Code lines and inline expressions are written in a small JavaScript-flavoured language.
//! It is lexed with logos ([`tokens`], [`lexer`]), parsed with chumsky ([`parser`]) into the
//! [`ast`], lowered so `with` blocks resolve names explicitly ([`scoping`]), and evaluated by a
//! tree-walking [`interpreter`] over [`value::Value`]s.

pub mod ast;
pub mod builtins;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod scoping;
pub mod tokens;
pub mod value;

pub use parser::{parse_expression, parse_program};
pub use tokens::is_identifier;
