//! Parser for the script language
//!
//! Built from chumsky combinators over the `(Token, Range<usize>)` stream produced by the
//! lexer. Statements and expressions are mutually recursive through arrow functions with
//! block bodies, so the expression parser is handed the block parser it should use.
//!
//! Semicolons are optional: a statement ends where its grammar ends.

use chumsky::error::SimpleReason;
use chumsky::prelude::*;
use chumsky::{BoxedParser, Stream};
use std::ops::Range;
use std::sync::Arc;

use super::ast::{AssignOp, BinaryOp, DeclKind, Expr, FunctionBody, FunctionDef, Stmt, UnaryOp};
use super::lexer::tokenize_with_locations;
use super::tokens::{substitution_end, unescape, Token};

/// Type alias for parser error
type ParserError = Simple<Token>;

type Boxed<'a, O> = BoxedParser<'a, Token, O, ParserError>;

/// A parse failure and the byte range of source it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub span: Range<usize>,
}

impl SyntaxError {
    /// 1-based line and column of the error start within `source`.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        let offset = self.span.start.min(source.len());
        let before = &source[..floor_char_boundary(source, offset)];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rsplit('\n')
            .next()
            .map_or(0, |last| last.chars().count())
            + 1;
        (line, column)
    }
}

fn floor_char_boundary(source: &str, mut offset: usize) -> usize {
    while offset > 0 && !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[derive(Clone)]
enum Postfix {
    Member(String),
    Index(Expr),
    Call(Vec<Expr>),
}

#[derive(Clone)]
enum Tail {
    Assign(AssignOp, Expr),
    Step(f64),
}

fn ident() -> impl Parser<Token, String, Error = ParserError> + Clone {
    filter_map(|span, token| match token {
        Token::Ident(name) => Ok(name),
        other => Err(Simple::expected_input_found(span, Vec::new(), Some(other))),
    })
}

/// Names after `.` and object keys may be keywords.
fn property_name() -> impl Parser<Token, String, Error = ParserError> + Clone {
    filter_map(|span, token: Token| match token {
        Token::Ident(name) => Ok(name),
        other => match other.keyword() {
            Some(word) => Ok(word.to_string()),
            None => Err(Simple::expected_input_found(span, Vec::new(), Some(other))),
        },
    })
}

fn params() -> impl Parser<Token, Vec<String>, Error = ParserError> + Clone {
    ident()
        .separated_by(just(Token::Comma))
        .allow_trailing()
        .delimited_by(just(Token::LParen), just(Token::RParen))
}

/// Left-associative binary operator level.
fn binary_level<'a>(
    operand: Boxed<'a, Expr>,
    operator: impl Parser<Token, BinaryOp, Error = ParserError> + Clone + 'a,
) -> Boxed<'a, Expr> {
    operand
        .clone()
        .then(operator.then(operand).repeated())
        .foldl(|left, (op, right)| Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
        .boxed()
}

fn expression_parser<'a>(block: Boxed<'a, Vec<Stmt>>) -> Boxed<'a, Expr> {
    recursive(move |expr| {
        let value = filter_map(|span: Range<usize>, token| match token {
            Token::Number(number) => number
                .parse::<f64>()
                .map(Expr::Number)
                .map_err(|_| Simple::custom(span, format!("invalid number `{}`", number))),
            Token::Str(text) => Ok(Expr::Str(text)),
            Token::Template(raw) => {
                template_literal(&raw).map_err(|message| Simple::custom(span, message))
            }
            Token::True => Ok(Expr::Bool(true)),
            Token::False => Ok(Expr::Bool(false)),
            Token::Null => Ok(Expr::Null),
            Token::Undefined => Ok(Expr::Undefined),
            other => Err(Simple::expected_input_found(span, Vec::new(), Some(other))),
        });

        let arrow_params = params().or(ident().map(|param| vec![param]));
        let arrow = arrow_params
            .then_ignore(just(Token::Arrow))
            .then(
                block
                    .clone()
                    .map(FunctionBody::Block)
                    .or(expr.clone().map(FunctionBody::Expr)),
            )
            .map(|(params, body)| {
                Expr::Arrow(Arc::new(FunctionDef {
                    name: None,
                    params,
                    body,
                }))
            })
            .boxed();

        let key = property_name().or(filter_map(|span, token| match token {
            Token::Str(key) | Token::Number(key) => Ok(key),
            other => Err(Simple::expected_input_found(span, Vec::new(), Some(other))),
        }));
        let property = key
            .then(just(Token::Colon).ignore_then(expr.clone()).or_not())
            .map(|(key, value)| {
                let value = value.unwrap_or_else(|| Expr::Ident(key.clone()));
                (key, value)
            });

        let atom = choice((
            value,
            ident().map(Expr::Ident),
            expr.clone()
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .delimited_by(just(Token::LBracket), just(Token::RBracket))
                .map(Expr::Array),
            property
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .delimited_by(just(Token::LBrace), just(Token::RBrace))
                .map(Expr::Object),
            expr.clone()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        ))
        .boxed();

        let postfix = choice((
            just(Token::Dot)
                .ignore_then(property_name())
                .map(Postfix::Member),
            expr.clone()
                .delimited_by(just(Token::LBracket), just(Token::RBracket))
                .map(Postfix::Index),
            expr.clone()
                .separated_by(just(Token::Comma))
                .allow_trailing()
                .delimited_by(just(Token::LParen), just(Token::RParen))
                .map(Postfix::Call),
        ));

        let call = atom
            .then(postfix.repeated())
            .foldl(|object, postfix| match postfix {
                Postfix::Member(property) => Expr::Member {
                    object: Box::new(object),
                    property,
                },
                Postfix::Index(index) => Expr::Index {
                    object: Box::new(object),
                    index: Box::new(index),
                },
                Postfix::Call(args) => Expr::Call {
                    callee: Box::new(object),
                    args,
                },
            })
            .boxed();

        let unary = choice((
            just(Token::Bang).to(UnaryOp::Not),
            just(Token::Minus).to(UnaryOp::Neg),
            just(Token::Plus).to(UnaryOp::Plus),
            just(Token::Typeof).to(UnaryOp::Typeof),
        ))
        .repeated()
        .then(call)
        .foldr(|op, operand| Expr::Unary {
            op,
            operand: Box::new(operand),
        })
        .boxed();

        let product = binary_level(
            unary,
            choice((
                just(Token::Star).to(BinaryOp::Mul),
                just(Token::Slash).to(BinaryOp::Div),
                just(Token::Percent).to(BinaryOp::Rem),
            )),
        );
        let sum = binary_level(
            product,
            choice((
                just(Token::Plus).to(BinaryOp::Add),
                just(Token::Minus).to(BinaryOp::Sub),
            )),
        );
        let comparison = binary_level(
            sum,
            choice((
                just(Token::LtEq).to(BinaryOp::LtEq),
                just(Token::Lt).to(BinaryOp::Lt),
                just(Token::GtEq).to(BinaryOp::GtEq),
                just(Token::Gt).to(BinaryOp::Gt),
            )),
        );
        let equality = binary_level(
            comparison,
            choice((
                just(Token::EqEqEq).to(BinaryOp::StrictEq),
                just(Token::NotEqEq).to(BinaryOp::StrictNotEq),
                just(Token::EqEq).to(BinaryOp::LooseEq),
                just(Token::NotEq).to(BinaryOp::LooseNotEq),
            )),
        );
        let and = binary_level(equality, just(Token::AndAnd).to(BinaryOp::And));
        let or = binary_level(
            and,
            choice((
                just(Token::OrOr).to(BinaryOp::Or),
                just(Token::Nullish).to(BinaryOp::Nullish),
            )),
        );

        let conditional = or
            .then(
                just(Token::Question)
                    .ignore_then(expr.clone())
                    .then_ignore(just(Token::Colon))
                    .then(expr.clone())
                    .or_not(),
            )
            .map(|(test, branches)| match branches {
                Some((consequent, alternate)) => Expr::Conditional {
                    test: Box::new(test),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                },
                None => test,
            });

        arrow.or(conditional)
    })
    .boxed()
}

fn statement_parser() -> Boxed<'static, Stmt> {
    recursive(|stmt| {
        let block = stmt
            .clone()
            .repeated()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .boxed();
        let expr = expression_parser(block.clone());
        let body = block
            .clone()
            .or(stmt.clone().map(|stmt| vec![stmt]))
            .boxed();
        let paren_expr = expr
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .boxed();
        let semi = just(Token::Semicolon).or_not().ignored();

        let decl_kind = choice((
            just(Token::Let).to(DeclKind::Let),
            just(Token::Const).to(DeclKind::Const),
            just(Token::Var).to(DeclKind::Var),
        ));

        let declaration = decl_kind
            .clone()
            .then(ident())
            .then(just(Token::Assign).ignore_then(expr.clone()).or_not())
            .map(|((kind, name), init)| Stmt::Declare { kind, name, init })
            .boxed();

        let assign_op = choice((
            just(Token::Assign).to(AssignOp::Set),
            just(Token::PlusAssign).to(AssignOp::Add),
            just(Token::MinusAssign).to(AssignOp::Sub),
            just(Token::StarAssign).to(AssignOp::Mul),
            just(Token::SlashAssign).to(AssignOp::Div),
        ));
        let tail = assign_op
            .then(expr.clone())
            .map(|(op, value)| Tail::Assign(op, value))
            .or(just(Token::PlusPlus).to(Tail::Step(1.0)))
            .or(just(Token::MinusMinus).to(Tail::Step(-1.0)));

        // Expression statement, assignment or `x++`
        let simple = expr
            .clone()
            .then(tail.or_not())
            .try_map(|(target, tail), span| match tail {
                None => Ok(Stmt::Expr(target)),
                Some(_) if !target.is_assignable() => {
                    Err(Simple::custom(span, "invalid assignment target"))
                }
                Some(Tail::Assign(op, value)) => Ok(Stmt::Assign { target, op, value }),
                Some(Tail::Step(step)) => Ok(Stmt::Assign {
                    target,
                    op: AssignOp::Add,
                    value: Expr::Number(step),
                }),
            })
            .boxed();

        let if_stmt = just(Token::If)
            .ignore_then(paren_expr.clone())
            .then(body.clone())
            .then(just(Token::Else).ignore_then(body.clone()).or_not())
            .map(|((test, consequent), alternate)| Stmt::If {
                test,
                consequent,
                alternate,
            });

        let for_each = just(Token::For)
            .ignore_then(
                decl_kind
                    .or_not()
                    .then(ident())
                    .then(just(Token::Of).to(true).or(just(Token::In).to(false)))
                    .then(expr.clone())
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .then(body.clone())
            .map(|((((kind, binding), of), target), body)| {
                let kind = kind.unwrap_or(DeclKind::Let);
                if of {
                    Stmt::ForOf {
                        kind,
                        binding,
                        iterable: target,
                        body,
                    }
                } else {
                    Stmt::ForIn {
                        kind,
                        binding,
                        object: target,
                        body,
                    }
                }
            });

        let for_classic = just(Token::For)
            .ignore_then(
                declaration
                    .clone()
                    .or(simple.clone())
                    .or_not()
                    .then_ignore(just(Token::Semicolon))
                    .then(expr.clone().or_not())
                    .then_ignore(just(Token::Semicolon))
                    .then(simple.clone().or_not())
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .then(body.clone())
            .map(|(((init, test), update), body)| Stmt::For {
                init: init.map(Box::new),
                test,
                update: update.map(Box::new),
                body,
            });

        let while_stmt = just(Token::While)
            .ignore_then(paren_expr.clone())
            .then(body)
            .map(|(test, body)| Stmt::While { test, body });

        let function = just(Token::Function)
            .ignore_then(ident())
            .then(params())
            .then(block.clone())
            .map(|((name, params), body)| {
                Stmt::Function(Arc::new(FunctionDef {
                    name: Some(name),
                    params,
                    body: FunctionBody::Block(body),
                }))
            });

        let with_stmt = just(Token::With)
            .ignore_then(paren_expr)
            .then(block.clone())
            .map(|(object, body)| Stmt::With { object, body });

        let return_stmt = just(Token::Return)
            .ignore_then(expr.or_not())
            .map(Stmt::Return);

        choice((
            declaration.then_ignore(semi.clone()),
            function,
            if_stmt,
            for_each,
            for_classic,
            while_stmt,
            with_stmt,
            just(Token::Break)
                .then_ignore(semi.clone())
                .to(Stmt::Break),
            just(Token::Continue)
                .then_ignore(semi.clone())
                .to(Stmt::Continue),
            return_stmt.then_ignore(semi.clone()),
            block.map(Stmt::Block),
            just(Token::Semicolon).to(Stmt::Block(Vec::new())),
            simple.then_ignore(semi),
        ))
    })
    .boxed()
}

/// Split a template literal body into cooked text and parsed substitutions.
fn template_literal(raw: &str) -> Result<Expr, String> {
    let bytes = raw.as_bytes();
    let mut quasis = Vec::new();
    let mut exprs = Vec::new();
    let mut text_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                let end = substitution_end(raw, i + 2)
                    .ok_or("unterminated `${` in template literal")?;
                quasis.push(cook(&raw[text_start..i])?);
                let source = &raw[i + 2..end];
                let expr = parse_expression(source).map_err(|error| {
                    format!(
                        "in template substitution `{}`: {}",
                        source.trim(),
                        error.message
                    )
                })?;
                exprs.push(expr);
                i = end + 1;
                text_start = i;
            }
            _ => i += 1,
        }
    }
    quasis.push(cook(&raw[text_start.min(raw.len())..])?);
    Ok(Expr::Template { quasis, exprs })
}

fn cook(raw: &str) -> Result<String, String> {
    unescape(raw).ok_or_else(|| format!("invalid escape sequence in `{}`", raw))
}

fn describe(error: &ParserError) -> String {
    match error.reason() {
        SimpleReason::Custom(message) => return message.clone(),
        SimpleReason::Unclosed { delimiter, .. } => {
            return format!("unclosed delimiter {}", delimiter);
        }
        SimpleReason::Unexpected => {}
    }
    let found = error
        .found()
        .map(ToString::to_string)
        .unwrap_or_else(|| "end of input".to_string());
    let mut expected: Vec<String> = error
        .expected()
        .map(|token| match token {
            Some(token) => token.to_string(),
            None => "end of input".to_string(),
        })
        .collect();
    expected.sort();
    expected.dedup();
    if expected.is_empty() {
        format!("unexpected {}", found)
    } else {
        format!("unexpected {}, expected {}", found, expected.join(" or "))
    }
}

fn parse_tokens<O>(
    parser: impl Parser<Token, O, Error = ParserError>,
    source: &str,
) -> Result<O, SyntaxError> {
    let tokens = tokenize_with_locations(source).map_err(|error| SyntaxError {
        message: error.message,
        span: error.span,
    })?;
    let len = source.len();
    parser
        .parse(Stream::from_iter(len..len + 1, tokens.into_iter()))
        .map_err(|errors| match errors.first() {
            Some(error) => SyntaxError {
                message: describe(error),
                span: error.span(),
            },
            None => SyntaxError {
                message: "invalid syntax".to_string(),
                span: len..len,
            },
        })
}

/// Parse a sequence of statements, such as an assembled template program.
pub fn parse_program(source: &str) -> Result<Vec<Stmt>, SyntaxError> {
    parse_tokens(statement_parser().repeated().then_ignore(end()), source)
}

/// Parse a single expression.
pub fn parse_expression(source: &str) -> Result<Expr, SyntaxError> {
    let block = statement_parser()
        .repeated()
        .delimited_by(just(Token::LBrace), just(Token::RBrace))
        .boxed();
    parse_tokens(expression_parser(block).then_ignore(end()), source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<Expr> {
        Box::new(Expr::Ident(name.to_string()))
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse_expression("a + b * c").unwrap(),
            Expr::Binary {
                op: BinaryOp::Add,
                left: ident("a"),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: ident("b"),
                    right: ident("c"),
                }),
            }
        );
    }

    #[test]
    fn test_member_call_chain() {
        assert_eq!(
            parse_expression("items.join(', ')").unwrap(),
            Expr::Call {
                callee: Box::new(Expr::Member {
                    object: ident("items"),
                    property: "join".to_string(),
                }),
                args: vec![Expr::Str(", ".to_string())],
            }
        );
    }

    #[test]
    fn test_template_literal_parts() {
        assert_eq!(
            parse_expression("`Hello, ${name}!\\n`").unwrap(),
            Expr::Template {
                quasis: vec!["Hello, ".to_string(), "!\n".to_string()],
                exprs: vec![Expr::Ident("name".to_string())],
            }
        );
    }

    #[test]
    fn test_escaped_placeholder_is_text() {
        assert_eq!(
            parse_expression("`\\${x} \\` \\\\`").unwrap(),
            Expr::Template {
                quasis: vec!["${x} ` \\".to_string()],
                exprs: vec![],
            }
        );
    }

    #[test]
    fn test_arrow_functions() {
        let expr = parse_expression("items.map(x => x * 2)").unwrap();
        let Expr::Call { args, .. } = expr else {
            panic!("expected a call");
        };
        assert!(matches!(&args[0], Expr::Arrow(def) if def.params == vec!["x".to_string()]));

        let expr = parse_expression("(a, b) => { return a + b; }").unwrap();
        assert!(matches!(expr, Expr::Arrow(def) if matches!(def.body, FunctionBody::Block(_))));
    }

    #[test]
    fn test_parenthesized_expression_is_not_an_arrow() {
        assert_eq!(
            parse_expression("(a)").unwrap(),
            Expr::Ident("a".to_string())
        );
    }

    #[test]
    fn test_conditional_and_logical() {
        let expr = parse_expression("a && b || c ? 'x' : 'y'").unwrap();
        assert!(matches!(expr, Expr::Conditional { .. }));
    }

    #[test]
    fn test_object_literal() {
        assert_eq!(
            parse_expression("{a: 1, 'b c': 2, d}").unwrap(),
            Expr::Object(vec![
                ("a".to_string(), Expr::Number(1.0)),
                ("b c".to_string(), Expr::Number(2.0)),
                ("d".to_string(), Expr::Ident("d".to_string())),
            ])
        );
    }

    #[test]
    fn test_program_with_blocks() {
        let program = parse_program(
            "const __ = [];\nwith (locals) {\n    for (const item of items) {\n    __append(`${item}`);\n    }\n}\nreturn __.join('\\n');",
        )
        .unwrap();
        assert_eq!(program.len(), 3);
        assert!(matches!(program[1], Stmt::With { .. }));
        assert!(matches!(program[2], Stmt::Return(Some(_))));
    }

    #[test]
    fn test_optional_semicolons() {
        let program = parse_program("let a = 1\na += 2\na++\nif (a > 2) go()\nelse stop()").unwrap();
        assert_eq!(program.len(), 4);
        assert_eq!(
            program[2],
            Stmt::Assign {
                target: Expr::Ident("a".to_string()),
                op: AssignOp::Add,
                value: Expr::Number(1.0),
            }
        );
    }

    #[test]
    fn test_else_if_chain() {
        let program = parse_program("if (a) { x() } else if (b) { y() } else { z() }").unwrap();
        let Stmt::If { alternate, .. } = &program[0] else {
            panic!("expected if");
        };
        let alternate = alternate.as_ref().unwrap();
        assert!(matches!(alternate[0], Stmt::If { alternate: Some(_), .. }));
    }

    #[test]
    fn test_loops() {
        let program = parse_program(
            "for (let i = 0; i < 3; i++) {}\nfor (const k in obj) {}\nwhile (x) { break; }",
        )
        .unwrap();
        assert!(matches!(program[0], Stmt::For { .. }));
        assert!(matches!(program[1], Stmt::ForIn { .. }));
        assert!(matches!(program[2], Stmt::While { .. }));
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(parse_program("1 = 2").is_err());
        assert!(parse_program("f() += 1").is_err());
    }

    #[test]
    fn test_error_position() {
        let source = "let a = 1;\nlet b = (2;";
        let error = parse_program(source).unwrap_err();
        assert_eq!(error.line_col(source).0, 2);
    }

    #[test]
    fn test_broken_template_substitution() {
        assert!(parse_expression("`${a +}`").is_err());
    }

    #[test]
    fn test_unterminated_template_substitution() {
        let source = "x(`${a`)";
        assert!(parse_program(source).is_err());
    }
}
