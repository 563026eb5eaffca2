//! Lowering of `with` blocks into explicit context binding
//!
//! Each `with (object) { body }` becomes a block that binds `object` once to a hidden constant
//! and runs `body`. Bare identifiers in the body that no declaration inside the block shadows
//! are rewritten to [`Expr::Scoped`] references, which read the bound object's field when it
//! exists and fall back to the enclosing resolution otherwise. Nested blocks chain fallbacks.

use std::collections::HashSet;
use std::sync::Arc;

use super::ast::{DeclKind, Expr, FunctionBody, FunctionDef, Stmt};

/// Prefix of the hidden bindings; `#` cannot start a script identifier.
pub const WITH_BINDING_PREFIX: &str = "#with";

#[derive(Default)]
struct Frame {
    names: HashSet<String>,
    with_binding: Option<String>,
}

/// Rewrites a parsed program so it contains no `with` statements.
pub struct Lowering {
    frames: Vec<Frame>,
    next_binding: usize,
}

impl Lowering {
    /// Start with `params` declared in the outermost frame.
    pub fn new<'p>(params: impl IntoIterator<Item = &'p str>) -> Self {
        let names = params.into_iter().map(str::to_string).collect();
        Lowering {
            frames: vec![Frame {
                names,
                with_binding: None,
            }],
            next_binding: 0,
        }
    }

    pub fn lower_program(&mut self, program: Vec<Stmt>) -> Vec<Stmt> {
        self.lower_block(program)
    }

    fn lower_block(&mut self, statements: Vec<Stmt>) -> Vec<Stmt> {
        let mut frame = Frame::default();
        for stmt in &statements {
            match stmt {
                Stmt::Declare { name, .. } => {
                    frame.names.insert(name.clone());
                }
                Stmt::Function(def) => {
                    if let Some(name) = &def.name {
                        frame.names.insert(name.clone());
                    }
                }
                _ => {}
            }
        }
        self.frames.push(frame);
        let lowered = statements
            .into_iter()
            .map(|stmt| self.lower_stmt(stmt))
            .collect();
        self.frames.pop();
        lowered
    }

    /// Lower a loop body with `binding` declared around it.
    fn lower_with_binding(&mut self, binding: &str, body: Vec<Stmt>) -> Vec<Stmt> {
        self.frames.push(Frame {
            names: HashSet::from([binding.to_string()]),
            with_binding: None,
        });
        let body = self.lower_block(body);
        self.frames.pop();
        body
    }

    fn lower_stmt(&mut self, stmt: Stmt) -> Stmt {
        match stmt {
            Stmt::Declare { kind, name, init } => Stmt::Declare {
                kind,
                name,
                init: init.map(|init| self.lower_expr(init)),
            },
            Stmt::Assign { target, op, value } => Stmt::Assign {
                target: self.lower_expr(target),
                op,
                value: self.lower_expr(value),
            },
            Stmt::Expr(expr) => Stmt::Expr(self.lower_expr(expr)),
            Stmt::If {
                test,
                consequent,
                alternate,
            } => Stmt::If {
                test: self.lower_expr(test),
                consequent: self.lower_block(consequent),
                alternate: alternate.map(|alternate| self.lower_block(alternate)),
            },
            Stmt::ForOf {
                kind,
                binding,
                iterable,
                body,
            } => {
                let iterable = self.lower_expr(iterable);
                let body = self.lower_with_binding(&binding, body);
                Stmt::ForOf {
                    kind,
                    binding,
                    iterable,
                    body,
                }
            }
            Stmt::ForIn {
                kind,
                binding,
                object,
                body,
            } => {
                let object = self.lower_expr(object);
                let body = self.lower_with_binding(&binding, body);
                Stmt::ForIn {
                    kind,
                    binding,
                    object,
                    body,
                }
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let mut frame = Frame::default();
                if let Some(Stmt::Declare { name, .. }) = init.as_deref() {
                    frame.names.insert(name.clone());
                }
                self.frames.push(frame);
                let lowered = Stmt::For {
                    init: init.map(|init| Box::new(self.lower_stmt(*init))),
                    test: test.map(|test| self.lower_expr(test)),
                    update: update.map(|update| Box::new(self.lower_stmt(*update))),
                    body: self.lower_block(body),
                };
                self.frames.pop();
                lowered
            }
            Stmt::While { test, body } => Stmt::While {
                test: self.lower_expr(test),
                body: self.lower_block(body),
            },
            Stmt::Return(value) => Stmt::Return(value.map(|value| self.lower_expr(value))),
            Stmt::Function(def) => Stmt::Function(self.lower_function(&def)),
            Stmt::With { object, body } => {
                let object = self.lower_expr(object);
                let binding = format!("{}{}", WITH_BINDING_PREFIX, self.next_binding);
                self.next_binding += 1;

                self.frames.push(Frame {
                    names: HashSet::new(),
                    with_binding: Some(binding.clone()),
                });
                let body = self.lower_block(body);
                self.frames.pop();

                let mut statements = Vec::with_capacity(body.len() + 1);
                statements.push(Stmt::Declare {
                    kind: DeclKind::Const,
                    name: binding,
                    init: Some(object),
                });
                statements.extend(body);
                Stmt::Block(statements)
            }
            Stmt::Block(statements) => Stmt::Block(self.lower_block(statements)),
            stmt @ (Stmt::Break | Stmt::Continue) => stmt,
        }
    }

    fn lower_function(&mut self, def: &FunctionDef) -> Arc<FunctionDef> {
        self.frames.push(Frame {
            names: def.params.iter().cloned().collect(),
            with_binding: None,
        });
        let body = match &def.body {
            FunctionBody::Block(statements) => {
                FunctionBody::Block(self.lower_block(statements.clone()))
            }
            FunctionBody::Expr(expr) => FunctionBody::Expr(self.lower_expr(expr.clone())),
        };
        self.frames.pop();
        Arc::new(FunctionDef {
            name: def.name.clone(),
            params: def.params.clone(),
            body,
        })
    }

    fn lower_expr(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Ident(name) => self.resolve(name, self.frames.len()),
            Expr::Template { quasis, exprs } => Expr::Template {
                quasis,
                exprs: self.lower_exprs(exprs),
            },
            Expr::Array(items) => Expr::Array(self.lower_exprs(items)),
            Expr::Object(entries) => Expr::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, self.lower_expr(value)))
                    .collect(),
            ),
            Expr::Member { object, property } => Expr::Member {
                object: Box::new(self.lower_expr(*object)),
                property,
            },
            Expr::Index { object, index } => Expr::Index {
                object: Box::new(self.lower_expr(*object)),
                index: Box::new(self.lower_expr(*index)),
            },
            Expr::Call { callee, args } => Expr::Call {
                callee: Box::new(self.lower_expr(*callee)),
                args: self.lower_exprs(args),
            },
            Expr::Arrow(def) => Expr::Arrow(self.lower_function(&def)),
            Expr::Unary { op, operand } => Expr::Unary {
                op,
                operand: Box::new(self.lower_expr(*operand)),
            },
            Expr::Binary { op, left, right } => Expr::Binary {
                op,
                left: Box::new(self.lower_expr(*left)),
                right: Box::new(self.lower_expr(*right)),
            },
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => Expr::Conditional {
                test: Box::new(self.lower_expr(*test)),
                consequent: Box::new(self.lower_expr(*consequent)),
                alternate: Box::new(self.lower_expr(*alternate)),
            },
            literal => literal,
        }
    }

    fn lower_exprs(&mut self, exprs: Vec<Expr>) -> Vec<Expr> {
        exprs.into_iter().map(|expr| self.lower_expr(expr)).collect()
    }

    /// Resolve `name` against the frames below `depth`, innermost first.
    fn resolve(&self, name: String, depth: usize) -> Expr {
        for index in (0..depth).rev() {
            let frame = &self.frames[index];
            if frame.names.contains(&name) {
                break;
            }
            if let Some(binding) = &frame.with_binding {
                let fallback = self.resolve(name.clone(), index);
                return Expr::Scoped {
                    object: binding.clone(),
                    name,
                    fallback: Box::new(fallback),
                };
            }
        }
        Expr::Ident(name)
    }
}

/// Lower all `with` blocks of `program`, with `params` as the enclosing function parameters.
pub fn lower(program: Vec<Stmt>, params: &[&str]) -> Vec<Stmt> {
    Lowering::new(params.iter().copied()).lower_program(program)
}
