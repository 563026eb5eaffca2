//! Tree-walking evaluator for lowered script programs
//!
//! Every render owns a fresh [`Interpreter`]: its global scope holds the built-ins, and
//! nothing evaluated in one render is visible to another.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use super::ast::{BinaryOp, DeclKind, Expr, FunctionBody, FunctionDef, Stmt, UnaryOp};
use super::builtins;
use super::value::{Function, Value};
use crate::tickplate::error::RenderError;

/// Nested calls allowed before evaluation is aborted.
pub const MAX_CALL_DEPTH: usize = 64;

/// Tracked scopes kept before dead entries are pruned.
const SCOPE_PRUNE_MIN: usize = 64;

struct Binding {
    value: Value,
    constant: bool,
}

/// A lexical scope: its own bindings plus a link to the enclosing scope.
#[derive(Default)]
pub struct Scope {
    vars: RefCell<HashMap<String, Binding>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    /// Drop every binding; closures stored here stop keeping their scopes alive.
    fn clear(&self) {
        let vars = std::mem::take(&mut *self.vars.borrow_mut());
        drop(vars);
    }

    pub fn child(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope {
            vars: RefCell::default(),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub fn declare(&self, name: impl Into<String>, value: Value, constant: bool) {
        self.vars
            .borrow_mut()
            .insert(name.into(), Binding { value, constant });
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.vars.borrow().get(name) {
            return Some(binding.value.clone());
        }
        self.parent.as_ref()?.lookup(name)
    }

    /// Update the nearest binding of `name`; `Ok(false)` when no scope declares it.
    fn assign(&self, name: &str, value: Value) -> Result<bool, RenderError> {
        if let Some(binding) = self.vars.borrow_mut().get_mut(name) {
            if binding.constant {
                return Err(RenderError::ConstAssignment(name.to_string()));
            }
            binding.value = value;
            return Ok(true);
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Ok(false),
        }
    }
}

/// Control flow signal produced by executing a statement.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub struct Interpreter {
    globals: Rc<Scope>,
    depth: usize,
    // Closures capture the scope that binds them, so scopes form cycles. Every scope entered
    // during a run is tracked here and cleared once the run is over.
    scopes: Vec<Weak<Scope>>,
    prune_at: usize,
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.release_scopes();
        self.globals.clear();
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Rc::new(Scope::default());
        builtins::install_globals(&globals);
        Interpreter {
            globals,
            depth: 0,
            scopes: Vec::new(),
            prune_at: SCOPE_PRUNE_MIN,
        }
    }

    pub fn globals(&self) -> &Rc<Scope> {
        &self.globals
    }

    /// Run `body` as the body of a function called with `params` bound.
    ///
    /// A program that finishes without `return` yields `undefined`.
    pub fn run(&mut self, body: &[Stmt], params: &[(&str, Value)]) -> Result<Value, RenderError> {
        let globals = Rc::clone(&self.globals);
        let scope = self.enter(&globals);
        for (name, value) in params {
            scope.declare(*name, value.clone(), false);
        }
        let result = self.function_body(body, &scope);
        drop(scope);
        self.release_scopes();
        result
    }

    /// Create a child scope of `parent` and track it for release.
    fn enter(&mut self, parent: &Rc<Scope>) -> Rc<Scope> {
        let scope = Scope::child(parent);
        if self.scopes.len() >= self.prune_at {
            self.scopes.retain(|scope| scope.strong_count() > 0);
            self.prune_at = (self.scopes.len() * 2).max(SCOPE_PRUNE_MIN);
        }
        self.scopes.push(Rc::downgrade(&scope));
        scope
    }

    fn release_scopes(&mut self) {
        for scope in std::mem::take(&mut self.scopes) {
            if let Some(scope) = scope.upgrade() {
                scope.clear();
            }
        }
        self.prune_at = SCOPE_PRUNE_MIN;
    }

    fn function_body(&mut self, body: &[Stmt], scope: &Rc<Scope>) -> Result<Value, RenderError> {
        match self.exec_block(body, scope)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Undefined),
            Flow::Break => Err(RenderError::Type("illegal break statement".to_string())),
            Flow::Continue => Err(RenderError::Type("illegal continue statement".to_string())),
        }
    }

    /// Call a function value with positional arguments.
    pub fn call(&mut self, callee: &Value, args: &[Value]) -> Result<Value, RenderError> {
        match callee {
            Value::Function(function) => self.call_function(function, args),
            other => Err(RenderError::NotCallable(other.to_string())),
        }
    }

    fn call_function(&mut self, function: &Function, args: &[Value]) -> Result<Value, RenderError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RenderError::CallDepth(MAX_CALL_DEPTH));
        }
        self.depth += 1;
        let result = match function {
            Function::Closure { def, env } => self.call_closure(def, env, args),
            Function::Builtin { call, .. } => call(self, args),
            Function::Method { receiver, name } => {
                builtins::call_method(self, receiver, name, args)
            }
        };
        self.depth -= 1;
        result
    }

    fn call_closure(
        &mut self,
        def: &FunctionDef,
        env: &Rc<Scope>,
        args: &[Value],
    ) -> Result<Value, RenderError> {
        let scope = self.enter(env);
        for (index, param) in def.params.iter().enumerate() {
            let value = args.get(index).cloned().unwrap_or_default();
            scope.declare(param.as_str(), value, false);
        }
        match &def.body {
            FunctionBody::Block(body) => self.function_body(body, &scope),
            FunctionBody::Expr(expr) => self.eval(expr, &scope),
        }
    }

    fn closure(def: &Arc<FunctionDef>, env: &Rc<Scope>) -> Value {
        Value::Function(Rc::new(Function::Closure {
            def: Arc::clone(def),
            env: Rc::clone(env),
        }))
    }

    /// Execute statements in a new block scope, hoisting function declarations first.
    pub fn exec_block(&mut self, body: &[Stmt], parent: &Rc<Scope>) -> Result<Flow, RenderError> {
        let scope = self.enter(parent);
        for stmt in body {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    scope.declare(name.as_str(), Self::closure(def, &scope), false);
                }
            }
        }
        for stmt in body {
            match self.exec(stmt, &scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, scope: &Rc<Scope>) -> Result<Flow, RenderError> {
        match stmt {
            Stmt::Declare { kind, name, init } => {
                let value = match init {
                    Some(init) => self.eval(init, scope)?,
                    None => Value::Undefined,
                };
                scope.declare(name.as_str(), value, *kind == DeclKind::Const);
            }
            Stmt::Assign { target, op, value } => {
                let value = match op.binary() {
                    None => self.eval(value, scope)?,
                    Some(op) => {
                        let current = self.eval(target, scope)?;
                        let operand = self.eval(value, scope)?;
                        binary(op, &current, &operand)
                    }
                };
                self.assign(target, value, scope)?;
            }
            Stmt::Expr(expr) => {
                self.eval(expr, scope)?;
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    return self.exec_block(consequent, scope);
                }
                if let Some(alternate) = alternate {
                    return self.exec_block(alternate, scope);
                }
            }
            Stmt::ForOf {
                kind,
                binding,
                iterable,
                body,
            } => {
                let items = match self.eval(iterable, scope)? {
                    Value::Array(items) => items.borrow().clone(),
                    Value::String(text) => text.chars().map(|c| Value::string(c.to_string())).collect(),
                    other => {
                        return Err(RenderError::Type(format!("{} is not iterable", other.kind())))
                    }
                };
                return self.run_loop(items, *kind, binding, body, scope);
            }
            Stmt::ForIn {
                kind,
                binding,
                object,
                body,
            } => {
                let keys = builtins::own_keys(&self.eval(object, scope)?)
                    .into_iter()
                    .map(Value::string)
                    .collect();
                return self.run_loop(keys, *kind, binding, body, scope);
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => {
                let loop_scope = self.enter(scope);
                if let Some(init) = init {
                    self.exec(init, &loop_scope)?;
                }
                loop {
                    if let Some(test) = test {
                        if !self.eval(test, &loop_scope)?.truthy() {
                            break;
                        }
                    }
                    match self.exec_block(body, &loop_scope)? {
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                        Flow::Normal | Flow::Continue => {}
                    }
                    if let Some(update) = update {
                        self.exec(update, &loop_scope)?;
                    }
                }
            }
            Stmt::While { test, body } => {
                while self.eval(test, scope)?.truthy() {
                    match self.exec_block(body, scope)? {
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            Stmt::Break => return Ok(Flow::Break),
            Stmt::Continue => return Ok(Flow::Continue),
            Stmt::Return(value) => {
                let value = match value {
                    Some(value) => self.eval(value, scope)?,
                    None => Value::Undefined,
                };
                return Ok(Flow::Return(value));
            }
            // Declared when the enclosing block was entered
            Stmt::Function(_) => {}
            Stmt::With { object, body } => {
                return Err(RenderError::Type(format!(
                    "unlowered with block over {:?} ({} statements)",
                    object,
                    body.len()
                )));
            }
            Stmt::Block(body) => return self.exec_block(body, scope),
        }
        Ok(Flow::Normal)
    }

    fn run_loop(
        &mut self,
        items: Vec<Value>,
        kind: DeclKind,
        binding: &str,
        body: &[Stmt],
        scope: &Rc<Scope>,
    ) -> Result<Flow, RenderError> {
        for item in items {
            let iteration = self.enter(scope);
            iteration.declare(binding, item, kind == DeclKind::Const);
            match self.exec_block(body, &iteration)? {
                Flow::Break => break,
                flow @ Flow::Return(_) => return Ok(flow),
                Flow::Normal | Flow::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, target: &Expr, value: Value, scope: &Rc<Scope>) -> Result<(), RenderError> {
        match target {
            Expr::Ident(name) => {
                if !scope.assign(name, value.clone())? {
                    self.globals.declare(name.as_str(), value, false);
                }
                Ok(())
            }
            Expr::Scoped {
                object,
                name,
                fallback,
            } => {
                if let Some(Value::Object(fields)) = scope.lookup(object) {
                    if fields.borrow().contains_key(name) {
                        fields.borrow_mut().set(name.as_str(), value);
                        return Ok(());
                    }
                }
                self.assign(fallback, value, scope)
            }
            Expr::Member { object, property } => {
                let object = self.eval(object, scope)?;
                builtins::set_property(&object, property, value)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let key = property_key(&self.eval(index, scope)?);
                builtins::set_property(&object, &key, value)
            }
            _ => Err(RenderError::Type("invalid assignment target".to_string())),
        }
    }

    pub fn eval(&mut self, expr: &Expr, scope: &Rc<Scope>) -> Result<Value, RenderError> {
        match expr {
            Expr::Number(number) => Ok(Value::Number(*number)),
            Expr::Str(text) => Ok(Value::string(text)),
            Expr::Bool(flag) => Ok(Value::Bool(*flag)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Template { quasis, exprs } => {
                let mut out = String::new();
                for (index, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(expr) = exprs.get(index) {
                        out.push_str(&self.eval(expr, scope)?.to_string());
                    }
                }
                Ok(Value::string(out))
            }
            Expr::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.eval(item, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(items))
            }
            Expr::Object(entries) => {
                let mut object = super::value::Object::new();
                for (key, value) in entries {
                    let value = self.eval(value, scope)?;
                    object.set(key.as_str(), value);
                }
                Ok(Value::object(object))
            }
            Expr::Ident(name) => scope
                .lookup(name)
                .ok_or_else(|| RenderError::Undefined(name.clone())),
            Expr::Scoped {
                object,
                name,
                fallback,
            } => {
                let target = scope
                    .lookup(object)
                    .ok_or_else(|| RenderError::Undefined(object.clone()))?;
                match builtins::scope_field(&target, name)? {
                    Some(value) => Ok(value),
                    None => self.eval(fallback, scope),
                }
            }
            Expr::Member { object, property } => {
                let object = self.eval(object, scope)?;
                builtins::get_property(&object, property)
            }
            Expr::Index { object, index } => {
                let object = self.eval(object, scope)?;
                let key = property_key(&self.eval(index, scope)?);
                builtins::get_property(&object, &key)
            }
            Expr::Call { callee, args } => {
                let function = self.eval(callee, scope)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                match &function {
                    Value::Function(function) => self.call_function(function, &args),
                    _ => Err(RenderError::NotCallable(describe(callee))),
                }
            }
            Expr::Arrow(def) => Ok(Self::closure(def, scope)),
            Expr::Unary { op, operand } => {
                if *op == UnaryOp::Typeof {
                    return match self.eval(operand, scope) {
                        Ok(value) => Ok(Value::string(value.type_of())),
                        Err(RenderError::Undefined(_))
                            if matches!(**operand, Expr::Ident(_) | Expr::Scoped { .. }) =>
                        {
                            Ok(Value::string("undefined"))
                        }
                        Err(error) => Err(error),
                    };
                }
                let value = self.eval(operand, scope)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus | UnaryOp::Typeof => Value::Number(value.to_number()),
                })
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                match op {
                    BinaryOp::And if !left.truthy() => Ok(left),
                    BinaryOp::Or if left.truthy() => Ok(left),
                    BinaryOp::Nullish if !left.is_nullish() => Ok(left),
                    BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => self.eval(right, scope),
                    _ => {
                        let right = self.eval(right, scope)?;
                        Ok(binary(*op, &left, &right))
                    }
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(consequent, scope)
                } else {
                    self.eval(alternate, scope)
                }
            }
        }
    }
}

/// Evaluate a non-short-circuiting binary operator.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (a, b) if is_stringy(a) || is_stringy(b) => Value::string(format!("{}{}", a, b)),
            (a, b) => Value::Number(a.to_number() + b.to_number()),
        },
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Lt => Value::Bool(compare(left, right, |o| o.is_lt())),
        BinaryOp::LtEq => Value::Bool(compare(left, right, |o| o.is_le())),
        BinaryOp::Gt => Value::Bool(compare(left, right, |o| o.is_gt())),
        BinaryOp::GtEq => Value::Bool(compare(left, right, |o| o.is_ge())),
        BinaryOp::LooseEq => Value::Bool(left.loose_equals(right)),
        BinaryOp::LooseNotEq => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
        BinaryOp::And => {
            if left.truthy() {
                right.clone()
            } else {
                left.clone()
            }
        }
        BinaryOp::Or => {
            if left.truthy() {
                left.clone()
            } else {
                right.clone()
            }
        }
        BinaryOp::Nullish => {
            if left.is_nullish() {
                right.clone()
            } else {
                left.clone()
            }
        }
    }
}

fn is_stringy(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Array(_) | Value::Object(_) | Value::Function(_)
    )
}

fn compare(left: &Value, right: &Value, test: fn(std::cmp::Ordering) -> bool) -> bool {
    if is_stringy(left) && is_stringy(right) {
        return test(left.to_string().cmp(&right.to_string()));
    }
    left.to_number()
        .partial_cmp(&right.to_number())
        .is_some_and(test)
}

/// Property name an index value refers to (`items[0]` reads property `"0"`).
fn property_key(index: &Value) -> String {
    index.to_string()
}

/// Source-like description of a callee for error messages.
fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) | Expr::Scoped { name, .. } => name.clone(),
        Expr::Member { object, property } => format!("{}.{}", describe(object), property),
        Expr::Index { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        _ => "expression".to_string(),
    }
}
