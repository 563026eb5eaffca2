//! Runtime values of the script language
//!
//! Conversions follow JavaScript: truthiness, `ToString`, `ToNumber` and the two equality
//! operators. Arrays and objects are shared and mutable, so cloning a [`Value`] clones a handle.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use super::ast::FunctionDef;
use super::interpreter::{Interpreter, Scope};
use crate::tickplate::error::RenderError;

/// Signature of functions implemented in Rust.
pub type BuiltinFn = fn(&mut Interpreter, &[Value]) -> Result<Value, RenderError>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Object>>),
    Function(Rc<Function>),
}

/// Insertion-ordered property map.
#[derive(Clone, Default)]
pub struct Object {
    entries: Vec<(String, Value)>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or overwrite, keeping the original position of existing keys.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Value)> for Object {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        let mut object = Object::new();
        for (key, value) in iter {
            object.set(key, value);
        }
        object
    }
}

pub enum Function {
    /// A script function together with the scope it was created in.
    Closure {
        def: Arc<FunctionDef>,
        env: Rc<Scope>,
    },
    Builtin {
        name: &'static str,
        call: BuiltinFn,
    },
    /// A built-in method looked up on a string, array or number, bound to that receiver.
    Method { receiver: Value, name: String },
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Closure { def, .. } => def.name.as_deref().unwrap_or(""),
            Function::Builtin { name, .. } => name,
            Function::Method { name, .. } => name,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Closure { def, .. } => write!(f, "Closure({:?})", def.name),
            Function::Builtin { name, .. } => write!(f, "Builtin({})", name),
            Function::Method { name, .. } => write!(f, "Method({})", name),
        }
    }
}

impl Value {
    pub fn string(text: impl AsRef<str>) -> Self {
        Value::String(Rc::from(text.as_ref()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(object: Object) -> Self {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn builtin(name: &'static str, call: BuiltinFn) -> Self {
        Value::Function(Rc::new(Function::Builtin { name, call }))
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(flag) => Value::Bool(*flag),
            serde_json::Value::Number(number) => Value::Number(number.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(text) => Value::string(text),
            serde_json::Value::Array(items) => {
                Value::array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::object(
                map.iter()
                    .map(|(key, value)| (key.clone(), Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// JSON form of the value; `None` for values JSON cannot represent (undefined, functions).
    ///
    /// An array or object that contains itself is a type error.
    pub fn to_json(&self) -> Result<Option<serde_json::Value>, RenderError> {
        self.json_within(&mut Vec::new())
    }

    fn json_within(
        &self,
        ancestors: &mut Vec<usize>,
    ) -> Result<Option<serde_json::Value>, RenderError> {
        let json = match self {
            Value::Undefined | Value::Function(_) => return Ok(None),
            Value::Null => serde_json::Value::Null,
            Value::Bool(flag) => serde_json::Value::Bool(*flag),
            Value::Number(number) => number_to_json(*number),
            Value::String(text) => serde_json::Value::String(text.to_string()),
            Value::Array(items) => {
                enter_container(ancestors, Rc::as_ptr(items) as *const () as usize)?;
                let mut array = Vec::new();
                for item in items.borrow().iter() {
                    array.push(item.json_within(ancestors)?.unwrap_or(serde_json::Value::Null));
                }
                ancestors.pop();
                serde_json::Value::Array(array)
            }
            Value::Object(object) => {
                enter_container(ancestors, Rc::as_ptr(object) as *const () as usize)?;
                let mut map = serde_json::Map::new();
                for (key, value) in object.borrow().iter() {
                    if let Some(value) = value.json_within(ancestors)? {
                        map.insert(key.to_string(), value);
                    }
                }
                ancestors.pop();
                serde_json::Value::Object(map)
            }
        };
        Ok(Some(json))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Number(number) => *number != 0.0 && !number.is_nan(),
            Value::String(text) => !text.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(flag) => f64::from(u8::from(*flag)),
            Value::Number(number) => *number,
            Value::String(text) => string_to_number(text),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => {
                string_to_number(&self.to_string())
            }
        }
    }

    /// Name reported by `typeof`.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Array(_) | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function(_) => "function",
        }
    }

    /// Whether the value converts to a primitive by way of its string form.
    fn is_reference(&self) -> bool {
        matches!(
            self,
            Value::Array(_) | Value::Object(_) | Value::Function(_)
        )
    }

    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (a, b) if a.is_reference() && b.is_reference() => a.strict_equals(b),
            (a, b) if a.is_reference() => Value::string(a.to_string()).loose_equals(b),
            (a, b) if b.is_reference() => a.loose_equals(&Value::string(b.to_string())),
            (Value::String(a), Value::String(b)) => a == b,
            (a, b) => a.to_number() == b.to_number(),
        }
    }

    /// Short kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(text) => write!(f, "{:?}", text),
            Value::Function(function) => write!(f, "{:?}", function),
            Value::Undefined => f.write_str("undefined"),
            other => match other.to_json() {
                Ok(Some(json)) => write!(f, "{}", json),
                Ok(None) => f.write_str("undefined"),
                Err(_) => f.write_str("[circular]"),
            },
        }
    }
}

/// JavaScript `ToString`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(flag) => write!(f, "{}", flag),
            Value::Number(number) => f.write_str(&format_number(*number)),
            Value::String(text) => f.write_str(text),
            Value::Array(items) => f.write_str(&join_array(items, ",")),
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Function(function) => write!(f, "function {}() {{ [code] }}", function.name()),
        }
    }
}

thread_local! {
    /// Arrays being joined on this thread, innermost last.
    static JOINING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// `Array.prototype.join`: nullish items, and arrays already being joined, become empty.
pub fn join_array(items: &Rc<RefCell<Vec<Value>>>, separator: &str) -> String {
    let id = Rc::as_ptr(items) as *const () as usize;
    if JOINING.with(|joining| joining.borrow().contains(&id)) {
        return String::new();
    }
    JOINING.with(|joining| joining.borrow_mut().push(id));
    let parts: Vec<String> = items
        .borrow()
        .iter()
        .map(|item| {
            if item.is_nullish() {
                String::new()
            } else {
                item.to_string()
            }
        })
        .collect();
    JOINING.with(|joining| joining.borrow_mut().pop());
    parts.join(separator)
}

fn enter_container(ancestors: &mut Vec<usize>, id: usize) -> Result<(), RenderError> {
    if ancestors.contains(&id) {
        return Err(RenderError::Type("converting circular structure to JSON".to_string()));
    }
    ancestors.push(id);
    Ok(())
}

pub fn format_number(number: f64) -> String {
    if number.is_nan() {
        "NaN".to_string()
    } else if number.is_infinite() {
        let sign = if number > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if number == 0.0 {
        "0".to_string()
    } else if number.fract() == 0.0 && number.abs() < 1e21 {
        format!("{:.0}", number)
    } else {
        format!("{}", number)
    }
}

fn number_to_json(number: f64) -> serde_json::Value {
    if number.fract() == 0.0 && number.abs() < 9.0e15 {
        serde_json::Value::from(number as i64)
    } else {
        serde_json::Number::from_f64(number)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// JavaScript `ToNumber` for strings: surrounding whitespace is ignored, empty means zero.
pub fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim();
    match trimmed {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) =>
        {
            trimmed.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}
