//! Built-in globals, property access and methods of primitive values
//!
//! Strings, arrays and numbers expose their methods as bound [`Function::Method`] values, so
//! `items.map` can be passed around before it is called.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::cmp::Ordering;
use std::rc::Rc;

use super::interpreter::{Interpreter, Scope};
use super::value::{format_number, join_array, Function, Object, Value};
use crate::tickplate::error::RenderError;

const STRING_METHODS: &[&str] = &[
    "toUpperCase",
    "toLowerCase",
    "trim",
    "trimStart",
    "trimEnd",
    "startsWith",
    "endsWith",
    "includes",
    "indexOf",
    "split",
    "replace",
    "replaceAll",
    "repeat",
    "padStart",
    "padEnd",
    "slice",
    "substring",
    "charAt",
    "concat",
    "toString",
];

const ARRAY_METHODS: &[&str] = &[
    "push", "pop", "shift", "unshift", "join", "map", "filter", "forEach", "find", "some", "every",
    "includes", "indexOf", "slice", "concat", "reverse", "reduce", "sort", "toString",
];

const NUMBER_METHODS: &[&str] = &["toFixed", "toString"];

/// Longest string, in bytes, that `repeat` and the padding methods will build.
pub const MAX_STRING_LENGTH: usize = 1 << 29;

/// Arrays are dense, so growing one past this many elements is refused.
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(Infinity|(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?)").unwrap()
});

/// Declare the global functions and namespaces in `scope`.
pub fn install_globals(scope: &Rc<Scope>) {
    scope.declare("String", Value::builtin("String", global_string), true);
    scope.declare("Number", Value::builtin("Number", global_number), true);
    scope.declare("Boolean", Value::builtin("Boolean", global_boolean), true);
    scope.declare("parseInt", Value::builtin("parseInt", parse_int), true);
    scope.declare("parseFloat", Value::builtin("parseFloat", parse_float), true);

    let json = Object::from_iter([
        ("stringify".to_string(), Value::builtin("stringify", json_stringify)),
        ("parse".to_string(), Value::builtin("parse", json_parse)),
    ]);
    scope.declare("JSON", Value::object(json), true);

    let math = Object::from_iter([
        ("PI".to_string(), Value::Number(std::f64::consts::PI)),
        ("floor".to_string(), Value::builtin("floor", math_floor)),
        ("ceil".to_string(), Value::builtin("ceil", math_ceil)),
        ("round".to_string(), Value::builtin("round", math_round)),
        ("abs".to_string(), Value::builtin("abs", math_abs)),
        ("min".to_string(), Value::builtin("min", math_min)),
        ("max".to_string(), Value::builtin("max", math_max)),
        ("pow".to_string(), Value::builtin("pow", math_pow)),
        ("sqrt".to_string(), Value::builtin("sqrt", math_sqrt)),
    ]);
    scope.declare("Math", Value::object(math), true);

    let object = Object::from_iter([
        ("keys".to_string(), Value::builtin("keys", object_keys)),
        ("values".to_string(), Value::builtin("values", object_values)),
        ("entries".to_string(), Value::builtin("entries", object_entries)),
    ]);
    scope.declare("Object", Value::object(object), true);

    let array = Object::from_iter([(
        "isArray".to_string(),
        Value::builtin("isArray", array_is_array),
    )]);
    scope.declare("Array", Value::object(array), true);
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

fn method(receiver: &Value, name: &str) -> Value {
    Value::Function(Rc::new(Function::Method {
        receiver: receiver.clone(),
        name: name.to_string(),
    }))
}

/// Read `value[key]`.
pub fn get_property(value: &Value, key: &str) -> Result<Value, RenderError> {
    let property = match value {
        Value::Undefined | Value::Null => {
            return Err(RenderError::PropertyOfNothing {
                property: key.to_string(),
                target: value.kind(),
            })
        }
        Value::Object(object) => object.borrow().get(key).cloned().unwrap_or_default(),
        Value::Array(items) => {
            if key == "length" {
                Value::Number(items.borrow().len() as f64)
            } else if let Ok(index) = key.parse::<usize>() {
                items.borrow().get(index).cloned().unwrap_or_default()
            } else if ARRAY_METHODS.contains(&key) {
                method(value, key)
            } else {
                Value::Undefined
            }
        }
        Value::String(text) => {
            if key == "length" {
                Value::Number(text.chars().count() as f64)
            } else if let Ok(index) = key.parse::<usize>() {
                text.chars()
                    .nth(index)
                    .map(|c| Value::string(c.to_string()))
                    .unwrap_or_default()
            } else if STRING_METHODS.contains(&key) {
                method(value, key)
            } else {
                Value::Undefined
            }
        }
        Value::Number(_) if NUMBER_METHODS.contains(&key) => method(value, key),
        Value::Bool(_) if key == "toString" => method(value, key),
        Value::Function(function) if key == "name" => Value::string(function.name()),
        Value::Number(_) | Value::Bool(_) | Value::Function(_) => Value::Undefined,
    };
    Ok(property)
}

/// Write `value[key] = property`. Writes to primitives are ignored.
pub fn set_property(value: &Value, key: &str, property: Value) -> Result<(), RenderError> {
    match value {
        Value::Undefined | Value::Null => Err(RenderError::AssignToNothing {
            property: key.to_string(),
            target: value.kind(),
        }),
        Value::Object(object) => {
            object.borrow_mut().set(key, property);
            Ok(())
        }
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            if key == "length" {
                let length = property.to_number();
                if !(0.0..=MAX_ARRAY_LENGTH as f64).contains(&length) || length.fract() != 0.0 {
                    return Err(invalid_array_length());
                }
                items.resize(length as usize, Value::Undefined);
            } else if let Ok(index) = key.parse::<usize>() {
                if index >= items.len() {
                    if index >= MAX_ARRAY_LENGTH {
                        return Err(invalid_array_length());
                    }
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = property;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn invalid_array_length() -> RenderError {
    RenderError::Type("invalid array length".to_string())
}

fn invalid_string_length() -> RenderError {
    RenderError::Type("invalid string length".to_string())
}

/// Field of a `with` object that shadows outer names, if it has one.
pub fn scope_field(target: &Value, name: &str) -> Result<Option<Value>, RenderError> {
    match target {
        Value::Undefined | Value::Null => Err(RenderError::Type(format!(
            "cannot use {} as a with scope",
            target.kind()
        ))),
        Value::Object(object) => Ok(object.borrow().get(name).cloned()),
        Value::Array(items) => {
            let items = items.borrow();
            if name == "length" {
                return Ok(Some(Value::Number(items.len() as f64)));
            }
            Ok(name
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index).cloned()))
        }
        _ => Ok(None),
    }
}

/// Enumerable keys, in the order `for...in` and `Object.keys` visit them.
pub fn own_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(object) => object.borrow().keys().map(str::to_string).collect(),
        Value::Array(items) => (0..items.borrow().len()).map(|i| i.to_string()).collect(),
        Value::String(text) => (0..text.chars().count()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

pub fn call_method(
    interpreter: &mut Interpreter,
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> Result<Value, RenderError> {
    match receiver {
        Value::String(text) => string_method(interpreter, text, name, args),
        Value::Array(_) => array_method(interpreter, receiver, name, args),
        Value::Number(number) => number_method(*number, name, args),
        other if name == "toString" => Ok(Value::string(other.to_string())),
        other => Err(RenderError::NotCallable(format!("{}.{}", other.kind(), name))),
    }
}

/// Resolve a relative index the way `slice` does: negative counts from the end.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_nullish() {
        return default;
    }
    let index = value.to_number();
    if index.is_nan() {
        0
    } else if index < 0.0 {
        len.saturating_sub((-index) as usize)
    } else {
        (index as usize).min(len)
    }
}

fn clamped_index(value: &Value, len: usize, default: usize) -> usize {
    if value.is_nullish() {
        return default;
    }
    let index = value.to_number();
    if index.is_nan() || index < 0.0 {
        0
    } else {
        (index as usize).min(len)
    }
}

fn char_offset(text: &str, byte_offset: usize) -> f64 {
    text[..byte_offset].chars().count() as f64
}

fn pad(text: &str, args: &[Value], at_start: bool) -> Result<Value, RenderError> {
    let target = arg(args, 0).to_number();
    let fill = match arg(args, 1) {
        Value::Undefined => " ".to_string(),
        other => other.to_string(),
    };
    let length = text.chars().count();
    if target.is_nan() || target as usize <= length || fill.is_empty() {
        return Ok(Value::string(text));
    }
    if target > MAX_STRING_LENGTH as f64 {
        return Err(invalid_string_length());
    }
    let padding: String = fill.chars().cycle().take(target as usize - length).collect();
    Ok(if at_start {
        Value::string(padding + text)
    } else {
        Value::string(format!("{}{}", text, padding))
    })
}

fn replace(
    interpreter: &mut Interpreter,
    text: &str,
    args: &[Value],
    all: bool,
) -> Result<Value, RenderError> {
    let pattern = arg(args, 0).to_string();
    let replacement = arg(args, 1);
    let mut out = String::new();
    let mut rest = 0;
    let mut search = 0;
    while let Some(found) = text[search..].find(&pattern).map(|offset| search + offset) {
        out.push_str(&text[rest..found]);
        let substitute = match &replacement {
            Value::Function(_) => {
                let args = [
                    Value::string(&pattern),
                    Value::Number(char_offset(text, found)),
                    Value::string(text),
                ];
                interpreter.call(&replacement, &args)?.to_string()
            }
            other => other.to_string().replace("$&", &pattern),
        };
        out.push_str(&substitute);
        rest = found + pattern.len();
        if !all {
            break;
        }
        search = if pattern.is_empty() {
            match text[rest..].chars().next() {
                Some(c) => rest + c.len_utf8(),
                None => break,
            }
        } else {
            rest
        };
    }
    out.push_str(&text[rest..]);
    Ok(Value::string(out))
}

fn string_method(
    interpreter: &mut Interpreter,
    text: &str,
    name: &str,
    args: &[Value],
) -> Result<Value, RenderError> {
    let first = arg(args, 0);
    let value = match name {
        "toUpperCase" => Value::string(text.to_uppercase()),
        "toLowerCase" => Value::string(text.to_lowercase()),
        "trim" => Value::string(text.trim()),
        "trimStart" => Value::string(text.trim_start()),
        "trimEnd" => Value::string(text.trim_end()),
        "startsWith" => Value::Bool(text.starts_with(first.to_string().as_str())),
        "endsWith" => Value::Bool(text.ends_with(first.to_string().as_str())),
        "includes" => Value::Bool(text.contains(first.to_string().as_str())),
        "indexOf" => Value::Number(
            text.find(first.to_string().as_str())
                .map_or(-1.0, |offset| char_offset(text, offset)),
        ),
        "split" => {
            let limit = match arg(args, 1) {
                Value::Undefined => usize::MAX,
                other => other.to_number().max(0.0) as usize,
            };
            let parts: Vec<Value> = match first {
                Value::Undefined => vec![Value::string(text)],
                separator => {
                    let separator = separator.to_string();
                    if separator.is_empty() {
                        text.chars().map(|c| Value::string(c.to_string())).collect()
                    } else {
                        text.split(separator.as_str()).map(Value::string).collect()
                    }
                }
            };
            Value::array(parts.into_iter().take(limit).collect())
        }
        "replace" => return replace(interpreter, text, args, false),
        "replaceAll" => return replace(interpreter, text, args, true),
        "repeat" => {
            let count = first.to_number();
            if count < 0.0 || count.is_infinite() {
                return Err(RenderError::Type(format!(
                    "invalid count value: {}",
                    format_number(count)
                )));
            }
            let count = if count.is_nan() || text.is_empty() { 0 } else { count as usize };
            if !text.is_empty() && count > MAX_STRING_LENGTH / text.len() {
                return Err(invalid_string_length());
            }
            Value::string(text.repeat(count))
        }
        "padStart" => pad(text, args, true)?,
        "padEnd" => pad(text, args, false)?,
        "slice" => {
            let chars: Vec<char> = text.chars().collect();
            let start = relative_index(&first, chars.len(), 0);
            let end = relative_index(&arg(args, 1), chars.len(), chars.len());
            Value::string(chars[start..end.max(start)].iter().collect::<String>())
        }
        "substring" => {
            let chars: Vec<char> = text.chars().collect();
            let start = clamped_index(&first, chars.len(), 0);
            let end = clamped_index(&arg(args, 1), chars.len(), chars.len());
            let (start, end) = if start > end { (end, start) } else { (start, end) };
            Value::string(chars[start..end].iter().collect::<String>())
        }
        "charAt" => {
            let index = first.to_number();
            let index = if index.is_nan() { 0.0 } else { index };
            let found = if index < 0.0 {
                None
            } else {
                text.chars().nth(index as usize)
            };
            Value::string(found.map(String::from).unwrap_or_default())
        }
        "concat" => {
            let mut out = text.to_string();
            for value in args {
                out.push_str(&value.to_string());
            }
            Value::string(out)
        }
        "toString" => Value::string(text),
        _ => return Err(RenderError::NotCallable(format!("string.{}", name))),
    };
    Ok(value)
}

fn callback(args: &[Value]) -> Result<Value, RenderError> {
    match arg(args, 0) {
        function @ Value::Function(_) => Ok(function),
        other => Err(RenderError::NotCallable(other.to_string())),
    }
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
        _ => a.strict_equals(b),
    }
}

fn array_method(
    interpreter: &mut Interpreter,
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> Result<Value, RenderError> {
    let Value::Array(items) = receiver else {
        return Err(RenderError::NotCallable(name.to_string()));
    };
    let value = match name {
        "push" => {
            let mut items = items.borrow_mut();
            items.extend(args.iter().cloned());
            Value::Number(items.len() as f64)
        }
        "pop" => items.borrow_mut().pop().unwrap_or_default(),
        "shift" => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        }
        "unshift" => {
            let mut items = items.borrow_mut();
            items.splice(0..0, args.iter().cloned());
            Value::Number(items.len() as f64)
        }
        "join" => {
            let separator = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_string(),
            };
            Value::string(join_array(items, &separator))
        }
        "map" | "filter" | "forEach" | "find" | "some" | "every" => {
            let function = callback(args)?;
            let snapshot = items.borrow().clone();
            let mut kept = Vec::new();
            for (index, item) in snapshot.into_iter().enumerate() {
                let call_args = [item.clone(), Value::Number(index as f64), receiver.clone()];
                let result = interpreter.call(&function, &call_args)?;
                match name {
                    "map" => kept.push(result),
                    "filter" if result.truthy() => kept.push(item),
                    "find" if result.truthy() => return Ok(item),
                    "some" if result.truthy() => return Ok(Value::Bool(true)),
                    "every" if !result.truthy() => return Ok(Value::Bool(false)),
                    _ => {}
                }
            }
            match name {
                "map" | "filter" => Value::array(kept),
                "some" => Value::Bool(false),
                "every" => Value::Bool(true),
                _ => Value::Undefined,
            }
        }
        "includes" => {
            let needle = arg(args, 0);
            Value::Bool(items.borrow().iter().any(|item| same_value_zero(item, &needle)))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            let position = items
                .borrow()
                .iter()
                .position(|item| item.strict_equals(&needle));
            Value::Number(position.map_or(-1.0, |index| index as f64))
        }
        "slice" => {
            let items = items.borrow();
            let start = relative_index(&arg(args, 0), items.len(), 0);
            let end = relative_index(&arg(args, 1), items.len(), items.len());
            Value::array(items[start..end.max(start)].to_vec())
        }
        "concat" => {
            let mut out = items.borrow().clone();
            for value in args {
                match value {
                    Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::array(out)
        }
        "reverse" => {
            items.borrow_mut().reverse();
            receiver.clone()
        }
        "reduce" => {
            let function = callback(args)?;
            let snapshot = items.borrow().clone();
            let mut entries = snapshot.into_iter().enumerate();
            let mut accumulator = match args.get(1) {
                Some(initial) => initial.clone(),
                None => match entries.next() {
                    Some((_, first)) => first,
                    None => {
                        return Err(RenderError::Type(
                            "reduce of empty array with no initial value".to_string(),
                        ))
                    }
                },
            };
            for (index, item) in entries {
                let call_args = [accumulator, item, Value::Number(index as f64), receiver.clone()];
                accumulator = interpreter.call(&function, &call_args)?;
            }
            accumulator
        }
        "sort" => {
            let comparator = match arg(args, 0) {
                Value::Undefined => None,
                function @ Value::Function(_) => Some(function),
                other => return Err(RenderError::NotCallable(other.to_string())),
            };
            let mut sorted = items.borrow().clone();
            sort_values(interpreter, &mut sorted, comparator.as_ref())?;
            *items.borrow_mut() = sorted;
            receiver.clone()
        }
        "toString" => Value::string(receiver.to_string()),
        _ => return Err(RenderError::NotCallable(format!("array.{}", name))),
    };
    Ok(value)
}

/// Stable insertion sort; the comparator may fail or be inconsistent without panicking.
fn sort_values(
    interpreter: &mut Interpreter,
    items: &mut [Value],
    comparator: Option<&Value>,
) -> Result<(), RenderError> {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && sort_order(interpreter, &items[j - 1], &items[j], comparator)?.is_gt() {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
    Ok(())
}

fn sort_order(
    interpreter: &mut Interpreter,
    a: &Value,
    b: &Value,
    comparator: Option<&Value>,
) -> Result<Ordering, RenderError> {
    let order = match (a, b) {
        (Value::Undefined, Value::Undefined) => Ordering::Equal,
        (Value::Undefined, _) => Ordering::Greater,
        (_, Value::Undefined) => Ordering::Less,
        _ => match comparator {
            Some(function) => {
                let result = interpreter.call(function, &[a.clone(), b.clone()])?.to_number();
                result.partial_cmp(&0.0).unwrap_or(Ordering::Equal)
            }
            None => a.to_string().cmp(&b.to_string()),
        },
    };
    Ok(order)
}

fn number_method(number: f64, name: &str, args: &[Value]) -> Result<Value, RenderError> {
    match name {
        "toFixed" => {
            let digits = match arg(args, 0) {
                Value::Undefined => 0.0,
                other => other.to_number(),
            };
            if !(0.0..=100.0).contains(&digits) {
                return Err(RenderError::Type(
                    "toFixed() digits argument must be between 0 and 100".to_string(),
                ));
            }
            if !number.is_finite() {
                return Ok(Value::string(format_number(number)));
            }
            Ok(Value::string(format!("{:.*}", digits as usize, number)))
        }
        "toString" => Ok(Value::string(format_number(number))),
        _ => Err(RenderError::NotCallable(format!("number.{}", name))),
    }
}

fn global_string(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    Ok(match args.first() {
        Some(value) => Value::string(value.to_string()),
        None => Value::string(""),
    })
}

fn global_number(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
}

fn global_boolean(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    Ok(Value::Bool(arg(args, 0).truthy()))
}

fn parse_int(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    let text = arg(args, 0).to_string();
    let text = text.trim_start();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let mut radix = match arg(args, 1) {
        Value::Undefined => 0,
        other => other.to_number() as u32,
    };
    let has_hex_prefix = digits.starts_with("0x") || digits.starts_with("0X");
    let digits = if (radix == 0 || radix == 16) && has_hex_prefix {
        radix = 16;
        &digits[2..]
    } else {
        digits
    };
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }

    let mut value: Option<f64> = None;
    for digit in digits.chars().map_while(|c| c.to_digit(radix)) {
        value = Some(value.unwrap_or(0.0) * f64::from(radix) + f64::from(digit));
    }
    Ok(Value::Number(match value {
        Some(value) if negative => -value,
        Some(value) => value,
        None => f64::NAN,
    }))
}

fn parse_float(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    let text = arg(args, 0).to_string();
    let number = match FLOAT_PREFIX.find(text.trim_start()) {
        Some(found) => match found.as_str().trim_start_matches('+') {
            "Infinity" => f64::INFINITY,
            "-Infinity" => f64::NEG_INFINITY,
            prefix => prefix.parse().unwrap_or(f64::NAN),
        },
        None => f64::NAN,
    };
    Ok(Value::Number(number))
}

fn json_stringify(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    let Some(json) = arg(args, 0).to_json()? else {
        return Ok(Value::Undefined);
    };
    let indent = match arg(args, 2) {
        Value::Number(width) if width >= 1.0 => " ".repeat(width.min(10.0) as usize),
        Value::String(text) => text.chars().take(10).collect(),
        _ => String::new(),
    };
    let text = if indent.is_empty() {
        serde_json::to_string(&json).map_err(|error| RenderError::Type(error.to_string()))?
    } else {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        json.serialize(&mut serializer)
            .map_err(|error| RenderError::Type(error.to_string()))?;
        String::from_utf8(buffer).map_err(|error| RenderError::Type(error.to_string()))?
    };
    Ok(Value::string(text))
}

fn json_parse(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    let text = arg(args, 0).to_string();
    let json: serde_json::Value = serde_json::from_str(&text)
        .map_err(|error| RenderError::Type(format!("invalid JSON: {}", error)))?;
    Ok(Value::from_json(&json))
}

fn number_arg(args: &[Value], index: usize) -> f64 {
    arg(args, index).to_number()
}

fn math_floor(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    Ok(Value::Number(number_arg(args, 0).floor()))
}

fn math_ceil(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    Ok(Value::Number(number_arg(args, 0).ceil()))
}

fn math_round(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    Ok(Value::Number((number_arg(args, 0) + 0.5).floor()))
}

fn math_abs(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    Ok(Value::Number(number_arg(args, 0).abs()))
}

fn math_pow(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    Ok(Value::Number(number_arg(args, 0).powf(number_arg(args, 1))))
}

fn math_sqrt(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    Ok(Value::Number(number_arg(args, 0).sqrt()))
}

fn extremum(args: &[Value], initial: f64, pick: fn(f64, f64) -> f64) -> Value {
    let mut result = initial;
    for value in args {
        let number = value.to_number();
        if number.is_nan() {
            return Value::Number(f64::NAN);
        }
        result = pick(result, number);
    }
    Value::Number(result)
}

fn math_min(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    Ok(extremum(args, f64::INFINITY, f64::min))
}

fn math_max(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    Ok(extremum(args, f64::NEG_INFINITY, f64::max))
}

fn keyed_object(args: &[Value]) -> Result<Value, RenderError> {
    let target = arg(args, 0);
    if target.is_nullish() {
        return Err(RenderError::Type(format!(
            "cannot convert {} to object",
            target.kind()
        )));
    }
    Ok(target)
}

fn object_keys(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    let target = keyed_object(args)?;
    Ok(Value::array(
        own_keys(&target).into_iter().map(Value::string).collect(),
    ))
}

fn object_values(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    let target = keyed_object(args)?;
    let values = own_keys(&target)
        .iter()
        .map(|key| get_property(&target, key))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::array(values))
}

fn object_entries(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    let target = keyed_object(args)?;
    let entries = own_keys(&target)
        .into_iter()
        .map(|key| {
            let value = get_property(&target, &key)?;
            Ok(Value::array(vec![Value::string(key), value]))
        })
        .collect::<Result<Vec<_>, RenderError>>()?;
    Ok(Value::array(entries))
}

fn array_is_array(_: &mut Interpreter, args: &[Value]) -> Result<Value, RenderError> {
    Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_))))
}

#[cfg(test)]
mod tests {
    use crate::tickplate::error::RenderError;
    use crate::tickplate::script::interpreter::Interpreter;
    use crate::tickplate::script::parse_program;
    use crate::tickplate::script::scoping::lower;

    fn eval(source: &str) -> String {
        let program = lower(parse_program(&format!("return {}", source)).unwrap(), &[]);
        Interpreter::new().run(&program, &[]).unwrap().to_string()
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(eval("'  Hi  '.trim().toUpperCase()"), "HI");
        assert_eq!(eval("'a-b-c'.split('-').length"), "3");
        assert_eq!(eval("'abc'.split('')"), "a,b,c");
        assert_eq!(eval("'a.b.c'.replace('.', '/')"), "a/b.c");
        assert_eq!(eval("'a.b.c'.replaceAll('.', '/')"), "a/b/c");
        assert_eq!(eval("'5'.padStart(3, '0')"), "005");
        assert_eq!(eval("'ab'.padEnd(5, 'xy')"), "abxyx");
        assert_eq!(eval("'héllo'.slice(1, -1)"), "éll");
        assert_eq!(eval("'héllo'.substring(4, 1)"), "éll");
        assert_eq!(eval("'héllo'.indexOf('l')"), "2");
        assert_eq!(eval("'ab'.repeat(3)"), "ababab");
        assert_eq!(eval("'abc'.charAt(1) + 'abc'[2]"), "bc");
        assert_eq!(eval("'a'.concat(1, [2, 3])"), "a12,3");
        assert_eq!(eval("'x'.startsWith('x') && 'xy'.endsWith('y') && 'xyz'.includes('y')"), "true");
    }

    #[test]
    fn test_replace_with_function() {
        assert_eq!(eval("'a-a'.replaceAll('a', m => m.toUpperCase())"), "A-A");
    }

    #[test]
    fn test_array_methods() {
        assert_eq!(eval("[1, 2, 3].map(x => x * 2).join(' ')"), "2 4 6");
        assert_eq!(eval("[1, 2, 3, 4].filter(x => x % 2 == 0)"), "2,4");
        assert_eq!(eval("[1, 2, 3].reduce((a, b) => a + b, 10)"), "16");
        assert_eq!(eval("[1, 2, 3].reduce((a, b) => a + b)"), "6");
        assert_eq!(eval("[3, 1, 2].sort()"), "1,2,3");
        assert_eq!(eval("[3, 10, 2].sort((a, b) => b - a)"), "10,3,2");
        assert_eq!(eval("[10, 9, 1].sort()"), "1,10,9");
        assert_eq!(eval("[1, 2, 3].find(x => x > 1)"), "2");
        assert_eq!(eval("[1, 2].some(x => x > 1) + '/' + [1, 2].every(x => x > 1)"), "true/false");
        assert_eq!(eval("[1, 2, 3].slice(-2)"), "2,3");
        assert_eq!(eval("[1].concat([2, 3], 4)"), "1,2,3,4");
        assert_eq!(eval("[1, 2, 3].reverse()"), "3,2,1");
    }

    #[test]
    fn test_array_mutation() {
        let program = lower(
            parse_program("const a = [2]\na.unshift(1)\na.push(3, 4)\na.shift()\na.pop()\nreturn a").unwrap(),
            &[],
        );
        let value = Interpreter::new().run(&program, &[]).unwrap();
        assert_eq!(value.to_string(), "2,3");
    }

    #[test]
    fn test_number_methods_and_globals() {
        assert_eq!(eval("(3.14159).toFixed(2)"), "3.14");
        assert_eq!(eval("parseInt('42px') + parseFloat('1.5em')"), "43.5");
        assert_eq!(eval("parseInt('0x1A')"), "26");
        assert_eq!(eval("parseInt('abc')"), "NaN");
        assert_eq!(eval("Number('12') + 1"), "13");
        assert_eq!(eval("String(12) + 1"), "121");
        assert_eq!(eval("Boolean('')"), "false");
        assert_eq!(eval("Math.max(1, 5, 3) - Math.min(4, 2)"), "3");
        assert_eq!(eval("Math.round(2.5) + Math.floor(-1.5)"), "1");
        assert_eq!(eval("Math.pow(2, 10)"), "1024");
    }

    #[test]
    fn test_object_and_json() {
        assert_eq!(eval("Object.keys({b: 1, a: 2})"), "b,a");
        assert_eq!(eval("Object.values({b: 1, a: 2})"), "1,2");
        assert_eq!(eval("Object.entries({a: 1}).map(e => e.join('=')).join('&')"), "a=1");
        assert_eq!(eval("JSON.stringify({a: [1, 'x', null], b: undefined})"), r#"{"a":[1,"x",null]}"#);
        assert_eq!(eval("JSON.stringify({a: 1}, null, 2)"), "{\n  \"a\": 1\n}");
        assert_eq!(eval("JSON.parse('{\"n\": 3}').n + 1"), "4");
        assert_eq!(eval("Array.isArray([]) && !Array.isArray('x')"), "true");
    }

    #[test]
    fn test_cyclic_arrays() {
        let program = lower(
            parse_program("const a = [1]\na.push(a)\nreturn a.join('-') + '|' + a").unwrap(),
            &[],
        );
        let value = Interpreter::new().run(&program, &[]).unwrap();
        assert_eq!(value.to_string(), "1-|1,");

        assert_eq!(
            eval_err("const o = {}\no.self = o\nreturn JSON.stringify(o)"),
            RenderError::Type("converting circular structure to JSON".to_string())
        );
    }

    fn eval_err(source: &str) -> RenderError {
        let program = lower(parse_program(source).unwrap(), &[]);
        Interpreter::new().run(&program, &[]).unwrap_err()
    }

    #[test]
    fn test_oversized_strings_are_refused() {
        let invalid = RenderError::Type("invalid string length".to_string());
        assert_eq!(eval_err("return 'ab'.repeat(1e19)"), invalid);
        assert_eq!(eval_err("return 'ab'.repeat(268435457)"), invalid);
        assert_eq!(eval("'ab'.repeat(2).length"), "4");
        assert_eq!(eval_err("return 'x'.padStart(1e12)"), invalid);
        assert_eq!(eval_err("return 'x'.padEnd(Infinity, '-')"), invalid);
        assert_eq!(eval("''.repeat(1e19)"), "");
        assert_eq!(eval("'x'.padStart(Infinity, '')"), "x");
    }

    #[test]
    fn test_oversized_arrays_are_refused() {
        let invalid = RenderError::Type("invalid array length".to_string());
        assert_eq!(eval_err("const a = []\na.length = 1e19"), invalid);
        assert_eq!(eval_err("const a = []\na.length = -1"), invalid);
        assert_eq!(eval_err("const a = []\na[4294967294] = 1"), invalid);

        let program = lower(
            parse_program("const a = [1]\na.length = 3\na[4] = 5\nreturn a.length").unwrap(),
            &[],
        );
        let value = Interpreter::new().run(&program, &[]).unwrap();
        assert_eq!(value.to_string(), "5");
    }
}
