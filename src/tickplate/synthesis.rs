//! Function Synthesizer
//!
//! Turns assembled program text into a [`Template`]: the text is parsed as the body of a
//! function with a single context parameter, and `with` blocks are lowered so bare names
//! resolve against the context explicitly. The result is immutable and can be shared across
//! threads; every render evaluates the program in a fresh interpreter.

use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

use crate::tickplate::error::{CompilationError, RenderError};
use crate::tickplate::script::ast::Stmt;
use crate::tickplate::script::interpreter::Interpreter;
use crate::tickplate::script::scoping::lower;
use crate::tickplate::script::value::Value;
use crate::tickplate::script::{is_identifier, parse_program};

/// A compiled template, callable with a context to produce text.
#[derive(Debug, Clone)]
pub struct Template {
    program: Arc<Vec<Stmt>>,
    param: String,
    source: Arc<str>,
}

impl Template {
    /// The program text this template was synthesized from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Name the context is bound to while rendering.
    pub fn param(&self) -> &str {
        &self.param
    }

    /// Render with a JSON context.
    ///
    /// The context is converted into script values, so templates may freely mutate it
    /// without affecting the caller's data.
    pub fn render(&self, context: &serde_json::Value) -> Result<String, RenderError> {
        trace!(param = %self.param, "rendering template");
        let context = Value::from_json(context);
        let mut interpreter = Interpreter::new();
        let output = interpreter.run(&self.program, &[(self.param.as_str(), context)])?;
        Ok(match output {
            Value::Undefined => String::new(),
            other => other.to_string(),
        })
    }

    /// Render with any serializable context.
    pub fn render_serialize<T: Serialize + ?Sized>(&self, context: &T) -> Result<String, RenderError> {
        let context = serde_json::to_value(context)
            .map_err(|error| RenderError::Context(error.to_string()))?;
        self.render(&context)
    }

    /// Consume the template into a plain rendering closure.
    pub fn into_fn(self) -> impl Fn(&serde_json::Value) -> Result<String, RenderError> + Send + Sync {
        move |context| self.render(context)
    }
}

/// Parse `program` as the body of a function taking `param` and build a [`Template`].
pub fn synthesize(program: &str, param: &str) -> Result<Template, CompilationError> {
    if !is_identifier(param) {
        return Err(CompilationError::InvalidLocals(param.to_string()));
    }
    let statements = parse_program(program).map_err(|error| {
        let (line, column) = error.line_col(program);
        CompilationError::Syntax {
            message: error.message,
            line,
            column,
            program: None,
        }
    })?;
    let statements = lower(statements, &[param]);
    Ok(Template {
        program: Arc::new(statements),
        param: param.to_string(),
        source: Arc::from(program),
    })
}
