//! Compilation entry points
//!
//! [`compile`] runs the whole pipeline on template text: the template is scanned into a
//! program by the [`assembling`](crate::tickplate::assembling) stage and the program is
//! synthesized into a [`Template`]. [`compile_file`] reads the template from disk first.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::tickplate::assembling::{assemble_program, APPEND, OUTPUT, RESULT};
use crate::tickplate::error::{CompilationError, Error, ReadError};
use crate::tickplate::script::is_identifier;
use crate::tickplate::synthesis::{synthesize, Template};

/// Options controlling how a template is compiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Wrap the template in `with (<locals>) { ... }` so context fields are bare names.
    #[serde(rename = "with")]
    pub with_scope: bool,
    /// Name of the context parameter.
    pub locals: String,
    /// Log the generated program and attach it to compilation errors.
    pub debug: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            with_scope: true,
            locals: "locals".to_string(),
            debug: false,
        }
    }
}

pub(crate) fn check_locals(locals: &str) -> Result<(), CompilationError> {
    if !is_identifier(locals) || [OUTPUT, APPEND, RESULT].contains(&locals) {
        return Err(CompilationError::InvalidLocals(locals.to_string()));
    }
    Ok(())
}

/// The program text generated for `template`, without parsing it.
pub fn assemble(template: &str, options: &Options) -> String {
    assemble_program(template, options).text()
}

/// Compile template text into a renderable [`Template`].
pub fn compile(template: &str, options: &Options) -> Result<Template, CompilationError> {
    check_locals(&options.locals)?;
    debug!(
        lines = template.split('\n').count(),
        with = options.with_scope,
        locals = %options.locals,
        "compiling template"
    );

    let program = assemble_program(template, options);
    let source = program.text();
    if options.debug {
        info!(target: "tickplate::program", "generated program:\n{}", source);
    }

    let compiled = synthesize(&source, &options.locals).map_err(|error| {
        if options.debug {
            error.with_program(source.as_str())
        } else {
            error
        }
    })?;
    debug!(
        statements = program.statements().len(),
        "compiled template"
    );
    Ok(compiled)
}

/// Read a template file and compile it.
pub fn compile_file(path: impl AsRef<Path>, options: &Options) -> Result<Template, Error> {
    let path = path.as_ref();
    let template = fs::read_to_string(path).map_err(|source| ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = template.len(), "read template");
    Ok(compile(&template, options)?)
}
