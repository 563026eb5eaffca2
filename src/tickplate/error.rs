//! Errors raised while loading, compiling and rendering templates

use std::path::PathBuf;
use thiserror::Error;

/// The template source could not be loaded from disk.
#[derive(Debug, Error)]
#[error("failed to read template {}: {source}", .path.display())]
pub struct ReadError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// The assembled program could not be turned into a template.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompilationError {
    /// The program text is not valid script syntax. Line and column are 1-based positions in
    /// the generated program, which is attached when compiling with `debug` enabled.
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
        program: Option<String>,
    },

    #[error("invalid locals name `{0}`: expected an identifier")]
    InvalidLocals(String),
}

impl CompilationError {
    /// Attach the offending program text to a syntax error.
    pub fn with_program(self, source: impl Into<String>) -> Self {
        match self {
            CompilationError::Syntax {
                message,
                line,
                column,
                ..
            } => CompilationError::Syntax {
                message,
                line,
                column,
                program: Some(source.into()),
            },
            other => other,
        }
    }

    /// The program text attached to this error, if any.
    pub fn program(&self) -> Option<&str> {
        match self {
            CompilationError::Syntax { program, .. } => program.as_deref(),
            CompilationError::InvalidLocals(_) => None,
        }
    }
}

/// Evaluation of an embedded expression or code line failed while rendering.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("`{0}` is not defined")]
    Undefined(String),

    #[error("cannot read property `{property}` of {target}")]
    PropertyOfNothing {
        property: String,
        target: &'static str,
    },

    #[error("cannot set property `{property}` of {target}")]
    AssignToNothing {
        property: String,
        target: &'static str,
    },

    #[error("`{0}` is not a function")]
    NotCallable(String),

    #[error("assignment to constant variable `{0}`")]
    ConstAssignment(String),

    #[error("{0}")]
    Type(String),

    #[error("maximum call depth of {0} exceeded")]
    CallDepth(usize),

    #[error("context cannot be converted to data: {0}")]
    Context(String),
}

/// Umbrella error for operations that read a template before compiling it.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_display_includes_position() {
        let error = CompilationError::Syntax {
            message: "unexpected `)`".to_string(),
            line: 3,
            column: 14,
            program: None,
        };
        assert_eq!(
            error.to_string(),
            "syntax error at line 3, column 14: unexpected `)`"
        );
    }

    #[test]
    fn with_program_only_touches_syntax_errors() {
        let error = CompilationError::Syntax {
            message: "oops".to_string(),
            line: 1,
            column: 1,
            program: None,
        }
        .with_program("return 1;");
        assert_eq!(error.program(), Some("return 1;"));

        let error = CompilationError::InvalidLocals("1x".to_string()).with_program("x");
        assert_eq!(error.program(), None);
    }

    #[test]
    fn read_error_names_the_path() {
        let error = ReadError {
            path: PathBuf::from("missing.md"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(error.to_string().starts_with("failed to read template missing.md"));
    }
}
