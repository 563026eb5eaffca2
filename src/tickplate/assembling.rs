//! Code Stream Assembler
//!
//! Scans a template line by line and builds the program text. Static lines are buffered and
//! flushed as one append statement whenever a code line interrupts them; code lines are copied
//! into the program verbatim. The generated program is the body of a function taking the
//! context as its single parameter:
//!
//! ```text
//! const __ = [];
//! function __append (s) {
//!     __.push(s);
//! }
//! function __result () {
//!     return __.join('\n');
//! }
//! with (locals) {
//!     __append(`Hello, ${name}!`);
//! }
//! return __result();
//! ```

use tracing::trace;

use crate::tickplate::engine::Options;
use crate::tickplate::lexing::{
    classify_line, indentation_prefix, strip_ignore_marker, LineType, INDENT,
};
use crate::tickplate::literal::{append_statement, BufferedLine};

/// Output accumulator declared by the program prelude.
pub const OUTPUT: &str = "__";

/// Helper pushing one rendered chunk onto the accumulator.
pub const APPEND: &str = "__append";

/// Helper joining the accumulator into the final text.
pub const RESULT: &str = "__result";

/// Per-compilation scan state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// A fence has been opened and not yet closed.
    pub inside_fence: bool,
    /// The next blank line belongs to the preceding code or noop line and is swallowed.
    pub drop_next_blank_line: bool,
    /// Indentation of the most recent code line.
    pub indentation: String,
}

/// The generated program, one entry per statement or verbatim code line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    statements: Vec<String>,
}

impl Program {
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// The complete program text.
    pub fn text(&self) -> String {
        self.statements.join("\n")
    }
}

/// Builds a [`Program`] from template lines.
#[derive(Debug)]
pub struct Assembler<'o> {
    options: &'o Options,
    state: SessionState,
    static_lines: Vec<BufferedLine>,
    program: Program,
}

impl<'o> Assembler<'o> {
    /// Start a program: the accumulator, its helpers and, when enabled, the context scope.
    pub fn new(options: &'o Options) -> Self {
        let mut statements = vec![
            format!("const {OUTPUT} = [];"),
            format!("function {APPEND} (s) {{\n{INDENT}{OUTPUT}.push(s);\n}}"),
            format!("function {RESULT} () {{\n{INDENT}return {OUTPUT}.join('\\n');\n}}"),
        ];
        if options.with_scope {
            statements.push(format!("with ({}) {{", options.locals));
        }
        Self {
            options,
            state: SessionState::default(),
            static_lines: Vec::new(),
            program: Program { statements },
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Consume one template line.
    pub fn push_line(&mut self, line: &str) {
        let (line_type, inside_fence) = classify_line(line, self.state.inside_fence);
        self.state.inside_fence = inside_fence;
        trace!(?line_type, line, "classified template line");

        match line_type {
            LineType::FenceDelimiter => {
                self.static_lines.push(BufferedLine::verbatim(line));
            }
            LineType::StaticLine if inside_fence => {
                self.static_lines.push(BufferedLine::verbatim(line));
            }
            LineType::StaticLine => {
                self.static_lines.push(BufferedLine::text(line));
            }
            LineType::CodeLine => {
                self.flush();
                self.program.statements.push(line.to_string());
                self.state.indentation = indentation_prefix(line);
                self.state.drop_next_blank_line = true;
            }
            LineType::IgnoredCodeLine => {
                self.static_lines.push(BufferedLine::text(strip_ignore_marker(line)));
            }
            LineType::NoopLine => {
                self.static_lines.pop();
                self.state.drop_next_blank_line = true;
            }
            LineType::BlankLine => {
                if self.state.drop_next_blank_line {
                    self.state.drop_next_blank_line = false;
                } else {
                    self.static_lines.push(BufferedLine::text(""));
                }
            }
        }
    }

    /// Emit buffered static lines as a single append statement.
    fn flush(&mut self) {
        if self.static_lines.is_empty() {
            return;
        }
        let statement = append_statement(&self.static_lines, &self.state.indentation);
        self.program.statements.push(statement);
        self.static_lines.clear();
    }

    /// Flush what is left, close the context scope and return the joined output.
    pub fn finish(mut self) -> Program {
        self.flush();
        if self.options.with_scope {
            self.program.statements.push("}".to_string());
        }
        self.program.statements.push(format!("return {RESULT}();"));
        self.program
    }
}

/// Assemble the program for a whole template.
pub fn assemble_program(template: &str, options: &Options) -> Program {
    let mut assembler = Assembler::new(options);
    for line in template.split('\n') {
        assembler.push_line(line);
    }
    assembler.finish()
}
