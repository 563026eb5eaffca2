//! Literal Builder
//!
//! Converts a run of static template lines into a single template literal of the script
//! language. Rendering the literal reproduces the lines joined by newlines, except that
//! single-backtick spans become live `${expr}` interpolations.
//!
//! Escaping is applied per line in an order that keeps the steps from re-triggering each other:
//!
//! 1. escaped backticks are parked behind a placeholder
//! 2. backslashes are doubled
//! 3. `${` is escaped so it cannot open an interpolation
//! 4. `` `expr` `` spans become `${expr}`
//! 5. `` `!expr` `` spans become the literal text `` `expr` ``
//! 6. remaining backticks are escaped
//! 7. the placeholder is restored as an escaped backtick
//!
//! Steps 2 and 3 cover the whole line, the expression inside a live span included, so
//! `` `'C:\temp'` `` renders a backslash. Fenced lines are verbatim and skip steps 4 and 5
//! entirely.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::tickplate::assembling::APPEND;
use crate::tickplate::lexing::{IGNORE_MARKER, INDENT};

/// Stands in for an escaped backtick while the line is rewritten.
const ESCAPED_TICK_TOKEN: &str = "\u{1F}";

const ESCAPED_TICK: &str = "\\`";

/// A backtick, at least one non-backtick character, then the nearest closing backtick.
static INLINE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`].*?)`").unwrap());

/// A static line waiting in the buffer for the next flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedLine {
    pub text: String,
    /// Copied byte for byte: inline spans are not interpreted.
    pub verbatim: bool,
}

impl BufferedLine {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            verbatim: false,
        }
    }

    pub fn verbatim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            verbatim: true,
        }
    }

    fn to_literal(&self) -> String {
        if self.verbatim {
            escape_text(&self.text)
        } else {
            to_template_literal_line(&self.text)
        }
    }
}

/// Escape text that must come out of the literal unchanged.
pub fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace("${", "\\${")
        .replace('`', ESCAPED_TICK)
}

/// Backslash and `${` escaping, as applied to the expression of a live span.
fn escape_expression(expr: &str) -> String {
    expr.replace('\\', "\\\\").replace("${", "\\${")
}

/// Rewrite one static line into template literal syntax.
pub fn to_template_literal_line(line: &str) -> String {
    let line = line.replace(ESCAPED_TICK, ESCAPED_TICK_TOKEN);

    let mut literal = String::with_capacity(line.len() + 8);
    let mut last = 0;
    for captures in INLINE_SPAN.captures_iter(&line) {
        let (Some(span), Some(inner)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        literal.push_str(&escape_text(&line[last..span.start()]));
        match inner.as_str().strip_prefix(IGNORE_MARKER) {
            Some(shown) => {
                literal.push_str(ESCAPED_TICK);
                literal.push_str(&escape_text(shown));
                literal.push_str(ESCAPED_TICK);
            }
            None => {
                literal.push_str("${");
                literal.push_str(&escape_expression(inner.as_str()));
                literal.push('}');
            }
        }
        last = span.end();
    }
    literal.push_str(&escape_text(&line[last..]));

    literal.replace(ESCAPED_TICK_TOKEN, ESCAPED_TICK)
}

/// Build one multi-line template literal, backticks included, from buffered lines.
pub fn template_literal(lines: &[BufferedLine]) -> String {
    let body: Vec<String> = lines.iter().map(BufferedLine::to_literal).collect();
    format!("`{}`", body.join("\n"))
}

/// The statement appending buffered lines to the output, aligned one level below `indentation`.
pub fn append_statement(lines: &[BufferedLine], indentation: &str) -> String {
    format!(
        "{}{}{}({});",
        indentation,
        INDENT,
        APPEND,
        template_literal(lines)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_unchanged() {
        assert_eq!(to_template_literal_line("Hello world"), "Hello world");
    }

    #[test]
    fn test_inline_span_becomes_interpolation() {
        assert_eq!(
            to_template_literal_line("Hello, `name`!"),
            "Hello, ${name}!"
        );
        assert_eq!(
            to_template_literal_line("`a` and `b.c`"),
            "${a} and ${b.c}"
        );
    }

    #[test]
    fn test_ignored_span_stays_literal() {
        assert_eq!(to_template_literal_line("`!literal`"), "\\`literal\\`");
    }

    #[test]
    fn test_backslashes_and_placeholders_are_escaped() {
        assert_eq!(to_template_literal_line(r"c:\temp"), r"c:\\temp");
        assert_eq!(to_template_literal_line("${ciao}"), "\\${ciao}");
    }

    #[test]
    fn test_escaped_backtick_is_not_a_span() {
        assert_eq!(to_template_literal_line(r"verita\`"), r"verita\`");
        assert_eq!(to_template_literal_line(r"\`x\`"), r"\`x\`");
    }

    #[test]
    fn test_lone_and_double_backticks_are_escaped() {
        assert_eq!(to_template_literal_line("a ` b"), "a \\` b");
        assert_eq!(to_template_literal_line("``"), "\\`\\`");
        assert_eq!(to_template_literal_line("```js"), "\\`\\`\\`js");
    }

    #[test]
    fn test_span_expression_is_escaped() {
        assert_eq!(
            to_template_literal_line(r"`items.join('\n')`"),
            r"${items.join('\\n')}"
        );
        assert_eq!(to_template_literal_line(r"`'C:\temp'`"), r"${'C:\\temp'}");
    }

    #[test]
    fn test_mixed_line() {
        let line = r"abc ${ciao}, `!miao`, c:\temp, `codice`, verita\`";
        assert_eq!(
            to_template_literal_line(line),
            r"abc \${ciao}, \`miao\`, c:\\temp, ${codice}, verita\`"
        );
    }

    #[test]
    fn test_append_statement_alignment() {
        let lines = [BufferedLine::text("one"), BufferedLine::text("two")];
        assert_eq!(
            append_statement(&lines, "    "),
            "        __append(`one\ntwo`);"
        );
        assert_eq!(
            append_statement(&[BufferedLine::text("")], ""),
            "    __append(``);"
        );
    }

    #[test]
    fn test_verbatim_lines_keep_spans() {
        let lines = [
            BufferedLine::verbatim("```"),
            BufferedLine::verbatim("`name` ${x}"),
            BufferedLine::text("`name`"),
        ];
        assert_eq!(
            template_literal(&lines),
            "`\\`\\`\\`\n\\`name\\` \\${x}\n${name}`"
        );
    }
}
