//! Line Classification
//!
//! Core classification logic for determining the type of a template line.
//! Classification follows this specific order (important for correctness):
//! 1. Fence delimiters (lines starting with three backticks) toggle the fence
//! 2. Anything inside an open fence is static, verbatim
//! 3. Indented lines are code, unless their content starts with the ignore marker
//! 4. Indented lines starting with the ignore marker are ignored code
//! 5. The exact no-op marker
//! 6. Empty lines
//! 7. Default to static text

use serde::Serialize;

/// One level of indentation marks a code line.
pub const INDENT: &str = "    ";

/// Prefix that turns an indented line or an inline span back into plain text.
pub const IGNORE_MARKER: char = '!';

/// A line consisting of exactly this token removes the previous static line.
pub const NOOP_MARKER: &str = "`-`";

pub const FENCE_MARKER: &str = "```";

/// The classification of a template line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LineType {
    /// Indented line copied verbatim into the program
    CodeLine,

    /// Indented line starting with the ignore marker, rendered as text without the marker
    IgnoredCodeLine,

    /// Triple-backtick line opening or closing a verbatim block
    FenceDelimiter,

    /// The no-op marker on its own line
    NoopLine,

    /// Empty line
    BlankLine,

    /// Any other line (output text)
    StaticLine,
}

/// Classify `line` given whether a fence is open before it.
///
/// Returns the classification and the fence state after the line.
pub fn classify_line(line: &str, inside_fence: bool) -> (LineType, bool) {
    if is_fence(line) {
        return (LineType::FenceDelimiter, !inside_fence);
    }

    if inside_fence {
        return (LineType::StaticLine, inside_fence);
    }

    let line_type = if is_code(line) {
        LineType::CodeLine
    } else if is_ignored_code(line) {
        LineType::IgnoredCodeLine
    } else if is_noop(line) {
        LineType::NoopLine
    } else if is_blank(line) {
        LineType::BlankLine
    } else {
        LineType::StaticLine
    };
    (line_type, inside_fence)
}

fn is_fence(line: &str) -> bool {
    line.starts_with(FENCE_MARKER)
}

fn is_code(line: &str) -> bool {
    line.starts_with(INDENT) && !line.trim().starts_with(IGNORE_MARKER)
}

fn is_ignored_code(line: &str) -> bool {
    line.starts_with(INDENT) && line.trim().starts_with(IGNORE_MARKER)
}

fn is_noop(line: &str) -> bool {
    line == NOOP_MARKER
}

fn is_blank(line: &str) -> bool {
    line.is_empty()
}

/// Remove the first occurrence of the ignore marker, keeping the indentation.
pub fn strip_ignore_marker(line: &str) -> String {
    line.replacen(IGNORE_MARKER, "", 1)
}

/// Leading spaces of a code line, used to align the statements generated after it.
///
/// A line that only closes a block (`}`) aligns one level shallower, with the block it closes.
pub fn indentation_prefix(line: &str) -> String {
    let mut count = line.len() - line.trim_start_matches(' ').len();
    if &line[count..] == "}" {
        count = count.saturating_sub(INDENT.len());
    }
    " ".repeat(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(line: &str) -> LineType {
        classify_line(line, false).0
    }

    #[test]
    fn test_classify_code_line() {
        assert_eq!(classify("    for (const item of items) {"), LineType::CodeLine);
        assert_eq!(classify("        }"), LineType::CodeLine);
    }

    #[test]
    fn test_classify_ignored_code_line() {
        assert_eq!(classify("    !doSomething()"), LineType::IgnoredCodeLine);
        assert_eq!(classify("      !  spaced()"), LineType::IgnoredCodeLine);
    }

    #[test]
    fn test_classify_short_indentation_is_static() {
        assert_eq!(classify("   three spaces"), LineType::StaticLine);
        assert_eq!(classify("\tTabbed"), LineType::StaticLine);
        assert_eq!(classify("!not indented"), LineType::StaticLine);
    }

    #[test]
    fn test_classify_noop_and_blank() {
        assert_eq!(classify("`-`"), LineType::NoopLine);
        assert_eq!(classify("`-` "), LineType::StaticLine);
        assert_eq!(classify(""), LineType::BlankLine);
        assert_eq!(classify(" "), LineType::StaticLine);
    }

    #[test]
    fn test_fence_toggles_state() {
        assert_eq!(
            classify_line("```rust", false),
            (LineType::FenceDelimiter, true)
        );
        assert_eq!(classify_line("```", true), (LineType::FenceDelimiter, false));
    }

    #[test]
    fn test_inside_fence_overrides_markers() {
        for line in ["    code()", "    !ignored", "`-`", "", "text"] {
            assert_eq!(classify_line(line, true), (LineType::StaticLine, true));
        }
    }

    #[test]
    fn test_strip_ignore_marker_first_occurrence_only() {
        assert_eq!(strip_ignore_marker("    !doSomething()!"), "    doSomething()!");
    }

    #[test]
    fn test_indentation_prefix() {
        assert_eq!(indentation_prefix("    if (x) {"), "    ");
        assert_eq!(indentation_prefix("        total += 1;"), "        ");
        assert_eq!(indentation_prefix("    }"), "");
        assert_eq!(indentation_prefix("        }"), "    ");
        assert_eq!(indentation_prefix("    } else {"), "    ");
        assert_eq!(indentation_prefix("}"), "");
    }
}
