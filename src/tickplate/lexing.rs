//! Line lexing for templates
//!
//! Templates are processed one line at a time. Each line is classified by
//! [`line_classification::classify_line`]; the only state carried between lines is whether a
//! fence is currently open, which [`LineClassifier`] tracks.

pub mod line_classification;

pub use line_classification::{
    classify_line, indentation_prefix, strip_ignore_marker, LineType, FENCE_MARKER, IGNORE_MARKER,
    INDENT, NOOP_MARKER,
};

use serde::Serialize;

/// One template line together with its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedLine<'a> {
    pub number: usize,
    pub line_type: LineType,
    pub text: &'a str,
}

/// Stateful classifier that threads the fence flag through consecutive lines.
#[derive(Debug, Clone, Default)]
pub struct LineClassifier {
    inside_fence: bool,
}

impl LineClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify the next line, toggling the fence state on delimiters.
    pub fn classify(&mut self, line: &str) -> LineType {
        let (line_type, inside_fence) = classify_line(line, self.inside_fence);
        self.inside_fence = inside_fence;
        line_type
    }

    pub fn inside_fence(&self) -> bool {
        self.inside_fence
    }
}

/// Classify every line of a template, numbering lines from 1.
pub fn classify_lines(template: &str) -> Vec<ClassifiedLine<'_>> {
    let mut classifier = LineClassifier::new();
    template
        .split('\n')
        .enumerate()
        .map(|(index, text)| ClassifiedLine {
            number: index + 1,
            line_type: classifier.classify(text),
            text,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_lines_tracks_fences() {
        let template = "```\n    code inside\n```\n    code outside";
        let types: Vec<LineType> = classify_lines(template)
            .into_iter()
            .map(|line| line.line_type)
            .collect();
        assert_eq!(
            types,
            vec![
                LineType::FenceDelimiter,
                LineType::StaticLine,
                LineType::FenceDelimiter,
                LineType::CodeLine,
            ]
        );
    }

    #[test]
    fn test_unterminated_fence_keeps_everything_static() {
        let mut classifier = LineClassifier::new();
        assert_eq!(classifier.classify("```js"), LineType::FenceDelimiter);
        assert!(classifier.inside_fence());
        assert_eq!(classifier.classify("    let x = 1;"), LineType::StaticLine);
        assert_eq!(classifier.classify("`-`"), LineType::StaticLine);
        assert_eq!(classifier.classify(""), LineType::StaticLine);
        assert!(classifier.inside_fence());
    }

    #[test]
    fn test_line_numbers_start_at_one() {
        let lines = classify_lines("a\nb");
        assert_eq!(lines[0].number, 1);
        assert_eq!(lines[1].number, 2);
        assert_eq!(lines[1].text, "b");
    }
}
