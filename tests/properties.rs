//! Property-based tests for template compilation
//!
//! Generated templates contain only static text (no code lines, noop lines, fences or inline
//! markers), but do include the characters the literal builder has to escape.

use proptest::prelude::*;
use serde_json::json;
use tickplate::{compile, Options};

/// A line of prose, possibly with backslashes, `${` sequences and quotes.
fn static_line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[a-zA-Z0-9 ,.!?#*:;()'\"-]{1,30}",
        "[a-z ]{0,8}\\$\\{[a-z]{1,5}\\}[a-z ]{0,8}",
        "[a-z ]{0,8}\\\\[a-z\\\\]{0,5}",
    ]
    .prop_filter("indented lines are code", |line| !line.starts_with("    "))
}

fn static_template_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(static_line_strategy(), 1..12).prop_map(|lines| lines.join("\n"))
}

proptest! {
    #[test]
    fn static_templates_render_verbatim(template in static_template_strategy()) {
        for options in [Options::default(), Options { with_scope: false, ..Options::default() }] {
            let compiled = compile(&template, &options).unwrap();
            prop_assert_eq!(compiled.render(&json!({})).unwrap(), template.clone());
        }
    }

    #[test]
    fn rendering_is_deterministic(template in static_template_strategy(), name in "[a-z]{1,8}") {
        let template = format!("{}\nHello, `name`!", template);
        let compiled = compile(&template, &Options::default()).unwrap();
        let data = json!({ "name": name });
        let first = compiled.render(&data).unwrap();
        prop_assert_eq!(compiled.render(&data).unwrap(), first.clone());
        prop_assert_eq!(compile(&template, &Options::default()).unwrap().render(&data).unwrap(), first);
    }

    #[test]
    fn noop_removes_exactly_one_line(
        lines in prop::collection::vec("[a-z][a-z ]{0,10}", 1..8),
        tail in "[a-z][a-z ]{0,10}",
    ) {
        let template = format!("{}\n`-`\n{}", lines.join("\n"), tail);
        let compiled = compile(&template, &Options::default()).unwrap();
        let mut expected = lines[..lines.len() - 1].to_vec();
        expected.push(tail);
        prop_assert_eq!(compiled.render(&json!({})).unwrap(), expected.join("\n"));
    }
}
