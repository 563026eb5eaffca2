//! End-to-end tests: template text in, rendered text out

use rstest::rstest;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tickplate::{assemble, compile, compile_file, CompilationError, Error, Options, RenderError};

fn render(template: &str, data: serde_json::Value) -> String {
    compile(template, &Options::default())
        .expect("template to compile")
        .render(&data)
        .expect("template to render")
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[rstest]
#[case::inline_expression("Hello, `name`!", "Hello, Bob!")]
#[case::ignored_inline_span("`!literal`", "`literal`")]
#[case::ignored_code_line("    !doSomething()", "    doSomething()")]
#[case::noop_removes_previous_line("a\nb\n`-`\nc", "a\nc")]
#[case::consecutive_noops("a\nb\n`-`\n`-`\nc", "c")]
#[case::single_blank_after_code_dropped("    const x = 1;\n\n\ntext", "\ntext")]
#[case::blank_after_noop_dropped("a\nb\n`-`\n\nc", "a\nc")]
#[case::escaped_backtick("a \\` b", "a ` b")]
#[case::dollar_brace_is_text("cost: ${price}", "cost: ${price}")]
#[case::backslashes_survive("C:\\temp\\new", "C:\\temp\\new")]
#[case::fenced_lines_verbatim("```\n`name`\n    code\n`-`\n```", "```\n`name`\n    code\n`-`\n```")]
#[case::unterminated_fence_is_verbatim("```\n    let x = 1;\n`-`", "```\n    let x = 1;\n`-`")]
#[case::expression_with_string("`name + '!'`", "Bob!")]
#[case::backslash_inside_expression("`'C:\\temp'`", "C:\\temp")]
fn renders(#[case] template: &str, #[case] expected: &str) {
    assert_eq!(render(template, json!({"name": "Bob"})), expected);
}

#[test]
fn static_only_template_is_verbatim() {
    let template = "# Title\n\nSome *markdown* text.\n\n- one\n- two\n";
    assert_eq!(render(template, json!({})), template);
}

#[test]
fn loops_and_conditionals() {
    let template = "\
Items:
    for (let i = 1; i <= items.length; i++) {
`i`. `items[i - 1]`
    }
    if (freeShipping) {
Free shipping!
    } else {
Shipping: `cost`
    }";
    let data = json!({"items": ["scissors", "paper", "rock"], "freeShipping": true});
    assert_eq!(
        render(template, data),
        "Items:\n1. scissors\n2. paper\n3. rock\nFree shipping!"
    );
}

#[test]
fn code_lines_can_define_helpers() {
    let template = "    function money(n) { return '$' + n.toFixed(2) }\nTotal: `money(total)`";
    assert_eq!(render(template, json!({"total": 3.5})), "Total: $3.50");
}

#[test]
fn program_text() {
    let program = assemble(
        "Hello, `name`!\n    for (const item of items) {\n- `item`\n    }",
        &Options::default(),
    );
    insta::assert_snapshot!(program, @r###"
const __ = [];
function __append (s) {
    __.push(s);
}
function __result () {
    return __.join('\n');
}
with (locals) {
    __append(`Hello, ${name}!`);
    for (const item of items) {
        __append(`- ${item}`);
    }
}
return __result();
"###);
}

#[test]
fn without_with_bare_names_fail() {
    let options = Options {
        with_scope: false,
        ..Options::default()
    };
    let template = compile("Hello, `name`!", &options).unwrap();
    assert_eq!(
        template.render(&json!({"name": "Bob"})),
        Err(RenderError::Undefined("name".to_string()))
    );

    let template = compile("Hello, `locals.name`!", &options).unwrap();
    assert_eq!(template.render(&json!({"name": "Bob"})).unwrap(), "Hello, Bob!");
}

#[test]
fn custom_locals_name() {
    let options = Options {
        with_scope: false,
        locals: "ctx".to_string(),
        ..Options::default()
    };
    let template = compile("Hello, `ctx.name`!", &options).unwrap();
    assert_eq!(template.render(&json!({"name": "Bob"})).unwrap(), "Hello, Bob!");
}

#[test]
fn broken_inline_expression_is_a_compilation_error() {
    let error = compile("fine\n`1 +`", &Options::default()).unwrap_err();
    match error {
        CompilationError::Syntax { line, program, .. } => {
            // 8 prelude lines, then the append statement
            assert_eq!(line, 9);
            assert_eq!(program, None);
        }
        other => panic!("expected a syntax error, got {:?}", other),
    }
}

#[test]
fn broken_code_line_is_a_compilation_error() {
    assert!(matches!(
        compile("    if (x {", &Options::default()),
        Err(CompilationError::Syntax { .. })
    ));
}

#[test]
fn missing_field_is_a_render_error() {
    let template = compile("`missing.field`", &Options::default()).unwrap();
    assert_eq!(
        template.render(&json!({})),
        Err(RenderError::Undefined("missing".to_string()))
    );
}

#[test]
fn compile_file_missing_path() {
    let result = compile_file(fixture("does-not-exist.md"), &Options::default());
    assert!(matches!(result, Err(Error::Read(_))));
}

#[test]
fn compile_file_renders_fixture() {
    let template = compile_file(fixture("template.md"), &Options::default()).unwrap();
    let expected = std::fs::read_to_string(fixture("result.md")).unwrap();
    let data = json!({
        "name": "Bob",
        "items": ["scissors", "paper", "rock"],
        "freeShipping": true
    });
    assert_eq!(template.render(&data).unwrap(), expected);
}

#[test]
fn rendering_is_repeatable() {
    let template = compile(
        "    let count = 0;\n    for (const item of items) { count++; }\n`count` items",
        &Options::default(),
    )
    .unwrap();
    let data = json!({"items": [1, 2, 3]});
    let first = template.render(&data).unwrap();
    assert_eq!(first, "3 items");
    assert_eq!(template.render(&data).unwrap(), first);
}

#[test]
fn templates_render_concurrently() {
    let template = compile("Hello, `name`!", &Options::default()).unwrap();
    std::thread::scope(|scope| {
        let handles: Vec<_> = ["Ann", "Bob", "Cid"]
            .into_iter()
            .map(|name| {
                let template = &template;
                scope.spawn(move || template.render(&json!({ "name": name })).unwrap())
            })
            .collect();
        let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(outputs, vec!["Hello, Ann!", "Hello, Bob!", "Hello, Cid!"]);
    });
}

#[test]
fn render_serializable_context() {
    #[derive(Serialize)]
    struct Order {
        name: String,
        items: Vec<&'static str>,
    }
    let template = compile("`name`: `items.join(', ')`", &Options::default()).unwrap();
    let order = Order {
        name: "Bob".to_string(),
        items: vec!["paper", "rock"],
    };
    assert_eq!(template.render_serialize(&order).unwrap(), "Bob: paper, rock");
}
