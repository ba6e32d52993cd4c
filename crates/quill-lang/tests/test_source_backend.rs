use quill_lang::abi::Writer as _;
use quill_lang::{Engine, Value};
use rstest::{fixture, rstest};
use serde_json::json;

// Regenerate with `Engine::default().generate_source(..)` on `document()` when the emitter changes.
mod generated {
    include!("fixtures/guarded_loop_template.rs");
}

const GENERATED: &str = include_str!("fixtures/guarded_loop_template.rs");

fn document() -> serde_json::Value {
    json!({
        "n": {"statements": [
            ["de", "size", ["n"], null, {"statements": [["ev", 0]]}],
            ["de", "size", ["n"], ["gt", ["id", "n"], 2], {"statements": [["ev", 1]]}],
            ["fr", [["v", "k", ["id", "items"], null]],
                {"statements": [
                    ["op", ["id", "k"]],
                    ["op", ["ca", ["id", "size"], [["id", "v"]]]],
                    ["op", 3]
                ]},
                {"statements": [["op", 4]]}],
            ["us", [["id", "user"]], {"statements": [["op", ["fm", 5]]]}],
            ["op", ["or", ["mb", ["id", "user"], 6], 7]]
        ]},
        "l": ["small", "big", 2, ";", "empty", "Hi %name", "name", "anon"]
    })
}

#[fixture]
fn engine() -> Engine {
    Engine::default()
}

fn render_generated(engine: &Engine, data: &Value) -> String {
    let runtime = engine.runtime();
    let scope = runtime.globals().extend_from(std::slice::from_ref(data));
    let mut writer = runtime.string_writer();
    writer.start_render();
    generated::Template::new()
        .render(runtime, scope.clone(), &mut writer)
        .unwrap();
    scope.clear();
    writer.end_render()
}

#[rstest]
fn test_fixture_matches_emitter(engine: Engine) {
    let program = quill_lang::ast::decode(&document().to_string()).unwrap();
    let generated = engine.generate_source(&program).unwrap();
    assert_eq!(generated.source, GENERATED);
}

#[rstest]
#[case::guarded_partial_and_fallback(json!({"items": [1, 5], "user": {"name": "Ada"}}), Some("0small;1big;Hi AdaAda"))]
#[case::loop_else(json!({"items": [], "user": {"name": "Ada"}}), Some("emptyHi AdaAda"))]
#[case::missing_user(json!({"items": [3]}), None)]
#[case::object_keys(json!({"items": {"x": 0, "y": 9}, "user": {"name": "<b>"}}), None)]
fn test_generated_module_renders_like_closures(
    engine: Engine,
    #[case] data: serde_json::Value,
    #[case] expected: Option<&str>,
) {
    let template = engine.compile_json(&document().to_string()).unwrap();
    let data = Value::from_json(&data);

    let closures = engine.render(&template, &data).unwrap();
    let generated = render_generated(&engine, &data);
    assert_eq!(generated, closures);
    if let Some(expected) = expected {
        assert_eq!(closures, expected);
    }
}
