use quill_lang::{Engine, Value};
use serde_json::json;

fn main() {
    divan::main();
}

fn list_template() -> String {
    json!({
        "n": {"statements": [
            ["oe", 0, null, false],
            ["fr", [["item", null, ["id", "items"], ["nq", ["mb", ["id", "item"], 1], 2]]], {"statements": [
                ["oe", 3, ["dc", [[4, ["mb", ["id", "item"], 5]]]], false],
                ["op", ["fm", 6, ["id", "item"]]],
                ["ce", 3]
            ]}, {"statements": [["op", 7]]}],
            ["ce", 0]
        ]},
        "l": ["ul", "hidden", true, "li", "class", "kind", "%name (%count)", "empty"]
    })
    .to_string()
}

fn items(n: usize) -> Value {
    let items = (0..n)
        .map(|i| json!({"name": format!("item {i}"), "count": i, "kind": "a<b", "hidden": i % 7 == 0}))
        .collect::<Vec<_>>();
    Value::from_json(&json!({ "items": items }))
}

#[divan::bench]
fn compile_list() -> quill_lang::Template {
    let engine = Engine::default();
    engine.compile_json(&list_template()).unwrap()
}

#[divan::bench(args = [10, 1_000])]
fn render_list(bencher: divan::Bencher, n: usize) {
    let engine = Engine::default();
    let template = engine.compile_json(&list_template()).unwrap();
    let data = items(n);
    bencher.bench_local(|| engine.render(&template, &data).unwrap());
}

#[divan::bench(args = [15])]
fn render_recursive_partial(bencher: divan::Bencher, n: usize) {
    let engine = Engine::default();
    let template = engine
        .compile_json(
            &json!({
                "n": {"statements": [
                    ["de", "fib", ["x"], null, {"statements": [["ev", ["ad",
                        ["ca", ["id", "fib"], [["su", ["id", "x"], 1]]],
                        ["ca", ["id", "fib"], [["su", ["id", "x"], 0]]]
                    ]]]}],
                    ["de", "fib", ["x"], ["lt", ["id", "x"], 0], {"statements": [["ev", ["id", "x"]]]}],
                    ["op", ["ca", ["id", "fib"], [["id", "n"]]]]
                ]},
                "l": [2, 1]
            })
            .to_string(),
        )
        .unwrap();
    let data = Value::from_json(&json!({ "n": n }));
    bencher.bench_local(|| engine.render(&template, &data).unwrap());
}

#[divan::bench]
fn generate_source() -> String {
    let engine = Engine::default();
    let program = quill_lang::ast::decode(&list_template()).unwrap();
    engine.generate_source(&program).unwrap().source
}
