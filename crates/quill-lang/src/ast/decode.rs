//! Decoding of the front end's `{ "n": node, "l": [literal...] }` documents.

use super::Program;
use super::error::DecodeError;
use super::node::{
    ForLoop, ImportSpec, Node, NodeRef, PartialDef, Range, ScopeId, Symbol, SymbolKind, statements,
};
use crate::literal::{LiteralId, LiteralTable};
use crate::runtime::ops::{BinaryOp, UnaryOp};
use crate::value::{Name, Value};
use serde_json::Value as Json;
use std::rc::Rc;

/// Parses and decodes a JSON document.
pub fn decode(json: &str) -> Result<Program, DecodeError> {
    let doc: Json = serde_json::from_str(json)?;
    decode_value(&doc)
}

/// Decodes an already parsed JSON document.
///
/// Wire literal ids are remapped onto a deduplicated [`LiteralTable`], and every scope
/// boundary (partial, loop, `using` block) receives a fresh [`ScopeId`].
pub fn decode_value(doc: &Json) -> Result<Program, DecodeError> {
    let Json::Object(doc) = doc else {
        return Err(DecodeError::Json("expected an object with \"n\" and \"l\"".to_string()));
    };

    let mut decoder = Decoder::default();
    match doc.get("l") {
        Some(Json::Array(literals)) => {
            for literal in literals {
                let id = decoder.literals.insert(Value::from_json(literal));
                decoder.ids.push(id);
            }
        }
        Some(Json::Null) | None => {}
        Some(_) => return Err(DecodeError::Json("\"l\" must be an array".to_string())),
    }

    let root = doc
        .get("n")
        .ok_or_else(|| DecodeError::Json("missing \"n\"".to_string()))?;
    let root = decoder.node(root)?;

    tracing::debug!(
        literals = decoder.literals.len(),
        scopes = decoder.next_scope,
        "parse tree decoded"
    );
    Ok(Program::new(root, decoder.literals))
}

#[derive(Default)]
struct Decoder {
    literals: LiteralTable,
    ids: Vec<LiteralId>,
    next_scope: u32,
}

impl Decoder {
    fn scope(&mut self) -> ScopeId {
        self.next_scope += 1;
        ScopeId(self.next_scope)
    }

    fn literal(&self, json: &Json) -> Result<LiteralId, DecodeError> {
        let index = json.as_u64().ok_or_else(|| DecodeError::InvalidNode(abbreviate(json)))?;
        usize::try_from(index)
            .ok()
            .and_then(|i| self.ids.get(i).copied())
            .ok_or(DecodeError::InvalidLiteral(index))
    }

    fn node(&mut self, json: &Json) -> Result<NodeRef, DecodeError> {
        match json {
            Json::Number(_) => Ok(Rc::new(Node::Literal(self.literal(json)?))),
            Json::Object(map) => match map.get("statements") {
                Some(Json::Array(items)) => Ok(statements(self.nodes(items)?)),
                _ => Err(DecodeError::InvalidNode(abbreviate(json))),
            },
            Json::Array(items) => {
                let (tag, operands) = items
                    .split_first()
                    .ok_or_else(|| DecodeError::InvalidNode(abbreviate(json)))?;
                let tag = symbol(tag, SymbolKind::Operator)
                    .ok_or_else(|| DecodeError::InvalidNode(abbreviate(json)))?;
                self.tagged(&tag, Operands::new(&tag.value, operands))
                    .map(Rc::new)
            }
            _ => Err(DecodeError::InvalidNode(abbreviate(json))),
        }
    }

    fn nodes(&mut self, items: &[Json]) -> Result<Vec<NodeRef>, DecodeError> {
        items.iter().map(|item| self.node(item)).collect()
    }

    fn optional(&mut self, json: Option<&Json>) -> Result<Option<NodeRef>, DecodeError> {
        json.map(|j| self.node(j)).transpose()
    }

    /// A module name: either a literal id of a string or a bare name.
    fn module_name(&self, tag: &str, json: &Json) -> Result<Name, DecodeError> {
        match json {
            Json::Number(_) => match &self.literals[self.literal(json)?] {
                Value::String(s) => Ok(s.clone()),
                other => Err(DecodeError::operand(
                    tag,
                    format!("module name must be a string, got {}", other.type_name()),
                )),
            },
            json => symbol(json, SymbolKind::Literal)
                .map(|s| s.value)
                .ok_or_else(|| DecodeError::operand(tag, "expected a module name")),
        }
    }

    fn tagged(&mut self, tag: &Symbol, args: Operands<'_>) -> Result<Node, DecodeError> {
        if let Some(op) = BinaryOp::from_tag(&tag.value) {
            return Ok(Node::Binary(op, self.node(args.get(0)?)?, self.node(args.get(1)?)?));
        }
        if let Some(op) = UnaryOp::from_tag(&tag.value) {
            return Ok(Node::Unary(op, self.node(args.get(0)?)?));
        }

        Ok(match tag.value.as_str() {
            "id" => Node::Ident(args.name(0)?),
            "se" => Node::SelfRef,
            "ar" => Node::Array(self.nodes(args.list(0)?)?),
            "dc" => {
                let mut entries = Vec::new();
                for entry in args.entries(0)? {
                    entries.push((self.node(entry.get(0)?)?, self.node(entry.get(1)?)?));
                }
                Node::Dict(entries)
            }
            "mb" => Node::Member {
                object: self.node(args.get(0)?)?,
                property: self.node(args.get(1)?)?,
            },
            "ca" => Node::Call {
                target: self.node(args.get(0)?)?,
                args: self.nodes(args.list(1)?)?,
            },
            "bi" => Node::Bind {
                target: self.node(args.get(0)?)?,
                args: self.nodes(args.list(1)?)?,
            },
            "fm" => {
                let format = self.node(args.get(0)?)?;
                let data = self.optional(args.opt(1))?;
                Node::Format {
                    format,
                    auto: tag.kind == SymbolKind::AutoInterpolated || data.is_none(),
                    data: data.unwrap_or_else(|| Rc::new(Node::SelfRef)),
                }
            }
            "cn" => Node::Conditional {
                cond: self.node(args.get(0)?)?,
                then: self.node(args.get(1)?)?,
                otherwise: self.node(args.get(2)?)?,
            },
            "or" => Node::Or(self.node(args.get(0)?)?, self.node(args.get(1)?)?),
            "an" => Node::And(self.node(args.get(0)?)?, self.node(args.get(1)?)?),
            "ev" => Node::Expression(self.node(args.get(0)?)?),
            "as" => {
                let mut bindings = Vec::new();
                for entry in args.entries(0)? {
                    bindings.push((entry.name(0)?, self.node(entry.get(1)?)?));
                }
                Node::Assign(bindings)
            }
            "de" => {
                let id = self.scope();
                let name = args.name(0)?;
                let params = args
                    .list(1)?
                    .iter()
                    .map(|p| {
                        symbol(p, SymbolKind::Identifier)
                            .map(|s| s.value)
                            .ok_or_else(|| DecodeError::operand("de", "parameter must be a name"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let guard = self.optional(args.opt(2))?;
                let body = self.node(args.get(3)?)?;
                Node::Partial(Rc::new(PartialDef {
                    id,
                    name,
                    params,
                    guard,
                    body,
                    delegates: false,
                }))
            }
            "fr" => {
                let id = self.scope();
                let mut ranges = Vec::new();
                for range in args.entries(0)? {
                    ranges.push(Range {
                        value: range.name(0)?,
                        key: range.opt_name(1)?,
                        collection: self.node(range.get(2)?)?,
                        guard: self.optional(range.opt(3))?,
                    });
                }
                if ranges.is_empty() {
                    return Err(DecodeError::operand("fr", "a loop needs at least one range"));
                }
                Node::For(Rc::new(ForLoop {
                    id,
                    ranges,
                    body: self.node(args.get(1)?)?,
                    otherwise: self.optional(args.opt(2))?,
                }))
            }
            "if" => Node::If {
                cond: self.node(args.get(0)?)?,
                then: self.node(args.get(1)?)?,
                otherwise: self.optional(args.opt(2))?,
            },
            "us" => {
                let id = self.scope();
                Node::Using {
                    id,
                    exprs: self.nodes(args.list(0)?)?,
                    body: self.node(args.get(1)?)?,
                }
            }
            "op" => Node::Output(self.node(args.get(0)?)?),
            "ra" => match args.get(0)? {
                Json::String(s) => Node::Raw(s.as_str().into()),
                json => Node::Raw(self.literals[self.literal(json)?].to_string().into()),
            },
            "oe" => Node::OpenTag {
                name: self.node(args.get(0)?)?,
                attrs: self.optional(args.opt(1))?,
                self_close: args.flag(2),
            },
            "ce" => Node::CloseTag(self.node(args.get(0)?)?),
            "ct" => Node::Comment(self.node(args.get(0)?)?),
            "dt" => Node::DocType(self.node(args.get(0)?)?),
            "im" => {
                let mut specs = Vec::new();
                for entry in args.entries(0)? {
                    specs.push(ImportSpec {
                        module: self.module_name("im", entry.get(0)?)?,
                        alias: entry.opt_name(1)?,
                    });
                }
                Node::Import(specs)
            }
            "mi" => {
                let module = self.module_name("mi", args.get(0)?)?;
                let mut names = Vec::new();
                for entry in args.entries(1)? {
                    names.push((entry.name(0)?, entry.opt_name(1)?));
                }
                Node::FromImport { module, names }
            }
            other => return Err(DecodeError::InvalidNode(format!("unknown tag \"{other}\""))),
        })
    }
}

/// Positional operand access with errors naming the opcode.
#[derive(Clone, Copy)]
struct Operands<'a> {
    tag: &'a str,
    items: &'a [Json],
}

impl<'a> Operands<'a> {
    fn new(tag: &'a str, items: &'a [Json]) -> Self {
        Self { tag, items }
    }

    fn get(&self, index: usize) -> Result<&'a Json, DecodeError> {
        self.items
            .get(index)
            .ok_or_else(|| DecodeError::operand(self.tag, format!("missing operand {index}")))
    }

    /// An operand that may be absent or `null`.
    fn opt(&self, index: usize) -> Option<&'a Json> {
        self.items.get(index).filter(|j| !j.is_null())
    }

    fn list(&self, index: usize) -> Result<&'a [Json], DecodeError> {
        match self.get(index)? {
            Json::Array(items) => Ok(items),
            _ => Err(DecodeError::operand(self.tag, format!("operand {index} must be a list"))),
        }
    }

    /// A list of tuples, each itself a list of operands.
    fn entries(&self, index: usize) -> Result<Vec<Operands<'a>>, DecodeError> {
        self.list(index)?
            .iter()
            .map(|entry| match entry {
                Json::Array(items) => Ok(Operands::new(self.tag, items)),
                _ => Err(DecodeError::operand(self.tag, format!("operand {index} must be a list of tuples"))),
            })
            .collect()
    }

    fn name(&self, index: usize) -> Result<Name, DecodeError> {
        symbol(self.get(index)?, SymbolKind::Identifier)
            .map(|s| s.value)
            .ok_or_else(|| DecodeError::operand(self.tag, format!("operand {index} must be a name")))
    }

    fn opt_name(&self, index: usize) -> Result<Option<Name>, DecodeError> {
        match self.opt(index) {
            Some(_) => self.name(index).map(Some),
            None => Ok(None),
        }
    }

    fn flag(&self, index: usize) -> bool {
        self.items.get(index).and_then(Json::as_bool).unwrap_or(false)
    }
}

/// Reads a bare string or a `{ "value", "kind" }` symbol object.
fn symbol(json: &Json, default_kind: SymbolKind) -> Option<Symbol> {
    match json {
        Json::String(s) => Some(Symbol {
            value: s.as_str().into(),
            kind: default_kind,
        }),
        Json::Object(map) => {
            let value = map.get("value")?.as_str()?;
            let kind = match map.get("kind").and_then(Json::as_str) {
                Some("operator") => SymbolKind::Operator,
                Some("identifier") => SymbolKind::Identifier,
                Some("literal") => SymbolKind::Literal,
                Some("auto-interpolated") => SymbolKind::AutoInterpolated,
                _ => default_kind,
            };
            Some(Symbol {
                value: value.into(),
                kind,
            })
        }
        _ => None,
    }
}

fn abbreviate(json: &Json) -> String {
    const MAX: usize = 48;
    let text = json.to_string();
    if text.chars().count() > MAX {
        format!("{}...", text.chars().take(MAX).collect::<String>())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_decode_output_of_literal() {
        let program = decode_value(&json!({
            "n": {"statements": [["op", 0], ["ra", 1]]},
            "l": ["Hello", "<br>"]
        }))
        .unwrap();

        let Node::Statements(items) = &*program.root else {
            panic!("expected statements, got {:?}", program.root);
        };
        assert_eq!(items.len(), 2);
        let Node::Output(value) = &*items[0] else {
            panic!("expected output");
        };
        let id = value.literal_id().unwrap();
        assert_eq!(program.literals[id], Value::from("Hello"));
        assert_eq!(*items[1], Node::Raw("<br>".into()));
    }

    #[test]
    fn test_duplicate_wire_literals_share_an_id() {
        let program = decode_value(&json!({
            "n": ["eq", 0, 1],
            "l": [1, 1]
        }))
        .unwrap();
        let Node::Binary(BinaryOp::Eq, l, r) = &*program.root else {
            panic!("expected eq");
        };
        assert_eq!(l.literal_id(), r.literal_id());
        assert_eq!(program.literals.len(), 1);
    }

    #[test]
    fn test_auto_interpolated_format() {
        let program = decode_value(&json!({
            "n": [{"value": "fm", "kind": "auto-interpolated"}, 0],
            "l": ["Hi %name"]
        }))
        .unwrap();
        assert!(matches!(
            &*program.root,
            Node::Format { data, auto: true, .. } if **data == Node::SelfRef
        ));

        let program = decode_value(&json!({
            "n": ["fm", 0, ["se"]],
            "l": ["Hi %name"]
        }))
        .unwrap();
        assert!(matches!(&*program.root, Node::Format { auto: false, .. }));
    }

    #[test]
    fn test_boundaries_get_distinct_scope_ids() {
        let program = decode_value(&json!({
            "n": {"statements": [
                ["de", "a", [], null, {"statements": []}],
                ["fr", [["x", null, ["id", "xs"], null]], {"statements": []}, null],
                ["us", [["se"]], {"statements": []}]
            ]},
            "l": []
        }))
        .unwrap();
        let Node::Statements(items) = &*program.root else {
            panic!("expected statements");
        };
        let ids = items
            .iter()
            .map(|item| match &**item {
                Node::Partial(def) => def.id,
                Node::For(l) => l.id,
                Node::Using { id, .. } => *id,
                other => panic!("unexpected {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![ScopeId(1), ScopeId(2), ScopeId(3)]);
    }

    #[test]
    fn test_imports_resolve_module_names() {
        let program = decode_value(&json!({
            "n": {"statements": [
                ["im", [[0, null], ["lib/util.qt", {"value": "u", "kind": "identifier"}]]],
                ["mi", 0, [["a", null], ["b", "c"]]]
            ]},
            "l": ["layout"]
        }))
        .unwrap();
        let Node::Statements(items) = &*program.root else {
            panic!("expected statements");
        };
        assert_eq!(
            *items[0],
            Node::Import(vec![
                ImportSpec {
                    module: "layout".into(),
                    alias: None
                },
                ImportSpec {
                    module: "lib/util.qt".into(),
                    alias: Some("u".into())
                },
            ])
        );
        assert_eq!(
            *items[1],
            Node::FromImport {
                module: "layout".into(),
                names: vec![("a".into(), None), ("b".into(), Some("c".into()))],
            }
        );
    }

    #[rstest]
    #[case::unknown_tag(json!({"n": ["zz", 0], "l": [1]}))]
    #[case::not_a_node(json!({"n": "text", "l": []}))]
    #[case::empty_tag_list(json!({"n": [], "l": []}))]
    fn test_invalid_node(#[case] doc: Json) {
        assert!(matches!(decode_value(&doc), Err(DecodeError::InvalidNode(_))));
    }

    #[rstest]
    #[case::missing_operand(json!({"n": ["mb", ["se"]], "l": []}))]
    #[case::args_not_a_list(json!({"n": ["ca", ["id", "f"], 0], "l": [1]}))]
    #[case::loop_without_ranges(json!({"n": ["fr", [], {"statements": []}, null], "l": []}))]
    fn test_invalid_operand(#[case] doc: Json) {
        assert!(matches!(decode_value(&doc), Err(DecodeError::InvalidOperand { .. })));
    }

    #[test]
    fn test_out_of_range_literal() {
        assert_eq!(
            decode_value(&json!({"n": ["op", 3], "l": []})).unwrap_err(),
            DecodeError::InvalidLiteral(3)
        );
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(decode("[1, 2"), Err(DecodeError::Json(_))));
        assert!(matches!(decode("{\"l\": []}"), Err(DecodeError::Json(_))));
    }
}
