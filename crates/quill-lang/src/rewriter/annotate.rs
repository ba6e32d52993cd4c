use crate::ast::Annotations;
use crate::ast::node::{Node, NodeRef, ScopeId};
use crate::runtime::module::default_binding;

/// Computes the scope annotations of every boundary in the tree.
///
/// The root is always marked as reading the ambient scope: top-level bindings are written
/// to the render scope so they can be exported.
pub(super) fn annotate(root: &NodeRef) -> Annotations {
    let mut annotator = Annotator {
        annotations: Annotations::new(),
        boundaries: vec![ScopeId::ROOT],
    };
    annotator.annotations.entry(ScopeId::ROOT).self_read = true;
    annotator.visit(root);
    tracing::debug!(boundaries = annotator.annotations.len(), "annotated scope boundaries");
    annotator.annotations
}

struct Annotator {
    annotations: Annotations,
    boundaries: Vec<ScopeId>,
}

impl Annotator {
    fn nearest(&self) -> ScopeId {
        self.boundaries.last().copied().unwrap_or(ScopeId::ROOT)
    }

    fn read_self(&mut self) {
        for id in &self.boundaries {
            self.annotations.entry(*id).self_read = true;
        }
    }

    fn mutate(&mut self, name: &str) {
        let id = self.nearest();
        self.annotations.entry(id).mutations.insert(name.into());
    }

    fn within(&mut self, id: ScopeId, f: impl FnOnce(&mut Self)) {
        self.annotations.entry(id);
        self.boundaries.push(id);
        f(self);
        self.boundaries.pop();
    }

    fn visit(&mut self, node: &NodeRef) {
        match &**node {
            Node::SelfRef => self.read_self(),
            Node::Assign(bindings) => {
                for (name, value) in bindings {
                    self.visit(value);
                    self.mutate(name);
                }
            }
            Node::Import(specs) => {
                for spec in specs {
                    let binding = spec.alias.clone().unwrap_or_else(|| default_binding(&spec.module));
                    self.mutate(&binding);
                }
            }
            Node::FromImport { names, .. } => {
                for (name, alias) in names {
                    self.mutate(alias.as_ref().unwrap_or(name));
                }
            }
            Node::Closure(def) | Node::Partial(def) => self.within(def.id, |this| {
                node.for_each_child(&mut |child| this.visit(child));
            }),
            Node::For(l) => self.within(l.id, |this| {
                node.for_each_child(&mut |child| this.visit(child));
            }),
            Node::Using { id, exprs, body } => {
                for expr in exprs {
                    self.visit(expr);
                }
                self.within(*id, |this| {
                    this.read_self();
                    this.visit(body);
                });
            }
            _ => node.for_each_child(&mut |child| self.visit(child)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Builder;
    use crate::value::Name;

    fn names(annotations: &Annotations, id: u32) -> Vec<String> {
        annotations.mutations(ScopeId(id)).map(Name::to_string).collect()
    }

    #[test]
    fn test_root_always_reads_self() {
        let b = Builder::new();
        let annotations = annotate(&b.statements(vec![]));
        assert!(annotations.self_read(ScopeId::ROOT));
    }

    #[test]
    fn test_assignments_land_in_nearest_boundary() {
        let mut b = Builder::new();
        let one = b.number(1.0);
        let inner = b.statements(vec![b.assign("local", one.clone())]);
        let p = b.partial("p", &["x"], None, inner);
        let root = b.statements(vec![b.assign("top", one), p]);
        let annotations = annotate(&root);

        assert_eq!(names(&annotations, 0), vec!["top"]);
        assert_eq!(names(&annotations, 1), vec!["local"]);
        assert!(!annotations.self_read(ScopeId(1)));
    }

    #[test]
    fn test_self_read_propagates_to_every_enclosing_boundary() {
        let mut b = Builder::new();
        let read = b.statements(vec![b.output(b.self_ref())]);
        let range = b.range("v", None, b.ident("xs"), None);
        let l = b.for_loop(vec![range], read, None);
        let p = b.partial("p", &[], None, b.statements(vec![l]));
        let q = b.partial("q", &[], None, b.statements(vec![]));
        let annotations = annotate(&b.statements(vec![p, q]));

        assert!(annotations.self_read(ScopeId(1)));
        assert!(annotations.self_read(ScopeId(2)));
        assert!(!annotations.self_read(ScopeId(3)));
        assert_eq!(annotations.len(), 4);
    }

    #[test]
    fn test_using_reads_self() {
        let mut b = Builder::new();
        let body = b.statements(vec![b.output(b.ident("x"))]);
        let using = b.using(vec![b.ident("data")], body);
        let p = b.partial("p", &[], None, b.statements(vec![using]));
        let annotations = annotate(&b.statements(vec![p]));
        assert!(annotations.self_read(ScopeId(1)));
        assert!(annotations.self_read(ScopeId(2)));
    }

    #[test]
    fn test_imports_are_mutations() {
        let mut b = Builder::new();
        let body = b.statements(vec![
            b.import("lib/helpers.qt", None),
            b.import("other", Some("o")),
            b.from_import("m", &[("a", None), ("b", Some("c"))]),
        ]);
        let p = b.partial("p", &[], None, body);
        let annotations = annotate(&b.statements(vec![p]));
        assert_eq!(names(&annotations, 1), vec!["a", "c", "helpers", "o"]);
    }
}
