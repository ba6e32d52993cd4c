//! The optimizing rewriter.
//!
//! Every pass builds new nodes instead of mutating; unchanged subtrees keep sharing their
//! `Rc`s with the input tree. Passes run in a fixed order, each over the whole tree:
//!
//! 1. short-circuit folding
//! 2. constant folding
//! 3. conditional flip
//! 4. equality flip
//! 5. not promotion
//! 6. literal hoisting
//! 7. self-format specialization
//! 8. `if` folding
//! 9. partial hoisting
//! 10. partial merging
//! 11. loop roll-up
//! 12. raw-output promotion
//! 13. partial lowering
//! 14. scope annotation
//! 15. statement flattening
//!
//! With optimization disabled only the passes the generator depends on run (10, 13, 14
//! and 15).

mod annotate;
mod control;
mod fold;
mod format;
mod logic;
mod markup;
mod partials;

use crate::ast::Annotations;
use crate::ast::node::{Node, NodeRef, statements};
use crate::literal::LiteralTable;
use crate::value::Value;
use std::{fmt, rc::Rc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// Partial definitions interleaved with other statements in a way hoisting can't reorder.
    AmbiguousHoisting,
    /// An unguarded partial definition replaced earlier definitions of the same name.
    PartialRedefined,
    /// Adjacent definitions of one partial disagree on their parameters.
    SignatureMismatch,
    /// An explicit interpolation against `self` whose format has no placeholders.
    FormatWithoutPlaceholders,
}

/// A compile-time diagnostic. Warnings never stop compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    ShortCircuit,
    ConstantFolding,
    ConditionalFlip,
    EqualityFlip,
    NotPromotion,
    LiteralHoisting,
    SelfFormat,
    IfFolding,
    PartialHoisting,
    PartialMerging,
    LoopRollUp,
    RawPromotion,
    PartialLowering,
    Annotation,
    Flattening,
}

impl Pass {
    pub const PIPELINE: [Pass; 15] = [
        Pass::ShortCircuit,
        Pass::ConstantFolding,
        Pass::ConditionalFlip,
        Pass::EqualityFlip,
        Pass::NotPromotion,
        Pass::LiteralHoisting,
        Pass::SelfFormat,
        Pass::IfFolding,
        Pass::PartialHoisting,
        Pass::PartialMerging,
        Pass::LoopRollUp,
        Pass::RawPromotion,
        Pass::PartialLowering,
        Pass::Annotation,
        Pass::Flattening,
    ];

    /// Whether the pass only exists to optimize, as opposed to normalizing the tree for
    /// the generator.
    pub fn is_optimization(&self) -> bool {
        !matches!(
            self,
            Pass::PartialMerging | Pass::PartialLowering | Pass::Annotation | Pass::Flattening
        )
    }
}

/// The result of [`Rewriter::rewrite`].
#[derive(Debug, Clone)]
pub struct Rewritten {
    pub root: NodeRef,
    pub annotations: Annotations,
    pub warnings: Vec<Warning>,
}

/// State shared by the passes: the literal table new constants go into and the warning sink.
pub(crate) struct Context<'a> {
    literals: &'a mut LiteralTable,
    warnings: Vec<Warning>,
}

impl Context<'_> {
    /// The literal value behind a literal node.
    pub(crate) fn value(&self, node: &Node) -> Option<Value> {
        node.literal_id().and_then(|id| self.literals.get(id)).cloned()
    }

    pub(crate) fn literal(&mut self, value: Value) -> NodeRef {
        Rc::new(Node::Literal(self.literals.insert(value)))
    }

    pub(crate) fn warn(&mut self, kind: WarningKind, message: String) {
        tracing::warn!(?kind, "{message}");
        self.warnings.push(Warning { kind, message });
    }
}

/// Runs the pass pipeline over a syntax tree.
pub struct Rewriter<'a> {
    context: Context<'a>,
    optimize: bool,
}

impl<'a> Rewriter<'a> {
    pub fn new(literals: &'a mut LiteralTable) -> Self {
        Self {
            context: Context {
                literals,
                warnings: Vec::new(),
            },
            optimize: true,
        }
    }

    pub fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn rewrite(mut self, root: &NodeRef) -> Rewritten {
        let mut root = Rc::clone(root);
        let mut annotations = Annotations::new();

        for pass in Pass::PIPELINE {
            if !self.optimize && pass.is_optimization() {
                continue;
            }

            let rewritten = match pass {
                Pass::Annotation => {
                    annotations = annotate::annotate(&root);
                    continue;
                }
                pass => self.run(pass, &root),
            };

            if !Rc::ptr_eq(&root, &rewritten) {
                tracing::debug!(?pass, "pass rewrote the tree");
            }
            root = rewritten;
        }

        Rewritten {
            root,
            annotations,
            warnings: self.context.warnings,
        }
    }

    fn run(&mut self, pass: Pass, root: &NodeRef) -> NodeRef {
        let cx = &mut self.context;
        match pass {
            Pass::ShortCircuit => transform(root, &mut |node| fold::short_circuit(cx, node)),
            Pass::ConstantFolding => transform(root, &mut |node| fold::constant(cx, node)),
            Pass::ConditionalFlip => transform(root, &mut logic::conditional_flip),
            Pass::EqualityFlip => transform(root, &mut logic::equality_flip),
            Pass::NotPromotion => transform(root, &mut logic::not_promotion),
            Pass::LiteralHoisting => transform(root, &mut |node| fold::hoist_literal(cx, node)),
            Pass::SelfFormat => transform(root, &mut |node| format::specialize(cx, node)),
            Pass::IfFolding => transform(root, &mut |node| control::fold_if(cx, node)),
            Pass::PartialHoisting => transform_lists(root, &mut |items| partials::hoist(cx, items)),
            Pass::PartialMerging => transform_lists(root, &mut |items| partials::merge(cx, items)),
            Pass::LoopRollUp => transform(root, &mut control::roll_up),
            Pass::RawPromotion => {
                let promoted = transform(root, &mut |node| markup::promote(cx, node));
                transform_lists(&promoted, &mut markup::merge_raw)
            }
            Pass::PartialLowering => transform(root, &mut partials::lower),
            Pass::Flattening => {
                let flat = transform_lists(root, &mut control::flatten);
                // Folded branches can leave raw text next to raw text.
                if self.optimize {
                    transform_lists(&flat, &mut markup::merge_raw)
                } else {
                    flat
                }
            }
            Pass::Annotation => Rc::clone(root),
        }
    }
}

/// Rewrites a tree; see [`Rewriter`].
pub fn rewrite(root: &NodeRef, literals: &mut LiteralTable, optimize: bool) -> Rewritten {
    Rewriter::new(literals).optimize(optimize).rewrite(root)
}

/// Bottom-up node rewrite: children first, then `f` on the rebuilt node. `None` keeps the
/// node.
pub(crate) fn transform(node: &NodeRef, f: &mut impl FnMut(&NodeRef) -> Option<NodeRef>) -> NodeRef {
    let node = match node.map_children(&mut |child| transform(child, f)) {
        Some(rebuilt) => Rc::new(rebuilt),
        None => Rc::clone(node),
    };
    f(&node).unwrap_or(node)
}

/// Bottom-up rewrite of every statement list.
pub(crate) fn transform_lists(
    node: &NodeRef,
    f: &mut impl FnMut(&[NodeRef]) -> Option<Vec<NodeRef>>,
) -> NodeRef {
    transform(node, &mut |node| match &**node {
        Node::Statements(items) => f(items).map(statements),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Builder;
    use crate::runtime::ops::BinaryOp;

    #[test]
    fn test_unchanged_tree_is_shared() {
        let mut b = Builder::new();
        let x = b.ident("x");
        let root = b.statements(vec![b.output(x)]);
        let mut program = b.finish(root);
        let rewritten = rewrite(&program.root, &mut program.literals, true);
        assert!(Rc::ptr_eq(&rewritten.root, &program.root));
        assert!(rewritten.warnings.is_empty());
    }

    #[test]
    fn test_disabled_optimization_skips_folding() {
        let mut b = Builder::new();
        let one = b.number(1.0);
        let two = b.number(2.0);
        let sum = b.binary(BinaryOp::Add, one, two);
        let root = b.statements(vec![b.expression(sum)]);
        let mut program = b.finish(root);

        let plain = rewrite(&program.root, &mut program.literals, false);
        assert!(Rc::ptr_eq(&plain.root, &program.root));

        let folded = rewrite(&program.root, &mut program.literals, true);
        let Node::Statements(items) = &*folded.root else {
            panic!("expected statements");
        };
        let Node::Expression(value) = &*items[0] else {
            panic!("expected expression statement");
        };
        let id = value.literal_id().unwrap();
        assert_eq!(program.literals[id], Value::from(3.0));
    }

    #[test]
    fn test_raw_text_merged_across_folded_if() {
        let mut b = Builder::new();
        let yes = b.literal(true);
        let branch = b.statements(vec![b.raw("<b>"), b.raw("yes")]);
        let root = b.statements(vec![b.raw("<p>"), b.if_(yes, branch, None), b.raw("</p>")]);
        let mut program = b.finish(root);

        let rewritten = rewrite(&program.root, &mut program.literals, true);
        assert_eq!(
            *rewritten.root,
            Node::Statements(vec![Rc::new(Node::Raw("<p><b>yes</p>".into()))])
        );
    }

    #[test]
    fn test_pipeline_order() {
        assert_eq!(Pass::PIPELINE.len(), 15);
        assert_eq!(
            Pass::PIPELINE
                .iter()
                .filter(|p| !p.is_optimization())
                .count(),
            4
        );
    }
}
