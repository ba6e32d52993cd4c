pub mod annotation;
pub mod builder;
pub mod decode;
pub mod error;
pub mod node;

use crate::literal::LiteralTable;
use node::NodeRef;

pub use annotation::{Annotations, ScopeAnnotation};
pub use builder::Builder;
pub use decode::{decode, decode_value};
pub use node::{ForLoop, ImportSpec, Node, PartialDef, Range, ScopeId};

/// A decoded template: the syntax tree and the literal pool it references.
#[derive(Debug, Clone)]
pub struct Program {
    pub root: NodeRef,
    pub literals: LiteralTable,
}

impl Program {
    pub fn new(root: NodeRef, literals: LiteralTable) -> Self {
        Self { root, literals }
    }
}
