//! The surface generated template modules are written against.
//!
//! Source produced by [`SourceEmitter`](crate::codegen::SourceEmitter) refers to everything
//! through `abi::` paths, so this module is the only contract between a generated module
//! and the runtime.

pub use std::rc::Rc;

pub use crate::runtime::Runtime;
pub use crate::runtime::activation::{Activation, delegate};
pub use crate::runtime::error::RuntimeError;
pub use crate::runtime::format::{Formatter, FormatterCache};
pub use crate::runtime::function::{
    Call, bind, bless, define_guarded_partial, define_partial, exec, pipe, with_scope,
};
pub use crate::runtime::module::{Importer, Module};
pub use crate::runtime::ops::{BinaryOp, UnaryOp, binary, dict, iterate, member, truthy, unary};
pub use crate::runtime::scope::Scope;
pub use crate::runtime::writer::{Writer, close_element, comment, doc_type, open_element, output};
pub use crate::value::{Dict, Name, Value};
