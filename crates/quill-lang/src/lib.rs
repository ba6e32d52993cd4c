//! `quill-lang` compiles quill templates and renders them.
//!
//! A front end turns template source into a tagged parse tree; this crate decodes that
//! tree, rewrites it with an optimizing pass pipeline, lowers it to an intermediate form
//! and emits either host closures or a Rust module. Both run on the [`runtime`] support
//! library.
//!
//! ## Examples
//!
//! ```rust
//! use quill_lang::{Engine, Value};
//!
//! let engine = Engine::default();
//! let template = engine
//!     .compile_json(r#"{"n": {"statements": [["op", ["fm", 0]]]}, "l": ["Hello, %name!"]}"#)
//!     .unwrap();
//!
//! let data = Value::from_json(&serde_json::json!({"name": "world"}));
//! assert_eq!(engine.render(&template, &data).unwrap(), "Hello, world!");
//!
//! // Build a tree by hand and emit it as Rust source
//! use quill_lang::ast::Builder;
//!
//! let mut b = Builder::new();
//! let hello = b.string("Hello");
//! let root = b.statements(vec![b.output(hello)]);
//! let source = engine.generate_source(&b.finish(root)).unwrap().source;
//! assert!(source.contains("call.writer.raw(\"Hello\");"));
//! ```
pub mod abi;
pub mod ast;
pub mod codegen;
pub mod engine;
pub mod error;
pub mod literal;
pub mod rewriter;
pub mod runtime;

mod arena;
mod number;
mod value;

pub use arena::{Arena, ArenaId};
pub use ast::Program;
pub use engine::{Engine, GeneratedSource, Options, Template};
pub use error::Error;
pub use literal::{LiteralId, LiteralTable};
pub use number::Number;
pub use rewriter::{Warning, WarningKind};
pub use runtime::{Runtime, RuntimeOptions};
pub use value::{Dict, Name, Value};

pub type QuillResult<T> = Result<T, Error>;
