//! Code generation.
//!
//! The generator walks the rewritten tree once and lowers it to [`ir::Program`]: every
//! identifier is resolved to a scope property or an activation slot, every literal format
//! string gets one shared formatter and every module name one importer. A [`CodeEmitter`]
//! then turns the program into something runnable:
//!
//! - [`ClosureEmitter`] builds host closures for in-process rendering,
//! - [`SourceEmitter`] writes a self-contained Rust module.
//!
//! ## Scope boundaries
//!
//! Partial bodies, loop bodies and `using` blocks each push an overlay mapping the names
//! bound inside them. A boundary annotated as reading the ambient scope binds its names in
//! a child scope; any other boundary keeps them in activation slots and never allocates a
//! scope frame. Names bound inside a boundary start out with the value they have outside
//! it.

pub mod closure;
pub mod error;
pub mod ir;
pub mod source;

pub use closure::{ClosureEmitter, CompiledTemplate};
pub use error::GenerateError;
pub use source::SourceEmitter;

use crate::ast::Annotations;
use crate::ast::node::{ForLoop, Node, NodeRef, PartialDef, ScopeId};
use crate::literal::LiteralTable;
use crate::runtime::module::default_binding;
use crate::value::{Name, Value};
use ir::{Binding, Block, Expr, Frame, ImportBinding, Loop, LoopRange, Partial, Stmt};
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Turns a lowered program into an executable or persistable artifact.
pub trait CodeEmitter {
    type Output;

    fn emit(&self, program: &ir::Program, literals: &LiteralTable) -> Self::Output;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Keep the first successful resolution of each imported module for the lifetime of
    /// the compiled template.
    pub cache_imports: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self { cache_imports: true }
    }
}

/// Lowers a rewritten tree.
pub fn generate(
    root: &NodeRef,
    annotations: &Annotations,
    literals: &LiteralTable,
    options: &GenerateOptions,
) -> Result<ir::Program, GenerateError> {
    Generator::new(annotations, literals).generate(root, options)
}

#[derive(Debug, Clone, Copy)]
enum Local {
    Slot(usize),
    Scope,
}

#[derive(Debug, Default)]
struct Overlay {
    context: bool,
    slots: usize,
    names: FxHashMap<Name, Local>,
}

pub struct Generator<'a> {
    annotations: &'a Annotations,
    literals: &'a LiteralTable,
    overlays: Vec<Overlay>,
    formatters: Vec<crate::literal::LiteralId>,
    caches: usize,
    importers: Vec<Name>,
}

impl<'a> Generator<'a> {
    pub fn new(annotations: &'a Annotations, literals: &'a LiteralTable) -> Self {
        Self {
            annotations,
            literals,
            overlays: Vec::new(),
            formatters: Vec::new(),
            caches: 0,
            importers: Vec::new(),
        }
    }

    pub fn generate(mut self, root: &NodeRef, options: &GenerateOptions) -> Result<ir::Program, GenerateError> {
        self.overlays.push(Overlay {
            context: true,
            ..Default::default()
        });
        let annotations = self.annotations;
        for name in annotations.mutations(ScopeId::ROOT) {
            self.declare(name);
        }

        let body = self.block(root)?;
        let root_slots = self.overlays.pop().map(|o| o.slots).unwrap_or_default();

        tracing::debug!(
            formatters = self.formatters.len(),
            caches = self.caches,
            importers = self.importers.len(),
            "generated template"
        );

        Ok(ir::Program {
            body,
            root_slots,
            formatters: self.formatters,
            caches: self.caches,
            importers: self.importers,
            cache_imports: options.cache_imports,
        })
    }

    fn declare(&mut self, name: &Name) -> Binding {
        let Some(overlay) = self.overlays.last_mut() else {
            return Binding::Scope(name.clone());
        };
        if let Some(local) = overlay.names.get(name) {
            return match local {
                Local::Slot(index) => Binding::Slot { depth: 0, index: *index },
                Local::Scope => Binding::Scope(name.clone()),
            };
        }

        if overlay.context {
            overlay.names.insert(name.clone(), Local::Scope);
            Binding::Scope(name.clone())
        } else {
            let index = overlay.slots;
            overlay.slots += 1;
            overlay.names.insert(name.clone(), Local::Slot(index));
            Binding::Slot { depth: 0, index }
        }
    }

    fn resolve(&self, name: &Name) -> Binding {
        for (depth, overlay) in self.overlays.iter().rev().enumerate() {
            match overlay.names.get(name) {
                Some(Local::Slot(index)) => return Binding::Slot { depth, index: *index },
                Some(Local::Scope) => return Binding::Scope(name.clone()),
                None => {}
            }
        }
        Binding::Scope(name.clone())
    }

    /// Lowers the contents of a boundary. `locals` are bound first (parameters, loop
    /// variables), then every other name the boundary assigns.
    fn boundary<R>(
        &mut self,
        id: ScopeId,
        locals: &[Name],
        f: impl FnOnce(&mut Self, Vec<Binding>) -> Result<R, GenerateError>,
    ) -> Result<(Frame, R), GenerateError> {
        let context = self.annotations.self_read(id);
        let mutations = self
            .annotations
            .mutations(id)
            .filter(|name| !locals.contains(name))
            .cloned()
            .collect::<Vec<_>>();
        let sources = mutations.iter().map(|name| self.resolve(name)).collect::<Vec<_>>();

        self.overlays.push(Overlay {
            context,
            ..Default::default()
        });
        let locals = locals.iter().map(|name| self.declare(name)).collect();
        let inherit = mutations
            .iter()
            .zip(sources)
            .filter_map(|(name, source)| match (self.declare(name), source) {
                (Binding::Scope(_), Binding::Scope(_)) => None,
                pair => Some(pair),
            })
            .collect();

        let result = f(self, locals);
        let slots = self.overlays.pop().map(|o| o.slots).unwrap_or_default();
        Ok((
            Frame {
                context,
                slots,
                inherit,
            },
            result?,
        ))
    }

    fn block(&mut self, node: &NodeRef) -> Result<Block, GenerateError> {
        let mut block = Vec::new();
        self.statement(node, &mut block)?;
        Ok(block)
    }

    fn statement(&mut self, node: &NodeRef, out: &mut Block) -> Result<(), GenerateError> {
        match &**node {
            Node::Statements(items) => {
                for item in items {
                    self.statement(item, out)?;
                }
            }
            Node::Expression(e) => out.push(Stmt::Expr(self.expr(e)?)),
            Node::Assign(bindings) => {
                for (name, value) in bindings {
                    let value = self.expr(value)?;
                    out.push(Stmt::Store(self.resolve(name), value));
                }
            }
            Node::Partial(def) => {
                let closure = self.partial(def)?;
                out.push(Stmt::Store(self.resolve(&def.name), closure));
            }
            Node::For(l) => out.push(Stmt::For(Rc::new(self.for_loop(l)?))),
            Node::If { cond, then, otherwise } => out.push(Stmt::If {
                cond: self.expr(cond)?,
                then: self.block(then)?,
                otherwise: otherwise.as_ref().map(|o| self.block(o)).transpose()?,
            }),
            Node::Using { id, exprs, body } => {
                let exprs = exprs.iter().map(|e| self.expr(e)).collect::<Result<_, _>>()?;
                let (frame, body) = self.boundary(*id, &[], |g, _| g.block(body))?;
                out.push(Stmt::Using { frame, exprs, body });
            }
            Node::Output(e) => out.push(Stmt::Output(self.expr(e)?)),
            Node::Raw(text) => out.push(Stmt::Raw(text.clone())),
            Node::OpenTag {
                name,
                attrs,
                self_close,
            } => out.push(Stmt::OpenTag {
                name: self.expr(name)?,
                attrs: attrs.as_ref().map(|a| self.expr(a)).transpose()?,
                self_close: *self_close,
            }),
            Node::CloseTag(name) => out.push(Stmt::CloseTag(self.expr(name)?)),
            Node::Comment(text) => out.push(Stmt::Comment(self.expr(text)?)),
            Node::DocType(root) => out.push(Stmt::DocType(self.expr(root)?)),
            Node::Import(specs) => {
                for spec in specs {
                    let local = spec.alias.clone().unwrap_or_else(|| default_binding(&spec.module));
                    out.push(Stmt::Import {
                        importer: self.importer(&spec.module),
                        binding: ImportBinding::Whole(self.resolve(&local)),
                    });
                }
            }
            Node::FromImport { module, names } => out.push(Stmt::Import {
                importer: self.importer(module),
                binding: ImportBinding::Names(
                    names
                        .iter()
                        .map(|(name, alias)| (name.clone(), self.resolve(alias.as_ref().unwrap_or(name))))
                        .collect(),
                ),
            }),
            Node::Delegate => out.push(Stmt::Delegate),
            other => return Err(invalid(other, "expression in statement position")),
        }
        Ok(())
    }

    fn exprs(&mut self, nodes: &[NodeRef]) -> Result<Vec<Expr>, GenerateError> {
        nodes.iter().map(|node| self.expr(node)).collect()
    }

    fn boxed(&mut self, node: &NodeRef) -> Result<Box<Expr>, GenerateError> {
        self.expr(node).map(Box::new)
    }

    fn expr(&mut self, node: &NodeRef) -> Result<Expr, GenerateError> {
        Ok(match &**node {
            Node::Literal(id) => Expr::Literal(*id),
            Node::Ident(name) => Expr::Load(self.resolve(name)),
            Node::SelfRef => Expr::SelfRef,
            Node::Array(items) => Expr::Array(self.exprs(items)?),
            Node::Dict(entries) => Expr::Dict(
                entries
                    .iter()
                    .map(|(k, v)| Ok((self.expr(k)?, self.expr(v)?)))
                    .collect::<Result<_, GenerateError>>()?,
            ),
            Node::Member { object, property } => Expr::Member(self.boxed(object)?, self.boxed(property)?),
            Node::Call { target, args } => Expr::Call(self.call_target(target)?, self.exprs(args)?),
            Node::Bind { target, args } => Expr::Bind(self.call_target(target)?, self.exprs(args)?),
            Node::Format { format, data, .. } => match self.literal_format(format) {
                Some(formatter) => Expr::Format {
                    formatter,
                    data: self.boxed(data)?,
                },
                None => {
                    let cache = self.caches;
                    self.caches += 1;
                    Expr::DynamicFormat {
                        cache,
                        format: self.boxed(format)?,
                        data: self.boxed(data)?,
                    }
                }
            },
            Node::Conditional { cond, then, otherwise } => {
                Expr::Cond(self.boxed(cond)?, self.boxed(then)?, self.boxed(otherwise)?)
            }
            Node::Or(l, r) => Expr::Or(self.boxed(l)?, self.boxed(r)?),
            Node::And(l, r) => Expr::And(self.boxed(l)?, self.boxed(r)?),
            Node::Binary(op, l, r) => Expr::Binary(*op, self.boxed(l)?, self.boxed(r)?),
            Node::Unary(op, e) => Expr::Unary(*op, self.boxed(e)?),
            Node::Closure(def) => self.partial(def)?,
            other => return Err(invalid(other, "statement in expression position")),
        })
    }

    /// Only names, member accesses and the results of calls or binds can be called.
    fn call_target(&mut self, target: &NodeRef) -> Result<Box<Expr>, GenerateError> {
        match &**target {
            Node::Ident(_) | Node::Member { .. } | Node::Call { .. } | Node::Bind { .. } => self.boxed(target),
            other => Err(GenerateError::InvalidCallTarget(describe(other))),
        }
    }

    fn literal_format(&mut self, format: &Node) -> Option<usize> {
        let id = format.literal_id()?;
        if !matches!(self.literals.get(id), Some(Value::String(_))) {
            return None;
        }
        Some(match self.formatters.iter().position(|f| *f == id) {
            Some(index) => index,
            None => {
                self.formatters.push(id);
                self.formatters.len() - 1
            }
        })
    }

    fn importer(&mut self, module: &Name) -> usize {
        match self.importers.iter().position(|m| m == module) {
            Some(index) => index,
            None => {
                self.importers.push(module.clone());
                self.importers.len() - 1
            }
        }
    }

    fn partial(&mut self, def: &Rc<PartialDef>) -> Result<Expr, GenerateError> {
        let guard = def.guard.as_ref();
        let previous = (def.delegates || guard.is_some()).then(|| self.resolve(&def.name));

        let (frame, (params, body)) = self.boundary(def.id, &def.params, |g, params| {
            let body = g.block(&def.body)?;
            let body = match guard {
                Some(guard) => vec![Stmt::If {
                    cond: g.expr(guard)?,
                    then: body,
                    otherwise: Some(vec![Stmt::Delegate]),
                }],
                None => body,
            };
            Ok((params, body))
        })?;

        Ok(Expr::Closure(Rc::new(Partial {
            name: def.name.clone(),
            frame,
            params,
            body,
            previous,
        })))
    }

    fn for_loop(&mut self, l: &ForLoop) -> Result<Loop, GenerateError> {
        let locals = l
            .ranges
            .iter()
            .flat_map(|r| std::iter::once(r.value.clone()).chain(r.key.clone()))
            .collect::<Vec<_>>();

        let (frame, (ranges, body, otherwise)) = self.boundary(l.id, &locals, |g, _| {
            let ranges = l
                .ranges
                .iter()
                .map(|r| {
                    Ok(LoopRange {
                        value: g.resolve(&r.value),
                        key: r.key.as_ref().map(|k| g.resolve(k)),
                        collection: g.expr(&r.collection)?,
                        guard: r.guard.as_ref().map(|e| g.expr(e)).transpose()?,
                    })
                })
                .collect::<Result<Vec<_>, GenerateError>>()?;
            let body = g.block(&l.body)?;
            let otherwise = l.otherwise.as_ref().map(|o| g.block(o)).transpose()?;
            Ok((ranges, body, otherwise))
        })?;

        Ok(Loop {
            frame,
            ranges,
            body,
            otherwise,
        })
    }
}

fn describe(node: &Node) -> String {
    match node.tag() {
        Some(tag) => format!("\"{tag}\""),
        None => match node {
            Node::Literal(id) => format!("literal {id}"),
            Node::Statements(_) => "statement list".to_string(),
            Node::Closure(def) => format!("closure \"{}\"", def.name),
            _ => "delegate".to_string(),
        },
    }
}

fn invalid(node: &Node, position: &str) -> GenerateError {
    GenerateError::InvalidNode(format!("{} ({position})", describe(node)))
}
