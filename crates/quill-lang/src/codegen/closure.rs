//! The closure backend.
//!
//! Each IR node becomes a reference-counted closure taking the call context and the
//! current activation, in the style of a closure-compiling interpreter: dispatch on node
//! kind happens once at compile time instead of on every render.

use super::CodeEmitter;
use super::ir::{self, Binding, Block, Expr, Frame, ImportBinding, Stmt};
use crate::literal::LiteralTable;
use crate::runtime::Runtime;
use crate::runtime::activation::{Activation, delegate};
use crate::runtime::error::RuntimeError;
use crate::runtime::format::{Formatter, FormatterCache};
use crate::runtime::function::{Call, bind, define_guarded_partial, define_partial, exec, with_scope};
use crate::runtime::module::{Importer, Module};
use crate::runtime::ops;
use crate::runtime::scope::Scope;
use crate::runtime::writer::{self, Writer};
use crate::value::Value;
use smol_str::SmolStr;
use std::{fmt, rc::Rc};

/// A compiled expression.
type ExprFn = Rc<dyn Fn(&mut Call<'_>, &Rc<Activation>) -> Result<Value, RuntimeError>>;

/// A compiled statement or block; yields the block value when it produces one.
type BlockFn = Rc<dyn Fn(&mut Call<'_>, &Rc<Activation>) -> Result<Option<Value>, RuntimeError>>;

/// A template compiled to host closures.
#[derive(Clone)]
pub struct CompiledTemplate {
    body: BlockFn,
    root_slots: usize,
}

impl CompiledTemplate {
    /// Runs the template body in an existing call context.
    pub fn call(&self, call: &mut Call<'_>) -> Result<Value, RuntimeError> {
        let activation = Activation::root(self.root_slots);
        Ok((self.body)(call, &activation)?.unwrap_or_default())
    }

    pub fn render(&self, runtime: &Runtime, scope: Scope, writer: &mut dyn Writer) -> Result<Value, RuntimeError> {
        let mut call = Call::new(runtime, scope, writer);
        self.call(&mut call)
    }

    pub fn into_module(self) -> Module {
        Module::new(move |call| self.call(call))
    }
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("root_slots", &self.root_slots)
            .finish()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ClosureEmitter;

impl CodeEmitter for ClosureEmitter {
    type Output = CompiledTemplate;

    fn emit(&self, program: &ir::Program, literals: &LiteralTable) -> CompiledTemplate {
        let emitter = Emitter {
            literals,
            formatters: program
                .formatters
                .iter()
                .map(|id| Rc::new(Formatter::build(&literals.get(*id).map(ToString::to_string).unwrap_or_default())))
                .collect(),
            caches: (0..program.caches).map(|_| Rc::new(FormatterCache::new())).collect(),
            importers: program
                .importers
                .iter()
                .map(|name| Rc::new(Importer::new(name.clone(), program.cache_imports)))
                .collect(),
        };

        CompiledTemplate {
            body: emitter.block(&program.body),
            root_slots: program.root_slots,
        }
    }
}

fn load(scope: &Scope, activation: &Activation, binding: &Binding) -> Value {
    match binding {
        Binding::Scope(name) => scope.get(name),
        Binding::Slot { depth, index } => activation.get(*depth, *index),
    }
}

fn store(scope: &Scope, activation: &Activation, binding: &Binding, value: Value) {
    match binding {
        Binding::Scope(name) => scope.set(name.clone(), value),
        Binding::Slot { depth, index } => activation.set(*depth, *index, value),
    }
}

/// Reads the values a boundary inherits, from the frame it is entered from.
fn inherited(frame: &Frame, scope: &Scope, activation: &Activation) -> Vec<Value> {
    frame
        .inherit
        .iter()
        .map(|(_, source)| load(scope, activation, source))
        .collect()
}

fn bind_inherited(frame: &Frame, scope: &Scope, activation: &Activation, values: Vec<Value>) {
    for ((target, _), value) in frame.inherit.iter().zip(values) {
        store(scope, activation, target, value);
    }
}

struct CompiledRange {
    value: Binding,
    key: Option<Binding>,
    collection: ExprFn,
    guard: Option<ExprFn>,
}

/// Runs `body` for every combination of the remaining ranges.
fn iterate(
    call: &mut Call<'_>,
    activation: &Rc<Activation>,
    ranges: &[CompiledRange],
    body: &BlockFn,
    ran: &mut bool,
) -> Result<(), RuntimeError> {
    let Some((range, rest)) = ranges.split_first() else {
        *ran = true;
        body(call, activation)?;
        return Ok(());
    };

    let collection = (range.collection)(call, activation)?;
    for (key, value) in ops::iterate(&collection) {
        store(&call.scope, activation, &range.value, value);
        if let Some(binding) = &range.key {
            store(&call.scope, activation, binding, key);
        }
        if let Some(guard) = &range.guard {
            if !ops::truthy(&guard(call, activation)?) {
                continue;
            }
        }
        iterate(call, activation, rest, body, ran)?;
    }
    Ok(())
}

struct PartialBody {
    frame: Frame,
    params: Vec<Binding>,
    body: BlockFn,
}

impl PartialBody {
    fn invoke(
        &self,
        call: &mut Call<'_>,
        captured: (&Scope, &Rc<Activation>),
        args: &[Value],
        previous: Value,
    ) -> Result<Value, RuntimeError> {
        let (scope, parent) = captured;
        let values = inherited(&self.frame, scope, parent);
        let activation = Activation::for_call(parent, self.frame.slots, args, previous);
        let scope = if self.frame.context {
            scope.extend()
        } else {
            scope.clone()
        };

        with_scope(call, scope, |call| {
            bind_inherited(&self.frame, &call.scope, &activation, values);
            for (i, param) in self.params.iter().enumerate() {
                store(&call.scope, &activation, param, args.get(i).cloned().unwrap_or_default());
            }
            Ok((self.body)(call, &activation)?.unwrap_or_default())
        })
    }
}

struct Emitter<'a> {
    literals: &'a LiteralTable,
    formatters: Vec<Rc<Formatter>>,
    caches: Vec<Rc<FormatterCache>>,
    importers: Vec<Rc<Importer>>,
}

impl Emitter<'_> {
    fn block(&self, block: &Block) -> BlockFn {
        let statements = block.iter().map(|stmt| self.stmt(stmt)).collect::<Vec<_>>();
        Rc::new(move |call, activation| {
            let mut last = None;
            for statement in &statements {
                if let Some(value) = statement(call, activation)? {
                    last = Some(value);
                }
            }
            Ok(last)
        })
    }

    fn exprs(&self, exprs: &[Expr]) -> Vec<ExprFn> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn stmt(&self, stmt: &Stmt) -> BlockFn {
        match stmt {
            Stmt::Expr(e) => {
                let e = self.expr(e);
                Rc::new(move |call, activation| e(call, activation).map(Some))
            }
            Stmt::Output(e) => {
                let e = self.expr(e);
                Rc::new(move |call, activation| {
                    let value = e(call, activation)?;
                    writer::output(call, &value)?;
                    Ok(None)
                })
            }
            Stmt::Raw(text) => {
                let text: SmolStr = text.clone();
                Rc::new(move |call, _| {
                    call.writer.raw(&text);
                    Ok(None)
                })
            }
            Stmt::OpenTag {
                name,
                attrs,
                self_close,
            } => {
                let name = self.expr(name);
                let attrs = attrs.as_ref().map(|a| self.expr(a));
                let self_close = *self_close;
                Rc::new(move |call, activation| {
                    let tag = name(call, activation)?;
                    let attrs = match &attrs {
                        Some(attrs) => attrs(call, activation)?,
                        None => Value::Nil,
                    };
                    writer::open_element(call, &tag, &attrs, self_close);
                    Ok(None)
                })
            }
            Stmt::CloseTag(name) => {
                let name = self.expr(name);
                Rc::new(move |call, activation| {
                    let tag = name(call, activation)?;
                    writer::close_element(call, &tag);
                    Ok(None)
                })
            }
            Stmt::Comment(text) => {
                let text = self.expr(text);
                Rc::new(move |call, activation| {
                    let text = text(call, activation)?;
                    writer::comment(call, &text);
                    Ok(None)
                })
            }
            Stmt::DocType(root) => {
                let root = self.expr(root);
                Rc::new(move |call, activation| {
                    let root = root(call, activation)?;
                    writer::doc_type(call, &root);
                    Ok(None)
                })
            }
            Stmt::Store(binding, e) => {
                let binding = binding.clone();
                let e = self.expr(e);
                Rc::new(move |call, activation| {
                    let value = e(call, activation)?;
                    store(&call.scope, activation, &binding, value);
                    Ok(None)
                })
            }
            Stmt::If { cond, then, otherwise } => {
                let cond = self.expr(cond);
                let then = self.block(then);
                let otherwise = otherwise.as_ref().map(|o| self.block(o));
                Rc::new(move |call, activation| {
                    if ops::truthy(&cond(call, activation)?) {
                        then(call, activation)
                    } else {
                        match &otherwise {
                            Some(otherwise) => otherwise(call, activation),
                            None => Ok(None),
                        }
                    }
                })
            }
            Stmt::For(l) => self.for_loop(l),
            Stmt::Using { frame, exprs, body } => {
                let frame = frame.clone();
                let exprs = self.exprs(exprs);
                let body = self.block(body);
                Rc::new(move |call, activation| {
                    let values = exprs
                        .iter()
                        .map(|e| e(call, activation))
                        .collect::<Result<Vec<_>, _>>()?;
                    let inherit = inherited(&frame, &call.scope, activation);
                    let inner = Activation::new(activation, frame.slots);
                    let scope = call.scope.extend_from(&values);
                    with_scope(call, scope, |call| {
                        bind_inherited(&frame, &call.scope, &inner, inherit);
                        body(call, &inner)
                    })
                })
            }
            Stmt::Import { importer, binding } => {
                let importer = Rc::clone(&self.importers[*importer]);
                let binding = binding.clone();
                Rc::new(move |call, activation| {
                    let exports = importer.import(call)?;
                    match &binding {
                        ImportBinding::Whole(target) => store(&call.scope, activation, target, exports),
                        ImportBinding::Names(names) => {
                            for (name, target) in names {
                                store(&call.scope, activation, target, exports.property(name));
                            }
                        }
                    }
                    Ok(None)
                })
            }
            Stmt::Delegate => Rc::new(|call, activation| delegate(call, activation).map(Some)),
        }
    }

    fn for_loop(&self, l: &ir::Loop) -> BlockFn {
        let frame = l.frame.clone();
        let ranges = l
            .ranges
            .iter()
            .map(|r| CompiledRange {
                value: r.value.clone(),
                key: r.key.clone(),
                collection: self.expr(&r.collection),
                guard: r.guard.as_ref().map(|g| self.expr(g)),
            })
            .collect::<Vec<_>>();
        let body = self.block(&l.body);
        let otherwise = l.otherwise.as_ref().map(|o| self.block(o));

        Rc::new(move |call, activation| {
            let inherit = inherited(&frame, &call.scope, activation);
            let inner = Activation::new(activation, frame.slots);
            let scope = if frame.context {
                call.scope.extend()
            } else {
                call.scope.clone()
            };

            with_scope(call, scope, |call| {
                bind_inherited(&frame, &call.scope, &inner, inherit);
                let mut ran = false;
                iterate(call, &inner, &ranges, &body, &mut ran)?;
                if !ran {
                    if let Some(otherwise) = &otherwise {
                        otherwise(call, &inner)?;
                    }
                }
                Ok(None)
            })
        })
    }

    fn expr(&self, expr: &Expr) -> ExprFn {
        match expr {
            Expr::Literal(id) => {
                let value = self.literals.get(*id).cloned().unwrap_or_default();
                Rc::new(move |_, _| Ok(value.clone()))
            }
            Expr::Load(Binding::Scope(name)) => {
                let name = name.clone();
                Rc::new(move |call, _| Ok(call.scope.get(&name)))
            }
            Expr::Load(Binding::Slot { depth, index }) => {
                let (depth, index) = (*depth, *index);
                Rc::new(move |_, activation| Ok(activation.get(depth, index)))
            }
            Expr::SelfRef => Rc::new(|call, _| Ok(Value::Scope(call.scope.clone()))),
            Expr::Array(items) => {
                let items = self.exprs(items);
                Rc::new(move |call, activation| {
                    items
                        .iter()
                        .map(|item| item(call, activation))
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::array)
                })
            }
            Expr::Dict(entries) => {
                let entries = entries
                    .iter()
                    .map(|(k, v)| (self.expr(k), self.expr(v)))
                    .collect::<Vec<_>>();
                Rc::new(move |call, activation| {
                    let mut evaluated = Vec::with_capacity(entries.len());
                    for (k, v) in &entries {
                        evaluated.push((k(call, activation)?, v(call, activation)?));
                    }
                    Ok(ops::dict(evaluated))
                })
            }
            Expr::Member(object, property) => {
                let object = self.expr(object);
                let property = self.expr(property);
                Rc::new(move |call, activation| {
                    let object = object(call, activation)?;
                    let property = property(call, activation)?;
                    Ok(ops::member(&object, &property))
                })
            }
            Expr::Call(target, args) => {
                let target = self.expr(target);
                let args = self.exprs(args);
                Rc::new(move |call, activation| {
                    let func = target(call, activation)?;
                    let args = args
                        .iter()
                        .map(|arg| arg(call, activation))
                        .collect::<Result<Vec<_>, _>>()?;
                    exec(call, &func, &args)
                })
            }
            Expr::Bind(target, args) => {
                let target = self.expr(target);
                let args = self.exprs(args);
                Rc::new(move |call, activation| {
                    let func = target(call, activation)?;
                    let args = args
                        .iter()
                        .map(|arg| arg(call, activation))
                        .collect::<Result<Vec<_>, _>>()?;
                    bind(call, &func, args)
                })
            }
            Expr::Format { formatter, data } => {
                let formatter = Rc::clone(&self.formatters[*formatter]);
                let data = self.expr(data);
                Rc::new(move |call, activation| {
                    let data = data(call, activation)?;
                    formatter.format(call, &data)
                })
            }
            Expr::DynamicFormat { cache, format, data } => {
                let cache = Rc::clone(&self.caches[*cache]);
                let format = self.expr(format);
                let data = self.expr(data);
                Rc::new(move |call, activation| {
                    let format = format(call, activation)?;
                    let data = data(call, activation)?;
                    cache.format(call, &format, &data)
                })
            }
            Expr::Cond(cond, then, otherwise) => {
                let cond = self.expr(cond);
                let then = self.expr(then);
                let otherwise = self.expr(otherwise);
                Rc::new(move |call, activation| {
                    if ops::truthy(&cond(call, activation)?) {
                        then(call, activation)
                    } else {
                        otherwise(call, activation)
                    }
                })
            }
            Expr::And(l, r) => {
                let l = self.expr(l);
                let r = self.expr(r);
                Rc::new(move |call, activation| {
                    let left = l(call, activation)?;
                    if ops::truthy(&left) { r(call, activation) } else { Ok(left) }
                })
            }
            Expr::Or(l, r) => {
                let l = self.expr(l);
                let r = self.expr(r);
                Rc::new(move |call, activation| {
                    let left = l(call, activation)?;
                    if ops::truthy(&left) { Ok(left) } else { r(call, activation) }
                })
            }
            Expr::Binary(op, l, r) => {
                let op = *op;
                let l = self.expr(l);
                let r = self.expr(r);
                Rc::new(move |call, activation| {
                    let left = l(call, activation)?;
                    let right = r(call, activation)?;
                    Ok(ops::binary(op, &left, &right))
                })
            }
            Expr::Unary(op, e) => {
                let op = *op;
                let e = self.expr(e);
                Rc::new(move |call, activation| Ok(ops::unary(op, &e(call, activation)?)))
            }
            Expr::Closure(partial) => self.partial(partial),
        }
    }

    fn partial(&self, partial: &ir::Partial) -> ExprFn {
        let body = Rc::new(PartialBody {
            frame: partial.frame.clone(),
            params: partial.params.clone(),
            body: self.block(&partial.body),
        });
        let previous = partial.previous.clone();

        Rc::new(move |call, activation| {
            let body = Rc::clone(&body);
            let scope = call.scope.clone();
            let parent = Rc::clone(activation);

            Ok(match &previous {
                Some(binding) => {
                    let previous = load(&call.scope, activation, binding);
                    define_guarded_partial(previous, move |call, args, previous| {
                        body.invoke(call, (&scope, &parent), args, previous.clone())
                    })
                }
                None => define_partial(move |call, args| body.invoke(call, (&scope, &parent), args, Value::Nil)),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Builder;
    use crate::ast::node::NodeRef;
    use crate::codegen::{GenerateOptions, generate};
    use crate::rewriter::rewrite;
    use crate::runtime::function::Function;
    use crate::runtime::ops::BinaryOp;
    use crate::runtime::writer::StringWriter;
    use rstest::{fixture, rstest};

    #[fixture]
    fn runtime() -> Runtime {
        Runtime::new()
    }

    fn compile(b: Builder, root: NodeRef) -> CompiledTemplate {
        let mut program = b.finish(root);
        let rewritten = rewrite(&program.root, &mut program.literals, true);
        let lowered = generate(
            &rewritten.root,
            &rewritten.annotations,
            &program.literals,
            &GenerateOptions::default(),
        )
        .unwrap();
        ClosureEmitter.emit(&lowered, &program.literals)
    }

    fn render(runtime: &Runtime, template: &CompiledTemplate, scope: Scope) -> String {
        let mut writer = StringWriter::default();
        template.render(runtime, scope, &mut writer).unwrap();
        writer.end_render()
    }

    #[rstest]
    fn test_local_binding_shadows_global(runtime: Runtime) {
        let mut b = Builder::new();
        let global = b.string("Hello, World!");
        let local = b.string("Local Hello");
        let body = b.statements(vec![b.assign("greeting", local), b.output(b.ident("greeting"))]);
        let p = b.partial("p", &[], None, body);
        let root = b.statements(vec![
            b.assign("greeting", global),
            p,
            b.expression(b.call(b.ident("p"), vec![])),
            b.output(b.ident("greeting")),
        ]);
        let template = compile(b, root);
        let scope = runtime.globals().extend();
        assert_eq!(render(&runtime, &template, scope.clone()), "Local HelloHello, World!");
        assert_eq!(scope.get("greeting"), Value::from("Hello, World!"));
    }

    #[rstest]
    fn test_recursive_partial(runtime: Runtime) {
        let mut b = Builder::new();
        let zero = b.number(0.0);
        let one = b.number(1.0);
        let recurse = b.call(b.ident("count"), vec![b.binary(BinaryOp::Sub, b.ident("n"), one)]);
        let body = b.statements(vec![b.if_(
            b.binary(BinaryOp::Gt, b.ident("n"), zero),
            b.statements(vec![b.output(b.ident("n")), b.expression(recurse)]),
            None,
        )]);
        let three = b.number(3.0);
        let count = b.partial("count", &["n"], None, body);
        let root = b.statements(vec![count, b.expression(b.call(b.ident("count"), vec![three]))]);
        let template = compile(b, root);
        assert_eq!(render(&runtime, &template, runtime.globals().extend()), "321");
    }

    #[rstest]
    fn test_guard_chain_order(runtime: Runtime) {
        let mut b = Builder::new();
        let one = b.number(1.0);
        let two = b.number(2.0);
        let first = b.string("first");
        let second = b.string("second");
        let g1 = b.binary(BinaryOp::Eq, b.ident("x"), one);
        let g2 = b.binary(BinaryOp::Eq, b.ident("x"), two);
        let first_body = b.statements(vec![b.output(first)]);
        let second_body = b.statements(vec![b.output(second)]);
        let mut items = vec![
            b.partial("f", &["x"], Some(g1), first_body),
            b.partial("f", &["x"], Some(g2), second_body),
        ];
        for n in [1.0, 2.0, 3.0] {
            let arg = b.number(n);
            items.push(b.expression(b.call(b.ident("f"), vec![arg])));
        }
        let root = b.statements(items);
        let template = compile(b, root);
        assert_eq!(render(&runtime, &template, runtime.globals().extend()), "firstsecond");
    }

    #[rstest]
    fn test_loop_else_and_guards(runtime: Runtime) {
        let mut b = Builder::new();
        let two = b.number(2.0);
        let none = b.string("none");
        let range = b.range("v", None, b.ident("xs"), Some(b.binary(BinaryOp::Nq, b.ident("v"), two)));
        let body = b.statements(vec![b.output(b.ident("v"))]);
        let otherwise = b.statements(vec![b.output(none)]);
        let l = b.for_loop(vec![range], body, Some(otherwise));
        let root = b.statements(vec![l]);
        let template = compile(b, root);

        let scope = runtime.globals().extend();
        scope.set("xs", Value::array(vec![Value::from(1.0), Value::from(2.0), Value::from(3.0)]));
        assert_eq!(render(&runtime, &template, scope), "13");

        let scope = runtime.globals().extend();
        scope.set("xs", Value::array(vec![]));
        assert_eq!(render(&runtime, &template, scope), "none");
    }

    #[rstest]
    fn test_using_exposes_entries(runtime: Runtime) {
        let mut b = Builder::new();
        let body = b.statements(vec![b.output(b.ident("name"))]);
        let using = b.using(vec![b.ident("user")], body);
        let root = b.statements(vec![using]);
        let template = compile(b, root);

        let scope = runtime.globals().extend();
        let mut user = crate::value::Dict::new();
        user.insert("name".into(), Value::from("ada"));
        scope.set("user", Value::object(user));
        assert_eq!(render(&runtime, &template, scope), "ada");
    }

    #[rstest]
    fn test_call_unblessed_fails(runtime: Runtime) {
        let mut b = Builder::new();
        let root = b.statements(vec![b.expression(b.call(b.ident("host"), vec![]))]);
        let template = compile(b, root);
        runtime.define_global("host", Value::Function(Function::new(|_, _| Ok(Value::Nil))));
        let mut writer = StringWriter::default();
        let result = template.render(&runtime, runtime.globals().extend(), &mut writer);
        assert!(matches!(result, Err(RuntimeError::NotBlessed { .. })));
    }

    #[rstest]
    fn test_block_value(runtime: Runtime) {
        let mut b = Builder::new();
        let one = b.number(1.0);
        let two = b.number(2.0);
        let root = b.statements(vec![b.expression(one), b.expression(b.ident("x")), b.output(two)]);
        let template = compile(b, root);
        let scope = runtime.globals().extend();
        scope.set("x", Value::from("last"));
        let mut writer = StringWriter::default();
        assert_eq!(template.render(&runtime, scope, &mut writer), Ok(Value::from("last")));
    }
}
