//! The source backend.
//!
//! Writes a lowered program as a Rust module that renders through [`crate::abi`]. The
//! module defines one struct holding the literal table and the shared formatters,
//! formatter caches and importers, plus a `render` entry point:
//!
//! ```text
//! use quill_lang::abi;
//!
//! pub struct Template { literals: Vec<abi::Value>, f0: abi::Formatter, .. }
//!
//! impl Template {
//!     pub fn new() -> abi::Rc<Self> { .. }
//!     pub fn render(self: &abi::Rc<Self>, runtime: &abi::Runtime, scope: abi::Scope, writer: &mut dyn abi::Writer) -> Result<abi::Value, abi::RuntimeError> { .. }
//!     pub fn call(self: &abi::Rc<Self>, call: &mut abi::Call<'_>) -> Result<abi::Value, abi::RuntimeError> { .. }
//! }
//! ```
//!
//! Every intermediate value is bound to a fresh `let` so that no expression borrows the
//! call context twice.

use super::CodeEmitter;
use super::ir::{self, Binding, Block, Expr, Frame, ImportBinding, Stmt};
use crate::literal::LiteralTable;
use crate::value::Value;
use itertools::Itertools;

const INDENT: &str = "    ";

#[derive(Debug, Clone)]
pub struct SourceEmitter {
    type_name: String,
}

impl SourceEmitter {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
        }
    }
}

impl Default for SourceEmitter {
    fn default() -> Self {
        Self::new("Template")
    }
}

impl CodeEmitter for SourceEmitter {
    type Output = String;

    fn emit(&self, program: &ir::Program, literals: &LiteralTable) -> String {
        let mut source = Source::default();
        source.module(&self.type_name, program, literals);
        source.out
    }
}

/// A Rust expression constructing `value`.
fn constructor(value: &Value) -> String {
    match value {
        Value::Bool(b) => format!("abi::Value::Bool({b})"),
        Value::Number(n) => {
            let n = n.value();
            if n.is_nan() {
                "abi::Value::from(f64::NAN)".to_string()
            } else if n.is_infinite() {
                format!("abi::Value::from(f64::{}INFINITY)", if n < 0.0 { "NEG_" } else { "" })
            } else {
                format!("abi::Value::from({n:?}_f64)")
            }
        }
        Value::String(s) => format!("abi::Value::from({:?})", s.as_str()),
        Value::Array(items) => format!("abi::Value::array(vec![{}])", items.iter().map(constructor).join(", ")),
        Value::Object(dict) if dict.is_empty() => "abi::Value::object(abi::Dict::new())".to_string(),
        Value::Object(dict) => format!(
            "abi::Value::object(abi::Dict::from([{}]))",
            dict.iter()
                .map(|(k, v)| format!("(abi::Name::new({:?}), {})", k.as_str(), constructor(v)))
                .join(", ")
        ),
        Value::Nil | Value::Scope(_) | Value::Function(_) => "abi::Value::Nil".to_string(),
    }
}

#[derive(Default)]
struct Source {
    out: String,
    indent: usize,
    temps: usize,
    /// Nesting level of the current activation variable, `a{level}`.
    level: usize,
}

impl Source {
    fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.indent += 1;
    }

    fn close(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    fn temp(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.temps);
        self.temps += 1;
        name
    }

    fn activation(&self) -> String {
        format!("a{}", self.level)
    }

    fn module(&mut self, type_name: &str, program: &ir::Program, literals: &LiteralTable) {
        self.line("// Generated template module. Do not edit.");
        self.line("use quill_lang::abi;");
        self.line("");
        self.open(format!("pub struct {type_name} {{"));
        self.line("literals: Vec<abi::Value>,");
        for i in 0..program.formatters.len() {
            self.line(format!("f{i}: abi::Formatter,"));
        }
        for i in 0..program.caches {
            self.line(format!("c{i}: abi::FormatterCache,"));
        }
        for i in 0..program.importers.len() {
            self.line(format!("i{i}: abi::Importer,"));
        }
        self.close("}");
        self.line("");

        self.line("#[allow(unused_mut, unused_variables, unused_assignments, clippy::all)]");
        self.open(format!("impl {type_name} {{"));
        self.open("pub fn new() -> abi::Rc<Self> {");
        self.open("abi::Rc::new(Self {");
        self.open("literals: vec![");
        for (_, value) in literals.iter() {
            let value = constructor(value);
            self.line(format!("{value},"));
        }
        self.close("],");
        for (i, id) in program.formatters.iter().enumerate() {
            let format = literals.get(*id).map(ToString::to_string).unwrap_or_default();
            self.line(format!("f{i}: abi::Formatter::build({format:?}),"));
        }
        for i in 0..program.caches {
            self.line(format!("c{i}: abi::FormatterCache::new(),"));
        }
        for (i, name) in program.importers.iter().enumerate() {
            self.line(format!(
                "i{i}: abi::Importer::new({:?}, {}),",
                name.as_str(),
                program.cache_imports
            ));
        }
        self.close("})");
        self.close("}");
        self.line("");

        self.open("pub fn render(self: &abi::Rc<Self>, runtime: &abi::Runtime, scope: abi::Scope, writer: &mut dyn abi::Writer) -> Result<abi::Value, abi::RuntimeError> {");
        self.line("let mut call = abi::Call::new(runtime, scope, writer);");
        self.line("self.call(&mut call)");
        self.close("}");
        self.line("");

        self.open("pub fn call(self: &abi::Rc<Self>, call: &mut abi::Call<'_>) -> Result<abi::Value, abi::RuntimeError> {");
        self.line("let t = abi::Rc::clone(self);");
        self.line(format!("let a0 = abi::Activation::root({});", program.root_slots));
        let result = self.block(&program.body);
        self.line(format!("Ok({result}.unwrap_or_default())"));
        self.close("}");
        self.close("}");
    }

    /// Emits `block` and returns the variable holding its value.
    fn block(&mut self, block: &Block) -> String {
        let target = self.temp("b");
        self.line(format!("let mut {target}: Option<abi::Value> = None;"));
        for stmt in block {
            self.stmt(stmt, &target);
        }
        target
    }

    fn load(&self, scope: &str, activation: &str, binding: &Binding) -> String {
        match binding {
            Binding::Scope(name) => format!("{scope}.get({:?})", name.as_str()),
            Binding::Slot { depth, index } => format!("{activation}.get({depth}, {index})"),
        }
    }

    fn store(&mut self, binding: &Binding, value: &str) {
        match binding {
            Binding::Scope(name) => self.line(format!("call.scope.set({:?}, {value});", name.as_str())),
            Binding::Slot { depth, index } => {
                let activation = self.activation();
                self.line(format!("{activation}.set({depth}, {index}, {value});"))
            }
        }
    }

    /// Reads the inherited values of `frame` from the enclosing frame.
    fn inherit_sources(&mut self, frame: &Frame, scope: &str, activation: &str) -> Vec<String> {
        frame
            .inherit
            .iter()
            .map(|(_, source)| {
                let name = self.temp("v");
                let load = self.load(scope, activation, source);
                self.line(format!("let {name} = {load};"));
                name
            })
            .collect()
    }

    fn inherit_targets(&mut self, frame: &Frame, values: &[String]) {
        for ((target, _), value) in frame.inherit.iter().zip(values) {
            self.store(target, value);
        }
    }

    fn scope_for(frame: &Frame, outer: &str) -> String {
        if frame.context {
            format!("{outer}.extend()")
        } else {
            format!("{outer}.clone()")
        }
    }

    fn stmt(&mut self, stmt: &Stmt, target: &str) {
        match stmt {
            Stmt::Expr(e) => {
                let v = self.expr(e);
                self.line(format!("{target} = Some({v});"));
            }
            Stmt::Output(e) => {
                let v = self.expr(e);
                self.line(format!("abi::output(call, &{v})?;"));
            }
            Stmt::Raw(text) => self.line(format!("call.writer.raw({:?});", text.as_str())),
            Stmt::OpenTag {
                name,
                attrs,
                self_close,
            } => {
                let name = self.expr(name);
                let attrs = match attrs {
                    Some(attrs) => self.expr(attrs),
                    None => "abi::Value::Nil".to_string(),
                };
                self.line(format!("abi::open_element(call, &{name}, &{attrs}, {self_close});"));
            }
            Stmt::CloseTag(name) => {
                let name = self.expr(name);
                self.line(format!("abi::close_element(call, &{name});"));
            }
            Stmt::Comment(text) => {
                let text = self.expr(text);
                self.line(format!("abi::comment(call, &{text});"));
            }
            Stmt::DocType(root) => {
                let root = self.expr(root);
                self.line(format!("abi::doc_type(call, &{root});"));
            }
            Stmt::Store(binding, e) => {
                let v = self.expr(e);
                self.store(binding, &v);
            }
            Stmt::If { cond, then, otherwise } => {
                let c = self.expr(cond);
                self.open(format!("if abi::truthy(&{c}) {{"));
                for stmt in then {
                    self.stmt(stmt, target);
                }
                if let Some(otherwise) = otherwise {
                    self.close("} else {");
                    self.indent += 1;
                    for stmt in otherwise {
                        self.stmt(stmt, target);
                    }
                }
                self.close("}");
            }
            Stmt::For(l) => self.for_loop(l),
            Stmt::Using { frame, exprs, body } => {
                let values = exprs.iter().map(|e| self.expr(e)).join(", ");
                let outer = self.activation();
                let inherit = self.inherit_sources(frame, "call.scope", &outer);
                let result = self.temp("v");
                self.level += 1;
                let inner = self.activation();
                self.line(format!("let {inner} = abi::Activation::new(&{outer}, {});", frame.slots));
                self.line(format!("let scope = call.scope.extend_from(&[{values}]);"));
                self.open(format!("let {result} = abi::with_scope(call, scope, |call| {{"));
                self.inherit_targets(frame, &inherit);
                let value = self.block(body);
                self.line(format!("Ok({value})"));
                self.close("})?;");
                self.level -= 1;
                self.open(format!("if {result}.is_some() {{"));
                self.line(format!("{target} = {result};"));
                self.close("}");
            }
            Stmt::Import { importer, binding } => {
                let exports = self.temp("v");
                self.line(format!("let {exports} = t.i{importer}.import(call)?;"));
                match binding {
                    ImportBinding::Whole(binding) => self.store(binding, &exports),
                    ImportBinding::Names(names) => {
                        for (name, binding) in names {
                            self.store(binding, &format!("{exports}.property({:?})", name.as_str()));
                        }
                    }
                }
            }
            Stmt::Delegate => {
                let activation = self.activation();
                self.line(format!("{target} = Some(abi::delegate(call, &{activation})?);"));
            }
        }
    }

    fn for_loop(&mut self, l: &ir::Loop) {
        let outer = self.activation();
        self.open("{");
        let inherit = self.inherit_sources(&l.frame, "call.scope", &outer);
        self.level += 1;
        let inner = self.activation();
        self.line(format!("let {inner} = abi::Activation::new(&{outer}, {});", l.frame.slots));
        self.line(format!("let scope = {};", Self::scope_for(&l.frame, "call.scope")));
        self.open("abi::with_scope(call, scope, |call| {");
        self.inherit_targets(&l.frame, &inherit);
        self.line("let mut ran = false;");
        self.ranges(&l.ranges, &l.body);
        if let Some(otherwise) = &l.otherwise {
            self.open("if !ran {");
            self.block(otherwise);
            self.close("}");
        }
        self.line("Ok(())");
        self.close("})?;");
        self.level -= 1;
        self.close("}");
    }

    fn ranges(&mut self, ranges: &[ir::LoopRange], body: &Block) {
        let Some((range, rest)) = ranges.split_first() else {
            self.line("ran = true;");
            self.block(body);
            return;
        };

        let collection = self.expr(&range.collection);
        let key = self.temp("k");
        let value = self.temp("v");
        self.open(format!("for ({key}, {value}) in abi::iterate(&{collection}) {{"));
        self.store(&range.value, &value);
        if let Some(binding) = &range.key {
            self.store(binding, &key);
        }
        if let Some(guard) = &range.guard {
            let g = self.expr(guard);
            self.open(format!("if !abi::truthy(&{g}) {{"));
            self.line("continue;");
            self.close("}");
        }
        self.ranges(rest, body);
        self.close("}");
    }

    fn exprs(&mut self, exprs: &[Expr]) -> String {
        exprs.iter().map(|e| self.expr(e)).join(", ")
    }

    /// Emits `expr` and returns the variable holding its value.
    fn expr(&mut self, expr: &Expr) -> String {
        let value = match expr {
            Expr::Literal(id) => format!("t.literals[{}].clone()", id.index()),
            Expr::Load(binding) => {
                let activation = self.activation();
                self.load("call.scope", &activation, binding)
            }
            Expr::SelfRef => "abi::Value::Scope(call.scope.clone())".to_string(),
            Expr::Array(items) => format!("abi::Value::array(vec![{}])", self.exprs(items)),
            Expr::Dict(entries) => {
                let entries = entries
                    .iter()
                    .map(|(k, v)| {
                        let k = self.expr(k);
                        let v = self.expr(v);
                        format!("({k}, {v})")
                    })
                    .join(", ");
                format!("abi::dict(vec![{entries}])")
            }
            Expr::Member(object, property) => {
                let object = self.expr(object);
                let property = self.expr(property);
                format!("abi::member(&{object}, &{property})")
            }
            Expr::Call(target, args) => {
                let target = self.expr(target);
                let args = self.exprs(args);
                format!("abi::exec(call, &{target}, &[{args}])?")
            }
            Expr::Bind(target, args) => {
                let target = self.expr(target);
                let args = self.exprs(args);
                format!("abi::bind(call, &{target}, vec![{args}])?")
            }
            Expr::Format { formatter, data } => {
                let data = self.expr(data);
                format!("t.f{formatter}.format(call, &{data})?")
            }
            Expr::DynamicFormat { cache, format, data } => {
                let format = self.expr(format);
                let data = self.expr(data);
                format!("t.c{cache}.format(call, &{format}, &{data})?")
            }
            Expr::Cond(cond, then, otherwise) => {
                let cond = self.expr(cond);
                return self.branches(&format!("abi::truthy(&{cond})"), then, otherwise);
            }
            Expr::And(l, r) => {
                let left = self.expr(l);
                let result = self.temp("v");
                self.open(format!("let {result} = if abi::truthy(&{left}) {{"));
                let right = self.expr(r);
                self.line(right);
                self.close("} else {");
                self.indent += 1;
                self.line(left);
                self.close("};");
                return result;
            }
            Expr::Or(l, r) => {
                let left = self.expr(l);
                let result = self.temp("v");
                self.open(format!("let {result} = if abi::truthy(&{left}) {{"));
                self.line(&left);
                self.close("} else {");
                self.indent += 1;
                let right = self.expr(r);
                self.line(right);
                self.close("};");
                return result;
            }
            Expr::Binary(op, l, r) => {
                let l = self.expr(l);
                let r = self.expr(r);
                format!("abi::binary(abi::BinaryOp::{op:?}, &{l}, &{r})")
            }
            Expr::Unary(op, e) => {
                let e = self.expr(e);
                format!("abi::unary(abi::UnaryOp::{op:?}, &{e})")
            }
            Expr::Closure(partial) => return self.partial(partial),
        };

        let name = self.temp("v");
        self.line(format!("let {name} = {value};"));
        name
    }

    fn branches(&mut self, cond: &str, then: &Expr, otherwise: &Expr) -> String {
        let result = self.temp("v");
        self.open(format!("let {result} = if {cond} {{"));
        let v = self.expr(then);
        self.line(v);
        self.close("} else {");
        self.indent += 1;
        let v = self.expr(otherwise);
        self.line(v);
        self.close("};");
        result
    }

    fn partial(&mut self, partial: &ir::Partial) -> String {
        let result = self.temp("v");
        let outer = self.activation();
        self.open(format!("let {result} = {{"));
        self.line("let t = abi::Rc::clone(&t);");
        self.line("let captured = call.scope.clone();");
        self.line(format!("let parent = abi::Rc::clone(&{outer});"));

        let previous = match &partial.previous {
            Some(binding) => {
                let load = self.load("call.scope", &outer, binding);
                self.line(format!("let previous = {load};"));
                self.open("abi::define_guarded_partial(previous, move |call, args, previous| {");
                "previous.clone()"
            }
            None => {
                self.open("abi::define_partial(move |call, args| {");
                "abi::Value::Nil"
            }
        };

        let inherit = self.inherit_sources(&partial.frame, "captured", "parent");
        self.level += 1;
        let inner = self.activation();
        self.line(format!(
            "let {inner} = abi::Activation::for_call(&parent, {}, args, {previous});",
            partial.frame.slots
        ));
        self.line(format!("let scope = {};", Self::scope_for(&partial.frame, "captured")));
        self.open("abi::with_scope(call, scope, |call| {");
        self.inherit_targets(&partial.frame, &inherit);
        for (i, param) in partial.params.iter().enumerate() {
            self.store(param, &format!("args.get({i}).cloned().unwrap_or_default()"));
        }
        let value = self.block(&partial.body);
        self.line(format!("Ok({value}.unwrap_or_default())"));
        self.close("})");
        self.level -= 1;
        self.close("})");
        self.close("};");
        result
    }
}
