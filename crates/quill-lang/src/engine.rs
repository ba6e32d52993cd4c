use std::{fmt, rc::Rc};

use serde::Deserialize;

use crate::ast::{self, Program};
use crate::codegen::{self, ClosureEmitter, CodeEmitter, CompiledTemplate, GenerateOptions, SourceEmitter};
use crate::error::Error;
use crate::literal::LiteralTable;
use crate::rewriter::{Rewriter, Warning};
use crate::runtime::Runtime;
use crate::runtime::module::Module;
use crate::runtime::resolver::MemoryResolver;
use crate::runtime::scope::Scope;
use crate::runtime::writer::Writer;
use crate::value::Value;

/// Receives render errors instead of the caller.
pub type ErrorHandler = Rc<dyn Fn(&Error)>;

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Run the optimizing passes of the rewriter. Passes required for correct code
    /// generation always run.
    pub optimize: bool,
    pub cache_imports: bool,
    /// When set, a failed render reports here and yields an empty string.
    #[serde(skip)]
    pub on_error: Option<ErrorHandler>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            optimize: true,
            cache_imports: true,
            on_error: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("optimize", &self.optimize)
            .field("cache_imports", &self.cache_imports)
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Compiles parse trees and owns the runtime they render against.
#[derive(Debug)]
pub struct Engine {
    pub(crate) options: Options,
    runtime: Runtime,
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_options(Options::default())
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine whose runtime resolves modules registered through
    /// [`Engine::register_module`].
    pub fn with_options(options: Options) -> Self {
        let runtime = Runtime::new();
        runtime.add_resolver(Rc::new(MemoryResolver::new()));
        Self { options, runtime }
    }

    pub fn set_optimize(&mut self, optimize: bool) {
        self.options.optimize = optimize;
    }

    pub fn set_cache_imports(&mut self, cache_imports: bool) {
        self.options.cache_imports = cache_imports;
    }

    pub fn set_error_handler(&mut self, handler: impl Fn(&Error) + 'static) {
        self.options.on_error = Some(Rc::new(handler));
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    #[allow(clippy::result_large_err)]
    pub fn compile(&self, program: &Program) -> Result<Template, Error> {
        let (lowered, literals, warnings) = self.lower(program)?;
        let compiled = ClosureEmitter.emit(&lowered, &literals);
        Ok(Template {
            compiled,
            warnings,
            on_error: self.options.on_error.clone(),
        })
    }

    #[allow(clippy::result_large_err)]
    pub fn compile_json(&self, json: &str) -> Result<Template, Error> {
        self.compile(&ast::decode(json)?)
    }

    /// Compiles `program` to the source of a Rust module; see [`SourceEmitter`].
    #[allow(clippy::result_large_err)]
    pub fn generate_source(&self, program: &Program) -> Result<GeneratedSource, Error> {
        let (lowered, literals, warnings) = self.lower(program)?;
        Ok(GeneratedSource {
            source: SourceEmitter::default().emit(&lowered, &literals),
            warnings,
        })
    }

    /// Makes `template` importable under `name`.
    pub fn register_module(&self, name: &str, template: &Template) -> bool {
        self.runtime.register_module(name, template.clone().into_module())
    }

    pub fn unregister_module(&self, name: &str) -> bool {
        self.runtime.unregister_module(name)
    }

    #[allow(clippy::result_large_err)]
    pub fn render(&self, template: &Template, data: &Value) -> Result<String, Error> {
        template.render(&self.runtime, data)
    }

    #[allow(clippy::result_large_err)]
    fn lower(&self, program: &Program) -> Result<(codegen::ir::Program, LiteralTable, Vec<Warning>), Error> {
        let mut literals = program.literals.clone();
        let rewritten = Rewriter::new(&mut literals)
            .optimize(self.options.optimize)
            .rewrite(&program.root);
        let lowered = codegen::generate(
            &rewritten.root,
            &rewritten.annotations,
            &literals,
            &GenerateOptions {
                cache_imports: self.options.cache_imports,
            },
        )?;

        tracing::debug!(
            warnings = rewritten.warnings.len(),
            formatters = lowered.formatters.len(),
            caches = lowered.caches,
            importers = lowered.importers.len(),
            "template compiled"
        );
        Ok((lowered, literals, rewritten.warnings))
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

/// Output of [`Engine::generate_source`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSource {
    pub source: String,
    pub warnings: Vec<Warning>,
}

/// A compiled template.
#[derive(Clone)]
pub struct Template {
    compiled: CompiledTemplate,
    warnings: Vec<Warning>,
    on_error: Option<ErrorHandler>,
}

impl Template {
    /// Warnings reported while compiling.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Renders to a string with `data` exposed as the ambient scope.
    ///
    /// The render scope is cleared afterwards: partials defined by the template capture it,
    /// and clearing breaks those reference cycles.
    #[allow(clippy::result_large_err)]
    pub fn render(&self, runtime: &Runtime, data: &Value) -> Result<String, Error> {
        let scope = runtime.globals().extend_from(std::slice::from_ref(data));
        let mut writer = runtime.string_writer();
        writer.start_render();
        let result = self.compiled.render(runtime, scope.clone(), &mut writer);
        scope.clear();

        match result {
            Ok(_) => Ok(writer.end_render()),
            Err(err) => self.fail(err.into()).map(|_| String::new()),
        }
    }

    /// Renders into a caller-supplied scope and writer and returns the template's value.
    #[allow(clippy::result_large_err)]
    pub fn render_to(&self, runtime: &Runtime, scope: Scope, writer: &mut dyn Writer) -> Result<Value, Error> {
        match self.compiled.render(runtime, scope, writer) {
            Ok(value) => Ok(value),
            Err(err) => self.fail(err.into()).map(|_| Value::Nil),
        }
    }

    pub fn into_module(self) -> Module {
        self.compiled.into_module()
    }

    #[allow(clippy::result_large_err)]
    fn fail(&self, err: Error) -> Result<(), Error> {
        match &self.on_error {
            Some(handler) => {
                tracing::debug!(error = %err, "render error passed to handler");
                handler(&err);
                Ok(())
            }
            None => Err(err),
        }
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("compiled", &self.compiled)
            .field("warnings", &self.warnings)
            .finish()
    }
}
