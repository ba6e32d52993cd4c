//! The execution ABI shared by both code generation backends.

pub mod activation;
pub mod cache;
pub mod error;
pub mod escape;
pub mod format;
pub mod function;
pub mod markup;
pub mod matching;
pub mod module;
pub mod ops;
pub mod resolver;
pub mod scope;
pub mod writer;

use crate::value::{Name, Value};
use escape::Escaper;
use error::RuntimeError;
use module::Module;
use resolver::Resolver;
use scope::Scope;
use serde::Deserialize;
use std::{cell::RefCell, fmt, rc::Rc};
use writer::StringWriter;

/// Sizes of the runtime's bounded caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    pub formatter_cache_size: usize,
    pub escape_cache_size: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            formatter_cache_size: cache::DEFAULT_CAPACITY,
            escape_cache_size: cache::DEFAULT_CAPACITY,
        }
    }
}

/// Everything a render shares: the global scope, the resolver list and the caches.
///
/// There is no process-wide state. A `Runtime` is single-threaded (`!Send`); hosts that
/// render in parallel build one per thread.
pub struct Runtime {
    globals: Scope,
    resolvers: RefCell<Vec<Rc<dyn Resolver>>>,
    escaper: Escaper,
    options: RuntimeOptions,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::with_options(RuntimeOptions::default())
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RuntimeOptions) -> Self {
        Self {
            globals: Scope::new(),
            resolvers: RefCell::new(Vec::new()),
            escaper: Escaper::new(options.escape_cache_size),
            options,
        }
    }

    pub fn globals(&self) -> &Scope {
        &self.globals
    }

    pub fn define_global(&self, name: impl Into<Name>, value: Value) {
        self.globals.set(name, value);
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn escaper(&self) -> &Escaper {
        &self.escaper
    }

    /// A string writer sharing this runtime's escape caches.
    pub fn string_writer(&self) -> StringWriter {
        StringWriter::new(self.escaper.clone())
    }

    pub fn add_resolver(&self, resolver: Rc<dyn Resolver>) {
        self.resolvers.borrow_mut().push(resolver);
    }

    pub fn remove_resolver(&self, resolver: &Rc<dyn Resolver>) -> bool {
        let mut resolvers = self.resolvers.borrow_mut();
        let before = resolvers.len();
        resolvers.retain(|r| !Rc::ptr_eq(r, resolver));
        before != resolvers.len()
    }

    // Resolvers may import (and so consult this list) while resolving; iterate a snapshot.
    fn snapshot(&self) -> Vec<Rc<dyn Resolver>> {
        self.resolvers.borrow().clone()
    }

    pub fn resolve_module(&self, name: &str) -> Result<Option<Module>, RuntimeError> {
        for resolver in self.snapshot().iter().rev() {
            if let Some(module) = resolver.resolve_module(name, self)? {
                return Ok(Some(module));
            }
        }
        Ok(None)
    }

    pub fn resolve_exports(&self, name: &str) -> Result<Option<Value>, RuntimeError> {
        for resolver in self.snapshot().iter().rev() {
            if let Some(exports) = resolver.resolve_exports(name, self)? {
                return Ok(Some(exports));
            }
        }
        tracing::debug!(module = name, "module not resolved");
        Ok(None)
    }

    /// Registers `module` with the most recently added resolver that accepts it.
    pub fn register_module(&self, name: &str, module: Module) -> bool {
        self.snapshot()
            .iter()
            .rev()
            .any(|r| r.register_module(name, module.clone()))
    }

    /// Removes `name` from every resolver holding it.
    pub fn unregister_module(&self, name: &str) -> bool {
        self.snapshot()
            .iter()
            .fold(false, |removed, r| r.unregister_module(name) || removed)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("globals", &self.globals)
            .field("resolvers", &self.resolvers.borrow().len())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolver::{HelperResolver, MemoryResolver};
    use rstest::rstest;

    fn module_with(value: f64) -> Module {
        Module::new(move |call| {
            call.scope.set("v", Value::from(value));
            Ok(Value::Nil)
        })
    }

    #[rstest]
    fn test_last_registered_resolver_wins() {
        let runtime = Runtime::new();
        let older = Rc::new(MemoryResolver::new());
        let newer = Rc::new(MemoryResolver::new());
        older.insert("m", module_with(1.0));
        newer.insert("m", module_with(2.0));
        runtime.add_resolver(older.clone());
        runtime.add_resolver(newer.clone());

        let exports = runtime.resolve_exports("m").unwrap().unwrap_or_default();
        assert_eq!(exports.property("v"), Value::from(2.0));

        let newer: Rc<dyn Resolver> = newer;
        assert!(runtime.remove_resolver(&newer));
        let exports = runtime.resolve_exports("m").unwrap().unwrap_or_default();
        assert_eq!(exports.property("v"), Value::from(1.0));
    }

    #[rstest]
    fn test_register_skips_read_only_resolvers() {
        let runtime = Runtime::new();
        let memory = Rc::new(MemoryResolver::new());
        runtime.add_resolver(memory.clone());
        runtime.add_resolver(Rc::new(HelperResolver::new()));

        assert!(runtime.register_module("page", module_with(3.0)));
        assert!(memory.contains("page"));
        assert!(runtime.resolve_module("page").unwrap().is_some());
        assert!(runtime.unregister_module("page"));
        assert_eq!(runtime.resolve_exports("page"), Ok(None));
    }

    #[test]
    fn test_options_from_json() {
        let options: RuntimeOptions = serde_json::from_str(r#"{"formatter_cache_size": 8}"#).unwrap();
        assert_eq!(options.formatter_cache_size, 8);
        assert_eq!(options.escape_cache_size, cache::DEFAULT_CAPACITY);
    }
}
