use super::Runtime;
use super::error::RuntimeError;
use super::function::bless;
use super::module::Module;
use crate::value::{Dict, Name, Value};
use rustc_hash::FxHashMap;
use std::cell::RefCell;

/// A pluggable lookup strategy for named modules.
///
/// The runtime consults its resolvers most-recently-added first; the first one returning
/// `Some` wins.
pub trait Resolver {
    fn resolve_module(&self, name: &str, runtime: &Runtime) -> Result<Option<Module>, RuntimeError>;

    fn resolve_exports(&self, name: &str, runtime: &Runtime) -> Result<Option<Value>, RuntimeError>;

    /// Stores `module` under `name`. Returns `false` if this resolver is read-only.
    fn register_module(&self, _name: &str, _module: Module) -> bool {
        false
    }

    fn unregister_module(&self, _name: &str) -> bool {
        false
    }
}

#[derive(Debug)]
struct CacheEntry {
    module: Module,
    exports: Option<Value>,
    dirty: bool,
}

/// Holds modules registered at run time.
///
/// Replacing a module marks its entry dirty; exports are recomputed on the next lookup and
/// kept until the module changes again.
#[derive(Debug, Default)]
pub struct MemoryResolver {
    entries: RefCell<FxHashMap<Name, CacheEntry>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<Name>, module: Module) {
        let name = name.into();
        let mut entries = self.entries.borrow_mut();
        match entries.get_mut(&name) {
            Some(entry) => {
                entry.module = module;
                entry.dirty = true;
            }
            None => {
                entries.insert(
                    name,
                    CacheEntry {
                        module,
                        exports: None,
                        dirty: true,
                    },
                );
            }
        }
    }

    pub fn remove(&self, name: &str) -> bool {
        self.entries.borrow_mut().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    pub fn is_dirty(&self, name: &str) -> bool {
        self.entries.borrow().get(name).is_some_and(|e| e.dirty)
    }
}

impl Resolver for MemoryResolver {
    fn resolve_module(&self, name: &str, _runtime: &Runtime) -> Result<Option<Module>, RuntimeError> {
        Ok(self.entries.borrow().get(name).map(|e| e.module.clone()))
    }

    fn resolve_exports(&self, name: &str, runtime: &Runtime) -> Result<Option<Value>, RuntimeError> {
        // Probing may import from this resolver again, so no borrow is held across it.
        let module = match self.entries.borrow().get(name) {
            None => return Ok(None),
            Some(CacheEntry {
                exports: Some(exports),
                dirty: false,
                ..
            }) => return Ok(Some(exports.clone())),
            Some(entry) => entry.module.clone(),
        };

        let exports = module.exports(runtime)?;
        if let Some(entry) = self.entries.borrow_mut().get_mut(name) {
            if entry.module.ptr_eq(&module) {
                entry.exports = Some(exports.clone());
                entry.dirty = false;
            }
        }
        tracing::debug!(module = name, "memory resolver recomputed exports");
        Ok(Some(exports))
    }

    fn register_module(&self, name: &str, module: Module) -> bool {
        self.insert(name, module);
        true
    }

    fn unregister_module(&self, name: &str) -> bool {
        self.remove(name)
    }
}

/// Exposes tables of host functions as importable modules.
#[derive(Debug, Default)]
pub struct HelperResolver {
    helpers: RefCell<FxHashMap<Name, Value>>,
}

impl HelperResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `helpers` under `name`. Every function in the table is blessed.
    pub fn register_helpers(&self, name: impl Into<Name>, helpers: Dict) {
        let blessed = helpers.into_iter().map(|(k, v)| (k, bless(v))).collect::<Dict>();
        self.helpers
            .borrow_mut()
            .insert(name.into(), Value::object(blessed));
    }

    pub fn unregister_helpers(&self, name: &str) -> bool {
        self.helpers.borrow_mut().remove(name).is_some()
    }
}

impl Resolver for HelperResolver {
    fn resolve_module(&self, name: &str, _runtime: &Runtime) -> Result<Option<Module>, RuntimeError> {
        let Some(helpers) = self.helpers.borrow().get(name).cloned() else {
            return Ok(None);
        };

        Ok(Some(Module::new(move |call| {
            if let Value::Object(dict) = &helpers {
                call.scope.extend_with(dict);
            }
            Ok(Value::Nil)
        })))
    }

    fn resolve_exports(&self, name: &str, _runtime: &Runtime) -> Result<Option<Value>, RuntimeError> {
        Ok(self.helpers.borrow().get(name).cloned())
    }

    fn unregister_module(&self, name: &str) -> bool {
        self.unregister_helpers(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::function::{Blessing, Function};
    use std::{cell::Cell, rc::Rc};

    fn counting_module(runs: &Rc<Cell<u32>>, value: f64) -> Module {
        let runs = Rc::clone(runs);
        Module::new(move |call| {
            runs.set(runs.get() + 1);
            call.scope.set("v", Value::from(value));
            Ok(Value::Nil)
        })
    }

    #[test]
    fn test_memory_resolver_dirty_tracking() {
        let runtime = Runtime::new();
        let resolver = MemoryResolver::new();
        let runs = Rc::new(Cell::new(0));

        resolver.insert("m", counting_module(&runs, 1.0));
        assert!(resolver.is_dirty("m"));
        let first = resolver.resolve_exports("m", &runtime).unwrap();
        assert!(!resolver.is_dirty("m"));
        let again = resolver.resolve_exports("m", &runtime).unwrap();
        assert_eq!(first, again);
        assert_eq!(runs.get(), 1);

        resolver.insert("m", counting_module(&runs, 2.0));
        assert!(resolver.is_dirty("m"));
        let replaced = resolver.resolve_exports("m", &runtime).unwrap();
        assert_eq!(replaced.map(|e| e.property("v")), Some(Value::from(2.0)));
        assert_eq!(runs.get(), 2);

        assert!(resolver.unregister_module("m"));
        assert_eq!(resolver.resolve_exports("m", &runtime), Ok(None));
    }

    #[test]
    fn test_helper_resolver_blesses_functions() {
        let runtime = Runtime::new();
        let resolver = HelperResolver::new();
        let mut helpers = Dict::new();
        helpers.insert("shout".into(), Value::Function(Function::new(|_, _| Ok(Value::Nil))));
        resolver.register_helpers("text", helpers);

        let exports = resolver.resolve_exports("text", &runtime).unwrap().unwrap_or_default();
        assert_eq!(
            exports.property("shout").as_function().map(Function::blessing),
            Some(Blessing::Wrapped)
        );
        assert!(resolver.resolve_module("text", &runtime).unwrap().is_some());
        assert!(!resolver.register_module("text", Module::new(|_| Ok(Value::Nil))));
    }
}
