use super::Runtime;
use super::error::RuntimeError;
use super::function::Call;
use super::scope::Scope;
use super::writer::{NullWriter, Writer};
use crate::value::{Name, Value};
use std::{cell::RefCell, fmt, rc::Rc};

/// The top-level function of a compiled template.
pub type TemplateFn = dyn Fn(&mut Call<'_>) -> Result<Value, RuntimeError>;

/// A compiled template that can be rendered and imported.
#[derive(Clone)]
pub struct Module(Rc<ModuleInner>);

struct ModuleInner {
    template: Rc<TemplateFn>,
    exports: RefCell<Option<Value>>,
}

impl Module {
    pub fn new(template: impl Fn(&mut Call<'_>) -> Result<Value, RuntimeError> + 'static) -> Self {
        Self::from_rc(Rc::new(template))
    }

    pub fn from_rc(template: Rc<TemplateFn>) -> Self {
        Module(Rc::new(ModuleInner {
            template,
            exports: RefCell::new(None),
        }))
    }

    /// Runs the template body against `scope` and `writer`.
    pub fn render(&self, runtime: &Runtime, scope: Scope, writer: &mut dyn Writer) -> Result<Value, RuntimeError> {
        let mut call = Call::new(runtime, scope, writer);
        (self.0.template)(&mut call)
    }

    /// The module's top-level bindings.
    ///
    /// The first call runs the body against a fresh child of the globals and a null writer,
    /// with the probing flag set so unresolved imports and unblessed calls degrade to nil.
    /// The result is memoized; later calls return the same object.
    ///
    /// While the body runs, the memo holds the export scope itself, so a module reached again
    /// through an import cycle sees the bindings made so far instead of probing again.
    pub fn exports(&self, runtime: &Runtime) -> Result<Value, RuntimeError> {
        if let Some(exports) = self.0.exports.borrow().as_ref() {
            return Ok(exports.clone());
        }

        let scope = runtime.globals().extend();
        scope.set_probing(true);
        *self.0.exports.borrow_mut() = Some(Value::Scope(scope.clone()));
        let mut writer = NullWriter;
        let rendered = self.render(runtime, scope.clone(), &mut writer);
        scope.set_probing(false);
        if let Err(err) = rendered {
            *self.0.exports.borrow_mut() = None;
            return Err(err);
        }

        let exports = Value::object(scope.own_entries());
        tracing::debug!(names = ?scope.own_entries().keys().collect::<Vec<_>>(), "module exports collected");
        *self.0.exports.borrow_mut() = Some(exports.clone());
        Ok(exports)
    }

    pub fn ptr_eq(&self, other: &Module) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("exports_cached", &self.0.exports.borrow().is_some())
            .finish()
    }
}

/// Resolves one literal module name for a compiled template.
#[derive(Debug)]
pub struct Importer {
    name: Name,
    cache: bool,
    cached: RefCell<Option<Value>>,
}

impl Importer {
    pub fn new(name: impl Into<Name>, cache: bool) -> Self {
        Self {
            name: name.into(),
            cache,
            cached: RefCell::new(None),
        }
    }

    /// Returns the exports of the module.
    ///
    /// With caching on, the first successful resolution is kept for the lifetime of the
    /// importer. An unresolved module is an error except while probing exports.
    pub fn import(&self, call: &Call<'_>) -> Result<Value, RuntimeError> {
        if let Some(exports) = self.cached.borrow().as_ref() {
            return Ok(exports.clone());
        }

        match call.runtime.resolve_exports(&self.name)? {
            Some(exports) => {
                if self.cache {
                    *self.cached.borrow_mut() = Some(exports.clone());
                }
                Ok(exports)
            }
            None if call.scope.is_probing() => Ok(Value::Nil),
            None => Err(RuntimeError::ModuleNotResolved(self.name.clone())),
        }
    }
}

/// The name an `import module` statement binds when no alias is given: the last path
/// segment without its extension.
pub fn default_binding(module: &str) -> Name {
    let last = module.rsplit(['/', '\\']).next().unwrap_or(module);
    let stem = match last.split_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => last,
    };
    Name::from(stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::function::{define_partial, exec};
    use crate::runtime::resolver::MemoryResolver;
    use rstest::rstest;
    use std::cell::Cell;

    #[test]
    fn test_exports_memoized() {
        let runtime = Runtime::new();
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let module = Module::new(move |call| {
            counter.set(counter.get() + 1);
            call.writer.raw("ignored");
            call.scope.set("answer", Value::from(42.0));
            Ok(Value::Nil)
        });

        let first = module.exports(&runtime).unwrap();
        let second = module.exports(&runtime).unwrap();
        assert_eq!(runs.get(), 1);
        assert_eq!(first, second);
        assert_eq!(first.property("answer"), Value::from(42.0));
    }

    #[test]
    fn test_probing_tolerates_unresolved_calls() {
        let runtime = Runtime::new();
        let module = Module::new(|call| {
            let missing = call.scope.get("missing");
            let result = exec(call, &missing, &[])?;
            call.scope.set("result", result);
            call.scope.set("helper", define_partial(|_, _| Ok(Value::from("ok"))));
            Ok(Value::Nil)
        });

        let exports = module.exports(&runtime).unwrap();
        assert_eq!(exports.property("result"), Value::Nil);
        assert!(exports.property("helper").as_function().is_some());
    }

    #[test]
    fn test_cyclic_import_sees_bindings_made_so_far() {
        let runtime = Runtime::new();
        let memory = Rc::new(MemoryResolver::default());
        runtime.add_resolver(memory.clone());
        memory.insert(
            "self",
            Module::new(|call| {
                call.scope.set("early", Value::from(1.0));
                let me = call.runtime.resolve_exports("self")?.unwrap_or_default();
                call.scope.set("seen", me.property("early"));
                call.scope.set("late", Value::from(2.0));
                Ok(Value::Nil)
            }),
        );

        let exports = runtime.resolve_exports("self").unwrap().unwrap();
        assert_eq!(exports.property("seen"), Value::from(1.0));
        assert_eq!(exports.property("late"), Value::from(2.0));
        assert_eq!(runtime.resolve_exports("self").unwrap(), Some(exports));
    }

    #[test]
    fn test_failed_render_leaves_exports_unset() {
        let runtime = Runtime::new();
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);
        let module = Module::new(move |_| {
            counter.set(counter.get() + 1);
            Err(RuntimeError::ModuleNotResolved("inner".into()))
        });

        assert!(module.exports(&runtime).is_err());
        assert!(module.exports(&runtime).is_err());
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_importer_caches_first_resolution() {
        let runtime = Runtime::new();
        let memory = Rc::new(MemoryResolver::default());
        runtime.add_resolver(memory.clone());
        let first = Module::new(|call| {
            call.scope.set("v", Value::from(1.0));
            Ok(Value::Nil)
        });
        let second = Module::new(|call| {
            call.scope.set("v", Value::from(2.0));
            Ok(Value::Nil)
        });

        memory.insert("m", first);
        let cached = Importer::new("m", true);
        let uncached = Importer::new("m", false);
        let mut writer = NullWriter;
        let call = Call::new(&runtime, runtime.globals().extend(), &mut writer);
        assert_eq!(cached.import(&call).unwrap().property("v"), Value::from(1.0));
        assert_eq!(uncached.import(&call).unwrap().property("v"), Value::from(1.0));

        memory.insert("m", second);
        assert_eq!(cached.import(&call).unwrap().property("v"), Value::from(1.0));
        assert_eq!(uncached.import(&call).unwrap().property("v"), Value::from(2.0));
    }

    #[test]
    fn test_unresolved_import() {
        let runtime = Runtime::new();
        let mut writer = NullWriter;
        let scope = runtime.globals().extend();
        let call = Call::new(&runtime, scope.clone(), &mut writer);
        let importer = Importer::new("nowhere", true);
        assert_eq!(
            importer.import(&call),
            Err(RuntimeError::ModuleNotResolved("nowhere".into()))
        );
        scope.set_probing(true);
        assert_eq!(importer.import(&call), Ok(Value::Nil));
    }

    #[rstest]
    #[case("layout", "layout")]
    #[case("partials/header.qt", "header")]
    #[case("a\\b.c", "b")]
    #[case(".hidden", ".hidden")]
    fn test_default_binding(#[case] module: &str, #[case] expected: &str) {
        assert_eq!(default_binding(module), expected);
    }
}
