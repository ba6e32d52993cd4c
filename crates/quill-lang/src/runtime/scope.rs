use crate::value::{Dict, Name, Value};
use rustc_hash::FxHashMap;
use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

/// A context frame chain.
///
/// Reads fall through to the parent when a name is missing locally; writes always land in
/// the frame they are made on. Parents are shared, so a parent mutation stays visible to
/// children unless shadowed.
#[derive(Clone, Default)]
pub struct Scope(Rc<ScopeFrame>);

#[derive(Default)]
struct ScopeFrame {
    vars: RefCell<FxHashMap<Name, Value>>,
    parent: Option<Scope>,
    probing: Cell<bool>,
}

impl Scope {
    /// Creates a root frame with no parent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a root frame holding the entries of `dict`.
    pub fn from_dict(dict: &Dict) -> Self {
        let scope = Self::new();
        scope.extend_with(dict);
        scope
    }

    /// Creates a child frame of this scope.
    pub fn extend(&self) -> Scope {
        Scope(Rc::new(ScopeFrame {
            vars: RefCell::new(FxHashMap::default()),
            parent: Some(self.clone()),
            probing: Cell::new(false),
        }))
    }

    /// Creates the child frame of a `using` block: the entries of every object or scope in
    /// `values` are copied in, later values winning. Other values contribute nothing.
    pub fn extend_from(&self, values: &[Value]) -> Scope {
        let child = self.extend();
        for value in values {
            match value {
                Value::Object(dict) => child.extend_with(dict),
                Value::Scope(scope) => child.extend_with(&scope.own_entries()),
                _ => {}
            }
        }
        child
    }

    /// Copies every entry of `dict` into this frame.
    pub fn extend_with(&self, dict: &Dict) {
        let mut vars = self.0.vars.borrow_mut();
        for (name, value) in dict {
            vars.insert(name.clone(), value.clone());
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut frame = Some(self);
        while let Some(scope) = frame {
            if let Some(value) = scope.0.vars.borrow().get(name) {
                return Some(value.clone());
            }
            frame = scope.parent();
        }
        None
    }

    #[inline(always)]
    pub fn get(&self, name: &str) -> Value {
        self.lookup(name).unwrap_or_default()
    }

    #[inline(always)]
    pub fn set(&self, name: impl Into<Name>, value: Value) {
        self.0.vars.borrow_mut().insert(name.into(), value);
    }

    pub fn contains_own(&self, name: &str) -> bool {
        self.0.vars.borrow().contains_key(name)
    }

    /// The entries stored directly on this frame, without inherited ones.
    pub fn own_entries(&self) -> Dict {
        self.0
            .vars
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn parent(&self) -> Option<&Scope> {
        self.0.parent.as_ref()
    }

    /// Whether this frame or any ancestor is flagged for export probing.
    pub fn is_probing(&self) -> bool {
        let mut frame = Some(self);
        while let Some(scope) = frame {
            if scope.0.probing.get() {
                return true;
            }
            frame = scope.parent();
        }
        false
    }

    pub fn set_probing(&self, probing: bool) {
        self.0.probing.set(probing);
    }

    /// Drops every entry of this frame.
    ///
    /// Partials capture the frame they are defined in, so a frame that holds its own
    /// partials forms an `Rc` cycle until it is cleared.
    pub fn clear(&self) {
        let vars = std::mem::take(&mut *self.0.vars.borrow_mut());
        drop(vars);
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("vars", &self.0.vars.borrow().keys().collect::<Vec<_>>())
            .field("has_parent", &self.0.parent.is_some())
            .finish()
    }
}
