use super::error::RuntimeError;
use super::function::{Call, exec};
use crate::value::Value;
use std::{cell::RefCell, rc::Rc};

/// The local slots of one scope-boundary execution.
///
/// Boundaries that never read the ambient scope keep their bindings here instead of in a
/// [`Scope`](super::scope::Scope) frame. Slots are addressed by `(depth, index)`, where
/// depth counts activations outwards from the current one.
#[derive(Debug, Default)]
pub struct Activation {
    slots: RefCell<Vec<Value>>,
    parent: Option<Rc<Activation>>,
    args: Rc<[Value]>,
    previous: Value,
}

impl Activation {
    pub fn root(slots: usize) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new(vec![Value::Nil; slots]),
            ..Default::default()
        })
    }

    pub fn new(parent: &Rc<Activation>, slots: usize) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new(vec![Value::Nil; slots]),
            parent: Some(Rc::clone(parent)),
            args: Rc::clone(&parent.args),
            previous: parent.previous.clone(),
        })
    }

    /// Creates the activation of a partial call, remembering the arguments and the
    /// previously bound partial for delegation.
    pub fn for_call(parent: &Rc<Activation>, slots: usize, args: &[Value], previous: Value) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new(vec![Value::Nil; slots]),
            parent: Some(Rc::clone(parent)),
            args: args.into(),
            previous,
        })
    }

    fn ancestor(&self, depth: usize) -> &Activation {
        let mut activation = self;
        for _ in 0..depth {
            match activation.parent.as_deref() {
                Some(parent) => activation = parent,
                None => break,
            }
        }
        activation
    }

    #[inline(always)]
    pub fn get(&self, depth: usize, index: usize) -> Value {
        self.ancestor(depth)
            .slots
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    #[inline(always)]
    pub fn set(&self, depth: usize, index: usize, value: Value) {
        let mut slots = self.ancestor(depth).slots.borrow_mut();
        if index >= slots.len() {
            slots.resize(index + 1, Value::Nil);
        }
        slots[index] = value;
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn previous(&self) -> &Value {
        &self.previous
    }
}

/// Tail-calls the partial that was bound before the current guarded definition, passing
/// the same arguments.
pub fn delegate(call: &mut Call<'_>, activation: &Activation) -> Result<Value, RuntimeError> {
    exec(call, &activation.previous, &activation.args)
}
