use super::Runtime;
use super::error::{Action, RuntimeError};
use super::scope::Scope;
use super::writer::Writer;
use crate::value::Value;
use std::{fmt, rc::Rc};

/// The signature shared by host functions and compiled partials.
pub type NativeFn = dyn Fn(&mut Call<'_>, &[Value]) -> Result<Value, RuntimeError>;

/// Whether a function may be invoked from the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Blessing {
    /// A plain host value; calling it is an error.
    Unblessed,
    /// A host function made callable with [`bless`].
    Wrapped,
    /// A partial declared in the language.
    Partial,
}

/// The execution context handed to every function call.
pub struct Call<'a> {
    pub runtime: &'a Runtime,
    pub scope: Scope,
    pub writer: &'a mut dyn Writer,
}

impl<'a> Call<'a> {
    pub fn new(runtime: &'a Runtime, scope: Scope, writer: &'a mut dyn Writer) -> Self {
        Self {
            runtime,
            scope,
            writer,
        }
    }
}

impl fmt::Debug for Call<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call").field("scope", &self.scope).finish()
    }
}

#[derive(Clone)]
pub struct Function {
    blessing: Blessing,
    callable: Rc<NativeFn>,
}

impl Function {
    /// Wraps a host function without blessing it.
    pub fn new(f: impl Fn(&mut Call<'_>, &[Value]) -> Result<Value, RuntimeError> + 'static) -> Self {
        Self {
            blessing: Blessing::Unblessed,
            callable: Rc::new(f),
        }
    }

    /// Wraps a host function and blesses it in one step.
    pub fn wrapped(f: impl Fn(&mut Call<'_>, &[Value]) -> Result<Value, RuntimeError> + 'static) -> Self {
        Self {
            blessing: Blessing::Wrapped,
            callable: Rc::new(f),
        }
    }

    fn with_blessing(&self, blessing: Blessing) -> Self {
        Self {
            blessing,
            callable: Rc::clone(&self.callable),
        }
    }

    pub fn blessing(&self) -> Blessing {
        self.blessing
    }

    pub fn is_blessed(&self) -> bool {
        self.blessing != Blessing::Unblessed
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        self.blessing == other.blessing && Rc::ptr_eq(&self.callable, &other.callable)
    }

    /// Invokes the callable without checking the blessing.
    #[inline(always)]
    pub fn invoke(&self, call: &mut Call<'_>, args: &[Value]) -> Result<Value, RuntimeError> {
        (self.callable)(call, args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("blessing", &self.blessing).finish()
    }
}

/// Makes a value callable from the language.
///
/// Unblessed functions become wrapped, blessed ones pass through, and a string becomes a
/// zero-argument function returning itself, which lets pre-rendered markup be output
/// without escaping. Other values are returned unchanged.
pub fn bless(value: Value) -> Value {
    match value {
        Value::Function(func) if !func.is_blessed() => Value::Function(func.with_blessing(Blessing::Wrapped)),
        Value::String(s) => Value::Function(Function::wrapped(move |_, _| Ok(Value::String(s.clone())))),
        value => value,
    }
}

/// Marks a compiled body as a partial.
pub fn define_partial(f: impl Fn(&mut Call<'_>, &[Value]) -> Result<Value, RuntimeError> + 'static) -> Value {
    Value::Function(Function {
        blessing: Blessing::Partial,
        callable: Rc::new(f),
    })
}

/// Builds one link of a guarded dispatch chain.
///
/// `previous` is the partial bound under the same name before this definition; anything
/// that is not blessed is replaced by a no-op. The body receives it so it can delegate
/// when its own guard fails.
pub fn define_guarded_partial(
    previous: Value,
    f: impl Fn(&mut Call<'_>, &[Value], &Value) -> Result<Value, RuntimeError> + 'static,
) -> Value {
    let previous = match previous {
        Value::Function(func) if func.is_blessed() => Value::Function(func),
        _ => define_partial(|_, _| Ok(Value::Nil)),
    };
    define_partial(move |call, args| f(call, args, &previous))
}

fn blessed<'f>(call: &Call<'_>, func: &'f Value, action: Action) -> Result<Option<&'f Function>, RuntimeError> {
    match func {
        Value::Function(f) if f.is_blessed() => Ok(Some(f)),
        _ if call.scope.is_probing() => Ok(None),
        _ => Err(RuntimeError::NotBlessed {
            action,
            type_name: func.type_name(),
        }),
    }
}

/// Calls a blessed function.
///
/// During export probing an unblessed target yields nil instead of an error.
pub fn exec(call: &mut Call<'_>, func: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
    match blessed(call, func, Action::Call)? {
        Some(f) => f.invoke(call, args),
        None => Ok(Value::Nil),
    }
}

/// Partially applies a blessed function, keeping its blessing.
pub fn bind(call: &Call<'_>, func: &Value, bound: Vec<Value>) -> Result<Value, RuntimeError> {
    let Some(f) = blessed(call, func, Action::Bind)? else {
        return Ok(Value::Nil);
    };

    let target = f.clone();
    let bound: Rc<[Value]> = bound.into();
    Ok(Value::Function(Function {
        blessing: target.blessing,
        callable: Rc::new(move |call: &mut Call<'_>, args: &[Value]| {
            let all = bound.iter().chain(args.iter()).cloned().collect::<Vec<_>>();
            target.invoke(call, &all)
        }),
    }))
}

/// Runs `f` with `scope` as the ambient scope, restoring the previous one afterwards even
/// when `f` fails.
pub fn with_scope<R>(
    call: &mut Call<'_>,
    scope: Scope,
    f: impl FnOnce(&mut Call<'_>) -> Result<R, RuntimeError>,
) -> Result<R, RuntimeError> {
    let outer = std::mem::replace(&mut call.scope, scope);
    let result = f(call);
    call.scope = outer;
    result
}

/// Calls `func` as a pipe: blessed, with output discarded.
pub fn pipe(call: &mut Call<'_>, func: &Value, value: Value) -> Result<Value, RuntimeError> {
    let f = match func {
        Value::Function(f) if f.is_blessed() => f,
        _ if call.scope.is_probing() => return Ok(Value::Nil),
        _ => {
            return Err(RuntimeError::NotBlessed {
                action: Action::Pipe,
                type_name: func.type_name(),
            });
        }
    };

    let mut null = super::writer::NullWriter;
    let mut inner = Call::new(call.runtime, call.scope.clone(), &mut null);
    f.invoke(&mut inner, &[value])
}
