//! Function values
//!
//! Only module-level functions have a symbolic location and can be encoded.
//! Closures and bound methods are representable as values so that callers
//! can hold them, but the encoder rejects them.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::ConversionError;
use crate::registry::TypeReference;
use crate::value::Value;

/// Failure raised by a function body.
#[derive(Error, Debug)]
pub enum CallError {
    #[error("Expected {expected} arguments, got {got}")]
    Arity { expected: usize, got: usize },

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("{0}")]
    Failed(String),
}

/// Signature of a module-level function body.
pub type NativeFn = fn(&[Value]) -> Result<Value, CallError>;

type ClosureFn = dyn Fn(&[Value], &[Value]) -> Result<Value, CallError> + Send + Sync;

/// A module-level function with a stable location.
pub struct Function {
    reference: TypeReference,
    body: NativeFn,
}

impl Function {
    pub fn new(module: impl Into<String>, name: impl Into<String>, body: NativeFn) -> Self {
        Self {
            reference: TypeReference::new(module, name),
            body,
        }
    }

    pub fn reference(&self) -> &TypeReference {
        &self.reference
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        (self.body)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}

/// A function value that carries state from the scope it was created in.
#[derive(Clone)]
pub struct Closure {
    name: Option<String>,
    captures: Vec<Value>,
    body: Arc<ClosureFn>,
}

impl Closure {
    /// A closure reading `captures`; the body receives them before the call
    /// arguments.
    pub fn new<F>(name: impl Into<String>, captures: Vec<Value>, body: F) -> Self
    where
        F: Fn(&[Value], &[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self {
            name: Some(name.into()),
            captures,
            body: Arc::new(body),
        }
    }

    /// An unnamed function literal with no captured state.
    pub fn anonymous<F>(body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    {
        Self {
            name: None,
            captures: Vec::new(),
            body: Arc::new(move |_, args| body(args)),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<lambda>")
    }

    pub fn captures(&self) -> &[Value] {
        &self.captures
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        (self.body)(&self.captures, args)
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name())
            .field("captures", &self.captures)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.body, &other.body) && self.captures == other.captures
    }
}

#[derive(Debug, Clone)]
pub enum Callable {
    Function(Arc<Function>),
    Closure(Closure),
    /// A function bound to a receiver; the receiver is passed first.
    Method {
        receiver: Box<Value>,
        function: Arc<Function>,
    },
}

impl Callable {
    pub fn call(&self, args: &[Value]) -> Result<Value, CallError> {
        match self {
            Callable::Function(function) => function.call(args),
            Callable::Closure(closure) => closure.call(args),
            Callable::Method { receiver, function } => {
                let mut bound = Vec::with_capacity(args.len() + 1);
                bound.push((**receiver).clone());
                bound.extend_from_slice(args);
                function.call(&bound)
            }
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Callable::Function(function) => format!("function {}", function.reference()),
            Callable::Closure(closure) => format!("closure {}", closure.name()),
            Callable::Method { receiver, function } => format!(
                "bound method {} of {}",
                function.reference().name,
                receiver.type_reference()
            ),
        }
    }
}

/// Module-level functions compare by location; closures by identity.
impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callable::Function(a), Callable::Function(b)) => a.reference() == b.reference(),
            (Callable::Closure(a), Callable::Closure(b)) => a == b,
            (
                Callable::Method { receiver: ra, function: fa },
                Callable::Method { receiver: rb, function: fb },
            ) => ra == rb && fa.reference() == fb.reference(),
            _ => false,
        }
    }
}

impl From<Arc<Function>> for Callable {
    fn from(function: Arc<Function>) -> Self {
        Callable::Function(function)
    }
}

impl From<Closure> for Callable {
    fn from(closure: Closure) -> Self {
        Callable::Closure(closure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(args: &[Value]) -> Result<Value, CallError> {
        match args {
            [Value::Int(a), Value::Int(b)] => Ok(Value::Int(a + b)),
            _ => Err(CallError::Arity { expected: 2, got: args.len() }),
        }
    }

    #[test]
    fn method_passes_receiver_first() {
        let method = Callable::Method {
            receiver: Box::new(Value::Int(40)),
            function: Arc::new(Function::new("math", "add", add)),
        };
        assert_eq!(method.call(&[Value::Int(2)]).unwrap(), Value::Int(42));
    }

    #[test]
    fn closure_sees_captures() {
        let offset = Closure::new("offset", vec![Value::Int(10)], |captures, args| {
            match (captures, args) {
                ([Value::Int(c)], [Value::Int(a)]) => Ok(Value::Int(c + a)),
                _ => Err(CallError::Failed("bad arguments".into())),
            }
        });
        assert_eq!(offset.call(&[Value::Int(5)]).unwrap(), Value::Int(15));
        assert_eq!(offset.name(), "offset");
        assert_eq!(Closure::anonymous(|_| Ok(Value::Null)).name(), "<lambda>");
    }
}
