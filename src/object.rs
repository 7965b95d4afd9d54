//! Conversion interface for user-defined types
//!
//! A type opts into the codec by implementing [`Serializable`] (how to take it
//! apart) and one of [`FromFields`] / [`FromMapping`] (how to put it back
//! together). `#[derive(Serializable)]` generates all of them for structs with
//! named fields.
//!
//! ```ignore
//! use serializable::{Registry, Serializable};
//!
//! #[derive(Debug, Clone, PartialEq, Serializable)]
//! #[serializable(module = "geometry")]
//! struct Point {
//!     x: i64,
//!     y: i64,
//! }
//!
//! let registry = Registry::with_builtins();
//! registry.register::<Point>()?;
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::ConversionError;
use crate::registry::TypeReference;
use crate::value::{Dict, Fields};

/// Static location of a type, the analog of a class's module and qualified
/// name.
pub trait TypePath {
    fn type_path() -> TypeReference;
}

/// A value that can be taken apart into named fields.
///
/// Two capabilities are recognised, checked in order: [`to_fields`] (the
/// general to-mapping conversion) and [`record_fields`] (record-like types
/// whose fields are their whole state). A type exposing neither cannot be
/// encoded.
///
/// [`to_fields`]: Serializable::to_fields
/// [`record_fields`]: Serializable::record_fields
pub trait Serializable: fmt::Debug + Send + Sync + 'static {
    /// Reference written to `__class__` when this value is encoded.
    fn type_ref(&self) -> TypeReference;

    fn to_fields(&self) -> Option<Fields> {
        None
    }

    fn record_fields(&self) -> Option<Fields> {
        None
    }
}

/// Construction from named fields (constructor keyword arguments).
pub trait FromFields: Sized {
    fn from_fields(fields: Fields) -> Result<Self, ConversionError>;
}

/// Construction from a whole decoded mapping. Preferred over [`FromFields`]
/// when a type registers it, and the only option when keys are not strings.
pub trait FromMapping: Sized {
    fn from_mapping(mapping: Dict) -> Result<Self, ConversionError>;
}

/// Type-erased instance of a [`Serializable`] type.
#[derive(Clone)]
pub struct Object {
    value: Arc<dyn Serializable>,
    any: Arc<dyn Any + Send + Sync>,
    eq: fn(&Object, &Object) -> bool,
}

impl Object {
    pub fn new<T: Serializable + PartialEq>(value: T) -> Self {
        let value = Arc::new(value);
        Self {
            value: value.clone(),
            any: value,
            eq: |a, b| match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    pub fn type_ref(&self) -> TypeReference {
        self.value.type_ref()
    }

    pub fn to_fields(&self) -> Option<Fields> {
        self.value.to_fields()
    }

    pub fn record_fields(&self) -> Option<Fields> {
        self.value.record_fields()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.any.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.any.is::<T>()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        (self.eq)(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Opaque(u8);

    impl Serializable for Opaque {
        fn type_ref(&self) -> TypeReference {
            TypeReference::new("tests", "Opaque")
        }
    }

    #[derive(Debug, PartialEq)]
    struct Other(u8);

    impl Serializable for Other {
        fn type_ref(&self) -> TypeReference {
            TypeReference::new("tests", "Other")
        }
    }

    #[test]
    fn equality_requires_same_type() {
        assert_eq!(Object::new(Opaque(1)), Object::new(Opaque(1)));
        assert_ne!(Object::new(Opaque(1)), Object::new(Opaque(2)));
        assert_ne!(Object::new(Opaque(1)), Object::new(Other(1)));
    }

    #[test]
    fn downcast() {
        let object = Object::new(Opaque(9));
        assert!(object.is::<Opaque>());
        assert_eq!(object.downcast_ref::<Opaque>(), Some(&Opaque(9)));
        assert!(object.downcast_ref::<Other>().is_none());
        assert!(object.to_fields().is_none());
    }
}
