//! Runtime values
//!
//! [`Value`] is the live side of the codec: everything `encode` accepts and
//! everything `decode` produces. Primitives pass through the codec untouched;
//! every other variant has a dedicated representation in the IR.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::callable::Callable;
use crate::error::ConversionError;
use crate::object::Object;
use crate::registry::{TypeHandle, TypeReference};

/// A dynamically typed value that can be encoded to and decoded from the IR
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    // Primitives
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),

    // Sequences
    List(Vec<Value>),
    Tuple(Vec<Value>),

    /// Mapping whose keys may be any value, not only strings
    Dict(Dict),

    /// A registered type itself, not an instance of it
    Type(TypeHandle),
    Callable(Callable),
    Object(Object),
}

impl Value {
    /// Whether this value is already JSON-safe and passes through the codec.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
        )
    }

    /// Short name of the value's kind, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Type(_) => "type",
            Value::Callable(_) => "function",
            Value::Object(_) => "object",
        }
    }

    /// Reference to the type of this value (`type(x)`).
    ///
    /// Builtin kinds live in the `builtins` module; objects report the path
    /// declared by their [`Serializable`](crate::Serializable) implementation.
    pub fn type_reference(&self) -> TypeReference {
        match self {
            Value::Object(object) => object.type_ref(),
            other => TypeReference::builtin(other.kind_name()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn tuple(items: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Value::Tuple(items.into_iter().map(Into::into).collect())
    }

    pub fn list(items: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// Dict
// ============================================================================

/// Insertion-ordered mapping with arbitrary [`Value`] keys.
///
/// Values are not hashable (floats, objects), so lookups are linear. Inserting
/// a key equal to an existing one replaces the value in place and keeps the
/// original position.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn remove_str(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k.as_str() == Some(key))?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }
}

/// Equality ignores insertion order, like dictionary equality.
impl PartialEq for Dict {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| o == v))
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for Dict {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = Dict::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

impl IntoIterator for Dict {
    type Item = (Value, Value);
    type IntoIter = std::vec::IntoIter<(Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// ============================================================================
// Fields
// ============================================================================

/// Ordered named fields: the state of an object, or the named arguments
/// handed to a type's constructor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, Value)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Remove a field, returning its value.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (n, v) in iter {
            fields.insert(n, v);
        }
        fields
    }
}

impl IntoIterator for Fields {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl From<Fields> for Dict {
    fn from(fields: Fields) -> Self {
        Dict {
            entries: fields
                .entries
                .into_iter()
                .map(|(n, v)| (Value::Str(n), v))
                .collect(),
        }
    }
}

impl TryFrom<Dict> for Fields {
    type Error = ConversionError;

    fn try_from(dict: Dict) -> Result<Self, Self::Error> {
        let mut fields = Fields::new();
        for (key, value) in dict {
            match key {
                Value::Str(name) => {
                    fields.insert(name, value);
                }
                other => return Err(ConversionError::NonStringKey(other.kind_name().to_string())),
            }
        }
        Ok(fields)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => write_seq(f, "[", items, "]"),
            Value::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0]),
            Value::Tuple(items) => write_seq(f, "(", items, ")"),
            Value::Dict(dict) => {
                write!(f, "{{")?;
                for (i, (k, v)) in dict.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Type(entry) => write!(f, "<type {}>", entry.reference()),
            Value::Callable(callable) => write!(f, "<{}>", callable.describe()),
            Value::Object(object) => write!(f, "<{} object>", object.type_ref()),
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    write!(f, "{}", open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "{}", close)
}

// ============================================================================
// From implementations
// ============================================================================

macro_rules! from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self { Value::Int(i64::from(v)) }
            }
        )*
    };
}

from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<()> for Value {
    fn from(_: ()) -> Self { Value::Null }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Bool(v) }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self { Value::Float(f64::from(v)) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Float(v) }
}

impl From<char> for Value {
    fn from(v: char) -> Self { Value::Str(v.to_string()) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Value::Str(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::Str(v.to_string()) }
}

impl From<Dict> for Value {
    fn from(v: Dict) -> Self { Value::Dict(v) }
}

impl From<Callable> for Value {
    fn from(v: Callable) -> Self { Value::Callable(v) }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self { Value::Object(v) }
}

impl From<TypeHandle> for Value {
    fn from(v: TypeHandle) -> Self { Value::Type(v) }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(x) => x.into(),
            None => Value::Null,
        }
    }
}

impl<T: Into<Value>> From<Box<T>> for Value {
    fn from(v: Box<T>) -> Self {
        (*v).into()
    }
}

impl<K: Into<Value>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(v: BTreeMap<K, V>) -> Self {
        Value::Dict(v.into_iter().collect())
    }
}

impl<K: Into<Value>, V: Into<Value>, S> From<HashMap<K, V, S>> for Value {
    fn from(v: HashMap<K, V, S>) -> Self {
        Value::Dict(v.into_iter().collect())
    }
}

impl<A: Into<Value>> From<(A,)> for Value {
    fn from((a,): (A,)) -> Self {
        Value::Tuple(vec![a.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Value::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Value {
    fn from((a, b, c): (A, B, C)) -> Self {
        Value::Tuple(vec![a.into(), b.into(), c.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>, D: Into<Value>> From<(A, B, C, D)> for Value {
    fn from((a, b, c, d): (A, B, C, D)) -> Self {
        Value::Tuple(vec![a.into(), b.into(), c.into(), d.into()])
    }
}

// ============================================================================
// FromValue trait
// ============================================================================

/// Trait for converting from a [`Value`].
///
/// Implemented directly instead of through `TryFrom<Value>`: the blanket
/// `impl<T, U: Into<T>> TryFrom<U> for T` in core already covers `Value` and
/// `Option<Value>`, which would make generic container impls overlap.
///
/// Every implementing type also has a `From<T> for Value` impl. Integers are
/// stored as `i64`, so `u64`, `usize` and `isize` are not supported.
pub trait FromValue: Sized {
    fn from_value(v: Value) -> Result<Self, ConversionError>;
}

fn mismatch(expected: &str, got: &Value) -> ConversionError {
    ConversionError::TypeMismatch {
        expected: expected.to_string(),
        got: got.kind_name().to_string(),
    }
}

impl FromValue for Value {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        Ok(v)
    }
}

impl FromValue for bool {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        match v {
            Value::Bool(x) => Ok(x),
            other => Err(mismatch("bool", &other)),
        }
    }
}

macro_rules! from_value_int {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(v: Value) -> Result<Self, ConversionError> {
                    match v {
                        Value::Int(x) => <$t>::try_from(x).map_err(|_| ConversionError::OutOfRange {
                            target: stringify!($t),
                            value: x,
                        }),
                        other => Err(mismatch(stringify!($t), &other)),
                    }
                }
            }
        )*
    };
}

from_value_int!(i8, i16, i32, i64, u8, u16, u32);

impl FromValue for f64 {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        match v {
            Value::Float(x) => Ok(x),
            // JSON does not keep 2.0 and 2 apart once a float was integral
            Value::Int(x) => Ok(x as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        f64::from_value(v).map(|x| x as f32)
    }
}

impl FromValue for String {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        match v {
            Value::Str(x) => Ok(x),
            other => Err(mismatch("str", &other)),
        }
    }
}

impl FromValue for char {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        match v {
            Value::Str(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(ConversionError::TypeMismatch {
                        expected: "single character".to_string(),
                        got: format!("string of length {}", s.chars().count()),
                    }),
                }
            }
            other => Err(mismatch("str", &other)),
        }
    }
}

impl FromValue for Dict {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        match v {
            Value::Dict(d) => Ok(d),
            other => Err(mismatch("dict", &other)),
        }
    }
}

impl FromValue for TypeHandle {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        match v {
            Value::Type(t) => Ok(t),
            other => Err(mismatch("type", &other)),
        }
    }
}

impl FromValue for Callable {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        match v {
            Value::Callable(c) => Ok(c),
            other => Err(mismatch("function", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        match v {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    T::from_value(item).map_err(|e| ConversionError::IndexError(i, Box::new(e)))
                })
                .collect(),
            other => Err(mismatch("list", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        match v {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Box<T> {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        T::from_value(v).map(Box::new)
    }
}

impl<K: FromValue + Ord, V: FromValue> FromValue for BTreeMap<K, V> {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        Dict::from_value(v)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect()
    }
}

impl<K: FromValue + Eq + std::hash::Hash, V: FromValue> FromValue for HashMap<K, V> {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        Dict::from_value(v)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_value(k)?, V::from_value(v)?)))
            .collect()
    }
}

// ============================================================================
// Tuple conversions (for common sizes)
// ============================================================================

fn tuple_items(v: Value, arity: usize) -> Result<Vec<Value>, ConversionError> {
    match v {
        Value::Tuple(items) if items.len() == arity => Ok(items),
        Value::Tuple(items) => Err(ConversionError::WrongLength {
            expected: arity,
            got: items.len(),
        }),
        other => Err(mismatch("tuple", &other)),
    }
}

fn element<T: FromValue>(items: &mut std::vec::IntoIter<Value>, index: usize) -> Result<T, ConversionError> {
    let item = items.next().ok_or(ConversionError::WrongLength {
        expected: index + 1,
        got: index,
    })?;
    T::from_value(item).map_err(|e| ConversionError::IndexError(index, Box::new(e)))
}

impl<A: FromValue> FromValue for (A,) {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        let mut items = tuple_items(v, 1)?.into_iter();
        Ok((element(&mut items, 0)?,))
    }
}

impl<A: FromValue, B: FromValue> FromValue for (A, B) {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        let mut items = tuple_items(v, 2)?.into_iter();
        Ok((element(&mut items, 0)?, element(&mut items, 1)?))
    }
}

impl<A: FromValue, B: FromValue, C: FromValue> FromValue for (A, B, C) {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        let mut items = tuple_items(v, 3)?.into_iter();
        Ok((
            element(&mut items, 0)?,
            element(&mut items, 1)?,
            element(&mut items, 2)?,
        ))
    }
}

impl<A: FromValue, B: FromValue, C: FromValue, D: FromValue> FromValue for (A, B, C, D) {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        let mut items = tuple_items(v, 4)?.into_iter();
        Ok((
            element(&mut items, 0)?,
            element(&mut items, 1)?,
            element(&mut items, 2)?,
            element(&mut items, 3)?,
        ))
    }
}
