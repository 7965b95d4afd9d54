//! Reference resolution
//!
//! Types and functions are located by a `(module, name)` pair. Instead of
//! importing modules at runtime, every resolvable item is registered up front
//! in a [`Registry`], a tree of namespaces rooted at top-level module names:
//!
//! ```text
//! geometry            (module)
//! ├── shapes          (module)
//! │   └── Polygon     (type)
//! │       └── Vertex  (nested type)
//! └── distance        (function)
//! ```
//!
//! Resolving `("geometry.shapes", "Polygon.Vertex")` walks
//! `geometry → shapes → Polygon → Vertex`. Successful resolutions are cached
//! for the lifetime of the registry.
//!
//! A root module may be registered lazily with an initializer; it runs once,
//! on the first resolution that reaches that root.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::callable::{Callable, Function};
use crate::error::{ConversionError, RegistryError, ResolutionError};
use crate::object::{FromFields, FromMapping, Serializable, TypePath};
use crate::value::{Dict, Fields, Value};

/// Module-qualified name of a type or function.
///
/// On the wire this is `{"__module__": ..., "__name__": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeReference {
    #[serde(rename = "__module__")]
    pub module: String,
    #[serde(rename = "__name__")]
    pub name: String,
}

impl TypeReference {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Reference from a Rust module path such as `module_path!()`.
    /// `my_crate::geometry` becomes module `my_crate.geometry`.
    pub fn from_rust_path(module_path: &str, name: impl Into<String>) -> Self {
        Self::new(module_path.replace("::", "."), name)
    }

    pub(crate) fn builtin(name: &str) -> Self {
        Self::new(BUILTINS, name)
    }

    /// Full dotted path, `module.name`.
    pub fn path(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }
}

impl fmt::Display for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

// ============================================================================
// Type entries
// ============================================================================

pub type ValueConstructor = Arc<dyn Fn(Value) -> Result<Value, ConversionError> + Send + Sync>;
pub type MappingConstructor = Arc<dyn Fn(Dict) -> Result<Value, ConversionError> + Send + Sync>;
pub type FieldsConstructor = Arc<dyn Fn(Fields) -> Result<Value, ConversionError> + Send + Sync>;

/// A registered type: its location and the ways it can be constructed.
pub struct TypeEntry {
    reference: TypeReference,
    from_value: Option<ValueConstructor>,
    from_mapping: Option<MappingConstructor>,
    from_fields: Option<FieldsConstructor>,
}

/// Shared handle to a registered type; this is what a type value holds.
pub type TypeHandle = Arc<TypeEntry>;

impl TypeEntry {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self::from_reference(TypeReference::new(module, name))
    }

    pub fn from_reference(reference: TypeReference) -> Self {
        Self {
            reference,
            from_value: None,
            from_mapping: None,
            from_fields: None,
        }
    }

    /// Constructor invoked with a single positional value (`__value__`).
    pub fn with_value_constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        self.from_value = Some(Arc::new(f));
        self
    }

    pub fn with_mapping_constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(Dict) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        self.from_mapping = Some(Arc::new(f));
        self
    }

    pub fn with_fields_constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(Fields) -> Result<Value, ConversionError> + Send + Sync + 'static,
    {
        self.from_fields = Some(Arc::new(f));
        self
    }

    pub fn reference(&self) -> &TypeReference {
        &self.reference
    }

    pub fn value_constructor(&self) -> Option<&ValueConstructor> {
        self.from_value.as_ref()
    }

    pub fn mapping_constructor(&self) -> Option<&MappingConstructor> {
        self.from_mapping.as_ref()
    }

    pub fn fields_constructor(&self) -> Option<&FieldsConstructor> {
        self.from_fields.as_ref()
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("reference", &self.reference)
            .field("from_value", &self.from_value.is_some())
            .field("from_mapping", &self.from_mapping.is_some())
            .field("from_fields", &self.from_fields.is_some())
            .finish()
    }
}

impl PartialEq for TypeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

/// What a reference resolves to.
#[derive(Debug, Clone)]
pub enum Resolved {
    Type(TypeHandle),
    Function(Arc<Function>),
}

impl Resolved {
    pub fn reference(&self) -> &TypeReference {
        match self {
            Resolved::Type(entry) => entry.reference(),
            Resolved::Function(function) => function.reference(),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Resolved::Type(entry) => Value::Type(entry),
            Resolved::Function(function) => Value::Callable(Callable::Function(function)),
        }
    }
}

/// Reference to a type, a module-level function, or the type of an object.
///
/// This is the inverse of [`Registry::resolve`]: for every registered entry,
/// resolving the returned reference yields the entry again. Other values have
/// no such reference.
pub fn build_reference(value: &Value) -> Option<TypeReference> {
    match value {
        Value::Type(entry) => Some(entry.reference().clone()),
        Value::Callable(Callable::Function(function)) => Some(function.reference().clone()),
        Value::Object(object) => Some(object.type_ref()),
        _ => None,
    }
}

// ============================================================================
// Namespace tree
// ============================================================================

enum Node {
    Module(Namespace),
    Type { entry: TypeHandle, nested: Namespace },
    Function(Arc<Function>),
}

impl Node {
    fn namespace_mut(&mut self) -> Option<&mut Namespace> {
        match self {
            Node::Module(ns) => Some(ns),
            Node::Type { nested, .. } => Some(nested),
            Node::Function(_) => None,
        }
    }

    fn child(&self, name: &str) -> Option<&Node> {
        match self {
            Node::Module(ns) => ns.children.get(name),
            Node::Type { nested, .. } => nested.children.get(name),
            Node::Function(_) => None,
        }
    }
}

#[derive(Default)]
struct Namespace {
    children: HashMap<String, Node>,
}

type ModuleInit = Box<dyn FnOnce(&mut Registrar<'_>) -> Result<(), RegistryError> + Send + Sync>;

#[derive(Default)]
struct State {
    roots: Namespace,
    pending: HashMap<String, ModuleInit>,
}

impl State {
    fn insert(&mut self, reference: &TypeReference, leaf: Node) -> Result<(), RegistryError> {
        let path = reference.path();
        let segments: Vec<&str> = reference
            .module
            .split('.')
            .chain(reference.name.split('.'))
            .collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(RegistryError::InvalidPath(path));
        }
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| RegistryError::InvalidPath(path.clone()))?;

        let mut namespace = &mut self.roots;
        for segment in parents {
            let node = namespace
                .children
                .entry(segment.to_string())
                .or_insert_with(|| Node::Module(Namespace::default()));
            namespace = node.namespace_mut().ok_or_else(|| RegistryError::NotANamespace {
                path: path.clone(),
                segment: segment.to_string(),
            })?;
        }

        match (namespace.children.remove(*last), leaf) {
            (None, leaf) => {
                namespace.children.insert(last.to_string(), leaf);
            }
            // A type registered after its nested types adopts their namespace
            (Some(Node::Module(existing)), Node::Type { entry, nested }) if nested.children.is_empty() => {
                namespace
                    .children
                    .insert(last.to_string(), Node::Type { entry, nested: existing });
            }
            (Some(existing), _) => {
                namespace.children.insert(last.to_string(), existing);
                return Err(RegistryError::Duplicate(path));
            }
        }
        Ok(())
    }

    fn walk(&self, module: &str, name: &str) -> Result<Resolved, ResolutionError> {
        let mut segments = module.split('.').chain(name.split('.'));
        let root = segments.next().unwrap_or_default();
        let mut node = self
            .roots
            .children
            .get(root)
            .ok_or_else(|| ResolutionError::ModuleNotFound(root.to_string()))?;

        for segment in segments {
            node = node.child(segment).ok_or_else(|| ResolutionError::MissingAttribute {
                path: format!("{}.{}", module, name),
                segment: segment.to_string(),
            })?;
        }

        match node {
            Node::Type { entry, .. } => Ok(Resolved::Type(entry.clone())),
            Node::Function(function) => Ok(Resolved::Function(function.clone())),
            Node::Module(_) => Err(ResolutionError::IsModule(format!("{}.{}", module, name))),
        }
    }
}

// ============================================================================
// Registrar
// ============================================================================

/// Registration methods, shared by [`Registry`] and lazy module initializers.
pub struct Registrar<'a> {
    state: &'a mut State,
}

impl Registrar<'_> {
    pub fn register_type(&mut self, entry: TypeEntry) -> Result<TypeHandle, RegistryError> {
        let entry = Arc::new(entry);
        let reference = entry.reference().clone();
        self.state.insert(
            &reference,
            Node::Type {
                entry: entry.clone(),
                nested: Namespace::default(),
            },
        )?;
        tracing::debug!(reference = %reference, "registered type");
        Ok(entry)
    }

    pub fn register_function(&mut self, function: Function) -> Result<Arc<Function>, RegistryError> {
        let function = Arc::new(function);
        let reference = function.reference().clone();
        self.state.insert(&reference, Node::Function(function.clone()))?;
        tracing::debug!(reference = %reference, "registered function");
        Ok(function)
    }

    /// Register a type constructed from named fields.
    pub fn register<T>(&mut self) -> Result<TypeHandle, RegistryError>
    where
        T: TypePath + FromFields + Serializable + PartialEq,
    {
        self.register_type(
            TypeEntry::from_reference(T::type_path())
                .with_fields_constructor(|fields| T::from_fields(fields).map(object_value)),
        )
    }

    /// Register a type constructed from the whole decoded mapping.
    pub fn register_mapping<T>(&mut self) -> Result<TypeHandle, RegistryError>
    where
        T: TypePath + FromMapping + Serializable + PartialEq,
    {
        self.register_type(
            TypeEntry::from_reference(T::type_path())
                .with_mapping_constructor(|mapping| T::from_mapping(mapping).map(object_value)),
        )
    }
}

fn object_value<T: Serializable + PartialEq>(value: T) -> Value {
    Value::Object(crate::object::Object::new(value))
}

// ============================================================================
// Registry
// ============================================================================

/// Name of the module holding the builtin types.
pub const BUILTINS: &str = "builtins";

/// Thread-safe store of resolvable types and functions.
pub struct Registry {
    state: RwLock<State>,
    cache: Mutex<HashMap<(String, String), Resolved>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry. Tuples cannot be decoded until `builtins` is
    /// registered; see [`Registry::with_builtins`].
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// A registry with the `builtins` module: `tuple`, `list`, `dict`, `str`,
    /// `int`, `float` and `bool`.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.with_registrar(register_builtins);
        registry
    }

    fn with_registrar<R>(&self, f: impl FnOnce(&mut Registrar<'_>) -> R) -> R {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut Registrar { state: &mut *state })
    }

    pub fn register_type(&self, entry: TypeEntry) -> Result<TypeHandle, RegistryError> {
        self.with_registrar(|r| r.register_type(entry))
    }

    pub fn register_function(&self, function: Function) -> Result<Arc<Function>, RegistryError> {
        self.with_registrar(|r| r.register_function(function))
    }

    pub fn register<T>(&self) -> Result<TypeHandle, RegistryError>
    where
        T: TypePath + FromFields + Serializable + PartialEq,
    {
        self.with_registrar(|r| r.register::<T>())
    }

    pub fn register_mapping<T>(&self) -> Result<TypeHandle, RegistryError>
    where
        T: TypePath + FromMapping + Serializable + PartialEq,
    {
        self.with_registrar(|r| r.register_mapping::<T>())
    }

    /// Register a root module whose contents are registered by `init` the
    /// first time a reference into it is resolved.
    pub fn module<F>(&self, root: impl Into<String>, init: F)
    where
        F: FnOnce(&mut Registrar<'_>) -> Result<(), RegistryError> + Send + Sync + 'static,
    {
        let root = root.into();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state
            .roots
            .children
            .entry(root.clone())
            .or_insert_with(|| Node::Module(Namespace::default()));
        state.pending.insert(root, Box::new(init));
    }

    /// Resolve a module path and a (possibly dotted) qualified name.
    pub fn resolve(&self, module: &str, name: &str) -> Result<Resolved, ResolutionError> {
        let key = (module.to_string(), name.to_string());
        if let Some(hit) = self.lock_cache().get(&key) {
            return Ok(hit.clone());
        }

        let root = module.split('.').next().unwrap_or_default();
        self.initialize(root)?;

        let resolved = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .walk(module, name)?;
        tracing::trace!(module = module, qualified_name = name, "resolved reference");
        self.lock_cache().insert(key, resolved.clone());
        Ok(resolved)
    }

    pub fn resolve_reference(&self, reference: &TypeReference) -> Result<Resolved, ResolutionError> {
        self.resolve(&reference.module, &reference.name)
    }

    /// Drop all cached resolutions.
    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    pub fn cached_len(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), Resolved>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn initialize(&self, root: &str) -> Result<(), ResolutionError> {
        let is_pending = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .contains_key(root);
        if !is_pending {
            return Ok(());
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have won the race between the two locks
        let Some(init) = state.pending.remove(root) else {
            return Ok(());
        };
        tracing::debug!(module = root, "initializing module");
        init(&mut Registrar { state: &mut *state }).map_err(|e| {
            tracing::warn!(module = root, error = %e, "module initialization failed");
            ResolutionError::Initialization {
                module: root.to_string(),
                message: e.to_string(),
            }
        })
    }
}

/// The process-wide registry used by [`to_json`](crate::to_json) and
/// [`from_json`](crate::from_json). Created with the builtins on first use.
pub fn registry() -> &'static Registry {
    static GLOBAL: OnceLock<Registry> = OnceLock::new();
    GLOBAL.get_or_init(Registry::with_builtins)
}

// ============================================================================
// Builtins
// ============================================================================

fn expected(what: &str, got: &Value) -> ConversionError {
    ConversionError::TypeMismatch {
        expected: what.to_string(),
        got: got.kind_name().to_string(),
    }
}

/// Truncate toward zero, rejecting floats outside the `i64` range.
fn float_to_int(x: f64) -> Result<i64, ConversionError> {
    // 2^63, exactly representable
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    let truncated = x.trunc();
    if truncated >= -LIMIT && truncated < LIMIT {
        Ok(truncated as i64)
    } else {
        Err(ConversionError::FloatOutOfRange {
            target: "int",
            value: x,
        })
    }
}

fn register_builtins(r: &mut Registrar<'_>) {
    let entries = [
        TypeEntry::new(BUILTINS, "tuple").with_value_constructor(|v| match v {
            Value::List(items) | Value::Tuple(items) => Ok(Value::Tuple(items)),
            other => Err(expected("sequence", &other)),
        }),
        TypeEntry::new(BUILTINS, "list").with_value_constructor(|v| match v {
            Value::List(items) | Value::Tuple(items) => Ok(Value::List(items)),
            other => Err(expected("sequence", &other)),
        }),
        TypeEntry::new(BUILTINS, "dict")
            .with_value_constructor(|v| match v {
                Value::Dict(d) => Ok(Value::Dict(d)),
                other => Err(expected("dict", &other)),
            })
            .with_fields_constructor(|fields| Ok(Value::Dict(fields.into()))),
        TypeEntry::new(BUILTINS, "str").with_value_constructor(|v| match v {
            Value::Str(s) => Ok(Value::Str(s)),
            other if other.is_primitive() => Ok(Value::Str(other.to_string())),
            other => Err(expected("primitive", &other)),
        }),
        TypeEntry::new(BUILTINS, "int").with_value_constructor(|v| match v {
            Value::Int(n) => Ok(Value::Int(n)),
            Value::Bool(b) => Ok(Value::Int(i64::from(b))),
            Value::Float(x) => float_to_int(x).map(Value::Int),
            other => Err(expected("number", &other)),
        }),
        TypeEntry::new(BUILTINS, "float").with_value_constructor(|v| match v {
            Value::Float(x) => Ok(Value::Float(x)),
            Value::Int(n) => Ok(Value::Float(n as f64)),
            other => Err(expected("number", &other)),
        }),
        TypeEntry::new(BUILTINS, "bool").with_value_constructor(|v| match v {
            Value::Bool(b) => Ok(Value::Bool(b)),
            other => Err(expected("bool", &other)),
        }),
    ];
    for entry in entries {
        // builtins are registered once on a fresh registry
        if let Err(e) = r.register_type(entry) {
            tracing::warn!(error = %e, "builtin registration skipped");
        }
    }
}
