//! Serializable: self-describing JSON for dynamic values
//!
//! Converts [`Value`]s (primitives, lists, tuples, dictionaries with any
//! keys, types, functions and registered objects) into a JSON-compatible
//! intermediate representation and back, without external type hints.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     to_json / from_json  (serde_json)   │
//! ├─────────────────────────────────────────┤
//! │  codec     - recursive encode/decode    │
//! │  keys      - non-string dict keys       │
//! ├─────────────────────────────────────────┤
//! │  registry  - (module, name) resolution  │
//! │  object    - conversion interface       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use serializable::{from_json, to_json, Dict, Value};
//!
//! let mut dict = Dict::new();
//! dict.insert(Value::tuple([1, 2]), "a");
//! dict.insert("b", 3);
//!
//! let text = to_json(&Value::Dict(dict.clone()))?;
//! assert_eq!(from_json(&text)?, Value::Dict(dict));
//! ```

// Lets code generated by the derive macro name `::serializable` inside this crate.
extern crate self as serializable;

pub mod callable;
pub mod codec;
pub mod error;
pub mod inspect;
pub mod object;
pub mod registry;
pub mod value;

pub use callable::{CallError, Callable, Closure, Function, NativeFn};
pub use codec::{decode, encode, from_json, to_json, Codec, Ir, Options};
pub use error::{ConversionError, Error, ReconstructionError, RegistryError, ResolutionError};
pub use object::{FromFields, FromMapping, Object, Serializable, TypePath};
pub use registry::{
    build_reference, registry, Registrar, Registry, Resolved, TypeEntry, TypeHandle, TypeReference,
};
pub use value::{Dict, Fields, FromValue, Value};

#[cfg(feature = "derive")]
pub use serializable_derive::Serializable;
