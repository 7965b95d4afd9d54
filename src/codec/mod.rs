//! Encoding and decoding
//!
//! Values are converted to an intermediate representation (IR), a JSON tree
//! held as [`serde_json::Value`], before being printed. The IR is
//! self-describing: reserved keys carry enough metadata to rebuild tuples,
//! non-string dictionary keys, types, functions and registered objects.
//!
//! ```text
//! (1, 2)              {"__class__": {"__module__": "builtins", "__name__": "tuple"},
//!                      "__value__": [1, 2]}
//!
//! {(1, 2): "a"}       {"__serialized_keys__element_0": "a",
//!                      "__serialized_keys__": ["{\"__class__\": ..., \"__value__\": [1,2]}"]}
//!
//! Point {x: 1, y: 2}  {"x": 1, "y": 2,
//!                      "__class__": {"__module__": "geometry", "__name__": "Point"}}
//! ```
//!
//! User fields named like a reserved key are not escaped; an object field
//! called `__class__` is overwritten on encode and a plain dictionary with
//! such a key is treated as a reconstruction target on decode.

mod decode;
mod encode;
mod keys;

pub use keys::{parse_placeholder, placeholder_name, KEY_PLACEHOLDER_PREFIX, KEY_TABLE_FIELD};

use crate::error::Error;
use crate::registry::{registry, Registry};
use crate::value::Value;

use decode::Decoder;

/// The JSON-compatible intermediate representation.
pub type Ir = serde_json::Value;

/// Marks a mapping as an instance of the referenced type.
pub const CLASS_FIELD: &str = "__class__";
/// Single positional constructor argument of a tagged value.
pub const VALUE_FIELD: &str = "__value__";
pub const MODULE_FIELD: &str = "__module__";
pub const NAME_FIELD: &str = "__name__";

/// Codec configuration
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Largest JSON text accepted by [`Codec::from_json`], in bytes.
    pub max_input_len: usize,
    /// Pretty-print JSON text output.
    pub pretty: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_input_len: 16 * 1024 * 1024,
            pretty: false,
        }
    }
}

/// Encoder/decoder bound to a registry.
#[derive(Clone, Copy)]
pub struct Codec<'r> {
    registry: &'r Registry,
    options: Options,
}

impl Codec<'static> {
    /// Codec using the process-wide [`registry`].
    pub fn global() -> Self {
        Codec::new(registry())
    }
}

impl<'r> Codec<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn encode(&self, value: &Value) -> Result<Ir, Error> {
        encode::encode_value(value)
    }

    pub fn decode(&self, ir: &Ir) -> Result<Value, Error> {
        Decoder::new(self.registry).decode(ir)
    }

    pub fn to_json(&self, value: &Value) -> Result<String, Error> {
        let ir = self.encode(value)?;
        let text = if self.options.pretty {
            serde_json::to_string_pretty(&ir)?
        } else {
            serde_json::to_string(&ir)?
        };
        Ok(text)
    }

    pub fn from_json(&self, text: &str) -> Result<Value, Error> {
        if text.len() > self.options.max_input_len {
            return Err(Error::InputTooLarge {
                len: text.len(),
                max: self.options.max_input_len,
            });
        }
        let ir: Ir = serde_json::from_str(text)?;
        self.decode(&ir)
    }
}

/// Convert a value to its intermediate representation.
pub fn encode(value: &Value) -> Result<Ir, Error> {
    encode::encode_value(value)
}

/// Rebuild a value from its intermediate representation, resolving
/// references against the process-wide registry.
pub fn decode(ir: &Ir) -> Result<Value, Error> {
    Codec::global().decode(ir)
}

/// JSON text of a value.
pub fn to_json(value: &Value) -> Result<String, Error> {
    Codec::global().to_json(value)
}

/// Rebuild a value from JSON text produced by [`to_json`].
pub fn from_json(text: &str) -> Result<Value, Error> {
    Codec::global().from_json(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_limit_is_enforced() {
        let registry = Registry::with_builtins();
        let codec = Codec::new(&registry).with_options(Options {
            max_input_len: 4,
            ..Options::default()
        });
        assert!(matches!(
            codec.from_json("[1, 2, 3]"),
            Err(Error::InputTooLarge { len: 9, max: 4 })
        ));
        assert_eq!(codec.from_json("[1]").unwrap(), Value::list([1]));
    }

    #[test]
    fn pretty_output() {
        let registry = Registry::with_builtins();
        let codec = Codec::new(&registry).with_options(Options {
            pretty: true,
            ..Options::default()
        });
        let text = codec.to_json(&Value::list([1, 2])).unwrap();
        assert_eq!(text, "[\n  1,\n  2\n]");
    }

    #[test]
    fn global_functions_use_builtins() {
        let value = Value::tuple([1, 2, 3]);
        let ir = encode(&value).unwrap();
        assert_eq!(
            ir,
            json!({
                "__class__": {"__module__": "builtins", "__name__": "tuple"},
                "__value__": [1, 2, 3]
            })
        );
        assert_eq!(decode(&ir).unwrap(), value);
        assert_eq!(from_json(&to_json(&value).unwrap()).unwrap(), value);
    }
}
