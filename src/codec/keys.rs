//! Dictionary keys
//!
//! JSON objects only have string keys. Every other key is encoded to JSON
//! text and stored once in a side table under [`KEY_TABLE_FIELD`]; the
//! dictionary entry is renamed to a placeholder holding the table index.

use std::collections::HashMap;

use serde_json::Map;

use super::decode::Decoder;
use super::encode::encode_value;
use super::{Ir, CLASS_FIELD, MODULE_FIELD, NAME_FIELD, VALUE_FIELD};
use crate::error::{Error, ReconstructionError};
use crate::registry::TypeHandle;
use crate::value::{Dict, Fields, Value};

/// Key holding the JSON text of every non-string key.
pub const KEY_TABLE_FIELD: &str = "__serialized_keys__";
/// Prefix of placeholder keys; the suffix is an index into the key table.
pub const KEY_PLACEHOLDER_PREFIX: &str = "__serialized_keys__element_";

pub fn placeholder_name(index: usize) -> String {
    format!("{}{}", KEY_PLACEHOLDER_PREFIX, index)
}

/// Index of a placeholder key, or `None` for any other key.
pub fn parse_placeholder(name: &str) -> Option<usize> {
    name.strip_prefix(KEY_PLACEHOLDER_PREFIX)?.parse().ok()
}

pub(crate) fn encode_dict(dict: &Dict) -> Result<Map<String, Ir>, Error> {
    let mut table: Vec<String> = Vec::new();
    let mut indices: HashMap<String, usize> = HashMap::new();
    let mut out = Map::with_capacity(dict.len() + 1);

    for (key, value) in dict.iter() {
        let name = match key {
            Value::Str(s) => s.clone(),
            other => {
                let text = serde_json::to_string(&encode_value(other)?)?;
                let next = table.len();
                let index = *indices.entry(text).or_insert_with_key(|text| {
                    table.push(text.clone());
                    next
                });
                placeholder_name(index)
            }
        };
        out.insert(name, encode_value(value)?);
    }

    if !table.is_empty() {
        out.insert(
            KEY_TABLE_FIELD.to_string(),
            Ir::Array(table.into_iter().map(Ir::String).collect()),
        );
    }
    Ok(out)
}

impl Decoder<'_> {
    pub(super) fn decode_map(&self, map: &Map<String, Ir>) -> Result<Value, Error> {
        if let Some(name) = map.get(NAME_FIELD) {
            return self.decode_reference(map.get(MODULE_FIELD), name);
        }

        let keys = match map.get(KEY_TABLE_FIELD) {
            Some(table) => self.decode_key_table(table)?,
            None => Vec::new(),
        };

        let mut dict = Dict::with_capacity(map.len());
        for (name, value) in map {
            if name == KEY_TABLE_FIELD {
                continue;
            }
            let key = match parse_placeholder(name) {
                Some(index) => keys.get(index).cloned().ok_or_else(|| {
                    ReconstructionError::MissingKey {
                        key: name.clone(),
                        index,
                        available: keys.len(),
                    }
                })?,
                None => Value::Str(name.clone()),
            };
            dict.insert(key, self.decode(value)?);
        }

        match dict.remove_str(CLASS_FIELD) {
            Some(class) => self.reconstruct(class, dict),
            None => Ok(Value::Dict(dict)),
        }
    }

    fn decode_reference(&self, module: Option<&Ir>, name: &Ir) -> Result<Value, Error> {
        match (module, name) {
            (Some(Ir::String(module)), Ir::String(name)) => {
                Ok(self.registry.resolve(module, name)?.into_value())
            }
            _ => Err(Error::MalformedRepresentation(format!(
                "reference needs string {} and {}, got {} and {}",
                MODULE_FIELD,
                NAME_FIELD,
                module.map_or_else(|| "nothing".to_string(), Ir::to_string),
                name
            ))),
        }
    }

    fn decode_key_table(&self, table: &Ir) -> Result<Vec<Value>, Error> {
        let entries = table.as_array().ok_or_else(|| {
            Error::MalformedRepresentation(format!("{} must be a list, got {}", KEY_TABLE_FIELD, table))
        })?;
        entries
            .iter()
            .map(|entry| {
                let text = entry.as_str().ok_or_else(|| {
                    Error::MalformedRepresentation(format!(
                        "{} entries must be strings, got {}",
                        KEY_TABLE_FIELD, entry
                    ))
                })?;
                let ir: Ir = serde_json::from_str(text).map_err(|e| {
                    Error::MalformedRepresentation(format!("serialized key {:?}: {}", text, e))
                })?;
                self.decode(&ir)
            })
            .collect()
    }

    fn reconstruct(&self, class: Value, mut fields: Dict) -> Result<Value, Error> {
        let entry: TypeHandle = match class {
            Value::Type(entry) => entry,
            other => return Err(ReconstructionError::NotAType(other.to_string()).into()),
        };
        let reference = entry.reference().clone();

        // Fields other than __value__ are ignored for positional construction
        let constructed = if let Some(value) = fields.remove_str(VALUE_FIELD) {
            let constructor = entry
                .value_constructor()
                .ok_or_else(|| ReconstructionError::NoValueConstructor(reference.clone()))?;
            constructor(value)
        } else if let Some(constructor) = entry.mapping_constructor() {
            constructor(fields)
        } else if let Some(constructor) = entry.fields_constructor() {
            Fields::try_from(fields).and_then(|fields| constructor(fields))
        } else {
            return Err(ReconstructionError::NotConstructible(reference).into());
        };

        tracing::trace!(reference = %reference, ok = constructed.is_ok(), "reconstructed value");
        constructed.map_err(|source| ReconstructionError::Constructor { reference, source }.into())
    }
}
