//! Static inspection of stored representations
//!
//! Walks an IR tree and reports the references, tagged objects and key
//! tables it contains, without resolving anything. Key table entries are
//! parsed and walked too; their findings carry the pointer of the entry,
//! `<mapping>/__serialized_keys__/<index>`, followed by the path inside the
//! parsed key.

use serde::Serialize;
use serde_json::Map;

use crate::codec::{Ir, CLASS_FIELD, KEY_TABLE_FIELD, MODULE_FIELD, NAME_FIELD, VALUE_FIELD};
use crate::registry::TypeReference;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// A type or function value.
    Reference { pointer: String, reference: TypeReference },
    /// An object to be reconstructed from a type.
    Tagged {
        pointer: String,
        reference: TypeReference,
        positional: bool,
    },
    /// Serialized non-string dictionary keys.
    KeyTable { pointer: String, keys: Vec<String> },
    /// A reserved field the decoder would reject.
    Malformed { pointer: String, reason: String },
}

impl Finding {
    /// JSON pointer of the mapping the finding belongs to.
    pub fn pointer(&self) -> &str {
        match self {
            Finding::Reference { pointer, .. }
            | Finding::Tagged { pointer, .. }
            | Finding::KeyTable { pointer, .. }
            | Finding::Malformed { pointer, .. } => pointer,
        }
    }
}

pub fn inspect(ir: &Ir) -> Vec<Finding> {
    let mut findings = Vec::new();
    walk(ir, String::new(), &mut findings);
    findings
}

/// A mapping holding `__name__` is a reference; both fields must be strings.
fn reference_of(map: &Map<String, Ir>) -> Result<TypeReference, String> {
    match (map.get(MODULE_FIELD), map.get(NAME_FIELD)) {
        (Some(Ir::String(module)), Some(Ir::String(name))) => Ok(TypeReference::new(module, name)),
        (module, name) => Err(format!(
            "reference needs string {} and {}, got {} and {}",
            MODULE_FIELD,
            NAME_FIELD,
            module.map_or_else(|| "nothing".to_string(), Ir::to_string),
            name.map_or_else(|| "nothing".to_string(), Ir::to_string),
        )),
    }
}

fn class_of(class: &Ir) -> Result<TypeReference, String> {
    match class.as_object() {
        Some(map) if map.contains_key(NAME_FIELD) => reference_of(map),
        _ => Err(format!("{} must be a type reference, got {}", CLASS_FIELD, class)),
    }
}

fn walk(ir: &Ir, pointer: String, out: &mut Vec<Finding>) {
    match ir {
        Ir::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, format!("{}/{}", pointer, i), out);
            }
        }
        Ir::Object(map) => {
            if map.contains_key(NAME_FIELD) {
                out.push(match reference_of(map) {
                    Ok(reference) => Finding::Reference { pointer, reference },
                    Err(reason) => Finding::Malformed { pointer, reason },
                });
                return;
            }
            if let Some(class) = map.get(CLASS_FIELD) {
                out.push(match class_of(class) {
                    Ok(reference) => Finding::Tagged {
                        pointer: pointer.clone(),
                        reference,
                        positional: map.contains_key(VALUE_FIELD),
                    },
                    Err(reason) => Finding::Malformed {
                        pointer: pointer.clone(),
                        reason,
                    },
                });
            }
            if let Some(table) = map.get(KEY_TABLE_FIELD) {
                walk_key_table(table, &pointer, out);
            }
            for (key, value) in map {
                if key != KEY_TABLE_FIELD && key != CLASS_FIELD {
                    walk(value, format!("{}/{}", pointer, escape(key)), out);
                }
            }
        }
        _ => {}
    }
}

fn walk_key_table(table: &Ir, pointer: &str, out: &mut Vec<Finding>) {
    let table_pointer = format!("{}/{}", pointer, KEY_TABLE_FIELD);
    let Some(entries) = table.as_array() else {
        out.push(Finding::Malformed {
            pointer: table_pointer,
            reason: format!("{} must be a list, got {}", KEY_TABLE_FIELD, table),
        });
        return;
    };

    out.push(Finding::KeyTable {
        pointer: pointer.to_string(),
        keys: entries.iter().filter_map(|k| k.as_str().map(str::to_string)).collect(),
    });
    for (i, entry) in entries.iter().enumerate() {
        let entry_pointer = format!("{}/{}", table_pointer, i);
        let parsed = entry
            .as_str()
            .ok_or_else(|| format!("{} entries must be strings, got {}", KEY_TABLE_FIELD, entry))
            .and_then(|text| {
                serde_json::from_str::<Ir>(text).map_err(|e| format!("serialized key {:?}: {}", text, e))
            });
        match parsed {
            Ok(key) => walk(&key, entry_pointer, out),
            Err(reason) => out.push(Finding::Malformed {
                pointer: entry_pointer,
                reason,
            }),
        }
    }
}

fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_nested_tags_and_tables() {
        let ir = json!({
            "pts": [{
                "x": 1,
                "__class__": {"__module__": "geo", "__name__": "Point"}
            }],
            "__serialized_keys__element_0": {"__module__": "math", "__name__": "sqrt"},
            "__serialized_keys__": ["1"],
            "a/b": {"__class__": {"__module__": "builtins", "__name__": "tuple"}, "__value__": []}
        });

        let findings = inspect(&ir);
        assert_eq!(
            findings,
            vec![
                Finding::KeyTable {
                    pointer: String::new(),
                    keys: vec!["1".to_string()]
                },
                Finding::Tagged {
                    pointer: "/pts/0".to_string(),
                    reference: TypeReference::new("geo", "Point"),
                    positional: false
                },
                Finding::Reference {
                    pointer: "/__serialized_keys__element_0".to_string(),
                    reference: TypeReference::new("math", "sqrt")
                },
                Finding::Tagged {
                    pointer: "/a~1b".to_string(),
                    reference: TypeReference::new("builtins", "tuple"),
                    positional: true
                },
            ]
        );
    }

    #[test]
    fn walks_inside_serialized_keys() {
        let mut dict = crate::Dict::new();
        dict.insert(crate::Value::tuple([1, 2]), "a");
        let ir = crate::encode(&crate::Value::Dict(dict)).unwrap();

        let findings = inspect(&ir);
        assert_eq!(findings.len(), 2);
        assert!(matches!(findings[0], Finding::KeyTable { ref keys, .. } if keys.len() == 1));
        assert_eq!(
            findings[1],
            Finding::Tagged {
                pointer: "/__serialized_keys__/0".to_string(),
                reference: TypeReference::new("builtins", "tuple"),
                positional: true
            }
        );
    }

    #[test]
    fn reports_what_the_decoder_would_reject() {
        let ir = json!({
            "ref": {"__name__": "sqrt"},
            "obj": {"__class__": "Point", "x": 1},
            "keys": {"__serialized_keys__": [7, "{oops"]},
            "table": {"__serialized_keys__": "nope"}
        });

        let findings = inspect(&ir);
        let pointers: Vec<(&str, bool)> = findings
            .iter()
            .map(|f| (f.pointer(), matches!(f, Finding::Malformed { .. })))
            .collect();
        assert_eq!(
            pointers,
            vec![
                ("/ref", true),
                ("/obj", true),
                ("/keys", false),
                ("/keys/__serialized_keys__/0", true),
                ("/keys/__serialized_keys__/1", true),
                ("/table/__serialized_keys__", true),
            ]
        );
    }
}
