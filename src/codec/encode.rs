//! Value -> IR

use serde_json::{Map, Number};

use super::{keys, Ir, CLASS_FIELD, MODULE_FIELD, NAME_FIELD, VALUE_FIELD};
use crate::callable::Callable;
use crate::error::Error;
use crate::object::Object;
use crate::registry::TypeReference;
use crate::value::{Dict, Value};

pub(crate) fn encode_value(value: &Value) -> Result<Ir, Error> {
    match value {
        Value::Null => Ok(Ir::Null),
        Value::Bool(b) => Ok(Ir::Bool(*b)),
        Value::Int(n) => Ok(Ir::from(*n)),
        Value::Float(x) => Number::from_f64(*x)
            .map(Ir::Number)
            .ok_or_else(|| Error::UnencodableValue(format!("{} : float (not finite)", x))),
        Value::Str(s) => Ok(Ir::String(s.clone())),
        Value::List(items) => encode_items(items).map(Ir::Array),
        Value::Tuple(items) => {
            let mut map = Map::new();
            map.insert(CLASS_FIELD.to_string(), reference_ir(&TypeReference::builtin("tuple")));
            map.insert(VALUE_FIELD.to_string(), Ir::Array(encode_items(items)?));
            Ok(Ir::Object(map))
        }
        Value::Dict(dict) => keys::encode_dict(dict).map(Ir::Object),
        Value::Callable(callable) => encode_callable(callable),
        Value::Type(entry) => Ok(reference_ir(entry.reference())),
        Value::Object(object) => encode_object(object),
    }
}

fn encode_items(items: &[Value]) -> Result<Vec<Ir>, Error> {
    items.iter().map(encode_value).collect()
}

/// Bare `{"__module__": ..., "__name__": ...}` mapping.
pub(crate) fn reference_ir(reference: &TypeReference) -> Ir {
    let mut map = Map::new();
    map.insert(MODULE_FIELD.to_string(), Ir::String(reference.module.clone()));
    map.insert(NAME_FIELD.to_string(), Ir::String(reference.name.clone()));
    Ir::Object(map)
}

fn encode_callable(callable: &Callable) -> Result<Ir, Error> {
    match callable {
        Callable::Function(function) => Ok(reference_ir(function.reference())),
        Callable::Closure(closure) if !closure.captures().is_empty() => {
            Err(Error::UnserializableClosure {
                name: closure.name().to_string(),
                captures: closure.captures().len(),
            })
        }
        other => Err(Error::UnserializableCallable(other.describe())),
    }
}

fn encode_object(object: &Object) -> Result<Ir, Error> {
    let reference = object.type_ref();
    let fields = object
        .to_fields()
        .or_else(|| object.record_fields())
        .ok_or_else(|| Error::UnencodableValue(format!("{:?} : {}", object, reference)))?;

    let mut map = keys::encode_dict(&Dict::from(fields))?;
    map.insert(CLASS_FIELD.to_string(), reference_ir(&reference));
    Ok(Ir::Object(map))
}
