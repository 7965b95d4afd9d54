//! IR -> Value

use serde_json::Number;

use super::Ir;
use crate::error::Error;
use crate::registry::Registry;
use crate::value::Value;

pub(crate) struct Decoder<'r> {
    pub(super) registry: &'r Registry,
}

impl<'r> Decoder<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub fn decode(&self, ir: &Ir) -> Result<Value, Error> {
        match ir {
            Ir::Null => Ok(Value::Null),
            Ir::Bool(b) => Ok(Value::Bool(*b)),
            Ir::Number(n) => number(n),
            Ir::String(s) => Ok(Value::Str(s.clone())),
            Ir::Array(items) => items
                .iter()
                .map(|item| self.decode(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Ir::Object(map) => self.decode_map(map),
        }
    }
}

fn number(n: &Number) -> Result<Value, Error> {
    if let Some(i) = n.as_i64() {
        Ok(Value::Int(i))
    } else if let Some(x) = n.as_f64() {
        // includes integers above i64::MAX
        Ok(Value::Float(x))
    } else {
        Err(Error::MalformedRepresentation(format!("unrepresentable number {}", n)))
    }
}
