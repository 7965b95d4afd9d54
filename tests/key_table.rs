use serde_json::json;
use serializable::{
    Codec, Dict, Error, Fields, Object, ReconstructionError, Registry, Serializable, TypeReference,
    Value,
};

#[derive(Debug, Clone, PartialEq, Serializable)]
#[serializable(module = "geometry")]
struct Point {
    x: i64,
    y: i64,
}

fn codec_roundtrip(registry: &Registry, value: &Value) -> Value {
    let codec = Codec::new(registry);
    let text = codec.to_json(value).expect("to_json");
    codec.from_json(&text).expect("from_json")
}

// ============================================================================
// Encoding
// ============================================================================

#[test]
fn string_keys_produce_no_table() {
    let registry = Registry::with_builtins();
    let dict: Dict = [("a", 1), ("b", 2)].into_iter().collect();
    let ir = Codec::new(&registry).encode(&Value::Dict(dict)).unwrap();
    assert_eq!(ir, json!({"a": 1, "b": 2}));
}

#[test]
fn reinserted_key_replaces_value_in_place() {
    let registry = Registry::with_builtins();
    let mut dict = Dict::new();
    dict.insert(Value::tuple([1]), "x");
    dict.insert(Value::tuple([2]), "y");
    // replaces the first entry in place
    dict.insert(Value::tuple([1]), "z");

    let ir = Codec::new(&registry).encode(&Value::Dict(dict)).unwrap();
    let table = ir["__serialized_keys__"].as_array().unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(ir["__serialized_keys__element_0"], json!("z"));
    assert_eq!(ir["__serialized_keys__element_1"], json!("y"));
}

/// Identity-compared handle: two handles are never equal, even with the same id.
#[derive(Debug)]
struct Handle(i64);

impl PartialEq for Handle {
    fn eq(&self, _: &Self) -> bool {
        false
    }
}

impl Serializable for Handle {
    fn type_ref(&self) -> TypeReference {
        TypeReference::new("handles", "Handle")
    }

    fn to_fields(&self) -> Option<Fields> {
        Some(Fields::new().with("id", self.0))
    }
}

#[test]
fn keys_with_equal_json_text_share_one_placeholder() {
    let registry = Registry::with_builtins();
    let mut dict = Dict::new();
    dict.insert(Value::Object(Object::new(Handle(1))), "x");
    dict.insert(Value::Object(Object::new(Handle(1))), "y");
    dict.insert(Value::Object(Object::new(Handle(2))), "z");
    assert_eq!(dict.len(), 3);

    let ir = Codec::new(&registry).encode(&Value::Dict(dict)).unwrap();
    assert_eq!(
        ir,
        json!({
            "__serialized_keys__element_0": "y",
            "__serialized_keys__element_1": "z",
            "__serialized_keys__": [
                "{\"id\":1,\"__class__\":{\"__module__\":\"handles\",\"__name__\":\"Handle\"}}",
                "{\"id\":2,\"__class__\":{\"__module__\":\"handles\",\"__name__\":\"Handle\"}}"
            ]
        })
    );
}

#[test]
fn every_mapping_gets_its_own_table() {
    let registry = Registry::with_builtins();
    let mut inner = Dict::new();
    inner.insert(Value::Int(5), "five");

    let mut outer = Dict::new();
    outer.insert(Value::Bool(true), Value::Dict(inner.clone()));
    outer.insert("plain", Value::list([Value::Dict(inner)]));

    let ir = Codec::new(&registry).encode(&Value::Dict(outer)).unwrap();
    assert_eq!(ir["__serialized_keys__"], json!(["true"]));
    assert_eq!(ir["__serialized_keys__element_0"]["__serialized_keys__"], json!(["5"]));
    assert_eq!(ir["plain"][0]["__serialized_keys__"], json!(["5"]));
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn non_string_keys_of_every_kind() {
    let registry = Registry::with_builtins();
    registry.register::<Point>().unwrap();
    let list_type = registry.resolve("builtins", "list").unwrap().into_value();

    let mut dict = Dict::new();
    dict.insert(Value::Int(1), "int");
    dict.insert(Value::Float(1.5), "float");
    dict.insert(Value::Bool(false), "bool");
    dict.insert(Value::Null, "null");
    dict.insert(Value::tuple(["a", "b"]), "tuple");
    dict.insert(Point { x: 1, y: 2 }, "object");
    dict.insert(list_type, "type");
    dict.insert("1", "string that looks like an int");
    let value = Value::Dict(dict);

    assert_eq!(codec_roundtrip(&registry, &value), value);
}

#[test]
fn placeholder_order_does_not_matter() {
    let registry = Registry::with_builtins();
    let ir = json!({
        "__serialized_keys__element_1": "second",
        "__serialized_keys__": ["10", "20"],
        "__serialized_keys__element_0": "first"
    });

    let decoded = Codec::new(&registry).decode(&ir).unwrap();
    let mut expected = Dict::new();
    expected.insert(Value::Int(10), "first");
    expected.insert(Value::Int(20), "second");
    assert_eq!(decoded, Value::Dict(expected));
}

// ============================================================================
// Invalid tables
// ============================================================================

#[test]
fn placeholder_beyond_table_is_rejected() {
    let registry = Registry::with_builtins();
    let ir = json!({
        "__serialized_keys__element_3": "x",
        "__serialized_keys__": ["1"]
    });

    let err = Codec::new(&registry).decode(&ir).unwrap_err();
    assert!(matches!(
        err,
        Error::Reconstruction(ReconstructionError::MissingKey { index: 3, available: 1, .. })
    ));
}

#[test]
fn placeholder_without_table_is_rejected() {
    let registry = Registry::with_builtins();
    let ir = json!({"__serialized_keys__element_0": "x"});

    let err = Codec::new(&registry).decode(&ir).unwrap_err();
    assert!(matches!(
        err,
        Error::Reconstruction(ReconstructionError::MissingKey { index: 0, available: 0, .. })
    ));
}

#[test]
fn malformed_tables_are_rejected() {
    let registry = Registry::with_builtins();
    let codec = Codec::new(&registry);
    let cases = [
        json!({"__serialized_keys__": "not a list"}),
        json!({"__serialized_keys__": [1]}),
        json!({"__serialized_keys__": ["{not json"]}),
    ];

    for ir in cases {
        let err = codec.decode(&ir).unwrap_err();
        assert!(
            matches!(err, Error::MalformedRepresentation(_)),
            "expected malformed for {}, got {:?}",
            ir,
            err
        );
    }
}

#[test]
fn unknown_type_in_key_is_a_resolution_error() {
    let registry = Registry::with_builtins();
    let ir = json!({
        "__serialized_keys__element_0": 1,
        "__serialized_keys__": ["{\"__module__\":\"nosuchmodule\",\"__name__\":\"X\"}"]
    });

    let err = Codec::new(&registry).decode(&ir).unwrap_err();
    assert!(matches!(err, Error::Resolution(_)));
}
