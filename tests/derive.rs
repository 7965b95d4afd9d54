//! Tests for the Serializable derive macro

use serde_json::json;
use serializable::{
    Codec, ConversionError, Fields, FromFields, FromValue, Registry, Serializable, TypePath,
    TypeReference, Value,
};

#[derive(Debug, Clone, PartialEq, Serializable)]
#[serializable(module = "geometry")]
struct Point {
    x: i64,
    y: i64,
}

#[derive(Debug, Clone, PartialEq, Serializable)]
#[serializable(module = "geometry")]
struct Polyline {
    points: Vec<Point>,
    closed: bool,
    #[serializable(default)]
    label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serializable)]
#[serializable(module = "catalog")]
struct Item {
    #[serializable(rename = "type")]
    kind: String,
    #[serializable(default)]
    tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serializable)]
struct Unnamespaced {
    value: f64,
}

#[derive(Debug, Clone, PartialEq, Serializable)]
#[serializable(module = "markers")]
struct Marker;

#[derive(Debug, Clone, PartialEq, Serializable)]
#[serializable(module = "numbers")]
struct Widths {
    a: i8,
    b: i16,
    c: i32,
    d: i64,
    e: u8,
    f: u16,
    g: u32,
    h: f32,
    i: f64,
    j: char,
}

#[derive(Debug, Clone, PartialEq, Serializable)]
#[serializable(module = "geometry", name = "Rect.Corner", record)]
struct Corner {
    at: Point,
}

// ============================================================================
// Type paths
// ============================================================================

#[test]
fn explicit_and_default_type_paths() {
    assert_eq!(Point::type_path(), TypeReference::new("geometry", "Point"));
    assert_eq!(Corner::type_path(), TypeReference::new("geometry", "Rect.Corner"));
    // defaults to the Rust module path of the defining module
    assert_eq!(Unnamespaced::type_path(), TypeReference::new("derive", "Unnamespaced"));
    assert_eq!(Point { x: 0, y: 0 }.type_ref(), Point::type_path());
}

// ============================================================================
// Capabilities
// ============================================================================

#[test]
fn fields_in_declaration_order() {
    let fields = Point { x: 1, y: 2 }.to_fields().unwrap();
    assert_eq!(fields.names().collect::<Vec<_>>(), ["x", "y"]);
    assert_eq!(fields.get("x"), Some(&Value::Int(1)));
    assert!(Point { x: 1, y: 2 }.record_fields().is_none());
}

#[test]
fn record_attribute_switches_capability() {
    let corner = Corner {
        at: Point { x: 1, y: 1 },
    };
    assert!(corner.to_fields().is_none());
    let fields = corner.record_fields().unwrap();
    assert_eq!(fields.get("at"), Some(&Value::from(Point { x: 1, y: 1 })));
}

#[test]
fn rename_is_used_both_ways() {
    let item = Item {
        kind: "book".to_string(),
        tags: vec!["used".to_string()],
    };
    let fields = item.to_fields().unwrap();
    assert_eq!(fields.names().collect::<Vec<_>>(), ["type", "tags"]);
    assert_eq!(Item::from_fields(fields).unwrap(), item);
}

// ============================================================================
// Construction from fields
// ============================================================================

#[test]
fn default_fields_may_be_missing() {
    let fields = Fields::new().with("type", "pen");
    assert_eq!(
        Item::from_fields(fields).unwrap(),
        Item {
            kind: "pen".to_string(),
            tags: vec![],
        }
    );
}

#[test]
fn missing_and_unexpected_fields() {
    assert_eq!(
        Point::from_fields(Fields::new().with("x", 1)).unwrap_err(),
        ConversionError::MissingField("y".to_string())
    );
    assert_eq!(
        Point::from_fields(Fields::new().with("x", 1).with("y", 2).with("z", 3)).unwrap_err(),
        ConversionError::UnexpectedField("z".to_string())
    );
}

#[test]
fn field_type_errors_name_the_field() {
    let err = Point::from_fields(Fields::new().with("x", "one").with("y", 2)).unwrap_err();
    assert!(matches!(err, ConversionError::FieldError(ref name, _) if name == "x"));
}

#[test]
fn every_integer_width_converts_both_ways() {
    let widths = Widths {
        a: i8::MIN,
        b: i16::MAX,
        c: -7,
        d: i64::MAX,
        e: u8::MAX,
        f: 300,
        g: u32::MAX,
        h: 0.5,
        i: -1.25,
        j: 'z',
    };
    let fields = widths.to_fields().unwrap();
    assert_eq!(fields.get("g"), Some(&Value::Int(i64::from(u32::MAX))));
    assert_eq!(Widths::from_fields(fields).unwrap(), widths);

    let too_big = widths.to_fields().unwrap().with("e", 256);
    assert!(matches!(
        Widths::from_fields(too_big).unwrap_err(),
        ConversionError::FieldError(ref name, _) if name == "e"
    ));
}

#[test]
fn unit_struct_has_no_fields() {
    assert!(Marker.to_fields().unwrap().is_empty());
    assert_eq!(Marker::from_fields(Fields::new()).unwrap(), Marker);
}

// ============================================================================
// Value conversions
// ============================================================================

#[test]
fn from_value_downcasts() {
    let value = Value::from(Point { x: 5, y: 6 });
    assert_eq!(Point::from_value(value.clone()).unwrap(), Point { x: 5, y: 6 });

    let err = Marker::from_value(value).unwrap_err();
    assert!(matches!(err, ConversionError::TypeMismatch { .. }));
    assert!(Point::from_value(Value::Int(1)).is_err());
}

// ============================================================================
// Through the codec
// ============================================================================

fn registry() -> Registry {
    let registry = Registry::with_builtins();
    registry.register::<Point>().unwrap();
    registry.register::<Polyline>().unwrap();
    registry.register::<Item>().unwrap();
    registry.register::<Marker>().unwrap();
    registry.register::<Corner>().unwrap();
    registry.register::<Unnamespaced>().unwrap();
    registry
}

#[test]
fn nested_objects_roundtrip() {
    let registry = registry();
    let codec = Codec::new(&registry);
    let line = Polyline {
        points: vec![Point { x: 0, y: 0 }, Point { x: 3, y: 4 }],
        closed: false,
        label: None,
    };

    let ir = codec.encode(&Value::from(line.clone())).unwrap();
    assert_eq!(ir["label"], json!(null));
    assert_eq!(ir["points"][1], json!({
        "x": 3,
        "y": 4,
        "__class__": {"__module__": "geometry", "__name__": "Point"}
    }));

    let decoded = codec.decode(&ir).unwrap();
    assert_eq!(Polyline::from_value(decoded).unwrap(), line);
}

#[test]
fn every_derived_shape_roundtrips() {
    let registry = registry();
    let codec = Codec::new(&registry);
    let values = vec![
        Value::from(Marker),
        Value::from(Corner {
            at: Point { x: -1, y: 9 },
        }),
        Value::from(Item {
            kind: "lamp".to_string(),
            tags: vec!["desk".to_string(), "led".to_string()],
        }),
        Value::from(Unnamespaced { value: 0.25 }),
    ];

    for value in values {
        let text = codec.to_json(&value).unwrap();
        assert_eq!(codec.from_json(&text).unwrap(), value, "roundtrip of {}", text);
    }
}
