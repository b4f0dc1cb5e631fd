use ocf::io_stream::{DataFileReader, DataFileWriter, WriterOptions};
use ocf::{codec, from_datum, to_datum, Schema, Value};
use std::collections::HashMap;
use std::sync::Arc;

const INTEROP: &str = r#"{
    "type": "record", "name": "Interop", "namespace": "org.apache.avro",
    "fields": [
        {"name": "intField",    "type": "int"},
        {"name": "longField",   "type": "long"},
        {"name": "stringField", "type": "string"},
        {"name": "boolField",   "type": "boolean"},
        {"name": "floatField",  "type": "float"},
        {"name": "doubleField", "type": "double"},
        {"name": "bytesField",  "type": "bytes"},
        {"name": "nullField",   "type": "null"},
        {"name": "arrayField",  "type": {"type": "array", "items": "double"}},
        {"name": "mapField",    "type": {"type": "map", "values":
            {"type": "record", "name": "Foo", "fields": [{"name": "label", "type": "string"}]}}},
        {"name": "unionField",  "type": ["boolean", "double", {"type": "array", "items": "bytes"}]},
        {"name": "enumField",   "type": {"type": "enum", "name": "Kind", "symbols": ["A", "B", "C"]}},
        {"name": "fixedField",  "type": {"type": "fixed", "name": "MD5", "size": 16}},
        {"name": "recordField", "type": {"type": "record", "name": "Node", "fields": [
            {"name": "label",    "type": "string"},
            {"name": "children", "type": {"type": "array", "items": "Node"}}]}}
    ]
}"#;

fn foo(label: &str) -> Value {
    Value::record([("label", Value::from(label))])
}

fn interop_datum() -> Value {
    let mut map = HashMap::new();
    map.insert("a".to_string(), foo("a"));
    map.insert("bee".to_string(), foo("cee"));
    let inner = Value::record([("label", Value::from("inner")), ("children", Value::Array(vec![]))]);
    Value::record([
        ("intField",    Value::Int(12)),
        ("longField",   Value::Int(15234324)),
        ("stringField", Value::from("hey")),
        ("boolField",   Value::Boolean(true)),
        ("floatField",  Value::Float(1234.0)),
        ("doubleField", Value::Float(-1234.0)),
        ("bytesField",  Value::Bytes(b"12312adf".to_vec())),
        ("nullField",   Value::Null),
        ("arrayField",  Value::Array(vec![Value::Float(5.0), Value::Float(0.0), Value::Float(12.0)])),
        ("mapField",    Value::Map(map)),
        ("unionField",  Value::Float(12.0)),
        ("enumField",   Value::Enum("C".into())),
        ("fixedField",  Value::Bytes(b"1019181716151413".to_vec())),
        ("recordField", Value::record([
            ("label",    Value::from("blah")),
            ("children", Value::Array(vec![inner])),
        ])),
    ])
}

#[test]
fn test_interop_record_datum_round_trip() {
    let schema = Schema::parse(INTEROP).unwrap();
    let datum = interop_datum();
    let bytes = to_datum(&datum, &schema).unwrap();
    assert_eq!(from_datum(&bytes, &schema).unwrap(), datum);
}

#[test]
fn test_interop_record_leading_bytes() {
    let schema = Schema::parse(INTEROP).unwrap();
    let bytes = to_datum(&interop_datum(), &schema).unwrap();
    // intField 12, longField 15234324, stringField "hey", boolField true.
    assert_eq!(&bytes[..10], &[0x18, 0xa8, 0xd4, 0xc3, 0x0e, 0x06, b'h', b'e', b'y', 0x01]);
}

#[test]
fn test_interop_record_through_container() {
    let schema = Arc::new(Schema::parse(INTEROP).unwrap());
    for name in [codec::NULL, codec::ZSTANDARD, codec::XZ] {
        let mut w = DataFileWriter::new(Vec::new(), Arc::clone(&schema), WriterOptions::default().with_codec(name)).unwrap();
        w.append(&interop_datum()).unwrap();
        let bytes = w.close().unwrap();

        let reader = DataFileReader::new(&bytes[..]).unwrap();
        assert_eq!(reader.writer_schema().fingerprint(), schema.fingerprint());
        let values: Vec<Value> = reader.collect::<ocf::Result<_>>().unwrap();
        assert_eq!(values, vec![interop_datum()], "codec {name}");
    }
}

#[test]
fn test_interop_union_field_branches() {
    let schema = Schema::parse(INTEROP).unwrap();
    let with_union = |u: Value| {
        let Value::Record(mut fields) = interop_datum() else { unreachable!() };
        for (name, v) in fields.iter_mut() {
            if name == "unionField" {
                *v = u.clone();
            }
        }
        Value::Record(fields)
    };
    for u in [
        Value::Boolean(false),
        Value::Float(0.25),
        Value::Int(7),
        Value::Array(vec![Value::Bytes(vec![1, 2]), Value::Bytes(vec![])]),
    ] {
        let bytes = to_datum(&with_union(u.clone()), &schema).unwrap();
        let decoded = from_datum(&bytes, &schema).unwrap();
        // An integer offered to [boolean, double, ...] lands on double.
        let expected = match u {
            Value::Int(i) => Value::Float(i as f64),
            other => other,
        };
        assert_eq!(decoded.field("unionField"), Some(&expected));
    }
}

// ── Union matrix ─────────────────────────────────────────────────────────────

/// (union, value, expected branch index, expected decoded value)
fn matrix() -> Vec<(&'static str, Value, u8, Value)> {
    vec![
        (r#"["int","long"]"#,             Value::Int(1),           0, Value::Int(1)),
        (r#"["long","int"]"#,             Value::Int(1),           1, Value::Int(1)),
        (r#"["int","long"]"#,             Value::Int(1 << 33),     1, Value::Int(1 << 33)),
        (r#"["long","float","double"]"#,  Value::Int(9),           0, Value::Int(9)),
        (r#"["long","float","double"]"#,  Value::Float(1.5),       1, Value::Float(1.5)),
        (r#"["long","float","double"]"#,  Value::Float(0.1),       1, Value::Float(f64::from(0.1f32))),
        (r#"["double","float"]"#,         Value::Float(1.5),       0, Value::Float(1.5)),
        (r#"["float","double"]"#,         Value::Int(3),           0, Value::Float(3.0)),
        (r#"["null","boolean"]"#,         Value::Null,             0, Value::Null),
        (r#"["null","boolean"]"#,         Value::Boolean(true),    1, Value::Boolean(true)),
        (r#"["boolean","null"]"#,         Value::Null,             1, Value::Null),
        (r#"["boolean","null"]"#,         Value::Boolean(false),   0, Value::Boolean(false)),
        (r#"["null","int","boolean"]"#,   Value::Boolean(true),    2, Value::Boolean(true)),
        (r#"["null","boolean","int"]"#,   Value::Int(0),           2, Value::Int(0)),
    ]
}

#[test]
fn test_union_matrix() {
    for (union, value, index, expected) in matrix() {
        let schema = Schema::parse(union).unwrap();
        let bytes = to_datum(&value, &schema).unwrap();
        assert_eq!(bytes[0], index * 2, "{union} <- {value:?}");
        assert_eq!(from_datum(&bytes, &schema).unwrap(), expected, "{union} <- {value:?}");
    }
}
