use ocf::encoding::select_branch;
use ocf::{from_datum, to_datum, Error, Schema, SchemaNode, Value};

fn branch(union_json: &str, value: &Value) -> usize {
    let schema = Schema::parse(union_json).unwrap();
    let SchemaNode::Union(branches) = schema.node(schema.root()) else {
        panic!("not a union: {union_json}");
    };
    select_branch(value, &schema, branches).unwrap()
}

#[test]
fn test_boolean_never_selects_int() {
    assert_eq!(branch(r#"["boolean","int"]"#, &Value::Boolean(true)), 0);
    assert_eq!(branch(r#"["int","boolean"]"#, &Value::Boolean(true)), 1);

    let schema = Schema::parse(r#"["int","boolean"]"#).unwrap();
    assert_eq!(to_datum(&Value::Boolean(true), &schema).unwrap(), [0x02, 0x01]);
    assert_eq!(to_datum(&Value::Int(1), &schema).unwrap(), [0x00, 0x02]);
}

#[test]
fn test_integer_picks_narrowest_lossless_branch() {
    assert_eq!(branch(r#"["int","long"]"#, &Value::Int(5)), 0);
    assert_eq!(branch(r#"["long","int"]"#, &Value::Int(5)), 1);
    assert_eq!(branch(r#"["int","long"]"#, &Value::Int(1 << 40)), 1);
    assert_eq!(branch(r#"["float","double"]"#, &Value::Int(1 << 24)), 0);
    assert_eq!(branch(r#"["float","double"]"#, &Value::Int((1 << 24) + 1)), 1);
    assert_eq!(branch(r#"["string","double"]"#, &Value::Int(3)), 1);

    let schema = Schema::parse(r#"["int","float"]"#).unwrap();
    assert!(matches!(
        to_datum(&Value::Int(1 << 40), &schema),
        Err(Error::NoMatchingUnionBranch { .. })
    ));
}

#[test]
fn test_fractional_takes_first_floating_branch() {
    assert_eq!(branch(r#"["float","double"]"#, &Value::Float(0.5)), 0);
    assert_eq!(branch(r#"["float","double"]"#, &Value::Float(0.1)), 0);
    assert_eq!(branch(r#"["double","float"]"#, &Value::Float(0.1)), 0);
    assert_eq!(branch(r#"["null","float"]"#, &Value::Float(0.1)), 1);
    assert_eq!(branch(r#"["string","double","float"]"#, &Value::Float(2.5)), 1);

    let schema = Schema::parse(r#"["long","int"]"#).unwrap();
    assert!(matches!(to_datum(&Value::Float(1.0), &schema), Err(Error::NoMatchingUnionBranch { .. })));
}

#[test]
fn test_bytes_never_become_string() {
    assert_eq!(branch(r#"["string","bytes"]"#, &Value::Bytes(vec![1])), 1);
    let fixed = r#"["string",{"type":"fixed","name":"F2","size":2},{"type":"fixed","name":"F4","size":4}]"#;
    assert_eq!(branch(fixed, &Value::Bytes(vec![1, 2, 3, 4])), 2);

    let schema = Schema::parse(r#"["null","string"]"#).unwrap();
    let err = to_datum(&Value::Bytes(vec![1]), &schema).unwrap_err();
    assert!(matches!(err, Error::NoMatchingUnionBranch { found, .. } if found == "bytes"));
}

#[test]
fn test_null_requires_null_branch() {
    assert_eq!(branch(r#"["string","null"]"#, &Value::Null), 1);
    let schema = Schema::parse(r#"["string","int"]"#).unwrap();
    assert!(matches!(to_datum(&Value::Null, &schema), Err(Error::NoMatchingUnionBranch { .. })));
}

#[test]
fn test_collections_pick_first_matching_kind() {
    let union = r#"["null",{"type":"map","values":"int"},{"type":"array","items":"int"}]"#;
    assert_eq!(branch(union, &Value::Array(vec![])), 2);
    assert_eq!(branch(union, &Value::Map(Default::default())), 1);
}

#[test]
fn test_named_tag_disambiguates_records() {
    let union = r#"[
        {"type":"record","name":"ns.A","fields":[{"name":"x","type":"int"}]},
        {"type":"record","name":"ns.B","fields":[{"name":"x","type":"int"}]}
    ]"#;
    let rec = Value::record([("x", Value::Int(1))]);
    assert_eq!(branch(union, &rec), 0);
    assert_eq!(branch(union, &Value::named("ns.B", rec.clone())), 1);
    assert_eq!(branch(union, &Value::named("B", rec.clone())), 1);

    let schema = Schema::parse(union).unwrap();
    let bytes = to_datum(&Value::named("ns.B", rec.clone()), &schema).unwrap();
    assert_eq!(bytes, [0x02, 0x02]);
    // Decoding keeps the branch name, so the value re-encodes to the same branch.
    let decoded = from_datum(&bytes, &schema).unwrap();
    assert_eq!(decoded, Value::named("ns.B", rec.clone()));
    assert_eq!(decoded.untagged(), &rec);
    assert_eq!(to_datum(&decoded, &schema).unwrap(), bytes);
}

#[test]
fn test_decoded_union_values_re_encode_identically() {
    let unions = [
        r#"[{"type":"record","name":"A","fields":[{"name":"x","type":"int"}]},
            {"type":"record","name":"B","fields":[{"name":"x","type":"int"}]}]"#,
        r#"[{"type":"enum","name":"E1","symbols":["X","Y"]},
            {"type":"enum","name":"E2","symbols":["X","Z"]}]"#,
        r#"[{"type":"fixed","name":"F1","size":2},
            {"type":"fixed","name":"F2","size":2}]"#,
    ];
    for union in unions {
        let schema = Schema::parse(union).unwrap();
        let SchemaNode::Union(branches) = schema.node(schema.root()) else { unreachable!() };
        let payload = match schema.node(branches[1]) {
            SchemaNode::Record { .. } => vec![0x04],
            SchemaNode::Enum { .. }   => vec![0x00],
            _                         => vec![0xAB, 0xCD],
        };
        let mut bytes = vec![0x02];
        bytes.extend_from_slice(&payload);
        let decoded = from_datum(&bytes, &schema).unwrap();
        assert_eq!(to_datum(&decoded, &schema).unwrap(), bytes, "{union}");
    }
}

#[test]
fn test_untagged_record_matches_field_types() {
    let union = r#"[
        {"type":"record","name":"A","fields":[{"name":"x","type":"int"}]},
        {"type":"record","name":"B","fields":[{"name":"x","type":"string"}]}
    ]"#;
    assert_eq!(branch(union, &Value::record([("x", Value::Int(1))])), 0);
    assert_eq!(branch(union, &Value::record([("x", Value::from("s"))])), 1);

    let schema = Schema::parse(union).unwrap();
    let bytes = to_datum(&Value::record([("x", Value::from("s"))]), &schema).unwrap();
    assert_eq!(bytes, [0x02, 0x02, b's']);
    assert_eq!(to_datum(&from_datum(&bytes, &schema).unwrap(), &schema).unwrap(), bytes);

    let nested = r#"[
        {"type":"record","name":"P","fields":[{"name":"v","type":{"type":"array","items":"long"}}]},
        {"type":"record","name":"Q","fields":[{"name":"v","type":{"type":"array","items":"string"}}]}
    ]"#;
    assert_eq!(branch(nested, &Value::record([("v", Value::Array(vec![Value::from("a")]))])), 1);
    assert_eq!(branch(nested, &Value::record([("v", Value::Array(vec![Value::Int(3)]))])), 0);
}

#[test]
fn test_untagged_record_matches_structurally() {
    let union = r#"[
        "null",
        {"type":"record","name":"Point","fields":[{"name":"x","type":"int"},{"name":"y","type":"int"}]},
        {"type":"record","name":"Label","fields":[{"name":"text","type":"string"},{"name":"x","type":"int","default":0}]}
    ]"#;
    assert_eq!(branch(union, &Value::record([("x", Value::Int(1)), ("y", Value::Int(2))])), 1);
    assert_eq!(branch(union, &Value::record([("text", Value::from("t"))])), 2);

    let schema = Schema::parse(union).unwrap();
    let err = to_datum(&Value::record([("z", Value::Int(1))]), &schema).unwrap_err();
    assert!(matches!(err, Error::NoMatchingUnionBranch { .. }));
}

#[test]
fn test_enum_symbol_selects_declaring_enum() {
    let union = r#"[
        {"type":"enum","name":"Color","symbols":["RED","GREEN"]},
        {"type":"enum","name":"Size","symbols":["S","M","L"]}
    ]"#;
    assert_eq!(branch(union, &Value::Enum("M".into())), 1);
    assert_eq!(branch(union, &Value::Enum("RED".into())), 0);

    let schema = Schema::parse(union).unwrap();
    assert!(matches!(
        to_datum(&Value::Enum("XL".into()), &schema),
        Err(Error::NoMatchingUnionBranch { .. })
    ));
}
