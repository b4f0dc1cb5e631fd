use ocf::header::Header;
use ocf::{codec, Schema};
use std::collections::BTreeMap;

const NESTED_NULL_NAMESPACE: &str = r#"{
    "type":"record","name":"Outer","namespace":"ns","fields":[
        {"name":"a","type":{"type":"record","name":"Inner","namespace":"","fields":[
            {"name":"x","type":"int"}]}},
        {"name":"b","type":"Inner"},
        {"name":"c","type":{"type":"enum","name":"Tag","symbols":["T"]}}
    ]}"#;

#[test]
fn test_empty_namespace_is_the_null_namespace() {
    let schema = Schema::parse(NESTED_NULL_NAMESPACE).unwrap();
    assert!(schema.lookup("ns.Outer").is_some());
    assert!(schema.lookup("Inner").is_some());
    assert!(schema.lookup("ns.Inner").is_none());
    // Without an explicit namespace the enclosing one is inherited.
    assert!(schema.lookup("ns.Tag").is_some());
}

#[test]
fn test_null_namespace_survives_canonical_json() {
    let schema = Schema::parse(NESTED_NULL_NAMESPACE).unwrap();
    let again = Schema::parse(&schema.to_json_string()).unwrap();
    assert_eq!(again.fingerprint(), schema.fingerprint());
    assert!(again.lookup("Inner").is_some());
    assert!(again.lookup("ns.Inner").is_none());

    let header = Header::new(&schema, codec::NULL, &BTreeMap::new()).unwrap();
    let read = Header::read(&header.to_bytes()[..]).unwrap();
    let from_header = read.schema().unwrap();
    assert_eq!(from_header.fingerprint(), schema.fingerprint());
    assert!(from_header.lookup("Inner").is_some());
}

#[test]
fn test_explicit_namespace_overrides_enclosing() {
    let schema = Schema::parse(r#"{
        "type":"record","name":"R","namespace":"a","fields":[
            {"name":"f","type":{"type":"fixed","name":"F","namespace":"b","size":2}}
        ]}"#).unwrap();
    assert!(schema.lookup("a.R").is_some());
    assert!(schema.lookup("b.F").is_some());
    assert!(schema.lookup("a.F").is_none());
}
