use ocf::encoding::primitive::{decode_long, encode_long};
use ocf::resolve::{from_datum_resolved, ResolutionConfig};
use ocf::{from_datum, to_datum, DatumConfig, Kind, Schema, Value};
use proptest::prelude::*;
use std::sync::Arc;

fn primitive(kind: Kind) -> Arc<Schema> {
    Arc::new(Schema::primitive(kind).unwrap())
}

proptest! {
    #[test]
    fn test_long_varint_round_trip(n in any::<i64>()) {
        let mut buf = Vec::new();
        encode_long(n, &mut buf);
        prop_assert!(!buf.is_empty() && buf.len() <= 10);
        let mut cursor = &buf[..];
        prop_assert_eq!(decode_long(&mut cursor).unwrap(), n);
        prop_assert!(cursor.is_empty());
    }

    #[test]
    fn test_int_promotion_closure(n in any::<i32>()) {
        let int = primitive(Kind::Int);
        let bytes = to_datum(&Value::Int(i64::from(n)), &int).unwrap();
        let read = |to: Kind| from_datum_resolved(
            &bytes, &int, &primitive(to), &DatumConfig::default(), &ResolutionConfig::default(),
        ).unwrap();

        prop_assert_eq!(read(Kind::Long), Value::Int(i64::from(n)));
        prop_assert_eq!(read(Kind::Double), Value::Float(f64::from(n)));
        prop_assert_eq!(read(Kind::Float), Value::Float(f64::from(n as f32)));
    }

    #[test]
    fn test_long_to_double_promotion(n in any::<i64>()) {
        let long = primitive(Kind::Long);
        let bytes = to_datum(&Value::Int(n), &long).unwrap();
        let read = from_datum_resolved(
            &bytes, &long, &primitive(Kind::Double), &DatumConfig::default(), &ResolutionConfig::default(),
        ).unwrap();
        prop_assert_eq!(read, Value::Float(n as f64));
    }

    #[test]
    fn test_string_round_trip(s in ".*") {
        let schema = primitive(Kind::String);
        let bytes = to_datum(&Value::from(s.as_str()), &schema).unwrap();
        prop_assert_eq!(from_datum(&bytes, &schema).unwrap(), Value::from(s.as_str()));
    }

    #[test]
    fn test_bytes_round_trip_and_skip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let schema = Schema::parse(r#"{"type":"array","items":"bytes"}"#).unwrap();
        let value = Value::Array(vec![Value::Bytes(data.clone()), Value::Bytes(data)]);
        for sized in [false, true] {
            let config = DatumConfig { sized_collections: sized, ..Default::default() };
            let bytes = ocf::encoding::to_datum_with(&value, &schema, &config).unwrap();
            prop_assert_eq!(&from_datum(&bytes, &schema).unwrap(), &value);

            let mut cursor = &bytes[..];
            ocf::encoding::skip(&schema, schema.root(), &mut cursor).unwrap();
            prop_assert!(cursor.is_empty());
        }
    }

    #[test]
    fn test_double_bits_preserved(bits in any::<u64>()) {
        let f = f64::from_bits(bits);
        prop_assume!(!f.is_nan());
        let schema = primitive(Kind::Double);
        let bytes = to_datum(&Value::Float(f), &schema).unwrap();
        prop_assert_eq!(bytes.len(), 8);
        prop_assert_eq!(from_datum(&bytes, &schema).unwrap(), Value::Float(f));
    }
}
