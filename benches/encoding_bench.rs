use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ocf::codec::{BROTLI, LZ4, NULL, XZ, ZSTANDARD};
use ocf::io_stream::{DataFileReader, DataFileWriter, WriterOptions};
use ocf::{from_datum, to_datum, Schema, Value};
use std::sync::Arc;

const SCHEMA: &str = r#"{
    "type": "record", "name": "Event",
    "fields": [
        {"name": "id",      "type": "long"},
        {"name": "name",    "type": "string"},
        {"name": "score",   "type": "double"},
        {"name": "tags",    "type": {"type": "array", "items": "string"}},
        {"name": "comment", "type": ["null", "string"]}
    ]
}"#;

fn event(i: i64) -> Value {
    Value::record([
        ("id",      Value::Int(i)),
        ("name",    Value::from(format!("event-{i}"))),
        ("score",   Value::Float(i as f64 * 0.5)),
        ("tags",    Value::Array(vec![Value::from("a"), Value::from("b")])),
        ("comment", if i % 2 == 0 { Value::Null } else { Value::from("odd") }),
    ])
}

fn bench_datum(c: &mut Criterion) {
    let schema = Schema::parse(SCHEMA).unwrap();
    let value = event(12345);
    let bytes = to_datum(&value, &schema).unwrap();

    c.bench_function("datum_encode_record", |b| b.iter(|| to_datum(black_box(&value), &schema).unwrap()));
    c.bench_function("datum_decode_record", |b| b.iter(|| from_datum(black_box(&bytes), &schema).unwrap()));
}

fn bench_container(c: &mut Criterion) {
    let schema = Arc::new(Schema::parse(SCHEMA).unwrap());
    let events: Vec<Value> = (0..10_000).map(event).collect();

    for codec in [NULL, ZSTANDARD, XZ, LZ4, BROTLI] {
        c.bench_function(&format!("write_10k_{codec}"), |b| {
            b.iter(|| {
                let opts = WriterOptions::default().with_codec(codec);
                let mut w = DataFileWriter::new(Vec::new(), Arc::clone(&schema), opts).unwrap();
                w.extend(black_box(&events)).unwrap();
                w.close().unwrap()
            })
        });

        let opts = WriterOptions::default().with_codec(codec);
        let mut w = DataFileWriter::new(Vec::new(), Arc::clone(&schema), opts).unwrap();
        w.extend(&events).unwrap();
        let file = w.close().unwrap();
        c.bench_function(&format!("read_10k_{codec}"), |b| {
            b.iter(|| DataFileReader::new(black_box(&file[..])).unwrap().count())
        });
    }
}

criterion_group!(benches, bench_datum, bench_container);
criterion_main!(benches);
