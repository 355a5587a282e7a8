// SPDX-License-Identifier: MIT OR Apache-2.0
//! Benchmarks for the validation pass over schemas of varying parameter
//! counts and constraint complexity.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use opal_decode::validate;
use opal_schema::{DescriptorBuilder, ParamType, Schema};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

fn schema_with(param_count: usize) -> Schema {
    let mut builder = DescriptorBuilder::new("bench");
    for i in 0..param_count {
        builder = builder
            .param(format!("p{i}"), ParamType::Integer)
            .range(Some(0.0), Some(1000.0))
            .default(1)
            .commit();
    }
    builder.build().unwrap().schema
}

fn canonical_with(param_count: usize, fill: usize) -> BTreeMap<String, Value> {
    let mut map = BTreeMap::new();
    for i in 0..fill {
        map.insert(format!("p{i}"), Value::from(42));
    }
    let _ = param_count;
    map
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    for count in [1, 5, 20] {
        let schema = schema_with(count);

        group.bench_with_input(BenchmarkId::new("all_defaults", count), &count, |b, &count| {
            b.iter(|| validate(black_box(&schema), black_box(canonical_with(count, 0))));
        });

        group.bench_with_input(BenchmarkId::new("all_explicit", count), &count, |b, &count| {
            b.iter(|| validate(black_box(&schema), black_box(canonical_with(count, count))));
        });
    }

    group.finish();
}

fn bench_retry_schema_validate(c: &mut Criterion) {
    let schema = DescriptorBuilder::new("retry")
        .deprecated_alias("times", "attempts")
        .param("attempts", ParamType::Integer)
        .range(Some(1.0), Some(10.0))
        .default(3)
        .commit()
        .param("delay", ParamType::Duration)
        .default("1s")
        .commit()
        .build()
        .unwrap()
        .schema;

    let mut filled: BTreeMap<String, Value> = Map::new().into_iter().collect();
    filled.insert("attempts".to_string(), Value::from(5));
    filled.insert("delay".to_string(), Value::String("5s".to_string()));

    c.bench_function("retry_schema_validate", |b| {
        b.iter(|| validate(black_box(&schema), black_box(filled.clone())));
    });
}

criterion_group!(benches, bench_validate, bench_retry_schema_validate);
criterion_main!(benches);
