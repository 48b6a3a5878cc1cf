//! Benchmarks for the stateful nodes
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flow_nodes::config::{CollectorSettings, QueueSettings};
use flow_nodes::flow::nodes::{sanitize, OrderedCollectorNode, RateQueueNode, SanitizeLimits, TaggedItem};
use flow_nodes::flow::{message, BuiltinNode, Flow, PropertyPath};
use serde_json::json;
use std::time::Duration;

fn bench_collector_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("collector_cycle");

    for size in [4u64, 64, 512].iter() {
        group.throughput(Throughput::Elements(*size));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut flow = Flow::new("bench");
            let id = flow
                .add_node(
                    "collect",
                    BuiltinNode::OrderedCollector(OrderedCollectorNode::new(&CollectorSettings {
                        expected_count: size as i64,
                        ..Default::default()
                    })),
                )
                .unwrap();
            // Reverse arrival order is the worst case for ordering.
            let messages: Vec<_> = (0..size)
                .rev()
                .map(|p| {
                    let mut msg = message(json!(p));
                    TaggedItem::new(p, json!(p)).attach(&mut msg);
                    msg
                })
                .collect();

            b.iter(|| {
                for msg in &messages {
                    flow.inject(id, msg.clone()).unwrap();
                }
                black_box(flow.take_events());
            });
        });
    }

    group.finish();
}

fn bench_queue_backlog(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_backlog");

    for size in [100u64, 1000].iter() {
        group.throughput(Throughput::Elements(*size));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut flow = Flow::new("bench");
                let id = flow
                    .add_node(
                        "queue",
                        BuiltinNode::RateQueue(RateQueueNode::new(&QueueSettings {
                            max_entries: size / 2,
                            max_age_ms: 50,
                            min_interval_ms: 1,
                            ..Default::default()
                        })),
                    )
                    .unwrap();
                for seq in 0..size {
                    flow.inject(id, message(json!(seq))).unwrap();
                }
                flow.advance_to(Duration::from_millis(size));
                black_box(flow.take_events());
            });
        });
    }

    group.finish();
}

fn bench_sanitize(c: &mut Criterion) {
    let value = json!({
        "items": (0..500).map(|i| json!({"id": i, "name": "x".repeat(50), "_internal": i})).collect::<Vec<_>>(),
        "nested": {"a": {"b": {"c": {"d": {"e": {"f": 1}}}}}}
    });
    let limits = SanitizeLimits::default();

    c.bench_function("sanitize_wide_object", |b| {
        b.iter(|| black_box(sanitize(black_box(&value), &limits)))
    });
}

fn bench_property_path(c: &mut Criterion) {
    let msg = match json!({"payload": {"readings": [{"value": 1}, {"value": 2}, {"value": 3}]}}) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };

    c.bench_function("property_path_parse_get", |b| {
        b.iter(|| {
            let path = PropertyPath::parse(black_box("payload.readings[2].value")).unwrap();
            black_box(path.get(&msg).cloned())
        })
    });
}

criterion_group!(
    benches,
    bench_collector_cycle,
    bench_queue_backlog,
    bench_sanitize,
    bench_property_path
);
criterion_main!(benches);
