//! Metric analyzer benchmarks
//!
//! - Payload parsing per status code
//! - Tree ingestion at increasing fan-out
//! - Checkpoint of a populated registry

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

use tally_common::{MessageTree, Metric, Transaction, MINUTE_MS};
use tally_metric::infra::MemoryCollaborators;
use tally_metric::{AnalyzerConfig, Measurement, MetricAnalyzer};

fn build_tree(leaves: usize) -> MessageTree {
    let mut root = Transaction::new("URL", "/checkout");
    for i in 0..leaves {
        let status = ["C", "T", "S", "S,C"][i % 4];
        let data = match status {
            "S,C" => "3,9.5".to_string(),
            _ => (i % 97).to_string(),
        };
        root = root.with_child(Metric::new(
            format!("metric-{}", i % 16),
            status,
            data,
            (i as i64 % 60) * MINUTE_MS,
        ));
    }
    MessageTree::new("orderSvc", root)
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for (status, data) in [("C", "42"), ("T", "12.75"), ("S", "3.5"), ("S,C", "5,12.5")] {
        group.bench_with_input(BenchmarkId::new("status", status), &data, |b, data| {
            b.iter(|| Measurement::parse(black_box(status), black_box(data)))
        });
    }

    group.finish();
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");
    group.measurement_time(Duration::from_secs(5));

    for leaves in [8usize, 64, 512] {
        let tree = build_tree(leaves);
        group.throughput(Throughput::Elements(leaves as u64));
        group.bench_with_input(BenchmarkId::new("leaves", leaves), &tree, |b, tree| {
            let analyzer = MetricAnalyzer::for_current_hour(
                AnalyzerConfig::default(),
                MemoryCollaborators::default().handles(),
            );
            b.iter(|| analyzer.process(black_box(tree)))
        });
    }

    group.finish();
}

fn bench_checkpoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkpoint");

    group.bench_function("periodic_32_products", |b| {
        let analyzer = MetricAnalyzer::for_current_hour(
            AnalyzerConfig::default().local(),
            MemoryCollaborators::default().handles(),
        );
        for product in 0..32 {
            let mut tree = build_tree(64);
            tree.domain = format!("svc-{}", product);
            analyzer.process(&tree);
        }
        b.iter(|| analyzer.checkpoint(false))
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_ingest, bench_checkpoint);
criterion_main!(benches);
