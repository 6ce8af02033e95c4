//! Aggregation benchmarks
//!
//! Measures the normalize → aggregate path over synthetic pairwise links,
//! sized like a full farm sweep (12 peers × 11 remotes × payloads × runs).
//!
//! Run with: cargo bench --bench aggregations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use rb_bench_analysis::aggregate::{aggregate, GroupKey};
use rb_bench_analysis::config_key::ConfigurationKey;
use rb_bench_analysis::links::{is_local, PeerTable};
use rb_bench_analysis::record::PairwiseLink;
use rb_bench_analysis::units::Normalizer;

const SMALL_RUNS: usize = 10;
const LARGE_RUNS: usize = 1_000;
const PAYLOADS: [u64; 8] = [64, 128, 256, 512, 1024, 2048, 4096, 8192];

fn synthetic_links(runs: usize) -> Vec<PairwiseLink> {
    let peers = PeerTable::default();
    let mut rng = rand::thread_rng();
    let mut links = Vec::new();
    for run in 0..runs {
        let key = ConfigurationKey::protocol(50 * (1 + run as u64 % 3), 20);
        for &payload in &PAYLOADS {
            for to in 0..peers.len() {
                for from in (0..peers.len()).filter(|&f| f != to) {
                    let (Ok(from), Ok(to)) = (peers.name(from), peers.name(to)) else {
                        continue;
                    };
                    links.push(PairwiseLink::new(
                        from,
                        to,
                        payload,
                        key,
                        is_local(from, to),
                        rng.gen_range(100.0..10_000.0),
                        rng.gen_range(1.0..200.0),
                    ));
                }
            }
        }
    }
    links
}

/// Benchmark locality grouping
fn bench_aggregate_locality(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_locality");

    for runs in [SMALL_RUNS, LARGE_RUNS] {
        let links = synthetic_links(runs);
        group.bench_with_input(BenchmarkId::new("links", links.len()), &links, |b, links| {
            b.iter(|| aggregate(black_box(links), GroupKey::locality).unwrap());
        });
    }

    group.finish();
}

/// Benchmark per-peer grouping (more, smaller groups)
fn bench_aggregate_destination(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_destination");

    let links = synthetic_links(LARGE_RUNS);
    group.bench_with_input(BenchmarkId::new("links", links.len()), &links, |b, links| {
        b.iter(|| aggregate(black_box(links), GroupKey::destination).unwrap());
    });

    group.finish();
}

/// Benchmark unit normalization
fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    let links = synthetic_links(LARGE_RUNS);
    let normalizer = Normalizer::default();
    group.bench_with_input(BenchmarkId::new("links", links.len()), &links, |b, links| {
        b.iter(|| normalizer.normalize_all(black_box(links)).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_aggregate_locality,
    bench_aggregate_destination,
    bench_normalize
);
criterion_main!(benches);
