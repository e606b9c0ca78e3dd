use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use graphdat::{RequestInfo, RouteTokenizer, SpanTree};
use std::hint::black_box;

fn criterion_benchmark(c: &mut Criterion) {
    span_tree_benchmark_group(c);
    route_benchmark_group(c);
}

fn span_tree_benchmark_group(c: &mut Criterion) {
    let mut group = c.benchmark_group("span_tree");
    group.bench_function("root_only", |b| {
        b.iter(|| {
            let tree = SpanTree::new(RequestInfo::new("GET", "example.com", "/"));
            black_box(tree.compile());
        })
    });
    for depth in [1, 8, 32] {
        group.bench_function(BenchmarkId::new("nested", depth), |b| {
            b.iter(|| {
                let mut tree = SpanTree::new(RequestInfo::new("GET", "example.com", "/render"));
                for _ in 0..depth {
                    tree.begin("work");
                }
                for _ in 0..depth {
                    tree.end("work");
                }
                black_box(tree.compile());
            })
        });
    }
    group.bench_function("compile_and_encode", |b| {
        b.iter(|| {
            let mut tree = SpanTree::new(RequestInfo::new("GET", "example.com", "/render"));
            for name in ["db", "cache", "template"] {
                tree.begin(name);
                tree.end(name);
            }
            black_box(tree.compile().encode())
        })
    });
    group.finish();
}

fn route_benchmark_group(c: &mut Criterion) {
    let routes = RouteTokenizer::new([
        r"users/(?P<id>\d+)",
        r"(?P<org>\w+)/repos/(?P<repo>[\w-]+)/issues/(\d+)",
    ])
    .unwrap();

    let mut group = c.benchmark_group("route");
    group.bench_function("tokenized", |b| {
        b.iter(|| black_box(routes.render("/acme/repos/agent/issues/7", None)))
    });
    group.bench_function("untokenized", |b| {
        b.iter(|| black_box(routes.render("/about", Some("tab=team"))))
    });
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
