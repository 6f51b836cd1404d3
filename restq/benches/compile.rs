//! Benchmarks for request compilation.
//!
//! Run with: cargo bench -p restq

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use restq::{Compiler, Limits, RawQuery, Registry, Relation, ResourceDescriptor, compile_filter};
use restq_sql::{QueryBuilder, Sqlite};
use std::hint::black_box;

fn compiler() -> Compiler {
    let registry = Registry::builder()
        .resource(
            ResourceDescriptor::new("customers")
                .properties(["name", "email", "created_at"])
                .relation("orders", Relation::has_many("orders", "id", "customer_id")),
        )
        .resource(
            ResourceDescriptor::new("orders")
                .properties(["total", "status", "created_at"])
                .relation("customer", Relation::belongs_to("customers", "customer_id", "id"))
                .relation("items", Relation::has_many("order_items", "id", "order_id")),
        )
        .resource(
            ResourceDescriptor::new("order_items")
                .properties(["sku", "qty", "price"])
                .relation("order", Relation::belongs_to("orders", "order_id", "id")),
        )
        .build()
        .expect("valid registry");
    Compiler::new(registry)
}

// =============================================================================
// Filter Benchmarks
// =============================================================================

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");
    let orders = ResourceDescriptor::new("orders").properties(["total", "status", "created_at"]);
    let limits = Limits::default();

    let filters = [
        ("simple", "status eq 'paid'"),
        ("boolean", "status eq 'paid' and total gt 10 or status eq 'open'"),
        (
            "nested",
            "not (status eq 'void') and (startswith(status, 'p') or (total ge 100 and total le 500))",
        ),
    ];

    for (name, src) in filters {
        group.bench_with_input(BenchmarkId::new("compile", name), src, |b, s| {
            b.iter(|| compile_filter(black_box(s), &orders, &limits))
        });
    }

    group.finish();
}

// =============================================================================
// Plan Benchmarks
// =============================================================================

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    let compiler = compiler();

    let queries = [
        ("empty", ""),
        ("paged", "$top=25&$skip=50&$sort=-created_at"),
        (
            "full",
            "$filter=status%20eq%20'paid'&$sort=-total&$expand=customer,items\
             &$select=total,items/sku,customer/name&$count=true",
        ),
    ];

    for (name, query) in queries {
        let raw = RawQuery::from_query_string(query).expect("valid query string");
        group.bench_with_input(BenchmarkId::new("compile", name), &raw, |b, raw| {
            b.iter(|| compiler.compile("orders", black_box(raw)))
        });
    }

    let plan = compiler
        .compile(
            "orders",
            &RawQuery::from_query_string(queries[2].1).expect("valid query string"),
        )
        .expect("valid query");
    group.bench_function("apply_to_sql", |b| {
        b.iter(|| {
            black_box(&plan)
                .apply_to(QueryBuilder::new(Sqlite, "orders"))
                .build()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_filter, bench_plan);
criterion_main!(benches);
