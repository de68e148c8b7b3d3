use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pgqb::{ConditionNode, Data, Db, DbConfig, Query, TableSchema};
use std::hint::black_box;

fn table() -> Query {
    Db::new(vec![TableSchema::new("t")], DbConfig::new())
        .and_then(|db| db.table("t"))
        .unwrap()
}

/// SELECT "t".* FROM "t" WHERE "t"."col0" = $1 AND "t"."col1" = $2 ...
fn build_select(base: &Query, n: usize) -> Query {
    (0..n).fold(base.clone(), |query, i| {
        query.where_(ConditionNode::eq(&format!("col{i}"), i as i64).unwrap())
    })
}

fn bench_to_sql(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/to_sql");
    let base = table();

    for n in [1, 5, 10, 50, 100] {
        let query = build_select(&base, n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &query, |b, query| {
            b.iter(|| black_box(query.to_sql_fresh().unwrap()));
        });
    }

    group.finish();
}

fn bench_build_and_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/build_and_render");
    let base = table();

    for n in [1, 5, 10, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| black_box(build_select(&base, n).to_sql().unwrap()));
        });
    }

    group.finish();
}

fn bench_condition_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/condition_tree");
    let base = table();

    for n in [1, 5, 10, 50] {
        let nodes: Vec<ConditionNode> = (0..n)
            .map(|i| {
                ConditionNode::or(vec![
                    ConditionNode::eq(&format!("a{i}"), i as i64).unwrap(),
                    ConditionNode::is_null(&format!("b{i}")).unwrap(),
                ])
            })
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &nodes, |b, nodes| {
            b.iter(|| {
                let query = base.where_(ConditionNode::and(nodes.clone()));
                black_box(query.to_sql().unwrap());
            });
        });
    }

    group.finish();
}

fn bench_insert_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/insert_many");
    let base = table();

    for n in [5, 20, 100, 500] {
        let rows: Vec<Data> = (0..n)
            .map(|i| Data::new().set("id", i as i64).set("name", format!("row{i}")))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &rows, |b, rows| {
            b.iter(|| black_box(base.insert_many(rows.clone()).unwrap().to_sql().unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_to_sql,
    bench_build_and_render,
    bench_condition_tree,
    bench_insert_many
);
criterion_main!(benches);
