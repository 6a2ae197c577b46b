use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pipegraph::{AggregateTransform, DatasetDraft, Datum, PipelineDraft, PipelineStore, Value};

fn rows(n: usize) -> Vec<Datum> {
    (0..n)
        .map(|i| {
            let mut row = Datum::new();
            row.insert("region".to_string(), Value::from(["E", "W", "N", "S"][i % 4]));
            row.insert("amt".to_string(), Value::Int(i as i64));
            row
        })
        .collect()
}

fn creation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_ops");
    let values = rows(512);

    group.bench_function("create_pipeline", |b| {
        let mut store = PipelineStore::new();
        b.iter(|| {
            store
                .create_pipeline(
                    black_box(PipelineDraft::new("bench")),
                    DatasetDraft::new(),
                    Some(values.clone()),
                )
                .unwrap()
        });
    });

    group.bench_function("aggregate_pipeline", |b| {
        let mut store = PipelineStore::new();
        let pid = store
            .create_pipeline(PipelineDraft::new("bench"), DatasetDraft::new(), Some(rows(8)))
            .unwrap();
        b.iter(|| {
            store
                .aggregate_pipeline(
                    pid,
                    black_box(AggregateTransform::group_by(["region"]).sum("amt")),
                )
                .unwrap()
        });
    });

    group.finish();
}

fn verify_benchmark(c: &mut Criterion) {
    let mut store = PipelineStore::new();
    for i in 0..200 {
        let pid = store
            .create_pipeline(
                PipelineDraft::new(format!("p{}", i)),
                DatasetDraft::new(),
                Some(rows(4)),
            )
            .unwrap();
        store
            .aggregate_pipeline(pid, AggregateTransform::group_by(["region"]).count())
            .unwrap();
    }

    c.bench_function("verify_200_pipelines", |b| {
        b.iter(|| black_box(store.verify()))
    });
}

criterion_group!(benches, creation_benchmark, verify_benchmark);
criterion_main!(benches);
