//! Benchmarks for the engine's hot paths: frecency scoring, item querying,
//! and dedup grouping.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pocket_engine::frecency;
use pocket_engine::model::{ItemFilter, ItemType};
use pocket_engine::storage::MemoryStorage;
use pocket_engine::DataEngine;

fn bench_frecency_score(c: &mut Criterion) {
    c.bench_function("frecency::score", |b| {
        b.iter(|| frecency::score(black_box(37), black_box(1_000_000), black_box(2_000_000)))
    });
}

fn bench_query_items(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let de = runtime.block_on(async {
        let de = DataEngine::new(Arc::new(MemoryStorage::new()));
        for i in 0..1_000 {
            de.add_item(
                ItemType::Text,
                pocket_engine::data_engine::NewItem {
                    content: Some(format!("item {i}")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }
        de
    });

    c.bench_function("query_items/1000 items", |b| {
        b.iter(|| {
            runtime.block_on(async { de.query_items(ItemFilter::default()).await.unwrap() })
        })
    });
}

fn bench_deduplicate_items(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("deduplicate_items/500 duplicate pairs", |b| {
        b.iter_batched(
            || {
                runtime.block_on(async {
                    let de = DataEngine::new(Arc::new(MemoryStorage::new()));
                    let names: Vec<String> = vec![];
                    for i in 0..500 {
                        let content = format!("https://example.test/{i}");
                        de.save_item(ItemType::Url, Some(content.clone()), &names, None, None)
                            .await
                            .unwrap();
                        de.save_item(ItemType::Url, Some(content), &names, None, None)
                            .await
                            .unwrap();
                    }
                    de
                })
            },
            |de| {
                runtime.block_on(async { de.deduplicate_items().await.unwrap() });
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_frecency_score,
    bench_query_items,
    bench_deduplicate_items
);
criterion_main!(benches);
