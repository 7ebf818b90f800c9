//! Benchmarks for catalog rendering hot paths

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vybe_access::upload::{parse_tags, to_slug};
use vybe_access::{available_tags, catalog_entries, can_access, filter_assets, Grant, TagFilter};
use vybe_types::{Asset, AssetId, Tier, UserId};

fn catalog(size: usize) -> Vec<Asset> {
    (0..size)
        .map(|i| Asset {
            id: AssetId::new(),
            title: format!("Pack {i}"),
            description: Some(format!("Sample pack number {i} with one-shots")),
            required_tier: Tier::ALL[i % Tier::ALL.len()],
            tags: vec![format!("tag{}", i % 7), "loop".to_string()],
            storage_object_path: format!("pack-{i}.zip"),
            is_published: i % 5 != 0,
            created_at: Utc::now(),
        })
        .collect()
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog_filter");

    for size in [10, 100, 1000] {
        let assets = catalog(size);
        let tag = TagFilter::parse("tag3");

        group.bench_with_input(BenchmarkId::new("search", size), &assets, |b, assets| {
            b.iter(|| filter_assets(black_box(assets), black_box("one-shots"), &TagFilter::All));
        });

        group.bench_with_input(BenchmarkId::new("tag", size), &assets, |b, assets| {
            b.iter(|| filter_assets(black_box(assets), "", black_box(&tag)));
        });

        group.bench_with_input(BenchmarkId::new("available_tags", size), &assets, |b, assets| {
            b.iter(|| available_tags(black_box(assets)));
        });

        let grant = Grant {
            user_id: Some(UserId::new()),
            tier: Some(Tier::CreatorPlus),
            is_admin: false,
        };
        group.bench_with_input(BenchmarkId::new("entries", size), &assets, |b, assets| {
            b.iter(|| catalog_entries(black_box(assets), "pack", &TagFilter::All, &grant));
        });
    }

    group.finish();
}

fn bench_access_rule(c: &mut Criterion) {
    c.bench_function("can_access", |b| {
        b.iter(|| {
            Tier::ALL
                .iter()
                .filter(|required| can_access(**required, black_box(Some(Tier::CreatorPlus)), false))
                .count()
        });
    });
}

fn bench_upload_preparation(c: &mut Criterion) {
    let mut group = c.benchmark_group("upload_prep");

    group.bench_function("to_slug", |b| {
        b.iter(|| to_slug(black_box("  Alpha Pack!! Vol. 2 (Drums & Bass Edition) ")));
    });

    group.bench_function("parse_tags", |b| {
        b.iter(|| parse_tags(black_box("Drum, loop ,,DRUM, fx, Vocal, vocal, one-shot")));
    });

    group.finish();
}

criterion_group!(benches, bench_filter, bench_access_rule, bench_upload_preparation);
criterion_main!(benches);
