//! Benchmarks for the context-selection hot path.
//!
//! Run with: cargo bench -p glimpse-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glimpse_core::config::ContextConfig;
use glimpse_core::context::{select_paragraphs, ContextCleaner, RelaxPolicy};
use glimpse_core::math::{cosine_similarity, max_pool};

const DIM: usize = 384;

/// Deterministic pseudo-embeddings.
fn vectors(count: usize, seed: u32) -> Vec<Vec<f32>> {
    (0..count)
        .map(|i| {
            (0..DIM)
                .map(|d| (((i as u32 * 31 + d as u32 * 17 + seed) % 97) as f32 / 97.0) - 0.5)
                .collect()
        })
        .collect()
}

fn benchmark_cosine(c: &mut Criterion) {
    let v = vectors(2, 1);
    c.bench_function("cosine_similarity_384", |b| {
        b.iter(|| cosine_similarity(black_box(&v[0]), black_box(&v[1])))
    });
}

fn benchmark_max_pool(c: &mut Criterion) {
    let keywords = vectors(8, 2);
    c.bench_function("max_pool_8x384", |b| {
        b.iter(|| max_pool(black_box(&keywords)))
    });
}

fn benchmark_select(c: &mut Criterion) {
    let paragraphs = vectors(2_000, 3);
    let Some(query) = max_pool(&vectors(4, 4)) else {
        return;
    };
    let similarities: Vec<f32> = paragraphs
        .iter()
        .map(|p| cosine_similarity(&query, p))
        .collect();

    c.bench_function("select_paragraphs_2000", |b| {
        b.iter(|| {
            select_paragraphs(
                black_box(&similarities),
                3,
                0.5,
                RelaxPolicy::default(),
            )
        })
    });
}

fn benchmark_clean(c: &mut Criterion) {
    let Ok(cleaner) = ContextCleaner::new(&ContextConfig::default().filler_pattern) else {
        eprintln!("Skipping clean benchmark: filler pattern does not compile");
        return;
    };
    let paragraphs = [
        "El puerto de Valencia creció en 1990 con dos muelles.",
        "Los barcos llegan a Valencia cada día -- incluso en invierno.",
        "La lonja (1921) cerró pronto;\n\nhoy es un museo.",
    ];

    c.bench_function("join_and_clean", |b| {
        b.iter(|| cleaner.join(black_box(&paragraphs)))
    });
}

criterion_group!(
    benches,
    benchmark_cosine,
    benchmark_max_pool,
    benchmark_select,
    benchmark_clean
);
criterion_main!(benches);
