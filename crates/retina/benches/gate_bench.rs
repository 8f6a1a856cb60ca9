//! Benchmarks for the plausibility gate and overlay rendering.
//!
//! Run with: cargo bench --bench gate_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{Rgb, RgbImage};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use retina_explain::{Heatmap, OverlayRenderer};
use retina_gate::{PlausibilityCheck, RetinalPlausibilityGate};

/// Synthetic fundus of the given size.
fn create_fundus(size: u32) -> RgbImage {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let c = f64::from(size) / 2.0;
    let radius = f64::from(size) * 0.4;
    RgbImage::from_fn(size, size, |x, y| {
        let dx = f64::from(x) + 0.5 - c;
        let dy = f64::from(y) + 0.5 - c;
        if dx * dx + dy * dy > radius * radius {
            Rgb([5, 5, 5])
        } else if x % 10 < 3 {
            Rgb([40, 34, 30])
        } else {
            let v: u8 = rng.gen_range(130..150);
            Rgb([v, v - 20, v - 30])
        }
    })
}

fn bench_gate_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("gate_evaluate");
    let gate = RetinalPlausibilityGate::new();

    for size in [224u32, 512, 1024].iter() {
        let image = create_fundus(*size);
        group.bench_with_input(BenchmarkId::new("fundus", size), size, |b, _| {
            b.iter(|| black_box(gate.evaluate(black_box(&image))))
        });
    }

    group.finish();
}

fn bench_single_checks(c: &mut Criterion) {
    let mut group = c.benchmark_group("gate_check");
    let gate = RetinalPlausibilityGate::new();
    let image = create_fundus(512);

    for check in PlausibilityCheck::ALL {
        group.bench_function(check.name(), |b| {
            b.iter(|| black_box(gate.run_check(check, black_box(&image))))
        });
    }

    group.finish();
}

fn bench_overlay(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlay_render");
    let renderer = OverlayRenderer::new();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let values: Vec<f32> = (0..49).map(|_| rng.gen::<f32>()).collect();
    let heatmap = Heatmap::new(7, 7, values).unwrap();

    for size in [224u32, 1024].iter() {
        let image = create_fundus(*size);
        group.bench_with_input(BenchmarkId::new("7x7", size), size, |b, _| {
            b.iter(|| black_box(renderer.render(black_box(&image), &heatmap)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_gate_evaluate, bench_single_checks, bench_overlay);
criterion_main!(benches);
