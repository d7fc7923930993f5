/// Benchmarks comparing serial and parallel lane execution in the scatter engine.
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::{Array1, Array2};
use scatter_reduce::scatter::{self, Execution, ScatterOptions};

fn criterion_benchmark(c: &mut Criterion) {
    for (rows, columns) in [(1024, 64), (16384, 64), (16384, 512)] {
        let src = Array2::from_shape_fn((rows, columns), |(i, j)| ((i * columns + j) % 251) as f32)
            .into_dyn();
        // One destination row per group of 16 source rows, as when pooling node features.
        let index = Array1::from_shape_fn(rows, |i| (i / 16) as i64).into_dyn();
        for execution in [Execution::Serial, Execution::Rayon] {
            let options = ScatterOptions::new().with_execution(execution);
            let name = format!("scatter_add({}x{}, {:?})", rows, columns, execution);
            c.bench_function(&name, |b| {
                b.iter(|| {
                    scatter::scatter_add(black_box(src.view()), index.view(), 0, &options).unwrap();
                })
            });
            let name = format!("scatter_max({}x{}, {:?})", rows, columns, execution);
            c.bench_function(&name, |b| {
                b.iter(|| {
                    scatter::scatter_max(black_box(src.view()), index.view(), 0, &options).unwrap();
                })
            });
        }
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
