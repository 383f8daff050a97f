use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use otalign::transport::{solve, Mapping};
use std::hint::black_box;

/// Two jittered grids of `n` unit-mass points and their Euclidean costs.
fn grid_instance(n: usize, seed: u64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut rng = fastrand::Rng::with_seed(seed);
    let side = (n as f64).sqrt().ceil() as usize;
    let point = |i: usize, rng: &mut fastrand::Rng| {
        ((i % side) as f64 + rng.f64() * 0.5, (i / side) as f64 + rng.f64() * 0.5)
    };
    let refs: Vec<_> = (0..n).map(|i| point(i, &mut rng)).collect();
    let cands: Vec<_> = (0..n).map(|i| point(i, &mut rng)).collect();

    let mut costs = Vec::with_capacity(n * n);
    for c in &cands {
        for r in &refs {
            costs.push(((c.0 - r.0).powi(2) + (c.1 - r.1).powi(2)).sqrt());
        }
    }
    let mass = vec![1.0 / n as f64; n];
    (mass.clone(), mass, costs)
}

fn bench_mapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("mapping");
    for n in [16, 36, 64] {
        let (s, d, costs) = grid_instance(n, 42);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| Mapping::approximate(black_box(&s), black_box(&d), black_box(&costs), 0.01))
        });
    }
    group.finish();
}

fn bench_solver(c: &mut Criterion) {
    let n = 32;
    let mut rng = fastrand::Rng::with_seed(7);
    let costs: Vec<i64> = (0..n * n).map(|_| rng.i64(0..1000)).collect();
    let supplies: Vec<i64> = (0..n).map(|_| rng.i64(1..50)).collect();
    let total: i64 = supplies.iter().sum();
    let mut demands = vec![total / n as i64; n];
    demands[0] += total - demands.iter().sum::<i64>();

    c.bench_function("solver_n32", |b| {
        b.iter(|| solve(black_box(&costs), black_box(&supplies), black_box(&demands)))
    });
}

criterion_group!(benches, bench_mapping, bench_solver);
criterion_main!(benches);
