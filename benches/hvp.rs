use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use laplace_core::scalar::lift;
use laplace_core::{
    build_hvp, build_hvp_with_data, record, DataBatch, LossKind, Model, ParamTree, Result, Scalar,
};
use ndarray::{Array1, Array2, ArrayD, ArrayViewD};

/// One hidden tanh layer, scalar output per sample.
struct Mlp;

impl Model<f64> for Mlp {
    fn apply<T: Scalar<Float = f64>>(
        &self,
        params: &ParamTree<T>,
        input: ArrayViewD<'_, f64>,
    ) -> Result<ArrayD<T>> {
        let w = params.leaf("w")?;
        let v = params.leaf("v")?;
        let x = lift::<T>(input);
        let y = w.outer_iter().zip(v.iter()).fold(T::zero(), |acc, (row, &vh)| {
            let pre = row
                .iter()
                .zip(x.iter())
                .fold(T::zero(), |s, (&wi, &xi)| s + wi * xi);
            acc + vh * pre.tanh()
        });
        Ok(Array1::from(vec![y]).into_dyn())
    }
}

fn setup(hidden: usize, features: usize, n: usize) -> (ParamTree<f64>, DataBatch<f64>) {
    let w = Array2::from_shape_fn((hidden, features), |(i, j)| {
        0.1 * ((i * features + j) as f64).sin()
    });
    let v = Array1::from_shape_fn(hidden, |i| 0.2 * (i as f64).cos());
    let params = ParamTree::dict([
        ("w", ParamTree::Leaf(w.into_dyn())),
        ("v", ParamTree::Leaf(v.into_dyn())),
    ]);
    let x = Array2::from_shape_fn((n, features), |(i, j)| ((i + 2 * j) as f64 * 0.37).cos());
    let y = Array2::from_shape_fn((n, 1), |(i, _)| (i as f64 * 0.11).sin());
    let batch = DataBatch::new(x.into_dyn(), y.into_dyn()).expect("consistent batch");
    (params, batch)
}

/// Record-and-apply vs apply against a bound operator.
fn bench_bound_vs_unbound(c: &mut Criterion) {
    let mut group = c.benchmark_group("hvp_bound_vs_unbound");
    for hidden in [4, 16, 64] {
        let (params, batch) = setup(hidden, 8, 32);
        let direction = params.map(|p| p * 0.5 + 0.1);

        let op = build_hvp(Mlp, params.clone(), Some(LossKind::SquaredError.into()), false)
            .expect("compose");
        group.bench_with_input(BenchmarkId::new("unbound", hidden), &direction, |b, v| {
            b.iter(|| black_box(op.apply(black_box(v), &batch)))
        });

        let bound = build_hvp_with_data(
            Mlp,
            params,
            &batch,
            Some(LossKind::SquaredError.into()),
            false,
        )
        .expect("record");
        group.bench_with_input(BenchmarkId::new("bound", hidden), &direction, |b, v| {
            b.iter(|| black_box(bound.apply(black_box(v))))
        });
    }
    group.finish();
}

/// Many directions at once through one bound operator.
fn bench_apply_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("hvp_apply_many");
    let (params, batch) = setup(32, 8, 64);
    let bound = build_hvp_with_data(
        Mlp,
        params.clone(),
        &batch,
        Some(LossKind::SquaredError.into()),
        false,
    )
    .expect("record");
    for k in [1, 8, 32] {
        let directions: Vec<_> = (0..k)
            .map(|i| params.map(|p| p + 0.01 * i as f64))
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(k), &directions, |b, ds| {
            b.iter(|| black_box(bound.apply_many(black_box(ds))))
        });
    }
    group.finish();
}

/// Raw tape HVP on the Rosenbrock function.
fn bench_tape_hvp(c: &mut Criterion) {
    let mut group = c.benchmark_group("tape_hvp");
    for n in [2, 10, 100] {
        let x: Vec<f64> = (0..n).map(|i| 0.5 + 0.01 * i as f64).collect();
        let v: Vec<f64> = (0..n).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let (tape, _) = record(
            |x| {
                let mut sum = x[0] * 0.0;
                for i in 0..x.len() - 1 {
                    let t1 = 1.0 - x[i];
                    let t2 = x[i + 1] - x[i] * x[i];
                    sum = sum + t1 * t1 + 100.0 * t2 * t2;
                }
                sum
            },
            &x,
        );
        group.bench_with_input(BenchmarkId::from_parameter(n), &v, |b, v| {
            b.iter(|| black_box(tape.hvp(black_box(v))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_bound_vs_unbound, bench_apply_many, bench_tape_hvp);
criterion_main!(benches);
