use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use std::f64::consts::PI;
use std::hint::black_box;
use stell_field::analytic::CircularCoil;
use stell_field::biot_savart::BiotSavart;
use stell_field::coil::{Coil, CoilHandle};
use stell_field::field::{CachedField, MagneticField};
use stell_geo::curve::CurveXYZFourier;

fn modular_coils(ncoils: usize, nq: usize) -> Vec<CoilHandle> {
    (0..ncoils)
        .map(|c| {
            let phi = 2.0 * PI * c as f64 / ncoils as f64;
            let (s, co) = phi.sin_cos();
            let mut curve = CurveXYZFourier::with_num_quadpoints(nq, 2);
            curve.set_coefficient(0, 0, co);
            curve.set_coefficient(1, 0, s);
            curve.set_coefficient(0, 2, 0.5 * co);
            curve.set_coefficient(1, 2, 0.5 * s);
            curve.set_coefficient(2, 1, 0.5);
            Coil::new(format!("tf{c}"), Box::new(curve), 1e5).into_handle()
        })
        .collect()
}

fn surface_points(nphi: usize, ntheta: usize) -> Array2<f64> {
    Array2::from_shape_fn((nphi * ntheta, 3), |(p, k)| {
        let phi = 2.0 * PI * (p / ntheta) as f64 / nphi as f64;
        let theta = 2.0 * PI * (p % ntheta) as f64 / ntheta as f64;
        let r = 1.0 + 0.2 * theta.cos();
        match k {
            0 => r * phi.cos(),
            1 => r * phi.sin(),
            _ => 0.2 * theta.sin(),
        }
    })
}

fn bench_biot_savart(c: &mut Criterion) {
    let pts = surface_points(16, 16);
    let mut group = c.benchmark_group("biot_savart");
    group.bench_function("b_8coils_64q_256pts", |b| {
        b.iter(|| {
            let mut bs = BiotSavart::new(modular_coils(8, 64));
            bs.set_points(black_box(&pts)).expect("points");
            bs.b().expect("b")
        })
    });
    group.bench_function("d2b_8coils_64q_256pts", |b| {
        b.iter(|| {
            let mut bs = BiotSavart::new(modular_coils(8, 64));
            bs.set_points(black_box(&pts)).expect("points");
            bs.d2b_by_dxdx().expect("d2b")
        })
    });
    group.bench_function("b_vjp_8coils_64q_256pts", |b| {
        let mut bs = BiotSavart::new(modular_coils(8, 64));
        bs.set_points(&pts).expect("points");
        let v = Array2::from_elem((pts.nrows(), 3), 1.0);
        b.iter(|| bs.b_vjp(black_box(&v)).expect("vjp"))
    });
    group.finish();
}

fn bench_circular(c: &mut Criterion) {
    let pts = surface_points(32, 32);
    c.bench_function("circular_coil_db_1024pts", |b| {
        b.iter(|| {
            let coil = CircularCoil::new(1.5, [0.0; 3], 1e5, (0.2, 0.3)).expect("coil");
            let mut field = CachedField::new(coil);
            field.set_points(black_box(&pts)).expect("points");
            field.db_by_dx().expect("db")
        })
    });
}

criterion_group!(benches, bench_biot_savart, bench_circular);
criterion_main!(benches);
