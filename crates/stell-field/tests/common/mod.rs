// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Shared Test Helpers
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![allow(dead_code)]

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stell_field::coil::{Coil, CoilHandle};
use stell_geo::curve::CurveXYZFourier;

/// Each halving of the step must shrink the central-difference error by
/// at least this factor (ideal is 0.25).
pub const TAYLOR_RATIO: f64 = 0.6;

/// Uniform entries in [-1, 1).
pub fn random_vector(n: usize, seed: u64) -> Array1<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array1::from_shape_fn(n, |_| rng.gen_range(-1.0..1.0))
}

pub fn random_matrix(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-1.0..1.0))
}

/// Taylor test of `derivative` against central differences of
/// `f(eps) = J(x + eps·h)` for eps = 2^-6 … 2^-14.
///
/// Once the error drops to round-off it is accepted without a ratio check.
pub fn assert_taylor<F: FnMut(f64) -> f64>(mut f: F, derivative: f64) {
    let base = f(0.0).abs() + derivative.abs();
    let floor = 1e-10 * base.max(f64::MIN_POSITIVE);
    let mut previous: Option<f64> = None;
    for k in 6..=14 {
        let eps = 2f64.powi(-k);
        let fd = (f(eps) - f(-eps)) / (2.0 * eps);
        let err = (fd - derivative).abs();
        if let Some(prev) = previous {
            assert!(
                err < TAYLOR_RATIO * prev || err < floor,
                "Taylor test failed at eps=2^-{k}: err={err:e}, previous={prev:e}, derivative={derivative:e}"
            );
        }
        previous = Some(err);
    }
}

/// Planar coil around the z axis at height `z0` with a small shaping
/// harmonic, discretised on `nq` points.
pub fn shaped_coil(nq: usize, radius: f64, z0: f64, current: f64, phase: f64) -> CoilHandle {
    let mut curve = CurveXYZFourier::with_num_quadpoints(nq, 3);
    curve.set_coefficient(0, 2, radius);
    curve.set_coefficient(1, 1, radius);
    curve.set_coefficient(2, 0, z0);
    // Dof layout per dimension: [c0, s1, c1, s2, c2, s3, c3].
    curve.set_coefficient(0, 5, 0.05 * phase.cos());
    curve.set_coefficient(1, 6, 0.05 * phase.sin());
    curve.set_coefficient(2, 4, 0.08);
    Coil::new(format!("shaped_{phase:.2}"), Box::new(curve), current).into_handle()
}

/// Two shaped coils stacked above and below the midplane.
pub fn coil_pair(nq: usize) -> Vec<CoilHandle> {
    vec![
        shaped_coil(nq, 1.0, 0.3, 1.2e5, 0.3),
        shaped_coil(nq, 1.1, -0.3, -0.8e5, 1.1),
    ]
}

/// Points inside the coils, well away from the filaments.
pub fn interior_points(n: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((n, 3), |(_, k)| {
        if k == 2 {
            rng.gen_range(-0.1..0.1)
        } else {
            rng.gen_range(-0.4..0.4)
        }
    })
}
