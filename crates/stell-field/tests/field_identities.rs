// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Field Identity and Sensitivity Tests
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Vector-calculus identities, quadrature convergence, coil sensitivities
//! and analytic-versus-discretised agreement.

mod common;

use common::{assert_taylor, coil_pair, interior_points, random_matrix, random_vector, shaped_coil};
use ndarray::{Array1, Array2, Array3};
use stell_field::analytic::{CircularCoil, ToroidalField};
use stell_field::biot_savart::BiotSavart;
use stell_field::coil::{Coil, CoilHandle};
use stell_field::field::{CachedField, MagneticField};
use stell_geo::curve::CurveXYZFourier;
use stell_geo::dofs::{collect_dofs, CollectedDofs, OptimizableRef};

fn max_abs<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    values.fold(0.0_f64, |m, v| m.max(v.abs()))
}

fn evaluator(nq: usize, npts: usize) -> BiotSavart {
    let mut bs = BiotSavart::new(coil_pair(nq));
    bs.set_points(&interior_points(npts, 7)).expect("points");
    bs
}

fn collected(coils: &[CoilHandle]) -> CollectedDofs {
    let roots: Vec<OptimizableRef> = coils.iter().map(|c| c.clone() as OptimizableRef).collect();
    collect_dofs(&roots).expect("acyclic")
}

/// Perturbation direction scaled to each dof's magnitude.
fn direction(x0: &Array1<f64>, seed: u64) -> Array1<f64> {
    let r = random_vector(x0.len(), seed);
    Array1::from_shape_fn(x0.len(), |i| 0.05 * r[i] * x0[i].abs().max(1.0))
}

// ── Identities ───────────────────────────────────────────────────────

#[test]
fn curl_of_vector_potential_is_b() {
    let mut bs = evaluator(80, 12);
    let b = bs.b().expect("b");
    let da = bs.da_by_dx().expect("da");
    let scale = max_abs(b.iter());
    for p in 0..b.nrows() {
        let curl = [
            da[[p, 1, 2]] - da[[p, 2, 1]],
            da[[p, 2, 0]] - da[[p, 0, 2]],
            da[[p, 0, 1]] - da[[p, 1, 0]],
        ];
        for i in 0..3 {
            assert!((curl[i] - b[[p, i]]).abs() < 1e-12 * scale, "point {p} component {i}");
        }
    }
}

#[test]
fn gradient_is_traceless_and_symmetric() {
    let mut bs = evaluator(200, 10);
    let db = bs.db_by_dx().expect("db");
    let scale = max_abs(db.iter());
    for p in 0..db.dim().0 {
        let trace = db[[p, 0, 0]] + db[[p, 1, 1]] + db[[p, 2, 2]];
        assert!(trace.abs() < 1e-12 * scale);
        for i in 0..3 {
            for j in 0..3 {
                assert!((db[[p, i, j]] - db[[p, j, i]]).abs() < 1e-10 * scale);
            }
        }
    }
}

#[test]
fn hessian_is_symmetric_in_derivative_axes() {
    let mut bs = evaluator(60, 6);
    let d2b = bs.d2b_by_dxdx().expect("d2b");
    let scale = max_abs(d2b.iter());
    for p in 0..6 {
        for k in 0..3 {
            for j in 0..3 {
                for i in 0..3 {
                    assert!((d2b[[p, k, j, i]] - d2b[[p, j, k, i]]).abs() < 1e-12 * scale);
                }
            }
        }
    }
}

#[test]
fn spatial_derivatives_match_finite_differences() {
    let mut bs = evaluator(60, 4);
    let x0 = bs.points().clone();
    let db = bs.db_by_dx().expect("db");
    let d2b = bs.d2b_by_dxdx().expect("d2b");
    let w = random_matrix(4, 3, 11);
    let wgrad = Array3::from_shape_fn((4, 3, 3), |(p, j, i)| w[[p, i]] * (j as f64 + 1.0));
    for j in 0..3 {
        let h = Array2::from_shape_fn((4, 3), |(_, k)| if k == j { 1.0 } else { 0.0 });
        // Σ w·∂_j B
        let first: f64 = (0..4).flat_map(|p| (0..3).map(move |i| (p, i))).map(|(p, i)| w[[p, i]] * db[[p, j, i]]).sum();
        // Σ W:∂_j dB
        let second: f64 = (0..4)
            .flat_map(|p| (0..3).flat_map(move |k| (0..3).map(move |i| (p, k, i))))
            .map(|(p, k, i)| wgrad[[p, k, i]] * d2b[[p, j, k, i]])
            .sum();
        let (mut f1, mut f2) = (Vec::new(), Vec::new());
        for sign in [1.0, -1.0] {
            let eps = 1e-5 * sign;
            bs.set_points(&(&x0 + &(&h * eps))).expect("points");
            f1.push((&bs.b().expect("b") * &w).sum());
            f2.push((&bs.db_by_dx().expect("db") * &wgrad).sum());
        }
        let fd1 = (f1[0] - f1[1]) / 2e-5;
        let fd2 = (f2[0] - f2[1]) / 2e-5;
        assert!((fd1 - first).abs() < 1e-6 * first.abs().max(1e-3), "dB column {j}");
        assert!((fd2 - second).abs() < 1e-6 * second.abs().max(1e-2), "d2B column {j}");
    }
}

// ── Quadrature ───────────────────────────────────────────────────────

/// Circle of radius 0.5 in the y–z plane centred on (0, 1, 0).
fn tilted_circle(nq: usize) -> CoilHandle {
    let mut curve = CurveXYZFourier::with_num_quadpoints(nq, 3);
    curve.set_coefficient(1, 0, 1.0);
    curve.set_coefficient(1, 1, 0.5);
    curve.set_coefficient(2, 2, 0.5);
    Coil::new("tilted", Box::new(curve), 1e4).into_handle()
}

fn norm_of_difference<D: ndarray::Dimension>(a: &ndarray::Array<f64, D>, b: &ndarray::Array<f64, D>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

#[test]
fn quadrature_converges_exponentially() {
    let pts = Array2::from_shape_fn((10, 3), |(_, k)| [-1.41513202e-03, 8.99999382e-01, -3.14473221e-04][k]);
    let evaluator_for = |nq: usize| {
        let mut bs = BiotSavart::new(vec![tilted_circle(nq)]);
        bs.set_points(&pts).expect("points");
        bs
    };
    let (mut exact, mut coarse, mut fine) = (evaluator_for(1000), evaluator_for(10), evaluator_for(20));

    let (b_exact, b_coarse, b_fine) = (exact.b().expect("b"), coarse.b().expect("b"), fine.b().expect("b"));
    assert!(norm_of_difference(&b_exact, &b_fine) < 1e-4 * norm_of_difference(&b_coarse, &b_fine));

    let (g_exact, g_coarse, g_fine) = (
        exact.db_by_dx().expect("db"),
        coarse.db_by_dx().expect("db"),
        fine.db_by_dx().expect("db"),
    );
    assert!(norm_of_difference(&g_exact, &g_fine) < 1e-4 * norm_of_difference(&g_coarse, &g_fine));

    let (h_exact, h_coarse, h_fine) = (
        exact.d2b_by_dxdx().expect("d2b"),
        coarse.d2b_by_dxdx().expect("d2b"),
        fine.d2b_by_dxdx().expect("d2b"),
    );
    assert!(norm_of_difference(&h_exact, &h_fine) < 1e-4 * norm_of_difference(&h_coarse, &h_fine));
}

#[test]
fn shaped_coil_field_converges() {
    let pts = interior_points(5, 3);
    let field_at = |nq: usize| {
        let mut bs = BiotSavart::new(vec![shaped_coil(nq, 1.0, 0.2, 1e5, 0.4)]);
        bs.set_points(&pts).expect("points");
        bs.b().expect("b")
    };
    let reference = field_at(1000);
    let err = |b: Array2<f64>| max_abs((&b - &reference).iter());
    let (e10, e20) = (err(field_at(10)), err(field_at(20)));
    assert!(e20 < 0.5 * e10, "10 points: {e10:e}, 20 points: {e20:e}");
    assert!(err(field_at(200)) < 1e-10 * max_abs(reference.iter()));
}

// ── Coil Sensitivities ───────────────────────────────────────────────

#[test]
fn field_is_linear_in_currents() {
    let mut bs = evaluator(40, 8);
    let b = bs.b().expect("b");
    let db = bs.db_by_dx().expect("db");
    let currents = bs.coil_currents().expect("currents");
    let unit_b = bs.db_by_dcoilcurrents().expect("unit b");
    let unit_db = bs.d2b_by_dxdcoilcurrents().expect("unit db");
    let unit_d2b = bs.d3b_by_dxdxdcoilcurrents().expect("unit d2b");
    assert_eq!(unit_d2b.len(), 2);
    let mut sum_b = Array2::zeros(b.raw_dim());
    let mut sum_db = Array3::zeros(db.raw_dim());
    for c in 0..2 {
        sum_b.scaled_add(currents[c], &unit_b[c]);
        sum_db.scaled_add(currents[c], &unit_db[c]);
    }
    assert!(max_abs((&sum_b - &b).iter()) < 1e-14 * max_abs(b.iter()));
    assert!(max_abs((&sum_db - &db).iter()) < 1e-14 * max_abs(db.iter()));
}

#[test]
fn b_vjp_taylor() {
    let mut bs = evaluator(30, 6);
    let coils = bs.coils().to_vec();
    let dofs = collected(&coils);
    let x0 = dofs.values.clone();
    let h = direction(&x0, 5);
    let v = random_matrix(6, 3, 9);
    let grad = bs.b_vjp(&v).expect("vjp").gather(&dofs, &coils);
    let derivative = grad.dot(&h);
    assert_taylor(
        |eps| {
            dofs.apply(&(&x0 + &(&h * eps))).expect("apply");
            (&bs.b().expect("b") * &v).sum()
        },
        derivative,
    );
    dofs.apply(&x0).expect("restore");
}

#[test]
fn db_vjp_taylor() {
    let mut bs = evaluator(30, 6);
    let coils = bs.coils().to_vec();
    let dofs = collected(&coils);
    let x0 = dofs.values.clone();
    let h = direction(&x0, 15);
    let v = random_matrix(6, 3, 19);
    let w = Array3::from_shape_vec((6, 3, 3), random_vector(54, 23).to_vec()).expect("shape");
    let (from_b, from_db) = bs.b_and_db_vjp(&v, &w).expect("vjp");
    let derivative = (from_b + from_db).gather(&dofs, &coils).dot(&h);
    assert_taylor(
        |eps| {
            dofs.apply(&(&x0 + &(&h * eps))).expect("apply");
            (&bs.b().expect("b") * &v).sum() + (&bs.db_by_dx().expect("db") * &w).sum()
        },
        derivative,
    );
}

#[test]
fn a_vjp_taylor() {
    let mut bs = evaluator(30, 6);
    let coils = bs.coils().to_vec();
    let dofs = collected(&coils);
    let x0 = dofs.values.clone();
    let h = direction(&x0, 25);
    let v = random_matrix(6, 3, 29);
    let derivative = bs.a_vjp(&v).expect("vjp").flatten().dot(&h);
    assert_taylor(
        |eps| {
            dofs.apply(&(&x0 + &(&h * eps))).expect("apply");
            (&bs.a().expect("a") * &v).sum()
        },
        derivative,
    );
}

// ── Analytic Fields ──────────────────────────────────────────────────

fn filament_of(radius: f64, center: [f64; 3], current: f64, normal: (f64, f64), nq: usize) -> CoilHandle {
    let (theta, phi) = normal;
    let (st, ct) = theta.sin_cos();
    let (sp, cp) = phi.sin_cos();
    let e1 = [ct * cp, ct * sp, -st];
    let e2 = [-sp, cp, 0.0];
    let mut curve = CurveXYZFourier::with_num_quadpoints(nq, 1);
    for d in 0..3 {
        curve.set_coefficient(d, 0, center[d]);
        curve.set_coefficient(d, 1, radius * e2[d]);
        curve.set_coefficient(d, 2, radius * e1[d]);
    }
    Coil::new("filament", Box::new(curve), current).into_handle()
}

#[test]
fn circular_coil_matches_biot_savart() {
    let (radius, center, current, normal) = (1.2, [0.2, -0.1, 0.3], 3e4, (0.6, 0.9));
    let pts = interior_points(8, 41);
    let mut analytic = CachedField::new(CircularCoil::new(radius, center, current, normal).expect("coil"));
    let mut discrete = BiotSavart::new(vec![filament_of(radius, center, current, normal, 400)]);
    analytic.set_points(&pts).expect("points");
    discrete.set_points(&pts).expect("points");

    let (ba, bd) = (analytic.b().expect("b"), discrete.b().expect("b"));
    assert!(max_abs((&ba - &bd).iter()) < 1e-9 * max_abs(bd.iter()));
    let (ga, gd) = (analytic.db_by_dx().expect("db"), discrete.db_by_dx().expect("db"));
    assert!(max_abs((&ga - &gd).iter()) < 1e-8 * max_abs(gd.iter()));
    assert!((analytic.g0() - discrete.g0()).abs() < 1e-15);
}

#[test]
fn toroidal_field_vector_potential_curl() {
    let mut f = CachedField::new(ToroidalField::new(1.3, 0.8).expect("field"));
    let mut pts = interior_points(6, 53);
    pts.column_mut(0).mapv_inplace(|x| x + 1.0);
    f.set_points(&pts).expect("points");
    let b = f.b().expect("b");
    let da = f.da_by_dx().expect("da");
    let d2a = f.d2a_by_dxdx().expect("d2a");
    let d2b = f.d2b_by_dxdx().expect("d2b");
    for p in 0..6 {
        let curl = [
            da[[p, 1, 2]] - da[[p, 2, 1]],
            da[[p, 2, 0]] - da[[p, 0, 2]],
            da[[p, 0, 1]] - da[[p, 1, 0]],
        ];
        for i in 0..3 {
            assert!((curl[i] - b[[p, i]]).abs() < 1e-14);
        }
        // ∂_k(curl A) = ∂_k B
        for k in 0..3 {
            let dcurl = [
                d2a[[p, k, 1, 2]] - d2a[[p, k, 2, 1]],
                d2a[[p, k, 2, 0]] - d2a[[p, k, 0, 2]],
                d2a[[p, k, 0, 1]] - d2a[[p, k, 1, 0]],
            ];
            let db = f.db_by_dx().expect("db");
            for i in 0..3 {
                assert!((dcurl[i] - db[[p, k, i]]).abs() < 1e-13);
                assert!((d2b[[p, k, 0, i]] - d2b[[p, 0, k, i]]).abs() < 1e-13);
            }
        }
    }
}
