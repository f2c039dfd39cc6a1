// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Property-Based Tests (proptest) for stell-geo
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for stell-geo using proptest.
//!
//! Covers: Fourier curve linearity, torus geometry on both surface
//! representations, basis-matrix linearity, DOF collection.

use ndarray::Array1;
use proptest::prelude::*;
use std::cell::RefCell;
use std::f64::consts::PI;
use std::rc::Rc;
use stell_geo::curve::{Curve, CurveXYZFourier};
use stell_geo::dofs::{collect_dofs, OptimizableRef};
use stell_geo::surface::{quadpoints, Surface, SurfaceRZFourier, SurfaceXYZTensorFourier};

// ── Curve Properties ─────────────────────────────────────────────────

proptest! {
    /// A constant-only curve sits at one point and has zero tangent.
    #[test]
    fn constant_curve_is_a_point(order in 0usize..5, cx in -2.0f64..2.0, cz in -2.0f64..2.0) {
        let mut curve = CurveXYZFourier::with_num_quadpoints(4 * order + 4, order);
        curve.set_coefficient(0, 0, cx);
        curve.set_coefficient(2, 0, cz);
        let gamma = curve.gamma();
        let dash = curve.gammadash();
        for q in 0..gamma.nrows() {
            prop_assert!((gamma[[q, 0]] - cx).abs() < 1e-15);
            prop_assert!((gamma[[q, 2]] - cz).abs() < 1e-15);
            prop_assert!(dash.row(q).iter().all(|v| v.abs() < 1e-15));
        }
    }

    /// The tangent integrates to zero over a closed curve.
    #[test]
    fn tangent_has_zero_mean(order in 1usize..5, seed in 0u64..1000) {
        let mut curve = CurveXYZFourier::with_num_quadpoints(6 * order + 2, order);
        let n = Curve::num_dofs(&curve);
        let dofs: Array1<f64> = (0..n).map(|i| ((i as u64 * 31 + seed) % 17) as f64 * 0.1 - 0.8).collect();
        Curve::set_dofs(&mut curve, &dofs).expect("dofs");
        let mean = curve.gammadash().mean_axis(ndarray::Axis(0)).expect("non-empty");
        prop_assert!(mean.iter().all(|v| v.abs() < 1e-11), "mean tangent {}", mean);
    }
}

// ── Surface Properties ───────────────────────────────────────────────

proptest! {
    /// Circular tori have area 4π²Rr and volume 2π²Rr² on both
    /// representations.
    #[test]
    fn torus_area_volume(major in 1.0f64..3.0, ratio in 0.05f64..0.6, nfp in 1usize..5) {
        let minor = major * ratio;
        let mut rz = SurfaceRZFourier::new(1, 1, nfp, true, quadpoints(12, 1.0 / nfp as f64), quadpoints(16, 1.0));
        rz.set_torus(major, minor);
        let mut xyz = SurfaceXYZTensorFourier::new(1, 1, nfp, true, quadpoints(12, 1.0 / nfp as f64), quadpoints(16, 1.0));
        xyz.set_torus(major, minor);
        let area = 4.0 * PI * PI * major * minor;
        let volume = 2.0 * PI * PI * major * minor * minor;
        for s in [&rz as &dyn Surface, &xyz as &dyn Surface] {
            prop_assert!((s.area() - area).abs() < 1e-10 * area);
            prop_assert!((s.volume() - volume).abs() < 1e-10 * volume);
        }
    }

    /// gamma is exactly the basis matrix applied to the dofs.
    #[test]
    fn gamma_is_linear_in_dofs(mpol in 1usize..3, ntor in 0usize..3, stellsym in any::<bool>()) {
        let mut s = SurfaceXYZTensorFourier::new(mpol, ntor, 2, stellsym, quadpoints(5, 0.5), quadpoints(6, 1.0));
        let n = Surface::num_dofs(&s);
        let dofs: Array1<f64> = (0..n).map(|i| (i as f64 * 0.37).sin()).collect();
        Surface::set_dofs(&mut s, &dofs).expect("dofs");
        let flat = s.dgamma_by_dcoeff().dot(&dofs);
        let gamma = s.gamma();
        for (a, b) in gamma.iter().zip(flat.iter()) {
            prop_assert!((a - b).abs() < 1e-14);
        }
    }
}

// ── DOF Collection Properties ────────────────────────────────────────

proptest! {
    /// Collecting independent curves concatenates their dofs in order.
    #[test]
    fn collect_concatenates(orders in proptest::collection::vec(0usize..4, 1..5)) {
        let curves: Vec<Rc<RefCell<CurveXYZFourier>>> = orders
            .iter()
            .map(|&o| Rc::new(RefCell::new(CurveXYZFourier::with_num_quadpoints(8, o))))
            .collect();
        let roots: Vec<OptimizableRef> = curves.iter().map(|c| c.clone() as OptimizableRef).collect();
        let collected = collect_dofs(&roots).expect("acyclic");
        let expected: usize = orders.iter().map(|o| 3 * (2 * o + 1)).sum();
        prop_assert_eq!(collected.len(), expected);

        // Duplicated roots are collected once.
        let doubled: Vec<OptimizableRef> = roots.iter().chain(roots.iter()).cloned().collect();
        prop_assert_eq!(collect_dofs(&doubled).expect("acyclic").len(), expected);
    }
}
