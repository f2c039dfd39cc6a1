// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Coil Curves
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Closed space curves sampled on a fixed quadrature grid in t ∈ [0, 1).

use crate::dofs::Optimizable;
use ndarray::{Array1, Array2};
use std::f64::consts::PI;
use stell_types::config::CoilConfig;
use stell_types::error::{StellError, StellResult};

/// A closed curve `γ(t)` whose shape is set by a dof vector.
///
/// `gammadash` is the derivative with respect to `t`, not arclength.
pub trait Curve: std::fmt::Debug {
    fn quadpoints(&self) -> &[f64];
    fn num_dofs(&self) -> usize;
    fn get_dofs(&self) -> Array1<f64>;
    fn set_dofs(&mut self, dofs: &Array1<f64>) -> StellResult<()>;

    /// Points on the curve, shape (nq, 3).
    fn gamma(&self) -> Array2<f64>;
    /// Tangent `dγ/dt`, shape (nq, 3).
    fn gammadash(&self) -> Array2<f64>;

    /// `vᵀ · ∂γ/∂dofs` for `v` of shape (nq, 3).
    fn dgamma_by_dcoeff_vjp(&self, v: &Array2<f64>) -> Array1<f64>;
    /// `vᵀ · ∂γ'/∂dofs` for `v` of shape (nq, 3).
    fn dgammadash_by_dcoeff_vjp(&self, v: &Array2<f64>) -> Array1<f64>;
}

/// Evenly spaced quadrature points `i/n` for `i = 0..n`.
pub fn uniform_quadpoints(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64 / n as f64).collect()
}

/// Cartesian Fourier curve.
///
/// Each component carries `[c0, s1, c1, s2, c2, …, s_order, c_order]` with
/// `x_i(t) = c0 + Σ_j s_j sin(2πjt) + c_j cos(2πjt)`; the dof vector is the
/// x block followed by the y and z blocks.
#[derive(Debug, Clone)]
pub struct CurveXYZFourier {
    quadpoints: Vec<f64>,
    order: usize,
    dofs: Array1<f64>,
}

impl CurveXYZFourier {
    pub fn new(quadpoints: Vec<f64>, order: usize) -> Self {
        let n = 3 * (2 * order + 1);
        CurveXYZFourier {
            quadpoints,
            order,
            dofs: Array1::zeros(n),
        }
    }

    pub fn with_num_quadpoints(num_quadpoints: usize, order: usize) -> Self {
        Self::new(uniform_quadpoints(num_quadpoints), order)
    }

    /// Curve described by a coil config entry.
    pub fn from_config(config: &CoilConfig) -> StellResult<Self> {
        config.validate()?;
        let mut curve = Self::with_num_quadpoints(config.num_quadpoints, config.order);
        let dofs: Array1<f64> = config.coefficients.iter().flatten().copied().collect();
        Curve::set_dofs(&mut curve, &dofs)?;
        Ok(curve)
    }

    pub fn order(&self) -> usize {
        self.order
    }

    fn block_len(&self) -> usize {
        2 * self.order + 1
    }

    /// Coefficient `k` of component `dim` in the `[c0, s1, c1, …]` layout.
    pub fn coefficient(&self, dim: usize, k: usize) -> f64 {
        self.dofs[dim * self.block_len() + k]
    }

    pub fn set_coefficient(&mut self, dim: usize, k: usize, value: f64) {
        let idx = dim * self.block_len() + k;
        self.dofs[idx] = value;
    }

    /// Basis values and their t-derivatives at one quadrature point.
    fn basis(&self, t: f64) -> (Vec<f64>, Vec<f64>) {
        let len = self.block_len();
        let mut value = vec![0.0; len];
        let mut deriv = vec![0.0; len];
        value[0] = 1.0;
        for j in 1..=self.order {
            let w = 2.0 * PI * j as f64;
            let (s, c) = (w * t).sin_cos();
            value[2 * j - 1] = s;
            value[2 * j] = c;
            deriv[2 * j - 1] = w * c;
            deriv[2 * j] = -w * s;
        }
        (value, deriv)
    }

    fn evaluate(&self, derivative: bool) -> Array2<f64> {
        let len = self.block_len();
        let mut out = Array2::zeros((self.quadpoints.len(), 3));
        for (q, &t) in self.quadpoints.iter().enumerate() {
            let (value, deriv) = self.basis(t);
            let phi = if derivative { &deriv } else { &value };
            for dim in 0..3 {
                let block = self.dofs.slice(ndarray::s![dim * len..(dim + 1) * len]);
                out[[q, dim]] = block.iter().zip(phi.iter()).map(|(c, b)| c * b).sum();
            }
        }
        out
    }

    fn vjp(&self, v: &Array2<f64>, derivative: bool) -> Array1<f64> {
        let len = self.block_len();
        let mut out = Array1::zeros(self.dofs.len());
        for (q, &t) in self.quadpoints.iter().enumerate() {
            let (value, deriv) = self.basis(t);
            let phi = if derivative { &deriv } else { &value };
            for dim in 0..3 {
                let w = v[[q, dim]];
                for k in 0..len {
                    out[dim * len + k] += w * phi[k];
                }
            }
        }
        out
    }
}

impl Curve for CurveXYZFourier {
    fn quadpoints(&self) -> &[f64] {
        &self.quadpoints
    }

    fn num_dofs(&self) -> usize {
        self.dofs.len()
    }

    fn get_dofs(&self) -> Array1<f64> {
        self.dofs.clone()
    }

    fn set_dofs(&mut self, dofs: &Array1<f64>) -> StellResult<()> {
        if dofs.len() != self.dofs.len() {
            return Err(StellError::dimension("CurveXYZFourier dofs", self.dofs.len(), dofs.len()));
        }
        self.dofs.assign(dofs);
        Ok(())
    }

    fn gamma(&self) -> Array2<f64> {
        self.evaluate(false)
    }

    fn gammadash(&self) -> Array2<f64> {
        self.evaluate(true)
    }

    fn dgamma_by_dcoeff_vjp(&self, v: &Array2<f64>) -> Array1<f64> {
        self.vjp(v, false)
    }

    fn dgammadash_by_dcoeff_vjp(&self, v: &Array2<f64>) -> Array1<f64> {
        self.vjp(v, true)
    }
}

impl Optimizable for CurveXYZFourier {
    fn name(&self) -> String {
        format!("CurveXYZFourier(order={})", self.order)
    }

    fn num_dofs(&self) -> usize {
        Curve::num_dofs(self)
    }

    fn get_dofs(&self) -> Array1<f64> {
        Curve::get_dofs(self)
    }

    fn set_dofs(&mut self, dofs: &Array1<f64>) -> StellResult<()> {
        Curve::set_dofs(self, dofs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn ring(n: usize, radius: f64) -> CurveXYZFourier {
        let mut curve = CurveXYZFourier::with_num_quadpoints(n, 1);
        curve.set_coefficient(0, 2, radius);
        curve.set_coefficient(1, 1, radius);
        curve
    }

    #[test]
    fn test_ring_points_and_tangent() {
        let curve = ring(16, 2.0);
        let gamma = curve.gamma();
        let dash = curve.gammadash();
        for q in 0..16 {
            let r = (gamma[[q, 0]].powi(2) + gamma[[q, 1]].powi(2)).sqrt();
            assert!((r - 2.0).abs() < 1e-14);
            // |γ'| = 2π·radius and tangent ⟂ radius vector
            let speed = (dash[[q, 0]].powi(2) + dash[[q, 1]].powi(2)).sqrt();
            assert!((speed - 4.0 * PI).abs() < 1e-12);
            let dot = gamma[[q, 0]] * dash[[q, 0]] + gamma[[q, 1]] * dash[[q, 1]];
            assert!(dot.abs() < 1e-12);
        }
    }

    #[test]
    fn test_vjp_is_adjoint_of_linear_map() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut curve = CurveXYZFourier::with_num_quadpoints(20, 3);
        let n = Curve::num_dofs(&curve);
        let d0: Array1<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let h: Array1<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let v = Array2::from_shape_fn((20, 3), |_| rng.gen_range(-1.0..1.0));

        Curve::set_dofs(&mut curve, &d0).expect("dofs");
        let g0 = curve.gamma();
        let gd0 = curve.gammadash();
        Curve::set_dofs(&mut curve, &(&d0 + &h)).expect("dofs");
        let dg = &curve.gamma() - &g0;
        let dgd = &curve.gammadash() - &gd0;

        let lhs = (&v * &dg).sum();
        let rhs = curve.dgamma_by_dcoeff_vjp(&v).dot(&h);
        assert!((lhs - rhs).abs() < 1e-11 * lhs.abs().max(1.0));
        let lhs = (&v * &dgd).sum();
        let rhs = curve.dgammadash_by_dcoeff_vjp(&v).dot(&h);
        assert!((lhs - rhs).abs() < 1e-11 * lhs.abs().max(1.0));
    }

    #[test]
    fn test_rejects_wrong_dof_count() {
        let mut curve = CurveXYZFourier::with_num_quadpoints(8, 2);
        assert!(Curve::set_dofs(&mut curve, &Array1::zeros(4)).is_err());
    }

    #[test]
    fn test_from_config() {
        let config = CoilConfig {
            name: "ring".to_string(),
            order: 1,
            num_quadpoints: 32,
            coefficients: vec![vec![0.0, 0.0, 1.0], vec![0.0, 1.0, 0.0], vec![0.0; 3]],
            current: 1.0,
        };
        let curve = CurveXYZFourier::from_config(&config).expect("valid");
        assert_eq!(curve.quadpoints().len(), 32);
        assert_eq!(curve.coefficient(0, 2), 1.0);
        assert_eq!(curve.coefficient(1, 1), 1.0);
    }
}
