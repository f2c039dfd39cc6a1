// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Surface Basis Matrices
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Precomputed linear maps from surface dofs to points and tangents.
//!
//! Row `(i·ntheta + j)·3 + k` holds component `k` at quadrature point
//! `(φ_i, θ_j)`; column `c` is the contribution of dof `c`.

use ndarray::{Array1, Array2, Array3};
use stell_types::constants::TWO_PI;

/// How a scalar basis function enters the Cartesian position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Component {
    /// Cylindrical radius (or the rotating-frame x̂ direction).
    Radial,
    /// Rotating-frame ŷ direction.
    Binormal,
    Vertical,
}

#[derive(Debug, Clone)]
pub(crate) struct LinearBasis {
    pub(crate) nphi: usize,
    pub(crate) ntheta: usize,
    pub(crate) gamma: Array2<f64>,
    pub(crate) dash1: Array2<f64>,
    pub(crate) dash2: Array2<f64>,
}

impl LinearBasis {
    pub(crate) fn zeros(nphi: usize, ntheta: usize, ndofs: usize) -> Self {
        let rows = nphi * ntheta * 3;
        LinearBasis {
            nphi,
            ntheta,
            gamma: Array2::zeros((rows, ndofs)),
            dash1: Array2::zeros((rows, ndofs)),
            dash2: Array2::zeros((rows, ndofs)),
        }
    }

    /// Fill column `col` from `f(φ, θ) = (b, ∂b/∂φ, ∂b/∂θ)` in angle
    /// variables. Tangents are stored with respect to the quadrature
    /// parameters, hence the 2π factors.
    pub(crate) fn set_column<F>(
        &mut self,
        col: usize,
        component: Component,
        quadpoints_phi: &[f64],
        quadpoints_theta: &[f64],
        f: F,
    ) where
        F: Fn(f64, f64) -> (f64, f64, f64),
    {
        for (i, &qphi) in quadpoints_phi.iter().enumerate() {
            let phi = TWO_PI * qphi;
            let (sphi, cphi) = phi.sin_cos();
            for (j, &qtheta) in quadpoints_theta.iter().enumerate() {
                let (b, b_phi, b_theta) = f(phi, TWO_PI * qtheta);
                let (bp, bt) = (TWO_PI * b_phi, TWO_PI * b_theta);
                let row = (i * self.ntheta + j) * 3;
                match component {
                    Component::Radial => {
                        self.gamma[[row, col]] = b * cphi;
                        self.gamma[[row + 1, col]] = b * sphi;
                        self.dash1[[row, col]] = bp * cphi - TWO_PI * b * sphi;
                        self.dash1[[row + 1, col]] = bp * sphi + TWO_PI * b * cphi;
                        self.dash2[[row, col]] = bt * cphi;
                        self.dash2[[row + 1, col]] = bt * sphi;
                    }
                    Component::Binormal => {
                        self.gamma[[row, col]] = -b * sphi;
                        self.gamma[[row + 1, col]] = b * cphi;
                        self.dash1[[row, col]] = -bp * sphi - TWO_PI * b * cphi;
                        self.dash1[[row + 1, col]] = bp * cphi - TWO_PI * b * sphi;
                        self.dash2[[row, col]] = -bt * sphi;
                        self.dash2[[row + 1, col]] = bt * cphi;
                    }
                    Component::Vertical => {
                        self.gamma[[row + 2, col]] = b;
                        self.dash1[[row + 2, col]] = bp;
                        self.dash2[[row + 2, col]] = bt;
                    }
                }
            }
        }
    }

    /// `matrix · dofs` reshaped to (nphi, ntheta, 3).
    pub(crate) fn evaluate(&self, matrix: &Array2<f64>, dofs: &Array1<f64>) -> Array3<f64> {
        let flat = matrix.dot(dofs);
        let ntheta = self.ntheta;
        Array3::from_shape_fn((self.nphi, ntheta, 3), |(i, j, k)| flat[(i * ntheta + j) * 3 + k])
    }
}
