// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Toroidal Surfaces
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Toroidal surfaces sampled on a tensor quadrature grid.
//!
//! Both representations are linear in their dofs: points and tangents are
//! fixed matrices applied to the dof vector, so second derivatives with
//! respect to the dofs vanish.

mod basis;
pub mod fit;
pub mod rz_fourier;
pub mod xyz_tensor_fourier;

pub use rz_fourier::{RzCoefficient, SurfaceRZFourier};
pub use xyz_tensor_fourier::SurfaceXYZTensorFourier;

use crate::vector::{cross, dot, norm, vec3};
use ndarray::{Array1, Array2, Array3};
use stell_types::error::StellResult;

/// A toroidal surface `x(φ, θ)` with φ, θ quadrature parameters in [0, 1).
///
/// Derivative matrices have shape `(nphi·ntheta·3, ndofs)` with row
/// `(i·ntheta + j)·3 + k` for component `k` at `(φ_i, θ_j)`.
pub trait Surface: std::fmt::Debug {
    fn quadpoints_phi(&self) -> &[f64];
    fn quadpoints_theta(&self) -> &[f64];
    fn nfp(&self) -> usize;
    fn stellsym(&self) -> bool;

    fn num_dofs(&self) -> usize;
    fn get_dofs(&self) -> Array1<f64>;
    fn set_dofs(&mut self, dofs: &Array1<f64>) -> StellResult<()>;

    fn dgamma_by_dcoeff(&self) -> &Array2<f64>;
    fn dgammadash1_by_dcoeff(&self) -> &Array2<f64>;
    fn dgammadash2_by_dcoeff(&self) -> &Array2<f64>;

    /// Reset to a circular-section torus `R = major + minor·cos θ`,
    /// `Z = minor·sin θ`.
    fn set_torus(&mut self, major_radius: f64, minor_radius: f64);

    /// Whether the residual of a Boozer solve can be made square on this
    /// representation.
    fn supports_exact_solve(&self) -> bool {
        false
    }

    /// Grid points carrying independent equations under stellarator
    /// symmetry.
    fn stellsym_mask(&self) -> Array2<bool> {
        Array2::from_elem((self.quadpoints_phi().len(), self.quadpoints_theta().len()), true)
    }

    /// Points, shape (nphi, ntheta, 3).
    fn gamma(&self) -> Array3<f64> {
        reshape_points(self, &self.dgamma_by_dcoeff().dot(&self.get_dofs()))
    }

    /// `∂x/∂φ` with respect to the φ quadrature parameter.
    fn gammadash1(&self) -> Array3<f64> {
        reshape_points(self, &self.dgammadash1_by_dcoeff().dot(&self.get_dofs()))
    }

    /// `∂x/∂θ` with respect to the θ quadrature parameter.
    fn gammadash2(&self) -> Array3<f64> {
        reshape_points(self, &self.dgammadash2_by_dcoeff().dot(&self.get_dofs()))
    }

    /// Non-normalised normal `x_φ × x_θ`.
    fn normal(&self) -> Array3<f64> {
        let d1 = self.gammadash1();
        let d2 = self.gammadash2();
        let (nphi, ntheta, _) = d1.dim();
        let mut n = Array3::zeros((nphi, ntheta, 3));
        for i in 0..nphi {
            for j in 0..ntheta {
                let c = cross(
                    vec3(d1.slice(ndarray::s![i, j, ..])),
                    vec3(d2.slice(ndarray::s![i, j, ..])),
                );
                for k in 0..3 {
                    n[[i, j, k]] = c[k];
                }
            }
        }
        n
    }

    /// `mean |n|`, the surface area when the grid covers the full torus.
    fn area(&self) -> f64 {
        let n = self.normal();
        let (nphi, ntheta, _) = n.dim();
        let mut total = 0.0;
        for i in 0..nphi {
            for j in 0..ntheta {
                total += norm(vec3(n.slice(ndarray::s![i, j, ..])));
            }
        }
        total / (nphi * ntheta) as f64
    }

    /// `mean(x·n)/3`, the enclosed volume when the grid covers the full
    /// torus.
    fn volume(&self) -> f64 {
        let x = self.gamma();
        let n = self.normal();
        let (nphi, ntheta, _) = n.dim();
        let mut total = 0.0;
        for i in 0..nphi {
            for j in 0..ntheta {
                total += dot(
                    vec3(x.slice(ndarray::s![i, j, ..])),
                    vec3(n.slice(ndarray::s![i, j, ..])),
                );
            }
        }
        total / (3.0 * (nphi * ntheta) as f64)
    }

    /// Least-squares fit by an (R, Z) Fourier surface on the same grid.
    fn to_rz_fourier(&self, mpol: usize, ntor: usize) -> StellResult<SurfaceRZFourier> {
        fit::fit_rz_fourier(
            &self.gamma(),
            self.quadpoints_phi(),
            self.quadpoints_theta(),
            self.nfp(),
            self.stellsym(),
            mpol,
            ntor,
        )
    }
}

fn reshape_points<S: Surface + ?Sized>(surface: &S, flat: &Array1<f64>) -> Array3<f64> {
    let nphi = surface.quadpoints_phi().len();
    let ntheta = surface.quadpoints_theta().len();
    Array3::from_shape_fn((nphi, ntheta, 3), |(i, j, k)| flat[(i * ntheta + j) * 3 + k])
}

/// Quadrature points `i/n` scaled to `extent`.
pub fn quadpoints(n: usize, extent: f64) -> Vec<f64> {
    (0..n).map(|i| extent * i as f64 / n as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_torus_area_and_volume() {
        let mut s = SurfaceRZFourier::new(2, 1, 1, true, quadpoints(24, 1.0), quadpoints(24, 1.0));
        s.set_torus(1.5, 0.3);
        let area = s.area();
        let volume = s.volume();
        assert!((area - 4.0 * PI * PI * 1.5 * 0.3).abs() < 1e-10, "area {area}");
        assert!((volume - 2.0 * PI * PI * 1.5 * 0.09).abs() < 1e-10, "volume {volume}");
    }

    #[test]
    fn test_normal_points_outward() {
        let mut s = SurfaceXYZTensorFourier::new(2, 1, 3, true, quadpoints(6, 1.0 / 3.0), quadpoints(8, 1.0));
        s.set_torus(1.0, 0.2);
        let x = s.gamma();
        let n = s.normal();
        for i in 0..6 {
            for j in 0..8 {
                let r = (x[[i, j, 0]].powi(2) + x[[i, j, 1]].powi(2)).sqrt();
                let outward = [
                    x[[i, j, 0]] * (r - 1.0) / r,
                    x[[i, j, 1]] * (r - 1.0) / r,
                    x[[i, j, 2]],
                ];
                let nn = [n[[i, j, 0]], n[[i, j, 1]], n[[i, j, 2]]];
                assert!(dot(outward, nn) > 0.0);
            }
        }
    }
}
