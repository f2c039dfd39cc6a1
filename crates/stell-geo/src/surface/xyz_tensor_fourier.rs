// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Tensor-Product Fourier Surface
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Surface written in a frame rotating with φ:
//!
//! ```text
//! x = x̂ cos φ − ŷ sin φ,   y = x̂ sin φ + ŷ cos φ,   z = ẑ
//! ```
//!
//! where each of `x̂, ŷ, ẑ` is `Σ c[m, n] w_m(θ) v_n(φ)` with
//! `w_m = cos(mθ)` for `m ≤ mpol` and `sin((m − mpol)θ)` beyond, and
//! `v_n = cos(nfp·nφ)` for `n ≤ ntor` and `sin(nfp(n − ntor)φ)` beyond.

use super::basis::{Component, LinearBasis};
use super::Surface;
use crate::dofs::Optimizable;
use ndarray::{Array1, Array2, Array3};
use stell_types::config::{SurfaceConfig, SurfaceKind};
use stell_types::error::{StellError, StellResult};

#[derive(Debug, Clone)]
pub struct SurfaceXYZTensorFourier {
    mpol: usize,
    ntor: usize,
    nfp: usize,
    stellsym: bool,
    quadpoints_phi: Vec<f64>,
    quadpoints_theta: Vec<f64>,
    /// `(component, m, n)` for each dof.
    modes: Vec<(usize, usize, usize)>,
    dofs: Array1<f64>,
    basis: LinearBasis,
}

/// Stellarator symmetry keeps even·even and odd·odd products for x̂ and
/// the mixed products for ŷ and ẑ.
fn skipped(dim: usize, m: usize, n: usize, mpol: usize, ntor: usize) -> bool {
    let cos_m = m <= mpol;
    let cos_n = n <= ntor;
    if dim == 0 {
        cos_m != cos_n
    } else {
        cos_m == cos_n
    }
}

/// `(w, dw/dθ)` for poloidal index `m`.
fn poloidal(m: usize, mpol: usize, theta: f64) -> (f64, f64) {
    if m <= mpol {
        let k = m as f64;
        ((k * theta).cos(), -k * (k * theta).sin())
    } else {
        let k = (m - mpol) as f64;
        ((k * theta).sin(), k * (k * theta).cos())
    }
}

/// `(v, dv/dφ)` for toroidal index `n`.
fn toroidal(n: usize, ntor: usize, nfp: f64, phi: f64) -> (f64, f64) {
    if n <= ntor {
        let k = nfp * n as f64;
        ((k * phi).cos(), -k * (k * phi).sin())
    } else {
        let k = nfp * (n - ntor) as f64;
        ((k * phi).sin(), k * (k * phi).cos())
    }
}

impl SurfaceXYZTensorFourier {
    pub fn new(
        mpol: usize,
        ntor: usize,
        nfp: usize,
        stellsym: bool,
        quadpoints_phi: Vec<f64>,
        quadpoints_theta: Vec<f64>,
    ) -> Self {
        let mut modes = Vec::new();
        for dim in 0..3 {
            for m in 0..=2 * mpol {
                for n in 0..=2 * ntor {
                    if stellsym && skipped(dim, m, n, mpol, ntor) {
                        continue;
                    }
                    modes.push((dim, m, n));
                }
            }
        }

        let mut basis = LinearBasis::zeros(quadpoints_phi.len(), quadpoints_theta.len(), modes.len());
        let nfp_f = nfp as f64;
        for (col, &(dim, m, n)) in modes.iter().enumerate() {
            let component = match dim {
                0 => Component::Radial,
                1 => Component::Binormal,
                _ => Component::Vertical,
            };
            basis.set_column(col, component, &quadpoints_phi, &quadpoints_theta, |phi, theta| {
                let (w, dw) = poloidal(m, mpol, theta);
                let (v, dv) = toroidal(n, ntor, nfp_f, phi);
                (w * v, w * dv, dw * v)
            });
        }

        let dofs = Array1::zeros(modes.len());
        SurfaceXYZTensorFourier {
            mpol,
            ntor,
            nfp,
            stellsym,
            quadpoints_phi,
            quadpoints_theta,
            modes,
            dofs,
            basis,
        }
    }

    /// Circular torus on the configured grid.
    pub fn from_config(config: &SurfaceConfig) -> StellResult<Self> {
        config.validate()?;
        if config.kind != SurfaceKind::XyzTensorFourier {
            return Err(StellError::ConfigError(format!(
                "expected an xyz_tensor_fourier surface, got {:?}",
                config.kind
            )));
        }
        let mut s = Self::new(
            config.mpol,
            config.ntor,
            config.nfp,
            config.stellsym,
            config.quadpoints_phi(),
            config.quadpoints_theta(),
        );
        s.set_torus(config.major_radius, config.minor_radius);
        Ok(s)
    }

    pub fn mpol(&self) -> usize {
        self.mpol
    }

    pub fn ntor(&self) -> usize {
        self.ntor
    }

    fn index_of(&self, dim: usize, m: usize, n: usize) -> Option<usize> {
        self.modes.iter().position(|&mode| mode == (dim, m, n))
    }

    /// Coefficient of `w_m v_n` in component `dim` (0 = x̂, 1 = ŷ, 2 = ẑ).
    pub fn coefficient(&self, dim: usize, m: usize, n: usize) -> Option<f64> {
        self.index_of(dim, m, n).map(|i| self.dofs[i])
    }

    pub fn set_coefficient(&mut self, dim: usize, m: usize, n: usize, value: f64) -> StellResult<()> {
        match self.index_of(dim, m, n) {
            Some(i) => {
                self.dofs[i] = value;
                Ok(())
            }
            None => Err(StellError::ConfigError(format!(
                "coefficient (dim={dim}, m={m}, n={n}) is not in this surface"
            ))),
        }
    }
}

impl Surface for SurfaceXYZTensorFourier {
    fn quadpoints_phi(&self) -> &[f64] {
        &self.quadpoints_phi
    }

    fn quadpoints_theta(&self) -> &[f64] {
        &self.quadpoints_theta
    }

    fn nfp(&self) -> usize {
        self.nfp
    }

    fn stellsym(&self) -> bool {
        self.stellsym
    }

    fn num_dofs(&self) -> usize {
        self.dofs.len()
    }

    fn get_dofs(&self) -> Array1<f64> {
        self.dofs.clone()
    }

    fn set_dofs(&mut self, dofs: &Array1<f64>) -> StellResult<()> {
        if dofs.len() != self.dofs.len() {
            return Err(StellError::dimension(
                "SurfaceXYZTensorFourier dofs",
                self.dofs.len(),
                dofs.len(),
            ));
        }
        self.dofs.assign(dofs);
        Ok(())
    }

    fn dgamma_by_dcoeff(&self) -> &Array2<f64> {
        &self.basis.gamma
    }

    fn dgammadash1_by_dcoeff(&self) -> &Array2<f64> {
        &self.basis.dash1
    }

    fn dgammadash2_by_dcoeff(&self) -> &Array2<f64> {
        &self.basis.dash2
    }

    fn set_torus(&mut self, major_radius: f64, minor_radius: f64) {
        let (mpol, modes) = (self.mpol, &self.modes);
        for (i, &mode) in modes.iter().enumerate() {
            self.dofs[i] = match mode {
                (0, 0, 0) => major_radius,
                (0, 1, 0) => minor_radius,
                (2, m, 0) if m == mpol + 1 => minor_radius,
                _ => 0.0,
            };
        }
    }

    fn supports_exact_solve(&self) -> bool {
        true
    }

    /// One equation per stellarator-symmetric pair: θ indices up to `mpol`,
    /// and on θ = 0 only φ indices up to `ntor`.
    fn stellsym_mask(&self) -> Array2<bool> {
        let nphi = self.quadpoints_phi.len();
        let ntheta = self.quadpoints_theta.len();
        Array2::from_shape_fn((nphi, ntheta), |(i, j)| {
            !self.stellsym || (j <= self.mpol && !(j == 0 && i > self.ntor))
        })
    }

    fn gamma(&self) -> Array3<f64> {
        self.basis.evaluate(&self.basis.gamma, &self.dofs)
    }

    fn gammadash1(&self) -> Array3<f64> {
        self.basis.evaluate(&self.basis.dash1, &self.dofs)
    }

    fn gammadash2(&self) -> Array3<f64> {
        self.basis.evaluate(&self.basis.dash2, &self.dofs)
    }
}

impl Optimizable for SurfaceXYZTensorFourier {
    fn name(&self) -> String {
        format!(
            "SurfaceXYZTensorFourier(mpol={}, ntor={}, nfp={})",
            self.mpol, self.ntor, self.nfp
        )
    }

    fn num_dofs(&self) -> usize {
        Surface::num_dofs(self)
    }

    fn get_dofs(&self) -> Array1<f64> {
        Surface::get_dofs(self)
    }

    fn set_dofs(&mut self, dofs: &Array1<f64>) -> StellResult<()> {
        Surface::set_dofs(self, dofs)
    }
}
