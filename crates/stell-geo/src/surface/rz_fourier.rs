// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — (R, Z) Fourier Surface
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Surface given by Fourier series of the cylindrical R and Z:
//!
//! ```text
//! R(θ, φ) = Σ rc cos(mθ − nfp·nφ) + rs sin(mθ − nfp·nφ)
//! Z(θ, φ) = Σ zs sin(mθ − nfp·nφ) + zc cos(mθ − nfp·nφ)
//! ```
//!
//! Stellarator symmetry keeps only `rc` and `zs`.

use super::basis::{Component, LinearBasis};
use super::{quadpoints, Surface};
use crate::dofs::Optimizable;
use ndarray::{Array1, Array2};
use stell_types::config::{SurfaceConfig, SurfaceKind};
use stell_types::error::{StellError, StellResult};

/// Coefficient families in dof order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RzCoefficient {
    Rc,
    Rs,
    Zc,
    Zs,
}

impl RzCoefficient {
    fn is_cosine(self) -> bool {
        matches!(self, RzCoefficient::Rc | RzCoefficient::Zc)
    }

    fn component(self) -> Component {
        match self {
            RzCoefficient::Rc | RzCoefficient::Rs => Component::Radial,
            RzCoefficient::Zc | RzCoefficient::Zs => Component::Vertical,
        }
    }
}

/// One dof: family, poloidal mode `m` and toroidal mode `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RzMode {
    pub kind: RzCoefficient,
    pub m: usize,
    pub n: i64,
}

#[derive(Debug, Clone)]
pub struct SurfaceRZFourier {
    mpol: usize,
    ntor: usize,
    nfp: usize,
    stellsym: bool,
    quadpoints_phi: Vec<f64>,
    quadpoints_theta: Vec<f64>,
    modes: Vec<RzMode>,
    dofs: Array1<f64>,
    basis: LinearBasis,
}

fn mode_list(mpol: usize, ntor: usize, stellsym: bool) -> Vec<RzMode> {
    let kinds: &[RzCoefficient] = if stellsym {
        &[RzCoefficient::Rc, RzCoefficient::Zs]
    } else {
        &[RzCoefficient::Rc, RzCoefficient::Rs, RzCoefficient::Zc, RzCoefficient::Zs]
    };
    let ntor = ntor as i64;
    let mut modes = Vec::new();
    for &kind in kinds {
        // m = 0 only carries n >= 0; the sine of the (0, 0) mode vanishes.
        let first_n = if kind.is_cosine() { 0 } else { 1 };
        for n in first_n..=ntor {
            modes.push(RzMode { kind, m: 0, n });
        }
        for m in 1..=mpol {
            for n in -ntor..=ntor {
                modes.push(RzMode { kind, m, n });
            }
        }
    }
    modes
}

impl SurfaceRZFourier {
    pub fn new(
        mpol: usize,
        ntor: usize,
        nfp: usize,
        stellsym: bool,
        quadpoints_phi: Vec<f64>,
        quadpoints_theta: Vec<f64>,
    ) -> Self {
        let modes = mode_list(mpol, ntor, stellsym);
        let mut basis = LinearBasis::zeros(quadpoints_phi.len(), quadpoints_theta.len(), modes.len());
        let nfp_f = nfp as f64;
        for (col, mode) in modes.iter().enumerate() {
            let m = mode.m as f64;
            let nn = nfp_f * mode.n as f64;
            let cosine = mode.kind.is_cosine();
            basis.set_column(col, mode.kind.component(), &quadpoints_phi, &quadpoints_theta, |phi, theta| {
                let (s, c) = (m * theta - nn * phi).sin_cos();
                if cosine {
                    (c, nn * s, -m * s)
                } else {
                    (s, -nn * c, m * c)
                }
            });
        }
        let dofs = Array1::zeros(modes.len());
        SurfaceRZFourier {
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
        if config.kind != SurfaceKind::RzFourier {
            return Err(StellError::ConfigError(format!(
                "expected an rz_fourier surface, got {:?}",
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

    /// Full-torus grid of `nphi × ntheta` points.
    pub fn full_torus(mpol: usize, ntor: usize, nfp: usize, stellsym: bool, nphi: usize, ntheta: usize) -> Self {
        Self::new(mpol, ntor, nfp, stellsym, quadpoints(nphi, 1.0), quadpoints(ntheta, 1.0))
    }

    pub fn mpol(&self) -> usize {
        self.mpol
    }

    pub fn ntor(&self) -> usize {
        self.ntor
    }

    /// Dof layout, one entry per dof.
    pub fn modes(&self) -> &[RzMode] {
        &self.modes
    }

    fn index_of(&self, kind: RzCoefficient, m: usize, n: i64) -> Option<usize> {
        self.modes.iter().position(|md| md.kind == kind && md.m == m && md.n == n)
    }

    /// Coefficient value; `None` when the mode is not part of this
    /// representation.
    pub fn coefficient(&self, kind: RzCoefficient, m: usize, n: i64) -> Option<f64> {
        self.index_of(kind, m, n).map(|i| self.dofs[i])
    }

    pub fn set_coefficient(&mut self, kind: RzCoefficient, m: usize, n: i64, value: f64) -> StellResult<()> {
        match self.index_of(kind, m, n) {
            Some(i) => {
                self.dofs[i] = value;
                Ok(())
            }
            None => Err(StellError::ConfigError(format!(
                "mode {kind:?}(m={m}, n={n}) is not in this surface (mpol={}, ntor={}, stellsym={})",
                self.mpol, self.ntor, self.stellsym
            ))),
        }
    }
}

impl Surface for SurfaceRZFourier {
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
            return Err(StellError::dimension("SurfaceRZFourier dofs", self.dofs.len(), dofs.len()));
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
        self.dofs.fill(0.0);
        for (i, mode) in self.modes.iter().enumerate() {
            self.dofs[i] = match (mode.kind, mode.m, mode.n) {
                (RzCoefficient::Rc, 0, 0) => major_radius,
                (RzCoefficient::Rc, 1, 0) | (RzCoefficient::Zs, 1, 0) => minor_radius,
                _ => 0.0,
            };
        }
    }

    fn gamma(&self) -> ndarray::Array3<f64> {
        self.basis.evaluate(&self.basis.gamma, &self.dofs)
    }

    fn gammadash1(&self) -> ndarray::Array3<f64> {
        self.basis.evaluate(&self.basis.dash1, &self.dofs)
    }

    fn gammadash2(&self) -> ndarray::Array3<f64> {
        self.basis.evaluate(&self.basis.dash2, &self.dofs)
    }
}

impl Optimizable for SurfaceRZFourier {
    fn name(&self) -> String {
        format!("SurfaceRZFourier(mpol={}, ntor={}, nfp={})", self.mpol, self.ntor, self.nfp)
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_dof_counts() {
        // rc: (ntor+1) + mpol(2ntor+1); zs: ntor + mpol(2ntor+1)
        let s = SurfaceRZFourier::full_torus(3, 2, 5, true, 4, 4);
        assert_eq!(Surface::num_dofs(&s), 3 + 15 + 2 + 15);
        let s = SurfaceRZFourier::full_torus(3, 2, 5, false, 4, 4);
        assert_eq!(Surface::num_dofs(&s), 2 * (3 + 15 + 2 + 15));
    }

    #[test]
    fn test_matches_closed_form() {
        let mut s = SurfaceRZFourier::full_torus(2, 1, 3, true, 7, 9);
        s.set_torus(1.3, 0.25);
        s.set_coefficient(RzCoefficient::Rc, 1, 1, 0.05).expect("mode");
        s.set_coefficient(RzCoefficient::Zs, 2, -1, 0.02).expect("mode");
        let x = s.gamma();
        let d1 = s.gammadash1();
        let d2 = s.gammadash2();
        for (i, &qp) in s.quadpoints_phi().iter().enumerate() {
            for (j, &qt) in s.quadpoints_theta().iter().enumerate() {
                let phi = 2.0 * PI * qp;
                let theta = 2.0 * PI * qt;
                let psi11 = theta - 3.0 * phi;
                let psi21 = 2.0 * theta + 3.0 * phi;
                let r = 1.3 + 0.25 * theta.cos() + 0.05 * psi11.cos();
                let z = 0.25 * theta.sin() + 0.02 * psi21.sin();
                assert!((x[[i, j, 0]] - r * phi.cos()).abs() < 1e-13);
                assert!((x[[i, j, 1]] - r * phi.sin()).abs() < 1e-13);
                assert!((x[[i, j, 2]] - z).abs() < 1e-13);

                let r_phi = 2.0 * PI * 0.05 * 3.0 * psi11.sin();
                let z_theta = 2.0 * PI * (0.25 * theta.cos() + 0.04 * psi21.cos());
                let x_phi = r_phi * phi.cos() - 2.0 * PI * r * phi.sin();
                assert!((d1[[i, j, 0]] - x_phi).abs() < 1e-12);
                assert!((d2[[i, j, 2]] - z_theta).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_missing_mode_is_error() {
        let mut s = SurfaceRZFourier::full_torus(1, 1, 1, true, 4, 4);
        assert!(s.set_coefficient(RzCoefficient::Rs, 1, 0, 1.0).is_err());
        assert!(s.set_coefficient(RzCoefficient::Zs, 0, 0, 1.0).is_err());
        assert!(!s.supports_exact_solve());
    }
}
