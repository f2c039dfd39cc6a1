// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Surface Objectives
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Scalar functionals of a surface and a field.
//!
//! Gradients are with respect to the surface dofs. Both surface
//! representations are linear in their dofs, so with `D0`, `D1`, `D2` the
//! derivative matrices of `x`, `x_φ` and `x_θ` every surface variation is
//! `D·δc` and second dof-derivatives of the geometry vanish.

pub mod label;
pub mod non_qs;
pub mod qfm_residual;

pub use label::{label_from_kind, Area, SurfaceLabel, ToroidalFlux, Volume};
pub use non_qs::NonQuasiSymmetricComponentPenalty;
pub use qfm_residual::QfmResidual;

use ndarray::{s, Array1, Array2, ArrayView2};
use stell_field::field::MagneticField;
use stell_geo::surface::Surface;
use stell_geo::vector::{cross, norm, Vec3};
use stell_types::error::StellResult;

/// Surface geometry flattened point-major, one row per grid point.
#[derive(Debug, Clone)]
pub(crate) struct Geometry {
    pub x: Array2<f64>,
    pub xphi: Array2<f64>,
    pub xtheta: Array2<f64>,
    pub normal: Array2<f64>,
    pub normal_norm: Array1<f64>,
}

impl Geometry {
    pub fn of(surface: &dyn Surface) -> Self {
        let dofs = surface.get_dofs();
        let x = point_rows(&surface.dgamma_by_dcoeff().dot(&dofs));
        let xphi = point_rows(&surface.dgammadash1_by_dcoeff().dot(&dofs));
        let xtheta = point_rows(&surface.dgammadash2_by_dcoeff().dot(&dofs));
        let npts = x.nrows();
        let mut normal = Array2::zeros((npts, 3));
        let mut normal_norm = Array1::zeros(npts);
        for p in 0..npts {
            let n = cross(row(&xphi, p), row(&xtheta, p));
            normal_norm[p] = norm(n);
            for k in 0..3 {
                normal[[p, k]] = n[k];
            }
        }
        Geometry {
            x,
            xphi,
            xtheta,
            normal,
            normal_norm,
        }
    }

    pub fn npts(&self) -> usize {
        self.x.nrows()
    }
}

/// Reshape a flat `3·npts` vector to `(npts, 3)`.
pub(crate) fn point_rows(flat: &Array1<f64>) -> Array2<f64> {
    Array2::from_shape_fn((flat.len() / 3, 3), |(p, k)| flat[3 * p + k])
}

/// Flatten `(npts, 3)` rows back to point-major order.
pub(crate) fn flatten_rows(rows: &Array2<f64>) -> Array1<f64> {
    Array1::from_iter(rows.iter().copied())
}

#[inline]
pub(crate) fn row(a: &Array2<f64>, p: usize) -> Vec3 {
    [a[[p, 0]], a[[p, 1]], a[[p, 2]]]
}

#[inline]
pub(crate) fn set_row(a: &mut Array2<f64>, p: usize, v: Vec3) {
    for k in 0..3 {
        a[[p, k]] = v[k];
    }
}

/// The three rows of a derivative matrix belonging to point `p`.
pub(crate) fn block(d: &Array2<f64>, p: usize) -> ArrayView2<'_, f64> {
    d.slice(s![3 * p..3 * p + 3, ..])
}

/// Matrix of `w ↦ v × w`.
pub(crate) fn skew(v: Vec3) -> Array2<f64> {
    ndarray::array![[0.0, -v[2], v[1]], [v[2], 0.0, -v[0]], [-v[1], v[0], 0.0]]
}

/// Columns are `∂n_p/∂c_a = D1_a × x_θ + x_φ × D2_a`.
pub(crate) fn dnormal_block(surface: &dyn Surface, geo: &Geometry, p: usize) -> Array2<f64> {
    let d1 = block(surface.dgammadash1_by_dcoeff(), p);
    let d2 = block(surface.dgammadash2_by_dcoeff(), p);
    skew(row(&geo.xphi, p)).dot(&d2) - skew(row(&geo.xtheta, p)).dot(&d1)
}

/// Chain per-point sensitivities `∂J/∂x_p` and `∂J/∂n_p` to the dofs:
/// `D0ᵀ·gx + D1ᵀ·(x_θ × gn) + D2ᵀ·(gn × x_φ)`.
pub(crate) fn pullback(surface: &dyn Surface, geo: &Geometry, gx: &Array2<f64>, gn: &Array2<f64>) -> Array1<f64> {
    let npts = geo.npts();
    let mut g1 = Array2::zeros((npts, 3));
    let mut g2 = Array2::zeros((npts, 3));
    for p in 0..npts {
        let n = row(gn, p);
        set_row(&mut g1, p, cross(row(&geo.xtheta, p), n));
        set_row(&mut g2, p, cross(n, row(&geo.xphi, p)));
    }
    surface.dgamma_by_dcoeff().t().dot(&flatten_rows(gx))
        + surface.dgammadash1_by_dcoeff().t().dot(&flatten_rows(&g1))
        + surface.dgammadash2_by_dcoeff().t().dot(&flatten_rows(&g2))
}

/// `Σ_i dB[p][j][i]·v_i`, the spatial chain of a B-sensitivity.
pub(crate) fn contract_gradient(db: &ndarray::Array3<f64>, p: usize, v: Vec3) -> Vec3 {
    let mut out = [0.0; 3];
    for (j, o) in out.iter_mut().enumerate() {
        *o = (0..3).map(|i| db[[p, j, i]] * v[i]).sum();
    }
    out
}

/// Point the field at the surface grid.
pub(crate) fn evaluate_on(field: &mut dyn MagneticField, geo: &Geometry) -> StellResult<()> {
    field.set_points(&geo.x)
}
