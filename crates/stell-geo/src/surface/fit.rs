// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — (R, Z) Fourier Fit
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Conversion of any sampled surface to the canonical (R, Z) Fourier form
//! consumed by equilibrium codes.

use super::rz_fourier::{RzCoefficient, SurfaceRZFourier};
use super::Surface;
use ndarray::{Array1, Array2, Array3};
use stell_math::linalg::pinv_svd;
use stell_types::error::{StellError, StellResult};
use tracing::debug;

const FIT_RCOND: f64 = 1e-12;

/// Least-squares fit of `R = √(x² + y²)` and `Z = z` in the variables
/// (poloidal parameter θ, geometric toroidal angle `atan2(y, x)`).
///
/// Exact when the sampled surface is representable with `mpol`, `ntor`.
pub fn fit_rz_fourier(
    gamma: &Array3<f64>,
    quadpoints_phi: &[f64],
    quadpoints_theta: &[f64],
    nfp: usize,
    stellsym: bool,
    mpol: usize,
    ntor: usize,
) -> StellResult<SurfaceRZFourier> {
    let (nphi, ntheta, _) = gamma.dim();
    if nphi != quadpoints_phi.len() || ntheta != quadpoints_theta.len() {
        return Err(StellError::dimension(
            "fit_rz_fourier grid",
            quadpoints_phi.len() * quadpoints_theta.len(),
            nphi * ntheta,
        ));
    }

    let mut out = SurfaceRZFourier::new(
        mpol,
        ntor,
        nfp,
        stellsym,
        quadpoints_phi.to_vec(),
        quadpoints_theta.to_vec(),
    );
    let modes = out.modes().to_vec();
    let npts = nphi * ntheta;
    let r_cols: Vec<usize> = (0..modes.len())
        .filter(|&c| matches!(modes[c].kind, RzCoefficient::Rc | RzCoefficient::Rs))
        .collect();
    let z_cols: Vec<usize> = (0..modes.len())
        .filter(|&c| matches!(modes[c].kind, RzCoefficient::Zc | RzCoefficient::Zs))
        .collect();
    if npts < r_cols.len().max(z_cols.len()) {
        return Err(StellError::ConfigError(format!(
            "{npts} samples cannot determine an mpol={mpol}, ntor={ntor} fit"
        )));
    }

    let mut design_r = Array2::zeros((npts, r_cols.len()));
    let mut design_z = Array2::zeros((npts, z_cols.len()));
    let mut r = Array1::zeros(npts);
    let mut z = Array1::zeros(npts);
    let nfp_f = nfp as f64;

    for i in 0..nphi {
        for (j, &qt) in quadpoints_theta.iter().enumerate() {
            let p = i * ntheta + j;
            let (x, y) = (gamma[[i, j, 0]], gamma[[i, j, 1]]);
            r[p] = x.hypot(y);
            z[p] = gamma[[i, j, 2]];
            let phi = y.atan2(x);
            let theta = std::f64::consts::TAU * qt;
            let value = |c: usize| {
                let mode = modes[c];
                let psi = mode.m as f64 * theta - nfp_f * mode.n as f64 * phi;
                match mode.kind {
                    RzCoefficient::Rc | RzCoefficient::Zc => psi.cos(),
                    RzCoefficient::Rs | RzCoefficient::Zs => psi.sin(),
                }
            };
            for (k, &c) in r_cols.iter().enumerate() {
                design_r[[p, k]] = value(c);
            }
            for (k, &c) in z_cols.iter().enumerate() {
                design_z[[p, k]] = value(c);
            }
        }
    }

    let coeff_r = pinv_svd(&design_r, FIT_RCOND).dot(&r);
    let coeff_z = pinv_svd(&design_z, FIT_RCOND).dot(&z);
    let mut dofs = Array1::zeros(modes.len());
    for (k, &c) in r_cols.iter().enumerate() {
        dofs[c] = coeff_r[k];
    }
    for (k, &c) in z_cols.iter().enumerate() {
        dofs[c] = coeff_z[k];
    }
    out.set_dofs(&dofs)?;

    let misfit = (&design_r.dot(&coeff_r) - &r)
        .iter()
        .chain((&design_z.dot(&coeff_z) - &z).iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    debug!(mpol, ntor, samples = npts, misfit, "fitted rz fourier surface");
    Ok(out)
}
