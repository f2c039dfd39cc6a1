// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Boozer Adjoints
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Coil sensitivities of converged Boozer systems.
//!
//! Both products hold the surface, ι and G fixed and differentiate only
//! through B (and dB). A `G` of `None` is taken from `g0()` and held
//! constant; it is not differentiated with respect to the currents.

use super::{stellsym_residual_mask, BoozerSurface};
use crate::objectives::{block, evaluate_on, row, set_row, Geometry, SurfaceLabel};
use ndarray::{s, Array1, Array2, Array3};
use stell_field::coil::CoilGradient;
use stell_field::field::MagneticField;
use stell_geo::surface::Surface;
use stell_geo::vector::{add, dot, scale, sub, Vec3};
use stell_types::error::{StellError, StellResult};

fn as_vec3(a: &Array1<f64>) -> Vec3 {
    [a[0], a[1], a[2]]
}

/// `Σ_i λ_i ∂r_i/∂B` at one point: `G·λ − 2B·(λ·t)`.
fn residual_b_cotangent(g: f64, lambda: Vec3, b: Vec3, t: Vec3) -> Vec3 {
    sub(scale(lambda, g), scale(b, 2.0 * dot(lambda, t)))
}

/// `lmᵀ·∂R/∂(coil dofs)` for the residual-only Newton system
/// `R = [r[mask], l − t, (z00)]`.
///
/// `lm` has one entry per masked residual, one for the label and, without
/// stellarator symmetry, one for the z anchor (which does not depend on
/// the coils).
pub fn boozer_surface_dexactresidual_dcoils_dcurrents_vjp<F, S, L>(
    lm: &Array1<f64>,
    boozer: &mut BoozerSurface<F, S, L>,
    iota: f64,
    g: Option<f64>,
) -> StellResult<CoilGradient>
where
    F: MagneticField,
    S: Surface,
    L: SurfaceLabel,
{
    let mask = stellsym_residual_mask(&boozer.surface);
    let kept = mask.iter().filter(|&&m| m).count();
    let expected = kept + 1 + usize::from(!boozer.surface.stellsym());
    if lm.len() != expected {
        return Err(StellError::dimension("exact residual multipliers", expected, lm.len()));
    }

    let mut lambda = Array1::zeros(mask.len());
    for (slot, value) in mask
        .iter()
        .enumerate()
        .filter(|(_, &m)| m)
        .map(|(i, _)| i)
        .zip(lm.iter())
    {
        lambda[slot] = *value;
    }

    let geo = Geometry::of(&boozer.surface);
    evaluate_on(&mut boozer.field, &geo)?;
    let b = boozer.field.b()?;
    let gval = g.unwrap_or_else(|| boozer.field.g0());
    let mut v = Array2::zeros((geo.npts(), 3));
    for p in 0..geo.npts() {
        let t = add(row(&geo.xphi, p), scale(row(&geo.xtheta, p), iota));
        let l = [lambda[3 * p], lambda[3 * p + 1], lambda[3 * p + 2]];
        set_row(&mut v, p, residual_b_cotangent(gval, l, row(&b, p), t));
    }
    let mut grad = boozer.field.b_vjp(&v)?;
    if let Some(label) = boozer.label.dcoils_vjp(&boozer.surface, lm[kept])? {
        grad += &label;
    }
    Ok(grad)
}

/// `lmᵀ·∂(Jᵀr)/∂(coil dofs)`, the coil derivative of the least-squares
/// gradient, with `lm` over `[surface dofs, ι, (G)]`.
pub fn boozer_surface_dlsqgrad_dcoils_vjp<F, S, L>(
    lm: &Array1<f64>,
    boozer: &mut BoozerSurface<F, S, L>,
    iota: f64,
    g: Option<f64>,
) -> StellResult<CoilGradient>
where
    F: MagneticField,
    S: Surface,
    L: SurfaceLabel,
{
    let optimize_g = g.is_some();
    let nd = boozer.surface.num_dofs();
    let expected = boozer.num_unknowns(optimize_g);
    if lm.len() != expected {
        return Err(StellError::dimension("least-squares gradient multipliers", expected, lm.len()));
    }

    let booz = super::boozer_surface_residual(&boozer.surface, iota, g, &mut boozer.field, 1)?;
    let jacobian = booz
        .jacobian
        .ok_or_else(|| StellError::ConfigError("Boozer Jacobian missing".to_string()))?;
    // The residual call left the field at the surface points.
    let b = boozer.field.b()?;
    let db = boozer.field.db_by_dx()?;
    let gval = g.unwrap_or_else(|| boozer.field.g0());
    let geo = Geometry::of(&boozer.surface);

    let lambda = jacobian.dot(lm);
    let y = lm.slice(s![..nd]);
    let y_iota = lm[nd];
    let y_g = if optimize_g { lm[nd + 1] } else { 0.0 };

    let mut v = Array2::zeros((geo.npts(), 3));
    let mut w = Array3::zeros((geo.npts(), 3, 3));
    for p in 0..geo.npts() {
        let bp = row(&b, p);
        let xtheta = row(&geo.xtheta, p);
        let t = add(row(&geo.xphi, p), scale(xtheta, iota));
        let r = [booz.residual[3 * p], booz.residual[3 * p + 1], booz.residual[3 * p + 2]];
        let l = [lambda[3 * p], lambda[3 * p + 1], lambda[3 * p + 2]];

        let dy = as_vec3(&block(boozer.surface.dgamma_by_dcoeff(), p).dot(&y));
        let ty = add(
            as_vec3(&block(boozer.surface.dgammadash1_by_dcoeff(), p).dot(&y)),
            scale(as_vec3(&block(boozer.surface.dgammadash2_by_dcoeff(), p).dot(&y)), iota),
        );
        let mut bcy = [0.0; 3];
        for (i, c) in bcy.iter_mut().enumerate() {
            *c = (0..3).map(|j| dy[j] * db[[p, j, i]]).sum();
        }

        let rt = dot(r, t);
        let mut vb = residual_b_cotangent(gval, l, bp, t);
        vb = add(vb, scale(bcy, -2.0 * rt));
        vb = add(vb, scale(bp, -2.0 * (dot(r, ty) + y_iota * dot(r, xtheta))));
        vb = add(vb, scale(r, y_g));
        set_row(&mut v, p, vb);

        let coeff = sub(scale(r, gval), scale(bp, 2.0 * rt));
        for j in 0..3 {
            for i in 0..3 {
                w[[p, j, i]] = dy[j] * coeff[i];
            }
        }
    }
    let (from_b, from_db) = boozer.field.b_and_db_vjp(&v, &w)?;
    Ok(from_b + from_db)
}
