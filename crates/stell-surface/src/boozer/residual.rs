// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Boozer Residual
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Residual `r = G·B − |B|²·(x_φ + ι·x_θ)` of the Boozer angle condition.
//!
//! With `Bc_a = dBᵀ·X_a` the field change along surface direction `X_a`
//! and `t = x_φ + ι·x_θ`:
//!
//! ```text
//! ∂r/∂c_a = G·Bc_a − 2(B·Bc_a)·t − |B|²·(D1_a + ι·D2_a)
//! ∂r/∂ι   = −|B|²·x_θ
//! ∂r/∂G   = B
//! ```
//!
//! Note that ι is the rotation of `x_φ + ι·x_θ`, which is the negative of
//! the VMEC convention.

use crate::objectives::label::outer;
use crate::objectives::{block, evaluate_on, row, Geometry};
use ndarray::{s, Array1, Array2, Array3, Array4};
use stell_field::field::MagneticField;
use stell_geo::surface::Surface;
use stell_geo::vector::{add, dot, scale};
use stell_types::error::{StellError, StellResult};

/// Boozer residual with its derivatives up to the requested order.
#[derive(Debug, Clone)]
pub struct BoozerResidual {
    /// Point-major, component-minor.
    pub residual: Array1<f64>,
    /// Columns `[surface dofs, ι, (G)]`.
    pub jacobian: Option<Array2<f64>>,
    /// `Σ_i r_i ∇²r_i` over the same columns.
    pub hessian: Option<Array2<f64>>,
}

/// `dB[p]` transposed, so that `Bc = dbt·X`.
fn transposed_gradient(db: &Array3<f64>, p: usize) -> Array2<f64> {
    Array2::from_shape_fn((3, 3), |(i, j)| db[[p, j, i]])
}

/// `Σ_i w_i d2B[p][k][l][i]`.
fn contract_hessian(d2b: &Array4<f64>, p: usize, w: [f64; 3]) -> Array2<f64> {
    Array2::from_shape_fn((3, 3), |(k, l)| (0..3).map(|i| d2b[[p, k, l, i]] * w[i]).sum())
}

/// Evaluate the residual on the surface grid.
///
/// `g = None` takes `G` from the field's `g0()` and drops the G column.
pub fn boozer_surface_residual(
    surface: &dyn Surface,
    iota: f64,
    g: Option<f64>,
    field: &mut dyn MagneticField,
    derivatives: usize,
) -> StellResult<BoozerResidual> {
    if derivatives > 2 {
        return Err(StellError::ConfigError(format!(
            "Boozer residual supports derivatives up to 2, got {derivatives}"
        )));
    }
    let geo = Geometry::of(surface);
    evaluate_on(field, &geo)?;
    let b = field.b()?;
    let gval = g.unwrap_or_else(|| field.g0());
    let npts = geo.npts();

    let mut residual = Array1::zeros(3 * npts);
    for p in 0..npts {
        let bp = row(&b, p);
        let t = add(row(&geo.xphi, p), scale(row(&geo.xtheta, p), iota));
        let b2 = dot(bp, bp);
        for i in 0..3 {
            residual[3 * p + i] = gval * bp[i] - b2 * t[i];
        }
    }
    if derivatives == 0 {
        return Ok(BoozerResidual {
            residual,
            jacobian: None,
            hessian: None,
        });
    }

    let db = field.db_by_dx()?;
    let d2b = if derivatives == 2 { Some(field.d2b_by_dxdx()?) } else { None };
    let nd = surface.num_dofs();
    let ncols = nd + 1 + usize::from(g.is_some());
    let mut jacobian = Array2::zeros((3 * npts, ncols));
    let mut hessian = d2b.as_ref().map(|_| Array2::<f64>::zeros((ncols, ncols)));

    for p in 0..npts {
        let bp = row(&b, p);
        let b_arr = ndarray::arr1(&bp);
        let xtheta = row(&geo.xtheta, p);
        let t = add(row(&geo.xphi, p), scale(xtheta, iota));
        let b2 = dot(bp, bp);
        let d0 = block(surface.dgamma_by_dcoeff(), p);
        let d1 = block(surface.dgammadash1_by_dcoeff(), p);
        let d2 = block(surface.dgammadash2_by_dcoeff(), p);
        let tangent = &d1 + &(&d2 * iota);

        let bc = transposed_gradient(&db, p).dot(&d0);
        let u = bc.t().dot(&b_arr);
        let t_arr = ndarray::arr1(&t);
        let jp = &bc * gval - outer(&t_arr, &u) * 2.0 - &tangent * b2;
        let mut rows = jacobian.slice_mut(s![3 * p..3 * p + 3, ..]);
        rows.slice_mut(s![.., ..nd]).assign(&jp);
        for i in 0..3 {
            rows[[i, nd]] = -b2 * xtheta[i];
            if g.is_some() {
                rows[[i, nd + 1]] = bp[i];
            }
        }

        if let (Some(h), Some(d2b)) = (hessian.as_mut(), d2b.as_ref()) {
            let r = [residual[3 * p], residual[3 * p + 1], residual[3 * p + 2]];
            let r_arr = ndarray::arr1(&r);
            let rt = dot(r, t);
            let m = contract_hessian(d2b, p, r) * gval - contract_hessian(d2b, p, bp) * (2.0 * rt);
            let w = tangent.t().dot(&r_arr);
            let cc = d0.t().dot(&m).dot(&d0) - bc.t().dot(&bc) * (2.0 * rt) - (outer(&u, &w) + outer(&w, &u)) * 2.0;
            let mut hcc = h.slice_mut(s![..nd, ..nd]);
            hcc += &cc;

            let c_iota = &u * (-2.0 * dot(r, xtheta)) - d2.t().dot(&r_arr) * b2;
            let c_g = bc.t().dot(&r_arr);
            for a in 0..nd {
                h[[a, nd]] += c_iota[a];
                h[[nd, a]] += c_iota[a];
                if g.is_some() {
                    h[[a, nd + 1]] += c_g[a];
                    h[[nd + 1, a]] += c_g[a];
                }
            }
        }
    }

    Ok(BoozerResidual {
        residual,
        jacobian: Some(jacobian),
        hessian,
    })
}
