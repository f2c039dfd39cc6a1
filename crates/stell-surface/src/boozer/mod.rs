// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Boozer Surface
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Surfaces on which the surface parameters are Boozer angles.
//!
//! A solve finds surface dofs, ι and optionally G such that the Boozer
//! residual vanishes, subject to `label(surface) = target` and, without
//! stellarator symmetry, `z(φ=0, θ=0) = 0` to fix the poloidal origin.
//! The unknown vector is `x = [surface dofs, ι, (G)]`.

pub mod adjoint;
pub mod residual;
mod solve;

pub use residual::{boozer_surface_residual, BoozerResidual};

use crate::objectives::SurfaceLabel;
use ndarray::{concatenate, s, Array1, Array2, Axis};
use stell_field::field::MagneticField;
use stell_geo::surface::Surface;
use stell_math::optim::TerminationReason;
use stell_types::error::{StellError, StellResult};

/// Field, surface and label of a Boozer solve.
///
/// Every evaluation writes its surface dofs into `surface`, so after a
/// solve the surface holds the final iterate.
#[derive(Debug)]
pub struct BoozerSurface<F, S, L> {
    pub field: F,
    pub surface: S,
    pub label: L,
    pub target: f64,
}

/// Scalarised penalty `½‖[r, √w(l − t), √w·z00]‖²` and its derivatives.
#[derive(Debug, Clone)]
pub struct PenaltyEvaluation {
    pub value: f64,
    pub gradient: Option<Array1<f64>>,
    pub hessian: Option<Array2<f64>>,
}

/// Outcome of a Boozer solve.
#[derive(Debug, Clone)]
pub struct BoozerSolveResult {
    pub success: bool,
    /// `[surface dofs, ι, (G)]`.
    pub x: Array1<f64>,
    pub surface_dofs: Array1<f64>,
    pub iota: f64,
    /// Present when G was solved for.
    pub g: Option<f64>,
    /// `[λ_label, λ_z]` of the exact-constraint Newton solve.
    pub lagrange_multipliers: Option<[f64; 2]>,
    /// Boozer residual at the final iterate.
    pub residual: Array1<f64>,
    pub gradient_norm: f64,
    pub iterations: usize,
    pub termination: TerminationReason,
}

/// Penalty vector pieces shared by the scalar and vector forms.
struct PenaltyTerms {
    vector: Array1<f64>,
    jacobian: Option<Array2<f64>>,
    weighted_hessian: Option<Array2<f64>>,
    label_gap: f64,
    d2label: Option<Array2<f64>>,
}

/// Equations of the residual-only Newton solve at the current surface.
pub(crate) struct ResidualSystem {
    pub rhs: Array1<f64>,
    pub jacobian: Array2<f64>,
}

/// Residual entries that carry independent equations: the surface's
/// symmetry mask repeated over components, and without the x component at
/// point `(0, 0)` under stellarator symmetry. That point sits on the
/// symmetry line where `B_x`, `∂x/∂φ` and `∂x/∂θ` all vanish, so its x
/// residual is identically zero; the y and z components stay.
pub fn stellsym_residual_mask(surface: &dyn Surface) -> Vec<bool> {
    let mask = surface.stellsym_mask();
    let mut out: Vec<bool> = mask.iter().flat_map(|&m| [m, m, m]).collect();
    if surface.stellsym() {
        if let Some(first) = out.first_mut() {
            *first = false;
        }
    }
    out
}

/// Append zero entries for the ι and G columns.
fn pad(v: &Array1<f64>, extra: usize) -> Array1<f64> {
    concatenate![Axis(0), v.view(), Array1::zeros(extra).view()]
}

impl<F, S, L> BoozerSurface<F, S, L>
where
    F: MagneticField,
    S: Surface,
    L: SurfaceLabel,
{
    pub fn new(field: F, surface: S, label: L, target: f64) -> Self {
        BoozerSurface {
            field,
            surface,
            label,
            target,
        }
    }

    /// Length of `x` for the current surface.
    pub fn num_unknowns(&self, optimize_g: bool) -> usize {
        self.surface.num_dofs() + 1 + usize::from(optimize_g)
    }

    /// `[surface dofs, ι, (G)]` from the current surface.
    pub fn pack(&self, iota: f64, g: Option<f64>) -> Array1<f64> {
        let mut x = self.surface.get_dofs().to_vec();
        x.push(iota);
        if let Some(g) = g {
            x.push(g);
        }
        Array1::from(x)
    }

    /// Write the surface part of `x` into the surface; returns ι and G.
    fn unpack(&mut self, x: &Array1<f64>, optimize_g: bool) -> StellResult<(f64, Option<f64>)> {
        let expected = self.num_unknowns(optimize_g);
        if x.len() != expected {
            return Err(StellError::dimension("Boozer unknowns", expected, x.len()));
        }
        let nd = self.surface.num_dofs();
        self.surface.set_dofs(&x.slice(s![..nd]).to_owned())?;
        let g = optimize_g.then(|| x[nd + 1]);
        Ok((x[nd], g))
    }

    /// Gradient of `z(φ_0, θ_0)` with respect to the surface dofs.
    fn dz00(&self) -> Array1<f64> {
        self.surface.dgamma_by_dcoeff().row(2).to_owned()
    }

    fn z00(&self) -> f64 {
        self.dz00().dot(&self.surface.get_dofs())
    }

    fn penalty_terms(
        &mut self,
        x: &Array1<f64>,
        derivatives: usize,
        constraint_weight: f64,
        optimize_g: bool,
    ) -> StellResult<PenaltyTerms> {
        let (iota, g) = self.unpack(x, optimize_g)?;
        let booz = boozer_surface_residual(&self.surface, iota, g, &mut self.field, derivatives)?;
        let label_gap = self.label.value(&self.surface)? - self.target;
        let sw = constraint_weight.sqrt();
        let z00 = self.z00();
        let vector = concatenate![
            Axis(0),
            booz.residual.view(),
            ndarray::arr1(&[sw * label_gap, sw * z00]).view()
        ];

        let mut jacobian = None;
        if let Some(j) = booz.jacobian {
            let extra = x.len() - self.surface.num_dofs();
            let dl = pad(&self.label.dsurface(&self.surface)?, extra) * sw;
            let dz = pad(&self.dz00(), extra) * sw;
            jacobian = Some(concatenate![
                Axis(0),
                j.view(),
                dl.view().insert_axis(Axis(0)),
                dz.view().insert_axis(Axis(0))
            ]);
        }
        let d2label = if derivatives == 2 {
            Some(self.label.d2surface(&self.surface)?)
        } else {
            None
        };
        Ok(PenaltyTerms {
            vector,
            jacobian,
            weighted_hessian: booz.hessian,
            label_gap,
            d2label,
        })
    }

    /// Scalarised penalty with gradient (`derivatives >= 1`) and Hessian
    /// (`derivatives = 2`) with respect to `x`.
    pub fn boozer_penalty_constraints(
        &mut self,
        x: &Array1<f64>,
        derivatives: usize,
        constraint_weight: f64,
        optimize_g: bool,
    ) -> StellResult<PenaltyEvaluation> {
        let terms = self.penalty_terms(x, derivatives, constraint_weight, optimize_g)?;
        let value = 0.5 * terms.vector.dot(&terms.vector);
        let gradient = terms.jacobian.as_ref().map(|j| j.t().dot(&terms.vector));
        let hessian = match (&terms.jacobian, terms.weighted_hessian, terms.d2label) {
            (Some(j), Some(weighted), Some(d2l)) => {
                let nd = self.surface.num_dofs();
                let mut h = j.t().dot(j) + weighted;
                let mut label_block = h.slice_mut(s![..nd, ..nd]);
                label_block.scaled_add(constraint_weight * terms.label_gap, &d2l);
                Some(h)
            }
            _ => None,
        };
        Ok(PenaltyEvaluation {
            value,
            gradient,
            hessian,
        })
    }

    /// The penalty vector `[r, √w(l − t), √w·z00]` and, for
    /// `derivatives = 1`, its Jacobian.
    pub fn boozer_penalty_constraints_vectorized(
        &mut self,
        x: &Array1<f64>,
        derivatives: usize,
        constraint_weight: f64,
        optimize_g: bool,
    ) -> StellResult<(Array1<f64>, Option<Array2<f64>>)> {
        if derivatives > 1 {
            return Err(StellError::ConfigError(format!(
                "vectorised penalty supports derivatives up to 1, got {derivatives}"
            )));
        }
        let terms = self.penalty_terms(x, derivatives, constraint_weight, optimize_g)?;
        Ok((terms.vector, terms.jacobian))
    }

    /// KKT residual of `min ½‖r‖²` subject to the label and z anchor, at
    /// `xl = [x, λ_label, λ_z]`:
    ///
    /// ```text
    /// [Jᵀr − λ_label·∇l − λ_z·∇z00,  l − t,  z00]
    /// ```
    ///
    /// With `derivatives = 1` also its Jacobian.
    pub fn boozer_exact_constraints(
        &mut self,
        xl: &Array1<f64>,
        derivatives: usize,
        optimize_g: bool,
    ) -> StellResult<(Array1<f64>, Option<Array2<f64>>)> {
        if derivatives > 1 {
            return Err(StellError::ConfigError(format!(
                "exact constraints support derivatives up to 1, got {derivatives}"
            )));
        }
        let n = self.num_unknowns(optimize_g);
        if xl.len() != n + 2 {
            return Err(StellError::dimension("Boozer exact unknowns", n + 2, xl.len()));
        }
        let x = xl.slice(s![..n]).to_owned();
        let (lm_label, lm_z) = (xl[n], xl[n + 1]);
        let (iota, g) = self.unpack(&x, optimize_g)?;
        let booz = boozer_surface_residual(&self.surface, iota, g, &mut self.field, derivatives + 1)?;
        let j = booz
            .jacobian
            .ok_or_else(|| StellError::ConfigError("Boozer Jacobian missing".to_string()))?;

        let nd = self.surface.num_dofs();
        let dl = pad(&self.label.dsurface(&self.surface)?, n - nd);
        let dz = pad(&self.dz00(), n - nd);
        let label_gap = self.label.value(&self.surface)? - self.target;

        let stationarity = j.t().dot(&booz.residual) - &dl * lm_label - &dz * lm_z;
        let res = concatenate![
            Axis(0),
            stationarity.view(),
            ndarray::arr1(&[label_gap, self.z00()]).view()
        ];
        if derivatives == 0 {
            return Ok((res, None));
        }

        let weighted = booz
            .hessian
            .ok_or_else(|| StellError::ConfigError("Boozer Hessian missing".to_string()))?;
        let d2l = self.label.d2surface(&self.surface)?;
        let mut dres = Array2::zeros((n + 2, n + 2));
        {
            let mut top = dres.slice_mut(s![..n, ..n]);
            top.assign(&(j.t().dot(&j) + weighted));
            top.slice_mut(s![..nd, ..nd]).scaled_add(-lm_label, &d2l);
        }
        for a in 0..n {
            dres[[a, n]] = -dl[a];
            dres[[a, n + 1]] = -dz[a];
            dres[[n, a]] = dl[a];
            dres[[n + 1, a]] = dz[a];
        }
        Ok((res, Some(dres)))
    }

    /// Masked residual, label gap and (without stellarator symmetry) z
    /// anchor, with their Jacobian over `x`.
    pub(crate) fn residual_system(&mut self, x: &Array1<f64>, optimize_g: bool) -> StellResult<ResidualSystem> {
        let (iota, g) = self.unpack(x, optimize_g)?;
        let booz = boozer_surface_residual(&self.surface, iota, g, &mut self.field, 1)?;
        let j = booz
            .jacobian
            .ok_or_else(|| StellError::ConfigError("Boozer Jacobian missing".to_string()))?;
        let mask = stellsym_residual_mask(&self.surface);
        let kept: Vec<usize> = mask.iter().enumerate().filter(|(_, &m)| m).map(|(i, _)| i).collect();

        let n = x.len();
        let nd = self.surface.num_dofs();
        let mut rhs: Vec<f64> = kept.iter().map(|&i| booz.residual[i]).collect();
        let mut rows = vec![j.select(Axis(0), &kept)];
        rhs.push(self.label.value(&self.surface)? - self.target);
        rows.push(pad(&self.label.dsurface(&self.surface)?, n - nd).insert_axis(Axis(0)));
        if !self.surface.stellsym() {
            rhs.push(self.z00());
            rows.push(pad(&self.dz00(), n - nd).insert_axis(Axis(0)));
        }
        let views: Vec<_> = rows.iter().map(|r| r.view()).collect();
        let jacobian = concatenate(Axis(0), &views)
            .map_err(|e| StellError::LinAlg(format!("residual system assembly: {e}")))?;
        Ok(ResidualSystem {
            rhs: Array1::from(rhs),
            jacobian,
        })
    }

    /// Boozer residual at `x`, leaving the surface there.
    fn settle(&mut self, x: &Array1<f64>, optimize_g: bool) -> StellResult<Array1<f64>> {
        let (iota, g) = self.unpack(x, optimize_g)?;
        Ok(boozer_surface_residual(&self.surface, iota, g, &mut self.field, 0)?.residual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objectives::Area;
    use stell_field::analytic::ToroidalField;
    use stell_field::field::CachedField;
    use stell_geo::surface::{quadpoints, SurfaceRZFourier, SurfaceXYZTensorFourier};

    #[test]
    fn test_mask_drops_origin_x_component_under_stellsym() {
        let s = SurfaceXYZTensorFourier::new(2, 1, 3, true, quadpoints(6, 1.0 / 3.0), quadpoints(8, 1.0));
        let mask = stellsym_residual_mask(&s);
        assert_eq!(mask.len(), 6 * 8 * 3);
        assert!(!mask[0]);
        assert!(mask[1] && mask[2]);
        let points = s.stellsym_mask().iter().filter(|&&m| m).count();
        assert_eq!(mask.iter().filter(|&&m| m).count(), 3 * points - 1);

        let full = SurfaceRZFourier::new(2, 1, 1, false, quadpoints(5, 1.0), quadpoints(6, 1.0));
        assert!(stellsym_residual_mask(&full).iter().all(|&m| m));
    }

    #[test]
    fn test_pack_rejects_wrong_length() {
        let mut s = SurfaceXYZTensorFourier::new(1, 1, 2, true, quadpoints(4, 0.5), quadpoints(6, 1.0));
        s.set_torus(1.0, 0.2);
        let field = CachedField::new(ToroidalField::new(1.0, 1.0).expect("field"));
        let mut booz = BoozerSurface::new(field, s, Area, 1.0);
        let x = booz.pack(0.1, None);
        assert!(booz.boozer_penalty_constraints(&x, 0, 1.0, true).is_err());
        assert!(booz.boozer_penalty_constraints(&x, 0, 1.0, false).is_ok());
    }
}
