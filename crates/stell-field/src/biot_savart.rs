// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Biot-Savart
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Magnetic field of a set of filamentary coils.
//!
//! Each coil is discretised on its curve's quadrature points:
//!
//! ```text
//! B(x) = 1e-7·I/nq · Σ_k γ'_k × (x − γ_k) / |x − γ_k|³
//! A(x) = 1e-7·I/nq · Σ_k γ'_k / |x − γ_k|
//! ```
//!
//! which converges spectrally for smooth closed curves. Fields are stored
//! per coil at unit current, so the totals are exactly linear in the
//! currents and the current sensitivities are the unit fields themselves.
//! Points on a coil are not guarded against.

use crate::coil::{CoilGradient, CoilHandle};
use crate::field::{check_points, FieldCache, FieldDerivatives, MagneticField};
use ndarray::{Array1, Array2, Array3, Array4, ArrayView1};
use stell_geo::dofs::Optimizable;
use stell_geo::vector::{cross, dot, sub, vec3, Vec3};
use stell_types::constants::{BIOT_SAVART_PREFACTOR, MU0};
use stell_types::error::{StellError, StellResult};
use tracing::debug;

const UNIT: [Vec3; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Sampled geometry of one coil.
struct CoilSamples {
    gamma: Array2<f64>,
    gammadash: Array2<f64>,
}

impl CoilSamples {
    fn prefactor(&self) -> f64 {
        BIOT_SAVART_PREFACTOR / self.gamma.nrows() as f64
    }

    fn point(&self, k: usize) -> (Vec3, Vec3) {
        (vec3(self.gamma.row(k)), vec3(self.gammadash.row(k)))
    }
}

/// Unit-current B of one coil up to derivative `order`.
fn unit_b(points: &Array2<f64>, coil: &CoilSamples, order: usize) -> FieldDerivatives {
    let npts = points.nrows();
    let nq = coil.gamma.nrows();
    let pre = coil.prefactor();
    let mut out = FieldDerivatives::zeros(npts, order);

    for p in 0..npts {
        let x = vec3(points.row(p));
        let mut b = [0.0; 3];
        let mut db = [[0.0; 3]; 3];
        let mut d2b = [[[0.0; 3]; 3]; 3];
        for k in 0..nq {
            let (g, t) = coil.point(k);
            let r = sub(x, g);
            let d2 = dot(r, r);
            let inv3 = 1.0 / (d2 * d2.sqrt());
            let txr = cross(t, r);
            for i in 0..3 {
                b[i] += txr[i] * inv3;
            }
            if order == 0 {
                continue;
            }
            let inv5 = inv3 / d2;
            let te = [cross(t, UNIT[0]), cross(t, UNIT[1]), cross(t, UNIT[2])];
            for j in 0..3 {
                for i in 0..3 {
                    db[j][i] += te[j][i] * inv3 - 3.0 * txr[i] * r[j] * inv5;
                }
            }
            if order < 2 {
                continue;
            }
            let inv7 = inv5 / d2;
            for l in 0..3 {
                for j in 0..3 {
                    let delta = if j == l { 1.0 } else { 0.0 };
                    for i in 0..3 {
                        d2b[l][j][i] += -3.0
                            * inv5
                            * (te[j][i] * r[l] + te[l][i] * r[j] + txr[i] * delta)
                            + 15.0 * txr[i] * r[j] * r[l] * inv7;
                    }
                }
            }
        }
        out.write_point(p, pre, &b, &db, &d2b);
    }
    out
}

/// Unit-current A of one coil up to derivative `order`.
fn unit_a(points: &Array2<f64>, coil: &CoilSamples, order: usize) -> FieldDerivatives {
    let npts = points.nrows();
    let nq = coil.gamma.nrows();
    let pre = coil.prefactor();
    let mut out = FieldDerivatives::zeros(npts, order);

    for p in 0..npts {
        let x = vec3(points.row(p));
        let mut a = [0.0; 3];
        let mut da = [[0.0; 3]; 3];
        let mut d2a = [[[0.0; 3]; 3]; 3];
        for k in 0..nq {
            let (g, t) = coil.point(k);
            let r = sub(x, g);
            let d2 = dot(r, r);
            let inv1 = 1.0 / d2.sqrt();
            for i in 0..3 {
                a[i] += t[i] * inv1;
            }
            if order == 0 {
                continue;
            }
            let inv3 = inv1 / d2;
            for j in 0..3 {
                for i in 0..3 {
                    da[j][i] -= t[i] * r[j] * inv3;
                }
            }
            if order < 2 {
                continue;
            }
            let inv5 = inv3 / d2;
            for l in 0..3 {
                for j in 0..3 {
                    let delta = if j == l { inv3 } else { 0.0 };
                    for i in 0..3 {
                        d2a[l][j][i] += t[i] * (3.0 * r[j] * r[l] * inv5 - delta);
                    }
                }
            }
        }
        out.write_point(p, pre, &a, &da, &d2a);
    }
    out
}

/// Adjoint of the unit-current B with respect to the samples:
/// `(∂/∂γ_k, ∂/∂γ'_k)` of `Σ_p v_p·B_p`.
fn b_vjp_samples(points: &Array2<f64>, coil: &CoilSamples, v: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
    let nq = coil.gamma.nrows();
    let pre = coil.prefactor();
    let mut d_gamma = Array2::zeros((nq, 3));
    let mut d_dash = Array2::zeros((nq, 3));
    for k in 0..nq {
        let (g, t) = coil.point(k);
        let mut acc_g = [0.0; 3];
        let mut acc_t = [0.0; 3];
        for p in 0..points.nrows() {
            let vp = vec3(v.row(p));
            let r = sub(vec3(points.row(p)), g);
            let d2 = dot(r, r);
            let inv3 = 1.0 / (d2 * d2.sqrt());
            let inv5 = inv3 / d2;
            let rxv = cross(r, vp);
            let vxt = cross(vp, t);
            let s = dot(vp, cross(t, r));
            for i in 0..3 {
                acc_t[i] += rxv[i] * inv3;
                acc_g[i] += -vxt[i] * inv3 + 3.0 * s * r[i] * inv5;
            }
        }
        for i in 0..3 {
            d_gamma[[k, i]] = pre * acc_g[i];
            d_dash[[k, i]] = pre * acc_t[i];
        }
    }
    (d_gamma, d_dash)
}

/// Adjoint of the unit-current dB: `(∂/∂γ_k, ∂/∂γ'_k)` of
/// `Σ_p Σ_ji W_p[j][i] ∂_j B_i`.
fn db_vjp_samples(points: &Array2<f64>, coil: &CoilSamples, vgrad: &Array3<f64>) -> (Array2<f64>, Array2<f64>) {
    let nq = coil.gamma.nrows();
    let pre = coil.prefactor();
    let mut d_gamma = Array2::zeros((nq, 3));
    let mut d_dash = Array2::zeros((nq, 3));
    for k in 0..nq {
        let (g, t) = coil.point(k);
        let mut acc_g = [0.0; 3];
        let mut acc_t = [0.0; 3];
        for p in 0..points.nrows() {
            let w = |j: usize, i: usize| vgrad[[p, j, i]];
            let r = sub(vec3(points.row(p)), g);
            let d2 = dot(r, r);
            let inv3 = 1.0 / (d2 * d2.sqrt());
            let inv5 = inv3 / d2;
            let inv7 = inv5 / d2;
            // axial vector of W and u = Wᵀ r
            let wax = [w(1, 2) - w(2, 1), w(2, 0) - w(0, 2), w(0, 1) - w(1, 0)];
            let u = [
                w(0, 0) * r[0] + w(1, 0) * r[1] + w(2, 0) * r[2],
                w(0, 1) * r[0] + w(1, 1) * r[1] + w(2, 1) * r[2],
                w(0, 2) * r[0] + w(1, 2) * r[1] + w(2, 2) * r[2],
            ];
            let txr = cross(t, r);
            let gval = dot(u, txr);
            let tw = dot(t, wax);
            let rxu = cross(r, u);
            let uxt = cross(u, t);
            let wtxr = [
                w(0, 0) * txr[0] + w(0, 1) * txr[1] + w(0, 2) * txr[2],
                w(1, 0) * txr[0] + w(1, 1) * txr[1] + w(1, 2) * txr[2],
                w(2, 0) * txr[0] + w(2, 1) * txr[1] + w(2, 2) * txr[2],
            ];
            for i in 0..3 {
                acc_t[i] += wax[i] * inv3 - 3.0 * rxu[i] * inv5;
                let d_r = -3.0 * tw * r[i] * inv5 - 3.0 * (wtxr[i] + uxt[i]) * inv5
                    + 15.0 * gval * r[i] * inv7;
                acc_g[i] -= d_r;
            }
        }
        for i in 0..3 {
            d_gamma[[k, i]] = pre * acc_g[i];
            d_dash[[k, i]] = pre * acc_t[i];
        }
    }
    (d_gamma, d_dash)
}

/// Adjoint of the unit-current A: `(∂/∂γ_k, ∂/∂γ'_k)` of `Σ_p v_p·A_p`.
fn a_vjp_samples(points: &Array2<f64>, coil: &CoilSamples, v: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
    let nq = coil.gamma.nrows();
    let pre = coil.prefactor();
    let mut d_gamma = Array2::zeros((nq, 3));
    let mut d_dash = Array2::zeros((nq, 3));
    for k in 0..nq {
        let (g, t) = coil.point(k);
        let mut acc_g = [0.0; 3];
        let mut acc_t = [0.0; 3];
        for p in 0..points.nrows() {
            let vp = vec3(v.row(p));
            let r = sub(vec3(points.row(p)), g);
            let d2 = dot(r, r);
            let inv1 = 1.0 / d2.sqrt();
            let inv3 = inv1 / d2;
            let vt = dot(vp, t);
            for i in 0..3 {
                acc_t[i] += vp[i] * inv1;
                acc_g[i] += vt * r[i] * inv3;
            }
        }
        for i in 0..3 {
            d_gamma[[k, i]] = pre * acc_g[i];
            d_dash[[k, i]] = pre * acc_t[i];
        }
    }
    (d_gamma, d_dash)
}

/// `Σ_p Σ_i v[p, i] · f[p, i]` for any matching shapes.
fn contract<D: ndarray::Dimension>(v: &ndarray::Array<f64, D>, f: &ndarray::Array<f64, D>) -> f64 {
    v.iter().zip(f.iter()).map(|(a, b)| a * b).sum()
}

/// Per-coil unit-current fields behind the superposed cache.
#[derive(Debug, Default)]
struct UnitFields {
    b: Option<Vec<FieldDerivatives>>,
    a: Option<Vec<FieldDerivatives>>,
}

/// Biot-Savart evaluator over an ordered list of shared coils.
///
/// The cache tracks the coil dofs it was computed for, so changing a coil
/// through its handle invalidates the evaluator on the next access.
#[derive(Debug)]
pub struct BiotSavart {
    coils: Vec<CoilHandle>,
    points: Array2<f64>,
    cache: FieldCache,
    unit: UnitFields,
    coil_state: Vec<f64>,
}

impl BiotSavart {
    pub fn new(coils: Vec<CoilHandle>) -> Self {
        let mut bs = BiotSavart {
            coils,
            points: Array2::zeros((0, 3)),
            cache: FieldCache::default(),
            unit: UnitFields::default(),
            coil_state: Vec::new(),
        };
        bs.coil_state = bs.snapshot();
        bs
    }

    pub fn coils(&self) -> &[CoilHandle] {
        &self.coils
    }

    /// Cache generation; bumped whenever points or coils change.
    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }

    fn snapshot(&self) -> Vec<f64> {
        self.coils
            .iter()
            .flat_map(|c| c.borrow().get_dofs().to_vec())
            .collect()
    }

    fn refresh(&mut self) {
        let state = self.snapshot();
        if state != self.coil_state {
            self.coil_state = state;
            self.invalidate_cache();
        }
    }

    fn samples(&self) -> Vec<CoilSamples> {
        self.coils
            .iter()
            .map(|c| {
                let c = c.borrow();
                CoilSamples {
                    gamma: c.curve.gamma(),
                    gammadash: c.curve.gammadash(),
                }
            })
            .collect()
    }

    fn currents(&self) -> Array1<f64> {
        self.coils.iter().map(|c| c.borrow().current).collect()
    }

    fn unit_b_fields(&mut self, order: usize) -> StellResult<&[FieldDerivatives]> {
        if order > 2 {
            return Err(StellError::ConfigError(format!(
                "Biot-Savart B derivative order {order} not supported (max 2)"
            )));
        }
        self.refresh();
        let stale = self.unit.b.as_ref().map_or(true, |v| v.iter().any(|f| f.order() < order));
        if stale {
            debug!(coils = self.coils.len(), points = self.points.nrows(), order, "biot-savart B");
            let fields = self
                .samples()
                .iter()
                .map(|s| unit_b(&self.points, s, order))
                .collect();
            self.unit.b = Some(fields);
        }
        self.unit
            .b
            .as_deref()
            .ok_or_else(|| StellError::ConfigError("unit B fields missing".to_string()))
    }

    fn unit_a_fields(&mut self, order: usize) -> StellResult<&[FieldDerivatives]> {
        if order > 2 {
            return Err(StellError::ConfigError(format!(
                "Biot-Savart A derivative order {order} not supported (max 2)"
            )));
        }
        self.refresh();
        let stale = self.unit.a.as_ref().map_or(true, |v| v.iter().any(|f| f.order() < order));
        if stale {
            debug!(coils = self.coils.len(), points = self.points.nrows(), order, "biot-savart A");
            let fields = self
                .samples()
                .iter()
                .map(|s| unit_a(&self.points, s, order))
                .collect();
            self.unit.a = Some(fields);
        }
        self.unit
            .a
            .as_deref()
            .ok_or_else(|| StellError::ConfigError("unit A fields missing".to_string()))
    }

    fn superpose(npts: usize, order: usize, unit: &[FieldDerivatives], currents: &Array1<f64>) -> FieldDerivatives {
        let mut total = FieldDerivatives::zeros(npts, order);
        for (field, &current) in unit.iter().zip(currents.iter()) {
            total.add_scaled(field, current);
        }
        total
    }

    fn total_b(&mut self, order: usize) -> StellResult<&FieldDerivatives> {
        self.unit_b_fields(order)?;
        let currents = self.currents();
        let npts = self.points.nrows();
        let unit = self
            .unit
            .b
            .as_deref()
            .ok_or_else(|| StellError::ConfigError("unit B fields missing".to_string()))?;
        self.cache
            .b_or_compute(order, |o| Ok(Self::superpose(npts, o, unit, &currents)))
    }

    fn total_a(&mut self, order: usize) -> StellResult<&FieldDerivatives> {
        self.unit_a_fields(order)?;
        let currents = self.currents();
        let npts = self.points.nrows();
        let unit = self
            .unit
            .a
            .as_deref()
            .ok_or_else(|| StellError::ConfigError("unit A fields missing".to_string()))?;
        self.cache
            .a_or_compute(order, |o| Ok(Self::superpose(npts, o, unit, &currents)))
    }

    /// `∂B/∂I_c` for each coil: the unit-current fields, shape (n, 3).
    pub fn db_by_dcoilcurrents(&mut self) -> StellResult<Vec<Array2<f64>>> {
        Ok(self.unit_b_fields(0)?.iter().map(|f| f.value.clone()).collect())
    }

    /// `∂(dB)/∂I_c` for each coil, shape (n, 3, 3).
    pub fn d2b_by_dxdcoilcurrents(&mut self) -> StellResult<Vec<Array3<f64>>> {
        self.unit_b_fields(1)?
            .iter()
            .map(|f| f.gradient().cloned())
            .collect()
    }

    /// `∂(d2B)/∂I_c` for each coil, shape (n, 3, 3, 3).
    pub fn d3b_by_dxdxdcoilcurrents(&mut self) -> StellResult<Vec<Array4<f64>>> {
        self.unit_b_fields(2)?
            .iter()
            .map(|f| f.hessian().cloned())
            .collect()
    }

    fn check_weights(&self, what: &str, rows: usize) -> StellResult<()> {
        if rows != self.points.nrows() {
            return Err(StellError::dimension(what, self.points.nrows(), rows));
        }
        Ok(())
    }

    /// Map sample adjoints through each curve and scale by its current.
    fn curve_gradients(&self, per_coil: Vec<(Array2<f64>, Array2<f64>)>) -> Vec<Array1<f64>> {
        self.coils
            .iter()
            .zip(per_coil)
            .map(|(coil, (d_gamma, d_dash))| {
                let c = coil.borrow();
                let g = c.curve.dgamma_by_dcoeff_vjp(&d_gamma) + c.curve.dgammadash_by_dcoeff_vjp(&d_dash);
                g * c.current
            })
            .collect()
    }
}

impl MagneticField for BiotSavart {
    fn set_points(&mut self, points: &Array2<f64>) -> StellResult<()> {
        check_points(points)?;
        self.points = points.clone();
        self.invalidate_cache();
        Ok(())
    }

    fn points(&self) -> &Array2<f64> {
        &self.points
    }

    fn b(&mut self) -> StellResult<Array2<f64>> {
        Ok(self.total_b(0)?.value.clone())
    }

    fn db_by_dx(&mut self) -> StellResult<Array3<f64>> {
        Ok(self.total_b(1)?.gradient()?.clone())
    }

    fn d2b_by_dxdx(&mut self) -> StellResult<Array4<f64>> {
        Ok(self.total_b(2)?.hessian()?.clone())
    }

    fn a(&mut self) -> StellResult<Array2<f64>> {
        Ok(self.total_a(0)?.value.clone())
    }

    fn da_by_dx(&mut self) -> StellResult<Array3<f64>> {
        Ok(self.total_a(1)?.gradient()?.clone())
    }

    fn d2a_by_dxdx(&mut self) -> StellResult<Array4<f64>> {
        Ok(self.total_a(2)?.hessian()?.clone())
    }

    fn invalidate_cache(&mut self) {
        self.cache.invalidate();
        self.unit = UnitFields::default();
    }

    /// `μ0 Σ|I|`.
    fn g0(&self) -> f64 {
        MU0 * self.coils.iter().map(|c| c.borrow().current.abs()).sum::<f64>()
    }

    fn num_coils(&self) -> usize {
        self.coils.len()
    }

    fn coil_currents(&self) -> StellResult<Array1<f64>> {
        Ok(self.currents())
    }

    fn b_vjp(&mut self, v: &Array2<f64>) -> StellResult<CoilGradient> {
        self.check_weights("b_vjp weights", v.nrows())?;
        let currents: Array1<f64> = self.unit_b_fields(0)?.iter().map(|f| contract(v, &f.value)).collect();
        let per_coil = self
            .samples()
            .iter()
            .map(|s| b_vjp_samples(&self.points, s, v))
            .collect();
        Ok(CoilGradient {
            curves: self.curve_gradients(per_coil),
            currents,
        })
    }

    fn b_and_db_vjp(
        &mut self,
        v: &Array2<f64>,
        vgrad: &Array3<f64>,
    ) -> StellResult<(CoilGradient, CoilGradient)> {
        self.check_weights("b_and_db_vjp weights", vgrad.dim().0)?;
        let from_b = self.b_vjp(v)?;
        let mut currents = Array1::zeros(self.coils.len());
        for (c, f) in self.unit_b_fields(1)?.iter().enumerate() {
            currents[c] = contract(vgrad, f.gradient()?);
        }
        let per_coil = self
            .samples()
            .iter()
            .map(|s| db_vjp_samples(&self.points, s, vgrad))
            .collect();
        let from_db = CoilGradient {
            curves: self.curve_gradients(per_coil),
            currents,
        };
        Ok((from_b, from_db))
    }

    fn a_vjp(&mut self, v: &Array2<f64>) -> StellResult<CoilGradient> {
        self.check_weights("a_vjp weights", v.nrows())?;
        let currents: Array1<f64> = self.unit_a_fields(0)?.iter().map(|f| contract(v, &f.value)).collect();
        let per_coil = self
            .samples()
            .iter()
            .map(|s| a_vjp_samples(&self.points, s, v))
            .collect();
        Ok(CoilGradient {
            curves: self.curve_gradients(per_coil),
            currents,
        })
    }
}

/// `|B|` at each row of `b`.
pub fn field_strength(b: &Array2<f64>) -> Array1<f64> {
    b.rows().into_iter().map(|r: ArrayView1<'_, f64>| dot(vec3(r), vec3(r)).sqrt()).collect()
}
