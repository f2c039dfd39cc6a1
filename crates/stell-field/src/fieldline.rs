// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Field-Line Tracing
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Field-line tracing in any [`MagneticField`].
//!
//! Integrates `dx/ds = B/|B|` in arc length `s` with RK4 and step-doubling
//! error control. Crossings of the toroidal planes `φ = phis[k]` are
//! located on the cubic Hermite interpolant of each accepted step, which
//! keeps Poincaré sections accurate to the integration order.

use crate::field::MagneticField;
use ndarray::Array2;
use stell_geo::vector::{add, norm, scale, sub, Vec3};
use stell_types::constants::TWO_PI;
use stell_types::error::{StellError, StellResult};
use tracing::{debug, info};

/// Smallest step the error control may shrink to.
const MIN_STEP: f64 = 1e-12;

/// Bisection iterations when locating a plane crossing.
const CROSSING_BISECTIONS: usize = 60;

/// Condition that ends a trace before `smax`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoppingCriterion {
    /// Accepted-step cap.
    MaxSteps(usize),
    /// Leaves `r_min <= R <= r_max, |z| <= z_max`.
    OutsideCylinder { r_min: f64, r_max: f64, z_max: f64 },
}

impl StoppingCriterion {
    fn triggered(&self, steps: usize, x: Vec3) -> bool {
        match *self {
            StoppingCriterion::MaxSteps(n) => steps >= n,
            StoppingCriterion::OutsideCylinder { r_min, r_max, z_max } => {
                let r = x[0].hypot(x[1]);
                r < r_min || r > r_max || x[2].abs() > z_max
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldlineConfig {
    /// Local error tolerance per step (infinity norm, in length units).
    pub tol: f64,
    pub initial_step: f64,
    pub max_step: f64,
    /// Toroidal angles of the Poincaré planes, in radians.
    pub phis: Vec<f64>,
    pub stopping_criteria: Vec<StoppingCriterion>,
}

impl Default for FieldlineConfig {
    fn default() -> Self {
        FieldlineConfig {
            tol: 1e-9,
            initial_step: 1e-3,
            max_step: 0.1,
            phis: Vec::new(),
            stopping_criteria: Vec::new(),
        }
    }
}

impl FieldlineConfig {
    pub fn validate(&self) -> StellResult<()> {
        if !self.tol.is_finite() || self.tol <= 0.0 {
            return Err(StellError::ConfigError(format!(
                "fieldline tol must be finite and > 0, got {}",
                self.tol
            )));
        }
        if !(self.initial_step > 0.0 && self.max_step >= self.initial_step && self.max_step.is_finite()) {
            return Err(StellError::ConfigError(format!(
                "fieldline steps need 0 < initial_step <= max_step, got {} and {}",
                self.initial_step, self.max_step
            )));
        }
        if self.phis.iter().any(|p| !p.is_finite()) {
            return Err(StellError::ConfigError("fieldline phis must be finite".to_string()));
        }
        Ok(())
    }
}

/// Crossing of a toroidal plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneHit {
    /// Arc length at the crossing.
    pub s: f64,
    /// Index into `FieldlineConfig::phis`.
    pub plane: usize,
    pub point: Vec3,
}

/// Why a trace ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldlineStop {
    /// Reached the requested arc length.
    Completed,
    /// Stopped by `stopping_criteria[i]`.
    Criterion(usize),
}

#[derive(Debug, Clone)]
pub struct FieldlineTrace {
    /// `(s, x)` at the start and after every accepted step.
    pub path: Vec<(f64, Vec3)>,
    pub hits: Vec<PlaneHit>,
    pub stop: FieldlineStop,
}

/// Unit tangent `B/|B|` at `x`.
fn unit_tangent<F: MagneticField>(field: &mut F, x: Vec3, step: usize) -> StellResult<Vec3> {
    let mut pts = Array2::zeros((1, 3));
    for (i, v) in x.iter().enumerate() {
        pts[[0, i]] = *v;
    }
    field.set_points(&pts)?;
    let b = field.b()?;
    let bv = [b[[0, 0]], b[[0, 1]], b[[0, 2]]];
    let bn = norm(bv);
    if !bn.is_finite() || bn == 0.0 {
        return Err(StellError::SolverDiverged {
            iteration: step,
            message: format!("field line reached |B| = {bn} at {x:?}"),
        });
    }
    Ok(scale(bv, 1.0 / bn))
}

/// Unit tangent along the trace direction `sign`.
fn heading<F: MagneticField>(field: &mut F, x: Vec3, sign: f64, step: usize) -> StellResult<Vec3> {
    Ok(scale(unit_tangent(field, x, step)?, sign))
}

fn rk4<F: MagneticField>(field: &mut F, x: Vec3, k1: Vec3, h: f64, sign: f64, step: usize) -> StellResult<Vec3> {
    let k2 = heading(field, add(x, scale(k1, 0.5 * h)), sign, step)?;
    let k3 = heading(field, add(x, scale(k2, 0.5 * h)), sign, step)?;
    let k4 = heading(field, add(x, scale(k3, h)), sign, step)?;
    let incr = add(add(k1, scale(k2, 2.0)), add(scale(k3, 2.0), k4));
    Ok(add(x, scale(incr, h / 6.0)))
}

fn max_abs(v: Vec3) -> f64 {
    v.iter().fold(0.0_f64, |acc, c| acc.max(c.abs()))
}

/// One accepted step: end points and tangents over arc length `h`.
struct Step {
    x0: Vec3,
    d0: Vec3,
    x1: Vec3,
    d1: Vec3,
    h: f64,
}

impl Step {
    /// Cubic Hermite position at fraction `tau` of the step.
    fn at(&self, tau: f64) -> Vec3 {
        let t2 = tau * tau;
        let t3 = t2 * tau;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + tau;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        add(
            add(scale(self.x0, h00), scale(self.d0, h10 * self.h)),
            add(scale(self.x1, h01), scale(self.d1, h11 * self.h)),
        )
    }

    /// Fraction at which the azimuth, unwrapped from `phi0` towards
    /// `phi1`, reaches `angle`.
    fn crossing(&self, phi0: f64, phi1: f64, angle: f64) -> f64 {
        let rising = phi1 >= phi0;
        let (mut lo, mut hi) = (0.0, 1.0);
        for _ in 0..CROSSING_BISECTIONS {
            let mid = 0.5 * (lo + hi);
            let phi_mid = unwrap_near(azimuth(self.at(mid)), phi0);
            if (phi_mid < angle) == rising {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }
}

/// `a` shifted by a multiple of 2π to lie within π of `reference`.
fn unwrap_near(a: f64, reference: f64) -> f64 {
    a + TWO_PI * ((reference - a) / TWO_PI).round()
}

fn azimuth(x: Vec3) -> f64 {
    x[1].atan2(x[0])
}

/// Trace the field line through `start` for arc length `smax`.
///
/// Negative `smax` traces against the field.
pub fn trace_fieldline<F: MagneticField>(
    field: &mut F,
    start: Vec3,
    smax: f64,
    config: &FieldlineConfig,
) -> StellResult<FieldlineTrace> {
    config.validate()?;
    if !smax.is_finite() || smax == 0.0 {
        return Err(StellError::ConfigError(format!(
            "fieldline arc length must be finite and non-zero, got {smax}"
        )));
    }
    let sign = smax.signum();
    let length = smax.abs();

    let mut x = start;
    let mut s = 0.0;
    let mut h = config.initial_step;
    let mut phi = azimuth(x);
    let mut d = heading(field, x, sign, 0)?;
    let mut path = vec![(0.0, x)];
    let mut hits = Vec::new();
    let mut steps = 0;
    let mut stop = FieldlineStop::Completed;

    while s < length {
        h = h.min(length - s);
        let full = rk4(field, x, d, h, sign, steps)?;
        let mid = rk4(field, x, d, 0.5 * h, sign, steps)?;
        let d_mid = heading(field, mid, sign, steps)?;
        let fine = rk4(field, mid, d_mid, 0.5 * h, sign, steps)?;
        let diff = sub(fine, full);
        let err = max_abs(diff) / 15.0;
        if !err.is_finite() {
            return Err(StellError::SolverDiverged {
                iteration: steps,
                message: "non-finite field-line step".to_string(),
            });
        }

        if err > config.tol && h > MIN_STEP {
            h = (h * (0.9 * (config.tol / err).powf(0.2)).max(0.2)).max(MIN_STEP);
            continue;
        }

        // Richardson extrapolation of the two half steps.
        let x1 = add(fine, scale(diff, 1.0 / 15.0));
        let step = Step {
            x0: x,
            d0: d,
            x1,
            d1: heading(field, x1, sign, steps)?,
            h,
        };
        let phi_new = unwrap_near(azimuth(step.x1), phi);
        for (plane, &target) in config.phis.iter().enumerate() {
            let lo = ((phi.min(phi_new) - target) / TWO_PI).ceil();
            let hi = ((phi.max(phi_new) - target) / TWO_PI).floor();
            let mut k = lo;
            while k <= hi {
                let tau = step.crossing(phi, phi_new, target + TWO_PI * k);
                hits.push(PlaneHit {
                    s: sign * (s + tau * h),
                    plane,
                    point: step.at(tau),
                });
                k += 1.0;
            }
        }

        s += h;
        steps += 1;
        x = step.x1;
        d = step.d1;
        phi = phi_new;
        path.push((sign * s, x));

        let grow = if err > 0.0 {
            (0.9 * (config.tol / err).powf(0.2)).min(5.0)
        } else {
            5.0
        };
        h = (h * grow).min(config.max_step);

        if let Some(i) = config
            .stopping_criteria
            .iter()
            .position(|c| c.triggered(steps, x))
        {
            stop = FieldlineStop::Criterion(i);
            break;
        }
    }
    hits.sort_by(|a, b| a.s.abs().total_cmp(&b.s.abs()));

    debug!(steps, hits = hits.len(), "fieldline traced");
    info!(arc_length = sign * s, steps, ?stop, "fieldline trace finished");
    Ok(FieldlineTrace { path, hits, stop })
}
