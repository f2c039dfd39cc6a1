// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Line Search
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Backtracking Armijo line search.

use super::objective::Objective;
use ndarray::Array1;
use stell_types::error::StellResult;

/// Sufficient-decrease parameters.
#[derive(Debug, Clone)]
pub struct ArmijoParams {
    /// Sufficient decrease constant in (0, 1).
    pub c: f64,
    /// Backtracking contraction factor in (0, 1).
    pub rho: f64,
    pub alpha_init: f64,
    pub alpha_min: f64,
}

impl Default for ArmijoParams {
    fn default() -> Self {
        ArmijoParams {
            c: 1e-4,
            rho: 0.5,
            alpha_init: 1.0,
            alpha_min: 1e-16,
        }
    }
}

/// Accepted step.
#[derive(Debug, Clone)]
pub struct LineSearchResult {
    pub alpha: f64,
    pub x: Array1<f64>,
    pub value: f64,
    pub gradient: Array1<f64>,
    pub evals: usize,
}

/// Backtrack from `alpha_init` until `f(x + αd) <= f(x) + c·α·∇f·d`.
///
/// Returns `Ok(None)` when `d` is not a descent direction or no step above
/// `alpha_min` is accepted. Non-finite trial values count as rejections.
pub fn backtracking_armijo<O: Objective>(
    obj: &mut O,
    x: &Array1<f64>,
    d: &Array1<f64>,
    f_x: f64,
    grad_x: &Array1<f64>,
    params: &ArmijoParams,
) -> StellResult<Option<LineSearchResult>> {
    let slope = grad_x.dot(d);
    if !(slope < 0.0) {
        return Ok(None);
    }

    let mut alpha = params.alpha_init;
    let mut evals = 0;
    while alpha >= params.alpha_min {
        let x_trial = x + &(d * alpha);
        let (f_trial, g_trial) = obj.eval_grad(&x_trial)?;
        evals += 1;
        if f_trial.is_finite() && f_trial <= f_x + params.c * alpha * slope {
            return Ok(Some(LineSearchResult {
                alpha,
                x: x_trial,
                value: f_trial,
                gradient: g_trial,
                evals,
            }));
        }
        alpha *= params.rho;
    }
    Ok(None)
}
