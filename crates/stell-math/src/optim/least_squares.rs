// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Levenberg-Marquardt
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Levenberg-Marquardt for `min ½‖r(x)‖²`.
//!
//! Damped normal equations `(JᵀJ + μ D) h = -Jᵀr` with Marquardt's
//! diagonal scaling `D = diag(JᵀJ)` and Nielsen's gain-ratio damping
//! update.

use super::objective::LeastSquaresProblem;
use super::result::{inf_norm, OptimResult, TerminationReason};
use crate::linalg::lu_solve;
use ndarray::{Array1, Array2};
use stell_types::error::{StellError, StellResult};
use tracing::debug;

/// Smallest diagonal entry used for scaling (guards all-zero columns).
const MIN_SCALE: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct LevenbergMarquardtConfig {
    pub max_iter: usize,
    /// Relative cost reduction.
    pub ftol: f64,
    /// Relative step size.
    pub xtol: f64,
    /// Infinity norm of `Jᵀr`.
    pub gtol: f64,
    /// Initial damping relative to `max diag(JᵀJ)`.
    pub tau: f64,
}

impl Default for LevenbergMarquardtConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            ftol: 1e-8,
            xtol: 1e-8,
            gtol: 1e-8,
            tau: 1e-3,
        }
    }
}

impl LevenbergMarquardtConfig {
    /// Same tolerance on cost, step and gradient.
    pub fn with_tolerance(tol: f64, max_iter: usize) -> Self {
        Self {
            max_iter,
            ftol: tol,
            xtol: tol,
            gtol: tol,
            ..Self::default()
        }
    }
}

/// Minimise `½‖r(x)‖²` from `x0`. `value` in the result is the final cost.
pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &mut P,
    x0: &Array1<f64>,
    config: &LevenbergMarquardtConfig,
) -> StellResult<OptimResult> {
    if config.max_iter == 0 {
        return Err(StellError::ConfigError(
            "levenberg_marquardt needs max_iter >= 1".to_string(),
        ));
    }
    if x0.len() != problem.dim() {
        return Err(StellError::dimension("levenberg_marquardt initial point", problem.dim(), x0.len()));
    }

    let mut x = x0.clone();
    let (mut r, mut jac) = problem.residual_jacobian(&x)?;
    let mut func_evals = 1;
    let mut cost = 0.5 * r.dot(&r);
    let mut jtj = jac.t().dot(&jac);
    let mut grad = jac.t().dot(&r);
    let max_diag = (0..jtj.nrows()).fold(0.0_f64, |acc, i| acc.max(jtj[[i, i]]));
    let mut mu = config.tau * max_diag.max(MIN_SCALE);
    let mut nu = 2.0;

    let mut termination = TerminationReason::MaxIterations;
    let mut iterations = config.max_iter;

    for iter in 0..config.max_iter {
        if !cost.is_finite() {
            termination = TerminationReason::NumericalError;
            iterations = iter;
            break;
        }
        if inf_norm(&grad) <= config.gtol {
            termination = TerminationReason::GradientNorm;
            iterations = iter;
            break;
        }

        let scale: Array1<f64> = (0..jtj.nrows()).map(|i| jtj[[i, i]].max(MIN_SCALE)).collect();
        let mut lhs: Array2<f64> = jtj.clone();
        for i in 0..lhs.nrows() {
            lhs[[i, i]] += mu * scale[i];
        }
        let h = lu_solve(&lhs, &grad.mapv(|g| -g))?;

        let h_norm = h.dot(&h).sqrt();
        let x_norm = x.dot(&x).sqrt();
        if h_norm <= config.xtol * (config.xtol + x_norm) {
            termination = TerminationReason::StepSize;
            iterations = iter;
            break;
        }

        let x_new = &x + &h;
        let r_new = problem.residual(&x_new)?;
        func_evals += 1;
        let cost_new = 0.5 * r_new.dot(&r_new);
        // L(0) - L(h) = ½ hᵀ(μ D h - Jᵀr)
        let predicted = 0.5 * (&h * &scale * mu - &grad).dot(&h);
        let actual = cost - cost_new;
        let gain = if predicted > 0.0 { actual / predicted } else { -1.0 };

        debug!(iteration = iter, cost, cost_new, mu, gain, "levenberg-marquardt step");

        if cost_new.is_finite() && gain > 0.0 {
            x = x_new;
            let (r_acc, jac_acc) = problem.residual_jacobian(&x)?;
            func_evals += 1;
            r = r_acc;
            jac = jac_acc;
            let cost_prev = cost;
            cost = 0.5 * r.dot(&r);
            jtj = jac.t().dot(&jac);
            grad = jac.t().dot(&r);
            mu *= (1.0 - (2.0 * gain - 1.0).powi(3)).max(1.0 / 3.0);
            nu = 2.0;
            if actual <= config.ftol * cost_prev {
                termination = TerminationReason::FunctionChange;
                iterations = iter + 1;
                break;
            }
        } else {
            mu *= nu;
            nu *= 2.0;
        }
    }

    let gradient_norm = inf_norm(&grad);
    Ok(OptimResult {
        x,
        value: cost,
        gradient: grad,
        gradient_norm,
        iterations,
        func_evals,
        termination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Exponential decay fit y = a·exp(-b t) with exact data a=2, b=0.5.
    struct DecayFit {
        t: Vec<f64>,
        y: Vec<f64>,
    }

    impl DecayFit {
        fn new() -> Self {
            let t: Vec<f64> = (0..12).map(|i| i as f64 * 0.5).collect();
            let y = t.iter().map(|&ti| 2.0 * (-0.5 * ti).exp()).collect();
            Self { t, y }
        }
    }

    impl LeastSquaresProblem for DecayFit {
        fn dim(&self) -> usize {
            2
        }
        fn residual(&mut self, x: &Array1<f64>) -> StellResult<Array1<f64>> {
            Ok(self
                .t
                .iter()
                .zip(self.y.iter())
                .map(|(&t, &y)| x[0] * (-x[1] * t).exp() - y)
                .collect())
        }
        fn residual_jacobian(&mut self, x: &Array1<f64>) -> StellResult<(Array1<f64>, Array2<f64>)> {
            let r = self.residual(x)?;
            let mut jac = Array2::zeros((self.t.len(), 2));
            for (i, &t) in self.t.iter().enumerate() {
                let e = (-x[1] * t).exp();
                jac[[i, 0]] = e;
                jac[[i, 1]] = -x[0] * t * e;
            }
            Ok((r, jac))
        }
    }

    #[test]
    fn test_lm_recovers_decay_parameters() {
        let config = LevenbergMarquardtConfig::with_tolerance(1e-12, 200);
        let result = levenberg_marquardt(&mut DecayFit::new(), &array![1.0, 1.5], &config)
            .expect("run");
        assert!(result.success(), "termination: {}", result.termination);
        assert!((result.x[0] - 2.0).abs() < 1e-6, "a = {}", result.x[0]);
        assert!((result.x[1] - 0.5).abs() < 1e-6, "b = {}", result.x[1]);
        assert!(result.value < 1e-12);
    }

    #[test]
    fn test_lm_cost_never_increases() {
        let mut problem = DecayFit::new();
        let x0 = array![0.3, 3.0];
        let r0 = problem.residual(&x0).expect("residual");
        let config = LevenbergMarquardtConfig::with_tolerance(1e-14, 3);
        let result = levenberg_marquardt(&mut problem, &x0, &config).expect("run");
        assert!(result.value <= 0.5 * r0.dot(&r0));
    }
}
