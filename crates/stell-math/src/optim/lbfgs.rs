// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — L-BFGS
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Limited-memory BFGS with two-loop recursion and Armijo backtracking.

use super::line_search::{backtracking_armijo, ArmijoParams};
use super::objective::Objective;
use super::result::{inf_norm, relative_change, ConvergenceParams, OptimResult, TerminationReason};
use ndarray::Array1;
use std::collections::VecDeque;
use stell_types::error::{StellError, StellResult};
use tracing::{debug, warn};

/// Configuration for the L-BFGS solver.
#[derive(Debug, Clone)]
pub struct LbfgsConfig {
    /// Number of recent (s, y) pairs to store.
    pub memory: usize,
    pub convergence: ConvergenceParams,
    pub line_search: ArmijoParams,
}

impl Default for LbfgsConfig {
    fn default() -> Self {
        LbfgsConfig {
            memory: 10,
            convergence: ConvergenceParams::default(),
            line_search: ArmijoParams::default(),
        }
    }
}

/// Minimise `obj` from `x0`.
///
/// Curvature pairs with `sᵀy <= 0` are skipped. Without history the first
/// direction is the steepest descent scaled to unit length.
pub fn lbfgs<O: Objective>(
    obj: &mut O,
    x0: &Array1<f64>,
    config: &LbfgsConfig,
) -> StellResult<OptimResult> {
    if config.memory == 0 || config.convergence.max_iter == 0 {
        return Err(StellError::ConfigError(
            "lbfgs needs memory >= 1 and max_iter >= 1".to_string(),
        ));
    }
    if x0.len() != obj.dim() {
        return Err(StellError::dimension("lbfgs initial point", obj.dim(), x0.len()));
    }

    let mut x = x0.clone();
    let (mut f_val, mut grad) = obj.eval_grad(&x)?;
    let mut func_evals = 1;
    let finish = |x: Array1<f64>, value: f64, gradient: Array1<f64>, iterations, func_evals, termination| {
        let gradient_norm = inf_norm(&gradient);
        OptimResult {
            x,
            value,
            gradient,
            gradient_norm,
            iterations,
            func_evals,
            termination,
        }
    };

    if !f_val.is_finite() {
        return Ok(finish(x, f_val, grad, 0, func_evals, TerminationReason::NumericalError));
    }
    if inf_norm(&grad) <= config.convergence.grad_tol {
        return Ok(finish(x, f_val, grad, 0, func_evals, TerminationReason::GradientNorm));
    }

    let mut history: VecDeque<(Array1<f64>, Array1<f64>, f64)> =
        VecDeque::with_capacity(config.memory);

    for iter in 0..config.convergence.max_iter {
        let mut d = two_loop_recursion(&grad, &history);
        if history.is_empty() {
            let g_norm = grad.dot(&grad).sqrt();
            if g_norm > 1.0 {
                d /= g_norm;
            }
        }

        let ls = match backtracking_armijo(obj, &x, &d, f_val, &grad, &config.line_search)? {
            Some(ls) => ls,
            None if !history.is_empty() => {
                // Stale curvature information; restart from steepest descent.
                history.clear();
                continue;
            }
            None => {
                warn!(iteration = iter, value = f_val, "lbfgs line search failed");
                return Ok(finish(
                    x,
                    f_val,
                    grad,
                    iter,
                    func_evals,
                    TerminationReason::LineSearchFailed,
                ));
            }
        };
        func_evals += ls.evals;

        let s = &ls.x - &x;
        let y = &ls.gradient - &grad;
        let f_prev = f_val;
        x = ls.x;
        f_val = ls.value;
        grad = ls.gradient;

        let sy = s.dot(&y);
        let step_norm = s.dot(&s).sqrt();
        if sy > 0.0 {
            if history.len() == config.memory {
                history.pop_front();
            }
            history.push_back((s, y, 1.0 / sy));
        }

        let g_inf = inf_norm(&grad);
        debug!(iteration = iter, value = f_val, grad_inf = g_inf, alpha = ls.alpha, "lbfgs step");

        if g_inf <= config.convergence.grad_tol {
            return Ok(finish(x, f_val, grad, iter + 1, func_evals, TerminationReason::GradientNorm));
        }
        if step_norm < config.convergence.step_tol {
            return Ok(finish(x, f_val, grad, iter + 1, func_evals, TerminationReason::StepSize));
        }
        if config.convergence.func_tol > 0.0
            && relative_change(f_prev, f_val) <= config.convergence.func_tol
        {
            return Ok(finish(
                x,
                f_val,
                grad,
                iter + 1,
                func_evals,
                TerminationReason::FunctionChange,
            ));
        }
    }

    Ok(finish(
        x,
        f_val,
        grad,
        config.convergence.max_iter,
        func_evals,
        TerminationReason::MaxIterations,
    ))
}

/// Two-loop recursion: `d = -H_k g_k`.
fn two_loop_recursion(
    grad: &Array1<f64>,
    history: &VecDeque<(Array1<f64>, Array1<f64>, f64)>,
) -> Array1<f64> {
    let mut q = grad.clone();
    let mut alphas = Vec::with_capacity(history.len());

    for (s, y, rho) in history.iter().rev() {
        let a = rho * s.dot(&q);
        q.scaled_add(-a, y);
        alphas.push(a);
    }

    // H_0 = γ I with γ = sᵀy / yᵀy from the newest pair.
    if let Some((s, y, _)) = history.back() {
        let yy = y.dot(y);
        if yy > 0.0 {
            q *= s.dot(y) / yy;
        }
    }

    for ((s, y, rho), a) in history.iter().zip(alphas.iter().rev()) {
        let b = rho * y.dot(&q);
        q.scaled_add(a - b, s);
    }

    -q
}
