// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Optimisation Results
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Termination records shared by every iterative solver.

use ndarray::Array1;
use std::fmt;

/// Why an iterative solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Gradient (or KKT residual) norm fell below tolerance.
    GradientNorm,
    /// Step length fell below tolerance.
    StepSize,
    /// Relative objective change fell below tolerance.
    FunctionChange,
    /// Residual norm fell below tolerance.
    ResidualNorm,
    /// Iteration cap reached.
    MaxIterations,
    /// No acceptable step along the search direction.
    LineSearchFailed,
    /// Objective or derivative became non-finite.
    NumericalError,
}

impl TerminationReason {
    /// Whether the reason counts as convergence.
    pub fn converged(self) -> bool {
        matches!(
            self,
            TerminationReason::GradientNorm
                | TerminationReason::StepSize
                | TerminationReason::FunctionChange
                | TerminationReason::ResidualNorm
        )
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            TerminationReason::GradientNorm => "gradient norm below tolerance",
            TerminationReason::StepSize => "step size below tolerance",
            TerminationReason::FunctionChange => "function change below tolerance",
            TerminationReason::ResidualNorm => "residual norm below tolerance",
            TerminationReason::MaxIterations => "maximum iterations reached",
            TerminationReason::LineSearchFailed => "line search failed",
            TerminationReason::NumericalError => "numerical error",
        };
        f.write_str(msg)
    }
}

/// Outcome of an unconstrained or least-squares minimisation.
#[derive(Debug, Clone)]
pub struct OptimResult {
    pub x: Array1<f64>,
    pub value: f64,
    pub gradient: Array1<f64>,
    pub gradient_norm: f64,
    pub iterations: usize,
    pub func_evals: usize,
    pub termination: TerminationReason,
}

impl OptimResult {
    pub fn success(&self) -> bool {
        self.termination.converged()
    }
}

/// Stopping criteria shared by the quasi-Newton and SQP drivers.
#[derive(Debug, Clone)]
pub struct ConvergenceParams {
    pub max_iter: usize,
    /// Infinity norm of the gradient.
    pub grad_tol: f64,
    pub step_tol: f64,
    /// Relative change `(f_k - f_{k+1}) / max(|f_k|, |f_{k+1}|, 1)`.
    pub func_tol: f64,
}

impl Default for ConvergenceParams {
    fn default() -> Self {
        ConvergenceParams {
            max_iter: 100,
            grad_tol: 1e-8,
            step_tol: 1e-12,
            func_tol: 0.0,
        }
    }
}

impl ConvergenceParams {
    /// Gradient tolerance `tol`; the function-change test stays off so
    /// that success always means a small gradient.
    pub fn with_tolerance(tol: f64, max_iter: usize) -> Self {
        ConvergenceParams {
            max_iter,
            grad_tol: tol,
            step_tol: 1e-14,
            func_tol: 0.0,
        }
    }
}

/// Relative objective decrease used by the `func_tol` criterion.
pub fn relative_change(f_prev: f64, f_new: f64) -> f64 {
    (f_prev - f_new) / f_prev.abs().max(f_new.abs()).max(1.0)
}

pub fn inf_norm(v: &Array1<f64>) -> f64 {
    v.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
}
