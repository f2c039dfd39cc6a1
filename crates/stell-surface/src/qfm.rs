// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — QFM Surface
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Quadratic-flux-minimising surfaces.
//!
//! Minimise the normalised quadratic flux over the surface dofs with the
//! label held at its target, either by penalty (L-BFGS) or as an equality
//! constraint (SQP).

use crate::objectives::{QfmResidual, SurfaceLabel};
use ndarray::Array1;
use stell_field::field::MagneticField;
use stell_geo::surface::Surface;
use stell_math::optim::{
    lbfgs, sqp_equality, ArmijoParams, ConvergenceParams, EqualityConstrainedProblem, LbfgsConfig, Objective,
    SqpConfig, TerminationReason,
};
use stell_types::config::QfmSolveOptions;
use stell_types::error::{StellError, StellResult};
use tracing::{info, warn};

/// Curvature pairs kept by the penalty L-BFGS.
const QFM_LBFGS_MEMORY: usize = 200;

#[derive(Debug)]
pub struct QfmSurface<F, S, L> {
    pub field: F,
    pub surface: S,
    pub label: L,
    pub target: f64,
}

#[derive(Debug, Clone)]
pub struct QfmSolveResult {
    pub success: bool,
    /// Surface dofs at the final iterate.
    pub x: Array1<f64>,
    /// Quadratic flux at `x`.
    pub value: f64,
    /// `label − target` at `x`.
    pub constraint: f64,
    pub gradient_norm: f64,
    pub iterations: usize,
    pub func_evals: usize,
    pub termination: TerminationReason,
}

struct PenaltyObjective<'q, F, S, L> {
    qfm: &'q mut QfmSurface<F, S, L>,
    weight: f64,
}

impl<F: MagneticField, S: Surface, L: SurfaceLabel> Objective for PenaltyObjective<'_, F, S, L> {
    fn dim(&self) -> usize {
        self.qfm.surface.num_dofs()
    }

    fn eval_grad(&mut self, x: &Array1<f64>) -> StellResult<(f64, Array1<f64>)> {
        let (value, grad) = self.qfm.qfm_penalty_constraints(x, 1, self.weight)?;
        Ok((value, required(grad)?))
    }
}

struct ConstrainedProblem<'q, F, S, L> {
    qfm: &'q mut QfmSurface<F, S, L>,
}

impl<F: MagneticField, S: Surface, L: SurfaceLabel> EqualityConstrainedProblem for ConstrainedProblem<'_, F, S, L> {
    fn dim(&self) -> usize {
        self.qfm.surface.num_dofs()
    }

    fn objective(&mut self, x: &Array1<f64>) -> StellResult<(f64, Array1<f64>)> {
        let (value, grad) = self.qfm.qfm_objective(x, 1)?;
        Ok((value, required(grad)?))
    }

    fn constraint(&mut self, x: &Array1<f64>) -> StellResult<(f64, Array1<f64>)> {
        let (value, grad) = self.qfm.qfm_label_constraint(x, 1)?;
        Ok((value, required(grad)?))
    }
}

fn required(grad: Option<Array1<f64>>) -> StellResult<Array1<f64>> {
    grad.ok_or_else(|| StellError::ConfigError("gradient not computed".to_string()))
}

fn check_derivatives(derivatives: usize) -> StellResult<()> {
    if derivatives > 1 {
        return Err(StellError::ConfigError(format!(
            "QFM functions support derivatives up to 1, got {derivatives}"
        )));
    }
    Ok(())
}

impl<F, S, L> QfmSurface<F, S, L>
where
    F: MagneticField,
    S: Surface,
    L: SurfaceLabel,
{
    pub fn new(field: F, surface: S, label: L, target: f64) -> Self {
        QfmSurface {
            field,
            surface,
            label,
            target,
        }
    }

    fn set(&mut self, x: &Array1<f64>) -> StellResult<()> {
        let nd = self.surface.num_dofs();
        if x.len() != nd {
            return Err(StellError::dimension("QFM surface dofs", nd, x.len()));
        }
        self.surface.set_dofs(x)
    }

    /// Quadratic flux at `x`, with its gradient for `derivatives = 1`.
    pub fn qfm_objective(&mut self, x: &Array1<f64>, derivatives: usize) -> StellResult<(f64, Option<Array1<f64>>)> {
        check_derivatives(derivatives)?;
        self.set(x)?;
        if derivatives == 0 {
            return Ok((QfmResidual.value(&self.surface, &mut self.field)?, None));
        }
        let (value, grad) = QfmResidual.value_and_gradient(&self.surface, &mut self.field)?;
        Ok((value, Some(grad)))
    }

    /// `label − target`, with its gradient for `derivatives = 1`.
    pub fn qfm_label_constraint(
        &mut self,
        x: &Array1<f64>,
        derivatives: usize,
    ) -> StellResult<(f64, Option<Array1<f64>>)> {
        check_derivatives(derivatives)?;
        self.set(x)?;
        let gap = self.label.value(&self.surface)? - self.target;
        let grad = if derivatives == 1 {
            Some(self.label.dsurface(&self.surface)?)
        } else {
            None
        };
        Ok((gap, grad))
    }

    /// `J + ½·w·(label − target)²`.
    pub fn qfm_penalty_constraints(
        &mut self,
        x: &Array1<f64>,
        derivatives: usize,
        constraint_weight: f64,
    ) -> StellResult<(f64, Option<Array1<f64>>)> {
        let (j, dj) = self.qfm_objective(x, derivatives)?;
        let (gap, dgap) = self.qfm_label_constraint(x, derivatives)?;
        let value = j + 0.5 * constraint_weight * gap * gap;
        let grad = match (dj, dgap) {
            (Some(dj), Some(dgap)) => Some(dj + dgap * (constraint_weight * gap)),
            _ => None,
        };
        Ok((value, grad))
    }

    fn finish(
        &mut self,
        strategy: &str,
        x: Array1<f64>,
        gradient_norm: f64,
        iterations: usize,
        func_evals: usize,
        termination: TerminationReason,
    ) -> StellResult<QfmSolveResult> {
        let (value, _) = self.qfm_objective(&x, 0)?;
        let (constraint, _) = self.qfm_label_constraint(&x, 0)?;
        let success = termination.converged();
        info!(strategy, success, iterations, value, constraint, %termination, "qfm solve finished");
        if termination == TerminationReason::MaxIterations {
            warn!(strategy, iterations, "qfm solve hit its iteration cap");
        }
        Ok(QfmSolveResult {
            success,
            x,
            value,
            constraint,
            gradient_norm,
            iterations,
            func_evals,
            termination,
        })
    }

    /// L-BFGS on the penalised objective from the current surface.
    pub fn minimize_qfm_penalty_constraints_lbfgs(&mut self, options: &QfmSolveOptions) -> StellResult<QfmSolveResult> {
        options.validate()?;
        let x0 = self.surface.get_dofs();
        let config = LbfgsConfig {
            memory: QFM_LBFGS_MEMORY,
            convergence: ConvergenceParams::with_tolerance(options.tol, options.maxiter),
            line_search: ArmijoParams::default(),
        };
        let result = {
            let mut objective = PenaltyObjective {
                qfm: &mut *self,
                weight: options.constraint_weight,
            };
            lbfgs(&mut objective, &x0, &config)?
        };
        self.finish(
            "qfm_lbfgs",
            result.x,
            result.gradient_norm,
            result.iterations,
            result.func_evals,
            result.termination,
        )
    }

    /// SQP with the label as an equality constraint, from the current
    /// surface.
    pub fn minimize_qfm_exact_constraints_slsqp(&mut self, options: &QfmSolveOptions) -> StellResult<QfmSolveResult> {
        options.validate()?;
        let x0 = self.surface.get_dofs();
        let config = SqpConfig {
            max_iter: options.maxiter,
            tol: options.tol,
            ..SqpConfig::default()
        };
        let result = {
            let mut problem = ConstrainedProblem { qfm: &mut *self };
            sqp_equality(&mut problem, &x0, &config)?
        };
        self.finish(
            "qfm_sqp",
            result.x,
            result.kkt_norm,
            result.iterations,
            result.func_evals,
            result.termination,
        )
    }
}
