// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Boozer Solvers
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Solution strategies for [`BoozerSurface`].
//!
//! Penalty strategies minimise `½‖[r, √w(l − t), √w·z00]‖²`; the exact
//! strategies enforce the label and anchor as equalities. Non-convergence
//! is reported through `success`; singular Newton systems are errors.

use super::{BoozerSolveResult, BoozerSurface};
use crate::objectives::SurfaceLabel;
use ndarray::{concatenate, s, Array1, Array2, Axis};
use stell_field::field::MagneticField;
use stell_geo::surface::Surface;
use stell_math::linalg::{lstsq, lu_factor, lu_solve_refined};
use stell_math::optim::{
    lbfgs, levenberg_marquardt, ArmijoParams, ConvergenceParams, LbfgsConfig, LeastSquaresProblem,
    LevenbergMarquardtConfig, Objective, OptimResult, TerminationReason,
};
use stell_types::config::{ExactSolveOptions, PenaltySolveOptions};
use stell_types::error::{StellError, StellResult};
use tracing::{debug, info, warn};

/// Below this gradient norm the Newton steps get one refinement solve.
const REFINEMENT_THRESHOLD: f64 = 1e-9;

fn l2_norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

fn check_finite(norm: f64, iteration: usize, what: &str) -> StellResult<()> {
    if norm.is_finite() {
        Ok(())
    } else {
        Err(StellError::SolverDiverged {
            iteration,
            message: format!("non-finite {what}"),
        })
    }
}

/// Scalar penalty seen by L-BFGS.
struct PenaltyObjective<'b, F, S, L> {
    boozer: &'b mut BoozerSurface<F, S, L>,
    weight: f64,
    optimize_g: bool,
}

impl<F: MagneticField, S: Surface, L: SurfaceLabel> Objective for PenaltyObjective<'_, F, S, L> {
    fn dim(&self) -> usize {
        self.boozer.num_unknowns(self.optimize_g)
    }

    fn eval_grad(&mut self, x: &Array1<f64>) -> StellResult<(f64, Array1<f64>)> {
        let terms = self.boozer.penalty_terms(x, 1, self.weight, self.optimize_g)?;
        let j = terms
            .jacobian
            .ok_or_else(|| StellError::ConfigError("penalty Jacobian missing".to_string()))?;
        Ok((0.5 * terms.vector.dot(&terms.vector), j.t().dot(&terms.vector)))
    }
}

/// Penalty vector seen by Levenberg–Marquardt.
struct PenaltyLeastSquares<'b, F, S, L> {
    boozer: &'b mut BoozerSurface<F, S, L>,
    weight: f64,
    optimize_g: bool,
}

impl<F: MagneticField, S: Surface, L: SurfaceLabel> LeastSquaresProblem for PenaltyLeastSquares<'_, F, S, L> {
    fn dim(&self) -> usize {
        self.boozer.num_unknowns(self.optimize_g)
    }

    fn residual(&mut self, x: &Array1<f64>) -> StellResult<Array1<f64>> {
        Ok(self
            .boozer
            .boozer_penalty_constraints_vectorized(x, 0, self.weight, self.optimize_g)?
            .0)
    }

    fn residual_jacobian(&mut self, x: &Array1<f64>) -> StellResult<(Array1<f64>, Array2<f64>)> {
        let (r, j) = self
            .boozer
            .boozer_penalty_constraints_vectorized(x, 1, self.weight, self.optimize_g)?;
        let j = j.ok_or_else(|| StellError::ConfigError("penalty Jacobian missing".to_string()))?;
        Ok((r, j))
    }
}

impl<F, S, L> BoozerSurface<F, S, L>
where
    F: MagneticField,
    S: Surface,
    L: SurfaceLabel,
{
    /// Build the result at `x`, leaving the surface there.
    #[allow(clippy::too_many_arguments)]
    fn finish(
        &mut self,
        strategy: &str,
        x: Array1<f64>,
        optimize_g: bool,
        lagrange_multipliers: Option<[f64; 2]>,
        gradient_norm: f64,
        iterations: usize,
        termination: TerminationReason,
    ) -> StellResult<BoozerSolveResult> {
        let residual = self.settle(&x, optimize_g)?;
        let nd = self.surface.num_dofs();
        let success = termination.converged();
        info!(
            strategy,
            success,
            iterations,
            gradient_norm,
            %termination,
            "boozer solve finished"
        );
        if termination == TerminationReason::MaxIterations {
            warn!(strategy, iterations, "boozer solve hit its iteration cap");
        }
        Ok(BoozerSolveResult {
            success,
            surface_dofs: x.slice(s![..nd]).to_owned(),
            iota: x[nd],
            g: optimize_g.then(|| x[nd + 1]),
            x,
            lagrange_multipliers,
            residual,
            gradient_norm,
            iterations,
            termination,
        })
    }

    fn finish_optim(&mut self, strategy: &str, result: OptimResult, optimize_g: bool) -> StellResult<BoozerSolveResult> {
        self.finish(
            strategy,
            result.x,
            optimize_g,
            None,
            result.gradient_norm,
            result.iterations,
            result.termination,
        )
    }

    /// L-BFGS on the scalar penalty. `g = Some` also solves for G.
    pub fn minimize_boozer_penalty_constraints_lbfgs(
        &mut self,
        options: &PenaltySolveOptions,
        iota: f64,
        g: Option<f64>,
    ) -> StellResult<BoozerSolveResult> {
        options.validate()?;
        let optimize_g = g.is_some();
        let x0 = self.pack(iota, g);
        let config = LbfgsConfig {
            memory: options.limited_memory,
            convergence: ConvergenceParams::with_tolerance(options.tol, options.maxiter),
            line_search: ArmijoParams::default(),
        };
        let result = {
            let mut objective = PenaltyObjective {
                boozer: &mut *self,
                weight: options.constraint_weight,
                optimize_g,
            };
            lbfgs(&mut objective, &x0, &config)?
        };
        self.finish_optim("lbfgs", result, optimize_g)
    }

    /// Levenberg–Marquardt on the penalty vector.
    pub fn minimize_boozer_penalty_constraints_ls(
        &mut self,
        options: &PenaltySolveOptions,
        iota: f64,
        g: Option<f64>,
    ) -> StellResult<BoozerSolveResult> {
        options.validate()?;
        let optimize_g = g.is_some();
        let x0 = self.pack(iota, g);
        let config = LevenbergMarquardtConfig::with_tolerance(options.tol, options.maxiter);
        let result = {
            let mut problem = PenaltyLeastSquares {
                boozer: &mut *self,
                weight: options.constraint_weight,
                optimize_g,
            };
            levenberg_marquardt(&mut problem, &x0, &config)?
        };
        self.finish_optim("least_squares", result, optimize_g)
    }

    /// Newton on the scalar penalty with the Hessian shifted by
    /// `options.stab·I`.
    pub fn minimize_boozer_penalty_constraints_newton(
        &mut self,
        options: &PenaltySolveOptions,
        iota: f64,
        g: Option<f64>,
    ) -> StellResult<BoozerSolveResult> {
        options.validate()?;
        let optimize_g = g.is_some();
        let mut x = self.pack(iota, g);
        let weight = options.constraint_weight;

        let (mut grad, mut hess) = self.penalty_newton_system(&x, weight, optimize_g)?;
        let mut norm = l2_norm(&grad);
        let mut i = 0;
        while i < options.maxiter && norm > options.tol {
            check_finite(norm, i, "penalty gradient")?;
            let shifted = &hess + &(Array2::<f64>::eye(x.len()) * options.stab);
            let factors = lu_factor(&shifted)?;
            let mut dx = factors.solve(&grad)?;
            if norm < REFINEMENT_THRESHOLD {
                dx += &factors.solve(&(&grad - &shifted.dot(&dx)))?;
            }
            x -= &dx;
            (grad, hess) = self.penalty_newton_system(&x, weight, optimize_g)?;
            norm = l2_norm(&grad);
            i += 1;
            debug!(iteration = i, grad_norm = norm, step = l2_norm(&dx), "boozer penalty newton step");
        }
        check_finite(norm, i, "penalty gradient")?;
        let termination = if norm <= options.tol {
            TerminationReason::GradientNorm
        } else {
            TerminationReason::MaxIterations
        };
        self.finish("newton", x, optimize_g, None, norm, i, termination)
    }

    fn penalty_newton_system(
        &mut self,
        x: &Array1<f64>,
        weight: f64,
        optimize_g: bool,
    ) -> StellResult<(Array1<f64>, Array2<f64>)> {
        let eval = self.boozer_penalty_constraints(x, 2, weight, optimize_g)?;
        match (eval.gradient, eval.hessian) {
            (Some(g), Some(h)) => Ok((g, h)),
            _ => Err(StellError::ConfigError("penalty derivatives missing".to_string())),
        }
    }

    /// Newton on the KKT system of `min ½‖r‖²` subject to the label and
    /// z-anchor equalities. Under stellarator symmetry the anchor is
    /// satisfied identically and its multiplier is dropped.
    pub fn minimize_boozer_exact_constraints_newton(
        &mut self,
        options: &ExactSolveOptions,
        iota: f64,
        g: Option<f64>,
    ) -> StellResult<BoozerSolveResult> {
        options.validate()?;
        let optimize_g = g.is_some();
        let x0 = self.pack(iota, g);
        let n = x0.len();
        let mut xl = concatenate![Axis(0), x0.view(), Array1::zeros(2).view()];
        let stellsym = self.surface.stellsym();

        let (mut res, mut dres) = self.exact_system(&xl, optimize_g)?;
        let mut norm = l2_norm(&res);
        let mut i = 0;
        while i < options.maxiter && norm > options.tol {
            check_finite(norm, i, "KKT residual")?;
            let size = if stellsym { n + 1 } else { n + 2 };
            let a = dres.slice(s![..size, ..size]).to_owned();
            let b = res.slice(s![..size]).to_owned();
            let factors = lu_factor(&a)?;
            let mut step = factors.solve(&b)?;
            if norm < REFINEMENT_THRESHOLD {
                step += &factors.solve(&(&b - &a.dot(&step)))?;
            }
            let mut dx = Array1::zeros(n + 2);
            dx.slice_mut(s![..size]).assign(&step);
            xl -= &dx;
            (res, dres) = self.exact_system(&xl, optimize_g)?;
            norm = l2_norm(&res);
            i += 1;
            debug!(iteration = i, kkt_norm = norm, step = l2_norm(&dx), "boozer exact newton step");
        }
        check_finite(norm, i, "KKT residual")?;
        let termination = if norm <= options.tol {
            TerminationReason::ResidualNorm
        } else {
            TerminationReason::MaxIterations
        };
        let multipliers = [xl[n], xl[n + 1]];
        let x = xl.slice(s![..n]).to_owned();
        self.finish("exact_newton", x, optimize_g, Some(multipliers), norm, i, termination)
    }

    fn exact_system(&mut self, xl: &Array1<f64>, optimize_g: bool) -> StellResult<(Array1<f64>, Array2<f64>)> {
        let (res, dres) = self.boozer_exact_constraints(xl, 1, optimize_g)?;
        let dres = dres.ok_or_else(|| StellError::ConfigError("KKT Jacobian missing".to_string()))?;
        Ok((res, dres))
    }

    /// Newton directly on the masked residual plus label (and z anchor
    /// without stellarator symmetry). Square systems use LU with one
    /// refinement step; rectangular ones least squares.
    pub fn solve_residual_equation_exactly_newton(
        &mut self,
        options: &ExactSolveOptions,
        iota: f64,
        g: Option<f64>,
    ) -> StellResult<BoozerSolveResult> {
        options.validate()?;
        if !self.surface.supports_exact_solve() {
            return Err(StellError::ConfigError(
                "exact residual solve needs a surface with a square Boozer system".to_string(),
            ));
        }
        let optimize_g = g.is_some();
        let mut x = self.pack(iota, g);

        let mut system = self.residual_system(&x, optimize_g)?;
        let mut norm = l2_norm(&system.rhs);
        let mut i = 0;
        while i < options.maxiter && norm > options.tol {
            check_finite(norm, i, "Boozer residual")?;
            let dx = if system.jacobian.is_square() {
                lu_solve_refined(&system.jacobian, &system.rhs)?
            } else {
                lstsq(&system.jacobian, &system.rhs)?
            };
            x -= &dx;
            system = self.residual_system(&x, optimize_g)?;
            norm = l2_norm(&system.rhs);
            i += 1;
            debug!(iteration = i, residual_norm = norm, step = l2_norm(&dx), "boozer residual newton step");
        }
        check_finite(norm, i, "Boozer residual")?;
        let termination = if norm <= options.tol {
            TerminationReason::ResidualNorm
        } else {
            TerminationReason::MaxIterations
        };
        self.finish("residual_newton", x, optimize_g, None, norm, i, termination)
    }
}
