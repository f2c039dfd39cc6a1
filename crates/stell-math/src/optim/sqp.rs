// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Equality-Constrained SQP
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Sequential quadratic programming for `min f(x)` s.t. `c(x) = 0`.
//!
//! Each iteration solves the KKT system
//!
//! ```text
//! [ B   a ] [ p ]   [ -g ]
//! [ aᵀ  0 ] [ λ ] = [ -c ]
//! ```
//!
//! with `B` a damped-BFGS approximation of the Lagrangian Hessian
//! (Powell's modification keeps it positive definite), then backtracks on
//! the ℓ1 merit `f + ρ|c|`.

use super::objective::EqualityConstrainedProblem;
use super::result::{inf_norm, TerminationReason};
use crate::linalg::lu_solve;
use ndarray::{s, Array1, Array2};
use stell_types::error::{StellError, StellResult};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SqpConfig {
    pub max_iter: usize,
    /// Tolerance on the Lagrangian gradient and on `|c|`.
    pub tol: f64,
    /// Sufficient decrease constant for the merit line search.
    pub armijo_c: f64,
    pub alpha_min: f64,
}

impl Default for SqpConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol: 1e-6,
            armijo_c: 1e-4,
            alpha_min: 1e-10,
        }
    }
}

/// Outcome of [`sqp_equality`].
#[derive(Debug, Clone)]
pub struct SqpResult {
    pub x: Array1<f64>,
    pub value: f64,
    pub constraint: f64,
    pub multiplier: f64,
    /// Infinity norm of the Lagrangian gradient `∇f + λ∇c`.
    pub kkt_norm: f64,
    pub iterations: usize,
    pub func_evals: usize,
    pub termination: TerminationReason,
}

impl SqpResult {
    pub fn success(&self) -> bool {
        self.termination.converged()
    }
}

struct Iterate {
    x: Array1<f64>,
    f: f64,
    g: Array1<f64>,
    c: f64,
    a: Array1<f64>,
}

fn evaluate<P: EqualityConstrainedProblem>(problem: &mut P, x: Array1<f64>) -> StellResult<Iterate> {
    let (f, g) = problem.objective(&x)?;
    let (c, a) = problem.constraint(&x)?;
    Ok(Iterate { x, f, g, c, a })
}

/// Solve the equality-constrained problem from `x0`.
///
/// Succeeds only when the Lagrangian gradient and `|c|` both fall below
/// `tol`. A stalled objective is not convergence; the iteration goes on
/// until the KKT conditions hold or `max_iter` runs out.
pub fn sqp_equality<P: EqualityConstrainedProblem>(
    problem: &mut P,
    x0: &Array1<f64>,
    config: &SqpConfig,
) -> StellResult<SqpResult> {
    if config.max_iter == 0 || !(config.tol > 0.0) {
        return Err(StellError::ConfigError(
            "sqp_equality needs max_iter >= 1 and tol > 0".to_string(),
        ));
    }
    let n = problem.dim();
    if x0.len() != n {
        return Err(StellError::dimension("sqp_equality initial point", n, x0.len()));
    }

    let mut it = evaluate(problem, x0.clone())?;
    let mut func_evals = 1;
    let mut hess = Array2::<f64>::eye(n);
    let mut lambda = 0.0;
    let mut rho: f64 = 1.0;
    let mut termination = TerminationReason::MaxIterations;
    let mut iterations = config.max_iter;

    for iter in 0..config.max_iter {
        if !it.f.is_finite() || !it.c.is_finite() {
            termination = TerminationReason::NumericalError;
            iterations = iter;
            break;
        }

        let mut kkt = Array2::<f64>::zeros((n + 1, n + 1));
        kkt.slice_mut(s![..n, ..n]).assign(&hess);
        kkt.slice_mut(s![..n, n]).assign(&it.a);
        kkt.slice_mut(s![n, ..n]).assign(&it.a);
        let mut rhs = Array1::<f64>::zeros(n + 1);
        rhs.slice_mut(s![..n]).assign(&it.g.mapv(|v| -v));
        rhs[n] = -it.c;
        let sol = lu_solve(&kkt, &rhs)?;
        let p = sol.slice(s![..n]).to_owned();
        lambda = sol[n];

        let kkt_norm = inf_norm(&(&it.g + &(&it.a * lambda)));
        if kkt_norm < config.tol && it.c.abs() < config.tol {
            termination = TerminationReason::GradientNorm;
            iterations = iter;
            break;
        }

        rho = rho.max(1.1 * lambda.abs() + 1e-8);
        let merit = it.f + rho * it.c.abs();
        let slope = it.g.dot(&p) - rho * it.c.abs();

        let mut alpha = 1.0;
        let mut accepted = None;
        while alpha >= config.alpha_min {
            let trial = evaluate(problem, &it.x + &(&p * alpha))?;
            func_evals += 1;
            let trial_merit = trial.f + rho * trial.c.abs();
            if trial_merit.is_finite() && trial_merit <= merit + config.armijo_c * alpha * slope.min(0.0) {
                accepted = Some(trial);
                break;
            }
            alpha *= 0.5;
        }
        let next = match accepted {
            Some(next) => next,
            None => {
                warn!(iteration = iter, merit, "sqp merit line search failed");
                termination = TerminationReason::LineSearchFailed;
                iterations = iter;
                break;
            }
        };

        let s = &next.x - &it.x;
        let y = (&next.g + &(&next.a * lambda)) - (&it.g + &(&it.a * lambda));
        if iter == 0 {
            scale_initial_hessian(&mut hess, &s, &y);
        }
        damped_bfgs_update(&mut hess, &s, &y);

        debug!(iteration = iter, value = next.f, constraint = next.c, alpha, rho, "sqp step");
        it = next;
    }

    if termination != TerminationReason::GradientNorm {
        lambda = least_squares_multiplier(&it.g, &it.a).unwrap_or(lambda);
    }
    let kkt_norm = inf_norm(&(&it.g + &(&it.a * lambda)));
    Ok(SqpResult {
        x: it.x,
        value: it.f,
        constraint: it.c,
        multiplier: lambda,
        kkt_norm,
        iterations,
        func_evals,
        termination,
    })
}

/// `B₀ = (yᵀy / sᵀy) I` from the first step, so the quasi-Newton model
/// starts at the curvature scale of the problem rather than at unity.
fn scale_initial_hessian(hess: &mut Array2<f64>, s: &Array1<f64>, y: &Array1<f64>) {
    let sy = s.dot(y);
    let yy = y.dot(y);
    if sy > 0.0 && yy > 0.0 {
        *hess = Array2::<f64>::eye(s.len()) * (yy / sy);
    }
}

/// Multiplier minimising `‖g + λa‖`.
fn least_squares_multiplier(g: &Array1<f64>, a: &Array1<f64>) -> Option<f64> {
    let aa = a.dot(a);
    (aa > 0.0).then(|| -a.dot(g) / aa)
}

/// Powell-damped BFGS update; keeps `hess` positive definite.
fn damped_bfgs_update(hess: &mut Array2<f64>, s: &Array1<f64>, y: &Array1<f64>) {
    let bs = hess.dot(s);
    let sbs = s.dot(&bs);
    if !(sbs > 0.0) {
        return;
    }
    let sy = s.dot(y);
    let theta = if sy >= 0.2 * sbs {
        1.0
    } else {
        0.8 * sbs / (sbs - sy)
    };
    let r = y * theta + &bs * (1.0 - theta);
    let sr = s.dot(&r);
    if !(sr > 0.0) {
        return;
    }
    let n = s.len();
    for i in 0..n {
        for j in 0..n {
            hess[[i, j]] += r[i] * r[j] / sr - bs[i] * bs[j] / sbs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// min x + y  s.t.  x² + y² = 2, solution (-1, -1), λ = 1/2.
    struct CircleLinear;

    impl EqualityConstrainedProblem for CircleLinear {
        fn dim(&self) -> usize {
            2
        }
        fn objective(&mut self, x: &Array1<f64>) -> StellResult<(f64, Array1<f64>)> {
            Ok((x[0] + x[1], array![1.0, 1.0]))
        }
        fn constraint(&mut self, x: &Array1<f64>) -> StellResult<(f64, Array1<f64>)> {
            Ok((x.dot(x) - 2.0, x * 2.0))
        }
    }

    /// min x² + y²  s.t.  x + y = 1.
    struct PlaneQuadratic;

    impl EqualityConstrainedProblem for PlaneQuadratic {
        fn dim(&self) -> usize {
            2
        }
        fn objective(&mut self, x: &Array1<f64>) -> StellResult<(f64, Array1<f64>)> {
            Ok((x.dot(x), x * 2.0))
        }
        fn constraint(&mut self, x: &Array1<f64>) -> StellResult<(f64, Array1<f64>)> {
            Ok((x[0] + x[1] - 1.0, array![1.0, 1.0]))
        }
    }

    #[test]
    fn test_sqp_linear_constraint() {
        let config = SqpConfig { tol: 1e-10, ..SqpConfig::default() };
        let res = sqp_equality(&mut PlaneQuadratic, &array![2.0, -3.0], &config).expect("run");
        assert!(res.success(), "termination: {}", res.termination);
        assert!((res.x[0] - 0.5).abs() < 1e-6);
        assert!((res.x[1] - 0.5).abs() < 1e-6);
        assert!(res.constraint.abs() < 1e-9);
    }

    #[test]
    fn test_sqp_nonlinear_constraint() {
        let config = SqpConfig { tol: 1e-10, max_iter: 200, ..SqpConfig::default() };
        let res = sqp_equality(&mut CircleLinear, &array![-1.5, -0.5], &config).expect("run");
        assert!(res.success(), "termination: {}", res.termination);
        assert!((res.x[0] + 1.0).abs() < 1e-5, "x = {}", res.x);
        assert!((res.x[1] + 1.0).abs() < 1e-5, "x = {}", res.x);
        assert!((res.multiplier - 0.5).abs() < 1e-4);
    }

    /// The first full step from (2, -3) lands on the feasible point
    /// (-2, 3) with an unchanged objective. That is not a KKT point.
    #[test]
    fn test_unchanged_objective_is_not_convergence() {
        let config = SqpConfig { tol: 1e-10, ..SqpConfig::default() };
        let res = sqp_equality(&mut PlaneQuadratic, &array![2.0, -3.0], &config).expect("run");
        assert!(res.success(), "termination: {}", res.termination);
        assert!(res.iterations > 1);
        assert!(res.kkt_norm < 1e-10, "kkt = {}", res.kkt_norm);
        assert!((res.multiplier + 1.0).abs() < 1e-8, "lambda = {}", res.multiplier);
        assert!((res.value - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_iteration_cap_is_not_success() {
        let config = SqpConfig { tol: 1e-12, max_iter: 1, ..SqpConfig::default() };
        let res = sqp_equality(&mut CircleLinear, &array![-1.5, -0.5], &config).expect("run");
        assert!(!res.success());
        assert_eq!(res.termination, TerminationReason::MaxIterations);
        assert!(res.kkt_norm > 1e-12);
    }

    #[test]
    fn test_damped_update_stays_positive_definite() {
        let mut hess = Array2::<f64>::eye(2);
        // Negative curvature pair is damped instead of breaking definiteness.
        damped_bfgs_update(&mut hess, &array![1.0, 0.0], &array![-1.0, 0.5]);
        let det = hess[[0, 0]] * hess[[1, 1]] - hess[[0, 1]] * hess[[1, 0]];
        assert!(hess[[0, 0]] > 0.0 && det > 0.0);
    }

    #[test]
    fn test_rejects_zero_iterations() {
        let config = SqpConfig { max_iter: 0, ..SqpConfig::default() };
        assert!(sqp_equality(&mut PlaneQuadratic, &array![0.0, 0.0], &config).is_err());
    }
}
