// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Objective Traits
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Problem interfaces consumed by the optimisers.
//!
//! Evaluations are fallible because the surface objectives evaluate
//! magnetic fields, which can reject a request (e.g. unsupported
//! derivative order).

use ndarray::{Array1, Array2};
use stell_types::error::StellResult;

/// Smooth scalar objective.
pub trait Objective {
    fn dim(&self) -> usize;

    fn eval(&mut self, x: &Array1<f64>) -> StellResult<f64> {
        Ok(self.eval_grad(x)?.0)
    }

    /// Value and gradient.
    fn eval_grad(&mut self, x: &Array1<f64>) -> StellResult<(f64, Array1<f64>)>;
}

/// Nonlinear least-squares problem `min ½‖r(x)‖²`.
pub trait LeastSquaresProblem {
    fn dim(&self) -> usize;

    fn residual(&mut self, x: &Array1<f64>) -> StellResult<Array1<f64>>;

    /// Residual and its Jacobian (rows = residual entries).
    fn residual_jacobian(&mut self, x: &Array1<f64>) -> StellResult<(Array1<f64>, Array2<f64>)>;
}

/// `min f(x)` subject to the scalar equality `c(x) = 0`.
pub trait EqualityConstrainedProblem {
    fn dim(&self) -> usize;

    /// Objective value and gradient.
    fn objective(&mut self, x: &Array1<f64>) -> StellResult<(f64, Array1<f64>)>;

    /// Constraint value and gradient.
    fn constraint(&mut self, x: &Array1<f64>) -> StellResult<(f64, Array1<f64>)>;
}
