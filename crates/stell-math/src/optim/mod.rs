// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Optimisation
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Optimisation primitives used by the surface solvers.

pub mod lbfgs;
pub mod least_squares;
pub mod line_search;
pub mod objective;
pub mod result;
pub mod sqp;

pub use lbfgs::{lbfgs, LbfgsConfig};
pub use least_squares::{levenberg_marquardt, LevenbergMarquardtConfig};
pub use line_search::{backtracking_armijo, ArmijoParams, LineSearchResult};
pub use objective::{EqualityConstrainedProblem, LeastSquaresProblem, Objective};
pub use result::{ConvergenceParams, OptimResult, TerminationReason};
pub use sqp::{sqp_equality, SqpConfig, SqpResult};
