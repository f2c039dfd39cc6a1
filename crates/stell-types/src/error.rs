// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Stellarator Error Taxonomy
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use thiserror::Error;

/// Errors raised by field evaluation, DOF collection and surface solves.
///
/// Non-convergence of an iterative solver is not an error; it is reported
/// through the `success` flag of the solver's result record.
#[derive(Error, Debug)]
pub enum StellError {
    #[error("Solver diverged at iteration {iteration}: {message}")]
    SolverDiverged { iteration: usize, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Circular dependency: {0}")]
    CircularDependency(String),

    #[error("Dimension mismatch in {context}: expected {expected}, got {got}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        got: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Linear algebra error: {0}")]
    LinAlg(String),
}

pub type StellResult<T> = Result<T, StellError>;

impl StellError {
    /// Shorthand for a [`StellError::DimensionMismatch`].
    pub fn dimension(context: &str, expected: usize, got: usize) -> Self {
        StellError::DimensionMismatch {
            context: context.to_string(),
            expected,
            got,
        }
    }
}
