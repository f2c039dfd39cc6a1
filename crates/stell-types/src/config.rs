// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! JSON-loadable configuration for coil sets, surfaces and surface solves.

use crate::error::{StellError, StellResult};
use serde::{Deserialize, Serialize};

/// Top-level description of a surface-solve workflow.
///
/// Maps 1:1 to the files under `configs/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub name: String,
    pub coils: Vec<CoilConfig>,
    pub surface: SurfaceConfig,
    pub label: LabelKind,
    pub target: f64,
    #[serde(default)]
    pub iota: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub g: Option<f64>,
    #[serde(default = "PenaltySolveOptions::lbfgs")]
    pub boozer_penalty: PenaltySolveOptions,
    #[serde(default = "ExactSolveOptions::constrained_newton")]
    pub boozer_exact: ExactSolveOptions,
    #[serde(default)]
    pub qfm: QfmSolveOptions,
}

/// One filamentary coil given by Cartesian Fourier coefficients.
///
/// `coefficients[i]` holds `[c0, s1, c1, s2, c2, …]` for component `i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoilConfig {
    pub name: String,
    pub order: usize,
    #[serde(default = "default_coil_quadpoints")]
    pub num_quadpoints: usize,
    pub coefficients: Vec<Vec<f64>>,
    pub current: f64,
}

fn default_coil_quadpoints() -> usize {
    64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    RzFourier,
    XyzTensorFourier,
}

/// Toroidal extent covered by the φ quadrature points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhiRange {
    #[default]
    FullTorus,
    FieldPeriod,
    HalfPeriod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Area,
    Volume,
    ToroidalFlux,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    pub kind: SurfaceKind,
    pub mpol: usize,
    pub ntor: usize,
    #[serde(default = "default_nfp")]
    pub nfp: usize,
    #[serde(default = "default_stellsym")]
    pub stellsym: bool,
    pub nphi: usize,
    pub ntheta: usize,
    #[serde(default)]
    pub phi_range: PhiRange,
    pub major_radius: f64,
    pub minor_radius: f64,
}

fn default_nfp() -> usize {
    1
}
fn default_stellsym() -> bool {
    true
}

/// Options shared by the penalised Boozer strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltySolveOptions {
    pub tol: f64,
    pub maxiter: usize,
    #[serde(default = "default_constraint_weight")]
    pub constraint_weight: f64,
    /// Diagonal shift added to the penalty Hessian (Newton only).
    #[serde(default)]
    pub stab: f64,
    /// LBFGS history length.
    #[serde(default = "default_limited_memory")]
    pub limited_memory: usize,
}

fn default_constraint_weight() -> f64 {
    1.0
}
fn default_limited_memory() -> usize {
    10
}

impl PenaltySolveOptions {
    /// Coarse warm-start settings for the quasi-Newton stage.
    pub fn lbfgs() -> Self {
        Self {
            tol: 1e-3,
            maxiter: 1000,
            constraint_weight: 1.0,
            stab: 0.0,
            limited_memory: 10,
        }
    }

    pub fn least_squares() -> Self {
        Self {
            tol: 1e-12,
            ..Self::lbfgs()
        }
    }

    pub fn newton() -> Self {
        Self {
            tol: 1e-12,
            maxiter: 10,
            ..Self::lbfgs()
        }
    }

    pub fn validate(&self) -> StellResult<()> {
        validate_tolerance("penalty.tol", self.tol)?;
        validate_maxiter("penalty.maxiter", self.maxiter)?;
        if !self.constraint_weight.is_finite() || self.constraint_weight <= 0.0 {
            return Err(StellError::ConfigError(
                "penalty.constraint_weight must be finite and > 0".to_string(),
            ));
        }
        if !self.stab.is_finite() || self.stab < 0.0 {
            return Err(StellError::ConfigError(
                "penalty.stab must be finite and >= 0".to_string(),
            ));
        }
        if self.limited_memory == 0 {
            return Err(StellError::ConfigError(
                "penalty.limited_memory must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PenaltySolveOptions {
    fn default() -> Self {
        Self::lbfgs()
    }
}

/// Options for the exactly constrained Newton solves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExactSolveOptions {
    pub tol: f64,
    pub maxiter: usize,
}

impl ExactSolveOptions {
    pub fn constrained_newton() -> Self {
        Self {
            tol: 1e-12,
            maxiter: 10,
        }
    }

    pub fn residual_newton() -> Self {
        Self {
            tol: 1e-10,
            maxiter: 10,
        }
    }

    pub fn validate(&self) -> StellResult<()> {
        validate_tolerance("exact.tol", self.tol)?;
        validate_maxiter("exact.maxiter", self.maxiter)
    }
}

impl Default for ExactSolveOptions {
    fn default() -> Self {
        Self::constrained_newton()
    }
}

/// Options for both QFM strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QfmSolveOptions {
    #[serde(default = "default_qfm_tol")]
    pub tol: f64,
    #[serde(default = "default_qfm_maxiter")]
    pub maxiter: usize,
    #[serde(default = "default_constraint_weight")]
    pub constraint_weight: f64,
}

fn default_qfm_tol() -> f64 {
    1e-3
}
fn default_qfm_maxiter() -> usize {
    1000
}

impl QfmSolveOptions {
    pub fn validate(&self) -> StellResult<()> {
        validate_tolerance("qfm.tol", self.tol)?;
        validate_maxiter("qfm.maxiter", self.maxiter)?;
        if !self.constraint_weight.is_finite() || self.constraint_weight <= 0.0 {
            return Err(StellError::ConfigError(
                "qfm.constraint_weight must be finite and > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for QfmSolveOptions {
    fn default() -> Self {
        Self {
            tol: default_qfm_tol(),
            maxiter: default_qfm_maxiter(),
            constraint_weight: default_constraint_weight(),
        }
    }
}

fn validate_tolerance(name: &str, tol: f64) -> StellResult<()> {
    if !tol.is_finite() || tol <= 0.0 {
        return Err(StellError::ConfigError(format!(
            "{name} must be finite and > 0"
        )));
    }
    Ok(())
}

fn validate_maxiter(name: &str, maxiter: usize) -> StellResult<()> {
    if maxiter == 0 {
        return Err(StellError::ConfigError(format!("{name} must be >= 1")));
    }
    Ok(())
}

impl CoilConfig {
    pub fn validate(&self) -> StellResult<()> {
        if self.coefficients.len() != 3 {
            return Err(StellError::ConfigError(format!(
                "coil '{}' needs 3 coefficient rows, got {}",
                self.name,
                self.coefficients.len()
            )));
        }
        let expected = 2 * self.order + 1;
        for row in &self.coefficients {
            if row.len() != expected {
                return Err(StellError::ConfigError(format!(
                    "coil '{}' of order {} needs {expected} coefficients per component, got {}",
                    self.name,
                    self.order,
                    row.len()
                )));
            }
            if row.iter().any(|c| !c.is_finite()) {
                return Err(StellError::ConfigError(format!(
                    "coil '{}' has non-finite coefficients",
                    self.name
                )));
            }
        }
        if self.num_quadpoints < 2 * self.order + 2 {
            return Err(StellError::ConfigError(format!(
                "coil '{}' needs at least {} quadrature points",
                self.name,
                2 * self.order + 2
            )));
        }
        if !self.current.is_finite() {
            return Err(StellError::ConfigError(format!(
                "coil '{}' current must be finite",
                self.name
            )));
        }
        Ok(())
    }
}

impl SurfaceConfig {
    pub fn validate(&self) -> StellResult<()> {
        if self.nfp == 0 {
            return Err(StellError::ConfigError("surface.nfp must be >= 1".to_string()));
        }
        if self.nphi == 0 || self.ntheta == 0 {
            return Err(StellError::ConfigError(
                "surface quadrature grid must be non-empty".to_string(),
            ));
        }
        if !(self.minor_radius > 0.0 && self.major_radius > self.minor_radius) {
            return Err(StellError::ConfigError(format!(
                "surface radii must satisfy 0 < minor < major, got minor={} major={}",
                self.minor_radius, self.major_radius
            )));
        }
        Ok(())
    }

    /// φ quadrature points in [0, 1) for the configured range.
    pub fn quadpoints_phi(&self) -> Vec<f64> {
        let extent = match self.phi_range {
            PhiRange::FullTorus => 1.0,
            PhiRange::FieldPeriod => 1.0 / self.nfp as f64,
            PhiRange::HalfPeriod => 0.5 / self.nfp as f64,
        };
        (0..self.nphi)
            .map(|i| extent * i as f64 / self.nphi as f64)
            .collect()
    }

    /// θ quadrature points covering [0, 1).
    pub fn quadpoints_theta(&self) -> Vec<f64> {
        (0..self.ntheta)
            .map(|j| j as f64 / self.ntheta as f64)
            .collect()
    }
}

impl WorkflowConfig {
    /// Load from a JSON file and validate every section.
    pub fn from_file(path: &str) -> StellResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StellResult<()> {
        if self.coils.is_empty() {
            return Err(StellError::ConfigError(
                "workflow needs at least one coil".to_string(),
            ));
        }
        for coil in &self.coils {
            coil.validate()?;
        }
        self.surface.validate()?;
        if !self.target.is_finite() {
            return Err(StellError::ConfigError("target must be finite".to_string()));
        }
        self.boozer_penalty.validate()?;
        self.boozer_exact.validate()?;
        self.qfm.validate()
    }
}
