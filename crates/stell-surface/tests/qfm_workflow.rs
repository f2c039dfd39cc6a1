// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — QFM Workflow Tests
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! QFM surfaces around a single circular coil, driven from
//! `configs/toroidal_qfm.json`.

mod common;

use common::{init_tracing, load_workflow};
use stell_field::analytic::CircularCoil;
use stell_field::field::CachedField;
use stell_geo::surface::{Surface, SurfaceRZFourier};
use stell_surface::objectives::{label_from_kind, SurfaceLabel};
use stell_surface::qfm::QfmSurface;
use stell_types::config::{QfmSolveOptions, WorkflowConfig};
use stell_types::error::StellError;

type Field = CachedField<CircularCoil>;
type Qfm = QfmSurface<Field, SurfaceRZFourier, Box<dyn SurfaceLabel>>;

fn ring_field(cfg: &WorkflowConfig) -> Field {
    let current = cfg.coils[0].current;
    CachedField::new(CircularCoil::new(1.0, [0.0, 0.0, 0.0], current, (0.0, 0.0)).expect("coil"))
}

fn qfm() -> (WorkflowConfig, Qfm) {
    let cfg = load_workflow("toroidal_qfm");
    let surface = SurfaceRZFourier::from_config(&cfg.surface).expect("surface");
    let label = label_from_kind::<Field>(cfg.label, None).expect("label");
    let field = ring_field(&cfg);
    let target = cfg.target;
    (cfg, QfmSurface::new(field, surface, label, target))
}

#[test]
fn penalty_lbfgs_lowers_penalised_flux() {
    init_tracing();
    let (cfg, mut q) = qfm();
    let weight = cfg.qfm.constraint_weight;
    let x0 = Surface::get_dofs(&q.surface);
    let (before, _) = q.qfm_penalty_constraints(&x0, 0, weight).expect("penalty");
    let options = QfmSolveOptions {
        maxiter: 80,
        ..cfg.qfm.clone()
    };
    let res = q.minimize_qfm_penalty_constraints_lbfgs(&options).expect("solve");
    let (after, _) = q.qfm_penalty_constraints(&res.x, 0, weight).expect("penalty");
    assert!(after <= before, "{after} > {before}");
    assert!(res.value.is_finite() && res.value >= 0.0);
    assert_eq!(Surface::get_dofs(&q.surface), res.x);
}

#[test]
fn penalty_then_sqp_holds_volume_at_target() {
    init_tracing();
    let (cfg, mut q) = qfm();
    let x0 = Surface::get_dofs(&q.surface);
    let (initial, _) = q.qfm_objective(&x0, 0).expect("objective");
    let warm = QfmSolveOptions {
        maxiter: 40,
        ..cfg.qfm.clone()
    };
    let start = q.minimize_qfm_penalty_constraints_lbfgs(&warm).expect("warm start");
    let options = QfmSolveOptions {
        maxiter: 150,
        ..cfg.qfm.clone()
    };
    let res = q.minimize_qfm_exact_constraints_slsqp(&options).expect("solve");
    assert!(res.value.is_finite());
    assert!(res.constraint.abs() < 1e-8, "volume gap {:e}", res.constraint);
    assert!(res.value < 1e-3 * initial, "{:e} not small against {initial:e}", res.value);
    assert!(res.value < start.value + 1e-3 * initial, "{:e} vs warm start {:e}", res.value, start.value);
    assert_eq!(Surface::get_dofs(&q.surface), res.x);
}

#[test]
fn invalid_qfm_options_are_rejected() {
    let (_, mut q) = qfm();
    let options = QfmSolveOptions {
        tol: -1.0,
        ..QfmSolveOptions::default()
    };
    assert!(matches!(
        q.minimize_qfm_penalty_constraints_lbfgs(&options),
        Err(StellError::ConfigError(_))
    ));
    assert!(matches!(
        q.minimize_qfm_exact_constraints_slsqp(&options),
        Err(StellError::ConfigError(_))
    ));
}

#[test]
fn wrong_dof_count_is_rejected() {
    let (_, mut q) = qfm();
    let short = ndarray::Array1::zeros(3);
    assert!(matches!(
        q.qfm_objective(&short, 0),
        Err(StellError::DimensionMismatch { .. })
    ));
}
