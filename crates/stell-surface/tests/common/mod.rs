// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Shared Test Helpers
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![allow(dead_code)]

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use stell_field::biot_savart::BiotSavart;
use stell_field::coil::{coils_from_config, CoilHandle};
use stell_geo::dofs::{collect_dofs, CollectedDofs, OptimizableRef};
use stell_geo::surface::{Surface, SurfaceXYZTensorFourier};
use stell_types::config::WorkflowConfig;
use tracing_subscriber::EnvFilter;

/// Each halving of the step must shrink the central-difference error by
/// at least this factor (ideal is 0.25).
pub const TAYLOR_RATIO: f64 = 0.6;

/// Route solver logs to the test harness. `RUST_LOG=debug` shows
/// per-iteration output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// CARGO_MANIFEST_DIR points to crates/stell-surface/, the workspace root
/// is two levels up.
pub fn config_path(relative: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join(relative)
        .to_string_lossy()
        .to_string()
}

pub fn load_workflow(name: &str) -> WorkflowConfig {
    WorkflowConfig::from_file(&config_path(&format!("configs/{name}.json"))).expect("workflow config")
}

/// Coils and tensor-Fourier torus of `configs/modular_ring.json`.
pub fn modular_ring() -> (WorkflowConfig, Vec<CoilHandle>, SurfaceXYZTensorFourier) {
    let cfg = load_workflow("modular_ring");
    let coils = coils_from_config(&cfg.coils).expect("coils");
    let surface = SurfaceXYZTensorFourier::from_config(&cfg.surface).expect("surface");
    (cfg, coils, surface)
}

pub fn evaluator(coils: &[CoilHandle]) -> BiotSavart {
    BiotSavart::new(coils.to_vec())
}

pub fn collected(coils: &[CoilHandle]) -> CollectedDofs {
    let roots: Vec<OptimizableRef> = coils.iter().map(|c| c.clone() as OptimizableRef).collect();
    collect_dofs(&roots).expect("acyclic")
}

/// Uniform entries in [-1, 1).
pub fn random_vector(n: usize, seed: u64) -> Array1<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array1::from_shape_fn(n, |_| rng.gen_range(-1.0..1.0))
}

/// Perturbation direction scaled to each entry's magnitude.
pub fn direction(x0: &Array1<f64>, seed: u64) -> Array1<f64> {
    let r = random_vector(x0.len(), seed);
    Array1::from_shape_fn(x0.len(), |i| 0.05 * r[i] * x0[i].abs().max(1.0))
}

/// Break the symmetry of a torus with small random coefficients.
pub fn perturb<S: Surface>(surface: &mut S, amplitude: f64, seed: u64) {
    let x = surface.get_dofs() + random_vector(surface.num_dofs(), seed) * amplitude;
    surface.set_dofs(&x).expect("dofs");
}

/// Taylor test of `derivative` against central differences of
/// `f(eps) = J(x + eps·h)` for eps = 2^-6 … 2^-14.
///
/// Once the error drops to round-off it is accepted without a ratio check.
pub fn assert_taylor<F: FnMut(f64) -> f64>(mut f: F, derivative: f64) {
    let base = f(0.0).abs() + derivative.abs();
    let floor = 1e-9 * base.max(f64::MIN_POSITIVE);
    let mut previous: Option<f64> = None;
    for k in 6..=14 {
        let eps = 2f64.powi(-k);
        let fd = (f(eps) - f(-eps)) / (2.0 * eps);
        let err = (fd - derivative).abs();
        if let Some(prev) = previous {
            assert!(
                err < TAYLOR_RATIO * prev || err < floor,
                "Taylor test failed at eps=2^-{k}: err={err:e}, previous={prev:e}, derivative={derivative:e}"
            );
        }
        previous = Some(err);
    }
}
