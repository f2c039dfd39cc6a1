// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Analytic Fields
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Closed-form field sources. Wrap any of them in
//! [`CachedField`](crate::field::CachedField) to evaluate at points.

pub mod circular;
pub mod scalar_potential;
pub mod toroidal;
pub mod uniform_transform;

pub use circular::CircularCoil;
pub use scalar_potential::{ScalarPotential, ScalarPotentialField};
pub use toroidal::ToroidalField;
pub use uniform_transform::UniformTransformField;

/// Set `h[k][j][i]` and its mirror `h[j][k][i]`.
pub(crate) fn set_symmetric(h: &mut [[[f64; 3]; 3]; 3], k: usize, j: usize, i: usize, v: f64) {
    h[k][j][i] = v;
    h[j][k][i] = v;
}
