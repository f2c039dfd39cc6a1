// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use std::f64::consts::PI;

/// Vacuum permeability (H/m), pre-2019 exact definition 4π·10⁻⁷.
pub const MU0: f64 = 4.0 * PI * 1e-7;

/// μ0 / 4π, the Biot-Savart prefactor.
pub const BIOT_SAVART_PREFACTOR: f64 = 1e-7;

/// μ0 / π, the circular-filament prefactor (`Inorm = 4e-7·I`).
pub const CIRCULAR_COIL_PREFACTOR: f64 = 4e-7;

/// 2π, used for parameter-to-angle conversion on [0, 1) quadrature grids.
pub const TWO_PI: f64 = 2.0 * PI;
