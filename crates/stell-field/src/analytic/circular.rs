// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Circular Coil
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Exact field of a circular current filament.
//!
//! In the coil frame (loop of radius `a` in the z' = 0 plane, centred at
//! the origin) with `C = μ0·I/π`, `r² = ρ² + z²`,
//! `α² = a² + r² − 2aρ`, `β² = a² + r² + 2aρ` and `m = 1 − α²/β²`:
//!
//! ```text
//! B_z = C/(2α²β) · [(a² − r²)·E(m) + α²·K(m)]
//! B_ρ = C·z/(2α²βρ) · [(a² + r²)·E(m) − α²·K(m)]
//! ```
//!
//! The coil frame is the orthonormal rotation taking the normal
//! `n = (sinθ cosφ, sinθ sinφ, cosθ)` to z'.

use crate::field::{check_order, check_points, FieldDerivatives, FieldSource};
use ndarray::Array2;
use std::f64::consts::PI;
use stell_math::elliptic::elliptic_derivatives;
use stell_types::constants::{CIRCULAR_COIL_PREFACTOR, MU0};
use stell_types::error::{StellError, StellResult};

/// Points closer than this fraction of the radius to the axis use the
/// on-axis expansion.
const AXIS_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub struct CircularCoil {
    pub radius: f64,
    pub center: [f64; 3],
    pub current: f64,
    /// Rows are the coil-frame axes in global coordinates.
    rotation: [[f64; 3]; 3],
}

/// Local B and dB in the coil frame.
struct LocalField {
    b: [f64; 3],
    db: [[f64; 3]; 3],
}

impl CircularCoil {
    /// Coil of `radius` around `center` with normal at spherical angles
    /// `(theta, phi)`.
    pub fn new(radius: f64, center: [f64; 3], current: f64, normal: (f64, f64)) -> StellResult<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(StellError::ConfigError(format!(
                "circular coil radius must be finite and > 0, got {radius}"
            )));
        }
        if !current.is_finite() || center.iter().any(|c| !c.is_finite()) {
            return Err(StellError::ConfigError(
                "circular coil centre and current must be finite".to_string(),
            ));
        }
        let (theta, phi) = normal;
        let (st, ct) = theta.sin_cos();
        let (sp, cp) = phi.sin_cos();
        let rotation = [
            [ct * cp, ct * sp, -st],
            [-sp, cp, 0.0],
            [st * cp, st * sp, ct],
        ];
        Ok(CircularCoil {
            radius,
            center,
            current,
            rotation,
        })
    }

    /// Unit normal of the coil plane.
    pub fn normal(&self) -> [f64; 3] {
        self.rotation[2]
    }

    fn to_local(&self, p: [f64; 3]) -> [f64; 3] {
        let d = [p[0] - self.center[0], p[1] - self.center[1], p[2] - self.center[2]];
        let r = &self.rotation;
        [
            r[0][0] * d[0] + r[0][1] * d[1] + r[0][2] * d[2],
            r[1][0] * d[0] + r[1][1] * d[1] + r[1][2] * d[2],
            r[2][0] * d[0] + r[2][1] * d[1] + r[2][2] * d[2],
        ]
    }

    fn local_field(&self, q: [f64; 3]) -> LocalField {
        let a = self.radius;
        let c = CIRCULAR_COIL_PREFACTOR * self.current;
        let (x, y, z) = (q[0], q[1], q[2]);
        let rho = x.hypot(y);
        let r2 = rho * rho + z * z;
        let s = a * a + r2;

        if rho < AXIS_TOLERANCE * a {
            let bz = c * PI * a * a / (2.0 * s.powf(1.5));
            let dbz = -3.0 * c * PI * a * a * z / (2.0 * s.powf(2.5));
            let mut db = [[0.0; 3]; 3];
            db[0][0] = -0.5 * dbz;
            db[1][1] = -0.5 * dbz;
            db[2][2] = dbz;
            return LocalField { b: [0.0, 0.0, bz], db };
        }

        let alpha2 = s - 2.0 * a * rho;
        let beta2 = s + 2.0 * a * rho;
        let beta = beta2.sqrt();
        let m = 4.0 * a * rho / beta2;
        let (kk, ee, dk, de) = elliptic_derivatives(m);

        let p_term = ee / (alpha2 * beta);
        let q_term = kk / beta;
        let f_term = (a * a + r2) * p_term - q_term;
        let bz = 0.5 * c * ((a * a - r2) * p_term + q_term);
        let brho = 0.5 * c * z / rho * f_term;

        // Derivatives along ρ (index 0) and z (index 1).
        let d_r2 = [2.0 * rho, 2.0 * z];
        let d_alpha2 = [2.0 * rho - 2.0 * a, 2.0 * z];
        let d_beta2 = [2.0 * rho + 2.0 * a, 2.0 * z];
        let beta4 = beta2 * beta2;
        let d_m = [
            4.0 * a / beta2 - 4.0 * a * rho * d_beta2[0] / beta4,
            -8.0 * a * rho * z / beta4,
        ];
        let mut d_bz = [0.0; 2];
        let mut d_f = [0.0; 2];
        for v in 0..2 {
            let d_beta = d_beta2[v] / (2.0 * beta);
            let d_p = de * d_m[v] / (alpha2 * beta)
                - ee * d_alpha2[v] / (alpha2 * alpha2 * beta)
                - ee * d_beta / (alpha2 * beta2);
            let d_q = dk * d_m[v] / beta - kk * d_beta / beta2;
            d_bz[v] = 0.5 * c * (-d_r2[v] * p_term + (a * a - r2) * d_p + d_q);
            d_f[v] = d_r2[v] * p_term + (a * a + r2) * d_p - d_q;
        }
        let drho_brho = 0.5 * c * (-z * f_term / (rho * rho) + z / rho * d_f[0]);
        let dz_brho = 0.5 * c * (f_term / rho + z / rho * d_f[1]);

        let (cx, sy) = (x / rho, y / rho);
        let rho3 = rho * rho * rho;
        let mut db = [[0.0; 3]; 3];
        db[0][0] = drho_brho * cx * cx + brho * y * y / rho3;
        db[1][0] = drho_brho * cx * sy - brho * x * y / rho3;
        db[2][0] = dz_brho * cx;
        db[0][1] = db[1][0];
        db[1][1] = drho_brho * sy * sy + brho * x * x / rho3;
        db[2][1] = dz_brho * sy;
        db[0][2] = d_bz[0] * cx;
        db[1][2] = d_bz[0] * sy;
        db[2][2] = d_bz[1];

        LocalField {
            b: [brho * cx, brho * sy, bz],
            db,
        }
    }
}

impl FieldSource for CircularCoil {
    fn max_b_order(&self) -> usize {
        1
    }

    fn max_a_order(&self) -> Option<usize> {
        None
    }

    fn compute_b(&self, points: &Array2<f64>, order: usize) -> StellResult<FieldDerivatives> {
        check_points(points)?;
        check_order("B", order, Some(1))?;
        let r = &self.rotation;
        let mut out = FieldDerivatives::zeros(points.nrows(), order);
        for (p, pt) in points.rows().into_iter().enumerate() {
            let local = self.local_field(self.to_local([pt[0], pt[1], pt[2]]));
            // B = Rᵀ·B', dB = Rᵀ·dB'·R
            let mut b = [0.0; 3];
            for i in 0..3 {
                b[i] = (0..3).map(|a| r[a][i] * local.b[a]).sum();
            }
            let mut db = [[0.0; 3]; 3];
            for j in 0..3 {
                for i in 0..3 {
                    let mut acc = 0.0;
                    for a in 0..3 {
                        for c in 0..3 {
                            acc += r[a][j] * local.db[a][c] * r[c][i];
                        }
                    }
                    db[j][i] = acc;
                }
            }
            out.write_point(p, 1.0, &b, &db, &[[[0.0; 3]; 3]; 3]);
        }
        Ok(out)
    }

    /// `μ0·|I|`.
    fn g0(&self) -> f64 {
        MU0 * self.current.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{CachedField, MagneticField};
    use ndarray::array;

    #[test]
    fn test_on_axis_field_matches_closed_form() {
        let coil = CircularCoil::new(0.8, [0.0, 0.0, 0.0], 1e5, (0.0, 0.0)).expect("coil");
        let z = 0.3;
        let b = coil.compute_b(&array![[0.0, 0.0, z]], 0).expect("b").value;
        let expected = MU0 * 1e5 * 0.64 / (2.0 * (0.64 + z * z).powf(1.5));
        assert!((b[[0, 2]] - expected).abs() < 1e-13 * expected);
    }

    #[test]
    fn test_axis_guard_is_continuous() {
        let coil = CircularCoil::new(1.0, [0.0, 0.0, 0.0], 1e4, (0.0, 0.0)).expect("coil");
        let b = coil
            .compute_b(&array![[0.0, 0.0, 0.2], [1e-7, 0.0, 0.2]], 1)
            .expect("b");
        assert!((b.value[[0, 2]] - b.value[[1, 2]]).abs() < 1e-9 * b.value[[0, 2]].abs());
        let g = b.gradient().expect("db");
        assert!((g[[0, 2, 2]] - g[[1, 2, 2]]).abs() < 1e-6 * g[[0, 2, 2]].abs());
    }

    #[test]
    fn test_tilted_coil_gradient_is_traceless_and_symmetric() {
        let coil = CircularCoil::new(1.2, [0.1, -0.2, 0.3], 2e4, (0.7, 1.1)).expect("coil");
        let mut f = CachedField::new(coil);
        f.set_points(&array![[0.4, 0.5, -0.3], [1.5, 0.2, 0.9]]).expect("points");
        let db = f.db_by_dx().expect("db");
        for p in 0..2 {
            let trace = db[[p, 0, 0]] + db[[p, 1, 1]] + db[[p, 2, 2]];
            let scale = db.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            assert!(trace.abs() < 1e-10 * scale);
            for i in 0..3 {
                for j in 0..3 {
                    assert!((db[[p, i, j]] - db[[p, j, i]]).abs() < 1e-10 * scale);
                }
            }
        }
    }

    #[test]
    fn test_unsupported_requests_are_config_errors() {
        let mut f = CachedField::new(CircularCoil::new(1.0, [0.0; 3], 1.0, (0.0, 0.0)).expect("coil"));
        f.set_points(&array![[0.3, 0.0, 0.1]]).expect("points");
        assert!(matches!(f.d2b_by_dxdx(), Err(StellError::ConfigError(_))));
        assert!(matches!(f.a(), Err(StellError::ConfigError(_))));
        assert!(CircularCoil::new(-1.0, [0.0; 3], 1.0, (0.0, 0.0)).is_err());
    }
}
