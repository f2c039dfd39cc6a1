// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Toroidal Field
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Purely toroidal vacuum field `B = B0·R0/R · φ̂`.
//!
//! With `k = B0·R0` and `u = 1/R²`:
//!
//! ```text
//! B = k·(−y·u, x·u, 0)
//! A = k·z·(x·u, y·u, 0)
//! ```

use super::set_symmetric;
use crate::field::{check_order, check_points, FieldDerivatives, FieldSource};
use ndarray::Array2;
use stell_types::constants::TWO_PI;
use stell_types::error::{StellError, StellResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToroidalField {
    pub r0: f64,
    pub b0: f64,
}

/// `u = 1/R²` and its in-plane derivatives.
struct InverseSquare {
    u: f64,
    ux: f64,
    uy: f64,
    uxx: f64,
    uxy: f64,
    uyy: f64,
}

impl InverseSquare {
    fn at(x: f64, y: f64) -> Self {
        let u = 1.0 / (x * x + y * y);
        let (u2, u3) = (u * u, u * u * u);
        InverseSquare {
            u,
            ux: -2.0 * x * u2,
            uy: -2.0 * y * u2,
            uxx: -2.0 * u2 + 8.0 * x * x * u3,
            uxy: 8.0 * x * y * u3,
            uyy: -2.0 * u2 + 8.0 * y * y * u3,
        }
    }
}

impl ToroidalField {
    pub fn new(r0: f64, b0: f64) -> StellResult<Self> {
        if !r0.is_finite() || r0 <= 0.0 || !b0.is_finite() {
            return Err(StellError::ConfigError(format!(
                "toroidal field needs finite R0 > 0 and B0, got R0={r0}, B0={b0}"
            )));
        }
        Ok(ToroidalField { r0, b0 })
    }

    fn k(&self) -> f64 {
        self.b0 * self.r0
    }
}

impl FieldSource for ToroidalField {
    fn max_b_order(&self) -> usize {
        2
    }

    fn max_a_order(&self) -> Option<usize> {
        Some(2)
    }

    fn compute_b(&self, points: &Array2<f64>, order: usize) -> StellResult<FieldDerivatives> {
        check_points(points)?;
        check_order("B", order, Some(2))?;
        let k = self.k();
        let mut out = FieldDerivatives::zeros(points.nrows(), order);
        for (p, pt) in points.rows().into_iter().enumerate() {
            let (x, y) = (pt[0], pt[1]);
            let w = InverseSquare::at(x, y);
            let b = [-k * y * w.u, k * x * w.u, 0.0];

            let mut db = [[0.0; 3]; 3];
            db[0][0] = -k * y * w.ux;
            db[1][0] = -k * (w.u + y * w.uy);
            db[0][1] = k * (w.u + x * w.ux);
            db[1][1] = k * x * w.uy;

            let mut d2b = [[[0.0; 3]; 3]; 3];
            if order >= 2 {
                d2b[0][0][0] = -k * y * w.uxx;
                set_symmetric(&mut d2b, 0, 1, 0, -k * (w.ux + y * w.uxy));
                d2b[1][1][0] = -k * (2.0 * w.uy + y * w.uyy);
                d2b[0][0][1] = k * (2.0 * w.ux + x * w.uxx);
                set_symmetric(&mut d2b, 0, 1, 1, k * (w.uy + x * w.uxy));
                d2b[1][1][1] = k * x * w.uyy;
            }
            out.write_point(p, 1.0, &b, &db, &d2b);
        }
        Ok(out)
    }

    fn compute_a(&self, points: &Array2<f64>, order: usize) -> StellResult<FieldDerivatives> {
        check_points(points)?;
        check_order("A", order, Some(2))?;
        let k = self.k();
        let mut out = FieldDerivatives::zeros(points.nrows(), order);
        for (p, pt) in points.rows().into_iter().enumerate() {
            let (x, y, z) = (pt[0], pt[1], pt[2]);
            let w = InverseSquare::at(x, y);
            let kz = k * z;
            let a = [kz * x * w.u, kz * y * w.u, 0.0];

            let mut da = [[0.0; 3]; 3];
            da[0][0] = kz * (w.u + x * w.ux);
            da[1][0] = kz * x * w.uy;
            da[2][0] = k * x * w.u;
            da[0][1] = kz * y * w.ux;
            da[1][1] = kz * (w.u + y * w.uy);
            da[2][1] = k * y * w.u;

            let mut d2a = [[[0.0; 3]; 3]; 3];
            if order >= 2 {
                d2a[0][0][0] = kz * (2.0 * w.ux + x * w.uxx);
                set_symmetric(&mut d2a, 0, 1, 0, kz * (w.uy + x * w.uxy));
                d2a[1][1][0] = kz * x * w.uyy;
                set_symmetric(&mut d2a, 0, 2, 0, k * (w.u + x * w.ux));
                set_symmetric(&mut d2a, 1, 2, 0, k * x * w.uy);

                d2a[0][0][1] = kz * y * w.uxx;
                set_symmetric(&mut d2a, 0, 1, 1, kz * (w.ux + y * w.uxy));
                d2a[1][1][1] = kz * (2.0 * w.uy + y * w.uyy);
                set_symmetric(&mut d2a, 0, 2, 1, k * y * w.ux);
                set_symmetric(&mut d2a, 1, 2, 1, k * (w.u + y * w.uy));
            }
            out.write_point(p, 1.0, &a, &da, &d2a);
        }
        Ok(out)
    }

    /// `2π·B0·R0`.
    fn g0(&self) -> f64 {
        TWO_PI * self.k()
    }
}
