// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Uniform-Transform Field
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Field whose lines wind with the same rotational transform ι on every
//! circular torus about the circle `R = R0, z = 0`.
//!
//! With `R̂`, `φ̂`, `ẑ` the cylindrical basis and `k = B0·R0`:
//!
//! ```text
//! u = R·φ̂ + ι·(−z·R̂ + (R − R0)·ẑ)
//! B = k·u / |u|²
//! ```
//!
//! Every such torus, parametrised by the geometric angles, is then an
//! exact Boozer surface with the field's ι and `G = 2π·B0·R0`. The field
//! is not divergence free; it exists to give the surface solvers a known
//! solution with non-zero transform.

use crate::field::{check_order, check_points, FieldDerivatives, FieldSource};
use ndarray::Array2;
use stell_types::constants::TWO_PI;
use stell_types::error::{StellError, StellResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformTransformField {
    pub r0: f64,
    pub b0: f64,
    pub iota: f64,
}

type Grad = [[f64; 3]; 3];
type Hess = [[[f64; 3]; 3]; 3];

/// `x/R`, `y/R` and `R` with their first and second derivatives.
struct Radial {
    value: [f64; 3],
    grad: [[f64; 3]; 3],
    hess: [Grad; 3],
}

impl Radial {
    fn at(x: f64, y: f64) -> Self {
        let r2 = x * x + y * y;
        let r = r2.sqrt();
        let r3 = r2 * r;
        let r5 = r3 * r2;
        let mut hess = [[[0.0; 3]; 3]; 3];
        // x/R
        hess[0][0][0] = -3.0 * x * y * y / r5;
        hess[0][0][1] = y * (2.0 * x * x - y * y) / r5;
        hess[0][1][1] = x * (2.0 * y * y - x * x) / r5;
        // y/R
        hess[1][0][0] = y * (2.0 * x * x - y * y) / r5;
        hess[1][0][1] = x * (2.0 * y * y - x * x) / r5;
        hess[1][1][1] = -3.0 * x * x * y / r5;
        // R
        hess[2][0][0] = y * y / r3;
        hess[2][0][1] = -x * y / r3;
        hess[2][1][1] = x * x / r3;
        for h in hess.iter_mut() {
            h[1][0] = h[0][1];
        }
        Radial {
            value: [x / r, y / r, r],
            grad: [
                [y * y / r3, -x * y / r3, 0.0],
                [-x * y / r3, x * x / r3, 0.0],
                [x / r, y / r, 0.0],
            ],
            hess,
        }
    }
}

impl UniformTransformField {
    pub fn new(r0: f64, b0: f64, iota: f64) -> StellResult<Self> {
        if !r0.is_finite() || r0 <= 0.0 || !b0.is_finite() || !iota.is_finite() {
            return Err(StellError::ConfigError(format!(
                "uniform-transform field needs finite R0 > 0, B0 and iota, got R0={r0}, B0={b0}, iota={iota}"
            )));
        }
        Ok(UniformTransformField { r0, b0, iota })
    }

    /// `u` with `∂_j u_i` and `∂_k ∂_j u_i` at one point.
    fn direction(&self, x: f64, y: f64, z: f64) -> ([f64; 3], Grad, Hess) {
        let rad = Radial::at(x, y);
        let iota = self.iota;
        let mut u = [-y, x, iota * (rad.value[2] - self.r0)];
        let mut du = [[0.0; 3]; 3];
        let mut d2u = [[[0.0; 3]; 3]; 3];
        du[1][0] = -1.0;
        du[0][1] = 1.0;
        // Components 0 and 1 carry −ι·z·(x/R) and −ι·z·(y/R).
        for i in 0..2 {
            u[i] -= iota * z * rad.value[i];
            for j in 0..3 {
                du[j][i] -= iota * z * rad.grad[i][j];
                for k in 0..3 {
                    d2u[k][j][i] -= iota * z * rad.hess[i][k][j];
                }
                d2u[2][j][i] -= iota * rad.grad[i][j];
                d2u[j][2][i] -= iota * rad.grad[i][j];
            }
            du[2][i] -= iota * rad.value[i];
        }
        for j in 0..3 {
            du[j][2] = iota * rad.grad[2][j];
            for k in 0..3 {
                d2u[k][j][2] = iota * rad.hess[2][k][j];
            }
        }
        (u, du, d2u)
    }
}

impl FieldSource for UniformTransformField {
    fn max_b_order(&self) -> usize {
        2
    }

    fn max_a_order(&self) -> Option<usize> {
        None
    }

    fn compute_b(&self, points: &Array2<f64>, order: usize) -> StellResult<FieldDerivatives> {
        check_points(points)?;
        check_order("B", order, Some(2))?;
        let k = self.b0 * self.r0;
        let mut out = FieldDerivatives::zeros(points.nrows(), order);
        for (p, pt) in points.rows().into_iter().enumerate() {
            let (u, du, d2u) = self.direction(pt[0], pt[1], pt[2]);

            // w = 1/|u|² and its derivatives.
            let q: f64 = u.iter().map(|v| v * v).sum();
            let w = 1.0 / q;
            let mut dq = [0.0; 3];
            let mut d2q = [[0.0; 3]; 3];
            for j in 0..3 {
                dq[j] = 2.0 * (0..3).map(|m| u[m] * du[j][m]).sum::<f64>();
                for l in 0..3 {
                    d2q[l][j] = 2.0 * (0..3).map(|m| du[l][m] * du[j][m] + u[m] * d2u[l][j][m]).sum::<f64>();
                }
            }
            let dw: Vec<f64> = dq.iter().map(|d| -d * w * w).collect();
            let mut d2w = [[0.0; 3]; 3];
            for l in 0..3 {
                for j in 0..3 {
                    d2w[l][j] = -d2q[l][j] * w * w + 2.0 * dq[l] * dq[j] * w * w * w;
                }
            }

            let b = [u[0] * w, u[1] * w, u[2] * w];
            let mut db = [[0.0; 3]; 3];
            let mut d2b = [[[0.0; 3]; 3]; 3];
            for i in 0..3 {
                for j in 0..3 {
                    db[j][i] = du[j][i] * w + u[i] * dw[j];
                    if order >= 2 {
                        for l in 0..3 {
                            d2b[l][j][i] = d2u[l][j][i] * w
                                + du[j][i] * dw[l]
                                + du[l][i] * dw[j]
                                + u[i] * d2w[l][j];
                        }
                    }
                }
            }
            out.write_point(p, k, &b, &db, &d2b);
        }
        Ok(out)
    }

    /// `2π·B0·R0`.
    fn g0(&self) -> f64 {
        TWO_PI * self.b0 * self.r0
    }
}
