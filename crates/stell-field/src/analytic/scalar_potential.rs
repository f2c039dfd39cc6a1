// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Scalar Potential Field
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Vacuum field `B = ∇Φ` of a potential given in cylindrical coordinates.

use crate::field::{check_order, check_points, FieldDerivatives, FieldSource};
use ndarray::Array2;
use stell_types::error::StellResult;

/// A magnetic scalar potential Φ(R, φ, Z).
///
/// Φ may be multivalued in φ; only its derivatives enter the field.
pub trait ScalarPotential: std::fmt::Debug {
    /// `[∂_R Φ, ∂_φ Φ, ∂_Z Φ]`.
    fn gradient(&self, r: f64, phi: f64, z: f64) -> [f64; 3];

    /// Second derivatives, indexed in the same (R, φ, Z) order.
    fn hessian(&self, r: f64, phi: f64, z: f64) -> [[f64; 3]; 3];

    /// Jump of Φ over one toroidal turn, equal to `∮ B·dl`.
    fn circulation(&self) -> f64;
}

#[derive(Debug, Clone)]
pub struct ScalarPotentialField<P: ScalarPotential> {
    pub potential: P,
}

impl<P: ScalarPotential> ScalarPotentialField<P> {
    pub fn new(potential: P) -> Self {
        ScalarPotentialField { potential }
    }
}

impl<P: ScalarPotential> FieldSource for ScalarPotentialField<P> {
    fn max_b_order(&self) -> usize {
        1
    }

    fn max_a_order(&self) -> Option<usize> {
        None
    }

    fn compute_b(&self, points: &Array2<f64>, order: usize) -> StellResult<FieldDerivatives> {
        check_points(points)?;
        check_order("B", order, Some(1))?;
        let mut out = FieldDerivatives::zeros(points.nrows(), order);
        for (p, pt) in points.rows().into_iter().enumerate() {
            let (x, y, z) = (pt[0], pt[1], pt[2]);
            let r = x.hypot(y);
            let phi = y.atan2(x);
            let (s, c) = phi.sin_cos();
            let g = self.potential.gradient(r, phi, z);

            // Physical cylindrical components.
            let (b_r, b_phi, b_z) = (g[0], g[1] / r, g[2]);
            let b = [b_r * c - b_phi * s, b_r * s + b_phi * c, b_z];

            let mut db = [[0.0; 3]; 3];
            if order >= 1 {
                let h = self.potential.hessian(r, phi, z);
                // Rows: ∂_R, ∂_φ, ∂_Z of (B_R, B_φ, B_Z).
                let d_br = [h[0][0], h[0][1], h[0][2]];
                let d_bphi = [h[1][0] / r - g[1] / (r * r), h[1][1] / r, h[1][2] / r];
                let d_bz = [h[2][0], h[2][1], h[2][2]];

                let d_bx = [
                    d_br[0] * c - d_bphi[0] * s,
                    d_br[1] * c - b_r * s - d_bphi[1] * s - b_phi * c,
                    d_br[2] * c - d_bphi[2] * s,
                ];
                let d_by = [
                    d_br[0] * s + d_bphi[0] * c,
                    d_br[1] * s + b_r * c + d_bphi[1] * c - b_phi * s,
                    d_br[2] * s + d_bphi[2] * c,
                ];
                for (i, d) in [d_bx, d_by, d_bz].iter().enumerate() {
                    db[0][i] = c * d[0] - s / r * d[1];
                    db[1][i] = s * d[0] + c / r * d[1];
                    db[2][i] = d[2];
                }
            }
            out.write_point(p, 1.0, &b, &db, &[[[0.0; 3]; 3]; 3]);
        }
        Ok(out)
    }

    fn g0(&self) -> f64 {
        self.potential.circulation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic::ToroidalField;
    use crate::field::{CachedField, MagneticField};
    use ndarray::array;
    use std::f64::consts::PI;

    /// Φ = k·φ, the potential of a purely toroidal field.
    #[derive(Debug)]
    struct Azimuthal {
        k: f64,
    }

    impl ScalarPotential for Azimuthal {
        fn gradient(&self, _r: f64, _phi: f64, _z: f64) -> [f64; 3] {
            [0.0, self.k, 0.0]
        }
        fn hessian(&self, _r: f64, _phi: f64, _z: f64) -> [[f64; 3]; 3] {
            [[0.0; 3]; 3]
        }
        fn circulation(&self) -> f64 {
            2.0 * PI * self.k
        }
    }

    /// Φ = R²·cos(2φ)/2 + Z², smooth and single valued.
    #[derive(Debug)]
    struct Quadrupole;

    impl ScalarPotential for Quadrupole {
        fn gradient(&self, r: f64, phi: f64, z: f64) -> [f64; 3] {
            let (s2, c2) = (2.0 * phi).sin_cos();
            [r * c2, -r * r * s2, 2.0 * z]
        }
        fn hessian(&self, r: f64, phi: f64, _z: f64) -> [[f64; 3]; 3] {
            let (s2, c2) = (2.0 * phi).sin_cos();
            [
                [c2, -2.0 * r * s2, 0.0],
                [-2.0 * r * s2, -2.0 * r * r * c2, 0.0],
                [0.0, 0.0, 2.0],
            ]
        }
        fn circulation(&self) -> f64 {
            0.0
        }
    }

    #[test]
    fn test_azimuthal_potential_matches_toroidal_field() {
        let pts = array![[1.1, 0.2, 0.3], [-0.4, 0.9, -0.1]];
        let mut sp = CachedField::new(ScalarPotentialField::new(Azimuthal { k: 0.7 }));
        let mut tf = CachedField::new(ToroidalField::new(1.0, 0.7).expect("field"));
        sp.set_points(&pts).expect("points");
        tf.set_points(&pts).expect("points");
        let diff_b = &sp.b().expect("b") - &tf.b().expect("b");
        let diff_db = &sp.db_by_dx().expect("db") - &tf.db_by_dx().expect("db");
        assert!(diff_b.iter().all(|v| v.abs() < 1e-13));
        assert!(diff_db.iter().all(|v| v.abs() < 1e-13));
        assert!((sp.g0() - tf.g0()).abs() < 1e-14);
    }

    #[test]
    fn test_quadrupole_matches_cartesian_form() {
        // In Cartesian form Φ = (x² − y²)/2 + z², so B = (x, −y, 2z).
        let src = ScalarPotentialField::new(Quadrupole);
        let pts = array![[0.8, -0.6, 0.25]];
        let out = src.compute_b(&pts, 1).expect("b");
        let b = &out.value;
        assert!((b[[0, 0]] - 0.8).abs() < 1e-13);
        assert!((b[[0, 1]] - 0.6).abs() < 1e-13);
        assert!((b[[0, 2]] - 0.5).abs() < 1e-13);
        let db = out.gradient().expect("db");
        let expected = [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 2.0]];
        for j in 0..3 {
            for i in 0..3 {
                assert!((db[[0, j, i]] - expected[j][i]).abs() < 1e-12, "dB[{j}][{i}]");
            }
        }
    }

    #[test]
    fn test_second_derivatives_unsupported() {
        let mut f = CachedField::new(ScalarPotentialField::new(Quadrupole));
        f.set_points(&array![[1.0, 0.0, 0.0]]).expect("points");
        assert!(f.d2b_by_dxdx().is_err());
    }
}
