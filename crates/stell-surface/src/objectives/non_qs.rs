// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Non-Quasi-Symmetric Penalty
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Departure of |B| from quasi-axisymmetry on a surface.
//!
//! `B_QS(θ)` is the |n|-weighted φ-average of |B| and the penalty is
//! `mean(|n|·(|B| − B_QS(θ))²)`. Because `B_QS` is the weighted mean, the
//! penalty is stationary in it and drops out of the derivatives.

use super::{contract_gradient, evaluate_on, pullback, row, set_row, Geometry};
use ndarray::{Array1, Array2};
use stell_field::biot_savart::field_strength;
use stell_field::coil::CoilGradient;
use stell_field::field::MagneticField;
use stell_geo::surface::Surface;
use stell_geo::vector::scale;
use stell_types::error::{StellError, StellResult};

#[derive(Debug, Clone, Copy)]
pub struct NonQuasiSymmetricComponentPenalty {
    helicity_n: i32,
}

struct Sensitivities {
    value: f64,
    d_b: Array2<f64>,
    d_n: Array2<f64>,
}

impl NonQuasiSymmetricComponentPenalty {
    /// Only quasi-axisymmetry (`helicity_n = 0`) is supported.
    pub fn new(helicity_n: i32) -> StellResult<Self> {
        if helicity_n != 0 {
            return Err(StellError::ConfigError(format!(
                "non-QS penalty supports helicity_n = 0 only, got {helicity_n}"
            )));
        }
        Ok(NonQuasiSymmetricComponentPenalty { helicity_n })
    }

    pub fn helicity_n(&self) -> i32 {
        self.helicity_n
    }

    fn sensitivities(&self, surface: &dyn Surface, geo: &Geometry, b: &Array2<f64>) -> Sensitivities {
        let nphi = surface.quadpoints_phi().len();
        let ntheta = surface.quadpoints_theta().len();
        let m = geo.npts() as f64;
        let mod_b = field_strength(b);

        let mut b_qs = vec![0.0; ntheta];
        for (j, q) in b_qs.iter_mut().enumerate() {
            let (mut num, mut den) = (0.0, 0.0);
            for i in 0..nphi {
                let p = i * ntheta + j;
                num += mod_b[p] * geo.normal_norm[p];
                den += geo.normal_norm[p];
            }
            *q = num / den;
        }

        let mut value = 0.0;
        let mut d_b = Array2::zeros((geo.npts(), 3));
        let mut d_n = Array2::zeros((geo.npts(), 3));
        for p in 0..geo.npts() {
            let dev = mod_b[p] - b_qs[p % ntheta];
            let na = geo.normal_norm[p];
            value += na * dev * dev;
            set_row(&mut d_b, p, scale(row(b, p), 2.0 * na * dev / (m * mod_b[p])));
            set_row(&mut d_n, p, scale(row(&geo.normal, p), dev * dev / (m * na)));
        }
        Sensitivities {
            value: value / m,
            d_b,
            d_n,
        }
    }

    pub fn value(&self, surface: &dyn Surface, field: &mut dyn MagneticField) -> StellResult<f64> {
        let geo = Geometry::of(surface);
        evaluate_on(field, &geo)?;
        let b = field.b()?;
        Ok(self.sensitivities(surface, &geo, &b).value)
    }

    pub fn value_and_gradient(
        &self,
        surface: &dyn Surface,
        field: &mut dyn MagneticField,
    ) -> StellResult<(f64, Array1<f64>)> {
        let geo = Geometry::of(surface);
        evaluate_on(field, &geo)?;
        let b = field.b()?;
        let db = field.db_by_dx()?;
        let sens = self.sensitivities(surface, &geo, &b);
        let mut gx = Array2::zeros((geo.npts(), 3));
        for p in 0..geo.npts() {
            set_row(&mut gx, p, contract_gradient(&db, p, row(&sens.d_b, p)));
        }
        Ok((sens.value, pullback(surface, &geo, &gx, &sens.d_n)))
    }

    pub fn dcoils(&self, surface: &dyn Surface, field: &mut dyn MagneticField) -> StellResult<CoilGradient> {
        let geo = Geometry::of(surface);
        evaluate_on(field, &geo)?;
        let b = field.b()?;
        let sens = self.sensitivities(surface, &geo, &b);
        field.b_vjp(&sens.d_b)
    }
}
