// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Quadratic Flux Residual
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Normalised quadratic flux `Σ (B·n̂)²|n| / Σ |B|²|n|`.

use super::{contract_gradient, evaluate_on, pullback, row, set_row, Geometry};
use ndarray::{Array1, Array2};
use stell_field::coil::CoilGradient;
use stell_field::field::MagneticField;
use stell_geo::surface::Surface;
use stell_geo::vector::{add, dot, scale};
use stell_types::error::StellResult;

#[derive(Debug, Clone, Copy, Default)]
pub struct QfmResidual;

/// Value and its sensitivities to B and n at every grid point.
struct Sensitivities {
    value: f64,
    d_b: Array2<f64>,
    d_n: Array2<f64>,
}

fn sensitivities(geo: &Geometry, b: &Array2<f64>) -> Sensitivities {
    let npts = geo.npts();
    let mut num = 0.0;
    let mut den = 0.0;
    for p in 0..npts {
        let bp = row(b, p);
        let bn = dot(bp, row(&geo.normal, p));
        let nn = geo.normal_norm[p];
        num += bn * bn / nn;
        den += dot(bp, bp) * nn;
    }
    let value = num / den;

    let mut d_b = Array2::zeros((npts, 3));
    let mut d_n = Array2::zeros((npts, 3));
    for p in 0..npts {
        let bp = row(b, p);
        let n = row(&geo.normal, p);
        let nn = geo.normal_norm[p];
        let bn = dot(bp, n);
        let b2 = dot(bp, bp);
        set_row(
            &mut d_b,
            p,
            add(scale(n, 2.0 * bn / (nn * den)), scale(bp, -2.0 * value * nn / den)),
        );
        let coeff_n = -bn * bn / (nn * nn * nn * den) - value * b2 / (nn * den);
        set_row(&mut d_n, p, add(scale(bp, 2.0 * bn / (nn * den)), scale(n, coeff_n)));
    }
    Sensitivities { value, d_b, d_n }
}

impl QfmResidual {
    pub fn value(&self, surface: &dyn Surface, field: &mut dyn MagneticField) -> StellResult<f64> {
        let geo = Geometry::of(surface);
        evaluate_on(field, &geo)?;
        let b = field.b()?;
        Ok(sensitivities(&geo, &b).value)
    }

    /// Value and gradient with respect to the surface dofs.
    pub fn value_and_gradient(
        &self,
        surface: &dyn Surface,
        field: &mut dyn MagneticField,
    ) -> StellResult<(f64, Array1<f64>)> {
        let geo = Geometry::of(surface);
        evaluate_on(field, &geo)?;
        let b = field.b()?;
        let db = field.db_by_dx()?;
        let sens = sensitivities(&geo, &b);
        let mut gx = Array2::zeros((geo.npts(), 3));
        for p in 0..geo.npts() {
            set_row(&mut gx, p, contract_gradient(&db, p, row(&sens.d_b, p)));
        }
        Ok((sens.value, pullback(surface, &geo, &gx, &sens.d_n)))
    }

    /// Gradient with respect to the coil dofs.
    pub fn dcoils(&self, surface: &dyn Surface, field: &mut dyn MagneticField) -> StellResult<CoilGradient> {
        let geo = Geometry::of(surface);
        evaluate_on(field, &geo)?;
        let b = field.b()?;
        let sens = sensitivities(&geo, &b);
        field.b_vjp(&sens.d_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stell_field::analytic::ToroidalField;
    use stell_field::field::CachedField;
    use stell_geo::surface::{quadpoints, SurfaceRZFourier};

    #[test]
    fn test_axisymmetric_torus_is_a_flux_surface_of_toroidal_field() {
        let mut s = SurfaceRZFourier::new(2, 1, 1, true, quadpoints(10, 1.0), quadpoints(12, 1.0));
        s.set_torus(1.0, 0.3);
        let mut field = CachedField::new(ToroidalField::new(1.0, 1.0).expect("field"));
        let (value, grad) = QfmResidual.value_and_gradient(&s, &mut field).expect("qfm");
        assert!(value.abs() < 1e-28);
        assert!(grad.iter().all(|g| g.abs() < 1e-12));
    }
}
