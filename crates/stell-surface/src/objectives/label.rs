// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Surface Labels
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Scalars that pick one surface out of a nested family.

use super::{block, dnormal_block, pullback, row, skew, Geometry};
use ndarray::{Array1, Array2, Axis};
use stell_field::coil::CoilGradient;
use stell_field::field::MagneticField;
use stell_geo::surface::Surface;
use stell_geo::vector::dot;
use stell_types::config::LabelKind;
use stell_types::error::{StellError, StellResult};

/// A label `J(surface)` with dof derivatives up to second order.
pub trait SurfaceLabel: std::fmt::Debug {
    fn value(&mut self, surface: &dyn Surface) -> StellResult<f64>;

    fn dsurface(&mut self, surface: &dyn Surface) -> StellResult<Array1<f64>>;

    fn d2surface(&mut self, surface: &dyn Surface) -> StellResult<Array2<f64>>;

    /// `weight·∂J/∂(coil dofs)`, or `None` for purely geometric labels.
    fn dcoils_vjp(&mut self, surface: &dyn Surface, weight: f64) -> StellResult<Option<CoilGradient>> {
        let _ = (surface, weight);
        Ok(None)
    }
}

impl<L: SurfaceLabel + ?Sized> SurfaceLabel for Box<L> {
    fn value(&mut self, surface: &dyn Surface) -> StellResult<f64> {
        (**self).value(surface)
    }

    fn dsurface(&mut self, surface: &dyn Surface) -> StellResult<Array1<f64>> {
        (**self).dsurface(surface)
    }

    fn d2surface(&mut self, surface: &dyn Surface) -> StellResult<Array2<f64>> {
        (**self).d2surface(surface)
    }

    fn dcoils_vjp(&mut self, surface: &dyn Surface, weight: f64) -> StellResult<Option<CoilGradient>> {
        (**self).dcoils_vjp(surface, weight)
    }
}

pub(crate) fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    a.view().insert_axis(Axis(1)).dot(&b.view().insert_axis(Axis(0)))
}

/// Surface area `mean|n|`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Area;

impl SurfaceLabel for Area {
    fn value(&mut self, surface: &dyn Surface) -> StellResult<f64> {
        let geo = Geometry::of(surface);
        Ok(geo.normal_norm.mean().unwrap_or(0.0))
    }

    fn dsurface(&mut self, surface: &dyn Surface) -> StellResult<Array1<f64>> {
        let geo = Geometry::of(surface);
        let m = geo.npts() as f64;
        let mut unit = geo.normal.clone();
        for (mut r, &n) in unit.rows_mut().into_iter().zip(geo.normal_norm.iter()) {
            r /= n * m;
        }
        Ok(pullback(surface, &geo, &Array2::zeros(unit.raw_dim()), &unit))
    }

    fn d2surface(&mut self, surface: &dyn Surface) -> StellResult<Array2<f64>> {
        let geo = Geometry::of(surface);
        let nd = surface.num_dofs();
        let mut h = Array2::zeros((nd, nd));
        for p in 0..geo.npts() {
            let n = row(&geo.normal, p);
            let nn = geo.normal_norm[p];
            let dn = dnormal_block(surface, &geo, p);
            let d1 = block(surface.dgammadash1_by_dcoeff(), p);
            let d2 = block(surface.dgammadash2_by_dcoeff(), p);
            let pn = skew(n).dot(&d1);
            let cross_terms = pn.t().dot(&d2);
            let g = dn.t().dot(&ndarray::arr1(&n));
            h = h + (dn.t().dot(&dn) + &cross_terms + &cross_terms.t()) / nn - outer(&g, &g) / (nn * nn * nn);
        }
        Ok(h / geo.npts() as f64)
    }
}

/// Enclosed volume `mean(x·n)/3`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Volume;

impl SurfaceLabel for Volume {
    fn value(&mut self, surface: &dyn Surface) -> StellResult<f64> {
        let geo = Geometry::of(surface);
        let total: f64 = (&geo.x * &geo.normal).sum();
        Ok(total / (3.0 * geo.npts() as f64))
    }

    fn dsurface(&mut self, surface: &dyn Surface) -> StellResult<Array1<f64>> {
        let geo = Geometry::of(surface);
        let w = 1.0 / (3.0 * geo.npts() as f64);
        Ok(pullback(surface, &geo, &(&geo.normal * w), &(&geo.x * w)))
    }

    fn d2surface(&mut self, surface: &dyn Surface) -> StellResult<Array2<f64>> {
        let geo = Geometry::of(surface);
        let nd = surface.num_dofs();
        let mut h = Array2::zeros((nd, nd));
        for p in 0..geo.npts() {
            let dn = dnormal_block(surface, &geo, p);
            let d0 = block(surface.dgamma_by_dcoeff(), p);
            let d1 = block(surface.dgammadash1_by_dcoeff(), p);
            let d2 = block(surface.dgammadash2_by_dcoeff(), p);
            let q = skew(row(&geo.x, p)).dot(&d1);
            let a = d0.t().dot(&dn);
            let b = q.t().dot(&d2);
            h = h + &a + &a.t() + &b + &b.t();
        }
        Ok(h / (3.0 * geo.npts() as f64))
    }
}

/// Toroidal flux `mean_θ A(x(φ_idx, θ))·x_θ` through the cross-section at
/// φ index `idx`.
///
/// Holds its own field so that its evaluation points never disturb the
/// field used by a solver.
#[derive(Debug)]
pub struct ToroidalFlux<F: MagneticField> {
    pub idx: usize,
    field: F,
}

impl<F: MagneticField> ToroidalFlux<F> {
    pub fn new(idx: usize, field: F) -> Self {
        ToroidalFlux { idx, field }
    }

    pub fn field(&self) -> &F {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut F {
        &mut self.field
    }

    /// Grid indices of the cross-section and its points and tangents.
    fn section(&mut self, surface: &dyn Surface) -> StellResult<(Vec<usize>, Geometry)> {
        let nphi = surface.quadpoints_phi().len();
        if self.idx >= nphi {
            return Err(StellError::ConfigError(format!(
                "toroidal flux index {} out of range for {nphi} φ points",
                self.idx
            )));
        }
        let ntheta = surface.quadpoints_theta().len();
        let geo = Geometry::of(surface);
        let points: Vec<usize> = (0..ntheta).map(|j| self.idx * ntheta + j).collect();
        let section = geo.x.select(Axis(0), &points);
        self.field.set_points(&section)?;
        Ok((points, geo))
    }
}

impl<F: MagneticField + std::fmt::Debug> SurfaceLabel for ToroidalFlux<F> {
    fn value(&mut self, surface: &dyn Surface) -> StellResult<f64> {
        let (points, geo) = self.section(surface)?;
        let a = self.field.a()?;
        let total: f64 = points
            .iter()
            .enumerate()
            .map(|(j, &p)| dot(row(&a, j), row(&geo.xtheta, p)))
            .sum();
        Ok(total / points.len() as f64)
    }

    fn dsurface(&mut self, surface: &dyn Surface) -> StellResult<Array1<f64>> {
        let (points, geo) = self.section(surface)?;
        let a = self.field.a()?;
        let da = self.field.da_by_dx()?;
        let mut g = Array1::zeros(surface.num_dofs());
        for (j, &p) in points.iter().enumerate() {
            let d0 = block(surface.dgamma_by_dcoeff(), p);
            let d2 = block(surface.dgammadash2_by_dcoeff(), p);
            let chain = super::contract_gradient(&da, j, row(&geo.xtheta, p));
            g = g + d0.t().dot(&ndarray::arr1(&chain)) + d2.t().dot(&ndarray::arr1(&row(&a, j)));
        }
        Ok(g / points.len() as f64)
    }

    fn d2surface(&mut self, surface: &dyn Surface) -> StellResult<Array2<f64>> {
        let (points, geo) = self.section(surface)?;
        let da = self.field.da_by_dx()?;
        let d2a = self.field.d2a_by_dxdx()?;
        let nd = surface.num_dofs();
        let mut h = Array2::zeros((nd, nd));
        for (j, &p) in points.iter().enumerate() {
            let t = row(&geo.xtheta, p);
            let d0 = block(surface.dgamma_by_dcoeff(), p);
            let d2 = block(surface.dgammadash2_by_dcoeff(), p);
            let m = Array2::from_shape_fn((3, 3), |(k, l)| (0..3).map(|i| d2a[[j, k, l, i]] * t[i]).sum());
            let dam = Array2::from_shape_fn((3, 3), |(l, i)| da[[j, l, i]]);
            let mixed = d0.t().dot(&dam).dot(&d2);
            h = h + d0.t().dot(&m).dot(&d0) + &mixed + &mixed.t();
        }
        Ok(h / points.len() as f64)
    }

    fn dcoils_vjp(&mut self, surface: &dyn Surface, weight: f64) -> StellResult<Option<CoilGradient>> {
        let (points, geo) = self.section(surface)?;
        let scale = weight / points.len() as f64;
        let v = geo.xtheta.select(Axis(0), &points) * scale;
        Ok(Some(self.field.a_vjp(&v)?))
    }
}

/// Label named by a workflow config. The flux label evaluates `field` on
/// the cross-section at φ index 0.
pub fn label_from_kind<F>(kind: LabelKind, field: Option<F>) -> StellResult<Box<dyn SurfaceLabel>>
where
    F: MagneticField + std::fmt::Debug + 'static,
{
    match kind {
        LabelKind::Area => Ok(Box::new(Area)),
        LabelKind::Volume => Ok(Box::new(Volume)),
        LabelKind::ToroidalFlux => {
            let field = field.ok_or_else(|| {
                StellError::ConfigError("toroidal flux label needs a magnetic field".to_string())
            })?;
            Ok(Box::new(ToroidalFlux::new(0, field)))
        }
    }
}
