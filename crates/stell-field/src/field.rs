// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Magnetic Field Interface
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Field sources, the evaluation interface and its point cache.
//!
//! Index conventions for `n` evaluation points:
//!
//! - `B[p, i]`
//! - `dB[p, j, i] = ∂B_i/∂x_j`
//! - `d2B[p, k, j, i] = ∂²B_i/∂x_k∂x_j`
//!
//! and the same for the vector potential A.

use crate::coil::CoilGradient;
use ndarray::{Array1, Array2, Array3, Array4};
use stell_types::error::{StellError, StellResult};

/// Value and optional first and second spatial derivatives of a vector
/// field at a set of points.
#[derive(Debug, Clone)]
pub struct FieldDerivatives {
    pub value: Array2<f64>,
    pub gradient: Option<Array3<f64>>,
    pub hessian: Option<Array4<f64>>,
}

impl FieldDerivatives {
    /// Zeroed storage for `npoints` points up to derivative `order`.
    pub fn zeros(npoints: usize, order: usize) -> Self {
        FieldDerivatives {
            value: Array2::zeros((npoints, 3)),
            gradient: (order >= 1).then(|| Array3::zeros((npoints, 3, 3))),
            hessian: (order >= 2).then(|| Array4::zeros((npoints, 3, 3, 3))),
        }
    }

    /// Highest derivative order held.
    pub fn order(&self) -> usize {
        if self.hessian.is_some() {
            2
        } else if self.gradient.is_some() {
            1
        } else {
            0
        }
    }

    pub fn gradient(&self) -> StellResult<&Array3<f64>> {
        self.gradient
            .as_ref()
            .ok_or_else(|| StellError::ConfigError("first derivatives were not computed".to_string()))
    }

    pub fn hessian(&self) -> StellResult<&Array4<f64>> {
        self.hessian
            .as_ref()
            .ok_or_else(|| StellError::ConfigError("second derivatives were not computed".to_string()))
    }

    /// Write `scale ·` one point's value and whichever derivatives are held.
    pub fn write_point(
        &mut self,
        p: usize,
        scale: f64,
        value: &[f64; 3],
        grad: &[[f64; 3]; 3],
        hess: &[[[f64; 3]; 3]; 3],
    ) {
        for i in 0..3 {
            self.value[[p, i]] = scale * value[i];
        }
        if let Some(g) = self.gradient.as_mut() {
            for j in 0..3 {
                for i in 0..3 {
                    g[[p, j, i]] = scale * grad[j][i];
                }
            }
        }
        if let Some(h) = self.hessian.as_mut() {
            for k in 0..3 {
                for j in 0..3 {
                    for i in 0..3 {
                        h[[p, k, j, i]] = scale * hess[k][j][i];
                    }
                }
            }
        }
    }

    /// `self += scale · other`, up to the lower of the two orders.
    pub fn add_scaled(&mut self, other: &FieldDerivatives, scale: f64) {
        self.value.scaled_add(scale, &other.value);
        if let (Some(a), Some(b)) = (self.gradient.as_mut(), other.gradient.as_ref()) {
            a.scaled_add(scale, b);
        }
        if let (Some(a), Some(b)) = (self.hessian.as_mut(), other.hessian.as_ref()) {
            a.scaled_add(scale, b);
        }
    }
}

/// A closed-form or discretised magnetic field.
pub trait FieldSource {
    /// Highest derivative order of B this source can evaluate.
    fn max_b_order(&self) -> usize;

    /// Highest derivative order of A, or `None` without a vector potential.
    fn max_a_order(&self) -> Option<usize>;

    fn compute_b(&self, points: &Array2<f64>, order: usize) -> StellResult<FieldDerivatives>;

    fn compute_a(&self, points: &Array2<f64>, order: usize) -> StellResult<FieldDerivatives> {
        let _ = (points, order);
        Err(StellError::ConfigError(
            "this field source has no vector potential".to_string(),
        ))
    }

    /// Circulation `∮ B·dl` along a toroidal loop linking every source;
    /// the default `G` of a Boozer solve.
    fn g0(&self) -> f64;
}

/// Reject a derivative order above what a source declares.
pub fn check_order(what: &str, requested: usize, max: Option<usize>) -> StellResult<()> {
    match max {
        Some(m) if requested <= m => Ok(()),
        Some(m) => Err(StellError::ConfigError(format!(
            "{what} derivative order {requested} not supported (max {m})"
        ))),
        None => Err(StellError::ConfigError(format!("{what} is not available for this field"))),
    }
}

/// Evaluation points must have shape (n, 3).
pub fn check_points(points: &Array2<f64>) -> StellResult<()> {
    if points.ncols() != 3 {
        return Err(StellError::dimension("evaluation points (columns)", 3, points.ncols()));
    }
    Ok(())
}

/// Point-bound magnetic field with cached evaluations.
///
/// Accessors compute lazily and reuse results until the points change or
/// the cache is invalidated.
pub trait MagneticField {
    fn set_points(&mut self, points: &Array2<f64>) -> StellResult<()>;
    fn points(&self) -> &Array2<f64>;

    fn b(&mut self) -> StellResult<Array2<f64>>;
    fn db_by_dx(&mut self) -> StellResult<Array3<f64>>;
    fn d2b_by_dxdx(&mut self) -> StellResult<Array4<f64>>;
    fn a(&mut self) -> StellResult<Array2<f64>>;
    fn da_by_dx(&mut self) -> StellResult<Array3<f64>>;
    fn d2a_by_dxdx(&mut self) -> StellResult<Array4<f64>>;

    /// Drop every cached evaluation.
    fn invalidate_cache(&mut self);

    fn clear_cached_properties(&mut self) {
        self.invalidate_cache();
    }

    /// Default `G` of a Boozer solve.
    fn g0(&self) -> f64;

    fn num_coils(&self) -> usize {
        0
    }

    fn coil_currents(&self) -> StellResult<Array1<f64>> {
        Err(no_coils())
    }

    /// `Σ_p v_p · ∂B_p/∂(coil dofs)`.
    fn b_vjp(&mut self, v: &Array2<f64>) -> StellResult<CoilGradient> {
        let _ = v;
        Err(no_coils())
    }

    /// The B and dB contributions of `Σ_p v_p·∂B_p + vgrad_p:∂dB_p`.
    fn b_and_db_vjp(
        &mut self,
        v: &Array2<f64>,
        vgrad: &Array3<f64>,
    ) -> StellResult<(CoilGradient, CoilGradient)> {
        let _ = (v, vgrad);
        Err(no_coils())
    }

    /// `Σ_p v_p · ∂A_p/∂(coil dofs)`.
    fn a_vjp(&mut self, v: &Array2<f64>) -> StellResult<CoilGradient> {
        let _ = v;
        Err(no_coils())
    }
}

fn no_coils() -> StellError {
    StellError::ConfigError("field has no coil degrees of freedom".to_string())
}

/// Lazily filled B and A evaluations, tagged by a generation counter.
#[derive(Debug, Clone, Default)]
pub struct FieldCache {
    generation: u64,
    b: Option<FieldDerivatives>,
    a: Option<FieldDerivatives>,
}

impl FieldCache {
    /// Bumped on every invalidation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.b = None;
        self.a = None;
    }

    /// Cached B up to `order`, computed with `compute(order)` on a miss.
    pub fn b_or_compute<F>(&mut self, order: usize, compute: F) -> StellResult<&FieldDerivatives>
    where
        F: FnOnce(usize) -> StellResult<FieldDerivatives>,
    {
        Self::fill(&mut self.b, order, compute)
    }

    pub fn a_or_compute<F>(&mut self, order: usize, compute: F) -> StellResult<&FieldDerivatives>
    where
        F: FnOnce(usize) -> StellResult<FieldDerivatives>,
    {
        Self::fill(&mut self.a, order, compute)
    }

    fn fill<F>(
        slot: &mut Option<FieldDerivatives>,
        order: usize,
        compute: F,
    ) -> StellResult<&FieldDerivatives>
    where
        F: FnOnce(usize) -> StellResult<FieldDerivatives>,
    {
        let stale = slot.as_ref().map_or(true, |d| d.order() < order);
        if stale {
            *slot = Some(compute(order)?);
        }
        slot.as_ref()
            .ok_or_else(|| StellError::ConfigError("field cache is empty".to_string()))
    }
}

/// A [`FieldSource`] bound to a set of points, with a cache.
#[derive(Debug, Clone)]
pub struct CachedField<S: FieldSource> {
    source: S,
    points: Array2<f64>,
    cache: FieldCache,
}

impl<S: FieldSource> CachedField<S> {
    pub fn new(source: S) -> Self {
        CachedField {
            source,
            points: Array2::zeros((0, 3)),
            cache: FieldCache::default(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the source; the cache is invalidated.
    pub fn source_mut(&mut self) -> &mut S {
        self.cache.invalidate();
        &mut self.source
    }

    pub fn generation(&self) -> u64 {
        self.cache.generation()
    }

    fn b_order(&mut self, order: usize) -> StellResult<&FieldDerivatives> {
        check_order("B", order, Some(self.source.max_b_order()))?;
        let (source, points) = (&self.source, &self.points);
        self.cache.b_or_compute(order, |o| source.compute_b(points, o))
    }

    fn a_order(&mut self, order: usize) -> StellResult<&FieldDerivatives> {
        check_order("A", order, self.source.max_a_order())?;
        let (source, points) = (&self.source, &self.points);
        self.cache.a_or_compute(order, |o| source.compute_a(points, o))
    }
}

impl<S: FieldSource> MagneticField for CachedField<S> {
    fn set_points(&mut self, points: &Array2<f64>) -> StellResult<()> {
        check_points(points)?;
        self.points = points.clone();
        self.cache.invalidate();
        Ok(())
    }

    fn points(&self) -> &Array2<f64> {
        &self.points
    }

    fn b(&mut self) -> StellResult<Array2<f64>> {
        Ok(self.b_order(0)?.value.clone())
    }

    fn db_by_dx(&mut self) -> StellResult<Array3<f64>> {
        Ok(self.b_order(1)?.gradient()?.clone())
    }

    fn d2b_by_dxdx(&mut self) -> StellResult<Array4<f64>> {
        Ok(self.b_order(2)?.hessian()?.clone())
    }

    fn a(&mut self) -> StellResult<Array2<f64>> {
        Ok(self.a_order(0)?.value.clone())
    }

    fn da_by_dx(&mut self) -> StellResult<Array3<f64>> {
        Ok(self.a_order(1)?.gradient()?.clone())
    }

    fn d2a_by_dxdx(&mut self) -> StellResult<Array4<f64>> {
        Ok(self.a_order(2)?.hessian()?.clone())
    }

    fn invalidate_cache(&mut self) {
        self.cache.invalidate();
    }

    fn g0(&self) -> f64 {
        self.source.g0()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Uniform field along z that counts its evaluations.
    #[derive(Debug)]
    struct Uniform {
        calls: Cell<usize>,
    }

    impl FieldSource for Uniform {
        fn max_b_order(&self) -> usize {
            1
        }
        fn max_a_order(&self) -> Option<usize> {
            None
        }
        fn compute_b(&self, points: &Array2<f64>, order: usize) -> StellResult<FieldDerivatives> {
            self.calls.set(self.calls.get() + 1);
            let mut out = FieldDerivatives::zeros(points.nrows(), order);
            out.value.column_mut(2).fill(1.0);
            Ok(out)
        }
        fn g0(&self) -> f64 {
            0.0
        }
    }

    fn field() -> CachedField<Uniform> {
        let mut f = CachedField::new(Uniform { calls: Cell::new(0) });
        f.set_points(&Array2::zeros((4, 3))).expect("points");
        f
    }

    #[test]
    fn test_cache_reuses_and_upgrades() {
        let mut f = field();
        f.b().expect("b");
        f.b().expect("b");
        assert_eq!(f.source().calls.get(), 1);
        // Asking for dB recomputes once at order 1, after which B is served.
        f.db_by_dx().expect("db");
        f.b().expect("b");
        assert_eq!(f.source().calls.get(), 2);
    }

    #[test]
    fn test_set_points_bumps_generation() {
        let mut f = field();
        let g = f.generation();
        f.b().expect("b");
        f.set_points(&Array2::ones((2, 3))).expect("points");
        assert!(f.generation() > g);
        assert_eq!(f.b().expect("b").nrows(), 2);
        assert_eq!(f.source().calls.get(), 2);
        f.clear_cached_properties();
        f.b().expect("b");
        assert_eq!(f.source().calls.get(), 3);
    }

    #[test]
    fn test_unsupported_orders_are_config_errors() {
        let mut f = field();
        assert!(matches!(f.d2b_by_dxdx(), Err(StellError::ConfigError(_))));
        assert!(matches!(f.a(), Err(StellError::ConfigError(_))));
        assert!(matches!(f.b_vjp(&Array2::zeros((4, 3))), Err(StellError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_bad_point_shape() {
        let mut f = field();
        assert!(f.set_points(&Array2::zeros((4, 2))).is_err());
    }
}
