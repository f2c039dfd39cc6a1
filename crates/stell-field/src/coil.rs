// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Coils
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Filamentary coils and gradients with respect to their parameters.

use ndarray::{s, Array1};
use std::cell::RefCell;
use std::ops::{Add, AddAssign};
use std::rc::Rc;
use stell_geo::curve::{Curve, CurveXYZFourier};
use stell_geo::dofs::{CollectedDofs, Optimizable};
use stell_types::config::CoilConfig;
use stell_types::error::{StellError, StellResult};

/// A closed filament carrying a current.
///
/// As an optimisable object its dofs are the curve dofs followed by the
/// current.
#[derive(Debug)]
pub struct Coil {
    pub name: String,
    pub curve: Box<dyn Curve>,
    pub current: f64,
}

/// Coils are shared between fields, objectives and the dof collector.
pub type CoilHandle = Rc<RefCell<Coil>>;

impl Coil {
    pub fn new(name: impl Into<String>, curve: Box<dyn Curve>, current: f64) -> Self {
        Coil {
            name: name.into(),
            curve,
            current,
        }
    }

    pub fn from_config(config: &CoilConfig) -> StellResult<Self> {
        let curve = CurveXYZFourier::from_config(config)?;
        Ok(Coil::new(config.name.clone(), Box::new(curve), config.current))
    }

    pub fn into_handle(self) -> CoilHandle {
        Rc::new(RefCell::new(self))
    }
}

/// Build shared coil handles from a coil-set description.
pub fn coils_from_config(configs: &[CoilConfig]) -> StellResult<Vec<CoilHandle>> {
    configs
        .iter()
        .map(|c| Coil::from_config(c).map(Coil::into_handle))
        .collect()
}

impl Optimizable for Coil {
    fn name(&self) -> String {
        format!("Coil({})", self.name)
    }

    fn num_dofs(&self) -> usize {
        self.curve.num_dofs() + 1
    }

    fn get_dofs(&self) -> Array1<f64> {
        let curve = self.curve.get_dofs();
        let mut out = Array1::zeros(curve.len() + 1);
        out.slice_mut(s![..curve.len()]).assign(&curve);
        out[curve.len()] = self.current;
        out
    }

    fn set_dofs(&mut self, dofs: &Array1<f64>) -> StellResult<()> {
        let n = self.curve.num_dofs();
        if dofs.len() != n + 1 {
            return Err(StellError::dimension("Coil dofs", n + 1, dofs.len()));
        }
        self.curve.set_dofs(&dofs.slice(s![..n]).to_owned())?;
        self.current = dofs[n];
        Ok(())
    }
}

/// Gradient of a scalar with respect to every coil's curve dofs and
/// current, in coil order.
#[derive(Debug, Clone, PartialEq)]
pub struct CoilGradient {
    pub curves: Vec<Array1<f64>>,
    pub currents: Array1<f64>,
}

impl CoilGradient {
    pub fn zeros(coils: &[CoilHandle]) -> Self {
        CoilGradient {
            curves: coils
                .iter()
                .map(|c| Array1::zeros(c.borrow().curve.num_dofs()))
                .collect(),
            currents: Array1::zeros(coils.len()),
        }
    }

    pub fn scaled(mut self, factor: f64) -> Self {
        for g in &mut self.curves {
            *g *= factor;
        }
        self.currents *= factor;
        self
    }

    /// Concatenate `[curve dofs…, current]` per coil, matching the
    /// dof layout of [`Coil`].
    pub fn flatten(&self) -> Array1<f64> {
        let total: usize = self.curves.iter().map(|g| g.len() + 1).sum();
        let mut out = Array1::zeros(total);
        let mut offset = 0;
        for (g, &dc) in self.curves.iter().zip(self.currents.iter()) {
            out.slice_mut(s![offset..offset + g.len()]).assign(g);
            offset += g.len();
            out[offset] = dc;
            offset += 1;
        }
        out
    }

    /// Entry of this gradient for coil `index`, local dof `local`.
    fn component(&self, index: usize, local: usize) -> f64 {
        let g = &self.curves[index];
        if local < g.len() {
            g[local]
        } else {
            self.currents[index]
        }
    }

    /// Reorder onto the layout of a collected dof vector. Dofs owned by
    /// anything other than `coils` get zero.
    pub fn gather(&self, collected: &CollectedDofs, coils: &[CoilHandle]) -> Array1<f64> {
        let keys: Vec<*const ()> = coils.iter().map(|c| Rc::as_ptr(c) as *const ()).collect();
        collected
            .owners
            .iter()
            .zip(collected.indices.iter())
            .map(|(owner, &local)| {
                let key = Rc::as_ptr(owner) as *const ();
                keys.iter()
                    .position(|&k| k == key)
                    .map_or(0.0, |c| self.component(c, local))
            })
            .collect()
    }
}

impl AddAssign<&CoilGradient> for CoilGradient {
    fn add_assign(&mut self, rhs: &CoilGradient) {
        for (a, b) in self.curves.iter_mut().zip(rhs.curves.iter()) {
            *a += b;
        }
        self.currents += &rhs.currents;
    }
}

impl Add for CoilGradient {
    type Output = CoilGradient;

    fn add(mut self, rhs: CoilGradient) -> CoilGradient {
        self += &rhs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use stell_geo::dofs::{collect_dofs, OptimizableRef};

    fn ring(radius: f64, current: f64) -> CoilHandle {
        let mut curve = CurveXYZFourier::with_num_quadpoints(16, 1);
        curve.set_coefficient(0, 2, radius);
        curve.set_coefficient(1, 1, radius);
        Coil::new("ring", Box::new(curve), current).into_handle()
    }

    #[test]
    fn test_coil_dofs_append_current() {
        let coil = ring(1.0, 5.0);
        let dofs = coil.borrow().get_dofs();
        assert_eq!(dofs.len(), 10);
        assert_eq!(dofs[9], 5.0);
        let mut new = dofs.clone();
        new[9] = -2.0;
        new[2] = 3.0;
        coil.borrow_mut().set_dofs(&new).expect("dofs");
        assert_eq!(coil.borrow().current, -2.0);
        assert_eq!(coil.borrow().curve.get_dofs()[2], 3.0);
    }

    #[test]
    fn test_flatten_and_gather_agree() {
        let coils = vec![ring(1.0, 1.0), ring(2.0, 2.0)];
        let grad = CoilGradient {
            curves: vec![Array1::from_elem(9, 1.0), Array1::from_elem(9, 2.0)],
            currents: array![10.0, 20.0],
        };
        let flat = grad.flatten();
        assert_eq!(flat.len(), 20);
        assert_eq!(flat[9], 10.0);
        assert_eq!(flat[19], 20.0);

        let roots: Vec<OptimizableRef> = coils.iter().map(|c| c.clone() as OptimizableRef).collect();
        let collected = collect_dofs(&roots).expect("acyclic");
        assert_eq!(grad.gather(&collected, &coils), flat);
    }

    #[test]
    fn test_gradient_arithmetic() {
        let coils = vec![ring(1.0, 1.0)];
        let mut g = CoilGradient::zeros(&coils);
        g.currents[0] = 1.0;
        let h = g.clone().scaled(3.0) + g.clone();
        assert_eq!(h.currents[0], 4.0);
    }
}
