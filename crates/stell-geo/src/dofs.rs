// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Degree-of-Freedom Collection
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Flatten the free parameters of a dependency graph of optimisable
//! objects into one vector, and write such a vector back.

use ndarray::Array1;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use stell_types::error::{StellError, StellResult};
use tracing::debug;

/// An object owning a vector of parameters.
pub trait Optimizable {
    /// Label used in error messages.
    fn name(&self) -> String;

    fn num_dofs(&self) -> usize;
    fn get_dofs(&self) -> Array1<f64>;
    fn set_dofs(&mut self, dofs: &Array1<f64>) -> StellResult<()>;

    /// `true` marks a fixed dof. `None` means every dof is free.
    fn fixed_mask(&self) -> Option<Vec<bool>> {
        None
    }

    /// Objects whose dofs this object's output depends on, in order.
    fn depends_on(&self) -> Vec<OptimizableRef> {
        Vec::new()
    }
}

pub type OptimizableRef = Rc<RefCell<dyn Optimizable>>;

/// Flat view of the free dofs of a set of owners.
///
/// `values[k]` is dof `indices[k]` of `owners[k]`.
pub struct CollectedDofs {
    pub values: Array1<f64>,
    pub owners: Vec<OptimizableRef>,
    pub indices: Vec<usize>,
}

impl std::fmt::Debug for CollectedDofs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectedDofs")
            .field("values", &self.values)
            .field("indices", &self.indices)
            .finish()
    }
}

impl CollectedDofs {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Write `x` back into the owners. Fixed dofs keep their current value.
    pub fn apply(&self, x: &Array1<f64>) -> StellResult<()> {
        if x.len() != self.values.len() {
            return Err(StellError::dimension("CollectedDofs::apply", self.values.len(), x.len()));
        }
        // Group by owner so each owner sees a single set_dofs call.
        let mut order: Vec<usize> = Vec::new();
        let mut updates: HashMap<usize, (OptimizableRef, Array1<f64>)> = HashMap::new();
        for (k, owner) in self.owners.iter().enumerate() {
            let key = owner_key(owner);
            let entry = updates.entry(key).or_insert_with(|| {
                order.push(key);
                (Rc::clone(owner), owner.borrow().get_dofs())
            });
            entry.1[self.indices[k]] = x[k];
        }
        for key in order {
            if let Some((owner, dofs)) = updates.remove(&key) {
                owner.borrow_mut().set_dofs(&dofs)?;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Grey,
    Black,
}

fn owner_key(owner: &OptimizableRef) -> usize {
    Rc::as_ptr(owner) as *const () as usize
}

fn visit(
    owner: &OptimizableRef,
    marks: &mut HashMap<usize, Mark>,
    ordered: &mut Vec<OptimizableRef>,
) -> StellResult<()> {
    let key = owner_key(owner);
    match marks.get(&key) {
        Some(Mark::Black) => return Ok(()),
        Some(Mark::Grey) => {
            return Err(StellError::CircularDependency(format!(
                "{} depends on itself",
                owner.borrow().name()
            )))
        }
        None => {}
    }
    marks.insert(key, Mark::Grey);
    ordered.push(Rc::clone(owner));
    let deps = owner.borrow().depends_on();
    for dep in &deps {
        visit(dep, marks, ordered)?;
    }
    marks.insert(key, Mark::Black);
    Ok(())
}

/// Collect the free dofs of `roots` and everything they depend on.
///
/// Owners appear in depth-first discovery order (an owner before its
/// dependencies), each once; dofs within an owner keep ascending order.
pub fn collect_dofs(roots: &[OptimizableRef]) -> StellResult<CollectedDofs> {
    let mut marks = HashMap::new();
    let mut ordered = Vec::new();
    for root in roots {
        visit(root, &mut marks, &mut ordered)?;
    }

    let mut values = Vec::new();
    let mut owners = Vec::new();
    let mut indices = Vec::new();
    for owner in &ordered {
        let (dofs, fixed) = {
            let o = owner.borrow();
            (o.get_dofs(), o.fixed_mask())
        };
        if let Some(mask) = &fixed {
            if mask.len() != dofs.len() {
                return Err(StellError::dimension("fixed mask", dofs.len(), mask.len()));
            }
        }
        for (j, &v) in dofs.iter().enumerate() {
            let is_fixed = fixed.as_ref().is_some_and(|m| m[j]);
            if !is_fixed {
                values.push(v);
                owners.push(Rc::clone(owner));
                indices.push(j);
            }
        }
    }
    debug!(owners = ordered.len(), dofs = values.len(), "collected dofs");

    Ok(CollectedDofs {
        values: Array1::from(values),
        owners,
        indices,
    })
}
