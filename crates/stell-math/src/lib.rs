//! Numerical primitives for the stellarator surface workspace.

pub mod elliptic;
pub mod linalg;
pub mod optim;
