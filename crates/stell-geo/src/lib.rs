//! Geometry collaborators: coil curves, toroidal surfaces and the
//! degree-of-freedom collector.

pub mod curve;
pub mod dofs;
pub mod surface;
pub mod vector;

pub use curve::{Curve, CurveXYZFourier};
pub use dofs::{collect_dofs, CollectedDofs, Optimizable, OptimizableRef};
pub use surface::{Surface, SurfaceRZFourier, SurfaceXYZTensorFourier};
