//! Magnetic field evaluators: filamentary coils through Biot-Savart and
//! closed-form analytic fields, with coil sensitivities.

pub mod analytic;
pub mod biot_savart;
pub mod coil;
pub mod field;
pub mod fieldline;

pub use analytic::{CircularCoil, ScalarPotential, ScalarPotentialField, ToroidalField, UniformTransformField};
pub use biot_savart::BiotSavart;
pub use coil::{coils_from_config, Coil, CoilGradient, CoilHandle};
pub use field::{CachedField, FieldDerivatives, FieldSource, MagneticField};
pub use fieldline::{trace_fieldline, FieldlineConfig, FieldlineStop, FieldlineTrace, PlaneHit, StoppingCriterion};
