//! Surface objectives and the Boozer and QFM surface solvers.

pub mod boozer;
pub mod objectives;
pub mod qfm;

pub use boozer::adjoint::{boozer_surface_dexactresidual_dcoils_dcurrents_vjp, boozer_surface_dlsqgrad_dcoils_vjp};
pub use boozer::{
    boozer_surface_residual, stellsym_residual_mask, BoozerResidual, BoozerSolveResult, BoozerSurface,
    PenaltyEvaluation,
};
pub use objectives::{
    label_from_kind, Area, NonQuasiSymmetricComponentPenalty, QfmResidual, SurfaceLabel, ToroidalFlux,
    Volume,
};
pub use qfm::{QfmSolveResult, QfmSurface};
