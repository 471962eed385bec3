//! Uncertainty Gate
//! Pilot in Command: Confidence Refinement
//! Mission: turn the boss brain's raw confidence into a calibrated,
//! disagreement-aware ALLOW/BLOCK before the RL gate ever sees it.
//! No single Python module in the original covers this end to end —
//! grounded on the teacher's `risk.rs` use of `statrs`/`nalgebra` for
//! the underlying numerics.

pub mod calibrator;
pub mod conformal;
pub mod ensemble;
pub mod gate;

pub use calibrator::Calibrator;
pub use conformal::ConformalPredictor;
pub use ensemble::{Ensemble, EnsembleOutput};
pub use gate::{UncertaintyConfig, UncertaintyGate, UncertaintyVerdict};
