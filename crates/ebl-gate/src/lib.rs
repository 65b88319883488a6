//! EBL Gate - Contamination detection and admissibility
//!
//! Decides, before any mutation, whether an action bundle may proceed:
//! - Six independent analyzers, one per contamination category
//! - Findings aggregated into ALLOW / HOLD / DENY
//! - Pure and deterministic; evidence travels in the [`Decision`]
//!
//! # Example
//!
//! ```rust,ignore
//! use ebl_gate::{AdmissibilityGate, Gate, Verdict};
//!
//! let gate = AdmissibilityGate::default();
//! let decision = gate.evaluate(&bundle, &snapshot);
//! if decision.verdict() != Verdict::Allow {
//!     for finding in decision.findings() {
//!         eprintln!("{finding}");
//!     }
//! }
//! ```

mod decision;
mod detectors;
mod finding;
mod gate;

pub use decision::{Decision, Verdict};
pub use detectors::ContaminationDetector;
pub use finding::{Category, Finding, Severity};
pub use gate::{AdmissibilityGate, Gate};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
