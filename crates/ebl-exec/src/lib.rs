//! EBL Exec - Naive and gated execution of action bundles
//!
//! The two execution paths and the harness that compares them:
//! - [`NaiveExecutor`]: interprets every field as executable intent
//! - [`GatedExecutor`]: mutates only after the gate returns ALLOW
//! - [`TraceLog`]: deterministic hash-chained record of each run
//! - [`TraceComparator`]: runs labeled cases through both paths
//!
//! # Example
//!
//! ```rust,ignore
//! use ebl_exec::{GatedExecutor, GatedOutcome};
//!
//! let executor = GatedExecutor::default();
//! match executor.execute(&bundle, &mut state)? {
//!     GatedOutcome::Executed { report, .. } => println!("{} changes", report.changes()),
//!     GatedOutcome::DryRun { .. } => {}
//!     GatedOutcome::Blocked { decision } => eprintln!("blocked: {}", decision.verdict()),
//! }
//! ```

mod engine;
mod error;
mod gated;
pub mod harness;
mod naive;
pub mod trace;

pub use engine::{Applied, Engine, ExecutionReport};
pub use error::{ExecutionError, HarnessError, TraceError};
pub use gated::{GatedExecutor, GatedOutcome};
pub use harness::{CaseFixture, CaseResult, ComparatorReport, ExpectedOutcome, TraceComparator};
pub use naive::NaiveExecutor;
pub use trace::{TraceEvent, TraceKind, TraceLog};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
