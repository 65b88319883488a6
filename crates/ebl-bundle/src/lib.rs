//! EBL Bundle - Action bundles, context snapshots and gate policy
//!
//! Everything the gate reads:
//! - Structurally validated [`ActionBundle`]s and their sub-operations
//! - [`ContextSnapshot`]s captured once per evaluation
//! - Versioned [`GatePolicy`] tables loaded from TOML
//! - The [`reading`] rules describing how a naive processor interprets a
//!   bundle
//!
//! # Example
//!
//! ```rust,ignore
//! use ebl_bundle::{ActionBundle, ContextSnapshot, GatePolicy};
//! use ebl_state::ResourceState;
//!
//! let bundle = ActionBundle::from_json(input)?;
//! let policy = GatePolicy::default();
//! let snapshot = ContextSnapshot::for_bundle(&ResourceState::new(), &bundle, &policy);
//! ```

mod bundle;
mod error;
mod operation;
mod policy;
pub mod reading;
mod snapshot;

pub use bundle::{ActionBundle, SubOperation, BATCH_OPERATIONS_FIELD, REQUIRED_FIELDS};
pub use error::{BundleError, PolicyError};
pub use operation::OperationType;
pub use policy::{
    AuthorityRule, FieldDomain, FieldPolicy, GatePolicy, OrderingPolicy, ScopePolicy,
    SideEffectPolicy, SyncPolicy, POLICY_VERSION,
};
pub use reading::{DescriptiveEffect, OrderingDirective, SyncDirection};
pub use snapshot::{ContextSnapshot, ExecutionMode};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
