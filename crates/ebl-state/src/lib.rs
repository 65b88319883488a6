//! EBL Resource State Model
//!
//! Filesystem-like and database-like state held as two insertion-ordered
//! key→value maps, plus the mutation semantics every executor shares.
//!
//! # Core Concepts
//!
//! - [`ResourceState`]: exclusive owner of both maps
//! - [`Target`]: a parsed `target_resource` (domain + selector)
//! - [`Resolution`]: how a target resolves against the live keys
//! - [`Mutation`]: the only way state changes
//! - [`SharedState`]: single-writer handle for state shared across threads
//!
//! # Example
//!
//! ```rust,ignore
//! use ebl_state::{Domain, Mutation, ResourceState, ResolveMode, Target};
//!
//! let mut state = ResourceState::new();
//! state.apply(&Mutation::upsert(Domain::Filesystem, "/data/a.json", "x".into()));
//!
//! let target = Target::parse("/data/*");
//! let resolution = state.resolve(&target, ResolveMode::Existing)?;
//! assert_eq!(resolution.first(), Some("/data/a.json"));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod domain;
mod error;
mod mutation;
mod shared;
mod state;

pub use domain::{Domain, Target};
pub use error::StateError;
pub use mutation::{Mutation, MutationEffect};
pub use shared::SharedState;
pub use state::{Resolution, ResolveMode, ResourceState};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
