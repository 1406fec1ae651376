//! # Tether Merge
//!
//! Deterministic conflict resolution for local-first data sync.
//!
//! This crate is the pure core of Tether: given a local value, a remote
//! value, and optionally a common ancestor, it classifies the divergence and
//! produces a resolution. The same inputs always produce the same outputs.
//!
//! ## Design Principles
//!
//! - **No IO**: the resolver has no knowledge of storage, network, or platform
//! - **Deterministic**: merges are structural and order-independent
//! - **Testable**: pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Values
//!
//! Data is modeled as a tagged recursive [`Value`] (null, booleans, numbers,
//! strings, sequences, and string-keyed mappings). Mapping keys are kept
//! sorted, so serialization is canonical and [`stable_hash`] gives a stable
//! identity for set membership in array merges.
//!
//! ### Conflicts
//!
//! A [`SyncConflict`] carries both sides of a divergence (plus the ancestor
//! when known). [`detect_conflict_type`] classifies it into one of seven
//! [`ConflictType`]s, and the [`ConflictResolver`] routes each class to a
//! [`ConflictResolution`]: upload, download, merge, skip, or delete.
//!
//! ### Merging
//!
//! Two-way merges reconcile mappings key-wise and sequences by configurable
//! strategy (union by structural hash is the default). Three-way merges use
//! the ancestor to tell concurrent edits apart from shared state. Per-field
//! rules ([`FieldRule`]) override both: counters add deltas, extrema take
//! min/max, and custom closures get the final say for their paths.
//!
//! ## Quick Start
//!
//! ```rust
//! use tether_merge::{ConflictResolver, ResolverConfig, SyncConflict, Value};
//!
//! let mut resolver = ConflictResolver::new(ResolverConfig::default());
//!
//! let conflict = SyncConflict::new(
//!     "profile",
//!     Some(Value::from("local edit")),
//!     Some(Value::from("remote edit")),
//!     200, // local timestamp
//!     100, // remote timestamp
//! );
//!
//! let resolution = resolver.resolve(&conflict);
//! // Last-write-wins by default, so the newer local edit is uploaded.
//! assert_eq!(resolution.value, Some(Value::from("local edit")));
//! ```

pub mod conflict;
pub mod error;
pub mod hash;
pub mod history;
pub mod merge;
pub mod resolver;
pub mod strategy;
pub mod value;

// Re-export main types at crate root
pub use conflict::{
    detect_conflict_type, ConflictResolution, ConflictType, ResolutionAction, SyncConflict,
};
pub use error::Error;
pub use history::{ConflictHistory, ConflictHistoryEntry};
pub use resolver::{ConflictResolver, ResolverConfig, UnresolvableHook};
pub use strategy::{CustomMergeFn, FieldRule, MergeStrategy};
pub use value::Value;

pub use hash::{deep_equal, stable_hash};

/// Type aliases for clarity
pub type Key = String;
pub type Timestamp = u64;
