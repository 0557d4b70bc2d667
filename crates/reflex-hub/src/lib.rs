//! Reflex Hub - conflict resolution and tick orchestration
//!
//! This crate turns a set of compiled rules and a context into a ticking
//! engine with undo.
//!
//! ## Tick Pipeline
//!
//! ```text
//! Engine::tick(1)
//!  │
//!  ├── RuleInterpreter::interpret  ← every rule, same pre-tick snapshot
//!  ├── detect_conflicts            ← shared changed keys
//!  ├── resolve_conflicts           ← greedy weighted draw (seeded Rng)
//!  ├── commit                      ← winners applied as one batch
//!  └── History::push               ← diff recorded for tick(-1)
//! ```
//!
//! ## Key Components
//!
//! - [`Engine`]: owns the context, rules, graph and history
//! - [`detect_conflicts`] / [`resolve_conflicts`]: pick the committed set
//! - [`Graph`]: declared reference hierarchy and per-rule contributions
//! - [`History`]: LIFO stack of committed diffs
//!
//! ## Design Principles
//!
//! 1. **reflex-core is standalone** - it does NOT know about reflex-hub
//! 2. **Randomness is injected** - resolution only draws from the engine's seeded [`Rng`](reflex_core::Rng)
//! 3. **Committed sets are consistent** - no two winners of a tick share a changed reference

pub mod commit;
pub mod config;
pub mod conflict;
mod engine;
mod error;
mod graph;
pub mod hash;
mod history;

pub use commit::{apply_changes, commit, CommitResult};
pub use config::{hash_seed, EngineConfig, DEFAULT_FINGERPRINT_SEED, DEFAULT_SEED};
pub use conflict::{detect_conflicts, resolve_conflicts, ConflictReport, Resolution, RuleConflict};
pub use engine::Engine;
pub use error::{Error, Result};
pub use graph::Graph;
pub use hash::{hash_with_seed, SeededHasher};
pub use history::History;
