//! Word-level Markov model: contexts, transition tables and sampling.
//!
//! - Contexts of `k` tokens (`Context`)
//! - Weighted successor counts (`Successors`)
//! - The order-`k` table and its builder (`TransitionTable`)
//! - Weighted generation from a table (`sampler`)
//! - Generation parameters (`GenerationRequest`)

/// Fixed-length token tuple used as a table key.
pub mod context;

/// Weighted successors of a context, with weighted random draws.
pub mod successors;

/// Order-`k` transition table, sequential and parallel builds.
pub mod transition_table;

/// Generation from a transition table.
pub mod sampler;

/// Generation parameters and their bounds.
pub mod request;

pub use context::Context;
pub use request::{GenerationRequest, MAX_GENERATION_LENGTH};
pub use sampler::{Sample, SeedKind};
pub use successors::Successors;
pub use transition_table::TransitionTable;
