//! Word-level Markov text engine.
//!
//! This crate trains an order-`k` Markov model from a corpus and generates
//! text from it:
//! - Whitespace tokenization into interned tokens
//! - Transition tables built sequentially or in parallel chunks
//! - Weighted sampling, reproducible with a fixed seed
//! - A single model slot shared safely by concurrent train/generate/status calls
//! - An optional native delegate with automatic in-process fallback
//!
//! [`Engine`] is the entry point:
//!
//! ```rust
//! use markov_core::{Engine, GenerationRequest};
//!
//! let engine = Engine::default();
//! engine.train("the cat sat on the mat and the cat slept", 1)?;
//! let generated = engine.generate(&GenerationRequest::new(10).with_start("the").with_seed(1))?;
//! assert!(generated.generated_length <= 10);
//! # Ok::<(), markov_core::MarkovError>(())
//! ```

/// Markov model: contexts, transition tables, sampling.
pub mod model;

/// Whitespace tokenizer.
pub mod tokenizer;

/// In-process and native backends.
pub mod backend;

/// The model slot (concurrency core).
pub mod slot;

/// Engine facade: validation, train, generate, status.
pub mod engine;

/// Engine configuration.
pub mod config;

/// Corpus loading.
pub mod io;

mod error;

pub use backend::{Backend, BackendStats, ServedBy, TrainedModel};
pub use config::{EngineConfig, NativeConfig};
pub use engine::{Engine, GeneratedText, Health, MAX_ORDER, MIN_ORDER, ModelStatus, TrainingStats};
pub use error::{MarkovError, Result};
pub use model::{GenerationRequest, MAX_GENERATION_LENGTH};
pub use slot::{ModelSlot, SlotState};
