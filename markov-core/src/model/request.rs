use serde::Deserialize;

use crate::error::{MarkovError, Result};

/// Hard cap on the number of tokens a single generation may emit.
pub const MAX_GENERATION_LENGTH: usize = 500;

/// Input parameters of a generation.
///
/// # Responsibilities
/// - Carry the start text, target length, advisory order and optional seed
/// - Reject lengths above [`MAX_GENERATION_LENGTH`] before the model is touched
///
/// `order` is advisory: generation always runs at the trained order and
/// reports a mismatch instead of failing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct GenerationRequest {
	/// Optional start text, tokenized like the training corpus.
	pub start_text: Option<String>,

	/// Number of tokens to generate (0..=500).
	pub length: usize,

	/// Order the caller expects the model to have.
	pub order: Option<usize>,

	/// Fixed seed for reproducible generation.
	pub seed: Option<u64>,
}

impl GenerationRequest {
	pub fn new(length: usize) -> Self {
		Self { length, ..Self::default() }
	}

	pub fn with_start(mut self, start_text: impl Into<String>) -> Self {
		self.start_text = Some(start_text.into());
		self
	}

	pub fn with_order(mut self, order: usize) -> Self {
		self.order = Some(order);
		self
	}

	pub fn with_seed(mut self, seed: u64) -> Self {
		self.seed = Some(seed);
		self
	}

	/// Start text, `None` when absent or blank.
	pub fn start(&self) -> Option<&str> {
		self.start_text.as_deref().filter(|s| !s.trim().is_empty())
	}

	/// # Errors
	/// Returns `InvalidInput` if the length is above the cap.
	pub fn validate(&self) -> Result<()> {
		if self.length > MAX_GENERATION_LENGTH {
			return Err(MarkovError::InvalidInput(format!(
				"length must be at most {MAX_GENERATION_LENGTH}, got {}",
				self.length
			)));
		}
		Ok(())
	}
}
