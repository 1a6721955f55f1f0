use std::time::{Instant, SystemTime};

use serde::Serialize;

use crate::backend::{Backend, BackendStats, ServedBy};
use crate::config::EngineConfig;
use crate::error::{MarkovError, Result};
use crate::model::GenerationRequest;
use crate::slot::{ModelSlot, SlotState, SlotStatus};
use crate::tokenizer::{detokenize, tokenize};

/// Smallest supported model order.
pub const MIN_ORDER: usize = 1;
/// Largest supported model order.
pub const MAX_ORDER: usize = 5;

/// Service name reported by [`Engine::health`].
pub const SERVICE_NAME: &str = "markov-service";

/// Result of a training call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingStats {
	pub order: usize,
	/// Distinct words, case-folded.
	pub vocabulary_size: usize,
	/// Observed context -> successor windows.
	pub state_count: usize,
	/// Distinct contexts in the table.
	pub context_count: usize,
	/// Token count of the training text.
	pub corpus_length: usize,
	/// Character count of the training text.
	pub text_length: usize,
	pub duration_ms: u64,
	pub backend: ServedBy,
}

/// Result of a generation call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedText {
	pub generated_text: String,
	/// The start text as requested.
	pub start_text: Option<String>,
	/// "markov-order-N" for the model that served the call.
	pub model_used: String,
	pub generated_length: usize,
	pub requested_length: usize,
	/// Order of the published model, always the one used.
	pub used_order: usize,
	pub requested_order: Option<usize>,
	/// The requested order differed from the trained one.
	pub order_mismatch: bool,
	/// A dead end was reached before the requested length.
	pub truncated_early: bool,
	pub backend: ServedBy,
	pub duration_ms: u64,
}

/// Snapshot of the current model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
	pub state: SlotState,
	pub order: Option<usize>,
	pub vocabulary_size: usize,
	pub state_count: usize,
	pub context_count: usize,
	pub trained_at_corpus_length: usize,
	pub trained_at_ms: Option<u64>,
}

/// Engine health: model status plus backend capability and counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
	/// Always "UP" when the engine answers.
	pub status: &'static str,
	pub service: &'static str,
	pub native_integration: bool,
	/// "ACTIVE" with a native delegate, "SIMULATION" otherwise.
	pub native_status: &'static str,
	pub model: ModelStatus,
	/// One-line description of the published model.
	pub model_info: String,
	pub calls: BackendStats,
	/// Milliseconds since the Unix epoch.
	pub timestamp_ms: u64,
}

/// The Markov text engine.
///
/// Owns one [`ModelSlot`] and one [`Backend`]. Every method takes `&self`
/// and is safe to call from many threads at once; share it with `Arc`
/// (or `actix_web::web::Data`).
#[derive(Default)]
pub struct Engine {
	slot: ModelSlot,
	backend: Backend,
}

impl Engine {
	/// Builds an engine, probing for the native delegate described by
	/// `config`.
	pub fn new(config: &EngineConfig) -> Self {
		Self::with_backend(Backend::probe(&config.native))
	}

	pub fn with_backend(backend: Backend) -> Self {
		Self { slot: ModelSlot::new(), backend }
	}

	pub fn backend(&self) -> &Backend {
		&self.backend
	}

	/// Trains a new model of order `order` on `text` and publishes it.
	///
	/// # Errors
	/// - `InvalidInput` if `order` is outside `1..=5` or `text` has fewer
	///   than `order + 1` words. Nothing is touched in that case.
	/// - `Build` if the build fails; the previous model stays published.
	pub fn train(&self, text: &str, order: usize) -> Result<TrainingStats> {
		check_order(order)?;
		let tokens = tokenize(text);
		if tokens.is_empty() {
			return Err(MarkovError::InvalidInput("training text is empty".to_owned()));
		}
		if tokens.len() <= order {
			return Err(MarkovError::InvalidInput(format!(
				"training text needs at least {} words for order {order}, got {}",
				order + 1,
				tokens.len()
			)));
		}

		log::info!("training order {order} on {} words", tokens.len());
		// Timed inside the turn, waiting behind earlier trains is not counted.
		let mut duration_ms = 0;
		let model = self.slot.train(|| {
			let started = Instant::now();
			let model = self.backend.train(text, &tokens, order);
			duration_ms = started.elapsed().as_millis() as u64;
			model
		})?;

		let table = model.table();
		let stats = TrainingStats {
			order,
			vocabulary_size: table.vocabulary_size(),
			state_count: table.state_count(),
			context_count: table.context_count(),
			corpus_length: table.corpus_length(),
			text_length: model.text_length(),
			duration_ms,
			backend: model.served_by(),
		};
		log::info!(
			"training done in {duration_ms}ms: {} words in vocabulary, {} states, {} contexts ({})",
			stats.vocabulary_size,
			stats.state_count,
			stats.context_count,
			stats.backend
		);
		Ok(stats)
	}

	/// Generates text from the published model.
	///
	/// Waits for an in-flight training to publish first. A requested order
	/// that differs from the trained one is reported, not rejected.
	///
	/// # Errors
	/// - `InvalidInput` if the length is above the cap.
	/// - `NotTrained` if no model was ever published.
	pub fn generate(&self, request: &GenerationRequest) -> Result<GeneratedText> {
		request.validate()?;
		let started = Instant::now();
		let model = self.slot.snapshot()?;

		let used_order = model.order();
		let order_mismatch = request.order.is_some_and(|order| order != used_order);
		if order_mismatch {
			log::warn!(
				"requested order {} differs from trained order {used_order}, using the trained order",
				request.order.unwrap_or_default()
			);
		}

		let start = request.start().map(tokenize).unwrap_or_default();
		let (sample, backend) = self.backend.sample(&model, &start, request.length, request.seed);
		let duration_ms = started.elapsed().as_millis() as u64;

		let generated = GeneratedText {
			generated_text: detokenize(&sample.tokens),
			start_text: request.start_text.clone(),
			model_used: format!("markov-order-{used_order}"),
			generated_length: sample.tokens.len(),
			requested_length: request.length,
			used_order,
			requested_order: request.order,
			order_mismatch,
			truncated_early: sample.truncated_early,
			backend,
			duration_ms,
		};
		log::info!(
			"generated {} of {} words in {duration_ms}ms ({backend}){}",
			generated.generated_length,
			generated.requested_length,
			if generated.truncated_early { ", dead end reached" } else { "" }
		);
		Ok(generated)
	}

	/// Current state and statistics. Never waits for a build.
	pub fn status(&self) -> ModelStatus {
		model_status(&self.slot.status())
	}

	pub fn health(&self) -> Health {
		let slot = self.slot.status();
		let model_info = match &slot.model {
			Some(model) => format!(
				"order-{} model trained on {} characters",
				model.order(),
				model.text_length()
			),
			None => "no trained model".to_owned(),
		};
		let native_integration = self.backend.native_available();
		Health {
			status: "UP",
			service: SERVICE_NAME,
			native_integration,
			native_status: if native_integration { "ACTIVE" } else { "SIMULATION" },
			model: model_status(&slot),
			model_info,
			calls: self.backend.stats(),
			timestamp_ms: SystemTime::now()
				.duration_since(SystemTime::UNIX_EPOCH)
				.map(|d| d.as_millis() as u64)
				.unwrap_or(0),
		}
	}
}

fn model_status(status: &SlotStatus) -> ModelStatus {
	match &status.model {
		Some(model) => {
			let table = model.table();
			ModelStatus {
				state: status.state,
				order: Some(table.order()),
				vocabulary_size: table.vocabulary_size(),
				state_count: table.state_count(),
				context_count: table.context_count(),
				trained_at_corpus_length: table.corpus_length(),
				trained_at_ms: Some(model.trained_at_ms()),
			}
		}
		None => ModelStatus {
			state: status.state,
			order: None,
			vocabulary_size: 0,
			state_count: 0,
			context_count: 0,
			trained_at_corpus_length: 0,
			trained_at_ms: None,
		},
	}
}

/// # Errors
/// Returns `InvalidInput` if `order` is outside `MIN_ORDER..=MAX_ORDER`.
pub fn check_order(order: usize) -> Result<()> {
	if !(MIN_ORDER..=MAX_ORDER).contains(&order) {
		return Err(MarkovError::InvalidInput(format!(
			"order must be between {MIN_ORDER} and {MAX_ORDER}, got {order}"
		)));
	}
	Ok(())
}
