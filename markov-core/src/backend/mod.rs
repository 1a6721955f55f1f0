//! Backend adapter: in-process build and sampling, with an optional
//! native delegate.
//!
//! The adapter is chosen once at startup ([`Backend::probe`]). When a
//! delegate is present it is tried first for the calls it can serve and
//! any failure falls back to the in-process implementation for that call.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::config::NativeConfig;
use crate::error::{MarkovError, Result};
use crate::model::{Context, Sample, SeedKind, TransitionTable, sampler};
use crate::tokenizer::{Token, detokenize, tokenize};

/// The native delegate boundary.
pub mod native;

use native::{NativeDelegate, NativeModel};

/// Which implementation served a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServedBy {
	Native,
	InProcess,
}

impl fmt::Display for ServedBy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ServedBy::Native => write!(f, "native"),
			ServedBy::InProcess => write!(f, "in-process"),
		}
	}
}

/// A model ready to be published: the transition table, plus a native
/// handle trained on the same corpus when the delegate accepted it.
#[derive(Debug)]
pub struct TrainedModel {
	table: TransitionTable,
	native: Option<Mutex<NativeModel>>,
	trained_at: SystemTime,
	text_length: usize,
	served_by: ServedBy,
}

impl TrainedModel {
	pub fn table(&self) -> &TransitionTable {
		&self.table
	}

	pub fn order(&self) -> usize {
		self.table.order()
	}

	pub fn trained_at(&self) -> SystemTime {
		self.trained_at
	}

	/// Milliseconds since the Unix epoch.
	pub fn trained_at_ms(&self) -> u64 {
		self.trained_at
			.duration_since(SystemTime::UNIX_EPOCH)
			.map(|d| d.as_millis() as u64)
			.unwrap_or(0)
	}

	/// Character length of the training text.
	pub fn text_length(&self) -> usize {
		self.text_length
	}

	pub fn served_by(&self) -> ServedBy {
		self.served_by
	}

	pub fn has_native(&self) -> bool {
		self.native.is_some()
	}
}

/// Call counters, for observability only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStats {
	pub native_calls: u64,
	pub in_process_calls: u64,
	/// Delegate failures recovered in-process.
	pub fallbacks: u64,
}

#[derive(Default)]
struct Counters {
	native: AtomicU64,
	in_process: AtomicU64,
	fallbacks: AtomicU64,
}

impl Counters {
	fn record(&self, served_by: ServedBy) {
		let counter = match served_by {
			ServedBy::Native => &self.native,
			ServedBy::InProcess => &self.in_process,
		};
		counter.fetch_add(1, Ordering::Relaxed);
	}
}

pub struct Backend {
	delegate: Option<Arc<dyn NativeDelegate>>,
	counters: Counters,
}

impl Backend {
	/// A backend without native delegate.
	pub fn in_process() -> Self {
		Self { delegate: None, counters: Counters::default() }
	}

	pub fn with_delegate(delegate: Arc<dyn NativeDelegate>) -> Self {
		Self { delegate: Some(delegate), counters: Counters::default() }
	}

	/// Looks for the native library described by `config`.
	///
	/// A missing library is a capability downgrade, never an error.
	pub fn probe(config: &NativeConfig) -> Self {
		if !config.enabled {
			log::info!("native backend disabled, running in-process");
			return Self::in_process();
		}
		Self::probe_library(config)
	}

	#[cfg(feature = "native")]
	fn probe_library(config: &NativeConfig) -> Self {
		match native::DylibDelegate::load(config) {
			Ok(delegate) => {
				log::info!("native backend loaded: {}", delegate.name());
				Self::with_delegate(Arc::new(delegate))
			}
			Err(e) => {
				log::warn!("{e}, running in-process");
				Self::in_process()
			}
		}
	}

	#[cfg(not(feature = "native"))]
	fn probe_library(config: &NativeConfig) -> Self {
		log::warn!(
			"built without the `native` feature, ignoring {}, running in-process",
			config.library_path.display()
		);
		Self::in_process()
	}

	pub fn native_available(&self) -> bool {
		self.delegate.is_some()
	}

	pub fn stats(&self) -> BackendStats {
		BackendStats {
			native_calls: self.counters.native.load(Ordering::Relaxed),
			in_process_calls: self.counters.in_process.load(Ordering::Relaxed),
			fallbacks: self.counters.fallbacks.load(Ordering::Relaxed),
		}
	}

	fn fallback(&self, e: &MarkovError) {
		log::warn!("{e}, falling back to in-process");
		self.counters.fallbacks.fetch_add(1, Ordering::Relaxed);
	}

	/// Builds a model of order `order` from `text`, already tokenized as
	/// `tokens`.
	///
	/// The transition table is always built in-process: it carries the
	/// statistics and backs every fallback. The delegate, if any, is
	/// trained on the same text on top of it.
	///
	/// # Errors
	/// Only build errors of the table. Delegate failures are recovered.
	pub fn train(&self, text: &str, tokens: &[Token], order: usize) -> Result<TrainedModel> {
		let table = TransitionTable::build(tokens, order)?;

		let native = match &self.delegate {
			Some(delegate) if !table.is_empty() => match Self::train_native(delegate, text, order) {
				Ok(model) => Some(Mutex::new(model)),
				Err(e) => {
					self.fallback(&e);
					None
				}
			},
			_ => None,
		};
		let served_by = if native.is_some() { ServedBy::Native } else { ServedBy::InProcess };
		self.counters.record(served_by);

		Ok(TrainedModel {
			table,
			native,
			trained_at: SystemTime::now(),
			text_length: text.chars().count(),
			served_by,
		})
	}

	fn train_native(delegate: &Arc<dyn NativeDelegate>, text: &str, order: usize) -> Result<NativeModel> {
		// Dropping the model on failure frees the handle.
		let mut model = NativeModel::create(Arc::clone(delegate), order)?;
		model.train(text)?;
		Ok(model)
	}

	/// Generates up to `length` tokens from `model`.
	///
	/// Served by the delegate when the model has a native handle, no seed
	/// is requested (the delegate cannot be seeded) and `start` is either
	/// empty or a full context. An empty start is resolved to the first
	/// context of the table before the delegate is called, so both
	/// backends begin at the same place.
	///
	/// Native output is only accepted if it is a walk through the
	/// published table: every word must be a recorded successor of its
	/// context (same case, same punctuation) and a short result must end
	/// on a dead end. Anything else counts as a fallback and the request
	/// is served in-process.
	pub fn sample(&self, model: &TrainedModel, start: &[Token], length: usize, seed: Option<u64>) -> (Sample, ServedBy) {
		let order = model.order();
		let native_start = match (&model.native, seed) {
			(Some(_), None) if start.len() >= order => Some(&start[start.len() - order..]),
			(Some(_), None) if start.is_empty() => model.table().first_context().map(Context::tokens),
			_ => None,
		};

		if let (Some(native), Some(context)) = (&model.native, native_start) {
			let seed_kind = if start.is_empty() { SeedKind::Default } else { SeedKind::Start };
			if length == 0 {
				self.counters.record(ServedBy::Native);
				return (Sample { tokens: Vec::new(), seed: seed_kind, truncated_early: false }, ServedBy::Native);
			}
			match Self::sample_native(native, model.table(), context, length) {
				Ok(mut sample) => {
					sample.seed = seed_kind;
					self.counters.record(ServedBy::Native);
					return (sample, ServedBy::Native);
				}
				Err(e) => self.fallback(&e),
			}
		}

		let sample = match seed {
			Some(seed) => sampler::generate(model.table(), start, length, &mut StdRng::seed_from_u64(seed)),
			None => sampler::generate(model.table(), start, length, &mut rand::rng()),
		};
		self.counters.record(ServedBy::InProcess);
		(sample, ServedBy::InProcess)
	}

	fn sample_native(
		native: &Mutex<NativeModel>,
		table: &TransitionTable,
		context: &[Token],
		length: usize,
	) -> Result<Sample> {
		let text = {
			let mut native = native
				.lock()
				.map_err(|_| MarkovError::BackendUnavailable("native handle poisoned".to_owned()))?;
			native.generate(length, &detokenize(context))?
		};

		let tokens = tokenize(&text);
		if tokens.len() > length {
			return Err(MarkovError::BackendUnavailable(format!(
				"native output has {} words, {length} requested",
				tokens.len()
			)));
		}
		let dead_end = Self::check_walk(table, context, &tokens)?;
		let truncated_early = tokens.len() < length;
		if truncated_early && !dead_end {
			return Err(MarkovError::BackendUnavailable(format!(
				"native output stopped after {} of {length} words without reaching a dead end",
				tokens.len()
			)));
		}
		Ok(Sample { tokens, seed: SeedKind::Start, truncated_early })
	}

	/// Checks that `tokens` follows `table` from `context`, whose last
	/// `order` tokens are the first context. Returns whether the walk ends
	/// on a dead end.
	fn check_walk(table: &TransitionTable, context: &[Token], tokens: &[Token]) -> Result<bool> {
		let order = table.order();
		let mut history = context.to_vec();
		for (i, token) in tokens.iter().enumerate() {
			let current = &history[history.len() - order..];
			if !table.successors(current).is_some_and(|successors| successors.weight(token) > 0) {
				return Err(MarkovError::BackendUnavailable(format!(
					"native output diverges from the model at word {}: {token:?}",
					i + 1
				)));
			}
			history.push(token.clone());
		}
		Ok(table.successors(&history[history.len() - order..]).is_none())
	}
}

impl Default for Backend {
	fn default() -> Self {
		Self::in_process()
	}
}

impl fmt::Debug for Backend {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Backend")
			.field("delegate", &self.delegate.as_ref().map(|d| d.name().to_owned()))
			.field("stats", &self.stats())
			.finish()
	}
}
