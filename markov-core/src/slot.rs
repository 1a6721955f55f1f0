use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::backend::TrainedModel;
use crate::error::{MarkovError, Result};

/// Observable state of the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotState {
	/// Never trained.
	Empty,
	/// A build is in progress, generation waits for it.
	Training,
	/// A model is published.
	Ready,
}

/// Point-in-time view of the slot.
///
/// `model` is the last published model, still reported while a retrain
/// is in progress.
#[derive(Clone, Debug)]
pub struct SlotStatus {
	pub state: SlotState,
	pub model: Option<Arc<TrainedModel>>,
}

struct SlotInner {
	published: Option<Arc<TrainedModel>>,
	/// Next ticket handed to a `train` call.
	next_ticket: u64,
	/// Ticket allowed to build; every lower ticket has completed.
	now_serving: u64,
	in_flight: bool,
}

/// Owner of the single current model.
///
/// # Responsibilities
/// - Serialize `train` calls in submission order, one build at a time
/// - Publish each build atomically, readers only ever see complete models
/// - Make generation wait for an in-flight build instead of serving
///   the model it is about to replace
///
/// # Notes
/// - Builds run outside the lock, `status` is never blocked by one.
/// - Published models are immutable and shared through `Arc`, readers
///   traverse them without holding the lock.
/// - The critical sections keep the state consistent at every step, so a
///   poisoned lock is recovered rather than propagated.
pub struct ModelSlot {
	inner: Mutex<SlotInner>,
	turn: Condvar,
}

impl Default for ModelSlot {
	fn default() -> Self {
		Self::new()
	}
}

impl ModelSlot {
	pub fn new() -> Self {
		Self {
			inner: Mutex::new(SlotInner { published: None, next_ticket: 0, now_serving: 0, in_flight: false }),
			turn: Condvar::new(),
		}
	}

	fn lock(&self) -> MutexGuard<'_, SlotInner> {
		self.inner.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn wait<'a>(&self, guard: MutexGuard<'a, SlotInner>) -> MutexGuard<'a, SlotInner> {
		self.turn.wait(guard).unwrap_or_else(PoisonError::into_inner)
	}

	/// Runs `build` exclusively and publishes its model.
	///
	/// Waits for every `train` submitted earlier. On failure (or panic) of
	/// `build` the previously published model stays in place and the next
	/// waiting `train` proceeds.
	pub fn train<F>(&self, build: F) -> Result<Arc<TrainedModel>>
	where
		F: FnOnce() -> Result<TrainedModel>,
	{
		let mut inner = self.lock();
		let ticket = inner.next_ticket;
		inner.next_ticket += 1;
		while inner.now_serving != ticket {
			inner = self.wait(inner);
		}
		inner.in_flight = true;
		drop(inner);

		let mut turn = Turn { slot: self, published: None };
		let model = Arc::new(build()?);
		turn.published = Some(Arc::clone(&model));
		Ok(model)
	}

	/// The current model, for generation.
	///
	/// If a build is in flight, blocks until it completes and returns
	/// whatever is published then.
	///
	/// # Errors
	/// Returns `NotTrained` if no model was ever published.
	pub fn snapshot(&self) -> Result<Arc<TrainedModel>> {
		let mut inner = self.lock();
		if inner.in_flight {
			let awaited = inner.now_serving;
			while inner.now_serving <= awaited {
				inner = self.wait(inner);
			}
		}
		inner.published.clone().ok_or(MarkovError::NotTrained)
	}

	/// Number of `train` calls holding a ticket, the one building included.
	pub fn queued(&self) -> u64 {
		let inner = self.lock();
		inner.next_ticket - inner.now_serving
	}

	/// Non-waiting view of the slot.
	pub fn status(&self) -> SlotStatus {
		let inner = self.lock();
		let state = if inner.in_flight {
			SlotState::Training
		} else if inner.published.is_some() {
			SlotState::Ready
		} else {
			SlotState::Empty
		};
		SlotStatus { state, model: inner.published.clone() }
	}
}

/// Ends a build turn when dropped, publishing the model it carries.
///
/// Dropping without a model (error or panic in the build) keeps the
/// previous one.
struct Turn<'a> {
	slot: &'a ModelSlot,
	published: Option<Arc<TrainedModel>>,
}

impl Drop for Turn<'_> {
	fn drop(&mut self) {
		let mut inner = self.slot.lock();
		if let Some(model) = self.published.take() {
			// The replaced model is released here, or by its last reader.
			inner.published = Some(model);
		}
		inner.in_flight = false;
		inner.now_serving += 1;
		drop(inner);
		self.slot.turn.notify_all();
	}
}
