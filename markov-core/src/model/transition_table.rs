use std::collections::{BTreeMap, HashSet};
use std::ops::{Bound, Range};
use std::sync::mpsc;
use std::thread;

use crate::error::{MarkovError, Result};
use crate::tokenizer::Token;

use super::context::Context;
use super::successors::Successors;

/// Corpora with at least this many windows are built on several threads.
pub const PARALLEL_THRESHOLD: usize = 1 << 16;

/// A word-level Markov transition table of order `k`.
///
/// Maps every observed context (the last `k` tokens) to the weighted
/// tokens that followed it in the training corpus.
///
/// # Responsibilities
/// - Build the table from a token sequence, sequentially or in parallel chunks
/// - Answer successor lookups for the sampler
/// - Carry the statistics reported to callers (vocabulary, states, corpus size)
///
/// # Invariants
/// - `order >= 1`
/// - Every context in `transitions` holds exactly `order` tokens
/// - Every context has at least one successor with weight >= 1
/// - Immutable once built (only `merge` of partial builds mutates it)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionTable {
	order: usize,
	transitions: BTreeMap<Context, Successors>,
	/// Distinct tokens of the corpus, case-folded.
	vocabulary_size: usize,
	/// Observed context -> successor windows, `max(0, corpus_length - order)`.
	state_count: usize,
	/// Token count of the training text.
	corpus_length: usize,
}

impl TransitionTable {
	/// Builds the table of order `order` from `tokens`.
	///
	/// A corpus of `order` tokens or fewer yields an empty table, it is up
	/// to the caller to decide whether that is acceptable.
	///
	/// # Errors
	/// Returns `InvalidInput` if `order` is 0.
	pub fn build(tokens: &[Token], order: usize) -> Result<Self> {
		let windows = Self::check_order(tokens, order)?;
		if windows >= PARALLEL_THRESHOLD {
			Self::build_parallel(tokens, order, num_cpus::get())
		} else {
			let mut table = Self::build_range(tokens, order, 0..windows);
			table.finish(tokens);
			Ok(table)
		}
	}

	/// Builds the table by splitting the windows into `chunks` contiguous
	/// ranges, one thread each, then merging the partial tables.
	///
	/// Produces the same table as the sequential build.
	pub fn build_parallel(tokens: &[Token], order: usize, chunks: usize) -> Result<Self> {
		let windows = Self::check_order(tokens, order)?;
		let chunks = chunks.max(1);
		let chunk_size = windows.div_ceil(chunks).max(1);

		let mut table = Self::empty(order);
		thread::scope(|scope| -> Result<()> {
			let (tx, rx) = mpsc::channel();
			for start in (0..windows).step_by(chunk_size) {
				let tx = tx.clone();
				let range = start..(start + chunk_size).min(windows);
				scope.spawn(move || {
					// The receiver outlives every sender inside the scope.
					let _ = tx.send(Self::build_range(tokens, order, range));
				});
			}
			drop(tx);

			for partial in rx.iter() {
				table.merge(&partial)?;
			}
			Ok(())
		})?;

		table.finish(tokens);
		Ok(table)
	}

	fn check_order(tokens: &[Token], order: usize) -> Result<usize> {
		if order == 0 {
			return Err(MarkovError::InvalidInput("order must be >= 1".to_owned()));
		}
		Ok(tokens.len().saturating_sub(order))
	}

	fn empty(order: usize) -> Self {
		Self {
			order,
			transitions: BTreeMap::new(),
			vocabulary_size: 0,
			state_count: 0,
			corpus_length: 0,
		}
	}

	/// Counts the windows starting in `range`, without corpus statistics.
	fn build_range(tokens: &[Token], order: usize, range: Range<usize>) -> Self {
		let mut table = Self::empty(order);
		for i in range {
			let window = &tokens[i..i + order];
			let next = &tokens[i + order];
			match table.transitions.get_mut(window) {
				Some(successors) => successors.add(next),
				None => {
					let mut successors = Successors::new();
					successors.add(next);
					table.transitions.insert(Context::new(window), successors);
				}
			}
		}
		table
	}

	/// Computes the corpus-wide statistics once the transitions are complete.
	fn finish(&mut self, tokens: &[Token]) {
		let vocabulary: HashSet<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
		self.vocabulary_size = vocabulary.len();
		self.corpus_length = tokens.len();
		self.state_count = tokens.len().saturating_sub(self.order);
	}

	/// Merges the transitions of another table into this one.
	///
	/// Occurrence counts of matching contexts are summed. Statistics are
	/// not merged, they are recomputed by the build that owns the merge.
	///
	/// # Errors
	/// Returns `Build` if the orders do not match.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.order != other.order {
			return Err(MarkovError::Build(format!(
				"order mismatch while merging: {} vs {}",
				self.order, other.order
			)));
		}

		for (context, successors) in &other.transitions {
			if let Some(existing) = self.transitions.get_mut(context) {
				existing.merge(successors);
			} else {
				self.transitions.insert(context.clone(), successors.clone());
			}
		}
		Ok(())
	}

	pub fn order(&self) -> usize {
		self.order
	}

	pub fn vocabulary_size(&self) -> usize {
		self.vocabulary_size
	}

	pub fn state_count(&self) -> usize {
		self.state_count
	}

	/// Number of distinct contexts stored.
	pub fn context_count(&self) -> usize {
		self.transitions.len()
	}

	pub fn corpus_length(&self) -> usize {
		self.corpus_length
	}

	pub fn is_empty(&self) -> bool {
		self.transitions.is_empty()
	}

	/// Successors of `context`, `None` on a dead end.
	pub fn successors(&self, context: &[Token]) -> Option<&Successors> {
		self.transitions.get(context)
	}

	/// The lexicographically-first context.
	pub fn first_context(&self) -> Option<&Context> {
		self.transitions.keys().next()
	}

	/// The first context (in table order) that begins with `prefix`.
	pub fn first_context_with_prefix(&self, prefix: &[Token]) -> Option<&Context> {
		// Contexts sharing a prefix are contiguous and start at the
		// first key >= prefix.
		self.transitions
			.range::<[Token], _>((Bound::Included(prefix), Bound::Unbounded))
			.map(|(context, _)| context)
			.next()
			.filter(|context| context.starts_with(prefix))
	}

	pub fn iter(&self) -> impl Iterator<Item = (&Context, &Successors)> {
		self.transitions.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tokenizer::tokenize;

	#[test]
	fn order_zero_is_rejected() {
		let tokens = tokenize("a b c");
		assert!(matches!(TransitionTable::build(&tokens, 0), Err(MarkovError::InvalidInput(_))));
	}

	#[test]
	fn short_corpus_gives_empty_table() {
		let tokens = tokenize("a b");
		let table = TransitionTable::build(&tokens, 2).unwrap();
		assert!(table.is_empty());
		assert_eq!(table.state_count(), 0);
		assert_eq!(table.corpus_length(), 2);
		assert_eq!(table.vocabulary_size(), 2);
		assert_eq!(table.first_context(), None);
	}

	#[test]
	fn order_two_example() {
		let tokens = tokenize("a b a b a c");
		let table = TransitionTable::build(&tokens, 2).unwrap();

		let ab = table.successors(&tokenize("a b")).unwrap();
		assert_eq!(ab.weight("a"), 2);
		assert_eq!(ab.len(), 1);

		let ba = table.successors(&tokenize("b a")).unwrap();
		assert_eq!(ba.weight("b"), 1);
		assert_eq!(ba.weight("c"), 1);

		// The window stops one token early: (a, c) has no successor.
		assert!(table.successors(&tokenize("a c")).is_none());

		assert_eq!(table.state_count(), 4);
		assert_eq!(table.context_count(), 2);
		assert_eq!(table.vocabulary_size(), 3);
		assert_eq!(table.corpus_length(), 6);
		assert_eq!(table.order(), 2);
	}

	#[test]
	fn keys_keep_case_but_vocabulary_folds_it() {
		let tokens = tokenize("The cat saw the cat");
		let table = TransitionTable::build(&tokens, 1).unwrap();
		assert!(table.successors(&tokenize("The")).is_some());
		assert!(table.successors(&tokenize("the")).is_some());
		assert_eq!(table.context_count(), 4);
		// the, cat, saw
		assert_eq!(table.vocabulary_size(), 3);
	}

	#[test]
	fn first_context_is_lexicographic() {
		let tokens = tokenize("c b a c");
		let table = TransitionTable::build(&tokens, 1).unwrap();
		assert_eq!(table.first_context().unwrap().to_string(), "(a)");
	}

	#[test]
	fn prefix_lookup() {
		let tokens = tokenize("x y z x y w q");
		let table = TransitionTable::build(&tokens, 3).unwrap();
		let found = table.first_context_with_prefix(&tokenize("x y")).unwrap();
		assert_eq!(found.to_string(), "(x, y, w)");
		assert!(table.first_context_with_prefix(&tokenize("q")).is_none());
		assert!(table.first_context_with_prefix(&tokenize("nope")).is_none());
	}

	#[test]
	fn parallel_build_matches_sequential() {
		let text = "one fish two fish red fish blue fish ".repeat(50);
		let tokens = tokenize(&text);
		for order in 1..=5 {
			let sequential = TransitionTable::build(&tokens, order).unwrap();
			for chunks in [1, 2, 3, 7, 64] {
				let parallel = TransitionTable::build_parallel(&tokens, order, chunks).unwrap();
				assert_eq!(parallel, sequential, "order {order}, {chunks} chunks");
			}
		}
	}

	#[test]
	fn parallel_build_of_short_corpus() {
		let tokens = tokenize("a");
		let table = TransitionTable::build_parallel(&tokens, 3, 4).unwrap();
		assert!(table.is_empty());
		assert_eq!(table.corpus_length(), 1);
	}

	#[test]
	fn merge_rejects_other_orders() {
		let tokens = tokenize("a b c d");
		let mut one = TransitionTable::build(&tokens, 1).unwrap();
		let two = TransitionTable::build(&tokens, 2).unwrap();
		assert!(matches!(one.merge(&two), Err(MarkovError::Build(_))));
	}
}
