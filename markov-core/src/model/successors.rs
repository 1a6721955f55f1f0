use std::collections::BTreeMap;

use rand::Rng;

use crate::tokenizer::Token;

/// Weighted successors of a single context.
///
/// Conceptually, this is a node in a Markov chain where outgoing edges
/// are weighted by their number of observations.
///
/// ## Responsibilities:
/// - Accumulate transition occurrences during a build
/// - Draw the next token using weighted random sampling
/// - Merge with the successors of the same context from a partial build
///
/// ## Invariants
/// - Each transition occurrence count is strictly positive
/// - `total` is the sum of all occurrence counts
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Successors {
	/// Outgoing transitions indexed by the next token.
	/// Example: { "sea" => 42, "shore" => 3 }
	transitions: BTreeMap<Token, usize>,
	total: usize,
}

impl Successors {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records an occurrence of a transition toward `next`.
	pub fn add(&mut self, next: &Token) {
		self.add_weighted(next, 1);
	}

	fn add_weighted(&mut self, next: &Token, occurrence: usize) {
		if occurrence == 0 {
			return;
		}
		*self.transitions.entry(next.clone()).or_insert(0) += occurrence;
		self.total += occurrence;
	}

	/// Observed count of `next` after this context, 0 if never seen.
	pub fn weight(&self, next: &str) -> usize {
		self.transitions.get(next).copied().unwrap_or(0)
	}

	/// Sum of all weights.
	pub fn total(&self) -> usize {
		self.total
	}

	/// Number of distinct successors.
	pub fn len(&self) -> usize {
		self.transitions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.transitions.is_empty()
	}

	/// Iterates over `(successor, weight)` in token order.
	pub fn iter(&self) -> impl Iterator<Item = (&Token, usize)> {
		self.transitions.iter().map(|(token, weight)| (token, *weight))
	}

	/// Draws the next token.
	///
	/// The probability of a token is its occurrence count divided by
	/// `total`. Performs an O(n) cumulative subtraction over the
	/// transitions, which are visited in a fixed order so a seeded `rng`
	/// gives reproducible draws.
	///
	/// Returns `None` if there are no transitions.
	pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Token> {
		if self.total == 0 {
			return None;
		}

		let mut r = rng.random_range(0..self.total);
		for (next, occurrence) in &self.transitions {
			if r < *occurrence {
				return Some(next);
			}
			r -= occurrence;
		}

		// Unreachable while `total` matches the transitions.
		self.transitions.keys().next_back()
	}

	/// Adds the occurrence counts of `other` into this one.
	pub fn merge(&mut self, other: &Self) {
		for (next, occurrence) in &other.transitions {
			self.add_weighted(next, *occurrence);
		}
	}
}
