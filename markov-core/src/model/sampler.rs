use rand::Rng;

use crate::tokenizer::Token;

use super::transition_table::TransitionTable;

/// How the first context of a generation was chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedKind {
	/// The last `order` tokens of the start text.
	Start,
	/// A start text shorter than `order`, completed by the first context
	/// beginning with it.
	Prefix,
	/// A start text shorter than `order` that no context begins with;
	/// it was dropped and the first context of the table was used.
	PrefixIgnored,
	/// No start text, the first context of the table.
	Default,
}

/// Output of one generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
	/// Generated tokens, including a literal prefix when one was used.
	pub tokens: Vec<Token>,
	pub seed: SeedKind,
	/// A dead end was reached before `length` tokens were emitted.
	pub truncated_early: bool,
}

/// Generates up to `length` tokens from `table`.
///
/// # Behavior
/// - `start.len() >= order`: sampling continues from the last `order`
///   tokens of `start`, which are not repeated in the output.
/// - `0 < start.len() < order`: `start` is kept as a literal prefix and
///   completed with the rest of the first context that begins with it.
///   Both the prefix and its completion count toward `length`.
/// - `start` empty (or an unmatched short prefix): sampling starts from the
///   lexicographically-first context, so the result is reproducible for a
///   fixed table and seeded `rng`.
///
/// Stops at `length` emitted tokens or at the first context without
/// successors, in which case `truncated_early` is set.
pub fn generate<R: Rng + ?Sized>(table: &TransitionTable, start: &[Token], length: usize, rng: &mut R) -> Sample {
	let order = table.order();
	let mut sample = Sample { tokens: Vec::new(), seed: SeedKind::Default, truncated_early: false };
	if length == 0 {
		return sample;
	}

	// Sliding history, its last `order` tokens are the current context.
	let mut history: Vec<Token> = Vec::with_capacity(order + length);
	let mut emitted = 0;

	if start.len() >= order {
		history.extend_from_slice(&start[start.len() - order..]);
		sample.seed = SeedKind::Start;
	} else if !start.is_empty() {
		match table.first_context_with_prefix(start) {
			Some(context) => {
				sample.seed = SeedKind::Prefix;
				emitted = start.len().min(length);
				sample.tokens.extend_from_slice(&start[..emitted]);
				for token in &context.tokens()[start.len()..] {
					if emitted == length {
						break;
					}
					sample.tokens.push(token.clone());
					emitted += 1;
				}
				history.extend_from_slice(context.tokens());
			}
			None => sample.seed = SeedKind::PrefixIgnored,
		}
	}

	if history.is_empty() {
		match table.first_context() {
			Some(context) => history.extend_from_slice(context.tokens()),
			None => {
				sample.truncated_early = true;
				return sample;
			}
		}
	}
	log::debug!("sampling {length} tokens at order {order}, seed {:?}", sample.seed);

	while emitted < length {
		let context = &history[history.len() - order..];
		let next = match table.successors(context).and_then(|successors| successors.draw(rng)) {
			Some(next) => next.clone(),
			None => {
				sample.truncated_early = true;
				break;
			}
		};
		sample.tokens.push(next.clone());
		history.push(next);
		emitted += 1;
	}

	sample
}
