use std::collections::HashMap;

use proptest::prelude::*;

use markov_core::model::TransitionTable;
use markov_core::model::sampler;
use markov_core::tokenizer::{Token, tokenize};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn corpus() -> impl Strategy<Value = Vec<Token>> {
	// Small alphabet so contexts repeat.
	prop::collection::vec(prop::sample::select(vec!["a", "b", "c", "D", "d", "e."]), 0..200)
		.prop_map(|words| tokenize(&words.join(" ")))
}

proptest! {
	#[test]
	fn state_count_is_window_count(tokens in corpus(), order in 1usize..=5) {
		let table = TransitionTable::build(&tokens, order).unwrap();
		prop_assert_eq!(table.state_count(), tokens.len().saturating_sub(order));
		prop_assert_eq!(table.corpus_length(), tokens.len());
	}

	#[test]
	fn weights_match_observed_occurrences(tokens in corpus(), order in 1usize..=5) {
		let table = TransitionTable::build(&tokens, order).unwrap();

		let mut occurrences: HashMap<&[Token], usize> = HashMap::new();
		for window in tokens.windows(order + 1) {
			*occurrences.entry(&window[..order]).or_insert(0) += 1;
		}

		prop_assert_eq!(table.context_count(), occurrences.len());
		for (context, successors) in table.iter() {
			prop_assert_eq!(context.len(), order);
			prop_assert!(!successors.is_empty());
			prop_assert!(successors.iter().all(|(_, weight)| weight >= 1));
			let summed: usize = successors.iter().map(|(_, weight)| weight).sum();
			prop_assert_eq!(summed, successors.total());
			prop_assert_eq!(Some(&summed), occurrences.get(context.tokens()));
		}
	}

	#[test]
	fn parallel_and_sequential_builds_agree(tokens in corpus(), order in 1usize..=5, chunks in 1usize..9) {
		let sequential = TransitionTable::build(&tokens, order).unwrap();
		let parallel = TransitionTable::build_parallel(&tokens, order, chunks).unwrap();
		prop_assert_eq!(parallel, sequential);
	}

	#[test]
	fn vocabulary_is_case_folded(tokens in corpus()) {
		let table = TransitionTable::build(&tokens, 1).unwrap();
		let mut folded: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
		folded.sort();
		folded.dedup();
		prop_assert_eq!(table.vocabulary_size(), folded.len());
	}

	#[test]
	fn generated_words_come_from_the_corpus(tokens in corpus(), order in 1usize..=3, seed in any::<u64>(), length in 0usize..60) {
		let table = TransitionTable::build(&tokens, order).unwrap();
		let sample = sampler::generate(&table, &[], length, &mut StdRng::seed_from_u64(seed));
		prop_assert!(sample.tokens.len() <= length);
		prop_assert!(sample.truncated_early || sample.tokens.len() == length);
		for token in &sample.tokens {
			prop_assert!(tokens.contains(token));
		}
	}

	#[test]
	fn any_start_respects_the_requested_length(
		tokens in corpus(),
		order in 1usize..=5,
		offset in 0usize..200,
		start_len in 1usize..=6,
		seed in any::<u64>(),
		length in 0usize..40,
	) {
		let table = TransitionTable::build(&tokens, order).unwrap();
		// Starts are taken from the corpus, so short ones usually match a
		// context prefix and long ones a full context.
		let from = offset.min(tokens.len());
		let to = (from + start_len).min(tokens.len());
		let start = &tokens[from..to];

		let sample = sampler::generate(&table, start, length, &mut StdRng::seed_from_u64(seed));
		prop_assert!(sample.tokens.len() <= length, "{} > {length}", sample.tokens.len());
		prop_assert!(sample.truncated_early || sample.tokens.len() == length);
	}
}
