use std::collections::HashMap;
use std::sync::Arc;

/// A word as it appears in the corpus.
///
/// Tokens are immutable and cheap to clone. Within one call to
/// [`tokenize`], identical words share the same allocation.
pub type Token = Arc<str>;

/// Splits `text` on runs of whitespace.
///
/// - Empty fragments are discarded
/// - Case and attached punctuation are kept as-is ("Hello," stays "Hello,")
/// - Identical input always yields an identical sequence
pub fn tokenize(text: &str) -> Vec<Token> {
	let mut interned: HashMap<&str, Token> = HashMap::new();
	text.split_whitespace()
		.map(|word| {
			interned
				.entry(word)
				.or_insert_with(|| Arc::from(word))
				.clone()
		})
		.collect()
}

/// Joins tokens back into text with single spaces.
pub fn detokenize(tokens: &[Token]) -> String {
	let mut text = String::with_capacity(tokens.iter().map(|t| t.len() + 1).sum());
	for (i, token) in tokens.iter().enumerate() {
		if i > 0 {
			text.push(' ');
		}
		text.push_str(token);
	}
	text
}
