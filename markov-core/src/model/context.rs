use std::borrow::Borrow;
use std::fmt;

use crate::tokenizer::Token;

/// The `k` tokens preceding a successor.
///
/// Contexts are ordered lexicographically over their tokens, which is
/// what makes "the first context of a table" well defined.
///
/// ## Invariants
/// - Holds exactly `order` tokens for the table it belongs to
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Context(Box<[Token]>);

impl Context {
	pub fn new(tokens: &[Token]) -> Self {
		Self(tokens.into())
	}

	pub fn tokens(&self) -> &[Token] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Whether the context begins with `prefix`.
	pub fn starts_with(&self, prefix: &[Token]) -> bool {
		self.0.starts_with(prefix)
	}
}

// Lets the table be queried with a window slice without allocating a key.
impl Borrow<[Token]> for Context {
	fn borrow(&self) -> &[Token] {
		&self.0
	}
}

impl fmt::Display for Context {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "(")?;
		for (i, token) in self.0.iter().enumerate() {
			if i > 0 {
				write!(f, ", ")?;
			}
			write!(f, "{token}")?;
		}
		write!(f, ")")
	}
}
