use thiserror::Error;

pub type Result<T> = std::result::Result<T, MarkovError>;

/// Failures surfaced by the engine.
///
/// Reaching a dead end while sampling is not an error; it is reported
/// through `truncated_early` on the generation result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarkovError {
	/// Malformed or too-short training text, out-of-range order or length.
	#[error("invalid input: {0}")]
	InvalidInput(String),

	/// Generation was requested before any model was published.
	#[error("no trained model, train one first")]
	NotTrained,

	/// The native delegate failed or could not be loaded.
	///
	/// Recovered by falling back to the in-process implementation.
	#[error("native backend unavailable: {0}")]
	BackendUnavailable(String),

	/// A build failed; the previously published model is left untouched.
	#[error("build failed: {0}")]
	Build(String),
}
