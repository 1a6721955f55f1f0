use std::path::PathBuf;

use serde::Deserialize;

/// Engine settings.
///
/// Deserializable so that a host can embed it in its own configuration
/// file. Every field has a default.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	pub native: NativeConfig,
}

/// Where to look for the native delegate library.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NativeConfig {
	/// Probe for the library at startup. When false the engine runs
	/// in-process only.
	pub enabled: bool,

	/// Path tried first.
	pub library_path: PathBuf,

	/// Name handed to the system loader when `library_path` does not exist
	/// ("markovova" resolves to `libmarkovova.so` on Linux).
	pub library_name: String,
}

impl Default for NativeConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			library_path: PathBuf::from("native/libmarkovova.so"),
			library_name: "markovova".to_owned(),
		}
	}
}
