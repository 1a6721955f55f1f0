use std::error::Error;
use std::path::{Path, PathBuf};
use std::{env, fs};

use serde::Deserialize;

use markov_core::EngineConfig;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "MARKOV_CONFIG";
/// Configuration file read when `MARKOV_CONFIG` is not set.
pub const DEFAULT_CONFIG_FILE: &str = "markov.toml";

/// Server configuration, read from a TOML file.
///
/// ```toml
/// [server]
/// host = "0.0.0.0"
/// port = 8080
///
/// [engine.native]
/// enabled = true
/// library_path = "native/libmarkovova.so"
/// library_name = "markovova"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
	pub server: ListenConfig,
	pub engine: EngineConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
	pub host: String,
	pub port: u16,
}

impl Default for ListenConfig {
	fn default() -> Self {
		Self { host: "127.0.0.1".to_owned(), port: 5000 }
	}
}

impl Config {
	/// Loads the file named by `MARKOV_CONFIG`, or `markov.toml`.
	///
	/// A missing default file gives the default configuration, a missing
	/// file named explicitly is an error.
	pub fn load() -> Result<Self, Box<dyn Error>> {
		match env::var_os(CONFIG_ENV) {
			Some(path) => Self::from_file(PathBuf::from(path)),
			None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
			None => Ok(Self::default()),
		}
	}

	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
		let path = path.as_ref();
		let contents = fs::read_to_string(path)
			.map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
		Ok(Self::from_toml(&contents)?)
	}

	pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
		toml::from_str(contents)
	}
}
