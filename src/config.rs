use serde::{Serialize, Deserialize};
use std::{
	io::{self, BufReader, Read},
	fs::File,
	path::Path,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Largest number of bytes a single read may request
	pub max_size: usize,
	/// Log every completed read at debug level
	pub log_reads: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to open config: {0}")]
	Io(#[from] io::Error),
	#[error("failed to parse config: {0}")]
	Parse(#[from] serde_json::Error),
}

impl Default for Config {
	fn default() -> Self {
		Config {
			max_size: i32::MAX as usize,
			log_reads: true,
		}
	}
}

impl Config {
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
		let file = File::open(path)?;
		let reader = BufReader::new(file);

		Self::from_reader(reader)
	}
	pub fn from_reader(reader: impl Read) -> Result<Config, ConfigError> {
		Ok(serde_json::from_reader(reader)?)
	}
}
