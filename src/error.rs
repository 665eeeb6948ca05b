use std::fmt;

use fullread::{ErrorKind, ReadFailure};
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::ResolveError;

/// Name identifying the kind of a [`ReadError`], as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorProperty {
	SystemError,
	EndOfFile,
	BadStream,
}
impl ErrorProperty {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorProperty::SystemError => "systemError",
			ErrorProperty::EndOfFile => "endOfFile",
			ErrorProperty::BadStream => "badStream",
		}
	}
}
impl fmt::Display for ErrorProperty {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Caller misuse, rejected before any I/O is attempted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentError {
	#[error("first argument should be a socket")]
	NotASocket,
	#[error("size should be a positive integer")]
	NonPositiveSize,
	#[error("size should be at most {max} bytes, got {size}")]
	SizeTooLarge { size: usize, max: usize },
}

/// Failure delivered through the completion path of a read.
#[derive(Debug, Error)]
pub enum ReadError {
	#[error(transparent)]
	BadStream(#[from] ResolveError),
	#[error(transparent)]
	Failed(#[from] ReadFailure),
	#[error("read worker stopped before delivering a result")]
	WorkerLost,
}
impl ReadError {
	pub fn property(&self) -> ErrorProperty {
		match self {
			ReadError::BadStream(_) => ErrorProperty::BadStream,
			ReadError::Failed(failure) => match failure.kind {
				ErrorKind::SystemError => ErrorProperty::SystemError,
				ErrorKind::EndOfStream => ErrorProperty::EndOfFile,
			},
			ReadError::WorkerLost => ErrorProperty::SystemError,
		}
	}
	/// Bytes obtained before the failure. Zero if no read was attempted.
	pub fn bytes_read(&self) -> usize {
		match self {
			ReadError::Failed(failure) => failure.bytes_read,
			_ => 0,
		}
	}
}
