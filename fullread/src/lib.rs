//! Read exactly N bytes from a stream descriptor that may be in non-blocking mode.
//! The descriptor is switched to blocking mode for the duration of the read and switched back afterwards, whatever the outcome.

mod buffer;
mod mode;
mod read;

pub use buffer::*;
pub use mode::*;
pub use read::*;

use std::{io, num::NonZeroUsize, os::unix::io::RawFd};

use thiserror::Error;

/// A single full-read request. Built per call and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
	pub descriptor: RawFd,
	pub target_size: NonZeroUsize,
}
impl ReadRequest {
	pub fn new(descriptor: RawFd, target_size: NonZeroUsize) -> Self {
		Self { descriptor, target_size }
	}
}

/// Kinds of failure produced by [`BlockingFullRead`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Allocation, mode query/set/restore, or a read error other than an interruption.
	SystemError,
	/// Peer closed its side before the requested size was satisfied.
	EndOfStream,
}

/// Classified failure of a full read. Carries the number of bytes obtained before the failure.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ReadFailure {
	pub kind: ErrorKind,
	pub message: String,
	pub bytes_read: usize,
	#[source]
	pub source: Option<io::Error>,
}
impl ReadFailure {
	pub fn system(context: &str, err: io::Error, bytes_read: usize) -> Self {
		Self {
			kind: ErrorKind::SystemError,
			message: format!("{context}: {err}"),
			bytes_read,
			source: Some(err),
		}
	}
	pub fn end_of_stream(bytes_read: usize) -> Self {
		Self {
			kind: ErrorKind::EndOfStream,
			message: format!("reached end of stream (read {bytes_read} bytes)"),
			bytes_read,
			source: None,
		}
	}
}

/// Either the filled buffer, or why it could not be filled.
pub type OperationResult = Result<ReadBuffer, ReadFailure>;
