use std::{io, num::NonZeroUsize};

use crate::{BlockingGuard, Descriptor, ErrorKind, OperationResult, RawDescriptor, ReadBuffer, ReadFailure, ReadRequest};

/// How the read loop stopped.
#[derive(Debug)]
enum LoopEnd {
	Complete,
	EndOfStream,
	Failed(io::Error),
}

/// Fills a buffer of a known size from a descriptor, holding the descriptor in blocking mode while doing so.
pub struct BlockingFullRead;

impl BlockingFullRead {
	/// Run a request against a raw OS descriptor. Blocks the calling thread until the buffer is full, the peer closes, or a read fails.
	pub fn execute(request: ReadRequest) -> OperationResult {
		Self::execute_on(&RawDescriptor::new(request.descriptor), request.target_size)
	}

	pub fn execute_on<D: Descriptor + ?Sized>(descriptor: &D, target_size: NonZeroUsize) -> OperationResult {
		let mut buffer = ReadBuffer::allocate(target_size.get()).map_err(|err| ReadFailure {
			kind: ErrorKind::SystemError,
			message: format!("allocation failed: {err}"),
			bytes_read: 0,
			source: None,
		})?;

		let guard = BlockingGuard::acquire(descriptor).map_err(|err| {
			let context = err.context();
			ReadFailure::system(context, err.into_io(), 0)
		})?;

		let (bytes_read, end) = Self::fill(descriptor, &mut buffer);

		// Single teardown for every way the loop can end
		let restored = guard.restore();

		let failure = match end {
			LoopEnd::Complete => None,
			LoopEnd::EndOfStream => Some(ReadFailure::end_of_stream(bytes_read)),
			LoopEnd::Failed(err) => Some(ReadFailure::system("read failed", err, bytes_read)),
		};
		match (failure, restored) {
			(None, Ok(())) => {
				log::trace!("buffer filled with {bytes_read} bytes");
				Ok(buffer)
			}
			(None, Err(err)) => Err(ReadFailure::system("mode restore failed", err, bytes_read)),
			(Some(failure), Ok(())) => Err(failure),
			(Some(failure), Err(err)) => {
				log::warn!("mode restore failed after earlier error ({failure}): {err}");
				Err(failure)
			}
		}
	}

	/// Read until `buffer` is full. Returns the number of bytes read and why the loop stopped.
	fn fill<D: Descriptor + ?Sized>(descriptor: &D, buffer: &mut [u8]) -> (usize, LoopEnd) {
		let mut bytes_read = 0;
		while bytes_read < buffer.len() {
			match descriptor.read_into(&mut buffer[bytes_read..]) {
				Ok(0) => return (bytes_read, LoopEnd::EndOfStream),
				Ok(n) => bytes_read += n,
				Err(err) if err.kind() == io::ErrorKind::Interrupted => {
					log::trace!("read interrupted at {bytes_read} bytes, retrying");
				}
				Err(err) => return (bytes_read, LoopEnd::Failed(err)),
			}
		}
		(bytes_read, LoopEnd::Complete)
	}
}
