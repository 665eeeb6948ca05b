use std::{alloc::{self, Layout}, fmt, ops::{Deref, DerefMut}};

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocationError {
	#[error("{size} bytes exceeds the maximum allocation size")]
	CapacityOverflow { size: usize },
	#[error("out of memory allocating {size} bytes")]
	OutOfMemory { size: usize },
}

/// Owned, fixed-size byte region that a full read fills.
/// Only ever handed out fully populated; on failure it is dropped with the operation.
#[derive(Clone, PartialEq, Eq)]
pub struct ReadBuffer {
	data: Vec<u8>,
}
impl ReadBuffer {
	/// Allocate `size` zeroed bytes, reporting allocation failure instead of aborting.
	/// Zeroing is left to the allocator so that untouched pages of a large buffer are not committed up front.
	pub fn allocate(size: usize) -> Result<Self, AllocationError> {
		if size == 0 {
			return Ok(Self { data: Vec::new() });
		}
		let layout = Layout::array::<u8>(size).map_err(|_| AllocationError::CapacityOverflow { size })?;
		let ptr = unsafe { alloc::alloc_zeroed(layout) };
		if ptr.is_null() {
			return Err(AllocationError::OutOfMemory { size });
		}
		// SAFETY: `ptr` was allocated by the global allocator with the layout of `[u8; size]` and is fully initialized (zeroed)
		let data = unsafe { Vec::from_raw_parts(ptr, size, size) };
		Ok(Self { data })
	}
	pub fn into_vec(self) -> Vec<u8> { self.data }
}
impl Deref for ReadBuffer {
	type Target = [u8];
	fn deref(&self) -> &[u8] { &self.data }
}
impl DerefMut for ReadBuffer {
	fn deref_mut(&mut self) -> &mut [u8] { &mut self.data }
}
impl fmt::Debug for ReadBuffer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.debug_struct("ReadBuffer").field("len", &self.data.len()).finish() }
}
