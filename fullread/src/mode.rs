//! Blocking-mode control for raw descriptors, and the guard that puts a descriptor back into the mode it was found in.

use std::{io, os::unix::io::{AsRawFd, RawFd}};

use libc::c_int;
use thiserror::Error;

/// Get and set the blocking-mode flag of a descriptor.
pub trait ModeControl {
	fn is_non_blocking(&self) -> io::Result<bool>;
	fn set_non_blocking(&self, non_blocking: bool) -> io::Result<()>;
}

/// A readable stream endpoint whose blocking mode can be controlled.
pub trait Descriptor: ModeControl {
	/// Single read syscall into `buf`. Returns 0 at end of stream.
	fn read_into(&self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Plain OS file descriptor. Does not own the descriptor and never closes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDescriptor(RawFd);
impl RawDescriptor {
	pub fn new(fd: RawFd) -> Self { Self(fd) }

	fn status_flags(&self) -> io::Result<c_int> {
		let flags = unsafe { libc::fcntl(self.0, libc::F_GETFL) };
		if flags == -1 { Err(io::Error::last_os_error()) } else { Ok(flags) }
	}
}
impl AsRawFd for RawDescriptor {
	fn as_raw_fd(&self) -> RawFd { self.0 }
}
impl ModeControl for RawDescriptor {
	fn is_non_blocking(&self) -> io::Result<bool> {
		Ok(self.status_flags()? & libc::O_NONBLOCK != 0)
	}
	fn set_non_blocking(&self, non_blocking: bool) -> io::Result<()> {
		// Re-read so that other status flags set in the meantime are kept
		let flags = self.status_flags()?;
		let new_flags = if non_blocking { flags | libc::O_NONBLOCK } else { flags & !libc::O_NONBLOCK };
		if new_flags != flags && unsafe { libc::fcntl(self.0, libc::F_SETFL, new_flags) } == -1 {
			return Err(io::Error::last_os_error());
		}
		Ok(())
	}
}
impl Descriptor for RawDescriptor {
	fn read_into(&self, buf: &mut [u8]) -> io::Result<usize> {
		match unsafe { libc::read(self.0, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) } {
			n if n < 0 => Err(io::Error::last_os_error()),
			n => Ok(n as usize),
		}
	}
}

/// Mode of a descriptor captured before it was forced into blocking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeState {
	pub was_non_blocking: bool,
}

#[derive(Debug, Error)]
pub enum ModeError {
	#[error("mode query failed: {0}")]
	Query(#[source] io::Error),
	#[error("mode set failed: {0}")]
	Set(#[source] io::Error),
}
impl ModeError {
	pub fn context(&self) -> &'static str {
		match self {
			ModeError::Query(_) => "mode query failed",
			ModeError::Set(_) => "mode set failed",
		}
	}
	pub fn into_io(self) -> io::Error {
		match self {
			ModeError::Query(err) | ModeError::Set(err) => err,
		}
	}
}

/// Holds a descriptor in blocking mode. Call [`BlockingGuard::restore`] to put the captured mode back and observe the result;
/// if the guard is dropped without it (e.g. on unwind) the mode is restored on a best-effort basis.
pub struct BlockingGuard<'d, M: ModeControl + ?Sized> {
	control: &'d M,
	state: ModeState,
	restored: bool,
}
impl<'d, M: ModeControl + ?Sized> BlockingGuard<'d, M> {
	pub fn acquire(control: &'d M) -> Result<Self, ModeError> {
		let was_non_blocking = control.is_non_blocking().map_err(ModeError::Query)?;
		if was_non_blocking {
			control.set_non_blocking(false).map_err(ModeError::Set)?;
			log::debug!("descriptor switched to blocking mode");
		}
		Ok(Self { control, state: ModeState { was_non_blocking }, restored: false })
	}
	pub fn state(&self) -> ModeState { self.state }

	pub fn restore(mut self) -> io::Result<()> {
		self.restored = true;
		self.restore_mode()
	}
	fn restore_mode(&self) -> io::Result<()> {
		if self.state.was_non_blocking {
			self.control.set_non_blocking(true)?;
			log::debug!("descriptor switched back to non-blocking mode");
		}
		Ok(())
	}
}
impl<'d, M: ModeControl + ?Sized> Drop for BlockingGuard<'d, M> {
	fn drop(&mut self) {
		if !self.restored {
			if let Err(err) = self.restore_mode() {
				log::warn!("failed to restore descriptor mode on drop: {err}");
			}
		}
	}
}
