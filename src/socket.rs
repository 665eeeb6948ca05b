//! Turning caller socket handles into descriptors that can be read from directly.

use std::os::unix::io::{AsRawFd, RawFd};

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
	Tcp,
	Unix,
}

/// A connected stream socket owned by the caller's event loop.
pub trait SocketHandle {
	/// Kind of stream socket behind this handle, or `None` if it isn't one.
	fn stream_kind(&self) -> Option<StreamKind>;
	/// Whether the socket can still be read from.
	fn is_readable(&self) -> bool;
	/// Descriptor backing this handle, if it has one.
	fn descriptor(&self) -> Option<RawFd>;
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
	#[error("first argument should be a socket")]
	NotASocket,
	#[error("socket is not readable")]
	NotReadable,
	#[error("malformed socket object, cannot get file descriptor")]
	NoDescriptor,
}

/// Validate a socket handle and extract its descriptor.
pub fn resolve<S: SocketHandle + ?Sized>(socket: &S) -> Result<RawFd, ResolveError> {
	socket.stream_kind().ok_or(ResolveError::NotASocket)?;
	if !socket.is_readable() {
		return Err(ResolveError::NotReadable);
	}
	match socket.descriptor() {
		Some(fd) if fd >= 0 => Ok(fd),
		_ => Err(ResolveError::NoDescriptor),
	}
}

macro_rules! impl_socket_handle {
	($ty:ty, $kind:expr) => {
		impl SocketHandle for $ty {
			fn stream_kind(&self) -> Option<StreamKind> { Some($kind) }
			fn is_readable(&self) -> bool { self.peer_addr().is_ok() }
			fn descriptor(&self) -> Option<RawFd> { Some(self.as_raw_fd()) }
		}
	};
}

impl_socket_handle!(async_std::net::TcpStream, StreamKind::Tcp);
impl_socket_handle!(async_std::os::unix::net::UnixStream, StreamKind::Unix);
impl_socket_handle!(std::net::TcpStream, StreamKind::Tcp);
impl_socket_handle!(std::os::unix::net::UnixStream, StreamKind::Unix);
