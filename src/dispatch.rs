use std::{future::Future, num::NonZeroUsize, pin::Pin, task::{Context, Poll}};

use async_std::task;
use futures::{channel::oneshot, FutureExt};

use fullread::{BlockingFullRead, ReadBuffer, ReadRequest};

use crate::{resolve, ArgumentError, Config, ReadError, ResolveError, SocketHandle};

/// Result of a submitted read. Resolves once the worker reaches a terminal state.
/// Dropping it does not stop the worker.
#[derive(Debug)]
pub struct PendingRead {
	receiver: oneshot::Receiver<Result<ReadBuffer, ReadError>>,
}
impl PendingRead {
	/// A read that failed before it could be handed to a worker.
	fn failed(err: ReadError) -> Self {
		let (sender, receiver) = oneshot::channel();
		let _ = sender.send(Err(err));
		Self { receiver }
	}
}
impl Future for PendingRead {
	type Output = Result<ReadBuffer, ReadError>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		self.receiver.poll_unpin(cx).map(|result| match result {
			Ok(result) => result,
			Err(oneshot::Canceled) => {
				log::error!("read worker exited without sending a result");
				Err(ReadError::WorkerLost)
			}
		})
	}
}

/// Runs full reads off the caller's task and delivers their results back.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
	config: Config,
}

impl Dispatcher {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Check the arguments of a read. The outer error is caller misuse, the inner one a socket that can't be read from.
	/// A handle that isn't a stream socket at all counts as misuse.
	pub fn prepare<S: SocketHandle + ?Sized>(&self, socket: &S, size: usize) -> Result<Result<ReadRequest, ResolveError>, ArgumentError> {
		let resolved = match resolve(socket) {
			Err(ResolveError::NotASocket) => return Err(ArgumentError::NotASocket),
			resolved => resolved,
		};
		let target_size = NonZeroUsize::new(size).ok_or(ArgumentError::NonPositiveSize)?;
		if size > self.config.max_size {
			return Err(ArgumentError::SizeTooLarge { size, max: self.config.max_size });
		}
		Ok(resolved.map(|descriptor| ReadRequest::new(descriptor, target_size)))
	}

	/// Start a read on the blocking thread pool.
	pub fn submit(&self, request: ReadRequest) -> PendingRead {
		let (sender, receiver) = oneshot::channel();
		let log_reads = self.config.log_reads;
		let _ = task::spawn_blocking(move || {
			let result = BlockingFullRead::execute(request);
			match &result {
				Ok(buffer) if log_reads => log::debug!("fd {}: read {} bytes", request.descriptor, buffer.len()),
				Ok(_) => {}
				Err(failure) => log::debug!("fd {}: read failed: {failure}", request.descriptor),
			}
			if sender.send(result.map_err(ReadError::from)).is_err() {
				log::warn!("fd {}: read finished but its result was no longer awaited", request.descriptor);
			}
		});
		PendingRead { receiver }
	}

	/// Read exactly `size` bytes from `socket`. Argument errors are returned immediately;
	/// everything else, including an unreadable socket, comes out of the returned future.
	pub fn read_exact<S: SocketHandle + ?Sized>(&self, socket: &S, size: usize) -> Result<PendingRead, ArgumentError> {
		Ok(match self.prepare(socket, size)? {
			Ok(request) => self.submit(request),
			Err(err) => PendingRead::failed(ReadError::BadStream(err)),
		})
	}

	/// Callback form of [`Dispatcher::read_exact`]: `handler` is called exactly once, from an async-std task, with the outcome.
	pub fn read<S, F>(&self, socket: &S, size: usize, handler: F) -> Result<(), ArgumentError>
	where
		S: SocketHandle + ?Sized,
		F: FnOnce(Result<ReadBuffer, ReadError>) + Send + 'static,
	{
		let read = self.read_exact(socket, size)?;
		task::spawn(async move { handler(read.await) });
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use std::{
		io::{self, Write},
		os::unix::io::{AsRawFd, RawFd},
		sync::{Arc, Mutex, OnceLock},
		time::Duration,
	};

	use async_std::os::unix::net::UnixStream;
	use futures::AsyncWriteExt;

	use super::*;
	use crate::{ErrorProperty, ModeControl, RawDescriptor, StreamKind};

	/// Log output shared by every test in this module.
	#[derive(Clone, Default)]
	struct CapturedLog(Arc<Mutex<Vec<u8>>>);
	impl CapturedLog {
		fn contains(&self, needle: &str) -> bool {
			let output = self.0.lock().unwrap();
			String::from_utf8_lossy(&output).contains(needle)
		}
	}
	impl Write for CapturedLog {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.0.lock().unwrap().extend_from_slice(buf);
			Ok(buf.len())
		}
		fn flush(&mut self) -> io::Result<()> { Ok(()) }
	}

	fn init_logger() -> CapturedLog {
		static LOG: OnceLock<CapturedLog> = OnceLock::new();
		LOG.get_or_init(|| {
			let log = CapturedLog::default();
			let _ = simplelog::WriteLogger::init(log::LevelFilter::Debug, simplelog::Config::default(), log.clone());
			log
		}).clone()
	}

	struct FakeSocket {
		kind: Option<StreamKind>,
		readable: bool,
	}
	impl SocketHandle for FakeSocket {
		fn stream_kind(&self) -> Option<StreamKind> { self.kind }
		fn is_readable(&self) -> bool { self.readable }
		fn descriptor(&self) -> Option<RawFd> { Some(0) }
	}

	#[async_std::test]
	async fn test_read_in_two_writes() -> anyhow::Result<()> {
		init_logger();
		let (reader, mut writer) = UnixStream::pair()?;
		let payload: Vec<u8> = (0..4096).map(|i| (i * 7 % 256) as u8).collect();
		let sent = payload.clone();
		let peer = task::spawn(async move {
			writer.write_all(&sent[..2000]).await?;
			task::sleep(Duration::from_millis(20)).await;
			writer.write_all(&sent[2000..]).await?;
			Ok::<_, std::io::Error>(writer)
		});

		let dispatcher = Dispatcher::default();
		let buffer = dispatcher.read_exact(&reader, 4096)?.await?;
		let _writer = peer.await?;

		assert_eq!(buffer.into_vec(), payload);
		assert!(RawDescriptor::new(reader.as_raw_fd()).is_non_blocking()?);
		Ok(())
	}

	#[async_std::test]
	async fn test_end_of_stream() -> anyhow::Result<()> {
		init_logger();
		let (reader, mut writer) = UnixStream::pair()?;
		writer.write_all(b"abc").await?;
		drop(writer);

		let err = Dispatcher::default().read_exact(&reader, 10)?.await.unwrap_err();
		assert_eq!(err.property(), ErrorProperty::EndOfFile);
		assert_eq!(err.bytes_read(), 3);
		assert_eq!(err.to_string(), "reached end of stream (read 3 bytes)");
		assert!(RawDescriptor::new(reader.as_raw_fd()).is_non_blocking()?);
		Ok(())
	}

	#[async_std::test]
	async fn test_read_with_handler() -> anyhow::Result<()> {
		let (reader, mut writer) = UnixStream::pair()?;
		writer.write_all(b"0123456789").await?;

		let (sender, receiver) = oneshot::channel();
		Dispatcher::default().read(&reader, 8, move |result| {
			let _ = sender.send(result);
		})?;
		let buffer = receiver.await??;
		assert_eq!(&buffer[..], b"01234567");
		Ok(())
	}

	#[async_std::test]
	async fn test_rejected_arguments() -> anyhow::Result<()> {
		let (reader, _writer) = UnixStream::pair()?;
		let dispatcher = Dispatcher::new(Config { max_size: 16, ..Default::default() });

		assert_eq!(dispatcher.read_exact(&reader, 0).err(), Some(ArgumentError::NonPositiveSize));
		assert_eq!(dispatcher.read_exact(&reader, 17).err(), Some(ArgumentError::SizeTooLarge { size: 17, max: 16 }));

		let not_socket = FakeSocket { kind: None, readable: true };
		assert_eq!(dispatcher.read(&not_socket, 4, |_| panic!("handler called")), Err(ArgumentError::NotASocket));
		Ok(())
	}

	#[async_std::test]
	async fn test_unreadable_socket_goes_through_handler() -> anyhow::Result<()> {
		let closed = FakeSocket { kind: Some(StreamKind::Tcp), readable: false };
		let (sender, receiver) = oneshot::channel();
		Dispatcher::default().read(&closed, 4, move |result| {
			let _ = sender.send(result);
		})?;
		let err = receiver.await?.unwrap_err();
		assert_eq!(err.property(), ErrorProperty::BadStream);
		assert_eq!(err.to_string(), "socket is not readable");
		Ok(())
	}

	#[async_std::test]
	async fn test_completed_reads_are_logged_only_when_enabled() -> anyhow::Result<()> {
		let log = init_logger();
		// Sizes unique to this test, other tests log concurrently
		let (reader, mut writer) = UnixStream::pair()?;
		writer.write_all(&[5; 77 + 78]).await?;

		let quiet = Dispatcher::new(Config { log_reads: false, ..Default::default() });
		assert_eq!(quiet.read_exact(&reader, 77)?.await?.len(), 77);
		assert!(!log.contains("read 77 bytes"));

		let verbose = Dispatcher::new(Config { log_reads: true, ..Default::default() });
		assert_eq!(verbose.read_exact(&reader, 78)?.await?.len(), 78);
		assert!(log.contains(&format!("fd {}: read 78 bytes", reader.as_raw_fd())));
		Ok(())
	}

	#[async_std::test]
	async fn test_lost_worker() {
		let (sender, receiver) = oneshot::channel::<Result<ReadBuffer, ReadError>>();
		drop(sender);
		let err = PendingRead { receiver }.await.unwrap_err();
		assert!(matches!(err, ReadError::WorkerLost));
		assert_eq!(err.property(), ErrorProperty::SystemError);
	}

	#[async_std::test]
	async fn test_dropped_read_still_restores_mode() -> anyhow::Result<()> {
		let log = init_logger();
		let (reader, mut writer) = UnixStream::pair()?;
		let fd = reader.as_raw_fd();

		drop(Dispatcher::default().read_exact(&reader, 6)?);
		writer.write_all(b"abcdef").await?;

		let finished = format!("fd {fd}: read finished but its result was no longer awaited");
		for _ in 0..200 {
			if log.contains(&finished) { break }
			task::sleep(Duration::from_millis(10)).await;
		}
		assert!(log.contains(&finished));
		assert!(RawDescriptor::new(fd).is_non_blocking()?);
		Ok(())
	}
}
