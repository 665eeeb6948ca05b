//! Read an exact number of bytes from a socket that is otherwise driven by an async event loop.
//! The read itself runs on a blocking worker with the descriptor temporarily in blocking mode (see [`fullread`]);
//! this crate validates the caller's socket, hands the work off and brings the result back.

mod config;
mod dispatch;
mod error;
mod socket;

pub use config::*;
pub use dispatch::*;
pub use error::*;
pub use socket::*;

pub use fullread::{BlockingFullRead, ErrorKind, ModeControl, OperationResult, RawDescriptor, ReadBuffer, ReadFailure, ReadRequest};
