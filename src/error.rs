use std::io;

use thiserror::Error;

/// The error type for all channel, pump, and decode operations
///
/// Syscall failures keep the underlying [`io::Error`] as their source, so
/// callers can still get at the raw OS error if they need it. `EINTR` never
/// shows up here; interrupted waits and reads are retried internally.
#[derive(Debug, Error)]
pub enum Error {
    /// A kernel limit was hit (inotify instances, watches, or memory)
    #[error("inotify resource limit reached")]
    ResourceExhausted(#[source] io::Error),

    /// The caller lacks permission to watch the given path
    #[error("permission denied")]
    PermissionDenied(#[source] io::Error),

    /// The path did not exist when the watch was added
    #[error("watched path does not exist")]
    NotFound(#[source] io::Error),

    /// A malformed argument, or a watch descriptor that is not currently
    /// valid on this channel
    #[error("invalid argument")]
    InvalidArgument(#[source] io::Error),

    /// The channel has been closed; no further operations can succeed
    #[error("channel is closed")]
    ChannelClosed,

    /// The decoder found a record whose declared length does not fit the
    /// read buffer
    ///
    /// This indicates desynchronization with the kernel's byte stream and is
    /// fatal for the channel: stop pumping and discard it.
    #[error("corrupted event record at buffer offset {offset}")]
    Corrupted {
        /// Offset into the read buffer at which the bad record starts
        offset: usize,
    },

    /// Any other I/O failure from the underlying syscalls
    #[error("inotify I/O error")]
    Io(#[source] io::Error),
}

impl Error {
    /// Classifies the errno of a failed syscall
    pub(crate) fn from_os(error: io::Error) -> Self {
        match error.raw_os_error() {
            Some(libc::EMFILE) | Some(libc::ENFILE) | Some(libc::ENOMEM) | Some(libc::ENOSPC) => {
                Error::ResourceExhausted(error)
            }
            Some(libc::EACCES) | Some(libc::EPERM) => Error::PermissionDenied(error),
            Some(libc::ENOENT) => Error::NotFound(error),
            Some(libc::EINVAL) | Some(libc::ENAMETOOLONG) | Some(libc::ENOTDIR) => {
                Error::InvalidArgument(error)
            }
            Some(libc::EBADF) => Error::ChannelClosed,
            _ => Error::Io(error),
        }
    }

    pub(crate) fn last_os_error() -> Self {
        Error::from_os(io::Error::last_os_error())
    }

    pub(crate) fn invalid_argument(message: &'static str) -> Self {
        Error::InvalidArgument(io::Error::new(io::ErrorKind::InvalidInput, message))
    }
}
