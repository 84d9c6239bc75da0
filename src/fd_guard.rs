use std::{
    io,
    ops::Deref,
    os::unix::io::RawFd,
    sync::atomic::{AtomicBool, Ordering},
};

/// Owns a raw file descriptor and closes it exactly once
///
/// The guard can be closed explicitly, ahead of drop, by [`FdGuard::close`];
/// the atomic flag makes sure the second release attempt (from `Drop`) is a
/// no-op rather than a double close of a possibly reused fd number.
///
/// Independently of the actual close, a guard can be [revoked]: revocation
/// makes operations fail fast while keeping the descriptor open, so a
/// syscall already holding the guard can never end up on a reused fd
/// number. The descriptor of a revoked guard is released when the guard
/// drops.
///
/// [revoked]: FdGuard::revoke
#[derive(Debug)]
pub(crate) struct FdGuard {
    fd: RawFd,
    closed: AtomicBool,
    revoked: AtomicBool,
}

impl FdGuard {
    pub(crate) fn new(fd: RawFd) -> Self {
        FdGuard {
            fd,
            closed: AtomicBool::new(false),
            revoked: AtomicBool::new(false),
        }
    }

    /// Forbids further operations without releasing the descriptor
    ///
    /// Returns `false` if the guard was already revoked.
    pub(crate) fn revoke(&self) -> bool {
        !self.revoked.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_revoked(&self) -> bool {
        self.revoked.load(Ordering::SeqCst)
    }

    /// Closes the descriptor now, reporting the result of `close(2)`
    ///
    /// Returns `None` if the descriptor has already been released.
    pub(crate) fn close(&self) -> Option<io::Result<()>> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return None;
        }

        let result = unsafe { libc::close(self.fd) };
        match result {
            0 => Some(Ok(())),
            _ => Some(Err(io::Error::last_os_error())),
        }
    }

}

impl Drop for FdGuard {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl Deref for FdGuard {
    type Target = RawFd;

    fn deref(&self) -> &Self::Target {
        &self.fd
    }
}
