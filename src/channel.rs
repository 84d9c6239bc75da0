use std::{
    cmp::Ordering,
    ffi::CString,
    hash::{Hash, Hasher},
    os::raw::c_int,
    os::unix::ffi::OsStrExt,
    os::unix::io::RawFd,
    path::Path,
    sync::{Arc, Weak},
};

use inotify_sys as ffi;

use crate::error::Error;
use crate::fd_guard::FdGuard;
use crate::mask::WatchMask;

/// One inotify notification channel
///
/// A `Channel` owns exactly one inotify file descriptor, obtained from the
/// kernel by [`Channel::open`]. Watches are registered against it with
/// [`Channel::add_watch`] and the resulting event stream is consumed through
/// an [`EventPump`].
///
/// One channel is meant to be driven by one pump on one dedicated thread;
/// independent channels share no state and can run concurrently. To stop a
/// running pump, share the channel (e.g. in an `Arc`) with a second thread
/// and call [`Channel::close`] there: the pump's blocked wait returns
/// [`Error::ChannelClosed`] promptly instead of hanging.
///
/// [`Channel::close`] makes every further operation fail and wakes a
/// blocked pump; the kernel handle itself is released when the channel is
/// dropped, so no syscall in flight can ever land on a reused fd number.
///
/// [`EventPump`]: crate::EventPump
#[derive(Debug)]
pub struct Channel {
    fd: Arc<FdGuard>,

    // Closing an fd does not wake a concurrent poll(2) on it, so `close`
    // additionally closes `wake_write`; the readiness wait includes
    // `wake_read` and converts its HUP into a closed-channel error.
    wake_read: FdGuard,
    wake_write: FdGuard,
}

impl Channel {
    /// Requests a fresh inotify instance from the kernel
    ///
    /// Calls [`inotify_init1`] with `IN_CLOEXEC`, so the descriptor is not
    /// leaked to processes executed by this one. The descriptor stays in
    /// blocking mode; all blocking behavior is multiplexed through the
    /// readiness wait in [`EventPump`].
    ///
    /// # Errors
    ///
    /// [`Error::ResourceExhausted`] when the kernel's limit on inotify
    /// instances or file descriptors is reached, otherwise the classified
    /// system error.
    ///
    /// [`inotify_init1`]: inotify_sys::inotify_init1
    /// [`EventPump`]: crate::EventPump
    pub fn open() -> Result<Channel, Error> {
        let fd = unsafe { ffi::inotify_init1(ffi::IN_CLOEXEC) };
        if fd == -1 {
            return Err(Error::last_os_error());
        }
        let fd = Arc::new(FdGuard::new(fd));

        let mut pipe_fds: [c_int; 2] = [-1; 2];
        let result = unsafe { libc::pipe2(pipe_fds.as_mut_ptr(), libc::O_CLOEXEC) };
        if result == -1 {
            // `fd` is released by its guard.
            return Err(Error::last_os_error());
        }

        Ok(Channel {
            fd,
            wake_read: FdGuard::new(pipe_fds[0]),
            wake_write: FdGuard::new(pipe_fds[1]),
        })
    }

    /// Adds or updates a watch for the given path
    ///
    /// Registers interest in `path` by calling [`inotify_add_watch`] and
    /// returns a [`WatchDescriptor`] that refers to the watch from then on.
    /// The `mask` defines what changes to watch for and how; see
    /// [`WatchMask`].
    ///
    /// If a watch already exists for the inode behind this path, the kernel
    /// either replaces its mask or, when [`WatchMask::MASK_ADD`] is set,
    /// merges the new mask into it; either way the previously returned
    /// descriptor is returned again. This policy is the kernel's and is
    /// passed through unchanged.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the path does not exist,
    /// [`Error::PermissionDenied`] if it is not accessible,
    /// [`Error::InvalidArgument`] for an empty path or one containing an
    /// interior NUL byte, [`Error::ResourceExhausted`] when the per-user
    /// watch limit is reached, and [`Error::ChannelClosed`] after
    /// [`Channel::close`].
    ///
    /// [`inotify_add_watch`]: inotify_sys::inotify_add_watch
    pub fn add_watch<P>(&self, path: P, mask: WatchMask) -> Result<WatchDescriptor, Error>
    where
        P: AsRef<Path>,
    {
        if self.fd.is_revoked() {
            return Err(Error::ChannelClosed);
        }

        let path = path.as_ref().as_os_str();
        if path.is_empty() {
            return Err(Error::invalid_argument("path must not be empty"));
        }
        let path = CString::new(path.as_bytes())
            .map_err(|_| Error::invalid_argument("path must not contain NUL bytes"))?;

        let wd = unsafe { ffi::inotify_add_watch(**self.fd, path.as_ptr() as *const _, mask.bits()) };

        match wd {
            -1 => Err(Error::last_os_error()),
            _ => Ok(WatchDescriptor {
                id: wd,
                fd: Arc::downgrade(&self.fd),
            }),
        }
    }

    /// Stops watching the object behind a descriptor
    ///
    /// Removes the watch by calling [`inotify_rm_watch`]. The descriptor is
    /// invalid from this point on; the kernel confirms the removal by
    /// delivering one final event with [`EventMask::IGNORED`] set for it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the descriptor did not originate from
    /// this channel, or is not currently registered on it (never existed,
    /// or was already removed).
    ///
    /// [`inotify_rm_watch`]: inotify_sys::inotify_rm_watch
    /// [`EventMask::IGNORED`]: crate::EventMask::IGNORED
    pub fn rm_watch(&self, wd: WatchDescriptor) -> Result<(), Error> {
        if self.fd.is_revoked() {
            return Err(Error::ChannelClosed);
        }

        // Identity, not fd number: a descriptor minted by a dead channel
        // whose fd number has since been reused must not reach the kernel
        // against this one.
        let owner = wd.fd.upgrade();
        if !owner.map_or(false, |owner| Arc::ptr_eq(&owner, &self.fd)) {
            return Err(Error::invalid_argument(
                "watch descriptor does not belong to this channel",
            ));
        }

        let result = unsafe { ffi::inotify_rm_watch(**self.fd, wd.id) };
        match result {
            0 => Ok(()),
            -1 => Err(Error::last_os_error()),
            _ => panic!("unexpected return code from inotify_rm_watch ({})", result),
        }
    }

    /// Closes the channel
    ///
    /// Wakes any pump currently blocked in its readiness wait; that wait,
    /// and every later operation on this channel, fails with
    /// [`Error::ChannelClosed`].
    ///
    /// The kernel handle itself is released when the channel is dropped,
    /// not here. A pump blocked in `poll(2)` or `read(2)` at the moment of
    /// close is therefore still operating on the genuine descriptor, never
    /// on a reused fd number; the fd stays open, but unusable, until every
    /// borrower is gone.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelClosed`] if the channel was already closed,
    /// [`Error::Io`] if waking a blocked pump fails.
    pub fn close(&self) -> Result<(), Error> {
        if !self.fd.revoke() {
            return Err(Error::ChannelClosed);
        }

        match self.wake_write.close() {
            Some(Err(error)) => Err(Error::Io(error)),
            _ => Ok(()),
        }
    }

    /// Reports whether [`Channel::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.fd.is_revoked()
    }

    pub(crate) fn raw_fd(&self) -> Result<RawFd, Error> {
        if self.fd.is_revoked() {
            return Err(Error::ChannelClosed);
        }
        Ok(**self.fd)
    }

    pub(crate) fn wake_fd(&self) -> RawFd {
        *self.wake_read
    }

    pub(crate) fn weak_fd(&self) -> Weak<FdGuard> {
        Arc::downgrade(&self.fd)
    }
}

/// Represents a watch on an inode
///
/// Obtained from [`Channel::add_watch`] or from an [`Event`]. Valid only on
/// the channel that created it; passing it to [`Channel::rm_watch`] stops
/// the watch and invalidates the descriptor.
///
/// [`Event`]: crate::Event
#[derive(Clone, Debug)]
pub struct WatchDescriptor {
    pub(crate) id: c_int,
    pub(crate) fd: Weak<FdGuard>,
}

impl WatchDescriptor {
    /// The raw watch id assigned by the kernel
    ///
    /// Unique within the channel that minted the descriptor. Can be used to
    /// correlate events for files with the same name.
    pub fn id(&self) -> c_int {
        self.id
    }
}

impl Eq for WatchDescriptor {}

impl PartialEq for WatchDescriptor {
    fn eq(&self, other: &Self) -> bool {
        // Channel identity is the guard's address, not its fd number; fd
        // numbers are reused by the kernel.
        self.id == other.id && Weak::ptr_eq(&self.fd, &other.fd)
    }
}

impl Ord for WatchDescriptor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl PartialOrd for WatchDescriptor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for WatchDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Only `self.id` takes part in the hash, as `self.fd` is a weak
        // pointer that might no longer be available, and neither panicking
        // nor a hash that changes over time is acceptable.
        self.id.hash(state);
    }
}
