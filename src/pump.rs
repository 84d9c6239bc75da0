use std::{convert::Infallible, ffi::OsStr, io};

use crate::channel::Channel;
use crate::error::Error;
use crate::events::{Event, Events};
use crate::util::read_into_buffer;

/// Size in bytes of the pump's read buffer
///
/// Matches the largest read [`EventPump`] will ask the kernel for in one
/// call. Not part of the inotify protocol, but comfortably larger than one
/// maximal record (16-byte header plus a name of up to `NAME_MAX` bytes).
pub const READ_BUFFER_SIZE: usize = 16384;

/// Drives the blocking wait/read/decode loop for one channel
///
/// The pump is the only place this crate blocks: [`EventPump::next_events`]
/// waits indefinitely for the channel to become readable, performs one
/// bounded read, and returns the decoded batch. Callers choose pull-style
/// consumption by looping over `next_events`, or push-style via
/// [`EventPump::pump_forever`].
///
/// Run the pump on a dedicated thread. There is no cancellation token; the
/// one way to stop a blocked pump is to close the channel from another
/// thread, which makes the wait return [`Error::ChannelClosed`] promptly.
///
/// Events are handed out exactly in the order the kernel wrote them, both
/// within a batch and across batches; the pump introduces no buffering or
/// reordering of its own.
#[derive(Debug)]
pub struct EventPump<'c> {
    channel: &'c Channel,
    buffer: Box<[u8; READ_BUFFER_SIZE]>,
}

impl<'c> EventPump<'c> {
    /// Creates a pump for the given channel
    pub fn new(channel: &'c Channel) -> Self {
        EventPump {
            channel,
            buffer: Box::new([0; READ_BUFFER_SIZE]),
        }
    }

    /// Blocks until the channel has data available
    ///
    /// Waits without timeout in `poll(2)` on the channel's fd, so a blocked
    /// pump consumes no CPU. Interrupted waits (`EINTR`) are retried
    /// transparently; so is a zero-ready return, which cannot occur with an
    /// infinite timeout but is treated as a retry rather than trusted.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelClosed`] as soon as the channel is closed, from this
    /// or any other thread.
    pub fn wait_readable(&self) -> Result<(), Error> {
        loop {
            let fd = self.channel.raw_fd()?;

            let mut poll_fds = [
                libc::pollfd {
                    fd,
                    events: libc::POLLIN,
                    revents: 0,
                },
                libc::pollfd {
                    fd: self.channel.wake_fd(),
                    events: libc::POLLIN,
                    revents: 0,
                },
            ];

            let num_ready =
                unsafe { libc::poll(poll_fds.as_mut_ptr(), poll_fds.len() as libc::nfds_t, -1) };

            match num_ready {
                -1 => {
                    let error = io::Error::last_os_error();
                    if error.raw_os_error() == Some(libc::EINTR) {
                        continue;
                    }
                    return Err(Error::from_os(error));
                }
                0 => continue,
                _ => {}
            }

            // The wake pipe only ever becomes readable (HUP) when the
            // channel is closed out-of-band.
            if poll_fds[1].revents != 0 {
                return Err(Error::ChannelClosed);
            }
            if poll_fds[0].revents & libc::POLLNVAL != 0 {
                return Err(Error::ChannelClosed);
            }
            if poll_fds[0].revents != 0 {
                return Ok(());
            }
        }
    }

    /// Performs one bounded read after readiness was signaled
    ///
    /// Reads up to [`READ_BUFFER_SIZE`] bytes into the pump's buffer and
    /// returns the number of bytes read. The kernel fills the buffer with
    /// whole records only.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelClosed`] if the channel was closed, otherwise the
    /// classified system error. `EINTR` is retried.
    pub fn read_batch(&mut self) -> Result<usize, Error> {
        loop {
            let fd = self.channel.raw_fd()?;

            let num_bytes = read_into_buffer(fd, &mut self.buffer[..]);
            match num_bytes {
                0 => return Err(Error::ChannelClosed),
                -1 => {
                    let error = io::Error::last_os_error();
                    if error.raw_os_error() == Some(libc::EINTR) {
                        continue;
                    }
                    return Err(Error::from_os(error));
                }
                _ => return Ok(num_bytes as usize),
            }
        }
    }

    /// Waits for, reads, and decodes the next batch of events
    ///
    /// Blocks until at least one event is available, then returns an
    /// iterator over the whole batch. Each returned batch contains at least
    /// one event.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelClosed`] once the channel is closed,
    /// [`Error::Corrupted`] if the read bytes do not decode as back-to-back
    /// records (fatal for this channel), or the classified system error.
    pub fn next_events(&mut self) -> Result<Events<'_>, Error> {
        self.wait_readable()?;
        let num_bytes = self.read_batch()?;

        Events::parse(self.channel.weak_fd(), &self.buffer[..num_bytes])
    }

    /// Runs the wait/read/decode loop until the channel fails or is closed
    ///
    /// Invokes `on_event` once per decoded event, in kernel order. This
    /// never returns normally; the `Ok` variant is uninhabited. Termination
    /// is driven by closing the channel from another thread, which surfaces
    /// here as [`Error::ChannelClosed`].
    pub fn pump_forever<F>(&mut self, mut on_event: F) -> Result<Infallible, Error>
    where
        F: FnMut(Event<&OsStr>),
    {
        loop {
            for event in self.next_events()? {
                on_event(event);
            }
        }
    }
}
