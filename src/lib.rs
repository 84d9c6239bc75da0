#![crate_name = "inotify_channel"]
#![crate_type = "lib"]
#![warn(missing_docs)]

//! Blocking event-channel wrapper for inotify.
//!
//! [Inotify][wiki] is a linux kernel mechanism for monitoring
//! changes to filesystems' contents.
//!
//! > The inotify API provides a mechanism for monitoring filesystem
//! > events. Inotify can be used to monitor individual files, or to
//! > monitor directories. When a directory is monitored, inotify will
//! > return events for the directory itself, and for files inside the
//! > directory.
//!
//! This crate exposes one inotify instance as a [`Channel`]: watches are
//! added and removed through it, and an [`EventPump`] drives the blocking
//! wait/read/decode loop that turns the kernel's byte stream into discrete
//! [`Event`] values. One channel is meant to be driven by one pump on one
//! dedicated thread; closing the channel from another thread unblocks the
//! pump promptly.
//!
//! See the [man page][inotify7] for usage information of the C version,
//! which this package follows closely.
//!
//! # Examples
//!
//! ```no_run
//! use inotify_channel::{Channel, EventPump, WatchMask};
//!
//! let channel = Channel::open()
//!     .expect("Failed to open inotify channel");
//!
//! channel
//!     .add_watch("/tmp", WatchMask::CREATE | WatchMask::DELETE)
//!     .expect("Failed to add watch");
//!
//! let mut pump = EventPump::new(&channel);
//! loop {
//!     let events = pump.next_events().expect("Failed to read events");
//!     for event in events {
//!         println!("{:?}", event);
//!     }
//! }
//! ```
//!
//! [wiki]: https://en.wikipedia.org/wiki/Inotify
//! [inotify7]: http://man7.org/linux/man-pages/man7/inotify.7.html

#[macro_use]
extern crate bitflags;

mod channel;
mod error;
mod events;
mod fd_guard;
mod mask;
mod pump;
mod util;

pub use crate::channel::{Channel, WatchDescriptor};
pub use crate::error::Error;
pub use crate::events::{Event, EventOwned, Events};
pub use crate::mask::{
    EventAuxiliaryFlags, EventKind, EventMask, EventMaskParseError, ParsedEventMask, WatchMask,
};
pub use crate::pump::{EventPump, READ_BUFFER_SIZE};
