//! The fixed vocabulary of inotify mask bits
//!
//! Masks are compared by bitwise AND/OR against the kernel ABI, so every
//! constant here takes its value straight from [`inotify_sys`] and matches
//! the layout in `linux/inotify.h` bit-for-bit.

use std::{
    convert::{TryFrom, TryInto},
    error::Error as StdError,
    fmt::{self, Display},
};

use inotify_sys as ffi;

bitflags! {
    /// Describes a file system watch
    ///
    /// Passed to [`Channel::add_watch`], to describe what file system events
    /// to watch for, and how to do that.
    ///
    /// [`Channel::add_watch`]: crate::Channel::add_watch
    #[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
    pub struct WatchMask: u32 {
        /// File was accessed
        const ACCESS = ffi::IN_ACCESS;

        /// File was modified
        const MODIFY = ffi::IN_MODIFY;

        /// Metadata (permissions, timestamps, ...) changed
        const ATTRIB = ffi::IN_ATTRIB;

        /// File opened for writing was closed
        const CLOSE_WRITE = ffi::IN_CLOSE_WRITE;

        /// File or directory not opened for writing was closed
        const CLOSE_NOWRITE = ffi::IN_CLOSE_NOWRITE;

        /// File or directory was opened
        const OPEN = ffi::IN_OPEN;

        /// File was renamed/moved; watched directory contained old name
        const MOVED_FROM = ffi::IN_MOVED_FROM;

        /// File was renamed/moved; watched directory contains new name
        const MOVED_TO = ffi::IN_MOVED_TO;

        /// File/directory created in watched directory
        const CREATE = ffi::IN_CREATE;

        /// File/directory deleted from watched directory
        const DELETE = ffi::IN_DELETE;

        /// Watched file/directory was itself deleted
        const DELETE_SELF = ffi::IN_DELETE_SELF;

        /// Watched file/directory was itself moved
        const MOVE_SELF = ffi::IN_MOVE_SELF;

        /// Watch for both [`CLOSE_WRITE`](Self::CLOSE_WRITE) and
        /// [`CLOSE_NOWRITE`](Self::CLOSE_NOWRITE)
        const CLOSE = ffi::IN_CLOSE;

        /// Watch for both [`MOVED_FROM`](Self::MOVED_FROM) and
        /// [`MOVED_TO`](Self::MOVED_TO)
        const MOVE = ffi::IN_MOVE;

        /// Watch for all event kinds
        const ALL_EVENTS = ffi::IN_ALL_EVENTS;

        /// Only watch path, if it is a directory
        const ONLYDIR = ffi::IN_ONLYDIR;

        /// Don't dereference the path if it is a symbolic link
        const DONT_FOLLOW = ffi::IN_DONT_FOLLOW;

        /// If a watch for the inode exists, amend it instead of replacing it
        ///
        /// Whether the kernel merges or replaces the mask of an existing
        /// watch is decided by this bit alone; the channel passes it through
        /// untouched.
        const MASK_ADD = ffi::IN_MASK_ADD;

        /// Only receive one event, then remove the watch
        const ONESHOT = ffi::IN_ONESHOT;
    }
}

bitflags! {
    /// Indicates the type of an event
    ///
    /// Retrieved from an [`Event`] via its `mask` field. Compare against the
    /// constants here with [`EventMask::contains`], or split the mask into
    /// structured parts with [`EventMask::parse`].
    ///
    /// [`Event`]: crate::Event
    #[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
    pub struct EventMask: u32 {
        /// File was accessed
        const ACCESS = ffi::IN_ACCESS;

        /// File was modified
        const MODIFY = ffi::IN_MODIFY;

        /// Metadata (permissions, timestamps, ...) changed
        const ATTRIB = ffi::IN_ATTRIB;

        /// File opened for writing was closed
        const CLOSE_WRITE = ffi::IN_CLOSE_WRITE;

        /// File or directory not opened for writing was closed
        const CLOSE_NOWRITE = ffi::IN_CLOSE_NOWRITE;

        /// File or directory was opened
        const OPEN = ffi::IN_OPEN;

        /// File was renamed/moved; watched directory contained old name
        const MOVED_FROM = ffi::IN_MOVED_FROM;

        /// File was renamed/moved; watched directory contains new name
        const MOVED_TO = ffi::IN_MOVED_TO;

        /// File/directory created in watched directory
        const CREATE = ffi::IN_CREATE;

        /// File/directory deleted from watched directory
        const DELETE = ffi::IN_DELETE;

        /// Watched file/directory was itself deleted
        ///
        /// An event with [`IGNORED`](Self::IGNORED) will subsequently be
        /// generated for the same watch descriptor.
        const DELETE_SELF = ffi::IN_DELETE_SELF;

        /// Watched file/directory was itself moved
        const MOVE_SELF = ffi::IN_MOVE_SELF;

        /// File system containing the watched object was unmounted
        ///
        /// An event with [`IGNORED`](Self::IGNORED) will subsequently be
        /// generated for the same watch descriptor.
        const UNMOUNT = ffi::IN_UNMOUNT;

        /// The kernel's event queue overflowed and events were lost
        ///
        /// Delivered as an ordinary event with a watch descriptor of `-1`
        /// (no specific watch). This is a data-loss signal, not an error;
        /// callers typically react by re-scanning the watched trees.
        const Q_OVERFLOW = ffi::IN_Q_OVERFLOW;

        /// Watch was removed
        ///
        /// Generated when the watch was removed explicitly (via
        /// [`Channel::rm_watch`]) or automatically (because the file was
        /// deleted or the file system was unmounted). After this event the
        /// descriptor is permanently invalid and must not be reused.
        ///
        /// [`Channel::rm_watch`]: crate::Channel::rm_watch
        const IGNORED = ffi::IN_IGNORED;

        /// Both close bits
        const CLOSE = ffi::IN_CLOSE;

        /// Both move bits
        const MOVE = ffi::IN_MOVE;

        /// All event kinds combined
        const ALL_EVENTS = ffi::IN_ALL_EVENTS;

        /// Subject of this event is a directory
        const ISDIR = ffi::IN_ISDIR;
    }
}

impl EventMask {
    /// Parse this event mask into a [`ParsedEventMask`]
    pub fn parse(self) -> Result<ParsedEventMask, EventMaskParseError> {
        self.try_into()
    }
}

/// Structured access to an event mask read from the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParsedEventMask {
    /// The kind of event that occurred
    pub kind: Option<EventKind>,
    /// The auxiliary flags about the event
    pub auxiliary_flags: EventAuxiliaryFlags,
}

impl ParsedEventMask {
    /// Construct a `ParsedEventMask` from its component parts
    pub fn from_parts(kind: Option<EventKind>, auxiliary_flags: EventAuxiliaryFlags) -> Self {
        ParsedEventMask {
            kind,
            auxiliary_flags,
        }
    }

    /// Parse a raw event mask
    pub fn from_raw_event_mask(mask: EventMask) -> Result<Self, EventMaskParseError> {
        if mask.contains(EventMask::Q_OVERFLOW) {
            return Err(EventMaskParseError::QueueOverflow);
        }

        let kind = mask.try_into()?;
        let auxiliary_flags = mask.into();

        Ok(ParsedEventMask::from_parts(kind, auxiliary_flags))
    }
}

impl TryFrom<EventMask> for ParsedEventMask {
    type Error = EventMaskParseError;

    fn try_from(value: EventMask) -> Result<Self, Self::Error> {
        Self::from_raw_event_mask(value)
    }
}

/// The kind of change an event reports
///
/// Exactly 0 or 1 of the corresponding bits is set in a mask read from the
/// channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// File was accessed
    Access,
    /// Metadata changed
    Attrib,
    /// File opened for writing was closed
    CloseWrite,
    /// File or directory not opened for writing was closed
    CloseNowrite,
    /// File/directory created in watched directory
    Create,
    /// File/directory deleted from watched directory
    Delete,
    /// Watched file/directory was itself deleted
    DeleteSelf,
    /// File was modified
    Modify,
    /// Watched file/directory was itself moved
    MoveSelf,
    /// Old name of a renamed file
    MovedFrom,
    /// New name of a renamed file
    MovedTo,
    /// File or directory was opened
    Open,
}

impl EventKind {
    pub(crate) const BITFLAG_ENUM_MAP: &'static [(EventMask, EventKind)] = &[
        (EventMask::ACCESS, EventKind::Access),
        (EventMask::ATTRIB, EventKind::Attrib),
        (EventMask::CLOSE_WRITE, EventKind::CloseWrite),
        (EventMask::CLOSE_NOWRITE, EventKind::CloseNowrite),
        (EventMask::CREATE, EventKind::Create),
        (EventMask::DELETE, EventKind::Delete),
        (EventMask::DELETE_SELF, EventKind::DeleteSelf),
        (EventMask::MODIFY, EventKind::Modify),
        (EventMask::MOVE_SELF, EventKind::MoveSelf),
        (EventMask::MOVED_FROM, EventKind::MovedFrom),
        (EventMask::MOVED_TO, EventKind::MovedTo),
        (EventMask::OPEN, EventKind::Open),
    ];

    /// Parse the event kind from a raw event mask
    pub fn from_raw_event_mask(mask: EventMask) -> Result<Option<Self>, EventMaskParseError> {
        let mut kinds = Self::BITFLAG_ENUM_MAP.iter().filter_map(|(bits, kind)| {
            if mask.contains(*bits) {
                Some(*kind)
            } else {
                None
            }
        });

        let kind = kinds.next();

        if kinds.next().is_some() {
            // More than one kind bit is set; the mask is invalid.
            return Err(EventMaskParseError::TooManyBitsSet(mask));
        }

        Ok(kind)
    }
}

impl TryFrom<EventMask> for Option<EventKind> {
    type Error = EventMaskParseError;

    fn try_from(value: EventMask) -> Result<Self, Self::Error> {
        EventKind::from_raw_event_mask(value)
    }
}

/// Auxiliary flags carried alongside an event's kind
///
/// 0 or more of these may be set in any mask read from the channel.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default)]
pub struct EventAuxiliaryFlags {
    /// Watch was removed, explicitly or automatically
    pub ignored: bool,
    /// Event subject is a directory rather than a regular file
    pub isdir: bool,
    /// File system containing the watched object was unmounted
    pub unmount: bool,
}

impl EventAuxiliaryFlags {
    /// Parse the auxiliary flags from a raw event mask
    pub fn from_raw_event_mask(mask: EventMask) -> Self {
        EventAuxiliaryFlags {
            ignored: mask.contains(EventMask::IGNORED),
            isdir: mask.contains(EventMask::ISDIR),
            unmount: mask.contains(EventMask::UNMOUNT),
        }
    }
}

impl From<EventMask> for EventAuxiliaryFlags {
    fn from(value: EventMask) -> Self {
        Self::from_raw_event_mask(value)
    }
}

/// An error that occurred while parsing a raw event mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventMaskParseError {
    /// More than one bit representing the event kind was set
    TooManyBitsSet(EventMask),
    /// The event signals that the kernel's event queue overflowed
    QueueOverflow,
}

impl Display for EventMaskParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyBitsSet(mask) => {
                write!(
                    f,
                    "Error parsing event mask: too many event kind bits set | {mask:?}"
                )
            }
            Self::QueueOverflow => write!(f, "Error: the kernel's event queue overflowed"),
        }
    }
}

impl StdError for EventMaskParseError {}
