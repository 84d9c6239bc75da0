use std::{
    ffi::{OsStr, OsString},
    mem,
    os::unix::ffi::OsStrExt,
    sync::Weak,
};

use inotify_sys as ffi;

use crate::channel::WatchDescriptor;
use crate::error::Error;
use crate::fd_guard::FdGuard;
use crate::mask::EventMask;

/// Iterator over the events decoded from one read batch
///
/// Returned by [`EventPump::next_events`]. The whole batch is validated
/// against the buffer boundaries before the iterator is handed out, so
/// iteration itself cannot fail; a batch that does not consist of exactly
/// back-to-back records is rejected up front with [`Error::Corrupted`] and
/// yields nothing.
///
/// [`EventPump::next_events`]: crate::EventPump::next_events
#[derive(Debug)]
pub struct Events<'a> {
    fd: Weak<FdGuard>,
    buffer: &'a [u8],
    pos: usize,
}

impl<'a> Events<'a> {
    /// Validates `buffer` as a sequence of back-to-back event records
    ///
    /// Walks the declared record lengths once without materializing any
    /// event. Each record must fit a full header, its name must fit the
    /// buffer, and the final record must end exactly at the buffer's end.
    /// The kernel guarantees that a read from an inotify fd returns whole
    /// records only, so any violation means we have desynchronized from the
    /// byte stream and there is no way to resynchronize; the error is fatal
    /// for the channel.
    pub(crate) fn parse(fd: Weak<FdGuard>, buffer: &'a [u8]) -> Result<Self, Error> {
        let header_size = mem::size_of::<ffi::inotify_event>();

        let mut pos = 0;
        while pos < buffer.len() {
            if buffer.len() - pos < header_size {
                return Err(Error::Corrupted { offset: pos });
            }

            let header_ptr = buffer[pos..].as_ptr() as *const ffi::inotify_event;

            // The bounds check above makes reading the header safe. The
            // byte buffer has alignment 1 while `inotify_event` has a higher
            // alignment, so the pointer must be read unaligned.
            let header = unsafe { header_ptr.read_unaligned() };

            if buffer.len() - pos - header_size < header.len as usize {
                return Err(Error::Corrupted { offset: pos });
            }

            pos += header_size + header.len as usize;
        }

        Ok(Events { fd, buffer, pos: 0 })
    }
}

impl<'a> Iterator for Events<'a> {
    type Item = Event<&'a OsStr>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos < self.buffer.len() {
            let (step, event) = Event::from_buffer(self.fd.clone(), &self.buffer[self.pos..]);
            self.pos += step;

            Some(event)
        } else {
            None
        }
    }
}

/// A decoded inotify event
///
/// Describes a change to a file system object that the caller previously
/// registered interest in via [`Channel::add_watch`]. Events are read with
/// [`EventPump::next_events`] or pushed through
/// [`EventPump::pump_forever`].
///
/// Each event is decoded fresh from the read buffer and owned by whoever
/// receives it from the iterator; it is never mutated after decode.
///
/// [`Channel::add_watch`]: crate::Channel::add_watch
/// [`EventPump::next_events`]: crate::EventPump::next_events
/// [`EventPump::pump_forever`]: crate::EventPump::pump_forever
#[derive(Clone, Debug)]
pub struct Event<S> {
    /// Identifies the watch this event originates from
    ///
    /// Equal to the [`WatchDescriptor`] that [`Channel::add_watch`] returned
    /// when interest for this event was registered. For a
    /// [`Q_OVERFLOW`](EventMask::Q_OVERFLOW) event the kernel reports no
    /// specific watch and the descriptor's id is `-1`.
    ///
    /// [`Channel::add_watch`]: crate::Channel::add_watch
    pub wd: WatchDescriptor,

    /// Indicates what kind of event this is
    pub mask: EventMask,

    /// Connects related events to each other
    ///
    /// When a file is renamed, this results in two events:
    /// [`MOVED_FROM`](EventMask::MOVED_FROM) and
    /// [`MOVED_TO`](EventMask::MOVED_TO). The `cookie` field is the same for
    /// both of them, making it possible to connect the pair.
    pub cookie: u32,

    /// The name of the file the event originates from
    ///
    /// Set only if the subject of the event is an entry inside a watched
    /// directory. If the event concerns the watched object itself, `name`
    /// is `None` rather than an empty string.
    pub name: Option<S>,
}

impl<'a> Event<&'a OsStr> {
    fn new(fd: Weak<FdGuard>, header: &ffi::inotify_event, name: &'a OsStr) -> Self {
        // Future kernels may define mask bits this crate doesn't know about
        // yet; they are carried through rather than rejected.
        let mask = EventMask::from_bits_retain(header.mask);

        let wd = WatchDescriptor {
            id: header.wd,
            fd,
        };

        let name = if name.is_empty() { None } else { Some(name) };

        Event {
            wd,
            mask,
            cookie: header.cookie,
            name,
        }
    }

    /// Decodes the record at the beginning of `buffer`
    ///
    /// Returns the number of bytes used from the buffer, and the event.
    /// Callers must have validated beforehand (see [`Events::parse`]) that a
    /// full record is present.
    pub(crate) fn from_buffer(fd: Weak<FdGuard>, buffer: &'a [u8]) -> (usize, Self) {
        let header_size = mem::size_of::<ffi::inotify_event>();

        debug_assert!(buffer.len() >= header_size);

        let header_ptr = buffer.as_ptr() as *const ffi::inotify_event;
        let header = unsafe { header_ptr.read_unaligned() };

        debug_assert!(buffer.len() - header_size >= header.len as usize);

        // Directly after the header are `len` bytes of name, padded with
        // '\0' up to the next record boundary. Strip the padding; a name of
        // declared length zero stays empty and becomes `None` in the event.
        //
        // The `unwrap` is safe because `splitn` always returns at least one
        // result, even if the slice contains no '\0'.
        let bytes_consumed = header_size + header.len as usize;
        let name = &buffer[header_size..bytes_consumed];
        let name = name.splitn(2, |b| b == &0u8).next().unwrap();

        let event = Event::new(fd, &header, OsStr::from_bytes(name));

        (bytes_consumed, event)
    }

    /// Returns an owned copy of the event
    #[must_use = "cloning is often expensive and is not expected to have side effects"]
    pub fn to_owned(&self) -> EventOwned {
        Event {
            wd: self.wd.clone(),
            mask: self.mask,
            cookie: self.cookie,
            name: self.name.map(OsStr::to_os_string),
        }
    }
}

/// An owned version of `Event`
pub type EventOwned = Event<OsString>;

#[cfg(test)]
mod tests {
    use std::{io::prelude::*, mem, slice, sync::Weak};

    use inotify_sys as ffi;

    use crate::error::Error;
    use crate::mask::EventMask;

    use super::Events;

    const HEADER_SIZE: usize = mem::size_of::<ffi::inotify_event>();

    fn write_record(buffer: &mut [u8], wd: i32, mask: u32, cookie: u32, name: &[u8]) -> usize {
        // inotify pads names with '\0' to the next record boundary; four
        // bytes of padding is what the kernel typically produces and is
        // enough to exercise the stripping.
        let padded_len = if name.is_empty() { 0 } else { name.len() + 4 };

        let header = ffi::inotify_event {
            wd,
            mask,
            cookie,
            len: padded_len as u32,
        };
        let header_bytes = unsafe {
            slice::from_raw_parts(&header as *const _ as *const u8, HEADER_SIZE)
        };

        let mut writer = &mut buffer[..];
        writer
            .write_all(header_bytes)
            .expect("Failed to write header into buffer");
        writer.write_all(name).expect("Failed to write name");
        writer
            .write_all(&vec![0u8; padded_len - name.len()])
            .expect("Failed to write padding");

        HEADER_SIZE + padded_len
    }

    #[test]
    fn it_should_decode_concatenated_records_in_order() {
        let mut buffer = [0u8; 1024];
        let mut len = 0;
        len += write_record(&mut buffer[len..], 1, ffi::IN_CREATE, 0, b"a");
        len += write_record(&mut buffer[len..], 2, ffi::IN_MOVED_FROM, 42, b"before");
        len += write_record(&mut buffer[len..], 2, ffi::IN_MOVED_TO, 42, b"after");

        let events: Vec<_> = Events::parse(Weak::new(), &buffer[..len])
            .expect("Failed to parse valid buffer")
            .collect();

        assert_eq!(3, events.len());

        assert_eq!(1, events[0].wd.id());
        assert_eq!(EventMask::CREATE, events[0].mask);
        assert_eq!(Some("a"), events[0].name.and_then(|n| n.to_str()));

        assert_eq!(2, events[1].wd.id());
        assert_eq!(42, events[1].cookie);
        assert_eq!(Some("before"), events[1].name.and_then(|n| n.to_str()));

        assert_eq!(EventMask::MOVED_TO, events[2].mask);
        assert_eq!(42, events[2].cookie);
        assert_eq!(Some("after"), events[2].name.and_then(|n| n.to_str()));
    }

    #[test]
    fn it_should_decode_a_nameless_record_with_no_name() {
        let mut buffer = [0u8; 256];
        let len = write_record(&mut buffer, 3, ffi::IN_DELETE_SELF, 0, b"");

        let events: Vec<_> = Events::parse(Weak::new(), &buffer[..len])
            .expect("Failed to parse valid buffer")
            .collect();

        assert_eq!(1, events.len());
        assert_eq!(None, events[0].name);
    }

    #[test]
    fn it_should_not_mistake_next_record_for_name_of_previous_record() {
        let mut buffer = [0u8; 256];
        let len = write_record(&mut buffer, 0, 0, 0, b"");

        // Simulate a following record that starts with a non-zero byte.
        buffer[len] = 1;

        let events: Vec<_> = Events::parse(Weak::new(), &buffer[..len])
            .expect("Failed to parse valid buffer")
            .collect();
        assert_eq!(None, events[0].name);
    }

    #[test]
    fn it_should_reject_a_record_overrunning_the_buffer() {
        let mut buffer = [0u8; 256];
        let first = write_record(&mut buffer, 1, ffi::IN_CREATE, 0, b"ok");
        let len = first + write_record(&mut buffer[first..], 1, ffi::IN_CREATE, 0, b"broken");

        // Truncate the final record's name so its declared length overruns
        // the buffer end.
        match Events::parse(Weak::new(), &buffer[..len - 4]) {
            Err(Error::Corrupted { offset }) => assert_eq!(first, offset),
            other => panic!("Expected corrupted buffer error, got {:?}", other),
        }
    }

    #[test]
    fn it_should_reject_a_trailing_partial_header() {
        let mut buffer = [0u8; 256];
        let len = write_record(&mut buffer, 1, ffi::IN_MODIFY, 0, b"");

        match Events::parse(Weak::new(), &buffer[..len + HEADER_SIZE / 2]) {
            Err(Error::Corrupted { offset }) => assert_eq!(len, offset),
            other => panic!("Expected corrupted buffer error, got {:?}", other),
        }
    }

    #[test]
    fn it_should_decode_queue_overflow_with_the_sentinel_descriptor() {
        let mut buffer = [0u8; 256];
        let len = write_record(&mut buffer, -1, ffi::IN_Q_OVERFLOW, 0, b"");

        let events: Vec<_> = Events::parse(Weak::new(), &buffer[..len])
            .expect("Failed to parse valid buffer")
            .collect();

        assert_eq!(1, events.len());
        assert_eq!(-1, events[0].wd.id());
        assert!(events[0].mask.contains(EventMask::Q_OVERFLOW));
        assert_eq!(None, events[0].name);
    }
}
