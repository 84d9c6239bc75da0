// This test suite drives real inotify instances against temporary
// directories and therefore only runs on Linux.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use tempdir::TempDir;

use inotify_channel::{Channel, Error, EventMask, EventPump, WatchMask};

#[test]
fn it_should_watch_a_file() {
    let mut testdir = TestDir::new();
    let (path, mut file) = testdir.new_file();

    let channel = Channel::open().unwrap();
    let watch = channel.add_watch(&path, WatchMask::MODIFY).unwrap();

    write_to(&mut file);

    let mut pump = EventPump::new(&channel);
    let mut num_events = 0;
    for event in pump.next_events().unwrap() {
        assert_eq!(watch, event.wd);
        assert!(event.mask.contains(EventMask::MODIFY));
        assert_eq!(None, event.name);
        num_events += 1;
    }
    assert!(num_events > 0);
}

#[test]
fn it_should_report_entry_names_in_kernel_order() {
    let testdir = TestDir::new();

    let channel = Channel::open().unwrap();
    let watch = channel
        .add_watch(testdir.path(), WatchMask::CREATE | WatchMask::DELETE)
        .unwrap();

    let path = testdir.path().join("a");
    File::create(&path).unwrap();
    fs::remove_file(&path).unwrap();

    // Both events were queued before the read, so they arrive in one batch,
    // in the order the kernel wrote them.
    let mut pump = EventPump::new(&channel);
    let events: Vec<_> = pump.next_events().unwrap().map(|e| e.to_owned()).collect();

    assert_eq!(2, events.len());

    assert_eq!(watch, events[0].wd);
    assert!(events[0].mask.contains(EventMask::CREATE));
    assert_eq!(Some("a"), events[0].name.as_ref().and_then(|n| n.to_str()));

    assert_eq!(watch, events[1].wd);
    assert!(events[1].mask.contains(EventMask::DELETE));
    assert_eq!(Some("a"), events[1].name.as_ref().and_then(|n| n.to_str()));
}

#[test]
fn it_should_reject_foreign_and_stale_watch_descriptors() {
    let testdir = TestDir::new();

    let channel = Channel::open().unwrap();
    let other = Channel::open().unwrap();

    let foreign = other.add_watch(testdir.path(), WatchMask::CREATE).unwrap();
    assert!(matches!(
        channel.rm_watch(foreign),
        Err(Error::InvalidArgument(_))
    ));

    let watch = channel.add_watch(testdir.path(), WatchMask::CREATE).unwrap();
    channel.rm_watch(watch.clone()).unwrap();
    assert!(matches!(
        channel.rm_watch(watch),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn it_should_stop_delivering_events_for_a_removed_watch() {
    let mut testdir = TestDir::new();
    let (path, mut file) = testdir.new_file();

    let channel = Channel::open().unwrap();
    let watch = channel.add_watch(&path, WatchMask::MODIFY).unwrap();
    channel.rm_watch(watch.clone()).unwrap();

    write_to(&mut file);

    // The only event left on the channel is the kernel's confirmation that
    // the watch is gone; the write must not show up.
    let mut pump = EventPump::new(&channel);
    let mut num_events = 0;
    for event in pump.next_events().unwrap() {
        assert_eq!(watch, event.wd);
        assert!(event.mask.contains(EventMask::IGNORED));
        assert!(!event.mask.contains(EventMask::MODIFY));
        num_events += 1;
    }
    assert_eq!(1, num_events);
}

#[test]
fn it_should_classify_add_watch_failures() {
    let testdir = TestDir::new();

    let channel = Channel::open().unwrap();

    assert!(matches!(
        channel.add_watch(testdir.path().join("does-not-exist"), WatchMask::MODIFY),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        channel.add_watch("", WatchMask::MODIFY),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn it_should_unblock_a_pump_when_the_channel_is_closed() {
    let testdir = TestDir::new();

    let channel = Arc::new(Channel::open().unwrap());
    channel
        .add_watch(testdir.path(), WatchMask::CREATE)
        .unwrap();

    let (sender, receiver) = mpsc::channel();
    let pump_channel = Arc::clone(&channel);
    thread::spawn(move || {
        let mut pump = EventPump::new(&pump_channel);
        let result = pump.next_events().map(|events| events.count());
        sender.send(result).unwrap();
    });

    // Give the pump time to block in its readiness wait before closing.
    thread::sleep(Duration::from_millis(200));
    channel.close().unwrap();

    let result = receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("Pump did not return after the channel was closed");
    assert!(matches!(result, Err(Error::ChannelClosed)));
}

#[test]
fn it_should_push_events_until_the_channel_is_closed() {
    let testdir = TestDir::new();

    let channel = Arc::new(Channel::open().unwrap());
    channel
        .add_watch(testdir.path(), WatchMask::CREATE)
        .unwrap();

    let (event_sender, event_receiver) = mpsc::channel();
    let (done_sender, done_receiver) = mpsc::channel();
    let pump_channel = Arc::clone(&channel);
    thread::spawn(move || {
        let mut pump = EventPump::new(&pump_channel);
        let result = pump.pump_forever(|event| {
            event_sender.send(event.to_owned()).unwrap();
        });
        done_sender.send(result).unwrap();
    });

    File::create(testdir.path().join("a")).unwrap();

    let event = event_receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("Pump did not push the create event");
    assert!(event.mask.contains(EventMask::CREATE));
    assert_eq!(Some("a"), event.name.as_ref().and_then(|n| n.to_str()));

    channel.close().unwrap();

    let result = done_receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("Pump did not return after the channel was closed");
    assert!(matches!(result, Err(Error::ChannelClosed)));
}

#[test]
fn it_should_reject_a_descriptor_whose_channel_is_gone() {
    let testdir = TestDir::new();

    // Dropping the old channel releases its fd, which the kernel is free to
    // hand right back to the next channel. The stale descriptor must still
    // be rejected instead of removing a watch it never referred to.
    let stale = {
        let old = Channel::open().unwrap();
        old.add_watch(testdir.path(), WatchMask::CREATE).unwrap()
    };

    let channel = Channel::open().unwrap();
    let watch = channel.add_watch(testdir.path(), WatchMask::CREATE).unwrap();

    assert_ne!(watch, stale);
    assert!(matches!(
        channel.rm_watch(stale),
        Err(Error::InvalidArgument(_))
    ));

    // The new channel's own watch is untouched and still delivers events.
    File::create(testdir.path().join("a")).unwrap();
    let mut pump = EventPump::new(&channel);
    let mut num_events = 0;
    for event in pump.next_events().unwrap() {
        assert_eq!(watch, event.wd);
        assert!(event.mask.contains(EventMask::CREATE));
        num_events += 1;
    }
    assert!(num_events > 0);
}

#[test]
fn it_should_fail_all_operations_after_close() {
    let testdir = TestDir::new();

    let channel = Channel::open().unwrap();
    let watch = channel.add_watch(testdir.path(), WatchMask::CREATE).unwrap();

    channel.close().unwrap();
    assert!(channel.is_closed());

    assert!(matches!(
        channel.add_watch(testdir.path(), WatchMask::CREATE),
        Err(Error::ChannelClosed)
    ));
    assert!(matches!(channel.rm_watch(watch), Err(Error::ChannelClosed)));
    assert!(matches!(channel.close(), Err(Error::ChannelClosed)));

    let mut pump = EventPump::new(&channel);
    assert!(matches!(pump.next_events(), Err(Error::ChannelClosed)));
}

struct TestDir {
    dir: TempDir,
    counter: u32,
}

impl TestDir {
    fn new() -> TestDir {
        TestDir {
            dir: TempDir::new("inotify-channel-test").unwrap(),
            counter: 0,
        }
    }

    fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    fn new_file(&mut self) -> (PathBuf, File) {
        let id = self.counter;
        self.counter += 1;

        let path = self.dir.path().join("file-".to_string() + &id.to_string());
        let file = File::create(&path)
            .unwrap_or_else(|error| panic!("Failed to create temporary file: {}", error));

        (path, file)
    }
}

fn write_to(file: &mut File) {
    file.write(b"This should trigger an inotify event.")
        .unwrap_or_else(|error| panic!("Failed to write to file: {}", error));
}
