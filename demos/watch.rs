use std::env;

use inotify_channel::{Channel, EventMask, EventPump, WatchMask};

fn main() {
    let channel = Channel::open().expect("Failed to open inotify channel");

    let current_dir = env::current_dir().expect("Failed to determine current directory");

    channel
        .add_watch(
            current_dir,
            WatchMask::MODIFY | WatchMask::CREATE | WatchMask::DELETE,
        )
        .expect("Failed to add inotify watch");

    println!("Watching current directory for activity...");

    let mut pump = EventPump::new(&channel);
    pump.pump_forever(|event| {
        if event.mask.contains(EventMask::CREATE) {
            if event.mask.contains(EventMask::ISDIR) {
                println!("Directory created: {:?}", event.name);
            } else {
                println!("File created: {:?}", event.name);
            }
        } else if event.mask.contains(EventMask::DELETE) {
            if event.mask.contains(EventMask::ISDIR) {
                println!("Directory deleted: {:?}", event.name);
            } else {
                println!("File deleted: {:?}", event.name);
            }
        } else if event.mask.contains(EventMask::MODIFY) {
            if event.mask.contains(EventMask::ISDIR) {
                println!("Directory modified: {:?}", event.name);
            } else {
                println!("File modified: {:?}", event.name);
            }
        }
    })
    .expect("Failed to pump inotify events");
}
