//! Collector for deck source snapshots
//!
//! Each deck publishes its decoded track as a `Shared<LoadedSource>`. The
//! render thread takes a reference to the current snapshot at the start of
//! every block, so after a load it is often the render thread that holds the
//! last reference to the previous track. Dropping a `Shared` there only
//! enqueues the pointer; the planar sample vectors are freed on the
//! `twindeck-gc` thread, which drains the queue a few times per second.

use basedrop::{Collector, Handle, Shared};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// Pause between collector passes
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static SOURCE_COLLECTOR: OnceLock<Handle> = OnceLock::new();

fn spawn_collector() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("twindeck-gc".to_string())
        .spawn(move || {
            // Collector is !Sync and stays on this thread
            let mut collector = Collector::new();
            tx.send(collector.handle())
                .expect("Failed to hand out source collector handle");
            log::info!("Source collector thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("Failed to spawn source collector thread");

    rx.recv().expect("Source collector thread exited before starting")
}

/// Handle to the process-wide source collector, started on first use
fn gc_handle() -> Handle {
    SOURCE_COLLECTOR.get_or_init(spawn_collector).clone()
}

/// Wrap `value` so its last drop, on any thread, is freed by the collector
pub fn share<T: Send + 'static>(value: T) -> Shared<T> {
    Shared::new(&gc_handle(), value)
}
