//! Render-to-control notifications
//!
//! The render thread reports transport changes it caused itself (reaching
//! the end of a source, wrapping a loop, picking up a newly loaded source)
//! through a bounded `rtrb` ring. Pushing is wait-free and never allocates;
//! if nobody drains the ring and it fills up, further events are dropped
//! rather than blocking the audio callback.
//!
//! Control threads drain the ring with [`EventReceiver::drain`]. The consumer
//! sits behind a mutex so a cloned controller can be polled from any thread;
//! only control threads ever take that lock.

use std::sync::Mutex;

/// Something the render thread did to a deck on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckEvent {
    /// Playhead reached the end of the source with no loop to take
    ReachedEnd,
    /// Playhead wrapped from the end of the source back to the start
    Looped,
    /// Render thread started playing a newly loaded source
    SourceChanged { generation: u64 },
}

/// Capacity of each deck's event ring
///
/// Events are rare (at most a few per block) so a small ring gives plenty of
/// headroom between polls.
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// Create a new event channel (render-side sender, control-side receiver)
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (producer, consumer) = rtrb::RingBuffer::new(EVENT_QUEUE_CAPACITY);
    (
        EventSender { producer },
        EventReceiver { consumer: Mutex::new(consumer) },
    )
}

/// Render-side end of the event ring
pub struct EventSender {
    producer: rtrb::Producer<DeckEvent>,
}

impl EventSender {
    /// Push an event, dropping it if the ring is full
    #[inline]
    pub fn send(&mut self, event: DeckEvent) {
        let _ = self.producer.push(event);
    }
}

/// Control-side end of the event ring
pub struct EventReceiver {
    consumer: Mutex<rtrb::Consumer<DeckEvent>>,
}

impl EventReceiver {
    /// Take every pending event, oldest first
    pub fn drain(&self) -> Vec<DeckEvent> {
        let mut consumer = match self.consumer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut events = Vec::with_capacity(consumer.slots());
        while let Ok(event) = consumer.pop() {
            events.push(event);
        }
        events
    }
}
