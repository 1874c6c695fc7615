//! Lock-free single-producer/single-consumer queue of guest events.
//!
//! The emulator thread is the sole producer; the controlling thread is the
//! sole consumer. `kind == 0` is reserved as a graceful-shutdown sentinel.

use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

/// Initial ring capacity. Matches the original implementation's
/// `moodycamel::ReaderWriterQueue` default of 63 entries.
const INITIAL_CAPACITY: usize = 63;

/// A single notification raised by an emulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestEvent {
    pub source_id: usize,
    pub kind: i32,
    pub data1: u32,
    pub data2: u32,
}

impl GuestEvent {
    #[must_use]
    pub fn new(source_id: usize, kind: i32, data1: u32, data2: u32) -> Self {
        Self {
            source_id,
            kind,
            data1,
            data2,
        }
    }

    /// The sentinel event used to signal graceful shutdown.
    #[must_use]
    pub fn shutdown(source_id: usize) -> Self {
        Self::new(source_id, 0, 0, 0)
    }
}

/// The producer half, held by the emulator thread.
pub struct GuestEventProducer {
    source_id: usize,
    inner: HeapProd<GuestEvent>,
}

impl GuestEventProducer {
    /// Attempts to enqueue an event. Returns `false` if the queue is full
    /// and the event was dropped.
    pub fn enqueue(&mut self, kind: i32, data1: u32, data2: u32) -> bool {
        self.inner
            .try_push(GuestEvent::new(self.source_id, kind, data1, data2))
            .is_ok()
    }
}

/// The consumer half, held by the controlling thread.
pub struct GuestEventConsumer {
    inner: HeapCons<GuestEvent>,
}

impl GuestEventConsumer {
    /// Attempts to dequeue the next event, if one is available.
    pub fn try_dequeue(&mut self) -> Option<GuestEvent> {
        self.inner.try_pop()
    }
}

/// Creates a new SPSC guest event queue, tagged with `source_id`.
#[must_use]
pub fn guest_event_queue(source_id: usize) -> (GuestEventProducer, GuestEventConsumer) {
    let rb = HeapRb::<GuestEvent>::new(INITIAL_CAPACITY);
    let (prod, cons) = rb.split();
    (
        GuestEventProducer { source_id, inner: prod },
        GuestEventConsumer { inner: cons },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_observed_in_fifo_order() {
        let (mut producer, mut consumer) = guest_event_queue(1);
        assert!(producer.enqueue(1, 0xA, 0xB));
        assert!(producer.enqueue(2, 0xC, 0xD));
        assert!(producer.enqueue(0, 0, 0));

        let first = consumer.try_dequeue().unwrap();
        assert_eq!(first.kind, 1);
        assert_eq!(first.source_id, 1);

        let second = consumer.try_dequeue().unwrap();
        assert_eq!(second.kind, 2);

        let third = consumer.try_dequeue().unwrap();
        assert_eq!(third.kind, 0);

        assert!(consumer.try_dequeue().is_none());
    }
}
