//! Event channel built on crossbeam-channel.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};

use super::Event;

/// Cloneable sending half handed to the indexer and its workers.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Wrap a raw crossbeam sender
    pub fn new(sender: Sender<Event>) -> Self {
        Self { inner: sender }
    }

    /// Send an event.
    ///
    /// A dropped receiver discards the event; progress reporting is
    /// optional and never fails the caller.
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }
}

/// Receiving half, held by whatever renders progress
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    /// Block until the next event, `None` once all senders are gone
    pub fn recv(&self) -> Option<Event> {
        self.inner.recv().ok()
    }

    /// Next event if one is queued
    pub fn try_recv(&self) -> Option<Event> {
        self.inner.try_recv().ok()
    }

    /// Blocking iterator that ends when all senders are dropped
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }

    /// Everything queued right now, without blocking
    pub fn drain(&self) -> Vec<Event> {
        self.inner.try_iter().collect()
    }
}

/// Constructors for sender/receiver pairs
pub struct EventChannel;

impl EventChannel {
    /// Unbounded channel; the default for progress events
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }

    /// Bounded channel, for a consumer that wants backpressure
    pub fn bounded(capacity: usize) -> (EventSender, EventReceiver) {
        let (sender, receiver) = bounded(capacity);
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

/// Sender whose receiver is already gone; every event is discarded.
pub fn null_sender() -> EventSender {
    let (sender, _receiver) = EventChannel::new();
    sender
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{BatchEvent, BatchProgress, PipelineEvent};
    use std::thread;

    #[test]
    fn progress_crosses_threads() {
        let (sender, receiver) = EventChannel::new();

        let handle = thread::spawn(move || {
            sender.send(Event::Batch(BatchEvent::Progress(BatchProgress {
                processed: 50,
                total: 120,
                failed: 0,
            })));
        });
        handle.join().unwrap();

        match receiver.recv() {
            Some(Event::Batch(BatchEvent::Progress(p))) => assert_eq!(p.processed, 50),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn null_sender_discards_silently() {
        let sender = null_sender();
        sender.send(Event::Pipeline(PipelineEvent::Started));
        sender.send(Event::Pipeline(PipelineEvent::Cancelled));
    }

    #[test]
    fn drain_collects_queued_events_only() {
        let (sender, receiver) = EventChannel::bounded(4);
        sender.send(Event::Pipeline(PipelineEvent::Started));
        sender.send(Event::Pipeline(PipelineEvent::Cancelled));

        assert_eq!(receiver.drain().len(), 2);
        assert!(receiver.try_recv().is_none());
    }

    #[test]
    fn receiver_ends_after_senders_drop() {
        let (sender, receiver) = EventChannel::new();
        sender.send(Event::Pipeline(PipelineEvent::Started));
        drop(sender);

        assert_eq!(receiver.iter().count(), 1);
        assert!(receiver.recv().is_none());
    }
}
