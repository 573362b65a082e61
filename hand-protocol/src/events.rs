//! Event channel between the connection and whoever presents it.
//!
//! Telemetry is bounded: once `capacity` messages are waiting, further messages
//! are dropped and counted. Log lines are never dropped.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use crate::Message;

/// Something the presentation layer should show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Human-readable status line
    Log(String),
    /// Decoded telemetry
    Message(Message),
}

struct Counters {
    capacity: usize,
    queued_messages: AtomicUsize,
    dropped: AtomicU64,
}

/// Producer side. Cheap to clone; never blocks.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<Event>,
    counters: Arc<Counters>,
}

impl EventSink {
    pub fn log<S: Into<String>>(&self, line: S) {
        // Nobody is listening any more
        let _ = self.tx.send(Event::Log(line.into()));
    }

    pub fn message(&self, message: Message) {
        let counters = &self.counters;
        let queued = counters.queued_messages.fetch_add(1, Ordering::AcqRel);
        if queued >= counters.capacity {
            counters.queued_messages.fetch_sub(1, Ordering::AcqRel);
            let dropped = counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            log::warn!("event channel full, dropped {:?} ({} total)", message, dropped);
            return;
        }
        if self.tx.send(Event::Message(message)).is_err() {
            counters.queued_messages.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Queue an event; messages are subject to the channel capacity
    pub fn push(&self, event: Event) {
        match event {
            Event::Log(line) => self.log(line),
            Event::Message(message) => self.message(message),
        }
    }
}

/// Consumer side, drained from the presentation thread
pub struct EventReceiver {
    rx: Receiver<Event>,
    counters: Arc<Counters>,
}

impl EventReceiver {
    /// Next pending event, if any
    pub fn try_next(&self) -> Option<Event> {
        let event = self.rx.try_recv().ok()?;
        if matches!(event, Event::Message(_)) {
            self.counters.queued_messages.fetch_sub(1, Ordering::AcqRel);
        }
        Some(event)
    }

    /// All pending events, without blocking
    pub fn drain(&self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Messages lost because the channel was full
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }
}

/// Create an event channel holding at most `capacity` undelivered messages
pub fn channel(capacity: usize) -> (EventSink, EventReceiver) {
    let (tx, rx) = mpsc::channel();
    let counters = Arc::new(Counters {
        capacity,
        queued_messages: AtomicUsize::new(0),
        dropped: AtomicU64::new(0),
    });
    (
        EventSink {
            tx,
            counters: counters.clone(),
        },
        EventReceiver { rx, counters },
    )
}
