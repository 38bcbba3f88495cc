// crates/spacetime-post-manager/src/events.rs

//! Plot lifecycle events: fire-and-forget notifications for consumers
//! such as a UI or a metrics collector. At-least-once delivery, no
//! acknowledgement.

use crate::metadata::PlotMetadata;
use crossbeam_channel::{Receiver, Sender};
use uuid::Uuid;

/// A lifecycle transition a [`crate::manager::PlotManager`] emits.
#[derive(Clone, Debug)]
pub enum PlotEvent {
    /// A plot was added to the registry, with its initial metadata.
    PlotAdded(PlotMetadata),
    /// A plot was removed from the registry.
    PlotRemoved(Uuid),
}

/// A fan-out hub for [`PlotEvent`]s: every subscriber gets its own
/// unbounded SPSC-style receiver; publishing never blocks on a slow or
/// absent subscriber (sends that fail because a receiver was dropped are
/// silently ignored, matching the "fire-and-forget" contract).
#[derive(Default)]
pub struct EventBus {
    subscribers: std::sync::Mutex<Vec<Sender<PlotEvent>>>,
}

impl EventBus {
    /// Construct an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its receiver.
    #[must_use]
    pub fn subscribe(&self) -> Receiver<PlotEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        rx
    }

    /// Publish an event to every live subscriber. Dead (disconnected)
    /// subscribers are pruned opportunistically.
    pub fn publish(&self, event: PlotEvent) {
        let Ok(mut subs) = self.subscribers.lock() else {
            return;
        };
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
