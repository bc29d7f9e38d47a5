//! Notification of publishing state changes.
//!
//! Listeners are registered with an [`EventManager`], which the publisher
//! invokes synchronously at fixed points of its operations. Every event
//! carries the draft side of the affected pair.

use serde::Serialize;
use std::fmt;

use crate::models::Record;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Event {
    /// A dirty draft is about to be published. Nothing has been modified yet.
    PrePublish,
    /// A new published copy was created, and the draft is about to be saved
    /// with its new link.
    PreSaveDraft,
    /// A draft was published. Fired after the changes were committed.
    PostPublish,
    /// A draft is about to be unpublished.
    PreUnpublish,
    /// A draft was unpublished. Fired after the changes were committed.
    PostUnpublish,
}

impl fmt::Display for Event {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(match *self {
            Event::PrePublish => "pre-publish",
            Event::PreSaveDraft => "pre-save-draft",
            Event::PostPublish => "post-publish",
            Event::PreUnpublish => "pre-unpublish",
            Event::PostUnpublish => "post-unpublish",
        })
    }
}

/// An observer of publishing events.
pub trait Listener {
    fn notify(&self, event: Event, draft: &Record);
}

impl<F> Listener for F
where
    F: Fn(Event, &Record),
{
    fn notify(&self, event: Event, draft: &Record) {
        self(event, draft)
    }
}

/// Ordered list of listeners.
#[derive(Default)]
pub struct EventManager {
    listeners: Vec<Box<dyn Listener>>,
}

impl EventManager {
    pub fn new() -> Self {
        EventManager::default()
    }

    /// Register a new listener. Listeners are notified in order of
    /// registration.
    pub fn register<L>(&mut self, listener: L)
    where
        L: Listener + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Notify all listeners of an event.
    pub fn notify(&self, event: Event, draft: &Record) {
        trace!("{} for {} #{}", event, draft.content_type, draft.id);

        for listener in &self.listeners {
            listener.notify(event, draft);
        }
    }
}

impl fmt::Debug for EventManager {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("EventManager")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
