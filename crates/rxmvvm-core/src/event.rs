//! Stream events and observers.

use std::fmt;
use std::sync::Arc;

use slotmap::new_key_type;

use crate::error::StreamError;

new_key_type! {
    /// Identifies one observer attached to a multicast source.
    pub(crate) struct ObserverKey;
}

/// A single notification delivered by a stream.
///
/// Streams follow the grammar `Next* (Error | Completed)?`. Once a terminal
/// event has been delivered, an observer receives nothing else.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<T> {
    /// A value.
    Next(T),
    /// The stream failed; terminal.
    Error(StreamError),
    /// The stream finished normally; terminal.
    Completed,
}

impl<T> Event<T> {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Next(_))
    }

    /// The carried value, if this is a `Next` event.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Next(value) => Some(value),
            _ => None,
        }
    }

    /// Transform the carried value, keeping terminal events as they are.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Event<U> {
        match self {
            Self::Next(value) => Event::Next(f(value)),
            Self::Error(err) => Event::Error(err),
            Self::Completed => Event::Completed,
        }
    }
}

/// A cloneable, thread-safe sink for stream events.
pub struct Observer<T> {
    on_event: Arc<dyn Fn(Event<T>) + Send + Sync>,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            on_event: self.on_event.clone(),
        }
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer").finish_non_exhaustive()
    }
}

impl<T> Observer<T> {
    /// Create an observer from an event handler.
    pub fn new<F>(on_event: F) -> Self
    where
        F: Fn(Event<T>) + Send + Sync + 'static,
    {
        Self {
            on_event: Arc::new(on_event),
        }
    }

    /// Deliver an event.
    pub fn on(&self, event: Event<T>) {
        (self.on_event)(event);
    }

    /// Deliver a value.
    pub fn on_next(&self, value: T) {
        self.on(Event::Next(value));
    }

    /// Deliver a failure.
    pub fn on_error(&self, error: StreamError) {
        self.on(Event::Error(error));
    }

    /// Deliver normal completion.
    pub fn on_completed(&self) {
        self.on(Event::Completed);
    }
}
