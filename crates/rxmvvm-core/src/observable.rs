//! Cold, push-based streams.
//!
//! An [`Observable`] is a description of how to produce events for one
//! observer. Nothing happens until it is subscribed, and every subscription
//! runs the producer again. Multicasting is opt-in through
//! [`Observable::share_replay_latest`] or a subject.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use rxmvvm_core::Observable;
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//!
//! Observable::from_iter(vec![1, 2, 3, 4])
//!     .filter(|v| v % 2 == 0)
//!     .map(|v| v * 10)
//!     .subscribe(move |v| sink.lock().push(v));
//!
//! assert_eq!(*seen.lock(), vec![20, 40]);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::StreamError;
use crate::event::{Event, Observer};
use crate::subscription::{SerialSubscription, Subscription};

type SubscribeFn<T> = dyn Fn(Observer<T>) -> Subscription + Send + Sync;

/// A cold stream of `T` values.
pub struct Observable<T> {
    subscribe_fn: Arc<SubscribeFn<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe_fn: self.subscribe_fn.clone(),
        }
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Create an observable from a subscribe function.
    ///
    /// The function receives the observer for one subscription and returns
    /// the teardown for that subscription. It may deliver events
    /// synchronously before returning.
    pub fn create<F>(subscribe: F) -> Self
    where
        F: Fn(Observer<T>) -> Subscription + Send + Sync + 'static,
    {
        Self {
            subscribe_fn: Arc::new(subscribe),
        }
    }

    /// Emit `value` then complete.
    pub fn just(value: T) -> Self {
        Self::create(move |observer| {
            observer.on_next(value.clone());
            observer.on_completed();
            Subscription::empty()
        })
    }

    /// Emit every item of `items` in order, then complete.
    pub fn from_iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let items: Arc<[T]> = items.into_iter().collect();
        Self::create(move |observer| {
            for item in items.iter() {
                observer.on_next(item.clone());
            }
            observer.on_completed();
            Subscription::empty()
        })
    }

    /// Complete immediately.
    pub fn empty() -> Self {
        Self::create(|observer| {
            observer.on_completed();
            Subscription::empty()
        })
    }

    /// Never emit anything.
    pub fn never() -> Self {
        Self::create(|_| Subscription::empty())
    }

    /// Fail immediately with `error`.
    pub fn error(error: StreamError) -> Self {
        Self::create(move |observer| {
            observer.on_error(error.clone());
            Subscription::empty()
        })
    }

    /// Attach an observer.
    ///
    /// The observer is shielded from grammar violations: nothing reaches it
    /// after a terminal event, and the upstream is disposed as soon as one
    /// has been delivered.
    pub fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
        let upstream = SerialSubscription::new();
        let stopped = Arc::new(AtomicBool::new(false));

        let sink = {
            let upstream = upstream.clone();
            Observer::new(move |event: Event<T>| {
                if event.is_terminal() {
                    if stopped.swap(true, Ordering::SeqCst) {
                        return;
                    }
                    observer.on(event);
                    upstream.dispose();
                } else if !stopped.load(Ordering::SeqCst) {
                    observer.on(event);
                }
            })
        };

        upstream.replace((self.subscribe_fn)(sink));
        upstream.to_subscription()
    }

    /// Attach an event handler.
    pub fn subscribe_events<F>(&self, on_event: F) -> Subscription
    where
        F: Fn(Event<T>) + Send + Sync + 'static,
    {
        self.subscribe_observer(Observer::new(on_event))
    }

    /// Attach a value handler, ignoring terminal events.
    pub fn subscribe<F>(&self, on_next: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_events(move |event| {
            if let Event::Next(value) = event {
                on_next(value);
            }
        })
    }
}

static_assertions::assert_impl_all!(Observable<String>: Send, Sync);
