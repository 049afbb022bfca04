//! Hot, multicast sources.
//!
//! This module provides the two multicast building blocks of the crate:
//!
//! - [`PublishSubject<T>`] - forwards events to whoever is subscribed at the
//!   time of emission, with no replay
//! - [`BehaviorRelay<T>`] - holds a current value, replays it to every new
//!   observer, and never terminates
//!
//! Both keep their observers in a slot map behind a `parking_lot` mutex and
//! release the lock before any observer runs, so observers may freely
//! subscribe, unsubscribe, or emit from inside a callback.
//!
//! # Ordered delivery
//!
//! [`BehaviorRelay`] queues values under its lock and drains the queue
//! outside it. A value accepted while another delivery is in progress (from
//! a re-entrant observer or another thread) is appended to the queue and
//! delivered by the thread already draining, so every observer sees values
//! in exactly the order they were applied.
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use rxmvvm_core::BehaviorRelay;
//!
//! let relay = BehaviorRelay::new(0);
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//!
//! relay.accept(1);
//! relay.as_observable().subscribe(move |v| sink.lock().push(v));
//! relay.modify(|v| *v += 1);
//!
//! assert_eq!(*seen.lock(), vec![1, 2]);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::SlotMap;

use crate::error::StreamError;
use crate::event::{Event, Observer, ObserverKey};
use crate::logging::targets;
use crate::observable::Observable;
use crate::subscription::Subscription;

struct SubjectState<T> {
    observers: SlotMap<ObserverKey, Observer<T>>,
    terminal: Option<Event<T>>,
}

/// A hot source that forwards events to its current observers.
///
/// Late observers miss earlier values. Once terminated, the subject
/// delivers its terminal event to anyone who subscribes afterwards.
pub struct PublishSubject<T> {
    state: Arc<Mutex<SubjectState<T>>>,
}

impl<T> Clone for PublishSubject<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for PublishSubject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> PublishSubject<T> {
    /// Create a subject with no observers.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SubjectState {
                observers: SlotMap::with_key(),
                terminal: None,
            })),
        }
    }

    /// Forward a value to every current observer.
    pub fn on_next(&self, value: T) {
        let observers: Vec<Observer<T>> = {
            let state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }
            state.observers.values().cloned().collect()
        };
        tracing::trace!(
            target: targets::SUBJECT,
            observer_count = observers.len(),
            "publishing value"
        );
        for observer in observers {
            observer.on_next(value.clone());
        }
    }

    /// Terminate with a failure.
    pub fn on_error(&self, error: StreamError) {
        self.terminate(Event::Error(error));
    }

    /// Terminate normally.
    pub fn on_completed(&self) {
        self.terminate(Event::Completed);
    }

    fn terminate(&self, event: Event<T>) {
        let observers: Vec<Observer<T>> = {
            let mut state = self.state.lock();
            if state.terminal.is_some() {
                return;
            }
            state.terminal = Some(event.clone());
            state.observers.drain().map(|(_, observer)| observer).collect()
        };
        for observer in observers {
            observer.on(event.clone());
        }
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    /// An observable view of this subject.
    pub fn as_observable(&self) -> Observable<T> {
        let state = self.state.clone();
        Observable::create(move |observer| {
            let key = {
                let mut guard = state.lock();
                match &guard.terminal {
                    Some(terminal) => Err(terminal.clone()),
                    None => Ok(guard.observers.insert(observer.clone())),
                }
            };
            match key {
                Ok(key) => {
                    let state = state.clone();
                    Subscription::new(move || {
                        state.lock().observers.remove(key);
                    })
                }
                Err(terminal) => {
                    observer.on(terminal);
                    Subscription::empty()
                }
            }
        })
    }

    /// An observer that feeds this subject.
    pub fn as_observer(&self) -> Observer<T> {
        let subject = self.clone();
        Observer::new(move |event| match event {
            Event::Next(value) => subject.on_next(value),
            Event::Error(err) => subject.on_error(err),
            Event::Completed => subject.on_completed(),
        })
    }
}

struct RelayObserver<T> {
    observer: Observer<T>,
    /// First delivery sequence number this observer should receive.
    since: u64,
}

struct RelayState<T> {
    value: T,
    observers: SlotMap<ObserverKey, RelayObserver<T>>,
    pending: VecDeque<(u64, T)>,
    next_sequence: u64,
    delivering: bool,
}

/// A current value that is broadcast on every change.
///
/// New observers immediately receive the current value, then every value
/// accepted after they subscribed. A relay never fails or completes.
pub struct BehaviorRelay<T> {
    state: Arc<Mutex<RelayState<T>>>,
}

impl<T> Clone for BehaviorRelay<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + Default + 'static> Default for BehaviorRelay<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + Sync + 'static> BehaviorRelay<T> {
    /// Create a relay holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            state: Arc::new(Mutex::new(RelayState {
                value,
                observers: SlotMap::with_key(),
                pending: VecDeque::new(),
                next_sequence: 0,
                delivering: false,
            })),
        }
    }

    /// Get the current value.
    pub fn value(&self) -> T {
        self.state.lock().value.clone()
    }

    /// Replace the current value and broadcast it.
    pub fn accept(&self, value: T) {
        self.modify(move |current| *current = value);
    }

    /// Update the current value in place and broadcast the result.
    ///
    /// The read-modify-write happens under the relay's lock, so concurrent
    /// updates never lose each other. Returns the new value.
    pub fn modify<F>(&self, f: F) -> T
    where
        F: FnOnce(&mut T),
    {
        let (updated, should_drain) = {
            let mut state = self.state.lock();
            f(&mut state.value);
            let updated = state.value.clone();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.pending.push_back((sequence, updated.clone()));
            let should_drain = !state.delivering;
            state.delivering = true;
            (updated, should_drain)
        };
        if should_drain {
            self.drain();
        }
        updated
    }

    fn drain(&self) {
        loop {
            let (value, observers) = {
                let mut state = self.state.lock();
                let Some((sequence, value)) = state.pending.pop_front() else {
                    state.delivering = false;
                    return;
                };
                let observers: Vec<Observer<T>> = state
                    .observers
                    .values()
                    .filter(|entry| entry.since <= sequence)
                    .map(|entry| entry.observer.clone())
                    .collect();
                (value, observers)
            };
            for observer in observers {
                observer.on_next(value.clone());
            }
        }
    }

    /// Number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }

    /// An observable that starts with the current value.
    pub fn as_observable(&self) -> Observable<T> {
        let state = self.state.clone();
        Observable::create(move |observer| {
            let (key, current) = {
                let mut guard = state.lock();
                let since = guard.next_sequence;
                let key = guard.observers.insert(RelayObserver {
                    observer: observer.clone(),
                    since,
                });
                (key, guard.value.clone())
            };
            observer.on_next(current);
            let state = state.clone();
            Subscription::new(move || {
                state.lock().observers.remove(key);
            })
        })
    }
}

static_assertions::assert_impl_all!(PublishSubject<String>: Send, Sync);
static_assertions::assert_impl_all!(BehaviorRelay<usize>: Send, Sync);
