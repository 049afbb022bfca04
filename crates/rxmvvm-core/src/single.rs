//! Single-shot asynchronous results.

use std::fmt;

use parking_lot::Mutex;

use crate::error::StreamError;
use crate::event::{Event, Observer};
use crate::observable::Observable;
use crate::subscription::Subscription;

/// A stream that produces exactly one value or one failure.
///
/// `Single` is the natural return type for request/response style
/// operations such as a service fetch. Like [`Observable`], it is cold:
/// every subscription runs the operation again.
pub struct Single<T> {
    source: Observable<T>,
}

impl<T> Clone for Single<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<T> fmt::Debug for Single<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Single").finish_non_exhaustive()
    }
}

/// The receiving end handed to [`Single::create`]. Consumed on use, so a
/// producer can resolve at most once.
pub struct SingleObserver<T> {
    observer: Observer<T>,
}

impl<T> SingleObserver<T> {
    /// Resolve with a value.
    pub fn succeed(self, value: T) {
        self.observer.on_next(value);
        self.observer.on_completed();
    }

    /// Resolve with a failure.
    pub fn fail(self, error: StreamError) {
        self.observer.on_error(error);
    }

    /// Resolve from a `Result`.
    pub fn resolve(self, result: Result<T, StreamError>) {
        match result {
            Ok(value) => self.succeed(value),
            Err(err) => self.fail(err),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Single<T> {
    /// Create a single from a producer.
    ///
    /// The producer receives a [`SingleObserver`] and returns the teardown
    /// for that subscription. It may resolve synchronously, later from any
    /// thread, or never.
    pub fn create<F>(produce: F) -> Self
    where
        F: Fn(SingleObserver<T>) -> Subscription + Send + Sync + 'static,
    {
        Self {
            source: Observable::create(move |observer| produce(SingleObserver { observer })),
        }
    }

    /// Resolve immediately with `value`.
    pub fn just(value: T) -> Self {
        Self {
            source: Observable::just(value),
        }
    }

    /// Fail immediately with `error`.
    pub fn error(error: StreamError) -> Self {
        Self {
            source: Observable::error(error),
        }
    }

    /// Resolve immediately from a `Result`.
    pub fn from_result<E>(result: Result<T, E>) -> Self
    where
        E: Into<StreamError>,
    {
        match result {
            Ok(value) => Self::just(value),
            Err(err) => Self::error(err.into()),
        }
    }

    /// Wrap an observable that is known to resolve at most once.
    ///
    /// Only the first value is kept; the single resolves as soon as it
    /// arrives.
    pub fn from_observable(source: Observable<T>) -> Self {
        Self::create(move |single| {
            let single = Mutex::new(Some(single));
            source.subscribe_events(move |event| {
                let Some(single) = single.lock().take() else {
                    return;
                };
                match event {
                    Event::Next(value) => single.succeed(value),
                    Event::Error(err) => single.fail(err),
                    Event::Completed => {
                        single.fail(StreamError::msg("sequence completed without a value"))
                    }
                }
            })
        })
    }

    /// Transform the resolved value.
    pub fn map<U, F>(&self, f: F) -> Single<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        Single {
            source: self.source.map(f),
        }
    }

    /// The underlying stream: one `Next` then `Completed`, or one `Error`.
    pub fn as_observable(&self) -> Observable<T> {
        self.source.clone()
    }
}

impl<T: Clone + Send + Sync + 'static> From<Single<T>> for Observable<T> {
    fn from(single: Single<T>) -> Self {
        single.source
    }
}
