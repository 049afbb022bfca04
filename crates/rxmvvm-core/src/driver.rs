//! Non-failing shared streams for presentation bindings.
//!
//! A [`Driver`] is what a view model hands to its view: a stream that can
//! never fail and that is shared, so any number of bindings observe a
//! single upstream subscription and late bindings immediately receive the
//! latest value.
//!
//! Drivers are obtained from observables by deciding up front what a
//! failure should turn into:
//!
//! ```
//! use rxmvvm_core::{Observable, StreamError};
//!
//! let items = Observable::<Vec<String>>::error(StreamError::msg("offline"))
//!     .as_driver_or_return(Vec::new());
//!
//! items.drive_with(|items| assert!(items.is_empty()));
//! ```

use std::fmt;

use crate::event::Observer;
use crate::observable::Observable;
use crate::subscription::Subscription;

/// A shared stream that never fails.
pub struct Driver<T> {
    source: Observable<T>,
}

impl<T> Clone for Driver<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
        }
    }
}

impl<T> fmt::Debug for Driver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver").finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> Driver<T> {
    /// Wrap a stream that is already known not to fail.
    pub(crate) fn from_infallible(source: Observable<T>) -> Self {
        Self {
            source: source.share_replay_latest(),
        }
    }

    /// A driver that completes immediately.
    pub fn empty() -> Self {
        Self::from_infallible(Observable::empty())
    }

    /// A driver that emits `value` then completes.
    pub fn just(value: T) -> Self {
        Self::from_infallible(Observable::just(value))
    }

    /// A driver that emits nothing and never completes.
    pub fn never() -> Self {
        Self::from_infallible(Observable::never())
    }

    /// Bind an observer.
    pub fn drive(&self, observer: impl Into<Observer<T>>) -> Subscription {
        self.source.subscribe_observer(observer.into())
    }

    /// Bind a value handler.
    pub fn drive_with<F>(&self, on_next: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.source.subscribe(on_next)
    }

    /// Transform each value.
    pub fn map<U, F>(&self, f: F) -> Driver<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        Driver::from_infallible(self.source.map(f))
    }

    /// Transform each value, dropping those mapped to `None`.
    pub fn filter_map<U, F>(&self, f: F) -> Driver<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        Driver::from_infallible(self.source.filter_map(f))
    }

    /// Drop values equal to the previously delivered one.
    pub fn distinct_until_changed(&self) -> Driver<T>
    where
        T: PartialEq,
    {
        Driver::from_infallible(self.source.distinct_until_changed())
    }

    /// Map each value to an inner driver and mirror only the latest one.
    pub fn flat_map_latest<U, F>(&self, project: F) -> Driver<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Driver<U> + Send + Sync + 'static,
    {
        Driver::from_infallible(
            self.source
                .flat_map_latest(move |value| project(value).as_observable()),
        )
    }

    /// Combine each value with the most recent value of `other`.
    pub fn with_latest_from<U, R, F>(&self, other: &Driver<U>, combine: F) -> Driver<R>
    where
        U: Clone + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
        F: Fn(T, U) -> R + Send + Sync + 'static,
    {
        Driver::from_infallible(self.source.with_latest_from(&other.source, combine))
    }

    /// The underlying stream.
    pub fn as_observable(&self) -> Observable<T> {
        self.source.clone()
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Convert to a [`Driver`], replacing any failure with `fallback`
    /// followed by completion.
    pub fn as_driver_or_return(&self, fallback: T) -> Driver<T> {
        Driver::from_infallible(self.catch_and_return(fallback))
    }
}

static_assertions::assert_impl_all!(Driver<Vec<String>>: Send, Sync);
