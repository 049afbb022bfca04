//! Activity tracking for in-flight asynchronous work.
//!
//! An [`ActivityIndicator`] counts how many tracked operations are running
//! and exposes the derived busy flag as a [`Driver<bool>`]. Any number of
//! operations may be tracked concurrently through the same indicator; the
//! flag is `true` while at least one of them is in flight.
//!
//! # Pairing guarantee
//!
//! Tracking increments the counter when the wrapped stream is subscribed
//! and decrements it exactly once when that subscription ends, whichever
//! way it ends:
//!
//! - the stream completes,
//! - the stream fails,
//! - the subscription is disposed early (for example because a newer
//!   request superseded it).
//!
//! The release is held by an [`ActivityToken`], whose `Drop` performs the
//! decrement, so a start can never be left unpaired.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use rxmvvm_core::{ActivityIndicator, PublishSubject};
//!
//! let indicator = ActivityIndicator::new();
//! let busy = Arc::new(Mutex::new(Vec::new()));
//! let sink = busy.clone();
//! indicator.state().drive_with(move |b| sink.lock().push(b));
//!
//! let response = PublishSubject::<u32>::new();
//! let _request = response
//!     .as_observable()
//!     .track_activity(&indicator)
//!     .subscribe(|_| {});
//! assert!(indicator.is_active());
//!
//! response.on_next(200);
//! response.on_completed();
//! assert_eq!(*busy.lock(), vec![false, true, false]);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::driver::Driver;
use crate::event::{Event, Observer};
use crate::logging::targets;
use crate::observable::Observable;
use crate::subject::BehaviorRelay;
use crate::subscription::Subscription;

struct ActivityInner {
    count: BehaviorRelay<usize>,
    loading: Driver<bool>,
}

/// Broadcasts whether any tracked operation is in progress.
///
/// Cloning yields another handle to the same counter.
#[derive(Clone)]
pub struct ActivityIndicator {
    inner: Arc<ActivityInner>,
}

impl Default for ActivityIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActivityIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityIndicator")
            .field("count", &self.count())
            .finish()
    }
}

impl ActivityIndicator {
    /// Create an idle indicator.
    pub fn new() -> Self {
        let count = BehaviorRelay::new(0usize);
        let loading = Driver::from_infallible(
            count
                .as_observable()
                .map(|count| count > 0)
                .distinct_until_changed(),
        );
        Self {
            inner: Arc::new(ActivityInner { count, loading }),
        }
    }

    /// The busy flag: emits the current state to each new observer, then
    /// every change. Consecutive duplicates are never emitted.
    pub fn state(&self) -> Driver<bool> {
        self.inner.loading.clone()
    }

    /// Number of tracked operations currently in flight.
    pub fn count(&self) -> usize {
        self.inner.count.value()
    }

    /// Whether at least one tracked operation is in flight.
    pub fn is_active(&self) -> bool {
        self.count() > 0
    }

    /// Wrap `source` so that each subscription to it is counted as one
    /// in-flight operation.
    ///
    /// Values and errors pass through untouched. The decrement happens
    /// after the terminal event has been forwarded, so observers of the
    /// result see it before the indicator reports idle.
    pub fn track<T>(&self, source: &Observable<T>) -> Observable<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let indicator = self.clone();
        let source = source.clone();
        Observable::create(move |observer: Observer<T>| {
            let slot = TokenSlot::new(indicator.acquire());

            let sink = {
                let slot = slot.clone();
                Observer::new(move |event: Event<T>| {
                    let terminal = event.is_terminal();
                    observer.on(event);
                    if terminal {
                        slot.release();
                    }
                })
            };

            let upstream = source.subscribe_observer(sink);
            Subscription::new(move || {
                upstream.dispose();
                slot.release();
            })
        })
    }

    /// Count the start of one operation. The returned token ends it when
    /// dropped.
    pub fn acquire(&self) -> ActivityToken {
        let count = self.inner.count.modify(|count| *count += 1);
        tracing::trace!(target: targets::ACTIVITY, count, "activity started");
        ActivityToken {
            indicator: self.clone(),
        }
    }

    fn release(&self) {
        let count = self.inner.count.modify(|count| {
            debug_assert!(*count > 0, "activity counter underflow");
            *count = count.saturating_sub(1);
        });
        tracing::trace!(target: targets::ACTIVITY, count, "activity finished");
    }
}

/// Proof of one in-flight operation. Dropping it ends the operation.
#[must_use = "dropping the token immediately ends the tracked activity"]
pub struct ActivityToken {
    indicator: ActivityIndicator,
}

impl fmt::Debug for ActivityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityToken").finish_non_exhaustive()
    }
}

impl Drop for ActivityToken {
    fn drop(&mut self) {
        self.indicator.release();
    }
}

/// Shared home of one subscription's token; whichever path ends the
/// subscription first takes and drops it.
#[derive(Clone)]
struct TokenSlot {
    token: Arc<Mutex<Option<ActivityToken>>>,
}

impl TokenSlot {
    fn new(token: ActivityToken) -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(token))),
        }
    }

    fn release(&self) {
        // Drop outside the lock: the decrement notifies observers.
        let token = self.token.lock().take();
        drop(token);
    }
}

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Track each subscription of this stream with `indicator`.
    pub fn track_activity(&self, indicator: &ActivityIndicator) -> Observable<T> {
        indicator.track(self)
    }
}

static_assertions::assert_impl_all!(ActivityIndicator: Send, Sync);
static_assertions::assert_impl_all!(ActivityToken: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use crate::subject::PublishSubject;

    fn busy_log(indicator: &ActivityIndicator) -> (Arc<Mutex<Vec<bool>>>, Subscription) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let subscription = indicator.state().drive_with(move |busy| sink.lock().push(busy));
        (log, subscription)
    }

    #[test]
    fn test_starts_idle() {
        let indicator = ActivityIndicator::new();
        let (log, _) = busy_log(&indicator);
        assert_eq!(indicator.count(), 0);
        assert!(!indicator.is_active());
        assert_eq!(*log.lock(), vec![false]);
    }

    #[test]
    fn test_completion_releases() {
        let indicator = ActivityIndicator::new();
        let (log, _) = busy_log(&indicator);
        let subject = PublishSubject::<i32>::new();

        let _sub = subject.as_observable().track_activity(&indicator).subscribe(|_| {});
        assert_eq!(indicator.count(), 1);
        subject.on_next(1);
        assert_eq!(indicator.count(), 1, "values do not end the activity");
        subject.on_completed();

        assert_eq!(indicator.count(), 0);
        assert_eq!(*log.lock(), vec![false, true, false]);
    }

    #[test]
    fn test_error_releases_and_passes_through() {
        let indicator = ActivityIndicator::new();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();

        Observable::<i32>::error(StreamError::msg("timeout"))
            .track_activity(&indicator)
            .subscribe_events(move |event| {
                if let Event::Error(err) = event {
                    sink.lock().push(err.to_string());
                }
            });

        assert_eq!(indicator.count(), 0);
        assert_eq!(*errors.lock(), vec!["timeout".to_string()]);
    }

    #[test]
    fn test_dispose_releases_exactly_once() {
        let indicator = ActivityIndicator::new();
        let subject = PublishSubject::<i32>::new();
        let sub = subject.as_observable().track_activity(&indicator).subscribe(|_| {});

        assert_eq!(indicator.count(), 1);
        sub.dispose();
        sub.dispose();
        assert_eq!(indicator.count(), 0);
        assert_eq!(subject.observer_count(), 0);

        // A terminal after disposal must not decrement again.
        subject.on_completed();
        assert_eq!(indicator.count(), 0);
    }

    #[test]
    fn test_overlapping_operations_no_flicker() {
        let indicator = ActivityIndicator::new();
        let (log, _) = busy_log(&indicator);
        let first = PublishSubject::<()>::new();
        let second = PublishSubject::<()>::new();

        let _a = first.as_observable().track_activity(&indicator).subscribe(|_| {});
        let _b = second.as_observable().track_activity(&indicator).subscribe(|_| {});
        assert_eq!(indicator.count(), 2);

        first.on_completed();
        assert!(indicator.is_active());
        second.on_completed();

        assert_eq!(*log.lock(), vec![false, true, false]);
    }

    #[test]
    fn test_terminal_seen_before_idle() {
        let indicator = ActivityIndicator::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let busy_sink = order.clone();
        let _state = indicator
            .state()
            .drive_with(move |busy| busy_sink.lock().push(format!("busy={busy}")));

        let value_sink = order.clone();
        Observable::just(9)
            .track_activity(&indicator)
            .subscribe(move |v| value_sink.lock().push(format!("value={v}")));

        assert_eq!(
            *order.lock(),
            vec!["busy=false", "busy=true", "value=9", "busy=false"]
        );
    }

    #[test]
    fn test_late_observer_sees_current_state() {
        let indicator = ActivityIndicator::new();
        let _token = indicator.acquire();
        let (log, _) = busy_log(&indicator);
        assert_eq!(*log.lock(), vec![true]);
    }

    #[test]
    fn test_concurrent_tracking_balances() {
        let indicator = ActivityIndicator::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let indicator = indicator.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let sub = Observable::<i32>::never()
                            .track_activity(&indicator)
                            .subscribe(|_| {});
                        if i % 2 == 0 {
                            sub.dispose();
                        } else {
                            Observable::just(i)
                                .track_activity(&indicator)
                                .subscribe(|_| {});
                            sub.dispose();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(indicator.count(), 0);
    }

    #[test]
    fn test_late_observer_settles_on_state_changed_during_replay() {
        let indicator = ActivityIndicator::new();
        let (early, _early_sub) = busy_log(&indicator);

        let late_log = Arc::new(Mutex::new(Vec::new()));
        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
        let late = {
            let state = indicator.state();
            let late_log = late_log.clone();
            std::thread::spawn(move || {
                state.drive_with(move |busy| {
                    if !busy {
                        let _ = entered_tx.send(());
                        std::thread::sleep(std::time::Duration::from_millis(50));
                    }
                    late_log.lock().push(busy);
                })
            })
        };

        entered_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("replay reached the late observer");
        let _token = indicator.acquire();
        let _late_sub = late.join().unwrap();

        assert!(indicator.is_active());
        assert_eq!(*late_log.lock(), vec![false, true]);
        assert_eq!(early.lock().last(), Some(&true));
    }
}
