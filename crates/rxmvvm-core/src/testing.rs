//! Virtual-time test doubles for streams.
//!
//! These types pair with [`TestScheduler`] to script input streams and
//! record output streams with the virtual time at which each event
//! happened:
//!
//! - [`ColdObservable`] - replays its script relative to each subscription
//! - [`HotObservable`] - plays its script at absolute times, regardless of
//!   who is listening
//! - [`TestableObserver`] - records every event it receives
//!
//! # Example
//!
//! ```
//! use rxmvvm_core::{Recorded, TestScheduler};
//!
//! let scheduler = TestScheduler::new(0);
//! let taps = scheduler.create_cold_observable(vec![
//!     Recorded::next(100, "tap"),
//!     Recorded::next(250, "tap"),
//! ]);
//! let observer = scheduler.create_observer::<&str>();
//!
//! taps.as_observable().subscribe_observer(observer.observer());
//! scheduler.start();
//!
//! assert_eq!(
//!     observer.events(),
//!     vec![Recorded::next(100, "tap"), Recorded::next(250, "tap")]
//! );
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StreamError;
use crate::event::{Event, Observer};
use crate::observable::Observable;
use crate::scheduler::{ScheduledTaskId, TestScheduler, VirtualTime};
use crate::subject::PublishSubject;
use crate::subscription::Subscription;

/// A value stamped with the virtual time it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded<T> {
    /// Virtual time of the value.
    pub time: VirtualTime,
    /// The value.
    pub value: T,
}

impl<T> Recorded<T> {
    /// Stamp `value` with `time`.
    pub fn new(time: VirtualTime, value: T) -> Self {
        Self { time, value }
    }
}

impl<T> Recorded<Event<T>> {
    /// A `Next` event at `time`.
    pub fn next(time: VirtualTime, value: T) -> Self {
        Self::new(time, Event::Next(value))
    }

    /// An `Error` event at `time`.
    pub fn error(time: VirtualTime, error: StreamError) -> Self {
        Self::new(time, Event::Error(error))
    }

    /// A `Completed` event at `time`.
    pub fn completed(time: VirtualTime) -> Self {
        Self::new(time, Event::Completed)
    }
}

/// When a subscription to a test observable started and, if it has, ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionLog {
    /// Virtual time of the subscription.
    pub subscribed: VirtualTime,
    /// Virtual time of the disposal, if disposed.
    pub unsubscribed: Option<VirtualTime>,
}

impl SubscriptionLog {
    /// A subscription that is still active.
    pub fn open(subscribed: VirtualTime) -> Self {
        Self {
            subscribed,
            unsubscribed: None,
        }
    }

    /// A subscription active between the two times.
    pub fn closed(subscribed: VirtualTime, unsubscribed: VirtualTime) -> Self {
        Self {
            subscribed,
            unsubscribed: Some(unsubscribed),
        }
    }
}

/// An observable that plays a scripted sequence of events relative to the
/// moment each observer subscribes.
pub struct ColdObservable<T> {
    scheduler: TestScheduler,
    messages: Arc<[Recorded<Event<T>>]>,
    subscriptions: Arc<Mutex<Vec<SubscriptionLog>>>,
}

impl<T: Clone + Send + Sync + 'static> ColdObservable<T> {
    /// Every subscription made so far.
    pub fn subscriptions(&self) -> Vec<SubscriptionLog> {
        self.subscriptions.lock().clone()
    }

    /// The observable view. Each subscription schedules its own copy of the
    /// script; disposing it cancels whatever has not been delivered yet.
    pub fn as_observable(&self) -> Observable<T> {
        let scheduler = self.scheduler.clone();
        let messages = self.messages.clone();
        let subscriptions = self.subscriptions.clone();
        Observable::create(move |observer: Observer<T>| {
            let start = scheduler.clock();
            let index = {
                let mut log = subscriptions.lock();
                log.push(SubscriptionLog::open(start));
                log.len() - 1
            };

            let pending: Vec<ScheduledTaskId> = messages
                .iter()
                .map(|message| {
                    let observer = observer.clone();
                    let event = message.value.clone();
                    scheduler.schedule_at(start + message.time, move || observer.on(event))
                })
                .collect();

            let scheduler = scheduler.clone();
            let subscriptions = subscriptions.clone();
            Subscription::new(move || {
                for id in pending {
                    // Already-delivered events are no longer cancellable.
                    let _ = scheduler.cancel(id);
                }
                subscriptions.lock()[index].unsubscribed = Some(scheduler.clock());
            })
        })
    }
}

/// An observable that plays a scripted sequence of events at absolute
/// virtual times to whoever is subscribed when each event fires.
pub struct HotObservable<T> {
    subject: PublishSubject<T>,
    scheduler: TestScheduler,
    subscriptions: Arc<Mutex<Vec<SubscriptionLog>>>,
}

impl<T: Clone + Send + Sync + 'static> HotObservable<T> {
    /// Every subscription made so far.
    pub fn subscriptions(&self) -> Vec<SubscriptionLog> {
        self.subscriptions.lock().clone()
    }

    /// The observable view.
    pub fn as_observable(&self) -> Observable<T> {
        let upstream = self.subject.as_observable();
        let scheduler = self.scheduler.clone();
        let subscriptions = self.subscriptions.clone();
        Observable::create(move |observer| {
            let index = {
                let mut log = subscriptions.lock();
                log.push(SubscriptionLog::open(scheduler.clock()));
                log.len() - 1
            };
            let inner = upstream.subscribe_observer(observer);
            let scheduler = scheduler.clone();
            let subscriptions = subscriptions.clone();
            Subscription::new(move || {
                inner.dispose();
                subscriptions.lock()[index].unsubscribed = Some(scheduler.clock());
            })
        })
    }
}

/// An observer that records each event with the virtual time it arrived.
pub struct TestableObserver<T> {
    scheduler: TestScheduler,
    events: Arc<Mutex<Vec<Recorded<Event<T>>>>>,
}

impl<T> Clone for TestableObserver<T> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            events: self.events.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> TestableObserver<T> {
    /// Every event received so far.
    pub fn events(&self) -> Vec<Recorded<Event<T>>> {
        self.events.lock().clone()
    }

    /// The values of every `Next` event received so far.
    pub fn values(&self) -> Vec<T> {
        self.events
            .lock()
            .iter()
            .filter_map(|recorded| recorded.value.value().cloned())
            .collect()
    }

    /// An observer feeding this recorder.
    pub fn observer(&self) -> Observer<T> {
        let scheduler = self.scheduler.clone();
        let events = self.events.clone();
        Observer::new(move |event| {
            let time = scheduler.clock();
            events.lock().push(Recorded::new(time, event));
        })
    }
}

impl<T: Clone + Send + Sync + 'static> From<&TestableObserver<T>> for Observer<T> {
    fn from(recorder: &TestableObserver<T>) -> Self {
        recorder.observer()
    }
}

impl TestScheduler {
    /// Script an observable whose event times are relative to each
    /// subscription.
    pub fn create_cold_observable<T>(&self, messages: Vec<Recorded<Event<T>>>) -> ColdObservable<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        ColdObservable {
            scheduler: self.clone(),
            messages: messages.into(),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script an observable whose event times are absolute. The events are
    /// scheduled immediately.
    pub fn create_hot_observable<T>(&self, messages: Vec<Recorded<Event<T>>>) -> HotObservable<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let subject = PublishSubject::new();
        for message in messages {
            let subject = subject.clone();
            self.schedule_at(message.time, move || match message.value {
                Event::Next(value) => subject.on_next(value),
                Event::Error(err) => subject.on_error(err),
                Event::Completed => subject.on_completed(),
            });
        }
        HotObservable {
            subject,
            scheduler: self.clone(),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create an observer that records events against this clock.
    pub fn create_observer<T>(&self) -> TestableObserver<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        TestableObserver {
            scheduler: self.clone(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cold_observable_is_relative_to_subscription() {
        let scheduler = TestScheduler::new(0);
        let cold = scheduler.create_cold_observable(vec![
            Recorded::next(10, 'a'),
            Recorded::completed(20),
        ]);
        let early = scheduler.create_observer::<char>();
        let late = scheduler.create_observer::<char>();

        cold.as_observable().subscribe_observer(early.observer());
        let cold_stream = cold.as_observable();
        let late_observer = late.observer();
        scheduler.schedule_at(100, move || {
            cold_stream.subscribe_observer(late_observer);
        });
        scheduler.start();

        assert_eq!(
            early.events(),
            vec![Recorded::next(10, 'a'), Recorded::completed(20)]
        );
        assert_eq!(
            late.events(),
            vec![Recorded::next(110, 'a'), Recorded::completed(120)]
        );
        assert_eq!(
            cold.subscriptions(),
            vec![SubscriptionLog::closed(0, 20), SubscriptionLog::closed(100, 120)]
        );
    }

    #[test]
    fn test_cold_observable_dispose_cancels_rest() {
        let scheduler = TestScheduler::new(0);
        let cold = scheduler.create_cold_observable(vec![
            Recorded::next(10, 1),
            Recorded::next(30, 2),
        ]);
        let observer = scheduler.create_observer::<i32>();

        let subscription = cold.as_observable().subscribe_observer(observer.observer());
        scheduler.schedule_at(20, move || subscription.dispose());
        scheduler.start();

        assert_eq!(observer.values(), vec![1]);
        assert_eq!(cold.subscriptions(), vec![SubscriptionLog::closed(0, 20)]);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_hot_observable_uses_absolute_times() {
        let scheduler = TestScheduler::new(0);
        let hot = scheduler.create_hot_observable(vec![
            Recorded::next(10, "missed"),
            Recorded::next(30, "seen"),
        ]);
        let observer = scheduler.create_observer::<&str>();

        let stream = hot.as_observable();
        let sink = observer.observer();
        scheduler.schedule_at(20, move || {
            stream.subscribe_observer(sink);
        });
        scheduler.start();

        assert_eq!(observer.events(), vec![Recorded::next(30, "seen")]);
        assert_eq!(hot.subscriptions(), vec![SubscriptionLog::open(20)]);
    }

    #[test]
    fn test_observer_records_errors() {
        let scheduler = TestScheduler::new(0);
        let cold = scheduler.create_cold_observable::<i32>(vec![Recorded::error(
            5,
            StreamError::msg("broken"),
        )]);
        let observer = scheduler.create_observer::<i32>();
        cold.as_observable().subscribe_observer((&observer).into());
        scheduler.start();

        assert_eq!(
            observer.events(),
            vec![Recorded::error(5, StreamError::msg("broken"))]
        );
        assert!(observer.values().is_empty());
    }
}
