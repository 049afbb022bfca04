//! Stream operators.
//!
//! Only the operators a view-model pipeline needs are provided: value
//! transformation, de-duplication, error absorption, sampling another
//! stream, switch-latest flattening and replayed sharing.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::SlotMap;

use crate::event::{Event, Observer, ObserverKey};
use crate::logging::targets;
use crate::observable::Observable;
use crate::subscription::{CompositeSubscription, SerialSubscription, Subscription};

impl<T: Clone + Send + Sync + 'static> Observable<T> {
    /// Transform each value.
    pub fn map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::create(move |observer| {
            let f = f.clone();
            source.subscribe_events(move |event| observer.on(event.map(|value| f(value))))
        })
    }

    /// Keep only values matching `predicate`.
    pub fn filter<F>(&self, predicate: F) -> Observable<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter_map(move |value| predicate(&value).then_some(value))
    }

    /// Transform each value, dropping those mapped to `None`.
    pub fn filter_map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Option<U> + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::create(move |observer| {
            let f = f.clone();
            source.subscribe_events(move |event| match event {
                Event::Next(value) => {
                    if let Some(mapped) = f(value) {
                        observer.on_next(mapped);
                    }
                }
                Event::Error(err) => observer.on_error(err),
                Event::Completed => observer.on_completed(),
            })
        })
    }

    /// Drop values equal to the previously delivered one.
    pub fn distinct_until_changed(&self) -> Observable<T>
    where
        T: PartialEq,
    {
        let source = self.clone();
        Observable::create(move |observer| {
            let last: Mutex<Option<T>> = Mutex::new(None);
            source.subscribe_events(move |event| match event {
                Event::Next(value) => {
                    let changed = {
                        let mut last = last.lock();
                        if last.as_ref() == Some(&value) {
                            false
                        } else {
                            *last = Some(value.clone());
                            true
                        }
                    };
                    if changed {
                        observer.on_next(value);
                    }
                }
                other => observer.on(other),
            })
        })
    }

    /// Replace a failure with `fallback` followed by completion.
    pub fn catch_and_return(&self, fallback: T) -> Observable<T> {
        let source = self.clone();
        Observable::create(move |observer| {
            let fallback = fallback.clone();
            source.subscribe_events(move |event| match event {
                Event::Error(_) => {
                    observer.on_next(fallback.clone());
                    observer.on_completed();
                }
                other => observer.on(other),
            })
        })
    }

    /// Combine each value with the most recent value of `other`.
    ///
    /// Values arriving before `other` has produced anything are dropped.
    /// Completion of `other` is ignored; its failure is forwarded.
    pub fn with_latest_from<U, R, F>(&self, other: &Observable<U>, combine: F) -> Observable<R>
    where
        U: Clone + Send + Sync + 'static,
        R: Clone + Send + Sync + 'static,
        F: Fn(T, U) -> R + Send + Sync + 'static,
    {
        let source = self.clone();
        let other = other.clone();
        let combine = Arc::new(combine);
        Observable::create(move |observer: Observer<R>| {
            let latest: Arc<Mutex<Option<U>>> = Arc::new(Mutex::new(None));
            let subscriptions = CompositeSubscription::new();

            // Subscribe to the sampled stream first so a replayed value is
            // already in place when the source starts.
            let sampled = {
                let latest = latest.clone();
                let observer = observer.clone();
                other.subscribe_events(move |event| match event {
                    Event::Next(value) => *latest.lock() = Some(value),
                    Event::Error(err) => observer.on_error(err),
                    Event::Completed => {}
                })
            };
            subscriptions.insert(sampled);

            let combine = combine.clone();
            let sampler = source.subscribe_events(move |event| match event {
                Event::Next(value) => {
                    let current = latest.lock().clone();
                    if let Some(current) = current {
                        observer.on_next(combine(value, current));
                    }
                }
                Event::Error(err) => observer.on_error(err),
                Event::Completed => observer.on_completed(),
            });
            subscriptions.insert(sampler);

            subscriptions.to_subscription()
        })
    }

    /// Map each value to an inner stream and mirror only the latest one.
    ///
    /// A new outer value bumps a generation counter, so events from the
    /// superseded inner stream are discarded from then on. The new inner
    /// stream is subscribed before the superseded one is disposed. The
    /// result completes once the outer stream and the current inner stream
    /// have both completed.
    ///
    /// Events reaching the observer are serialized: whatever arrives while
    /// another event is being forwarded is queued, and its generation is
    /// checked again when it leaves the queue. A superseded value never
    /// reaches the observer after a newer one, whichever threads the inner
    /// streams run on.
    pub fn flat_map_latest<U, F>(&self, project: F) -> Observable<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> Observable<U> + Send + Sync + 'static,
    {
        let source = self.clone();
        let project = Arc::new(project);
        Observable::create(move |observer: Observer<U>| {
            let gate = Arc::new(SwitchGate::new(observer));
            let inner = SerialSubscription::new();

            let outer = {
                let gate = gate.clone();
                let inner = inner.clone();
                let project = project.clone();
                source.subscribe_events(move |event| match event {
                    Event::Next(value) => {
                        let generation = gate.begin_inner();
                        if generation > 1 {
                            tracing::trace!(
                                target: targets::OPERATOR,
                                generation,
                                "superseding previous inner stream"
                            );
                        }
                        let inner_observer = {
                            let gate = gate.clone();
                            Observer::new(move |event| gate.forward(Some(generation), event))
                        };
                        let subscription = project(value).subscribe_observer(inner_observer);
                        inner.replace(subscription);
                    }
                    Event::Error(err) => gate.forward(None, Event::Error(err)),
                    Event::Completed => gate.forward(None, Event::Completed),
                })
            };

            let subscriptions = CompositeSubscription::new();
            subscriptions.insert(outer);
            subscriptions.insert(inner.to_subscription());
            subscriptions.to_subscription()
        })
    }

    /// Multicast this stream, replaying the latest value to new observers.
    ///
    /// The source is subscribed when the first observer arrives and disposed
    /// when the last one leaves; the replayed value is forgotten at that
    /// point. A terminal event is forwarded to all current observers and
    /// resets the connection, so a later observer subscribes afresh.
    ///
    /// Replays and broadcasts go through one ordered queue drained by a
    /// single thread at a time. An observer is never called concurrently,
    /// and a replay is never overtaken by a value emitted after it was
    /// taken.
    pub fn share_replay_latest(&self) -> Observable<T> {
        let source = self.clone();
        let shared: Arc<Mutex<ShareState<T>>> = Arc::new(Mutex::new(ShareState::new()));
        Observable::create(move |observer: Observer<T>| {
            let (key, connect) = {
                let mut state = shared.lock();
                let since = state.next_sequence;
                let key = state.observers.insert(SharedObserver { observer, since });
                if let Some(value) = state.latest.clone() {
                    state.pending.push_back(Delivery::Replay { key, value });
                }
                let connect = if state.connection.is_none() {
                    let connection = SerialSubscription::new();
                    state.connection = Some(connection.clone());
                    Some(connection)
                } else {
                    None
                };
                (key, connect)
            };
            ShareState::drain(&shared);

            if let Some(connection) = connect {
                tracing::trace!(target: targets::OPERATOR, "connecting shared source");
                let broadcast_to = shared.clone();
                let upstream = source.subscribe_events(move |event| {
                    ShareState::broadcast(&broadcast_to, event);
                });
                connection.replace(upstream);
            }

            let shared = shared.clone();
            Subscription::new(move || {
                let connection = {
                    let mut state = shared.lock();
                    state.observers.remove(key);
                    if state.observers.is_empty() {
                        state.latest = None;
                        state.connection.take()
                    } else {
                        None
                    }
                };
                if let Some(connection) = connection {
                    tracing::trace!(target: targets::OPERATOR, "disconnecting shared source");
                    connection.dispose();
                }
            })
        })
    }
}

struct SwitchState<U> {
    generation: u64,
    inner_active: bool,
    outer_done: bool,
    /// Events waiting to be forwarded, tagged with their inner generation.
    /// `None` marks events of the outer stream.
    queue: VecDeque<(Option<u64>, Event<U>)>,
    delivering: bool,
}

impl<U> SwitchState<U> {
    /// Whether a dequeued event may reach the observer.
    fn admit(&mut self, generation: Option<u64>, event: &Event<U>) -> bool {
        let completed = matches!(event, Event::Completed);
        match generation {
            Some(generation) if generation != self.generation => false,
            Some(_) if completed => {
                self.inner_active = false;
                // Inner completion only ends the result once the outer is done.
                self.outer_done
            }
            None if completed => {
                self.outer_done = true;
                !self.inner_active
            }
            _ => true,
        }
    }
}

/// Serializes everything a switch forwards to its observer.
struct SwitchGate<U> {
    observer: Observer<U>,
    state: Mutex<SwitchState<U>>,
}

impl<U> SwitchGate<U> {
    fn new(observer: Observer<U>) -> Self {
        Self {
            observer,
            state: Mutex::new(SwitchState {
                generation: 0,
                inner_active: false,
                outer_done: false,
                queue: VecDeque::new(),
                delivering: false,
            }),
        }
    }

    fn begin_inner(&self) -> u64 {
        let mut state = self.state.lock();
        state.generation += 1;
        state.inner_active = true;
        state.generation
    }

    fn forward(&self, generation: Option<u64>, event: Event<U>) {
        {
            let mut state = self.state.lock();
            state.queue.push_back((generation, event));
            if state.delivering {
                return;
            }
            state.delivering = true;
        }
        loop {
            let event = {
                let mut state = self.state.lock();
                let Some((generation, event)) = state.queue.pop_front() else {
                    state.delivering = false;
                    return;
                };
                if !state.admit(generation, &event) {
                    continue;
                }
                event
            };
            self.observer.on(event);
        }
    }
}

struct SharedObserver<T> {
    observer: Observer<T>,
    /// First broadcast sequence number this observer should receive.
    since: u64,
}

enum Delivery<T> {
    /// Sent to every observer attached at or before `sequence`.
    Broadcast { sequence: u64, event: Event<T> },
    /// The latest value, sent to one newly attached observer.
    Replay { key: ObserverKey, value: T },
}

struct ShareState<T> {
    observers: SlotMap<ObserverKey, SharedObserver<T>>,
    latest: Option<T>,
    connection: Option<SerialSubscription>,
    pending: VecDeque<Delivery<T>>,
    next_sequence: u64,
    delivering: bool,
}

impl<T: Clone> ShareState<T> {
    fn new() -> Self {
        Self {
            observers: SlotMap::with_key(),
            latest: None,
            connection: None,
            pending: VecDeque::new(),
            next_sequence: 0,
            delivering: false,
        }
    }

    fn broadcast(shared: &Mutex<Self>, event: Event<T>) {
        {
            let mut state = shared.lock();
            match &event {
                Event::Next(value) => state.latest = Some(value.clone()),
                _ => {
                    state.latest = None;
                    state.connection = None;
                }
            }
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.pending.push_back(Delivery::Broadcast { sequence, event });
        }
        Self::drain(shared);
    }

    /// Deliver queued replays and broadcasts, unless another call is
    /// already doing so; that call picks up everything queued meanwhile.
    fn drain(shared: &Mutex<Self>) {
        {
            let mut state = shared.lock();
            if state.delivering {
                return;
            }
            state.delivering = true;
        }
        loop {
            let (observers, event) = {
                let mut state = shared.lock();
                let Some(delivery) = state.pending.pop_front() else {
                    state.delivering = false;
                    return;
                };
                match delivery {
                    Delivery::Replay { key, value } => match state.observers.get(key) {
                        Some(entry) => (vec![entry.observer.clone()], Event::Next(value)),
                        None => continue,
                    },
                    Delivery::Broadcast { sequence, event } => {
                        let observers: Vec<Observer<T>> = state
                            .observers
                            .values()
                            .filter(|entry| entry.since <= sequence)
                            .map(|entry| entry.observer.clone())
                            .collect();
                        if event.is_terminal() {
                            state.observers.retain(|_, entry| entry.since > sequence);
                        }
                        (observers, event)
                    }
                }
            };
            for observer in observers {
                observer.on(event.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::error::StreamError;
    use crate::subject::PublishSubject;

    fn record<T: Clone + Send + Sync + 'static>(
        observable: &Observable<T>,
    ) -> (Arc<Mutex<Vec<Event<T>>>>, Subscription) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let subscription = observable.subscribe_events(move |event| sink.lock().push(event));
        (events, subscription)
    }

    #[test]
    fn test_map_and_filter_map() {
        let (events, _) = record(
            &Observable::from_iter(vec![1, 2, 3])
                .map(|v| v * 2)
                .filter_map(|v| (v != 4).then(|| v.to_string())),
        );
        assert_eq!(
            *events.lock(),
            vec![
                Event::Next("2".to_string()),
                Event::Next("6".to_string()),
                Event::Completed
            ]
        );
    }

    #[test]
    fn test_distinct_until_changed() {
        let (events, _) = record(
            &Observable::from_iter(vec![false, false, true, true, false]).distinct_until_changed(),
        );
        assert_eq!(
            *events.lock(),
            vec![
                Event::Next(false),
                Event::Next(true),
                Event::Next(false),
                Event::Completed
            ]
        );
    }

    #[test]
    fn test_catch_and_return() {
        let (events, _) =
            record(&Observable::<Vec<i32>>::error(StreamError::msg("down")).catch_and_return(vec![]));
        assert_eq!(*events.lock(), vec![Event::Next(vec![]), Event::Completed]);
    }

    #[test]
    fn test_with_latest_from() {
        let source = PublishSubject::<usize>::new();
        let sampled = PublishSubject::<&'static str>::new();
        let (events, _) = record(
            &source
                .as_observable()
                .with_latest_from(&sampled.as_observable(), |n, s| format!("{n}{s}")),
        );

        source.on_next(0); // nothing sampled yet
        sampled.on_next("a");
        sampled.on_next("b");
        source.on_next(1);
        sampled.on_completed();
        source.on_next(2);
        source.on_completed();

        assert_eq!(
            *events.lock(),
            vec![
                Event::Next("1b".to_string()),
                Event::Next("2b".to_string()),
                Event::Completed
            ]
        );
    }

    #[test]
    fn test_flat_map_latest_switches() {
        let outer = PublishSubject::<usize>::new();
        let inners: Vec<PublishSubject<String>> = (0..2).map(|_| PublishSubject::new()).collect();
        let inner_streams: Vec<Observable<String>> =
            inners.iter().map(PublishSubject::as_observable).collect();

        let (events, _) = record(
            &outer
                .as_observable()
                .flat_map_latest(move |index| inner_streams[index].clone()),
        );

        outer.on_next(0);
        inners[0].on_next("first".to_string());
        outer.on_next(1);
        assert_eq!(inners[0].observer_count(), 0, "superseded inner disposed");
        inners[0].on_next("stale".to_string());
        inners[1].on_next("second".to_string());

        assert_eq!(
            *events.lock(),
            vec![
                Event::Next("first".to_string()),
                Event::Next("second".to_string())
            ]
        );
    }

    #[test]
    fn test_flat_map_latest_completion() {
        let outer = PublishSubject::<()>::new();
        let inner = PublishSubject::<i32>::new();
        let inner_stream = inner.as_observable();
        let (events, _) = record(
            &outer
                .as_observable()
                .flat_map_latest(move |_| inner_stream.clone()),
        );

        outer.on_next(());
        outer.on_completed();
        assert!(events.lock().is_empty(), "inner still active");

        inner.on_next(5);
        inner.on_completed();
        assert_eq!(*events.lock(), vec![Event::Next(5), Event::Completed]);
    }

    #[test]
    fn test_share_replay_latest_connects_once() {
        let subscribe_count = Arc::new(AtomicUsize::new(0));
        let subject = PublishSubject::<i32>::new();
        let counted = {
            let subscribe_count = subscribe_count.clone();
            let upstream = subject.as_observable();
            Observable::create(move |observer| {
                subscribe_count.fetch_add(1, Ordering::SeqCst);
                upstream.subscribe_observer(observer)
            })
        };
        let shared = counted.share_replay_latest();

        let (first, first_sub) = record(&shared);
        subject.on_next(1);
        let (second, second_sub) = record(&shared);
        subject.on_next(2);

        assert_eq!(subscribe_count.load(Ordering::SeqCst), 1);
        assert_eq!(*first.lock(), vec![Event::Next(1), Event::Next(2)]);
        assert_eq!(*second.lock(), vec![Event::Next(1), Event::Next(2)]);

        first_sub.dispose();
        second_sub.dispose();
        assert_eq!(subject.observer_count(), 0);

        // Reconnects afresh without replaying the forgotten value.
        let (third, _) = record(&shared);
        assert!(third.lock().is_empty());
        assert_eq!(subscribe_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_flat_map_latest_drops_superseded_value_from_other_thread() {
        let outer = PublishSubject::<usize>::new();
        let slow_inner: Arc<Mutex<Option<Observer<&'static str>>>> = Arc::new(Mutex::new(None));
        let projected = {
            let slow_inner = slow_inner.clone();
            move |index: usize| {
                if index == 0 {
                    let slow_inner = slow_inner.clone();
                    Observable::create(move |observer| {
                        *slow_inner.lock() = Some(observer);
                        Subscription::empty()
                    })
                } else {
                    Observable::just("fresh")
                }
            }
        };

        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
        let observed = Arc::new(Mutex::new(Vec::new()));
        let sink = observed.clone();
        let _subscription = outer
            .as_observable()
            .flat_map_latest(projected)
            .subscribe(move |value| {
                if value == "stale" {
                    let _ = entered_tx.send(());
                    thread::sleep(Duration::from_millis(50));
                }
                sink.lock().push(value);
            });

        outer.on_next(0);
        let Some(inner) = slow_inner.lock().take() else {
            panic!("first inner stream was not subscribed");
        };
        let late = thread::spawn(move || inner.on_next("stale"));
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("stale value reached the sink");
        outer.on_next(1);
        late.join().unwrap();

        assert_eq!(observed.lock().last(), Some(&"fresh"));
    }

    #[test]
    fn test_share_replay_latest_serializes_replay_and_broadcast() {
        let subject = PublishSubject::<u32>::new();
        let shared = subject.as_observable().share_replay_latest();
        let (_early, _early_sub) = record(&shared);
        subject.on_next(1);

        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let late_log = Arc::new(Mutex::new(Vec::new()));
        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);

        let late = {
            let shared = shared.clone();
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            let late_log = late_log.clone();
            thread::spawn(move || {
                shared.subscribe(move |value| {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_in_flight.fetch_max(now, Ordering::SeqCst);
                    if value == 1 {
                        let _ = entered_tx.send(());
                        thread::sleep(Duration::from_millis(50));
                    }
                    late_log.lock().push(value);
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
        };

        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("replay reached the late observer");
        subject.on_next(2);
        let _late_sub = late.join().unwrap();

        assert_eq!(*late_log.lock(), vec![1, 2]);
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }
}
