//! Subscription handles and disposal containers.
//!
//! A [`Subscription`] is returned whenever an observer is attached to a
//! stream. Disposing it detaches the observer and runs the stream's teardown
//! exactly once, no matter how many clones of the handle exist or how many
//! times `dispose` is called.
//!
//! Dropping a `Subscription` does **not** dispose it. Use a [`DisposeBag`]
//! for scope-bound lifetimes:
//!
//! ```
//! use rxmvvm_core::{DisposeBag, Observable};
//!
//! let bag = DisposeBag::new();
//! Observable::just(1).subscribe(|v| println!("{v}")).disposed_by(&bag);
//! // everything in `bag` is disposed when it goes out of scope
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

type Teardown = Box<dyn FnOnce() + Send + 'static>;

struct SubscriptionInner {
    disposed: AtomicBool,
    teardown: Mutex<Option<Teardown>>,
}

/// A handle to an active subscription.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

impl Subscription {
    /// Create a subscription that runs `teardown` when disposed.
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            inner: Arc::new(SubscriptionInner {
                disposed: AtomicBool::new(false),
                teardown: Mutex::new(Some(Box::new(teardown))),
            }),
        }
    }

    /// Create a subscription with nothing to tear down.
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                disposed: AtomicBool::new(false),
                teardown: Mutex::new(None),
            }),
        }
    }

    /// Dispose the subscription. Only the first call has an effect.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Teardown may dispose other subscriptions; never run it under the lock.
        let teardown = self.inner.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    /// Whether `dispose` has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Hand this subscription to a bag, tying it to the bag's lifetime.
    pub fn disposed_by(self, bag: &DisposeBag) {
        bag.insert(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[derive(Default)]
struct SerialState {
    disposed: bool,
    current: Option<Subscription>,
}

/// A single replaceable subscription slot.
///
/// Assigning a new subscription disposes the previous one. Once the slot
/// itself is disposed, anything assigned to it is disposed immediately.
#[derive(Clone, Default)]
pub struct SerialSubscription {
    state: Arc<Mutex<SerialState>>,
}

impl SerialSubscription {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `subscription`, disposing whatever was stored before.
    pub fn replace(&self, subscription: Subscription) {
        let previous = {
            let mut state = self.state.lock();
            if state.disposed {
                Some(subscription)
            } else {
                state.current.replace(subscription)
            }
        };
        if let Some(previous) = previous {
            previous.dispose();
        }
    }

    /// Dispose the slot and its current occupant.
    pub fn dispose(&self) {
        let current = {
            let mut state = self.state.lock();
            state.disposed = true;
            state.current.take()
        };
        if let Some(current) = current {
            current.dispose();
        }
    }

    /// Whether the slot has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// A plain handle that disposes this slot.
    pub fn to_subscription(&self) -> Subscription {
        let serial = self.clone();
        Subscription::new(move || serial.dispose())
    }
}

#[derive(Default)]
struct CompositeState {
    disposed: bool,
    members: Vec<Subscription>,
}

/// A group of subscriptions disposed together.
#[derive(Clone, Default)]
pub struct CompositeSubscription {
    state: Arc<Mutex<CompositeState>>,
}

impl CompositeSubscription {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription. If the group is already disposed, the
    /// subscription is disposed immediately.
    pub fn insert(&self, subscription: Subscription) {
        let rejected = {
            let mut state = self.state.lock();
            if state.disposed {
                Some(subscription)
            } else {
                state.members.retain(|member| !member.is_disposed());
                state.members.push(subscription);
                None
            }
        };
        if let Some(subscription) = rejected {
            subscription.dispose();
        }
    }

    /// Number of live members.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .members
            .iter()
            .filter(|member| !member.is_disposed())
            .count()
    }

    /// Whether the group holds no live members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispose every member and the group itself.
    pub fn dispose(&self) {
        let members = {
            let mut state = self.state.lock();
            state.disposed = true;
            std::mem::take(&mut state.members)
        };
        for member in members {
            member.dispose();
        }
    }

    /// A plain handle that disposes this group.
    pub fn to_subscription(&self) -> Subscription {
        let composite = self.clone();
        Subscription::new(move || composite.dispose())
    }
}

/// Owns subscriptions and disposes all of them when dropped.
#[derive(Default)]
pub struct DisposeBag {
    subscriptions: CompositeSubscription,
}

impl DisposeBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscription to the bag.
    pub fn insert(&self, subscription: Subscription) {
        self.subscriptions.insert(subscription);
    }

    /// Number of live subscriptions held.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the bag holds no live subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl Drop for DisposeBag {
    fn drop(&mut self) {
        self.subscriptions.dispose();
    }
}

static_assertions::assert_impl_all!(Subscription: Send, Sync);
static_assertions::assert_impl_all!(SerialSubscription: Send, Sync);
static_assertions::assert_impl_all!(DisposeBag: Send, Sync);

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counting() -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let subscription = Subscription::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (count, subscription)
    }

    #[test]
    fn test_dispose_runs_teardown_once() {
        let (count, subscription) = counting();
        let clone = subscription.clone();

        assert!(!subscription.is_disposed());
        subscription.dispose();
        clone.dispose();
        subscription.dispose();

        assert!(clone.is_disposed());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_does_not_dispose() {
        let (count, subscription) = counting();
        drop(subscription);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_serial_replace_disposes_previous() {
        let serial = SerialSubscription::new();
        let (first_count, first) = counting();
        let (second_count, second) = counting();

        serial.replace(first);
        serial.replace(second);
        assert_eq!(first_count.load(Ordering::SeqCst), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 0);

        serial.dispose();
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_serial_replace_after_dispose() {
        let serial = SerialSubscription::new();
        serial.dispose();

        let (count, late) = counting();
        serial.replace(late);
        assert!(serial.is_disposed());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_composite_dispose_all() {
        let composite = CompositeSubscription::new();
        let counts: Vec<_> = (0..3)
            .map(|_| {
                let (count, subscription) = counting();
                composite.insert(subscription);
                count
            })
            .collect();

        assert_eq!(composite.len(), 3);
        composite.dispose();
        assert!(composite.is_empty());
        for count in counts {
            assert_eq!(count.load(Ordering::SeqCst), 1);
        }

        let (late_count, late) = counting();
        composite.insert(late);
        assert_eq!(late_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispose_bag_disposes_on_drop() {
        let (count, subscription) = counting();
        {
            let bag = DisposeBag::new();
            subscription.clone().disposed_by(&bag);
            assert_eq!(bag.len(), 1);
            assert_eq!(count.load(Ordering::SeqCst), 0);
        }
        assert!(subscription.is_disposed());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
