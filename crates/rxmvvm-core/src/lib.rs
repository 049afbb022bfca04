//! Core reactive primitives for rxmvvm.
//!
//! This crate provides the building blocks view models are written with:
//!
//! - **Observables**: Cold, push-based streams with a small operator set
//! - **Subscriptions**: Idempotent disposal handles and dispose bags
//! - **Subjects**: Multicast sources, with and without a current value
//! - **Single**: One value or one failure, for request/response work
//! - **Driver**: Shared, non-failing streams for view bindings
//! - **Activity Indicator**: A de-duplicated busy flag over in-flight work
//! - **Virtual Time**: A deterministic scheduler and test doubles
//!
//! # Tracking Example
//!
//! ```
//! use rxmvvm_core::{ActivityIndicator, Recorded, Single, TestScheduler};
//!
//! let scheduler = TestScheduler::new(0);
//! let indicator = ActivityIndicator::new();
//! let busy = scheduler.create_observer::<bool>();
//! indicator.state().drive(&busy);
//!
//! // A request that resolves 50 ticks after it is made.
//! let response = scheduler.create_cold_observable(vec![
//!     Recorded::next(50, "ok"),
//!     Recorded::completed(50),
//! ]);
//! let request = Single::from_observable(response.as_observable());
//!
//! let requester = indicator.clone();
//! let source = request.as_observable();
//! scheduler.schedule_at(100, move || {
//!     source.track_activity(&requester).subscribe(|_| {});
//! });
//! scheduler.start();
//!
//! assert_eq!(
//!     busy.events(),
//!     vec![
//!         Recorded::next(0, false),
//!         Recorded::next(100, true),
//!         Recorded::next(150, false),
//!     ]
//! );
//! ```
//!
//! # Feature Flags
//!
//! - `tokio`: [`Single::spawn_on`], backing a single with a spawned future.

mod activity;
#[cfg(feature = "tokio")]
pub mod async_runtime;
mod driver;
mod error;
mod event;
pub mod logging;
mod observable;
mod operators;
mod scheduler;
mod single;
mod subject;
mod subscription;
pub mod testing;

pub use activity::{ActivityIndicator, ActivityToken};
pub use driver::Driver;
pub use error::{Result, RxError, SchedulerError, StreamError};
pub use event::{Event, Observer};
pub use observable::Observable;
pub use scheduler::{ScheduledTaskId, TestScheduler, VirtualTime};
pub use single::{Single, SingleObserver};
pub use subject::{BehaviorRelay, PublishSubject};
pub use subscription::{CompositeSubscription, DisposeBag, SerialSubscription, Subscription};
pub use testing::{ColdObservable, HotObservable, Recorded, SubscriptionLog, TestableObserver};
