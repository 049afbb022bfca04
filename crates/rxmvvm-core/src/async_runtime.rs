//! Tokio integration for single-shot streams.
//!
//! This module lets an `async` operation back a [`Single`], so real
//! asynchronous services plug into the same tracking and switch-latest
//! machinery as the virtual-time doubles used in tests.
//!
//! # Feature Flag
//!
//! This module requires the `tokio` feature to be enabled:
//!
//! ```toml
//! [dependencies]
//! rxmvvm-core = { version = "0.1", features = ["tokio"] }
//! ```
//!
//! # Example
//!
//! ```no_run
//! use rxmvvm_core::{Single, StreamError};
//!
//! # async fn load_names() -> Result<Vec<String>, StreamError> { Ok(vec![]) }
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//!
//! let names = Single::spawn_on(runtime.handle(), || load_names());
//! let subscription = names.as_observable().subscribe(|names| {
//!     println!("loaded {} names", names.len());
//! });
//!
//! // Disposing before the future resolves aborts the spawned task.
//! subscription.dispose();
//! ```

use std::future::Future;

use tokio::runtime::Handle;

use crate::error::StreamError;
use crate::logging::targets;
use crate::single::Single;
use crate::subscription::Subscription;

impl<T: Clone + Send + Sync + 'static> Single<T> {
    /// Back a single with an async operation spawned on `handle`.
    ///
    /// Every subscription calls `factory` and spawns the returned future.
    /// Its output resolves the single from the runtime's worker thread.
    /// Disposing the subscription aborts the task; an aborted task never
    /// resolves.
    pub fn spawn_on<F, Fut>(handle: &Handle, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, StreamError>> + Send + 'static,
    {
        let handle = handle.clone();
        Single::create(move |observer| {
            let future = factory();
            let task = handle.spawn(async move {
                let result = future.await;
                observer.resolve(result);
            });
            Subscription::new(move || {
                if !task.is_finished() {
                    tracing::trace!(target: targets::ASYNC, "aborting superseded task");
                }
                task.abort();
            })
        })
    }
}
