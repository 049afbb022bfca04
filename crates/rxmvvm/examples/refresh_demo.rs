//! Drive a SampleViewModel against a slow async service.
//!
//! Run with:
//!
//! ```sh
//! RUST_LOG=info,rxmvvm=trace cargo run -p rxmvvm --example refresh_demo --features tokio
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rxmvvm::{
    ApiError, ApiService, SampleViewModel, SampleViewModelInput, SelectionPolicy, ViewModelType,
};
use rxmvvm_core::{DisposeBag, PublishSubject, Single, StreamError};
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;

/// Answers after a delay. Every third request fails.
struct SlowApiService {
    handle: Handle,
    latency: Duration,
    calls: Arc<AtomicUsize>,
}

impl ApiService for SlowApiService {
    fn fetch(&self) -> Single<Vec<String>> {
        let calls = self.calls.clone();
        let latency = self.latency;
        Single::spawn_on(&self.handle, move || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                tokio::time::sleep(latency).await;
                let response: Result<Vec<String>, StreamError> = if call % 3 == 0 {
                    Err(ApiError::request("server busy").into())
                } else {
                    Ok((1..=call).map(|n| format!("item {n}")).collect())
                };
                response
            }
        })
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let service = Arc::new(SlowApiService {
        handle: Handle::current(),
        latency: Duration::from_millis(300),
        calls: Arc::new(AtomicUsize::new(0)),
    });
    let view_model = SampleViewModel::builder(service)
        .selection_policy(SelectionPolicy::Clamp)
        .build();

    let refresh = PublishSubject::<()>::new();
    let taps = PublishSubject::<usize>::new();
    let output = view_model.transform(SampleViewModelInput {
        refresh_stream: refresh.as_observable().as_driver_or_return(()),
        item_position_select_stream: taps.as_observable().as_driver_or_return(0),
    });

    let bag = DisposeBag::new();
    bag.insert(
        output
            .refreshing_stream
            .drive_with(|refreshing| tracing::info!(refreshing, "busy state")),
    );
    bag.insert(
        output
            .items_stream
            .drive_with(|items| tracing::info!(?items, "items")),
    );
    bag.insert(
        output
            .selected_item_stream
            .drive_with(|item| tracing::info!(%item, "selected")),
    );

    // The second refresh lands while the first is still in flight.
    refresh.on_next(());
    tokio::time::sleep(Duration::from_millis(100)).await;
    refresh.on_next(());
    tokio::time::sleep(Duration::from_millis(500)).await;

    taps.on_next(1);
    taps.on_next(10);

    // Third request fails: the list empties and the view stays usable.
    refresh.on_next(());
    tokio::time::sleep(Duration::from_millis(500)).await;
    taps.on_next(0);

    refresh.on_next(());
    tokio::time::sleep(Duration::from_millis(500)).await;
    taps.on_next(3);
}
