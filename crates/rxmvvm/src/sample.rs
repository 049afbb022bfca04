//! A list screen: refresh to fetch items, tap to select one.

use std::fmt;
use std::sync::Arc;

use rxmvvm_core::logging::span_names;
use rxmvvm_core::{ActivityIndicator, Driver};

use crate::api::ApiService;
use crate::config::{SampleViewModelBuilder, SampleViewModelConfig};
use crate::logging::targets;
use crate::view_model::ViewModelType;

/// Streams driven by the list screen.
pub struct SampleViewModelInput {
    /// Emits once per pull-to-refresh.
    pub refresh_stream: Driver<()>,
    /// Emits the position of each tapped row.
    pub item_position_select_stream: Driver<usize>,
}

/// Streams the list screen binds to.
pub struct SampleViewModelOutput {
    /// Whether a fetch is in flight.
    pub refreshing_stream: Driver<bool>,
    /// The most recently fetched items; empty after a failed fetch.
    pub items_stream: Driver<Vec<String>>,
    /// The item at each tapped position.
    pub selected_item_stream: Driver<String>,
}

/// View model for a refreshable, selectable list of items.
///
/// Each refresh cancels the fetch still in flight, if any, and starts a new
/// one. A failed fetch shows up as an empty list; no output ever fails.
/// Taps resolve against the last list shown and are dropped until one has
/// been shown.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use rxmvvm::{
///     SampleViewModel, SampleViewModelInput, ScriptedApiService, ViewModelType,
/// };
/// use rxmvvm_core::{Recorded, TestScheduler};
///
/// let scheduler = TestScheduler::new(0);
/// let service = Arc::new(ScriptedApiService::from_lists([vec!["1", "2"]]));
/// let view_model = SampleViewModel::new(service);
///
/// let refresh = scheduler.create_cold_observable(vec![Recorded::next(100, ())]);
/// let taps = scheduler.create_cold_observable(vec![Recorded::next(200, 1)]);
/// let output = view_model.transform(SampleViewModelInput {
///     refresh_stream: refresh.as_observable().as_driver_or_return(()),
///     item_position_select_stream: taps.as_observable().as_driver_or_return(0),
/// });
///
/// let selected = scheduler.create_observer::<String>();
/// output.selected_item_stream.drive(&selected);
/// scheduler.start();
///
/// assert_eq!(selected.events(), vec![Recorded::next(200, "2".to_string())]);
/// ```
#[derive(Clone)]
pub struct SampleViewModel {
    api_service: Arc<dyn ApiService>,
    config: SampleViewModelConfig,
}

impl fmt::Debug for SampleViewModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleViewModel")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SampleViewModel {
    /// Create a view model with default settings.
    pub fn new(api_service: Arc<dyn ApiService>) -> Self {
        Self::with_config(api_service, SampleViewModelConfig::default())
    }

    /// Create a view model with the given configuration.
    pub fn with_config(api_service: Arc<dyn ApiService>, config: SampleViewModelConfig) -> Self {
        Self {
            api_service,
            config,
        }
    }

    /// Start building a view model.
    pub fn builder(api_service: Arc<dyn ApiService>) -> SampleViewModelBuilder {
        SampleViewModelBuilder::new(api_service)
    }

    /// The active configuration.
    pub fn config(&self) -> &SampleViewModelConfig {
        &self.config
    }
}

impl ViewModelType for SampleViewModel {
    type Input = SampleViewModelInput;
    type Output = SampleViewModelOutput;

    fn transform(&self, input: SampleViewModelInput) -> SampleViewModelOutput {
        let _span =
            tracing::trace_span!(target: targets::VIEW_MODEL, span_names::TRANSFORM).entered();
        let activity = ActivityIndicator::new();

        let api_service = self.api_service.clone();
        let tracker = activity.clone();
        let items_stream = input.refresh_stream.flat_map_latest(move |()| {
            tracing::trace!(target: targets::VIEW_MODEL, "refresh requested");
            api_service
                .fetch()
                .as_observable()
                .track_activity(&tracker)
                .as_driver_or_return(Vec::new())
        });

        let policy = self.config.selection_policy;
        let selected_item_stream = input
            .item_position_select_stream
            .with_latest_from(&items_stream, move |index, items: Vec<String>| {
                let selected = policy.resolve(&items, index);
                if selected.is_none() {
                    tracing::trace!(
                        target: targets::VIEW_MODEL,
                        index,
                        len = items.len(),
                        "selection out of range"
                    );
                }
                selected
            })
            .filter_map(|selected| selected);

        SampleViewModelOutput {
            refreshing_stream: activity.state(),
            items_stream,
            selected_item_stream,
        }
    }
}

static_assertions::assert_impl_all!(SampleViewModel: Send, Sync);
