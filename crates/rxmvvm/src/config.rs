//! Configuration for [`SampleViewModel`](crate::SampleViewModel).

use std::sync::Arc;

use crate::api::ApiService;
use crate::sample::SampleViewModel;

/// What a selection outside the current item list resolves to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Drop the selection; nothing is emitted.
    #[default]
    Ignore,
    /// Select the last item. An empty list still emits nothing.
    Clamp,
}

impl SelectionPolicy {
    /// Resolve `index` against `items`.
    pub fn resolve(self, items: &[String], index: usize) -> Option<String> {
        match items.get(index) {
            Some(item) => Some(item.clone()),
            None => match self {
                Self::Ignore => None,
                Self::Clamp => items.last().cloned(),
            },
        }
    }
}

/// Configuration for a [`SampleViewModel`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleViewModelConfig {
    /// How out-of-range selections are handled.
    pub selection_policy: SelectionPolicy,
}

impl SampleViewModelConfig {
    /// Create a configuration with the given selection policy.
    pub fn with_selection_policy(selection_policy: SelectionPolicy) -> Self {
        Self { selection_policy }
    }
}

/// Builder for creating a [`SampleViewModel`] with custom configuration.
pub struct SampleViewModelBuilder {
    api_service: Arc<dyn ApiService>,
    config: SampleViewModelConfig,
}

impl SampleViewModelBuilder {
    /// Create a builder with default settings.
    pub fn new(api_service: Arc<dyn ApiService>) -> Self {
        Self {
            api_service,
            config: SampleViewModelConfig::default(),
        }
    }

    /// Set the out-of-range selection policy.
    pub fn selection_policy(mut self, policy: SelectionPolicy) -> Self {
        self.config.selection_policy = policy;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: SampleViewModelConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the view model.
    pub fn build(self) -> SampleViewModel {
        SampleViewModel::with_config(self.api_service, self.config)
    }
}
