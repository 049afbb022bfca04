//! MVVM view models built on rxmvvm-core streams.
//!
//! A view model is a pure transformation from the streams a view drives
//! (taps, pulls, selections) to the streams it binds to (lists, flags,
//! details). This crate provides:
//!
//! - [`ViewModelType`]: the `Input -> Output` transformation contract
//! - [`ApiService`]: the service a view model fetches from, plus
//!   [`ScriptedApiService`] for tests
//! - [`SampleViewModel`]: a refreshable list with a busy flag and
//!   selection
//!
//! Outputs are [`Driver`](rxmvvm_core::Driver)s: they never fail and are
//! shared between bindings. Everything can be exercised deterministically
//! with [`TestScheduler`](rxmvvm_core::TestScheduler).
//!
//! # Feature Flags
//!
//! - `tokio`: enables the tokio bridge in rxmvvm-core, for services backed
//!   by real async requests.

mod api;
mod config;
mod error;
pub mod logging;
mod sample;
mod view_model;

pub use api::{ApiService, ScriptedApiService};
pub use config::{SampleViewModelBuilder, SampleViewModelConfig, SelectionPolicy};
pub use error::{ApiError, Result};
pub use sample::{SampleViewModel, SampleViewModelInput, SampleViewModelOutput};
pub use view_model::ViewModelType;

pub use rxmvvm_core;
