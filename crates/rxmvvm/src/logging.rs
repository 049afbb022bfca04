//! Log targets for view models.
//!
//! Core stream events live under the `rxmvvm_core` targets listed in
//! [`rxmvvm_core::logging::targets`]; the targets here cover the
//! view-model layer on top of them.

/// Target names for log filtering.
pub mod targets {
    /// View-model transform target.
    pub const VIEW_MODEL: &str = "rxmvvm::view_model";
    /// Service target.
    pub const API: &str = "rxmvvm::api";
}
