//! Logging facilities for rxmvvm.
//!
//! rxmvvm uses the `tracing` crate for instrumentation. Libraries never
//! install a subscriber; to see logs, install one in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("rxmvvm_core::activity=trace")
//!     .init();
//! ```
//!
//! All events are emitted at `trace` or `debug` level under the targets
//! listed in [`targets`], so a filter directive per subsystem is enough to
//! follow a single pipeline.

/// Span names used throughout rxmvvm for tracing.
///
/// [`TestScheduler::start`](crate::TestScheduler::start) runs inside
/// `SCHEDULER`; view models enter `TRANSFORM` while wiring their outputs.
pub mod span_names {
    /// Virtual-time scheduler run span.
    pub const SCHEDULER: &str = "rxmvvm::scheduler";
    /// View-model transform span.
    pub const TRANSFORM: &str = "rxmvvm::transform";
}

/// Target names for log filtering.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "rxmvvm_core";
    /// Activity indicator target.
    pub const ACTIVITY: &str = "rxmvvm_core::activity";
    /// Subjects and relays target.
    pub const SUBJECT: &str = "rxmvvm_core::subject";
    /// Operator target (switch-latest, sharing).
    pub const OPERATOR: &str = "rxmvvm_core::operator";
    /// Virtual-time scheduler target.
    pub const SCHEDULER: &str = "rxmvvm_core::scheduler";
    /// Async bridge target.
    pub const ASYNC: &str = "rxmvvm_core::async_runtime";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_are_nested_under_core() {
        for target in [
            targets::ACTIVITY,
            targets::SUBJECT,
            targets::OPERATOR,
            targets::SCHEDULER,
            targets::ASYNC,
        ] {
            assert!(target.starts_with(targets::CORE), "{target}");
        }
    }

    #[test]
    fn test_span_names_share_prefix() {
        for name in [span_names::SCHEDULER, span_names::TRANSFORM] {
            assert!(name.starts_with("rxmvvm::"), "{name}");
        }
        assert_ne!(span_names::SCHEDULER, span_names::TRANSFORM);
    }
}
