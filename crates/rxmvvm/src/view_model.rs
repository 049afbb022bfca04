//! The view-model abstraction.

/// A view model turns a bundle of input streams into a bundle of output
/// streams.
///
/// `transform` wires the pipeline and returns immediately; no work happens
/// until the outputs are observed. Calling it again builds an independent
/// pipeline with its own state.
pub trait ViewModelType {
    /// The streams driven by the view.
    type Input;
    /// The streams the view binds to.
    type Output;

    /// Build the output streams from `input`.
    fn transform(&self, input: Self::Input) -> Self::Output;
}
