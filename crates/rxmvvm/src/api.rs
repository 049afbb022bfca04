//! The service a view model fetches its items from.

use std::sync::atomic::{AtomicUsize, Ordering};

use rxmvvm_core::Single;

use crate::error::ApiError;
use crate::logging::targets;

/// A source of item lists.
///
/// `fetch` describes one request. Nothing happens until the returned
/// single is subscribed, and disposing the subscription cancels the
/// request.
pub trait ApiService: Send + Sync {
    /// Fetch the current list of items.
    fn fetch(&self) -> Single<Vec<String>>;
}

/// A service that answers from a fixed script, one entry per call.
///
/// After the last entry the script starts over from the first. Each
/// instance keeps its own position.
///
/// # Example
///
/// ```
/// use rxmvvm::{ApiService, ScriptedApiService};
///
/// let service = ScriptedApiService::from_lists([vec!["1", "2"], vec![]]);
///
/// for _ in 0..3 {
///     service.fetch().as_observable().subscribe(|items| {
///         assert_eq!(items, vec!["1", "2"]);
///     });
/// }
/// assert_eq!(service.call_count(), 3);
/// ```
#[derive(Debug)]
pub struct ScriptedApiService {
    responses: Vec<Result<Vec<String>, ApiError>>,
    calls: AtomicUsize,
}

impl ScriptedApiService {
    /// Create a service answering with `responses` in order.
    pub fn new(responses: Vec<Result<Vec<String>, ApiError>>) -> Self {
        Self {
            responses,
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a service from plain lists. An empty list is answered with
    /// [`ApiError::EmptyResponse`].
    pub fn from_lists<I, L, S>(lists: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let responses = lists
            .into_iter()
            .map(|list| {
                let items: Vec<String> = list.into_iter().map(Into::into).collect();
                if items.is_empty() {
                    Err(ApiError::EmptyResponse)
                } else {
                    Ok(items)
                }
            })
            .collect();
        Self::new(responses)
    }

    /// Number of times `fetch` has been called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ApiService for ScriptedApiService {
    fn fetch(&self) -> Single<Vec<String>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.responses.is_empty() {
            return Single::error(ApiError::NotScripted.into());
        }
        let response = self.responses[call % self.responses.len()].clone();
        tracing::trace!(
            target: targets::API,
            call,
            ok = response.is_ok(),
            "scripted response"
        );
        Single::from_result(response)
    }
}

static_assertions::assert_impl_all!(ScriptedApiService: Send, Sync);

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use rxmvvm_core::{Event, StreamError};

    use super::*;

    fn resolve(service: &dyn ApiService) -> Vec<Event<Vec<String>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        service
            .fetch()
            .as_observable()
            .subscribe_events(move |event| sink.lock().push(event));
        let events = events.lock().clone();
        events
    }

    #[test]
    fn test_cycles_through_script() {
        let service = ScriptedApiService::from_lists([vec!["1", "2"], vec!["3"]]);

        assert_eq!(
            resolve(&service),
            vec![Event::Next(vec!["1".into(), "2".into()]), Event::Completed]
        );
        assert_eq!(
            resolve(&service),
            vec![Event::Next(vec!["3".into()]), Event::Completed]
        );
        assert_eq!(
            resolve(&service),
            vec![Event::Next(vec!["1".into(), "2".into()]), Event::Completed]
        );
        assert_eq!(service.call_count(), 3);
    }

    #[test]
    fn test_empty_list_is_failure() {
        let service = ScriptedApiService::from_lists([Vec::<&str>::new()]);
        let events = resolve(&service);

        assert_eq!(events.len(), 1);
        let Event::Error(error) = &events[0] else {
            panic!("expected an error, got {:?}", events[0]);
        };
        assert_eq!(error.downcast_ref::<ApiError>(), Some(&ApiError::EmptyResponse));
    }

    #[test]
    fn test_explicit_errors() {
        let service = ScriptedApiService::new(vec![Err(ApiError::request("offline"))]);
        let events = resolve(&service);

        assert_eq!(
            events,
            vec![Event::Error(StreamError::msg("Request failed: offline"))]
        );
    }

    #[test]
    fn test_unscripted_service_fails() {
        let service = ScriptedApiService::new(Vec::new());
        let events = resolve(&service);
        let Event::Error(error) = &events[0] else {
            panic!("expected an error");
        };
        assert_eq!(error.downcast_ref::<ApiError>(), Some(&ApiError::NotScripted));
    }

    #[test]
    fn test_instances_keep_separate_positions() {
        let first = ScriptedApiService::from_lists([vec!["a"], vec!["b"]]);
        let second = ScriptedApiService::from_lists([vec!["a"], vec!["b"]]);

        resolve(&first);
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 0);
        assert_eq!(
            resolve(&second),
            vec![Event::Next(vec!["a".into()]), Event::Completed]
        );
    }
}
