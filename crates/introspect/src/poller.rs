//! Introspection polling with query fallback and bounded retries.
//!
//! Each attempt walks the query list in order and stops at the first
//! response carrying a schema and no errors. An attempt in which no variant
//! reached the server is retried after a fixed delay, but only when a local
//! service is being started; a direct URL is either reachable or not.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{
    GraphQLError, GraphQLResponse, IntrospectionQuery, PollError, Transport, TransportError,
    OPERATION_NAME,
};

/// Default number of attempts against a freshly started service.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// How the endpoint came to exist, which decides whether retrying makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    /// The endpoint was given as a URL and is expected to be up already.
    DirectUrl,
    /// The endpoint belongs to a service process that may still be starting.
    Process,
}

/// A usable introspection result.
#[derive(Debug, Clone)]
pub struct PolledSchema {
    /// The full response the schema was taken from.
    pub response: GraphQLResponse,
    /// Label of the query variant that succeeded.
    pub query: String,
    /// 1-based attempt number that produced the response.
    pub attempt: u32,
}

impl PolledSchema {
    /// The `__schema` node. Always present for a polled result.
    #[must_use]
    pub fn schema(&self) -> Option<&serde_json::Value> {
        self.response.schema()
    }
}

enum AttemptOutcome {
    Usable(PolledSchema),
    /// Every variant failed before reaching the server.
    Unreachable(TransportError),
    /// The server answered, but not with a usable schema.
    Unusable(Vec<GraphQLError>),
}

/// Runs introspection queries against an endpoint until one yields a schema.
///
/// # Examples
///
/// ```no_run
/// use graphql_introspect::{introspection_queries, HttpTransport, IntrospectionPoller, PollMode};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let poller = IntrospectionPoller::new(HttpTransport::default(), PollMode::DirectUrl);
/// let polled = poller
///     .poll("https://api.example.com/graphql", &introspection_queries(None), &CancellationToken::new())
///     .await?;
/// println!("{} query succeeded", polled.query);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct IntrospectionPoller<T> {
    transport: T,
    mode: PollMode,
    max_retries: u32,
    retry_delay: Duration,
    retry_on_graphql_errors: bool,
}

impl<T: Transport> IntrospectionPoller<T> {
    #[must_use]
    pub fn new(transport: T, mode: PollMode) -> Self {
        Self {
            transport,
            mode,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            retry_on_graphql_errors: false,
        }
    }

    /// Sets the total number of attempts in process mode. Values below 1 are
    /// treated as 1.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Also retry, in process mode, attempts whose variants all answered
    /// without a usable schema. Off by default.
    #[must_use]
    pub fn with_retry_on_graphql_errors(mut self, retry: bool) -> Self {
        self.retry_on_graphql_errors = retry;
        self
    }

    /// Polls `endpoint` with `queries` tried in order on every attempt.
    ///
    /// # Errors
    ///
    /// - [`PollError::Cancelled`] when `cancel` fires, at any suspension point
    /// - [`PollError::Unreachable`] when a direct URL cannot be reached
    /// - [`PollError::RetriesExhausted`] when a service stays unreachable for
    ///   every attempt
    /// - [`PollError::NoUsableResponse`] when the server answers but no
    ///   variant produced a schema; carries the last response's errors
    #[tracing::instrument(skip(self, queries, cancel), fields(mode = ?self.mode))]
    pub async fn poll(
        &self,
        endpoint: &str,
        queries: &[IntrospectionQuery],
        cancel: &CancellationToken,
    ) -> Result<PolledSchema, PollError> {
        let max_attempts = self.max_retries.max(1);
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }

            tracing::info!(url = endpoint, attempt, "Sending introspection request");

            match self.attempt(endpoint, queries, attempt, cancel).await? {
                AttemptOutcome::Usable(polled) => return Ok(polled),
                AttemptOutcome::Unreachable(source) => {
                    tracing::error!(
                        attempt,
                        error = %source,
                        "An error occurred while executing an HTTP request"
                    );

                    if self.mode == PollMode::DirectUrl {
                        return Err(PollError::Unreachable {
                            url: endpoint.to_string(),
                            source,
                        });
                    }

                    tracing::warn!(
                        "Make sure the process can start at {endpoint} and the port is not used \
                         by another process. It may not be serving requests yet."
                    );

                    if attempt >= max_attempts {
                        return Err(PollError::RetriesExhausted {
                            url: endpoint.to_string(),
                            attempts: attempt,
                            source,
                        });
                    }
                }
                AttemptOutcome::Unusable(errors) => {
                    let retry = self.retry_on_graphql_errors
                        && self.mode == PollMode::Process
                        && attempt < max_attempts;
                    if !retry {
                        return Err(PollError::NoUsableResponse { errors });
                    }
                }
            }

            attempt += 1;
            tracing::warn!(
                delay_secs = self.retry_delay.as_secs_f64(),
                "Waiting before attempt {attempt} of {max_attempts}"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(PollError::Cancelled),
                () = tokio::time::sleep(self.retry_delay) => {}
            }
        }
    }

    async fn attempt(
        &self,
        endpoint: &str,
        queries: &[IntrospectionQuery],
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<AttemptOutcome, PollError> {
        let mut last_errors = Vec::new();
        let mut connection_error = None;
        let mut reached_server = false;

        for (index, query) in queries.iter().enumerate() {
            if index > 0 {
                tracing::info!(query = %query.label, "Falling back to {} introspection query", query.label);
            }

            let response = match self
                .transport
                .send(endpoint, &query.text, OPERATION_NAME, cancel)
                .await
            {
                Ok(response) => response,
                Err(TransportError::Cancelled) => return Err(PollError::Cancelled),
                Err(e) => {
                    tracing::error!(
                        query = %query.label,
                        error = %e,
                        "Failed to send {} introspection request",
                        query.label
                    );
                    connection_error = Some(e);
                    continue;
                }
            };

            reached_server = true;

            let Some(response) = response else {
                tracing::warn!(query = %query.label, "Introspection response contains no data");
                continue;
            };

            if response.is_usable() {
                tracing::info!(
                    query = %query.label,
                    url = endpoint,
                    "Received {} introspection response",
                    query.label
                );
                return Ok(AttemptOutcome::Usable(PolledSchema {
                    response,
                    query: query.label.clone(),
                    attempt,
                }));
            }

            if response.has_errors() {
                tracing::error!(
                    query = %query.label,
                    "{} introspection response contains errors:",
                    query.label
                );
                for error in response.errors() {
                    tracing::error!(query = %query.label, "{}", error.message);
                }
            } else {
                tracing::warn!(query = %query.label, "Introspection response contains no schema");
            }
            last_errors = response.errors.unwrap_or_default();
        }

        Ok(match connection_error {
            Some(e) if !reached_server => AttemptOutcome::Unreachable(e),
            _ => AttemptOutcome::Unusable(last_errors),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspection_queries;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    type Reply = Box<dyn Fn(usize) -> crate::Result<Option<GraphQLResponse>> + Send + Sync>;

    /// Answers each call from a closure over the call index and records the
    /// queries it was sent.
    #[derive(Clone)]
    struct ScriptedTransport {
        reply: Arc<Reply>,
        calls: Arc<AtomicUsize>,
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedTransport {
        fn new(reply: impl Fn(usize) -> crate::Result<Option<GraphQLResponse>> + Send + Sync + 'static) -> Self {
            Self {
                reply: Arc::new(Box::new(reply)),
                calls: Arc::new(AtomicUsize::new(0)),
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            _endpoint: &str,
            query: &str,
            _operation_name: &str,
            _cancel: &CancellationToken,
        ) -> crate::Result<Option<GraphQLResponse>> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            self.sent.lock().unwrap().push(query.to_string());
            (self.reply)(index)
        }
    }

    fn usable() -> GraphQLResponse {
        serde_json::from_value(json!({ "data": { "__schema": { "types": [] } } })).unwrap()
    }

    fn errors_only() -> GraphQLResponse {
        serde_json::from_value(json!({
            "errors": [{ "message": "Cannot query field \"specifiedByURL\" on type \"__Type\"." }]
        }))
        .unwrap()
    }

    fn refused() -> TransportError {
        TransportError::Network("connection refused".to_string())
    }

    const ENDPOINT: &str = "http://localhost:8088/graphql";

    #[tokio::test]
    async fn test_first_usable_variant_wins() {
        let transport = ScriptedTransport::new(|_| Ok(Some(usable())));
        let poller = IntrospectionPoller::new(transport.clone(), PollMode::DirectUrl);

        let polled = poller
            .poll(ENDPOINT, &introspection_queries(None), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(polled.query, "modern draft");
        assert_eq!(polled.attempt, 1);
        assert_eq!(transport.calls(), 1);
        assert!(polled.schema().is_some_and(serde_json::Value::is_object));
    }

    #[tokio::test]
    async fn test_falls_back_until_a_variant_is_usable() {
        let transport = ScriptedTransport::new(|i| match i {
            0 => Ok(Some(errors_only())),
            1 => Ok(None),
            _ => Ok(Some(usable())),
        });
        let poller = IntrospectionPoller::new(transport.clone(), PollMode::Process);

        let polled = poller
            .poll(ENDPOINT, &introspection_queries(None), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(polled.query, "classic draft");
        assert_eq!(transport.calls(), 3);

        let sent = transport.sent.lock().unwrap();
        let expected: Vec<_> = introspection_queries(None)
            .into_iter()
            .take(3)
            .map(|q| q.text)
            .collect();
        assert_eq!(*sent, expected);
    }

    #[tokio::test]
    async fn test_data_with_errors_is_not_usable() {
        let transport = ScriptedTransport::new(|i| {
            if i == 0 {
                Ok(Some(
                    serde_json::from_value(json!({
                        "data": { "__schema": { "types": [] } },
                        "errors": [{ "message": "partial" }]
                    }))
                    .unwrap(),
                ))
            } else {
                Ok(Some(usable()))
            }
        });
        let poller = IntrospectionPoller::new(transport.clone(), PollMode::DirectUrl);

        let polled = poller
            .poll(ENDPOINT, &introspection_queries(None), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(polled.query, "modern");
    }

    #[tokio::test(start_paused = true)]
    async fn test_graphql_errors_do_not_trigger_outer_retry() {
        let transport = ScriptedTransport::new(|_| Ok(Some(errors_only())));
        let poller = IntrospectionPoller::new(transport.clone(), PollMode::Process);

        let err = poller
            .poll(ENDPOINT, &introspection_queries(None), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            PollError::NoUsableResponse { errors } => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].message.contains("specifiedByURL"));
            }
            other => panic!("expected NoUsableResponse, got {other:?}"),
        }
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_graphql_errors_retry_when_enabled_in_process_mode() {
        let transport = ScriptedTransport::new(|_| Ok(Some(errors_only())));
        let poller = IntrospectionPoller::new(transport.clone(), PollMode::Process)
            .with_max_retries(3)
            .with_retry_on_graphql_errors(true);

        let err = poller
            .poll(ENDPOINT, &introspection_queries(None), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::NoUsableResponse { .. }));
        assert_eq!(transport.calls(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_graphql_errors_never_retry_in_direct_url_mode() {
        let transport = ScriptedTransport::new(|_| Ok(Some(errors_only())));
        let poller = IntrospectionPoller::new(transport.clone(), PollMode::DirectUrl)
            .with_retry_on_graphql_errors(true);

        let err = poller
            .poll(ENDPOINT, &introspection_queries(None), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::NoUsableResponse { .. }));
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test]
    async fn test_unreachable_direct_url_fails_after_one_attempt() {
        let transport = ScriptedTransport::new(|_| Err(refused()));
        let poller = IntrospectionPoller::new(transport.clone(), PollMode::DirectUrl);

        let err = poller
            .poll(ENDPOINT, &introspection_queries(None), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::Unreachable { .. }));
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_service_retries_up_to_bound() {
        let transport = ScriptedTransport::new(|_| Err(refused()));
        let poller = IntrospectionPoller::new(transport.clone(), PollMode::Process);
        let started = tokio::time::Instant::now();

        let err = poller
            .poll(ENDPOINT, &introspection_queries(None), &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            PollError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 10),
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(transport.calls(), 40);
        assert_eq!(started.elapsed(), Duration::from_secs(18));
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_becomes_reachable_on_later_attempt() {
        // Two full attempts of four variants fail, then the service answers.
        let transport = ScriptedTransport::new(|i| if i < 8 { Err(refused()) } else { Ok(Some(usable())) });
        let poller = IntrospectionPoller::new(transport.clone(), PollMode::Process);

        let polled = poller
            .poll(ENDPOINT, &introspection_queries(None), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(polled.attempt, 3);
        assert_eq!(polled.query, "modern draft");
        assert_eq!(transport.calls(), 9);
    }

    #[tokio::test]
    async fn test_reached_server_with_mixed_failures_is_not_retried() {
        let transport = ScriptedTransport::new(|i| if i == 0 { Err(refused()) } else { Ok(Some(errors_only())) });
        let poller = IntrospectionPoller::new(transport.clone(), PollMode::Process);

        let err = poller
            .poll(ENDPOINT, &introspection_queries(None), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::NoUsableResponse { .. }));
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let transport = ScriptedTransport::new(|_| Ok(Some(usable())));
        let poller = IntrospectionPoller::new(transport.clone(), PollMode::Process);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = poller
            .poll(ENDPOINT, &introspection_queries(None), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_backoff() {
        let transport = ScriptedTransport::new(|_| Err(refused()));
        let poller = IntrospectionPoller::new(transport.clone(), PollMode::Process);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = poller
            .poll(ENDPOINT, &introspection_queries(None), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(transport.calls(), 8);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_transport_cancellation_stops_polling() {
        let transport = ScriptedTransport::new(|_| Err(TransportError::Cancelled));
        let poller = IntrospectionPoller::new(transport.clone(), PollMode::Process);

        let err = poller
            .poll(ENDPOINT, &introspection_queries(None), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_custom_query_is_the_only_one_sent() {
        let transport = ScriptedTransport::new(|_| Ok(Some(errors_only())));
        let poller = IntrospectionPoller::new(transport.clone(), PollMode::DirectUrl);
        let queries = introspection_queries(Some("query IntrospectionQuery { __schema { types { name } } }".into()));

        let err = poller
            .poll(ENDPOINT, &queries, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::NoUsableResponse { .. }));
        assert_eq!(transport.calls(), 1);
        assert_eq!(
            transport.sent.lock().unwrap()[0],
            "query IntrospectionQuery { __schema { types { name } } }"
        );
    }
}
