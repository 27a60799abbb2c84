//! Request executor: circuit admission, attempts and retries for one call
//!
//! Every generated operation funnels through [`RequestExecutor::execute`],
//! which runs the call as a strictly sequential series of attempts:
//!
//! 1. render the URL and headers (invalid requests fail before admission)
//! 2. ask the breaker for a permit; a rejection ends the call
//! 3. perform one transport attempt under the per-attempt timeout
//! 4. record the outcome on the breaker and log an attempt record
//! 5. ask the retry policy; sleep the next backoff and go to 2, or stop
//!
//! No permit is held while sleeping, so a backing-off call does not occupy a
//! concurrency slot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::time::Instant;
use tollgate_common::error::TransportError;
use tollgate_common::observability::{AttemptRecord, CallLogger, SpanKind, Tracer};
use tollgate_common::resilience::{AttemptContext, CallOutcome, CircuitBreaker, RetryPolicy};
use tracing::{debug, instrument, warn};
use url::Url;

use super::errors::ExecuteError;
use super::request::OperationRequest;
use super::response::RawResponse;
use crate::http::{Transport, TransportRequest, TransportResponse};

/// Shared, immutable execution context of one client
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    service: Arc<str>,
    base_url: Url,
    transport: Arc<dyn Transport>,
    breaker: CircuitBreaker,
    retry_policy: Arc<dyn RetryPolicy>,
    timeout: Duration,
    logger: Arc<dyn CallLogger>,
    tracer: Option<Arc<dyn Tracer>>,
}

impl RequestExecutor {
    pub fn new(
        base_url: Url,
        transport: Arc<dyn Transport>,
        breaker: CircuitBreaker,
        retry_policy: Arc<dyn RetryPolicy>,
        logger: Arc<dyn CallLogger>,
    ) -> Self {
        Self {
            service: Arc::from(breaker.name()),
            base_url,
            transport,
            breaker,
            retry_policy,
            timeout: Duration::from_millis(5000),
            logger,
            tracer: None,
        }
    }

    /// Per-attempt deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one logical call to completion.
    ///
    /// # Errors
    ///
    /// - [`ExecuteError::InvalidRequest`] before any admission or network
    ///   activity
    /// - [`ExecuteError::OpenCircuit`] / [`ExecuteError::CommandRejected`]
    ///   when the breaker refuses an attempt
    /// - [`ExecuteError::Transport`] when the last attempt got no response
    ///
    /// Any HTTP response, whatever its status, is returned as `Ok`.
    #[instrument(
        skip(self, request),
        fields(service = %self.service, operation = request.operation(), method = %request.method())
    )]
    pub async fn execute(&self, request: &OperationRequest) -> Result<RawResponse, ExecuteError> {
        let url = request.render(&self.base_url)?;
        let mut headers = request.header_map()?;

        let span = match &self.tracer {
            Some(tracer) => {
                let metadata = HashMap::from([
                    ("service".to_string(), self.service.to_string()),
                    ("operation".to_string(), request.operation().to_string()),
                    ("url".to_string(), url.to_string()),
                ]);
                let mut span = tracer.start_span(&request.span_name(), metadata).await;
                span.kind = SpanKind::Client;

                let mut carrier = HashMap::new();
                tracer.inject(&span, &mut carrier);
                merge_headers(&mut headers, carrier);
                Some(span)
            }
            None => None,
        };

        let result = self.run_attempts(request, url, headers).await;

        if let Some(span) = span {
            span.finish();
        }
        result
    }

    async fn run_attempts(
        &self,
        request: &OperationRequest,
        url: Url,
        headers: HeaderMap,
    ) -> Result<RawResponse, ExecuteError> {
        let method = request.method();
        let backoffs = self.retry_policy.backoffs();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let permit = self.breaker.admit().map_err(|rejection| {
                debug!(attempt, reason = %rejection, "attempt rejected by circuit breaker");
                ExecuteError::from(rejection)
            })?;

            let transport_request = TransportRequest {
                method: method.clone(),
                url: url.clone(),
                headers: headers.clone(),
                body: request.body().map(<[u8]>::to_vec),
                timeout: Some(self.timeout),
            };

            let started = Instant::now();
            let outcome = self.attempt(transport_request).await;
            let latency = started.elapsed();

            let retries_used = (attempt - 1) as usize;
            match outcome {
                Ok(response) => {
                    permit.complete(CallOutcome::from_status(response.status));
                    self.logger.log_attempt(&AttemptRecord::response(
                        self.service.as_ref(),
                        method.as_str(),
                        url.as_str(),
                        attempt,
                        response.status.as_u16(),
                        latency,
                    ));

                    let context = AttemptContext::response(method, response.status, attempt);
                    if let Some(delay) = self.next_backoff(&context, &backoffs, retries_used) {
                        let status = response.status.as_u16();
                        debug!(attempt, status, delay_ms = millis(delay), "retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return Ok(RawResponse {
                        status: response.status,
                        headers: response.headers,
                        body: response.body,
                        attempts: attempt,
                    });
                }
                Err(err) => {
                    permit.complete(CallOutcome::from_transport_error(&err));
                    self.logger.log_attempt(&AttemptRecord::transport_failure(
                        self.service.as_ref(),
                        method.as_str(),
                        url.as_str(),
                        attempt,
                        err.to_string(),
                        latency,
                    ));

                    let context = AttemptContext::transport_failure(method, &err, attempt);
                    if let Some(delay) = self.next_backoff(&context, &backoffs, retries_used) {
                        debug!(attempt, error = %err, delay_ms = millis(delay), "retrying");
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    warn!(attempt, error = %err, "call failed");
                    return Err(ExecuteError::Transport(err));
                }
            }
        }
    }

    async fn attempt(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        match tokio::time::timeout(self.timeout, self.transport.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::timeout(self.timeout)),
        }
    }

    /// The policy is always consulted; a `true` past the end of the backoff
    /// list still ends the call.
    fn next_backoff(
        &self,
        context: &AttemptContext<'_>,
        backoffs: &[Duration],
        retries_used: usize,
    ) -> Option<Duration> {
        let wanted = self.retry_policy.should_retry(context);
        match backoffs.get(retries_used) {
            Some(delay) if wanted => Some(*delay),
            _ => None,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn merge_headers(headers: &mut HeaderMap, carrier: HashMap<String, String>) {
    for (name, value) in carrier {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => debug!(header = %name, "skipping invalid trace header"),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Executor behavior against a scripted transport
    //!
    //! Tests run with paused tokio time, so backoff sleeps and attempt
    //! timeouts complete instantly while gaps stay measurable.

    use reqwest::Method;
    use tollgate_common::error::TransportErrorKind;
    use tollgate_common::resilience::{CircuitConfig, CircuitState, FnRetryPolicy, RetryPreset};
    use tollgate_common::testing::{RecordingCallLogger, RecordingTracer};

    use super::*;
    use crate::testing::{Scripted, ScriptedTransport};

    struct Harness {
        executor: RequestExecutor,
        transport: ScriptedTransport,
        logger: RecordingCallLogger,
    }

    fn harness(
        script: Vec<Scripted>,
        policy: Arc<dyn RetryPolicy>,
        config: CircuitConfig,
    ) -> Harness {
        let transport = ScriptedTransport::new(script);
        let logger = RecordingCallLogger::new();
        let breaker = CircuitBreaker::new("petstore", config).expect("valid config");
        let executor = RequestExecutor::new(
            Url::parse("http://pets.internal").unwrap(),
            Arc::new(transport.clone()),
            breaker,
            policy,
            Arc::new(logger.clone()),
        );
        Harness { executor, transport, logger }
    }

    fn strict() -> CircuitConfig {
        CircuitConfig::builder().force_closed(false).build().expect("valid config")
    }

    fn get_pet(id: &str) -> OperationRequest {
        OperationRequest::new("getPet", Method::GET, "/pets/{petId}").path_param("petId", id)
    }

    fn create_pet() -> OperationRequest {
        OperationRequest::new("createPet", Method::POST, "/pets")
            .json(&serde_json::json!({"name": "Rex"}))
            .unwrap()
    }

    /// Within ±5% of `nominal_ms`; the paused clock rounds timers up to
    /// the next millisecond.
    fn within(actual: Duration, nominal_ms: u64) -> bool {
        let nominal = nominal_ms as f64;
        let actual = actual.as_secs_f64() * 1000.0;
        actual >= nominal * 0.95 && actual <= nominal * 1.05 + 1.0
    }

    fn about(actual: Duration, expected_ms: u64) -> bool {
        let expected = Duration::from_millis(expected_ms);
        actual >= expected && actual <= expected + Duration::from_millis(1)
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_retries_server_errors_until_success() {
        let h = harness(
            vec![Scripted::status(500), Scripted::status(500), Scripted::json(200, "{}")],
            RetryPreset::Exponential.policy(),
            CircuitConfig::default(),
        );

        let response = h.executor.execute(&get_pet("1")).await.unwrap();

        assert_eq!(response.status.as_u16(), 200);
        assert_eq!(response.attempts, 3);
        let gaps = h.transport.gaps();
        assert_eq!(gaps.len(), 2);
        assert!(within(gaps[0], 100), "first backoff {:?}", gaps[0]);
        assert!(within(gaps[1], 200), "second backoff {:?}", gaps[1]);

        let attempts = h.logger.attempts();
        let statuses: Vec<_> = attempts.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![Some(500), Some(500), Some(200)]);
        assert_eq!(attempts[2].attempt, 3);
        assert_eq!(attempts[0].uri, "http://pets.internal/pets/1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_is_never_retried_by_single() {
        let h = harness(
            vec![Scripted::status(500), Scripted::json(201, "{}")],
            RetryPreset::Single.policy(),
            CircuitConfig::default(),
        );

        let response = h.executor.execute(&create_pet()).await.unwrap();

        assert_eq!(response.status.as_u16(), 500);
        assert_eq!(response.attempts, 1);
        assert_eq!(h.transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_retries_once_then_returns_last_response() {
        let h = harness(
            vec![Scripted::status(503)],
            RetryPreset::Single.policy(),
            CircuitConfig::default(),
        );

        let response = h.executor.execute(&get_pet("1")).await.unwrap();

        assert_eq!(response.status.as_u16(), 503);
        assert_eq!(h.transport.request_count(), 2);
        let gaps = h.transport.gaps();
        assert_eq!(gaps.len(), 1);
        assert!(about(gaps[0], 1000), "backoff {:?}", gaps[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_are_not_retried_by_presets() {
        let h = harness(
            vec![Scripted::Fail(TransportError::connect("connection refused"))],
            RetryPreset::Exponential.policy(),
            CircuitConfig::default(),
        );

        let err = h.executor.execute(&get_pet("1")).await.unwrap_err();

        assert!(matches!(
            err,
            ExecuteError::Transport(ref e) if e.kind() == TransportErrorKind::Connect
        ));
        assert_eq!(h.transport.request_count(), 1);
        assert_eq!(h.executor.breaker().health().failures, 1);

        let attempts = h.logger.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, None);
        assert!(attempts[0].message.contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_policy_may_retry_transport_errors() {
        let policy = FnRetryPolicy::new(vec![Duration::from_millis(50); 2], |ctx| {
            ctx.transport_error.is_some()
        });
        let h = harness(
            vec![
                Scripted::Fail(TransportError::connect("reset")),
                Scripted::Fail(TransportError::connect("reset")),
                Scripted::json(200, "{}"),
            ],
            Arc::new(policy),
            CircuitConfig::default(),
        );

        let response = h.executor.execute(&get_pet("1")).await.unwrap();
        assert_eq!(response.attempts, 3);
        assert!(h.transport.gaps().iter().all(|gap| about(*gap, 50)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_true_past_backoffs_stops() {
        let policy = FnRetryPolicy::new(vec![Duration::from_millis(10)], |_| true);
        let h = harness(vec![Scripted::status(500)], Arc::new(policy), CircuitConfig::default());

        let response = h.executor.execute(&get_pet("1")).await.unwrap();
        assert_eq!(response.attempts, 2);
        assert_eq!(h.transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_times_out_and_counts_as_timeout() {
        let h = harness(
            vec![Scripted::status(200).delayed(Duration::from_secs(30))],
            RetryPreset::None.policy(),
            CircuitConfig::default(),
        );
        let executor = h.executor.clone().with_timeout(Duration::from_millis(250));

        let started = Instant::now();
        let err = executor.execute(&get_pet("1")).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(about(started.elapsed(), 250));
        let health = executor.breaker().health();
        assert_eq!(health.timeouts, 1);
        assert_eq!(health.error_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_short_circuits_without_transport() {
        let h = harness(
            vec![Scripted::Fail(TransportError::connect("connection refused"))],
            RetryPreset::Single.policy(),
            strict(),
        );

        for _ in 0..20 {
            let err = h.executor.execute(&get_pet("1")).await.unwrap_err();
            assert!(matches!(err, ExecuteError::Transport(_)));
        }
        assert_eq!(h.executor.breaker().state(), CircuitState::Open);

        let err = h.executor.execute(&get_pet("1")).await.unwrap_err();
        assert!(matches!(err, ExecuteError::OpenCircuit { ref service } if service == "petstore"));
        assert_eq!(h.transport.request_count(), 20);
        assert_eq!(h.logger.attempts().len(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_never_open_the_circuit() {
        let h = harness(vec![Scripted::status(404)], RetryPreset::Single.policy(), strict());

        for _ in 0..20 {
            let response = h.executor.execute(&get_pet("1")).await.unwrap();
            assert_eq!(response.status.as_u16(), 404);
        }

        assert_eq!(h.executor.breaker().state(), CircuitState::Closed);
        let health = h.executor.breaker().health();
        assert_eq!(health.request_count, 20);
        assert_eq!(health.error_count, 0);
        assert_eq!(h.transport.request_count(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_path_fails_before_admission() {
        let h = harness(vec![Scripted::status(200)], RetryPreset::Single.policy(), strict());

        let err = h.executor.execute(&get_pet("")).await.unwrap_err();

        assert!(matches!(err, ExecuteError::InvalidRequest(_)));
        assert_eq!(h.transport.request_count(), 0);
        assert_eq!(h.executor.breaker().health().request_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracer_span_is_injected_into_every_attempt() {
        let h = harness(
            vec![Scripted::status(502), Scripted::status(200)],
            RetryPreset::Single.policy(),
            CircuitConfig::default(),
        );
        let tracer = RecordingTracer::new();
        let executor = h.executor.clone().with_tracer(Arc::new(tracer.clone()));

        executor.execute(&get_pet("9")).await.unwrap();

        assert_eq!(tracer.operations(), vec!["GET /pets/{petId}".to_string()]);
        let requests = h.transport.requests();
        assert_eq!(requests.len(), 2);
        for request in requests {
            let header = request.headers.get("traceparent").expect("traceparent header");
            assert_eq!(header.to_str().unwrap(), RecordingTracer::expected_traceparent());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeping_call_does_not_hold_a_slot() {
        let config = CircuitConfig::builder()
            .force_closed(false)
            .max_concurrent_requests(1)
            .build()
            .unwrap();
        let h = harness(
            vec![Scripted::status(500), Scripted::json(200, "{}")],
            RetryPreset::Single.policy(),
            config,
        );

        let executor = h.executor.clone();
        let call = tokio::spawn(async move { executor.execute(&get_pet("1")).await });

        // First attempt done, call is now sleeping its 1000ms backoff
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(h.executor.breaker().health().concurrent_requests, 0);
        let permit = h.executor.breaker().admit().expect("slot is free during backoff");
        drop(permit);

        let response = call.await.unwrap().unwrap();
        assert_eq!(response.status.as_u16(), 200);
    }
}
