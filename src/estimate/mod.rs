//! Remote fill-level estimation from a photo of the bottle.
//!
//! The service takes `{ "imageDataUrl": ... }` and answers with either
//! `percent_full` (0-100) or `fill_fraction` (0-1). A 429 is retried once,
//! honouring `Retry-After` when present and exponential backoff otherwise.
//! Requests run on a worker thread so a cancelled estimate returns at once;
//! whatever the worker produces afterwards is dropped.

pub mod cancel;
pub mod image;
pub mod retry;
pub mod transport;

pub use cancel::CancellationToken;
pub use retry::{BackoffPolicy, RetryPolicy, parse_retry_after};
pub use transport::{EstimationTransport, HttpTransport, TransportResponse};

use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use thiserror::Error;

use crate::common::constants::CANCEL_POLL_MS;

/// Longest error message carried over from a response body.
const MAX_MESSAGE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimateError {
    #[error("Estimation service is busy, try again in {secs}s", secs = .retry_after.as_secs().max(1))]
    RateLimited { retry_after: Duration },

    #[error("Estimation failed: {message}")]
    Failed { status: Option<u16>, message: String },

    #[error("Estimation cancelled")]
    Cancelled,
}

impl EstimateError {
    /// Cancellation resets quietly; everything else is shown to the user.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, EstimateError::Cancelled)
    }

    fn malformed(status: u16) -> Self {
        EstimateError::Failed {
            status: Some(status),
            message: "Response did not contain a fill level".to_string(),
        }
    }
}

pub struct EstimationClient {
    transport: Arc<dyn EstimationTransport>,
    policy: RetryPolicy,
}

impl EstimationClient {
    pub fn new(transport: Arc<dyn EstimationTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn over_http(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(endpoint, timeout)?;
        Ok(Self::new(Arc::new(transport), RetryPolicy::default()))
    }

    /// Estimate the fill level (percent, 0-100) shown in the image.
    pub fn estimate(
        &self,
        image_data_url: &str,
        token: &CancellationToken,
    ) -> Result<f64, EstimateError> {
        let payload = json!({ "imageDataUrl": image_data_url });
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            if token.is_cancelled() {
                return Err(EstimateError::Cancelled);
            }

            let response = self.send(&payload, token)?;
            if response.is_success() {
                return parse_fill_percent(&response.body)
                    .ok_or_else(|| EstimateError::malformed(response.status));
            }
            if response.status != 429 {
                return Err(EstimateError::Failed {
                    status: Some(response.status),
                    message: extract_message(&response.body, response.status),
                });
            }

            let wait = response
                .retry_after
                .as_deref()
                .and_then(|value| parse_retry_after(value, Utc::now()))
                .unwrap_or_else(|| self.policy.delay_for_attempt(attempt));

            if attempt == attempts || wait > self.policy.max_delay() {
                return Err(EstimateError::RateLimited { retry_after: wait });
            }
            log_debug!("Estimation rate limited, retrying in {} ms", wait.as_millis());
            if !token.sleep(wait) {
                return Err(EstimateError::Cancelled);
            }
        }

        Err(EstimateError::Cancelled)
    }

    /// Run one request on a worker thread, giving up as soon as the token is cancelled.
    fn send(
        &self,
        payload: &Value,
        token: &CancellationToken,
    ) -> Result<TransportResponse, EstimateError> {
        let (tx, rx) = mpsc::channel();
        let transport = Arc::clone(&self.transport);
        let payload = payload.clone();
        std::thread::spawn(move || {
            let _ = tx.send(transport.post(&payload));
        });

        loop {
            if token.is_cancelled() {
                return Err(EstimateError::Cancelled);
            }
            match rx.recv_timeout(Duration::from_millis(CANCEL_POLL_MS)) {
                Ok(Ok(response)) => {
                    if token.is_cancelled() {
                        return Err(EstimateError::Cancelled);
                    }
                    return Ok(response);
                }
                Ok(Err(e)) => {
                    return Err(EstimateError::Failed {
                        status: None,
                        message: format!("{e:#}"),
                    });
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(EstimateError::Failed {
                        status: None,
                        message: "Request worker stopped unexpectedly".to_string(),
                    });
                }
            }
        }
    }
}

/// Read `percent_full` or `fill_fraction` from a success body, as a percentage.
pub fn parse_fill_percent(body: &str) -> Option<f64> {
    let value: Value = serde_json::from_str(body).ok()?;
    let percent = match (value.get("percent_full"), value.get("fill_fraction")) {
        (Some(percent), _) if percent.is_number() => percent.as_f64()?,
        (_, Some(fraction)) if fraction.is_number() => fraction.as_f64()? * 100.0,
        _ => return None,
    };
    percent.is_finite().then(|| percent.clamp(0.0, 100.0))
}

/// Best-effort human message from an error body.
pub fn extract_message(body: &str, status: u16) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message", "detail"] {
            match value.get(key) {
                Some(Value::String(text)) if !text.trim().is_empty() => {
                    return truncate(text.trim());
                }
                Some(Value::Object(inner)) => {
                    if let Some(Value::String(text)) = inner.get("message") {
                        return truncate(text.trim());
                    }
                }
                _ => {}
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed.starts_with('<') {
        format!("HTTP {status}")
    } else {
        truncate(trimmed)
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_MESSAGE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    struct ScriptedTransport {
        responses: Mutex<VecDeque<TransportResponse>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<TransportResponse>) -> Arc<Self> {
            Self::slow(responses, Duration::ZERO)
        }

        fn slow(responses: Vec<TransportResponse>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                delay,
            })
        }
    }

    impl EstimationTransport for ScriptedTransport {
        fn post(&self, payload: &Value) -> anyhow::Result<TransportResponse> {
            assert!(payload["imageDataUrl"].is_string());
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("connection refused"))
        }
    }

    fn response(status: u16, retry_after: Option<&str>, body: &str) -> TransportResponse {
        TransportResponse {
            status,
            retry_after: retry_after.map(str::to_string),
            body: body.to_string(),
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            base_delay_ms: 10,
            jitter_ms: 0,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn test_rate_limit_honours_retry_after_then_succeeds() {
        let transport = ScriptedTransport::new(vec![
            response(429, Some("2"), ""),
            response(200, None, r#"{"percent_full": 67}"#),
        ]);
        let client = EstimationClient::new(transport.clone(), RetryPolicy::default());

        let start = Instant::now();
        let percent = client
            .estimate("data:image/jpeg;base64,AA==", &CancellationToken::new())
            .unwrap();
        assert_eq!(percent, 67.0);
        assert!(start.elapsed() >= Duration::from_millis(2000));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rate_limit_exhausted_reports_wait() {
        let transport = ScriptedTransport::new(vec![
            response(429, None, ""),
            response(429, Some("7"), ""),
        ]);
        let client = EstimationClient::new(transport, fast_policy());
        let error = client
            .estimate("data:,", &CancellationToken::new())
            .unwrap_err();
        assert_eq!(
            error,
            EstimateError::RateLimited {
                retry_after: Duration::from_secs(7)
            }
        );
        assert!(error.is_user_visible());
    }

    #[test]
    fn test_long_retry_after_is_not_waited_out() {
        let transport = ScriptedTransport::new(vec![response(429, Some("90"), "")]);
        let client = EstimationClient::new(transport.clone(), RetryPolicy::default());
        let start = Instant::now();
        let error = client.estimate("data:,", &CancellationToken::new()).unwrap_err();
        assert!(matches!(error, EstimateError::RateLimited { retry_after } if retry_after.as_secs() == 90));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fill_fraction_response() {
        let transport = ScriptedTransport::new(vec![response(200, None, r#"{"fill_fraction": 0.42}"#)]);
        let client = EstimationClient::new(transport, fast_policy());
        let percent = client.estimate("data:,", &CancellationToken::new()).unwrap();
        assert!((percent - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_server_error_carries_status_and_message() {
        let transport = ScriptedTransport::new(vec![response(500, None, r#"{"error": "model offline"}"#)]);
        let client = EstimationClient::new(transport.clone(), fast_policy());
        let error = client.estimate("data:,", &CancellationToken::new()).unwrap_err();
        assert_eq!(
            error,
            EstimateError::Failed {
                status: Some(500),
                message: "model offline".to_string()
            }
        );
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_malformed_success_is_a_failure() {
        let transport = ScriptedTransport::new(vec![response(200, None, r#"{"ok": true}"#)]);
        let client = EstimationClient::new(transport, fast_policy());
        assert!(matches!(
            client.estimate("data:,", &CancellationToken::new()),
            Err(EstimateError::Failed { status: Some(200), .. })
        ));
    }

    #[test]
    fn test_network_error_is_a_failure_without_status() {
        let transport = ScriptedTransport::new(vec![]);
        let client = EstimationClient::new(transport, fast_policy());
        assert!(matches!(
            client.estimate("data:,", &CancellationToken::new()),
            Err(EstimateError::Failed { status: None, .. })
        ));
    }

    #[test]
    fn test_cancelled_before_start() {
        let transport = ScriptedTransport::new(vec![response(200, None, r#"{"percent_full": 10}"#)]);
        let client = EstimationClient::new(transport.clone(), fast_policy());
        let token = CancellationToken::new();
        token.cancel();

        let error = client.estimate("data:,", &token).unwrap_err();
        assert_eq!(error, EstimateError::Cancelled);
        assert!(!error.is_user_visible());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_during_slow_request_returns_promptly() {
        let transport = ScriptedTransport::slow(
            vec![response(200, None, r#"{"percent_full": 80}"#)],
            Duration::from_secs(3),
        );
        let client = EstimationClient::new(transport, fast_policy());
        let token = CancellationToken::new();
        let handle = token.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            handle.cancel();
        });

        let start = Instant::now();
        assert_eq!(client.estimate("data:,", &token), Err(EstimateError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_extract_message_fallbacks() {
        assert_eq!(extract_message(r#"{"detail": "bad image"}"#, 400), "bad image");
        assert_eq!(
            extract_message(r#"{"error": {"message": "quota"}}"#, 403),
            "quota"
        );
        assert_eq!(extract_message("<html>oops</html>", 502), "HTTP 502");
        assert_eq!(extract_message("", 503), "HTTP 503");
        assert_eq!(extract_message("plain text", 400), "plain text");
    }

    #[test]
    fn test_parse_fill_percent_clamps() {
        assert_eq!(parse_fill_percent(r#"{"percent_full": 130}"#), Some(100.0));
        assert_eq!(parse_fill_percent(r#"{"percent_full": "50"}"#), None);
        assert_eq!(parse_fill_percent("nope"), None);
    }
}
