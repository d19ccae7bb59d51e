use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::models::{ExecuteRequest, ExecuteResponse};
use crate::services::UpstreamError;
use crate::utils::snapshot;

/// Fixed delay between status polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Fixed budget of status fetches per submission.
pub const MAX_POLL_ATTEMPTS: u32 = 30;

// Sandbox status ids: 1 = in queue, 2 = processing. Everything else,
// including unknown ids, is terminal.
const STATUS_IN_QUEUE: i32 = 1;
const STATUS_PROCESSING: i32 = 2;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionStatus {
    pub id: i32,
    #[serde(default)]
    pub description: Option<String>,
}

/// Raw submission record as the sandbox reports it. Text fields arrive
/// base64-encoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSubmission {
    #[serde(default)]
    pub status: Option<SubmissionStatus>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub memory: Option<i64>,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

impl RawSubmission {
    fn is_in_flight(&self) -> bool {
        matches!(
            self.status.as_ref().map(|s| s.id),
            Some(STATUS_IN_QUEUE) | Some(STATUS_PROCESSING)
        )
    }
}

/// Seam over the status endpoint so the polling loop can be exercised
/// without a live sandbox.
#[async_trait]
pub trait SubmissionSource {
    async fn fetch(&self, token: &str) -> Result<RawSubmission, UpstreamError>;
}

/// Poll a submission until it reaches a terminal status, the attempt budget
/// runs out, or the caller cancels.
///
/// On budget exhaustion the last observed (possibly still in-progress)
/// record is returned rather than an error: the sandbox may still finish
/// the job and the frontend renders non-terminal statuses as-is.
/// Cancellation likewise returns the last observation and stops polling.
pub async fn poll_until_terminal<S>(
    source: &S,
    token: &str,
    cancel: &CancellationToken,
) -> Result<RawSubmission, UpstreamError>
where
    S: SubmissionSource + ?Sized,
{
    let mut last = source.fetch(token).await?;
    let mut attempts: u32 = 1;

    while last.is_in_flight() {
        if attempts >= MAX_POLL_ATTEMPTS {
            tracing::warn!(
                "Submission {} still in flight after {} polls, returning last observation",
                token,
                attempts
            );
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Polling cancelled for submission {}", token);
                break;
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        last = source.fetch(token).await?;
        attempts += 1;
    }

    Ok(last)
}

/// Collapse a raw submission into the response shape, decoding transport
/// fields. Strict priority: compile error > runtime error > stdout; the
/// three text fields are mutually exclusive in the output.
pub fn shape_result(raw: RawSubmission) -> ExecuteResponse {
    let status = raw.status.and_then(|s| s.description);
    let compile_output = decode_field(raw.compile_output);
    let stderr = decode_field(raw.stderr);
    let stdout = decode_field(raw.stdout);

    if compile_output.is_some() {
        // Compilation never ran the program: time/memory are meaningless.
        return ExecuteResponse {
            status,
            stdout: None,
            stderr: None,
            compile_output,
            time: None,
            memory: None,
            exit_code: raw.exit_code,
        };
    }

    if stderr.is_some() {
        return ExecuteResponse {
            status,
            stdout: None,
            stderr,
            compile_output: None,
            time: raw.time,
            memory: raw.memory,
            exit_code: raw.exit_code,
        };
    }

    ExecuteResponse {
        status,
        stdout,
        stderr: None,
        compile_output: None,
        time: raw.time,
        memory: raw.memory,
        exit_code: raw.exit_code,
    }
}

/// Decode a base64 transport field; malformed or empty content counts as
/// absent.
fn decode_field(field: Option<String>) -> Option<String> {
    let decoded = snapshot::decode_optional(field.as_deref())?;
    if decoded.is_empty() {
        None
    } else {
        Some(decoded)
    }
}

/// Human-readable language name for a sandbox language id, used when
/// assembling prompts.
pub fn language_name(language_id: i32) -> Option<&'static str> {
    let name = match language_id {
        50 => "C",
        51 => "C#",
        54 => "C++",
        60 => "Go",
        62 => "Java",
        63 => "JavaScript",
        68 => "PHP",
        71 => "Python",
        72 => "Ruby",
        73 => "Rust",
        74 => "TypeScript",
        78 => "Kotlin",
        _ => return None,
    };
    Some(name)
}

#[derive(Serialize)]
struct SubmitPayload<'a> {
    language_id: i32,
    source_code: &'a str,
    stdin: &'a str,
}

#[derive(Deserialize)]
struct SubmitResponse {
    token: String,
}

/// Client for the remote execution sandbox (Judge0-compatible API).
pub struct SandboxClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SandboxClient {
    pub fn new(http: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    /// Submit code for execution. A non-2xx sandbox response surfaces as an
    /// upstream failure and is not retried by this layer.
    pub async fn submit(
        &self,
        language_id: i32,
        source_code: &str,
        stdin: &str,
    ) -> Result<String, UpstreamError> {
        let url = format!("{}/submissions", self.base_url);
        let payload = SubmitPayload {
            language_id,
            source_code,
            stdin,
        };

        let mut request = self.http.post(&url).json(&payload);
        request = self.attach_auth(request);

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(UpstreamError::from_response("sandbox", response).await);
        }

        let body: SubmitResponse = response.json().await?;
        Ok(body.token)
    }

    /// Submit and wait for completion, returning the shaped result.
    pub async fn execute(
        &self,
        req: &ExecuteRequest,
        cancel: &CancellationToken,
    ) -> Result<ExecuteResponse, UpstreamError> {
        let token = self
            .submit(req.language_id, &req.source_code, &req.stdin)
            .await?;

        tracing::debug!("Sandbox accepted submission, token={}", token);

        let raw = poll_until_terminal(self, &token, cancel).await?;
        Ok(shape_result(raw))
    }

    fn attach_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let Some(key) = &self.api_key else {
            return request;
        };

        let mut request = request.header("X-RapidAPI-Key", key);
        if let Some(host) = reqwest::Url::parse(&self.base_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
        {
            request = request.header("X-RapidAPI-Host", host);
        }
        request
    }
}

#[async_trait]
impl SubmissionSource for SandboxClient {
    async fn fetch(&self, token: &str) -> Result<RawSubmission, UpstreamError> {
        let url = format!("{}/submissions/{}?base64_encoded=true", self.base_url, token);

        let mut request = self.http.get(&url);
        request = self.attach_auth(request);

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(UpstreamError::from_response("sandbox", response).await);
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn in_flight(id: i32) -> RawSubmission {
        RawSubmission {
            status: Some(SubmissionStatus {
                id,
                description: Some("Processing".to_string()),
            }),
            ..Default::default()
        }
    }

    fn terminal(description: &str) -> RawSubmission {
        RawSubmission {
            status: Some(SubmissionStatus {
                id: 3,
                description: Some(description.to_string()),
            }),
            stdout: Some(snapshot::encode("hola\n")),
            time: Some("0.002".to_string()),
            memory: Some(3800),
            exit_code: Some(0),
            ..Default::default()
        }
    }

    /// Reports in-flight for a fixed number of fetches, then terminal.
    struct ScriptedSource {
        in_flight_rounds: u32,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        fn new(in_flight_rounds: u32) -> Self {
            Self {
                in_flight_rounds,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SubmissionSource for ScriptedSource {
        async fn fetch(&self, _token: &str) -> Result<RawSubmission, UpstreamError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.in_flight_rounds {
                Ok(in_flight(2))
            } else {
                Ok(terminal("Accepted"))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_terminal_status() {
        let source = ScriptedSource::new(5);
        let cancel = CancellationToken::new();

        let result = poll_until_terminal(&source, "tok", &cancel).await.unwrap();

        assert_eq!(source.calls(), 6);
        assert_eq!(result.status.unwrap().id, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_status_ends_polling_immediately() {
        struct UnknownStatus;

        #[async_trait]
        impl SubmissionSource for UnknownStatus {
            async fn fetch(&self, _token: &str) -> Result<RawSubmission, UpstreamError> {
                Ok(in_flight(99))
            }
        }

        let cancel = CancellationToken::new();
        let result = poll_until_terminal(&UnknownStatus, "tok", &cancel)
            .await
            .unwrap();
        assert_eq!(result.status.unwrap().id, 99);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhaustion_returns_last_observation() {
        let source = ScriptedSource::new(1000);
        let cancel = CancellationToken::new();

        let result = poll_until_terminal(&source, "tok", &cancel).await.unwrap();

        assert_eq!(source.calls(), MAX_POLL_ATTEMPTS);
        assert!(result.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling_between_rounds() {
        let source = ScriptedSource::new(1000);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = poll_until_terminal(&source, "tok", &cancel).await.unwrap();

        assert_eq!(source.calls(), 1);
        assert!(result.is_in_flight());
    }

    #[test]
    fn compile_output_wins_over_everything() {
        let raw = RawSubmission {
            status: Some(SubmissionStatus {
                id: 6,
                description: Some("Compilation Error".to_string()),
            }),
            stdout: Some(snapshot::encode("partial")),
            stderr: Some(snapshot::encode("boom")),
            compile_output: Some(snapshot::encode("error: expected `;`")),
            time: Some("0.001".to_string()),
            memory: Some(1200),
            exit_code: Some(1),
        };

        let shaped = shape_result(raw);
        assert_eq!(shaped.compile_output.as_deref(), Some("error: expected `;`"));
        assert_eq!(shaped.stdout, None);
        assert_eq!(shaped.stderr, None);
        assert_eq!(shaped.time, None);
        assert_eq!(shaped.memory, None);
        assert_eq!(shaped.exit_code, Some(1));
    }

    #[test]
    fn stderr_nulls_stdout_but_keeps_timing() {
        let raw = RawSubmission {
            status: Some(SubmissionStatus {
                id: 11,
                description: Some("Runtime Error (NZEC)".to_string()),
            }),
            stdout: Some(snapshot::encode("partial")),
            stderr: Some(snapshot::encode("Traceback: división por cero")),
            time: Some("0.031".to_string()),
            memory: Some(9120),
            exit_code: Some(1),
            ..Default::default()
        };

        let shaped = shape_result(raw);
        assert_eq!(
            shaped.stderr.as_deref(),
            Some("Traceback: división por cero")
        );
        assert_eq!(shaped.stdout, None);
        assert_eq!(shaped.compile_output, None);
        assert_eq!(shaped.time.as_deref(), Some("0.031"));
        assert_eq!(shaped.memory, Some(9120));
    }

    #[test]
    fn success_decodes_stdout() {
        let shaped = shape_result(terminal("Accepted"));
        assert_eq!(shaped.status.as_deref(), Some("Accepted"));
        assert_eq!(shaped.stdout.as_deref(), Some("hola\n"));
        assert_eq!(shaped.stderr, None);
        assert_eq!(shaped.compile_output, None);
    }

    #[test]
    fn success_with_no_output_is_valid() {
        let raw = RawSubmission {
            status: Some(SubmissionStatus {
                id: 3,
                description: Some("Accepted".to_string()),
            }),
            ..Default::default()
        };

        let shaped = shape_result(raw);
        assert_eq!(shaped.stdout, None);
        assert_eq!(shaped.stderr, None);
        assert_eq!(shaped.compile_output, None);
    }

    #[test]
    fn malformed_transport_fields_count_as_absent() {
        let raw = RawSubmission {
            status: Some(SubmissionStatus {
                id: 3,
                description: Some("Accepted".to_string()),
            }),
            compile_output: Some("not//valid//base64!!".to_string()),
            stdout: Some(snapshot::encode("ok")),
            ..Default::default()
        };

        let shaped = shape_result(raw);
        assert_eq!(shaped.compile_output, None);
        assert_eq!(shaped.stdout.as_deref(), Some("ok"));
    }

    #[test]
    fn language_catalog_resolves_common_ids() {
        assert_eq!(language_name(63), Some("JavaScript"));
        assert_eq!(language_name(71), Some("Python"));
        assert_eq!(language_name(-1), None);
    }
}
