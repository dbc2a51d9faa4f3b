use std::thread;
use std::time::Duration;

use atelier_contracts::{StudioError, StudioResult};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use crate::config::StudioConfig;
use crate::credentials::Credential;

const PROVIDER: &str = "Gemini";

/// Which provider call produced a failure. Classification depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderCall {
    GenerateContent,
    SubmitVideo,
    OperationStatus,
    FetchArtifact,
}

#[derive(Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl std::fmt::Debug for FetchedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedArtifact")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Outbound calls to the generative provider. Every raw failure leaves this boundary already
/// classified into a [`StudioError`] kind.
pub trait ProviderTransport: Send + Sync {
    fn name(&self) -> &str;

    fn generate_content(
        &self,
        model: &str,
        payload: &Value,
        credential: &Credential,
    ) -> StudioResult<Value>;

    fn submit_video(&self, model: &str, payload: &Value, credential: &Credential)
        -> StudioResult<Value>;

    fn operation_status(&self, operation: &str, credential: &Credential) -> StudioResult<Value>;

    fn fetch_artifact(&self, uri: &str, credential: &Credential) -> StudioResult<FetchedArtifact>;
}

pub struct GeminiTransport {
    api_base: String,
    http: HttpClient,
    request_timeout: Duration,
    transport_retries: usize,
    retry_backoff: Duration,
}

impl GeminiTransport {
    pub fn new(config: &StudioConfig) -> Self {
        Self {
            api_base: config.api_base.clone(),
            http: HttpClient::new(),
            request_timeout: config.request_timeout,
            transport_retries: config.transport_retries,
            retry_backoff: config.retry_backoff,
        }
    }

    fn model_endpoint(&self, model: &str, method: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:{}", self.api_base, model_path, method)
    }

    fn operation_endpoint(&self, operation: &str) -> String {
        format!("{}/{}", self.api_base, operation.trim().trim_start_matches('/'))
    }

    fn send_with_transport_retries(
        &self,
        call: ProviderCall,
        endpoint: &str,
        build: impl Fn() -> RequestBuilder,
    ) -> StudioResult<HttpResponse> {
        for attempt in 0..=self.transport_retries {
            match build().timeout(self.request_timeout).send() {
                Ok(response) => return Ok(response),
                Err(err) => {
                    if !is_retryable_transport_error(&err) || attempt >= self.transport_retries {
                        return Err(StudioError::provider(
                            PROVIDER,
                            None,
                            format!("{call:?} transport failure ({endpoint}): {err}"),
                        ));
                    }
                    tracing::warn!(
                        ?call,
                        attempt = attempt + 1,
                        max = self.transport_retries,
                        "transient transport failure, retrying: {err}"
                    );
                    thread::sleep(self.retry_backoff.mul_f64(attempt as f64 + 1.0));
                }
            }
        }

        unreachable!("transport retry loop always returns a response or error")
    }

    fn post_json(
        &self,
        call: ProviderCall,
        endpoint: &str,
        payload: &Value,
        credential: &Credential,
    ) -> StudioResult<Value> {
        tracing::debug!(?call, endpoint, "provider POST");
        let response = self.send_with_transport_retries(call, endpoint, || {
            self.http
                .post(endpoint)
                .query(&[("key", credential.expose())])
                .json(payload)
        })?;
        response_json_or_error(call, response)
    }
}

impl ProviderTransport for GeminiTransport {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_content(
        &self,
        model: &str,
        payload: &Value,
        credential: &Credential,
    ) -> StudioResult<Value> {
        let endpoint = self.model_endpoint(model, "generateContent");
        self.post_json(ProviderCall::GenerateContent, &endpoint, payload, credential)
    }

    fn submit_video(
        &self,
        model: &str,
        payload: &Value,
        credential: &Credential,
    ) -> StudioResult<Value> {
        let endpoint = self.model_endpoint(model, "predictLongRunning");
        self.post_json(ProviderCall::SubmitVideo, &endpoint, payload, credential)
    }

    fn operation_status(&self, operation: &str, credential: &Credential) -> StudioResult<Value> {
        let endpoint = self.operation_endpoint(operation);
        tracing::debug!(endpoint, "operation status check");
        let response =
            self.send_with_transport_retries(ProviderCall::OperationStatus, &endpoint, || {
                self.http
                    .get(&endpoint)
                    .query(&[("key", credential.expose())])
            })?;
        response_json_or_error(ProviderCall::OperationStatus, response)
    }

    fn fetch_artifact(&self, uri: &str, credential: &Credential) -> StudioResult<FetchedArtifact> {
        tracing::debug!(uri, "fetching generated artifact");
        let response = self.send_with_transport_retries(ProviderCall::FetchArtifact, uri, || {
            self.http.get(uri).query(&[("key", credential.expose())])
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_failure(
                ProviderCall::FetchArtifact,
                status.as_u16(),
                &body,
            ));
        }
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(';').next().unwrap_or(value).trim().to_string())
            .filter(|value| !value.is_empty());
        let bytes = response
            .bytes()
            .map_err(|err| {
                StudioError::provider(PROVIDER, None, format!("artifact body read failed: {err}"))
            })?
            .to_vec();
        Ok(FetchedArtifact { bytes, mime_type })
    }
}

fn response_json_or_error(call: ProviderCall, response: HttpResponse) -> StudioResult<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response.text().map_err(|err| {
        StudioError::provider(PROVIDER, Some(code), format!("response body read failed: {err}"))
    })?;
    if !status.is_success() {
        return Err(classify_failure(call, code, &body));
    }
    serde_json::from_str(&body).map_err(|err| {
        StudioError::provider(
            PROVIDER,
            Some(code),
            format!("invalid JSON payload: {err}"),
        )
    })
}

/// Maps an HTTP failure onto the closed error set using the status code and the structured
/// `error` object Google APIs return (`code`, `status`, `details[].reason`).
pub fn classify_failure(call: ProviderCall, status: u16, body: &str) -> StudioError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let error = parsed.get("error").cloned().unwrap_or(Value::Null);
    let api_status = error
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let key_rejected = error
        .get("details")
        .and_then(Value::as_array)
        .map(|details| {
            details.iter().any(|detail| {
                matches!(
                    detail.get("reason").and_then(Value::as_str),
                    Some("API_KEY_INVALID" | "API_KEY_SERVICE_BLOCKED" | "API_KEY_EXPIRED")
                )
            })
        })
        .unwrap_or(false);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| truncate_text(body.trim(), 512));

    let credential_problem = key_rejected
        || matches!(status, 401 | 403)
        || matches!(api_status, "UNAUTHENTICATED" | "PERMISSION_DENIED")
        // Veo answers NOT_FOUND when the selected key's project has no access to the model.
        || (call == ProviderCall::SubmitVideo && (status == 404 || api_status == "NOT_FOUND"));
    if credential_problem {
        return StudioError::CredentialMissing(message);
    }
    StudioError::provider(PROVIDER, Some(status), message)
}

fn is_retryable_transport_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
