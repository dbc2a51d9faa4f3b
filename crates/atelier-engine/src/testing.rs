use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use atelier_contracts::{StudioError, StudioResult};
use serde_json::Value;

use crate::credentials::Credential;
use crate::poller::{CancelToken, PollClock};
use crate::transport::{FetchedArtifact, ProviderTransport};

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: &'static str,
    pub target: String,
    pub payload: Option<Value>,
    pub credential: String,
}

/// Replays queued responses in order and records every call made.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<StudioResult<Value>>>,
    fetches: Mutex<VecDeque<StudioResult<FetchedArtifact>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, value: Value) {
        self.responses.lock().unwrap().push_back(Ok(value));
    }

    pub fn push_err(&self, err: StudioError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn push_fetch(&self, bytes: &[u8], mime_type: Option<&str>) {
        self.fetches.lock().unwrap().push_back(Ok(FetchedArtifact {
            bytes: bytes.to_vec(),
            mime_type: mime_type.map(str::to_string),
        }));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_payload(&self) -> Value {
        self.calls()
            .last()
            .and_then(|call| call.payload.clone())
            .unwrap_or(Value::Null)
    }

    fn record(
        &self,
        method: &'static str,
        target: &str,
        payload: Option<&Value>,
        credential: &Credential,
    ) {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            target: target.to_string(),
            payload: payload.cloned(),
            credential: credential.expose().to_string(),
        });
    }

    fn next_response(&self) -> StudioResult<Value> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(StudioError::provider("scripted", None, "script exhausted")))
    }
}

impl ProviderTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate_content(
        &self,
        model: &str,
        payload: &Value,
        credential: &Credential,
    ) -> StudioResult<Value> {
        self.record("generate_content", model, Some(payload), credential);
        self.next_response()
    }

    fn submit_video(
        &self,
        model: &str,
        payload: &Value,
        credential: &Credential,
    ) -> StudioResult<Value> {
        self.record("submit_video", model, Some(payload), credential);
        self.next_response()
    }

    fn operation_status(&self, operation: &str, credential: &Credential) -> StudioResult<Value> {
        self.record("operation_status", operation, None, credential);
        self.next_response()
    }

    fn fetch_artifact(&self, uri: &str, credential: &Credential) -> StudioResult<FetchedArtifact> {
        self.record("fetch_artifact", uri, None, credential);
        self.fetches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(StudioError::provider("scripted", None, "no fetch scripted")))
    }
}

/// Virtual time: `sleep` advances the clock instantly and records the requested duration.
#[derive(Default)]
pub(crate) struct ManualClock {
    now: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
    cancel_at: Mutex<Option<(usize, CancelToken)>>,
}

impl ManualClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    /// Fires `token` during the `n`th sleep, which then reports cancellation.
    pub fn cancel_after_sleeps(&self, n: usize, token: CancelToken) {
        *self.cancel_at.lock().unwrap() = Some((n, token));
    }
}

impl PollClock for ManualClock {
    fn elapsed(&self) -> Duration {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool {
        let count = {
            let mut sleeps = self.sleeps.lock().unwrap();
            sleeps.push(duration);
            sleeps.len()
        };
        *self.now.lock().unwrap() += duration;
        if let Some((n, token)) = self.cancel_at.lock().unwrap().as_ref() {
            if *n == count {
                token.cancel();
            }
        }
        !cancel.is_cancelled()
    }
}
