//! Long-running job polling for video generation.
//!
//! A submitted job moves Submitted → Polling immediately. Each round waits one fixed interval,
//! then issues exactly one status check. A done report resolves the job when it carries an
//! artifact reference and fails it otherwise. The wait is bounded by [`PollPolicy::max_wait`],
//! and every suspension point observes the [`CancelToken`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use atelier_contracts::events::{EventLog, EventPayload};
use atelier_contracts::{StudioError, StudioResult};
use serde_json::{json, Value};

use crate::credentials::Credential;
use crate::transport::ProviderTransport;

const OPERATION_LABEL: &str = "video generation";
const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Time source for the poll loop.
pub trait PollClock: Send + Sync {
    /// Monotonic time since the clock was created.
    fn elapsed(&self) -> Duration;
    /// Waits `duration`. Returns `false` if `cancel` fired before the wait finished.
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool;
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl PollClock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }
}

/// Snapshot of a provider long-running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub name: String,
    pub done: bool,
    pub artifact_uri: Option<String>,
    pub error: Option<String>,
}

impl JobHandle {
    pub fn from_operation(value: &Value) -> StudioResult<Self> {
        let name = value
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                StudioError::provider("Gemini", None, "operation response carried no name")
            })?
            .to_string();
        let done = value.get("done").and_then(Value::as_bool).unwrap_or(false);
        let error = value.get("error").filter(|error| !error.is_null()).map(|error| {
            error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string())
        });
        Ok(Self {
            name,
            done,
            artifact_uri: extract_video_uri(value),
            error,
        })
    }
}

fn extract_video_uri(operation: &Value) -> Option<String> {
    let response = operation.get("response")?;
    let samples = response
        .get("generateVideoResponse")
        .and_then(|inner| inner.get("generatedSamples"))
        .or_else(|| response.get("generatedVideos"))
        .and_then(Value::as_array)?;
    samples
        .iter()
        .filter_map(|sample| sample.get("video"))
        .filter_map(|video| video.get("uri").and_then(Value::as_str))
        .map(str::trim)
        .find(|uri| !uri.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Submitted,
    Polling { checks: u32 },
    Resolved { uri: String },
    Failed { reason: String },
    TimedOut,
    Cancelled,
}

impl JobState {
    pub fn label(&self) -> &'static str {
        match self {
            JobState::Submitted => "submitted",
            JobState::Polling { .. } => "polling",
            JobState::Resolved { .. } => "resolved",
            JobState::Failed { .. } => "failed",
            JobState::TimedOut => "timed_out",
            JobState::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedJob {
    pub handle: JobHandle,
    pub artifact_uri: String,
    pub status_checks: u32,
    pub waited: Duration,
}

pub struct JobPoller<'a> {
    transport: &'a dyn ProviderTransport,
    clock: &'a dyn PollClock,
    policy: PollPolicy,
    events: &'a EventLog,
}

impl<'a> JobPoller<'a> {
    pub fn new(
        transport: &'a dyn ProviderTransport,
        clock: &'a dyn PollClock,
        policy: PollPolicy,
        events: &'a EventLog,
    ) -> Self {
        Self {
            transport,
            clock,
            policy,
            events,
        }
    }

    pub fn wait(
        &self,
        submitted: JobHandle,
        credential: &Credential,
        cancel: &CancelToken,
    ) -> StudioResult<ResolvedJob> {
        let started = self.clock.elapsed();
        let mut handle = submitted;
        let mut state = JobState::Submitted;
        self.transition(&handle, &mut state, JobState::Polling { checks: 0 });
        let mut checks = 0u32;

        while !handle.done {
            if cancel.is_cancelled() {
                self.transition(&handle, &mut state, JobState::Cancelled);
                return Err(StudioError::Cancelled(OPERATION_LABEL.to_string()));
            }
            let waited = self.clock.elapsed().saturating_sub(started);
            if waited >= self.policy.max_wait {
                return Err(self.time_out(&handle, &mut state, waited));
            }
            let remaining = self.policy.max_wait - waited;
            if !self.clock.sleep(self.policy.interval.min(remaining), cancel) {
                self.transition(&handle, &mut state, JobState::Cancelled);
                return Err(StudioError::Cancelled(OPERATION_LABEL.to_string()));
            }
            // No status check once the bound has passed.
            let waited = self.clock.elapsed().saturating_sub(started);
            if waited >= self.policy.max_wait {
                return Err(self.time_out(&handle, &mut state, waited));
            }

            let refreshed = self
                .transport
                .operation_status(&handle.name, credential)
                .and_then(|value| JobHandle::from_operation(&value));
            checks += 1;
            handle = match refreshed {
                Ok(next) => next,
                Err(err) => {
                    self.transition(
                        &handle,
                        &mut state,
                        JobState::Failed {
                            reason: err.to_string(),
                        },
                    );
                    return Err(err);
                }
            };

            let mut payload = EventPayload::new();
            payload.insert("operation".to_string(), json!(handle.name));
            payload.insert("check".to_string(), json!(checks));
            payload.insert("done".to_string(), json!(handle.done));
            self.events.record("job_polled", payload);
            state = JobState::Polling { checks };
        }

        let waited = self.clock.elapsed().saturating_sub(started);
        if let Some(reason) = handle.error.clone() {
            self.transition(
                &handle,
                &mut state,
                JobState::Failed {
                    reason: reason.clone(),
                },
            );
            return Err(StudioError::provider(
                "Gemini",
                None,
                format!("video generation failed: {reason}"),
            ));
        }
        let Some(uri) = handle.artifact_uri.clone() else {
            let reason = "video generation finished without a video".to_string();
            self.transition(
                &handle,
                &mut state,
                JobState::Failed {
                    reason: reason.clone(),
                },
            );
            return Err(StudioError::empty_result(reason));
        };
        self.transition(&handle, &mut state, JobState::Resolved { uri: uri.clone() });

        Ok(ResolvedJob {
            handle,
            artifact_uri: uri,
            status_checks: checks,
            waited,
        })
    }

    fn time_out(&self, handle: &JobHandle, state: &mut JobState, waited: Duration) -> StudioError {
        self.transition(handle, state, JobState::TimedOut);
        StudioError::Timeout {
            operation: OPERATION_LABEL.to_string(),
            waited_s: waited.as_secs_f64(),
        }
    }

    fn transition(&self, handle: &JobHandle, state: &mut JobState, next: JobState) {
        tracing::debug!(
            operation = %handle.name,
            from = state.label(),
            to = next.label(),
            "job state change"
        );
        let event_type = match &next {
            JobState::Resolved { .. } => Some("job_resolved"),
            JobState::Failed { .. } | JobState::TimedOut | JobState::Cancelled => {
                Some("job_failed")
            }
            _ => None,
        };
        if let Some(event_type) = event_type {
            let mut payload = EventPayload::new();
            payload.insert("operation".to_string(), json!(handle.name));
            payload.insert("state".to_string(), json!(next.label()));
            match &next {
                JobState::Resolved { uri } => {
                    payload.insert("uri".to_string(), json!(uri));
                }
                JobState::Failed { reason } => {
                    payload.insert("reason".to_string(), json!(reason));
                }
                _ => {}
            }
            self.events.record(event_type, payload);
        }
        *state = next;
    }
}
