use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use atelier_contracts::models::ModelRole;

use crate::poller::PollPolicy;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    pub api_base: String,
    pub request_timeout: Duration,
    pub transport_retries: usize,
    pub retry_backoff: Duration,
    pub poll: PollPolicy,
    pub model_overrides: BTreeMap<ModelRole, String>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl StudioConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let seconds = |key: &str, default: f64, min: f64, max: f64| {
            Duration::from_secs_f64(value_as_f64(lookup(key).as_deref(), default, min, max))
        };

        let api_base = lookup("GEMINI_API_BASE")
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let mut model_overrides = BTreeMap::new();
        for role in ModelRole::ALL {
            if let Some(name) = lookup(role.env_key())
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
            {
                model_overrides.insert(role, name);
            }
        }

        Self {
            api_base,
            request_timeout: seconds("ATELIER_REQUEST_TIMEOUT", 90.0, 15.0, 300.0),
            transport_retries: value_as_f64(
                lookup("ATELIER_TRANSPORT_RETRIES").as_deref(),
                2.0,
                0.0,
                4.0,
            )
            .round() as usize,
            retry_backoff: seconds("ATELIER_RETRY_BACKOFF", 1.2, 0.1, 10.0),
            poll: PollPolicy {
                interval: seconds("ATELIER_POLL_INTERVAL", 5.0, 1.0, 60.0),
                max_wait: seconds("ATELIER_POLL_MAX_WAIT", 600.0, 30.0, 3600.0),
            },
            model_overrides,
        }
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn value_as_f64(raw: Option<&str>, default: f64, min: f64, max: f64) -> f64 {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
        .clamp(min, max)
}
