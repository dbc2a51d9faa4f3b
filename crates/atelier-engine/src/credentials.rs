use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use atelier_contracts::{StudioError, StudioResult};

use crate::config::non_empty_env;

/// Provider API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> StudioResult<Self> {
        let raw = raw.into().trim().to_string();
        if raw.is_empty() {
            return Err(StudioError::CredentialMissing(
                "empty API key".to_string(),
            ));
        }
        Ok(Self(raw))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<char>>()
            .into_iter()
            .rev()
            .collect();
        write!(f, "Credential(…{tail})")
    }
}

/// Host integration that owns key selection.
pub trait CredentialGate: Send + Sync {
    fn has_selected_key(&self) -> bool;
    /// Interactive selection. Must finish before the caller proceeds.
    fn open_select_key(&self) -> StudioResult<()>;
    fn selected_key(&self) -> Option<Credential>;
}

/// Resolves the key for one operation. Paid-tier operations run interactive selection first
/// when nothing is selected yet.
pub fn acquire_credential(gate: &dyn CredentialGate, paid: bool) -> StudioResult<Credential> {
    if paid && !gate.has_selected_key() {
        tracing::info!("no key selected for a paid-tier operation; opening key selection");
        gate.open_select_key()?;
    }
    gate.selected_key().ok_or_else(|| {
        StudioError::CredentialMissing(
            "no API key selected; set GEMINI_API_KEY or select a key".to_string(),
        )
    })
}

/// Reads `GEMINI_API_KEY` / `GOOGLE_API_KEY` once at construction.
#[derive(Debug, Clone)]
pub struct EnvCredentialGate {
    key: Option<Credential>,
}

impl EnvCredentialGate {
    pub fn from_env() -> Self {
        Self {
            key: non_empty_env("GEMINI_API_KEY")
                .or_else(|| non_empty_env("GOOGLE_API_KEY"))
                .and_then(|raw| Credential::new(raw).ok()),
        }
    }
}

impl CredentialGate for EnvCredentialGate {
    fn has_selected_key(&self) -> bool {
        self.key.is_some()
    }

    fn open_select_key(&self) -> StudioResult<()> {
        if self.key.is_some() {
            return Ok(());
        }
        Err(StudioError::CredentialMissing(
            "GEMINI_API_KEY or GOOGLE_API_KEY not set".to_string(),
        ))
    }

    fn selected_key(&self) -> Option<Credential> {
        self.key.clone()
    }
}

/// In-process gate: a key may be preset, and selection installs `on_select`.
#[derive(Debug, Default)]
pub struct StaticCredentialGate {
    selected: Mutex<Option<Credential>>,
    on_select: Option<Credential>,
    selections: AtomicUsize,
}

impl StaticCredentialGate {
    pub fn selected(key: Credential) -> Self {
        Self {
            selected: Mutex::new(Some(key)),
            on_select: None,
            selections: AtomicUsize::new(0),
        }
    }

    pub fn selectable(key: Credential) -> Self {
        Self {
            selected: Mutex::new(None),
            on_select: Some(key),
            selections: AtomicUsize::new(0),
        }
    }

    pub fn selection_count(&self) -> usize {
        self.selections.load(Ordering::SeqCst)
    }
}

impl CredentialGate for StaticCredentialGate {
    fn has_selected_key(&self) -> bool {
        self.selected
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    fn open_select_key(&self) -> StudioResult<()> {
        self.selections.fetch_add(1, Ordering::SeqCst);
        let Some(key) = self.on_select.clone() else {
            return Err(StudioError::CredentialMissing(
                "key selection was dismissed".to_string(),
            ));
        };
        let mut slot = self
            .selected
            .lock()
            .map_err(|_| StudioError::CredentialMissing("key store lock poisoned".to_string()))?;
        *slot = Some(key);
        Ok(())
    }

    fn selected_key(&self) -> Option<Credential> {
        self.selected.lock().ok().and_then(|slot| slot.clone())
    }
}
