use std::fmt;
use std::path::PathBuf;

/// Closed set of failure kinds surfaced by every studio operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    ProviderFailure,
    EmptyResult,
    CredentialMissing,
    Timeout,
    Cancelled,
    Output,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::ProviderFailure => "provider_failure",
            ErrorKind::EmptyResult => "empty_result",
            ErrorKind::CredentialMissing => "credential_missing",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Output => "output",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{provider} request failed{}: {message}", .status.map(|code| format!(" ({code})")).unwrap_or_default())]
    ProviderFailure {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{0}")]
    EmptyResult(String),

    #[error("credential unavailable: {0}")]
    CredentialMissing(String),

    #[error("{operation} did not finish within {waited_s:.0}s")]
    Timeout { operation: String, waited_s: f64 },

    #[error("{0} was cancelled")]
    Cancelled(String),

    #[error("failed writing {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type StudioResult<T> = Result<T, StudioError>;

impl StudioError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        StudioError::InvalidInput(message.into())
    }

    pub fn empty_result(message: impl Into<String>) -> Self {
        StudioError::EmptyResult(message.into())
    }

    pub fn provider(provider: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        StudioError::ProviderFailure {
            provider: provider.to_string(),
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StudioError::InvalidInput(_) => ErrorKind::InvalidInput,
            StudioError::ProviderFailure { .. } => ErrorKind::ProviderFailure,
            StudioError::EmptyResult(_) => ErrorKind::EmptyResult,
            StudioError::CredentialMissing(_) => ErrorKind::CredentialMissing,
            StudioError::Timeout { .. } => ErrorKind::Timeout,
            StudioError::Cancelled(_) => ErrorKind::Cancelled,
            StudioError::Output { .. } => ErrorKind::Output,
        }
    }

    /// Text suitable for showing to the person at the keyboard.
    pub fn user_message(&self) -> String {
        match self {
            StudioError::CredentialMissing(_) => {
                "API key error. Please re-select your key and try again.".to_string()
            }
            StudioError::ProviderFailure { .. } => {
                format!("The provider could not complete the request: {self}")
            }
            _ => self.to_string(),
        }
    }
}
