use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Transport-level failure, normalized from whatever the HTTP client reported.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {message}")]
    Network { message: String },

    #[error("authentication rejected: {message}")]
    Unauthorized { message: String },

    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("server returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response body: {message}")]
    Decode { message: String },
}

impl ApiError {
    /// Message taken from the remote error payload, if the server sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { message }
            | ApiError::NotFound { message }
            | ApiError::Rejected { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode {
                message: err.to_string(),
            }
        } else {
            ApiError::Network {
                message: err.to_string(),
            }
        }
    }
}

/// Why a single batch item could not be persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    NotFound,
    Network { message: String },
    Rejected { status: u16, message: String },
    SessionExpired,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "Timeout"),
            FailureReason::NotFound => write!(f, "NotFound"),
            FailureReason::Network { message } => write!(f, "Network: {}", message),
            FailureReason::Rejected { status, message } => {
                write!(f, "Rejected ({}): {}", status, message)
            }
            FailureReason::SessionExpired => write!(f, "SessionExpired"),
        }
    }
}

impl From<ApiError> for FailureReason {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Timeout => FailureReason::Timeout,
            ApiError::NotFound { .. } => FailureReason::NotFound,
            ApiError::Network { message } | ApiError::Decode { message } => {
                FailureReason::Network { message }
            }
            ApiError::Unauthorized { .. } => FailureReason::SessionExpired,
            ApiError::Rejected { status, message } => FailureReason::Rejected { status, message },
        }
    }
}

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    #[error("Registration failed: {message}")]
    RegistrationFailed { message: String },

    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Invalid cohort selector: {reason}")]
    InvalidSelector { reason: String },

    #[error("Cohort could not be loaded: {reason}")]
    CohortUnavailable {
        #[source]
        reason: ApiError,
    },

    #[error("Scoring service unavailable: {reason}")]
    ScoringUnavailable {
        #[source]
        reason: ApiError,
    },

    #[error("Scoring response shape mismatch: expected {expected} results, got {actual}")]
    ResponseShapeMismatch { expected: usize, actual: usize },

    #[error("Failed to persist result for student {student_id}: {reason}")]
    PersistFailed {
        student_id: String,
        reason: FailureReason,
    },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(#[from] ApiError),

    #[error("Token store error: {message}")]
    Storage { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for {field}: {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ConsoleError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ConsoleError::InvalidCredentials { .. }
            | ConsoleError::RegistrationFailed { .. }
            | ConsoleError::InvalidSelector { .. }
            | ConsoleError::PersistFailed { .. } => ErrorSeverity::Low,
            ConsoleError::SessionExpired
            | ConsoleError::NoRefreshToken
            | ConsoleError::CohortUnavailable { .. }
            | ConsoleError::ScoringUnavailable { .. }
            | ConsoleError::ServiceUnavailable(_) => ErrorSeverity::Medium,
            ConsoleError::Storage { .. }
            | ConsoleError::IoError(_)
            | ConsoleError::SerializationError(_)
            | ConsoleError::CsvError(_)
            | ConsoleError::ConfigValidationError { .. }
            | ConsoleError::InvalidConfigValueError { .. }
            | ConsoleError::MissingConfigError { .. } => ErrorSeverity::High,
            ConsoleError::ResponseShapeMismatch { .. } => ErrorSeverity::Critical,
        }
    }

    /// A broken remote contract rather than a user-facing failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConsoleError::ResponseShapeMismatch { .. })
    }

    /// Text suitable for rendering directly in the console UI.
    pub fn user_message(&self) -> String {
        match self {
            ConsoleError::InvalidCredentials { message }
            | ConsoleError::RegistrationFailed { message } => message.clone(),
            ConsoleError::SessionExpired | ConsoleError::NoRefreshToken => {
                "Your session has expired. Please log in again.".to_string()
            }
            ConsoleError::InvalidSelector { .. } => {
                "Please select class and admission year".to_string()
            }
            ConsoleError::CohortUnavailable { .. } => "Failed to load students".to_string(),
            ConsoleError::ScoringUnavailable { .. } => {
                "Failed to make batch prediction".to_string()
            }
            ConsoleError::PersistFailed { student_id, .. } => {
                format!("Failed to update student {}", student_id)
            }
            ConsoleError::ServiceUnavailable(err) => err
                .server_message()
                .map(str::to_string)
                .unwrap_or_else(|| "The server could not be reached".to_string()),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
