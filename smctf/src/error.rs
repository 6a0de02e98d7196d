use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const REQUEST_FAILED: &str = "request failed";
pub const INVALID_CREDENTIALS: &str = "invalid credentials";
pub const MISSING_REFRESH_TOKEN: &str = "missing refresh token";

const STATUS_UNAUTHORIZED: u16 = 401;
const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// A single field-level validation failure reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub reason: String,
}

/// Rate-limit metadata attached to a failed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub limit: i64,
    pub remaining: i64,
    pub reset_seconds: i64,
}

/// Structured error built from a non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,
}

/// Classification of every failure the client can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthenticationRequired,
    AuthenticationExpired,
    ValidationFailed,
    RateLimited,
    RequestFailed,
    NetworkOrProtocolError,
}

impl ApiError {
    #[must_use]
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
            details: None,
            rate_limit: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        if self.status == STATUS_TOO_MANY_REQUESTS {
            return ErrorKind::RateLimited;
        }
        let has_details = self.details.as_ref().is_some_and(|d| !d.is_empty());
        if (400..500).contains(&self.status) && self.status != STATUS_UNAUTHORIZED && has_details {
            return ErrorKind::ValidationFailed;
        }
        ErrorKind::RequestFailed
    }

    /// Field name to reason, in server order. Later duplicates win.
    #[must_use]
    pub fn field_errors(&self) -> Vec<(String, String)> {
        let mut fields: Vec<(String, String)> = Vec::new();
        for detail in self.details.iter().flatten() {
            if let Some(existing) = fields.iter_mut().find(|(field, _)| *field == detail.field) {
                existing.1.clone_from(&detail.reason);
            } else {
                fields.push((detail.field.clone(), detail.reason.clone()));
            }
        }
        fields
    }

    /// Message suitable for showing to a user.
    #[must_use]
    pub fn user_message(&self) -> String {
        if self.status != STATUS_TOO_MANY_REQUESTS {
            return self.message.clone();
        }
        match self.rate_limit {
            Some(limit) => format!(
                "Too many requests. Please try again in {} seconds.",
                limit.reset_seconds
            ),
            None => "Too many requests. Please try again later.".to_string(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (status {})", self.message, self.status)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("missing refresh token")]
    AuthenticationRequired,
    /// The refresh call failed and the session was dropped.
    #[error("invalid credentials")]
    AuthenticationExpired {
        #[source]
        cause: Box<Error>,
    },
    #[error("API error: {0}")]
    Api(ApiError),
    #[error("HTTP error: {0}")]
    Http(Arc<reqwest::Error>),
    #[error("invalid response body: {0}")]
    Decode(Arc<serde_json::Error>),
    #[error("expected a JSON body from {path}")]
    UnexpectedBody { path: String },
    #[error("token refresh task failed: {0}")]
    RefreshTask(String),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthenticationRequired => ErrorKind::AuthenticationRequired,
            Self::AuthenticationExpired { .. } => ErrorKind::AuthenticationExpired,
            Self::Api(err) => err.kind(),
            Self::Http(_) | Self::Decode(_) | Self::UnexpectedBody { .. } | Self::RefreshTask(_) => {
                ErrorKind::NetworkOrProtocolError
            }
        }
    }

    /// HTTP status the caller may branch on. Transport failures have none.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthenticationRequired | Self::AuthenticationExpired { .. } => {
                Some(STATUS_UNAUTHORIZED)
            }
            Self::Api(err) => Some(err.status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            Self::Decode(_) | Self::UnexpectedBody { .. } | Self::RefreshTask(_) => None,
        }
    }

    /// The structured form of this error as seen by UI code.
    #[must_use]
    pub fn api_error(&self) -> Option<ApiError> {
        match self {
            Self::AuthenticationRequired => {
                Some(ApiError::new(MISSING_REFRESH_TOKEN, STATUS_UNAUTHORIZED))
            }
            Self::AuthenticationExpired { .. } => {
                Some(ApiError::new(INVALID_CREDENTIALS, STATUS_UNAUTHORIZED))
            }
            Self::Api(err) => Some(err.clone()),
            Self::Http(_) | Self::Decode(_) | Self::UnexpectedBody { .. } | Self::RefreshTask(_) => {
                None
            }
        }
    }

    /// Wraps a refresh failure as a terminated session.
    ///
    /// A missing refresh token stays `AuthenticationRequired`.
    #[must_use]
    pub fn into_session_expired(self) -> Self {
        match self {
            Self::AuthenticationRequired | Self::AuthenticationExpired { .. } => self,
            other => Self::AuthenticationExpired {
                cause: Box::new(other),
            },
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(Arc::new(err))
    }
}
