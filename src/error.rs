use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Failure of a single AI feature call, classified where it is first observed.
///
/// `Display` yields the carried message unchanged so callers can surface it
/// as-is; branch on [`AiError::kind`] instead of inspecting the text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AiError {
    #[error("{0}")]
    Network(String),

    #[error("{0}")]
    QuotaExceeded(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    ContentRejected(String),

    #[error("{0}")]
    InvalidResponse(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiErrorKind {
    Network,
    QuotaExceeded,
    Auth,
    Timeout,
    ContentRejected,
    InvalidResponse,
    InvalidRequest,
    Unknown,
}

impl AiErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            AiErrorKind::Network => "network",
            AiErrorKind::QuotaExceeded => "quota_exceeded",
            AiErrorKind::Auth => "auth",
            AiErrorKind::Timeout => "timeout",
            AiErrorKind::ContentRejected => "content_rejected",
            AiErrorKind::InvalidResponse => "invalid_response",
            AiErrorKind::InvalidRequest => "invalid_request",
            AiErrorKind::Unknown => "unknown",
        }
    }
}

impl AiError {
    pub fn kind(&self) -> AiErrorKind {
        match self {
            AiError::Network(_) => AiErrorKind::Network,
            AiError::QuotaExceeded(_) => AiErrorKind::QuotaExceeded,
            AiError::Auth(_) => AiErrorKind::Auth,
            AiError::Timeout(_) => AiErrorKind::Timeout,
            AiError::ContentRejected(_) => AiErrorKind::ContentRejected,
            AiError::InvalidResponse(_) => AiErrorKind::InvalidResponse,
            AiError::InvalidRequest(_) => AiErrorKind::InvalidRequest,
            AiError::Unknown(_) => AiErrorKind::Unknown,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AiError::Network(message)
            | AiError::QuotaExceeded(message)
            | AiError::Auth(message)
            | AiError::Timeout(message)
            | AiError::ContentRejected(message)
            | AiError::InvalidResponse(message)
            | AiError::InvalidRequest(message)
            | AiError::Unknown(message) => message,
        }
    }

    /// Whether a transport-level retry has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AiError::Network(_) | AiError::Timeout(_) | AiError::QuotaExceeded(_)
        )
    }

    /// Classifies a non-success HTTP response from the model endpoint.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = body.trim();
        let message = if detail.is_empty() {
            format!("AI API error: {}", status)
        } else {
            format!("AI API error: {} {}", status, detail)
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AiError::Auth(message),
            StatusCode::TOO_MANY_REQUESTS | StatusCode::PAYMENT_REQUIRED => {
                AiError::QuotaExceeded(message)
            }
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => AiError::Timeout(message),
            StatusCode::BAD_REQUEST if mentions_content_filter(detail) => {
                AiError::ContentRejected(message)
            }
            status if status.is_server_error() => AiError::Network(message),
            _ => AiError::Unknown(message),
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let message = format!("AI request failed: {}", err);
        if err.is_timeout() {
            AiError::Timeout(message)
        } else if err.is_connect() || err.is_request() || err.is_body() {
            AiError::Network(message)
        } else if err.is_decode() {
            AiError::InvalidResponse(message)
        } else {
            AiError::Unknown(message)
        }
    }
}

fn mentions_content_filter(body: &str) -> bool {
    let lowered = body.to_lowercase();
    ["content_filter", "content_policy", "safety"]
        .iter()
        .any(|marker| lowered.contains(marker))
}
