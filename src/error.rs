use std::fmt;

use thiserror::Error;

pub(crate) const REASON_POPUP_BLOCKED: &str = "popup_blocked";
pub(crate) const REASON_MISSING_CODE: &str = "missing_code";
pub(crate) const REASON_EXCHANGE_FAILED: &str = "exchange_failed";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid provider config `{field}`: {message}")]
    Config {
        field: &'static str,
        message: String,
    },

    #[error("popup was blocked by the browser; allow popups and retry")]
    PopupBlocked,

    #[error("identity provider returned an error: {reason}")]
    Provider { reason: String },

    #[error("code exchange failed: {reason}")]
    Exchange { reason: String },

    #[error("sign-in cancelled: {reason}")]
    UserCancelled { reason: CancelReason },

    #[error("a sign-in flow is already in progress")]
    FlowInUse,

    #[error("os rng error: {message}")]
    OsRng { message: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid redirect uri: {0}")]
    InvalidRedirectUri(String),

    #[error("outcome storage error: {message}")]
    Storage { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    UserClosed,
    Timeout,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelReason::UserClosed => "user_closed",
            CancelReason::Timeout => "timeout",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AuthError {
    pub(crate) fn config(field: &'static str, message: impl Into<String>) -> Self {
        Self::Config {
            field,
            message: message.into(),
        }
    }

    /// Maps the `errorReason` of a FAILURE outcome back onto the taxonomy.
    pub fn from_failure_reason(reason: &str) -> Self {
        match reason {
            REASON_EXCHANGE_FAILED => Self::Exchange {
                reason: reason.to_string(),
            },
            REASON_POPUP_BLOCKED => Self::PopupBlocked,
            _ => Self::Provider {
                reason: reason.to_string(),
            },
        }
    }

    /// Machine-readable reason, as carried in FAILURE outcomes and logs.
    pub fn reason(&self) -> String {
        match self {
            AuthError::PopupBlocked => REASON_POPUP_BLOCKED.to_string(),
            AuthError::Provider { reason } | AuthError::Exchange { reason } => reason.clone(),
            AuthError::UserCancelled { reason } => reason.as_str().to_string(),
            AuthError::FlowInUse => "flow_in_use".to_string(),
            AuthError::Config { .. } => "config_error".to_string(),
            _ => "internal_error".to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AuthError::UserCancelled { .. })
    }
}
