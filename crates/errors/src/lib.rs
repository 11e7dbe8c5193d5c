//! credvault-errors - 统一错误处理
//!
//! Error taxonomy shared by every credvault crate. Problem details follow
//! RFC 7807 so HTTP-facing wrappers can render errors without extra mapping.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Vault client error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("Invalid secret shape: {0}")]
    InvalidSecretShape(String),

    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend denied: {0}")]
    BackendDenied(String),

    #[error("Backend rejected: {0}")]
    BackendRejected(String),

    #[error("Corrupt secret: {0}")]
    CorruptSecret(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl VaultError {
    pub fn invalid_shape(msg: impl Into<String>) -> Self {
        Self::InvalidSecretShape(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::SecretNotFound(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    pub fn denied(msg: impl Into<String>) -> Self {
        Self::BackendDenied(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::BackendRejected(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptSecret(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Only transient connectivity failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_))
    }

    /// Stable machine-readable error kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSecretShape(_) => "INVALID_SECRET_SHAPE",
            Self::SecretNotFound(_) => "SECRET_NOT_FOUND",
            Self::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            Self::BackendDenied(_) => "BACKEND_DENIED",
            Self::BackendRejected(_) => "BACKEND_REJECTED",
            Self::CorruptSecret(_) => "CORRUPT_SECRET",
            Self::Cancelled(_) => "CANCELLED",
        }
    }

    /// Process exit code for command-line wrappers (never zero)
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidSecretShape(_) => 65,
            Self::SecretNotFound(_) => 66,
            Self::BackendUnavailable(_) => 69,
            Self::BackendDenied(_) => 77,
            Self::BackendRejected(_) => 64,
            Self::CorruptSecret(_) => 70,
            Self::Cancelled(_) => 130,
        }
    }

    /// 转换为 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidSecretShape(_) => 400,
            Self::SecretNotFound(_) => 404,
            Self::BackendUnavailable(_) => 503,
            Self::BackendDenied(_) => 403,
            Self::BackendRejected(_) => 400,
            Self::CorruptSecret(_) => 500,
            Self::Cancelled(_) => 499,
        }
    }

    /// 转换为 Problem Details
    pub fn to_problem_details(&self) -> ProblemDetails {
        ProblemDetails {
            r#type: self.problem_type(),
            title: self.problem_title().to_string(),
            status: self.status_code(),
            detail: self.to_string(),
            instance: None,
        }
    }

    fn problem_type(&self) -> String {
        let slug = self.code().to_ascii_lowercase().replace('_', "-");
        format!("https://credvault.dev/problems/{}", slug)
    }

    fn problem_title(&self) -> &'static str {
        match self {
            Self::InvalidSecretShape(_) => "Invalid Secret Shape",
            Self::SecretNotFound(_) => "Secret Not Found",
            Self::BackendUnavailable(_) => "Backend Unavailable",
            Self::BackendDenied(_) => "Backend Denied",
            Self::BackendRejected(_) => "Backend Rejected",
            Self::CorruptSecret(_) => "Corrupt Secret",
            Self::Cancelled(_) => "Cancelled",
        }
    }
}

/// RFC 7807 Problem Details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// Result 类型别名
pub type VaultResult<T> = Result<T, VaultError>;
