use service_core::error::AppError;
use thiserror::Error;

use super::token::TokenError;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Structurally invalid or wrongly signed token.
    #[error("Malformed token")]
    Malformed,

    /// Token outside its `nbf..=exp` window.
    #[error("Token expired or not yet valid")]
    Expired,

    /// No active session for the issuer, or the stored token differs.
    #[error("Session mismatch")]
    SessionMismatch,

    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Token verified and matched a session, but the identity row is gone.
    #[error("Unknown identity")]
    UnknownIdentity,

    #[error("Mail already registered")]
    MailAlreadyRegistered,

    #[error("Store error: {0}")]
    Store(#[from] AppError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed => ServiceError::Malformed,
            TokenError::Expired => ServiceError::Expired,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Malformed => AppError::Unauthorized(anyhow::anyhow!("Invalid token")),
            ServiceError::Expired => AppError::Unauthorized(anyhow::anyhow!("Token expired")),
            ServiceError::SessionMismatch | ServiceError::UnknownIdentity => {
                AppError::Unauthorized(anyhow::anyhow!("Session is no longer active"))
            }
            ServiceError::InvalidCredentials => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid credentials"))
            }
            ServiceError::MailAlreadyRegistered => {
                AppError::Conflict(anyhow::anyhow!("Mail already registered"))
            }
            ServiceError::Store(e) => e,
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
