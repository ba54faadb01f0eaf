use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use service_core::error::AppError;
use subtle::ConstantTimeEq;

use crate::{
    models::{Identity, User},
    services::{IdentityStore, ServiceError, SessionStore, TokenService},
    utils::{hash_password, verify_password, Password, PasswordHashString},
};

/// Token handed back on login and renew.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

/// Session authorization: login, logout, renew and per-request `authorize`.
#[derive(Clone)]
pub struct AuthService {
    identities: Arc<dyn IdentityStore>,
    sessions: Arc<dyn SessionStore>,
    tokens: TokenService,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
        tokens: TokenService,
        session_ttl: Duration,
    ) -> Self {
        Self {
            identities,
            sessions,
            tokens,
            session_ttl,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Resolve a presented token to its identity.
    ///
    /// The token must verify, and must also be byte-for-byte the token
    /// currently stored for its issuer. Read-only on both stores.
    pub async fn authorize(
        &self,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<Identity, ServiceError> {
        let claims = self.tokens.verify(presented, now)?;

        let stored = self
            .sessions
            .get(&claims.iss)
            .await
            .map_err(ServiceError::Internal)?
            .ok_or(ServiceError::SessionMismatch)?;

        if !bool::from(stored.as_bytes().ct_eq(presented.as_bytes())) {
            return Err(ServiceError::SessionMismatch);
        }

        let user = self
            .identities
            .find_user_by_mail(&claims.iss)
            .await?
            .ok_or(ServiceError::UnknownIdentity)?;

        let groups = self.identities.find_groups_for_user(user.user_id).await?;

        Ok(Identity::new(user, groups))
    }

    /// Check credentials and open a fresh session, replacing any previous one.
    ///
    /// The hash comparison runs even for unknown mails so both failure
    /// paths cost the same.
    pub async fn login(
        &self,
        mail: &str,
        password: &Password,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, ServiceError> {
        let user = self.identities.find_user_by_mail(mail).await?;

        let stored_hash = match &user {
            Some(user) => PasswordHashString::new(user.password_hash.clone()),
            None => PasswordHashString::unknown_identity(),
        };
        let verified = verify_password(password, &stored_hash).is_ok();

        let user = match user {
            Some(user) if verified && user.enabled => user,
            Some(user) if verified => {
                tracing::warn!(user_id = %user.user_id, "Login attempt for disabled user");
                return Err(ServiceError::InvalidCredentials);
            }
            _ => return Err(ServiceError::InvalidCredentials),
        };

        let session = self.start_session(&user.mail, now).await?;
        tracing::info!(user_id = %user.user_id, "User logged in");
        Ok(session)
    }

    /// Drop the identity's session. Idempotent.
    pub async fn logout(&self, identity: &Identity) -> Result<(), ServiceError> {
        self.sessions
            .delete(identity.key())
            .await
            .map_err(ServiceError::Internal)?;

        tracing::info!(user_id = %identity.user_id, "User logged out");
        Ok(())
    }

    /// Issue a replacement token; the previous one stops authorizing.
    ///
    /// Concurrent renews race and the last store write wins.
    pub async fn renew(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, ServiceError> {
        let session = self.start_session(identity.key(), now).await?;
        tracing::debug!(user_id = %identity.user_id, "Session renewed");
        Ok(session)
    }

    /// Create an enabled user with the default groups attached.
    pub async fn register(&self, mail: &str, password: &Password) -> Result<Identity, ServiceError> {
        if self.identities.find_user_by_mail(mail).await?.is_some() {
            return Err(ServiceError::MailAlreadyRegistered);
        }

        let password_hash = hash_password(password).map_err(|e| {
            tracing::error!(error = %e, "Password hashing failed during registration");
            ServiceError::Internal(anyhow::anyhow!("Password hashing error: {}", e))
        })?;

        let user = User::new(mail.to_string(), password_hash.into_string());
        match self.identities.insert_user_with_default_groups(&user).await {
            Ok(()) => {}
            // Lost a race with a concurrent registration for the same mail.
            Err(AppError::Conflict(_)) => return Err(ServiceError::MailAlreadyRegistered),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id = %user.user_id, "User registered");

        let groups = self.identities.find_groups_for_user(user.user_id).await?;
        Ok(Identity::new(user, groups))
    }

    async fn start_session(
        &self,
        identity_key: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, ServiceError> {
        let token = self
            .tokens
            .issue(identity_key, now)
            .map_err(ServiceError::Internal)?;

        self.sessions
            .set(identity_key, &token, self.session_ttl)
            .await
            .map_err(ServiceError::Internal)?;

        Ok(IssuedSession {
            token,
            token_type: "Bearer".to_string(),
            expires_at: now + self.tokens.validity(),
        })
    }
}
