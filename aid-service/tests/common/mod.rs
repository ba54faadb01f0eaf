//! Shared setup for aid-service integration tests.
//!
//! Everything runs against the in-process stores; no PostgreSQL or Redis.

#![allow(dead_code)]

use aid_service::{
    build_router,
    config::{
        AppConfig, DatabaseConfig, Environment, ReaperConfig, SessionBackend, SessionConfig,
    },
    models::{Group, User},
    services::{AuthService, MemorySessionStore, MemoryStore, TokenService},
    utils::{hash_password, Password},
    AppState,
};
use service_core::axum::Router;
use std::sync::Arc;

pub const TEST_SECRET: &str = "integration-test-signing-secret";
pub const TEST_PASSWORD: &str = "correct horse battery staple";

pub fn session_config() -> SessionConfig {
    SessionConfig {
        backend: SessionBackend::Memory,
        redis_url: None,
        signing_secret: TEST_SECRET.to_string(),
        validity_minutes: 60,
        skew_seconds: 30,
        ttl_minutes: 60,
        sweep_interval_seconds: 300,
    }
}

pub fn reaper_config() -> ReaperConfig {
    ReaperConfig {
        batch_size: 10,
        offer_interval_seconds: 60,
        request_interval_seconds: 60,
        notification_interval_seconds: 60,
        notification_retention_hours: 24,
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        common: service_core::config::Config {
            port: 8080,
            host: "127.0.0.1".parse().unwrap(),
        },
        environment: Environment::Dev,
        service_name: "aid-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 1,
        },
        sessions: session_config(),
        reapers: reaper_config(),
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub sessions: Arc<MemorySessionStore>,
}

impl TestApp {
    pub fn new() -> Self {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(MemorySessionStore::new());
        let tokens = TokenService::new(&config.sessions).unwrap();
        let auth_service = AuthService::new(
            store.clone(),
            sessions.clone(),
            tokens,
            config.sessions.session_ttl(),
        );

        let state = AppState {
            config,
            auth_service,
            identities: store.clone(),
            sessions: sessions.clone(),
        };

        Self {
            state,
            store,
            sessions,
        }
    }

    pub fn auth(&self) -> &AuthService {
        &self.state.auth_service
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Insert an enabled user whose password is [`TEST_PASSWORD`].
    pub fn seed_user(&self, mail: &str, groups: Vec<Group>) -> User {
        let hash = hash_password(&Password::new(TEST_PASSWORD)).unwrap();
        let user = User::new(mail.to_string(), hash.into_string());
        self.store.add_user(user.clone(), groups).unwrap();
        user
    }

    pub fn seed_disabled_user(&self, mail: &str) -> User {
        let hash = hash_password(&Password::new(TEST_PASSWORD)).unwrap();
        let mut user = User::new(mail.to_string(), hash.into_string());
        user.enabled = false;
        self.store.add_user(user.clone(), vec![]).unwrap();
        user
    }
}

pub fn password(raw: &str) -> Password {
    Password::new(raw)
}
