//! Services layer for aid-service.
//!
//! Session tokens, session storage, authorization, scope checks and the
//! persistent-store contracts they run against.

mod auth;
mod database;
pub mod error;
pub mod memory;
pub mod scope;
pub mod session;
pub mod store;
mod token;

pub use auth::{AuthService, IssuedSession};
pub use database::Database;
pub use error::ServiceError;
pub use memory::{BulkCall, MemoryStore};
pub use scope::{check_scope, check_scopes, require_scope};
pub use session::{MemorySessionStore, RedisSessionStore, SessionStore};
pub use store::{IdentityStore, LifecycleStore};
pub use token::{SessionClaims, TokenError, TokenService};
