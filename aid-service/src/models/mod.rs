pub mod group;
pub mod lifecycle;
pub mod user;

pub use group::{Group, Permission};
pub use lifecycle::{Notification, TimeBounded, TimeBoundedKind};
pub use user::{Identity, User};
