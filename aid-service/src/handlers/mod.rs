pub mod session;
pub mod user;

pub use session::{login, logout, register, renew};
pub use user::get_me;
