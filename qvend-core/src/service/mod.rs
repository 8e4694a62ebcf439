pub mod auth;
pub mod user;

pub use auth::AdminAuthService;
pub use user::UserService;
