pub mod middleware;
pub mod password;
pub mod session;

pub use middleware::{read_cookie, MaybeSession, RequireSession, SESSION_COOKIE};
pub use password::{hash_password, verify_password};
pub use session::{generate_client_token, generate_session_token, SESSION_TTL_SECS};
