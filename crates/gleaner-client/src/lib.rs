pub mod cookies;
pub mod session;

pub use cookies::FileJar;
pub use session::{DEFAULT_USER_AGENT, FormBody, HttpSession, Response, SessionConfig};
