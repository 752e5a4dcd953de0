/// Admin authentication and authorization
///
/// Sessions are resolved into admin identities by [`resolver::check_admin_auth`];
/// [`guard`] composes that with role checks into the route guards used by
/// the admin API.

pub mod guard;
pub mod resolver;
pub mod session;

pub use guard::{ensure_role, require_admin, require_admin_role, AdminAuthContext};
pub use resolver::check_admin_auth;
pub use session::{AdminSession, SessionCredentials, SessionManager, SESSION_COOKIE};
