use common::jwt::ADMIN_ROLE;
use middleware::auth::AuthMiddleware;

pub mod middleware {
    pub mod auth;
}

/// Callers whose token carries the admin role.
pub fn admin_middleware() -> AuthMiddleware {
    AuthMiddleware::new(ADMIN_ROLE)
}
