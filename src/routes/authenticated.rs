use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes that sit behind the bearer middleware. Every handler here receives a
/// verified `AuthUser` and compares its email against the resource it is asked about.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /users/admin/{email}, GET /users/instructor/{email}
        // `{ admin: true }` iff the caller is asking about themselves and holds the role.
        // Registered on the same path pattern as the public role PATCH so both methods
        // resolve to one route.
        .route("/users/{role}/{key}", get(handlers::role_status))
        // GET /carts?email=
        // The caller's own cart. Any other email is forbidden.
        .route("/carts", get(handlers::list_cart))
}
