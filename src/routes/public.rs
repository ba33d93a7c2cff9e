use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};

/// Public Router Module
///
/// Endpoints reachable without a bearer token: the liveness check, token issuing,
/// the user directory writes, the catalog and the cart mutations.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Plain-text liveness check for load balancers.
        .route("/", get(handlers::root))
        // POST /jwt
        // Exchanges an identity payload for a one hour bearer token.
        .route("/jwt", post(handlers::issue_jwt))
        // GET/POST /users
        // Full user listing, and register-if-absent keyed on email.
        .route(
            "/users",
            get(handlers::list_users).post(handlers::register_user),
        )
        // PATCH /users/{role}/{key}
        // Assigns `role` to the user whose id is `key`. Replies `success: false` when
        // nothing was modified. Shares its path with the gated role check (GET).
        .route("/users/{role}/{key}", patch(handlers::update_user_role))
        // GET /classes, GET /instructor
        // Read-only catalog listings.
        .route("/classes", get(handlers::list_classes))
        .route("/instructor", get(handlers::list_instructors))
        // POST /carts, DELETE /carts/{id}
        // Cart mutations carry no ownership check, unlike the listing.
        .route("/carts", post(handlers::add_cart_item))
        .route("/carts/{id}", delete(handlers::delete_cart_item))
}
