use std::collections::HashMap;

use axum::{
    Json,
    extract::{FromRequest, Path, Query, State},
    http::StatusCode,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{self, AuthUser, Claims},
    error::ApiError,
    models::{
        AdminStatus, CartItem, CartQuery, ClassListing, DeleteResponse, InsertResponse,
        Instructor, InstructorStatus, MessageResponse, NewCartItem, NewUser, RegisterResponse,
        Role, RoleStatus, RoleUpdateResponse, TokenResponse, User,
    },
};

/// ApiJson
///
/// `axum::Json` with its rejection mapped onto [`ApiError`], so an undecodable body
/// still produces a JSON error object.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

const ROLE_UPDATE_FAILED: &str = "failed to update user role";
const ERROR_OCCURRED: &str = "an error occurred";

// --- Liveness ---

/// root
///
/// [Public Route] Plain-text liveness check.
#[utoipa::path(get, path = "/", responses((status = 200, description = "Server is up", body = String)))]
pub async fn root() -> &'static str {
    "camp booking server is running"
}

// --- Token Issuer ---

/// issue_jwt
///
/// [Public Route] Signs whatever identity object the client posts. The resulting token
/// carries every submitted field plus `iat` and a one hour `exp`.
#[utoipa::path(
    post,
    path = "/jwt",
    responses(
        (status = 200, description = "Signed token", body = TokenResponse),
        (status = 500, description = "Signing secret not configured")
    )
)]
pub async fn issue_jwt(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<HashMap<String, Value>>,
) -> Result<Json<TokenResponse>, ApiError> {
    let claims = Claims::for_payload(payload);
    let token = auth::issue_token(&claims, state.config.jwt_secret.as_deref())?;
    tracing::debug!(email = ?claims.email, "issued identity token");
    Ok(Json(TokenResponse { token }))
}

// --- User Directory ---

/// list_users
///
/// [Public Route] Every user record, unpaginated.
#[utoipa::path(get, path = "/users", responses((status = 200, description = "All users", body = [User])))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.repo.list_users().await?))
}

/// register_user
///
/// [Public Route] Called on every sign-in. Inserts the user unless the email is already
/// known, in which case nothing changes and a message is returned instead.
#[utoipa::path(
    post,
    path = "/users",
    request_body = NewUser,
    responses((status = 200, description = "Inserted, or already present", body = RegisterResponse))
)]
pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<NewUser>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let already_exists = || {
        Json(RegisterResponse::AlreadyExists(MessageResponse {
            message: "user already exists".to_string(),
        }))
    };

    if state.repo.find_user_by_email(&payload.email).await?.is_some() {
        return Ok(already_exists());
    }

    let email = payload.email.clone();
    match state.repo.insert_user_if_absent(payload).await? {
        Some(id) => {
            tracing::info!(%email, %id, "registered user");
            Ok(Json(RegisterResponse::Inserted(InsertResponse::new(id))))
        }
        // Lost a race with a concurrent registration of the same email.
        None => Ok(already_exists()),
    }
}

/// has_role
///
/// A caller may only ask about their own email. Any other email answers `false`
/// without touching the store.
async fn has_role(
    state: &AppState,
    user: &AuthUser,
    email: &str,
    role: Role,
) -> Result<bool, ApiError> {
    if !user.is(email) {
        tracing::debug!(requested = %email, caller = ?user.email(), "role query for another identity");
        return Ok(false);
    }

    let record = state.repo.find_user_by_email(email).await?;
    Ok(record.is_some_and(|u| u.has_role(role)))
}

/// role_status
///
/// [Authenticated Route] `GET /users/admin/{email}` answers `{ admin }`,
/// `GET /users/instructor/{email}` answers `{ instructor }`. Any other role segment
/// is not a route.
#[utoipa::path(
    get,
    path = "/users/{role}/{key}",
    params(
        ("role" = String, Path, description = "admin or instructor"),
        ("key" = String, Path, description = "Email to check")
    ),
    responses(
        (status = 200, description = "Role flag", body = RoleStatus),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Unknown role segment")
    )
)]
pub async fn role_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path((role, email)): Path<(String, String)>,
) -> Result<Json<RoleStatus>, ApiError> {
    let status = match role.as_str() {
        "admin" => RoleStatus::Admin(AdminStatus {
            admin: has_role(&state, &user, &email, Role::Admin).await?,
        }),
        "instructor" => RoleStatus::Instructor(InstructorStatus {
            instructor: has_role(&state, &user, &email, Role::Instructor).await?,
        }),
        _ => return Err(ApiError::NotFound),
    };
    Ok(Json(status))
}

/// update_user_role
///
/// [Public Route] Sets the role of user `id`. Reports `success: true` only when the
/// record actually changed. A malformed id or store failure answers 500 with the same
/// body shape.
#[utoipa::path(
    patch,
    path = "/users/{role}/{key}",
    params(
        ("role" = String, Path, description = "Role to assign, e.g. admin or instructor"),
        ("key" = String, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Outcome", body = RoleUpdateResponse),
        (status = 500, description = "Malformed id or store failure", body = RoleUpdateResponse)
    )
)]
pub async fn update_user_role(
    State(state): State<AppState>,
    Path((role, id)): Path<(String, String)>,
) -> (StatusCode, Json<RoleUpdateResponse>) {
    let internal_error = || {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RoleUpdateResponse::failed(ERROR_OCCURRED)),
        )
    };

    let Ok(user_id) = Uuid::parse_str(&id) else {
        tracing::warn!(%id, "role update with malformed id");
        return internal_error();
    };

    match state.repo.set_user_role(user_id, &role).await {
        Ok(true) => {
            tracing::info!(%user_id, %role, "user role updated");
            (StatusCode::OK, Json(RoleUpdateResponse::updated()))
        }
        Ok(false) => (
            StatusCode::OK,
            Json(RoleUpdateResponse::failed(ROLE_UPDATE_FAILED)),
        ),
        Err(e) => {
            tracing::error!(error = %e, %user_id, "role update failed");
            internal_error()
        }
    }
}

// --- Catalog Reader ---

/// list_classes
///
/// [Public Route] The full class catalog.
#[utoipa::path(get, path = "/classes", responses((status = 200, description = "All classes", body = [ClassListing])))]
pub async fn list_classes(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClassListing>>, ApiError> {
    Ok(Json(state.repo.list_classes().await?))
}

/// list_instructors
///
/// [Public Route] The full instructor catalog.
#[utoipa::path(get, path = "/instructor", responses((status = 200, description = "All instructors", body = [Instructor])))]
pub async fn list_instructors(
    State(state): State<AppState>,
) -> Result<Json<Vec<Instructor>>, ApiError> {
    Ok(Json(state.repo.list_instructors().await?))
}

// --- Cart Manager ---

/// list_cart
///
/// [Authenticated Route] Cart items owned by `?email=`. No email means an empty cart;
/// an email other than the caller's is forbidden.
#[utoipa::path(
    get,
    path = "/carts",
    params(CartQuery),
    responses(
        (status = 200, description = "Cart items of the caller"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Email does not match the token")
    )
)]
pub async fn list_cart(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<CartQuery>,
) -> Result<Json<Vec<CartItem>>, ApiError> {
    let Some(email) = query.email.filter(|email| !email.is_empty()) else {
        return Ok(Json(Vec::new()));
    };

    if !user.is(&email) {
        return Err(ApiError::Forbidden);
    }

    Ok(Json(state.repo.list_cart_items(&email).await?))
}

/// add_cart_item
///
/// [Public Route] Stores the posted item as-is.
// TODO: decide with product whether insert should require a token matching `email`,
// as listing does.
#[utoipa::path(
    post,
    path = "/carts",
    responses((status = 200, description = "Inserted", body = InsertResponse))
)]
pub async fn add_cart_item(
    State(state): State<AppState>,
    ApiJson(item): ApiJson<NewCartItem>,
) -> Result<Json<InsertResponse>, ApiError> {
    let id = state.repo.insert_cart_item(item).await?;
    Ok(Json(InsertResponse::new(id)))
}

/// delete_cart_item
///
/// [Public Route] Removes a cart item by id. Deleting an unknown id is not an error;
/// `deletedCount` is simply zero.
#[utoipa::path(
    delete,
    path = "/carts/{id}",
    params(("id" = String, Path, description = "Cart item ID")),
    responses(
        (status = 200, description = "Deletion result", body = DeleteResponse),
        (status = 500, description = "Malformed id or store failure")
    )
)]
pub async fn delete_cart_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let item_id = Uuid::parse_str(&id).map_err(|_| ApiError::MalformedId(id))?;
    let deleted_count = state.repo.delete_cart_item(item_id).await?;
    Ok(Json(DeleteResponse {
        acknowledged: true,
        deleted_count,
    }))
}
