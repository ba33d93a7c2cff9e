use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{FromRow, PgPool, types::Json};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{CartItem, ClassListing, Instructor, NewCartItem, NewUser, User};

/// RepoError
///
/// Failure of a store operation. Handlers turn it into a 500 response.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// The contract every store backend fulfils. Handlers only see `Arc<dyn Repository>`,
/// so the Postgres pool and the in-memory store are interchangeable.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    /// Inserts `user` unless its email is taken. Returns the new id, or `None` when a
    /// record with that email already exists.
    async fn insert_user_if_absent(&self, user: NewUser) -> RepoResult<Option<Uuid>>;
    /// Sets the role of user `id`. Returns true only if the record was modified, so
    /// both an unknown id and an unchanged role yield false.
    async fn set_user_role(&self, id: Uuid, role: &str) -> RepoResult<bool>;

    // --- Catalog ---
    async fn list_classes(&self) -> RepoResult<Vec<ClassListing>>;
    async fn list_instructors(&self) -> RepoResult<Vec<Instructor>>;

    // --- Cart ---
    async fn list_cart_items(&self, email: &str) -> RepoResult<Vec<CartItem>>;
    async fn insert_cart_item(&self, item: NewCartItem) -> RepoResult<Uuid>;
    /// Returns the number of deleted records (0 or 1).
    async fn delete_cart_item(&self, id: Uuid) -> RepoResult<u64>;
}

/// RepositoryState
///
/// The shared handle stored in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

/// PostgresRepository
///
/// The production backend. Holds the process-wide connection pool; sqlx pools are
/// safe to share between concurrent requests.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Row shape of the `carts` table. The client payload lives in the `item` JSONB column.
#[derive(FromRow)]
struct CartRow {
    id: Uuid,
    email: Option<String>,
    item: Json<HashMap<String, Value>>,
}

impl From<CartRow> for CartItem {
    fn from(row: CartRow) -> Self {
        CartItem {
            id: row.id,
            email: row.email,
            details: row.item.0,
        }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, email, display_name, photo_url, role FROM users ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, display_name, photo_url, role FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// insert_user_if_absent
    ///
    /// `ON CONFLICT (email) DO NOTHING` keeps registration idempotent even when two
    /// sign-ins for the same email race past the lookup.
    async fn insert_user_if_absent(&self, user: NewUser) -> RepoResult<Option<Uuid>> {
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"INSERT INTO users (id, email, display_name, photo_url, role)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (email) DO NOTHING
               RETURNING id"#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.photo_url)
        .bind(&user.role)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn set_user_role(&self, id: Uuid, role: &str) -> RepoResult<bool> {
        // IS DISTINCT FROM: rewriting the same role does not count as a modification.
        let result = sqlx::query(
            "UPDATE users SET role = $1 WHERE id = $2 AND role IS DISTINCT FROM $1",
        )
        .bind(role)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_classes(&self) -> RepoResult<Vec<ClassListing>> {
        let classes = sqlx::query_as::<_, ClassListing>(
            r#"SELECT id, class_name, class_image, instructor_name, instructor_email,
                      available_seats, price, status
                 FROM classes"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(classes)
    }

    async fn list_instructors(&self) -> RepoResult<Vec<Instructor>> {
        let instructors =
            sqlx::query_as::<_, Instructor>("SELECT id, name, email, image FROM instructors")
                .fetch_all(&self.pool)
                .await?;
        Ok(instructors)
    }

    async fn list_cart_items(&self, email: &str) -> RepoResult<Vec<CartItem>> {
        let rows = sqlx::query_as::<_, CartRow>(
            "SELECT id, email, item FROM carts WHERE email = $1 ORDER BY created_at",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CartItem::from).collect())
    }

    async fn insert_cart_item(&self, item: NewCartItem) -> RepoResult<Uuid> {
        let (email, details) = item.into_stored_details();
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO carts (id, email, item) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(Json(details))
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn delete_cart_item(&self, id: Uuid) -> RepoResult<u64> {
        let result = sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// --- In-Memory ---

#[derive(Default)]
struct Collections {
    users: Vec<User>,
    classes: Vec<ClassListing>,
    instructors: Vec<Instructor>,
    carts: Vec<CartItem>,
}

/// InMemoryRepository
///
/// A process-local store with the same semantics as [`PostgresRepository`]. Used by
/// the test suite and for running the API without a database. Counts every
/// operation so tests can assert that a rejected request never reached the store.
#[derive(Default)]
pub struct InMemoryRepository {
    collections: RwLock<Collections>,
    queries: AtomicUsize,
    /// When true, every operation returns `RepoError::Unavailable`.
    pub should_fail: bool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn with_catalog(classes: Vec<ClassListing>, instructors: Vec<Instructor>) -> Self {
        Self {
            collections: RwLock::new(Collections {
                classes,
                instructors,
                ..Collections::default()
            }),
            ..Self::default()
        }
    }

    /// Number of store operations served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Every stored cart item regardless of owner. Not counted as a store operation.
    pub async fn all_cart_items(&self) -> Vec<CartItem> {
        self.collections.read().await.carts.clone()
    }

    fn touch(&self) -> RepoResult<()> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(RepoError::Unavailable("simulated failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn list_users(&self) -> RepoResult<Vec<User>> {
        self.touch()?;
        Ok(self.collections.read().await.users.clone())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.touch()?;
        let collections = self.collections.read().await;
        Ok(collections.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user_if_absent(&self, user: NewUser) -> RepoResult<Option<Uuid>> {
        self.touch()?;
        let mut collections = self.collections.write().await;
        if collections.users.iter().any(|u| u.email == user.email) {
            return Ok(None);
        }

        let id = Uuid::new_v4();
        collections.users.push(User {
            id,
            email: user.email,
            display_name: user.display_name,
            photo_url: user.photo_url,
            role: user.role,
        });
        Ok(Some(id))
    }

    async fn set_user_role(&self, id: Uuid, role: &str) -> RepoResult<bool> {
        self.touch()?;
        let mut collections = self.collections.write().await;
        match collections.users.iter_mut().find(|u| u.id == id) {
            Some(user) if user.role.as_deref() != Some(role) => {
                user.role = Some(role.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_classes(&self) -> RepoResult<Vec<ClassListing>> {
        self.touch()?;
        Ok(self.collections.read().await.classes.clone())
    }

    async fn list_instructors(&self) -> RepoResult<Vec<Instructor>> {
        self.touch()?;
        Ok(self.collections.read().await.instructors.clone())
    }

    async fn list_cart_items(&self, email: &str) -> RepoResult<Vec<CartItem>> {
        self.touch()?;
        let collections = self.collections.read().await;
        Ok(collections
            .carts
            .iter()
            .filter(|item| item.email.as_deref() == Some(email))
            .cloned()
            .collect())
    }

    async fn insert_cart_item(&self, item: NewCartItem) -> RepoResult<Uuid> {
        self.touch()?;
        let (email, details) = item.into_stored_details();
        let id = Uuid::new_v4();
        self.collections
            .write()
            .await
            .carts
            .push(CartItem { id, email, details });
        Ok(id)
    }

    async fn delete_cart_item(&self, id: Uuid) -> RepoResult<u64> {
        self.touch()?;
        let mut collections = self.collections.write().await;
        let before = collections.carts.len();
        collections.carts.retain(|item| item.id != id);
        Ok((before - collections.carts.len()) as u64)
    }
}
