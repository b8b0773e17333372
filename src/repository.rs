use crate::errors::StoreError;
use crate::models::{CommentId, Credential, NewUser, PostId, UserId};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Repository Trait
///
/// The relational-store contract consumed by the auth core: credential lookups and
/// mutations, the admin-role lookup, and primary-key ownership resolution for posts and
/// comments. Point lookups report a missing row as `StoreError::NoRows`, never as a
/// generic failure.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable and usable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Credentials ---
    async fn username_exists(&self, username: &str) -> Result<bool, StoreError>;
    async fn email_exists(&self, email: &str) -> Result<bool, StoreError>;
    /// Inserts the credential and its profile atomically. A taken username or email is
    /// reported as `StoreError::UniqueViolation` by the store's own constraint.
    async fn create_user(&self, user: NewUser) -> Result<UserId, StoreError>;
    async fn get_credential_by_username(&self, username: &str) -> Result<Credential, StoreError>;
    async fn get_credential(&self, id: UserId) -> Result<Credential, StoreError>;
    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<(), StoreError>;
    /// An email held by another credential is a `StoreError::UniqueViolation`.
    async fn update_email(&self, id: UserId, email: &str) -> Result<(), StoreError>;

    // --- Roles ---
    /// An unknown user is not an admin.
    async fn is_admin(&self, id: UserId) -> Result<bool, StoreError>;

    // --- Ownership ---
    async fn get_post_owner(&self, post_id: PostId) -> Result<UserId, StoreError>;
    /// Owner of a comment, scoped to the post it was made on.
    async fn get_comment_owner(&self, post_id: PostId, comment_id: CommentId) -> Result<UserId, StoreError>;

    // --- Content removal (authorization already decided by the caller) ---
    async fn delete_post(&self, post_id: PostId) -> Result<bool, StoreError>;
    async fn delete_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<bool, StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// Expects the schema:
/// - `users (id BIGSERIAL PK, username TEXT UNIQUE, password TEXT, email TEXT UNIQUE, is_admin BOOL DEFAULT false)`
/// - `user_profiles (user_id BIGINT PK REFERENCES users, name, surname, description, profile_image_url, gender, birth DATE)`
/// - `posts (id BIGSERIAL PK, creator_id BIGINT REFERENCES users, ...)`
/// - `comments (id BIGSERIAL PK, post_id BIGINT REFERENCES posts, author_id BIGINT REFERENCES users, ...)`
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// create_user
    ///
    /// Inserts the `users` row and the `user_profiles` row in one transaction. If the task is
    /// cancelled mid-way the transaction is dropped and rolled back.
    async fn create_user(&self, user: NewUser) -> Result<UserId, StoreError> {
        let mut tx = self.pool.begin().await?;

        let id: UserId = sqlx::query_scalar(
            "INSERT INTO users (username, password, email) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .fetch_one(&mut *tx)
        .await?;

        let profile = &user.profile;
        sqlx::query(
            r#"
            INSERT INTO user_profiles (user_id, name, surname, description, profile_image_url, gender, birth)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(&profile.name)
        .bind(&profile.surname)
        .bind(&profile.description)
        .bind(&profile.profile_image)
        .bind(profile.gender.as_str())
        .bind(profile.birth_date)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    async fn get_credential_by_username(&self, username: &str) -> Result<Credential, StoreError> {
        let credential = sqlx::query_as::<_, Credential>(
            "SELECT id, username, email, password AS password_hash, is_admin FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(credential)
    }

    async fn get_credential(&self, id: UserId) -> Result<Credential, StoreError> {
        let credential = sqlx::query_as::<_, Credential>(
            "SELECT id, username, email, password AS password_hash, is_admin FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(credential)
    }

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<(), StoreError> {
        let res = sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NoRows);
        }
        Ok(())
    }

    async fn update_email(&self, id: UserId, email: &str) -> Result<(), StoreError> {
        let res = sqlx::query("UPDATE users SET email = $1 WHERE id = $2")
            .bind(email)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NoRows);
        }
        Ok(())
    }

    async fn is_admin(&self, id: UserId) -> Result<bool, StoreError> {
        let is_admin: Option<bool> = sqlx::query_scalar("SELECT is_admin FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(is_admin.unwrap_or(false))
    }

    async fn get_post_owner(&self, post_id: PostId) -> Result<UserId, StoreError> {
        let owner: UserId = sqlx::query_scalar("SELECT creator_id FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(owner)
    }

    async fn get_comment_owner(&self, post_id: PostId, comment_id: CommentId) -> Result<UserId, StoreError> {
        let owner: UserId = sqlx::query_scalar("SELECT author_id FROM comments WHERE id = $1 AND post_id = $2")
            .bind(comment_id)
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(owner)
    }

    async fn delete_post(&self, post_id: PostId) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1 AND post_id = $2")
            .bind(comment_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

// --- In-Memory Implementation ---

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, Credential>,
    posts: HashMap<PostId, UserId>,
    // comment id -> (post id, author id)
    comments: HashMap<CommentId, (PostId, UserId)>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// InMemoryRepository
///
/// A process-local stand-in for `PostgresRepository`, used by tests and by local runs
/// without a database. The lock is never held across an await.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
    /// When true, every operation fails with a backend error.
    pub should_fail: AtomicBool,
    /// When true, only the admin-role lookup fails.
    pub fail_admin_lookup: AtomicBool,
    /// When true, `username_exists` and `email_exists` always answer false, as if a
    /// concurrent write had not yet committed. The unique constraints still apply.
    pub stale_existence_check: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(
                "Mock Repository Error: Simulation requested".to_string(),
            ));
        }
        self.tables
            .lock()
            .map_err(|_| StoreError::Backend("in-memory tables poisoned".to_string()))
    }

    /// Seed a post owned by `owner`. Returns its id.
    pub fn insert_post(&self, owner: UserId) -> PostId {
        let mut t = self.tables.lock().unwrap_or_else(|p| p.into_inner());
        let id = t.next_id();
        t.posts.insert(id, owner);
        id
    }

    /// Seed a comment by `author` on `post_id`. Returns its id.
    pub fn insert_comment(&self, post_id: PostId, author: UserId) -> CommentId {
        let mut t = self.tables.lock().unwrap_or_else(|p| p.into_inner());
        let id = t.next_id();
        t.comments.insert(id, (post_id, author));
        id
    }

    /// Grant or revoke the admin role.
    pub fn set_admin(&self, id: UserId, is_admin: bool) {
        let mut t = self.tables.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(user) = t.users.get_mut(&id) {
            user.is_admin = is_admin;
        }
    }
}

fn unique_violation(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: Some(constraint.to_string()),
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        let t = self.tables()?;
        if self.stale_existence_check.load(Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(t.users.values().any(|u| u.username == username))
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        let t = self.tables()?;
        if self.stale_existence_check.load(Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(t.users.values().any(|u| u.email == email))
    }

    async fn create_user(&self, user: NewUser) -> Result<UserId, StoreError> {
        let mut t = self.tables()?;
        if t.users.values().any(|u| u.username == user.username) {
            return Err(unique_violation("users_username_key"));
        }
        if t.users.values().any(|u| u.email == user.email) {
            return Err(unique_violation("users_email_key"));
        }
        let id = t.next_id();
        t.users.insert(
            id,
            Credential {
                id,
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
                is_admin: false,
            },
        );
        Ok(id)
    }

    async fn get_credential_by_username(&self, username: &str) -> Result<Credential, StoreError> {
        let t = self.tables()?;
        t.users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(StoreError::NoRows)
    }

    async fn get_credential(&self, id: UserId) -> Result<Credential, StoreError> {
        let t = self.tables()?;
        t.users.get(&id).cloned().ok_or(StoreError::NoRows)
    }

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        let user = t.users.get_mut(&id).ok_or(StoreError::NoRows)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn update_email(&self, id: UserId, email: &str) -> Result<(), StoreError> {
        let mut t = self.tables()?;
        if t.users.values().any(|u| u.id != id && u.email == email) {
            return Err(unique_violation("users_email_key"));
        }
        let user = t.users.get_mut(&id).ok_or(StoreError::NoRows)?;
        user.email = email.to_string();
        Ok(())
    }

    async fn is_admin(&self, id: UserId) -> Result<bool, StoreError> {
        let t = self.tables()?;
        if self.fail_admin_lookup.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("Mock Repository Error: admin lookup".to_string()));
        }
        Ok(t.users.get(&id).map(|u| u.is_admin).unwrap_or(false))
    }

    async fn get_post_owner(&self, post_id: PostId) -> Result<UserId, StoreError> {
        let t = self.tables()?;
        t.posts.get(&post_id).copied().ok_or(StoreError::NoRows)
    }

    async fn get_comment_owner(&self, post_id: PostId, comment_id: CommentId) -> Result<UserId, StoreError> {
        let t = self.tables()?;
        match t.comments.get(&comment_id) {
            Some((post, author)) if *post == post_id => Ok(*author),
            _ => Err(StoreError::NoRows),
        }
    }

    async fn delete_post(&self, post_id: PostId) -> Result<bool, StoreError> {
        let mut t = self.tables()?;
        let removed = t.posts.remove(&post_id).is_some();
        t.comments.retain(|_, (post, _)| *post != post_id);
        Ok(removed)
    }

    async fn delete_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<bool, StoreError> {
        let mut t = self.tables()?;
        let on_post = matches!(t.comments.get(&comment_id), Some((post, _)) if *post == post_id);
        if on_post {
            t.comments.remove(&comment_id);
        }
        Ok(on_post)
    }
}
