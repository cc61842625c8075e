use axum::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// User record owned by the store. The raw password never reaches this type;
/// `password_hash` is excluded from every serialized response.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub fname: String,
    pub lname: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    /// Create a user unless the email is already taken, in one atomic step.
    /// Returns `None` when another record holds the email.
    async fn insert_if_absent(
        &self,
        fname: &str,
        lname: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>>;
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, fname, lname, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_if_absent(
        &self,
        fname: &str,
        lname: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        // Leans on the unique index over users.email; a losing concurrent
        // insert comes back as no row.
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (fname, lname, email, password_hash)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, fname, lname, email, password_hash, created_at
            "#,
        )
        .bind(fname)
        .bind(lname)
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

/// In-memory store backing `AppState::fake` in tests.
#[derive(Default)]
pub struct MemStore {
    users: std::sync::Mutex<Vec<User>>,
}

impl MemStore {
    pub fn user_count(&self) -> usize {
        self.users.lock().expect("users mutex poisoned").len()
    }
}

#[async_trait]
impl UserStore for MemStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().expect("users mutex poisoned");
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_if_absent(
        &self,
        fname: &str,
        lname: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().expect("users mutex poisoned");
        if users.iter().any(|u| u.email == email) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            fname: fname.to_string(),
            lname: lname.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(Some(user))
    }
}
