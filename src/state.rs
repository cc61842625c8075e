use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::jwt::JwtKeys;
use crate::config::AppConfig;
use crate::store::{MemStore, PgStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub jwt: JwtKeys,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let jwt = JwtKeys::from_secret(&config.jwt_secret)?;

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run database migrations")?;

        Ok(Self::from_parts(Arc::new(PgStore::new(db)), jwt))
    }

    pub fn from_parts(store: Arc<dyn UserStore>, jwt: JwtKeys) -> Self {
        Self { store, jwt }
    }

    pub fn fake() -> Self {
        let jwt = JwtKeys::from_secret("test-secret").expect("static test secret");
        Self::from_parts(Arc::new(MemStore::default()), jwt)
    }
}
