use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::auth::{
    dto::{AuthResponse, SigninRequest, SignupRequest},
    error::AuthError,
    jwt::JwtKeys,
    password::{hash_password, verify_password},
};
use crate::state::AppState;
use crate::store::UserStore;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(sign_up))
        .route("/signin", post(sign_in))
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    if state.store.find_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "signup email already registered");
        return Err(AuthError::Conflict);
    }

    let hash = hash_password(&payload.password).map_err(AuthError::Crypto)?;

    // Losing a duplicate-email race against another signup surfaces as no row.
    let user = state
        .store
        .insert_if_absent(&payload.fname, &payload.lname, &payload.email, &hash)
        .await?
        .ok_or(AuthError::Conflict)?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

#[instrument(skip(state, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SigninRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let user = match state.store.find_by_email(&payload.email).await? {
        Some(user) => user,
        None => {
            warn!(email = %payload.email, "signin unknown email");
            return Err(AuthError::NotFound);
        }
    };

    let ok = verify_password(&payload.password, &user.password_hash).map_err(AuthError::Crypto)?;
    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "signin invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user signed in");
    Ok(Json(AuthResponse { user, token }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use std::sync::Arc;

    fn fake_with_store() -> (AppState, Arc<MemStore>) {
        let store = Arc::new(MemStore::default());
        let keys = JwtKeys::from_secret("test-secret").expect("static test secret");
        (AppState::from_parts(store.clone(), keys), store)
    }

    fn signup_body(email: &str) -> SignupRequest {
        SignupRequest {
            fname: "A".into(),
            lname: "B".into(),
            email: email.into(),
            password: "secret1".into(),
        }
    }

    #[tokio::test]
    async fn signup_creates_user_and_issues_token() {
        let state = AppState::fake();
        let (status, Json(body)) = sign_up(State(state.clone()), Json(signup_body("a@b.com")))
            .await
            .expect("signup should succeed");

        assert_eq!(status, StatusCode::CREATED);
        let claims = state.jwt.verify(&body.token).expect("token should verify");
        assert_eq!(claims.sub, body.user.id);

        let stored = state
            .store
            .find_by_email("a@b.com")
            .await
            .expect("lookup should succeed")
            .expect("record should exist");
        assert_eq!(stored.id, body.user.id);
        assert_ne!(stored.password_hash, "secret1");
    }

    #[tokio::test]
    async fn signup_rejects_duplicate_email() {
        let (state, store) = fake_with_store();
        sign_up(State(state.clone()), Json(signup_body("a@b.com")))
            .await
            .expect("first signup should succeed");

        let err = sign_up(State(state), Json(signup_body("a@b.com")))
            .await
            .expect_err("second signup should fail");
        assert!(matches!(err, AuthError::Conflict));
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn signin_returns_token_for_valid_credentials() {
        let state = AppState::fake();
        sign_up(State(state.clone()), Json(signup_body("a@b.com")))
            .await
            .expect("signup should succeed");

        let Json(body) = sign_in(
            State(state.clone()),
            Json(SigninRequest {
                email: "a@b.com".into(),
                password: "secret1".into(),
            }),
        )
        .await
        .expect("signin should succeed");

        let claims = state.jwt.verify(&body.token).expect("token should verify");
        assert_eq!(claims.sub, body.user.id);
    }

    #[tokio::test]
    async fn signin_rejects_wrong_password() {
        let state = AppState::fake();
        sign_up(State(state.clone()), Json(signup_body("a@b.com")))
            .await
            .expect("signup should succeed");

        let err = sign_in(
            State(state),
            Json(SigninRequest {
                email: "a@b.com".into(),
                password: "wrong".into(),
            }),
        )
        .await
        .expect_err("wrong password should fail");
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn signin_rejects_unknown_email() {
        let state = AppState::fake();
        let err = sign_in(
            State(state),
            Json(SigninRequest {
                email: "nobody@b.com".into(),
                password: "secret1".into(),
            }),
        )
        .await
        .expect_err("unknown email should fail");
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn concurrent_signups_create_at_most_one_user() {
        let (state, store) = fake_with_store();
        let first = tokio::spawn(sign_up(
            State(state.clone()),
            Json(signup_body("dup@b.com")),
        ));
        let second = tokio::spawn(sign_up(
            State(state.clone()),
            Json(signup_body("dup@b.com")),
        ));

        let results = [
            first.await.expect("task should finish"),
            second.await.expect("task should finish"),
        ];
        let created = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(created, 1);
        assert_eq!(store.user_count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, AuthError::Conflict)));
    }
}
