use serde::{Deserialize, Serialize};

use crate::store::User;

/// Request body for account creation.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub fname: String,
    pub lname: String,
    pub email: String,
    pub password: String,
}

/// Request body for sign-in.
#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

/// Response returned after signup or signin.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}
