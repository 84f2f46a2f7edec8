use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::{FromRequestParts, State};
use axum::http::{StatusCode, header::AUTHORIZATION, request::Parts};
use axum::{Json, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::persistence;
use crate::state::AppState;
use crate::types::profile::Profile;

/// JWT claims: `sub` = user id (Uuid as string), `exp` (expiry), `iat` (issued at).
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authenticated user extracted from JWT Bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// Stored login (hydrated from the users table or seeded from env).
#[derive(Clone)]
pub struct AuthUserCredential {
    pub user_id: Uuid,
    pub username: String,
    pub password_hash: String,
}

const JWT_EXPIRY_HOURS: i64 = 24;

impl Claims {
    pub fn new(user_id: Uuid) -> Self {
        let now = chrono::Utc::now();
        let exp = (now + chrono::Duration::hours(JWT_EXPIRY_HOURS)).timestamp();
        Self {
            sub: user_id.to_string(),
            exp,
            iat: now.timestamp(),
        }
    }
}

pub fn create_token(secret: &[u8], user_id: Uuid) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims::new(user_id);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

pub fn decode_token(secret: &[u8], token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(token_data.claims)
}

/// Resolve a raw token to the user it was issued for.
pub fn user_from_token(secret: &[u8], token: &str) -> Option<AuthUser> {
    let claims = decode_token(secret, token).ok()?;
    let user_id = Uuid::parse_str(&claims.sub).ok()?;
    Some(AuthUser { user_id })
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;
        user_from_token(&state.jwt_secret, token.trim()).ok_or(ApiError::Unauthorized)
    }
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    user_id: Uuid,
    username: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    user_id: Uuid,
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.trim().to_lowercase();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username and password are required".to_string(),
        ));
    }

    if state.user_store.read().await.contains_key(&username) {
        return Err(ApiError::BadRequest("username already taken".to_string()));
    }

    // Hashing is deliberately slow; keep it off the runtime and outside the
    // user store lock so logins are not held up.
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let user_id = Uuid::new_v4();
    let profile = Profile::new(user_id, &username);

    if let Some(pool) = &state.db {
        let balance = state.futures.read().await.initial_balance();
        if !persistence::insert_user(pool, user_id, &username, &password_hash).await? {
            return Err(ApiError::BadRequest("username already taken".to_string()));
        }
        persistence::upsert_profile(pool, &profile, balance).await?;
    }

    {
        // Another registration for the same name may have finished meanwhile.
        let mut users = state.user_store.write().await;
        if users.contains_key(&username) {
            return Err(ApiError::BadRequest("username already taken".to_string()));
        }
        users.insert(
            username.clone(),
            AuthUserCredential {
                user_id,
                username: username.clone(),
                password_hash,
            },
        );
    }
    state.profiles.write().await.insert(user_id, profile);

    info!(%user_id, %username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id, username }),
    ))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<Json<impl Serialize>> {
    let username = req.username.trim().to_lowercase();
    let cred = state
        .user_store
        .read()
        .await
        .get(&username)
        .cloned()
        .ok_or(ApiError::Unauthorized)?;

    if !verify_password(&req.password, &cred.password_hash) {
        return Err(ApiError::Unauthorized);
    }

    let token = create_token(&state.jwt_secret, cred.user_id)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(LoginResponse {
        token,
        user_id: cred.user_id,
    }))
}
