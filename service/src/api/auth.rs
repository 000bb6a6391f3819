use super::{ApiError, ApiResult, AppState};
use axum::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub data: &'static str,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(axum::http::StatusCode, Json<RegisterResponse>)> {
    if req.username.is_empty() || req.token.is_empty() {
        return Err(ApiError::bad_request("username and token are required"));
    }

    let encrypted = state
        .vault
        .encrypt(&req.token)
        .map_err(ApiError::internal)?;

    state
        .tenants
        .create(&req.username, &encrypted)
        .await
        .map_err(|err| {
            let message = err.to_string();
            if message.contains("already exists") {
                ApiError::conflict("username already exists")
            } else {
                ApiError::internal(message)
            }
        })?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            data: "User registered successfully",
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginData {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub data: LoginData,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let tenant = state
        .tenants
        .find_by_username(&req.username)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::unauthorized("invalid username or token"))?;

    let decrypted = state
        .vault
        .decrypt(&tenant.encrypted_token)
        .map_err(ApiError::internal)?;

    // Constant-time comparison, resolving the login-comparison Open Question: a
    // variable-time `==` here would leak how many leading bytes of the submitted
    // token matched the stored one. `ct_eq` panics on a length mismatch, so that
    // check alone stays variable-time (it leaks length only, not content).
    let matches = decrypted.len() == req.token.len()
        && bool::from(decrypted.as_bytes().ct_eq(req.token.as_bytes()));
    if !matches {
        return Err(ApiError::unauthorized("invalid username or token"));
    }

    let jwt = state.signer.issue(tenant.id).map_err(ApiError::internal)?;

    Ok(Json(LoginResponse {
        success: true,
        data: LoginData { token: jwt },
    }))
}

/// Bearer-JWT auth extractor for `/api/tasks*`.
pub struct AuthUser {
    pub user_id: i64,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("malformed authorization header"))?;

        let claims = state.signer.verify(token).map_err(|err| {
            tracing::warn!(error = %err, "invalid bearer token");
            ApiError::unauthorized("invalid bearer token")
        })?;

        Ok(AuthUser {
            user_id: claims.user_id,
        })
    }
}
