use axum::{ extract::State, http::StatusCode, response::IntoResponse, Extension, Json };
use chrono::Utc;
use mongodb::bson::{ doc, oid::ObjectId };
use serde::{ Deserialize, Serialize };

use crate::{
    db::AppState,
    error::{ AppError, Result },
    models::{ Claims, User, UserResponse },
    services::auth_service,
};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: UserResponse,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>
) -> Result<impl IntoResponse> {
    let username = payload.username.trim();
    let email = payload.email.trim().to_lowercase();

    if username.is_empty() {
        return Err(AppError::ValidationError("Username is required".to_string()));
    }
    if !email.contains('@') {
        return Err(AppError::ValidationError("A valid email is required".to_string()));
    }
    if payload.password.len() < 8 {
        return Err(
            AppError::ValidationError("Password must be at least 8 characters".to_string())
        );
    }

    let users = state.db.collection::<User>("users");

    let existing = users
        .find_one(doc! { "email": &email }, None).await
        .map_err(|e| AppError::InternalError(e.into()))?;
    if existing.is_some() {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }

    let now = Utc::now();
    let mut user = User {
        id: None,
        username: username.to_string(),
        email,
        password_hash: auth_service::hash_password(&payload.password)?,
        created_at: now,
        updated_at: now,
    };

    let result = users
        .insert_one(&user, None).await
        .map_err(|e| AppError::InternalError(e.into()))?;
    user.id = result.inserted_id.as_object_id();

    let token = auth_service::generate_jwt_token(&user, &state.config)?;

    tracing::info!(user_id = %user.id.map(|id| id.to_hex()).unwrap_or_default(), "User registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            token,
            user: user.into(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>
) -> Result<impl IntoResponse> {
    let email = payload.email.trim().to_lowercase();

    let users = state.db.collection::<User>("users");

    let user = users
        .find_one(doc! { "email": &email }, None).await
        .map_err(|e| AppError::InternalError(e.into()))?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

    if !auth_service::verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::Unauthorized("Invalid email or password".to_string()));
    }

    let token = auth_service::generate_jwt_token(&user, &state.config)?;

    tracing::info!(user_id = %user.id.map(|id| id.to_hex()).unwrap_or_default(), "User logged in");

    Ok((
        StatusCode::OK,
        Json(AuthResponse {
            success: true,
            token,
            user: user.into(),
        }),
    ))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>
) -> Result<impl IntoResponse> {
    let user_id = ObjectId::parse_str(&claims.sub).map_err(|_|
        AppError::BadRequest("Invalid user ID".to_string())
    )?;

    let user = state.db
        .collection::<User>("users")
        .find_one(doc! { "_id": user_id }, None).await
        .map_err(|e| AppError::InternalError(e.into()))?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "user": UserResponse::from(user),
    })))
}
