use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::infrastructure::auth::JwtManager;
use crate::infrastructure::config::Config;
use crate::{error::AppError, infrastructure::repositories::AccountRepository};
use uuid::Uuid;

/// Caller context injected into request extensions after authentication
#[derive(Debug, Clone)]
pub struct AuthAccount {
    pub account_id: Uuid,
    pub email: String,
}

/// Authentication middleware for the caller-facing API
pub async fn auth_middleware(
    State((account_repo, config)): State<(Arc<AccountRepository>, Arc<Config>)>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)?;

    let jwt_manager = JwtManager::new(config.jwt_secret.clone(), config.jwt_expiration_hours);

    let claims = jwt_manager.validate_token(token)?;
    let account_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid account ID in token".to_string()))?;

    // Verify the account exists in the database
    let account = account_repo
        .find_by_id(account_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account not found".to_string()))?;

    request.extensions_mut().insert(AuthAccount {
        account_id: account.id,
        email: account.email,
    });

    Ok(next.run(request).await)
}

/// Bearer-token middleware for the administrative surface
pub async fn admin_middleware(
    State(config): State<Arc<Config>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)?;

    if token != config.admin_token {
        return Err(AppError::Unauthorized("Invalid admin token".to_string()));
    }

    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Result<&str, AppError> {
    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    if !auth_header.starts_with("Bearer ") {
        return Err(AppError::Unauthorized(
            "Invalid authorization format".to_string(),
        ));
    }

    Ok(&auth_header[7..])
}
