//! # Auth API Handlers
//!
//! Registration (tenant + first admin), login, token refresh and `me`.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use chrono::{Duration, Utc};
use metrics::counter;
use sea_orm::{DatabaseTransaction, TransactionTrait};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::CurrentUser;
use crate::error::{ApiError, RepositoryError, bad_request, forbidden, internal_error, unauthorized};
use crate::models::tenant::{TenantPlan, slugify};
use crate::models::user::{Model as UserModel, UserRole};
use crate::password::{self, MIN_PASSWORD_LEN};
use crate::repositories::{CreateTenantRequest, CreateUserRequest, TenantRepository, UserRepository};
use crate::server::AppState;
use crate::tokens::{TokenError, TokenPair, TokenType};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "ana@acme.io")]
    pub email: String,
    pub password: String,
    #[schema(example = "Acme Corp")]
    pub tenant_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `bearer`
    #[schema(example = "bearer")]
    pub token_type: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Register a tenant together with its first (admin) user
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Tenant and user created", body = TokenResponse),
        (status = 400, description = "Invalid input, email registered or tenant name taken", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(request) = body?;
    let email = normalize_email(&request.email);
    if !is_valid_email(&email) {
        return Err(bad_request("Invalid email address"));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(bad_request("Password must be at least 8 characters"));
    }
    let tenant_name = request.tenant_name.trim().to_string();
    if tenant_name.is_empty() {
        return Err(bad_request("Tenant name is required"));
    }
    let slug = slugify(&tenant_name);

    let password_hash = hash_blocking(request.password).await?;

    let txn = state.db.begin().await?;
    let user = create_tenant_with_admin(&txn, &state, tenant_name, slug, email, password_hash).await?;
    txn.commit().await?;

    counter!("auth_registrations_total").increment(1);
    tracing::info!(user_id = %user.id, tenant_id = %user.tenant_id, "Registered tenant");

    issue_tokens(&state, &user)
}

async fn create_tenant_with_admin(
    txn: &DatabaseTransaction,
    state: &AppState,
    tenant_name: String,
    slug: String,
    email: String,
    password_hash: String,
) -> Result<UserModel, ApiError> {
    let users = UserRepository::new(txn);
    let tenants = TenantRepository::new(txn);

    if users.find_by_email(&email).await?.is_some() {
        return Err(bad_request("Email already registered"));
    }
    if tenants.slug_exists(&slug).await? {
        return Err(bad_request("Tenant name is already taken"));
    }

    let tenant = tenants
        .create_tenant(CreateTenantRequest {
            name: tenant_name,
            slug,
            plan: TenantPlan::Demo,
            trial_ends_at: Some(Utc::now() + Duration::days(state.config.trial_days)),
        })
        .await
        .map_err(|err| match err {
            RepositoryError::Conflict(_) => bad_request("Tenant name is already taken"),
            RepositoryError::Validation(message) => bad_request(&message),
            other => other.into(),
        })?;

    users
        .create_user(CreateUserRequest {
            tenant_id: tenant.id,
            email,
            password_hash,
            role: UserRole::Admin,
        })
        .await
        .map_err(|err| match err {
            RepositoryError::Conflict(_) => bad_request("Email already registered"),
            other => other.into(),
        })
}

/// Exchange email and password for a token pair
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = ApiError),
        (status = 403, description = "User inactive", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(request) = body?;
    let email = normalize_email(&request.email);
    let user = UserRepository::new(&state.db).find_by_email(&email).await?;

    let Some(user) = user else {
        counter!("auth_logins_total", "outcome" => "failure").increment(1);
        return Err(unauthorized(Some("Invalid credentials")));
    };

    if !verify_blocking(request.password, user.password_hash.clone()).await? {
        counter!("auth_logins_total", "outcome" => "failure").increment(1);
        return Err(unauthorized(Some("Invalid credentials")));
    }

    if !user.is_active {
        return Err(forbidden(Some("User inactive")));
    }

    counter!("auth_logins_total", "outcome" => "success").increment(1);
    issue_tokens(&state, &user)
}

/// Trade a refresh token for a fresh token pair
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 401, description = "Invalid refresh token, wrong token type or unknown user", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(request) = body?;
    let claims = state
        .tokens
        .verify(&request.refresh_token, TokenType::Refresh)
        .map_err(|err| match err {
            TokenError::WrongType { .. } => unauthorized(Some("Invalid token type")),
            _ => unauthorized(Some("Invalid refresh token")),
        })?;

    let user = UserRepository::new(&state.db)
        .get_by_id(claims.sub)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| unauthorized(Some("User not found")))?;

    issue_tokens(&state, &user)
}

/// The authenticated user
#[utoipa::path(
    get,
    path = "/auth/me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = CurrentUser),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 402, description = "Trial expired", body = ApiError),
        (status = 403, description = "Tenant inactive", body = ApiError)
    ),
    tag = "auth"
)]
pub async fn me(user: CurrentUser) -> Json<CurrentUser> {
    Json(user)
}

fn issue_tokens(state: &AppState, user: &UserModel) -> Result<Json<TokenResponse>, ApiError> {
    let pair = state
        .tokens
        .issue_pair(user.id, user.tenant_id, user.role)
        .map_err(|err| {
            tracing::error!(error = %err, "Failed to issue tokens");
            internal_error("Failed to issue tokens")
        })?;
    Ok(Json(pair.into()))
}

async fn hash_blocking(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|err| internal_error(&format!("Password hashing task failed: {err}")))?
        .map_err(|err| {
            tracing::error!(error = %err, "Password hashing failed");
            internal_error("Password hashing failed")
        })
}

/// Malformed stored hashes count as a mismatch.
async fn verify_blocking(password: String, stored_hash: String) -> Result<bool, ApiError> {
    let outcome = tokio::task::spawn_blocking(move || password::verify_password(&password, &stored_hash))
        .await
        .map_err(|err| internal_error(&format!("Password verification task failed: {err}")))?;

    Ok(outcome.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Stored password hash is unreadable");
        false
    }))
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// One `@`, a non-empty local part and a dotted domain, no whitespace.
pub(crate) fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        && !domain.ends_with('.')
}
