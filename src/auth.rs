//! # Authentication and Authorization
//!
//! Bearer-token middleware for protected endpoints plus the tenant access
//! policy (inactive tenants and expired demo trials are locked out).

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, forbidden, payment_required, unauthorized};
use crate::models::tenant::Model as TenantModel;
use crate::models::user::UserRole;
use crate::repositories::{TenantRepository, UserRepository};
use crate::server::AppState;
use crate::tokens::{TokenError, TokenType};

/// The authenticated caller, as loaded by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub tenant_id: Uuid,
    pub role: UserRole,
}

/// Authentication middleware that validates access tokens and tenant standing
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = {
        let token = extract_bearer_token(request.headers())?;
        state
            .tokens
            .verify(token, TokenType::Access)
            .map_err(|err| token_rejection(&err))?
    };

    let user = UserRepository::new(&state.db)
        .get_by_id(claims.sub)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(|| unauthorized(Some("User not found")))?;

    let tenant = TenantRepository::new(&state.db)
        .get_tenant_by_id(user.tenant_id)
        .await?
        .ok_or_else(|| unauthorized(Some("User not found")))?;
    check_tenant_access(&tenant)?;

    tracing::debug!(user_id = %user.id, tenant_id = %user.tenant_id, "Authenticated request");

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
        tenant_id: user.tenant_id,
        role: user.role,
    });

    Ok(next.run(request).await)
}

/// Inactive tenants get 403; demo tenants past their trial get 402.
pub fn check_tenant_access(tenant: &TenantModel) -> Result<(), ApiError> {
    if !tenant.is_active {
        return Err(forbidden(Some("Tenant inactive")));
    }
    if tenant.trial_expired() {
        return Err(payment_required("Trial expired"));
    }
    Ok(())
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized(Some("Missing Authorization header")))?
        .to_str()
        .map_err(|_| unauthorized(Some("Invalid Authorization header")))?;

    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| unauthorized(Some("Authorization header must use Bearer scheme")))
}

fn token_rejection(error: &TokenError) -> ApiError {
    match error {
        TokenError::WrongType { .. } => unauthorized(Some("Invalid token type")),
        _ => unauthorized(Some("Invalid token")),
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| unauthorized(Some("Authentication required")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db;
    use crate::models::tenant::TenantPlan;
    use crate::repositories::{CreateTenantRequest, CreateUserRequest};
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use chrono::{Duration, Utc};
    use tower::ServiceExt;

    struct Fixture {
        state: AppState,
        user_id: Uuid,
        tenant_id: Uuid,
    }

    async fn fixture(plan: TenantPlan, trial_ends_at: Option<chrono::DateTime<Utc>>) -> Fixture {
        let config = AppConfig {
            profile: "test".to_string(),
            database_url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        let db = db::init_pool(&config).await.unwrap();
        db::run_migrations(&db).await.unwrap();

        let tenant = TenantRepository::new(&db)
            .create_tenant(CreateTenantRequest {
                name: "Acme".to_string(),
                slug: "acme".to_string(),
                plan,
                trial_ends_at,
            })
            .await
            .unwrap();
        let user = UserRepository::new(&db)
            .create_user(CreateUserRequest {
                tenant_id: tenant.id,
                email: "ana@acme.test".to_string(),
                password_hash: "unused".to_string(),
                role: UserRole::Admin,
            })
            .await
            .unwrap();

        let state = AppState::new(config, db, None).unwrap();
        Fixture {
            state,
            user_id: user.id,
            tenant_id: tenant.id,
        }
    }

    async fn whoami(user: CurrentUser) -> String {
        user.email
    }

    async fn call(state: &AppState, authorization: Option<String>) -> Response {
        let app = Router::new()
            .route("/me", get(whoami))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ))
            .with_state(state.clone());

        let mut request = Request::builder().uri("/me");
        if let Some(value) = authorization {
            request = request.header("Authorization", value);
        }
        app.oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn bearer(fixture: &Fixture, token_type: TokenType) -> Option<String> {
        let token = fixture
            .state
            .tokens
            .issue(fixture.user_id, fixture.tenant_id, UserRole::Admin, token_type)
            .unwrap();
        Some(format!("Bearer {token}"))
    }

    #[tokio::test]
    async fn valid_access_token_passes_through() {
        let f = fixture(TenantPlan::Paid, None).await;
        let response = call(&f.state, bearer(&f, TokenType::Access)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"ana@acme.test");
    }

    #[tokio::test]
    async fn missing_or_malformed_header_returns_401() {
        let f = fixture(TenantPlan::Paid, None).await;
        assert_eq!(call(&f.state, None).await.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            call(&f.state, Some("Basic dGVzdDoxMjM=".to_string())).await.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            call(&f.state, Some("Bearer not-a-jwt".to_string())).await.status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn refresh_token_is_rejected_as_access() {
        let f = fixture(TenantPlan::Paid, None).await;
        let response = call(&f.state, bearer(&f, TokenType::Refresh)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn inactive_user_returns_401() {
        let f = fixture(TenantPlan::Paid, None).await;
        UserRepository::new(&f.state.db)
            .set_active(f.user_id, false)
            .await
            .unwrap();
        let response = call(&f.state, bearer(&f, TokenType::Access)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn inactive_tenant_returns_403() {
        let f = fixture(TenantPlan::Paid, None).await;
        TenantRepository::new(&f.state.db)
            .set_active(f.tenant_id, false)
            .await
            .unwrap();
        let response = call(&f.state, bearer(&f, TokenType::Access)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn expired_demo_trial_returns_402() {
        let f = fixture(TenantPlan::Demo, Some(Utc::now() - Duration::days(1))).await;
        let response = call(&f.state, bearer(&f, TokenType::Access)).await;
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn running_demo_trial_passes() {
        let f = fixture(TenantPlan::Demo, Some(Utc::now() + Duration::days(3))).await;
        let response = call(&f.state, bearer(&f, TokenType::Access)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
