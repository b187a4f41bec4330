//! # IAM HTTP Server
//!
//! HTTP server for the IAM core: authentication flows, authorization
//! checks, and policy administration.
//!
//! ## Endpoints
//!
//! - `POST /v1/auth/register` - Create an account
//! - `POST /v1/auth/login` - Exchange credentials for a token pair
//! - `POST /v1/auth/refresh` - Rotate a token pair
//! - `POST /v1/auth/logout` - Revoke cached tokens
//! - `POST /v1/check` - Authorization check
//! - `POST /v1/policies` / `DELETE /v1/policies` - Policy rules
//! - `POST /v1/roles` / `DELETE /v1/roles` - Role assignments
//! - `GET /v1/users/:id/roles` - Transitive role closure
//! - `GET /v1/users/:id/permissions` - Flattened permissions
//! - `GET /health` - Health check
//!
//! ## Configuration
//!
//! Environment variables (see `iam_core::Config`):
//! - `IAM_SERVER_HOST` / `IAM_SERVER_PORT` - Bind address (default 0.0.0.0:8080)
//! - `IAM_JWT_SECRET` - HS256 signing secret (required)
//! - `IAM_JWT_ACCESS_TTL_SECS` / `IAM_JWT_REFRESH_TTL_SECS` - Token lifetimes
//! - `IAM_REDIS_URL` - Optional token cache backend (redis-cache feature)
//! - `RUST_LOG` - Log level (default: info)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    serve, Router,
};
use iam_core::{
    auth::{Argon2Hasher, MemoryUserDirectory},
    rbac::MemoryAdapter,
    token::TokenCache,
    AccessDecision, AccessRequest, AuthError, AuthFlow, Config, Domain, Enforcer, PolicyRule,
    TokenIssuer, TokenPair,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shared application state
#[derive(Clone)]
struct AppState {
    flow: Arc<AuthFlow>,
    enforcer: Arc<Enforcer>,
    start_time: std::time::Instant,
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// Application error type
#[derive(Debug)]
struct AppError(AuthError);

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match &self.0 {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken(_)
            | AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AuthError::UserInactive => (StatusCode::FORBIDDEN, "forbidden"),
            AuthError::UserAlreadyExists(_) => (StatusCode::CONFLICT, "conflict"),
            AuthError::InvalidInput(_) | AuthError::InvalidRoleEdge(_) => {
                (StatusCode::BAD_REQUEST, "bad_request")
            }
            AuthError::PolicyNotFound(_) | AuthError::RoleNotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            AuthError::TokenGenerationFailed(_)
            | AuthError::CacheUnavailable(_)
            | AuthError::Storage(_)
            | AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: self.0.to_string(),
        });

        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    #[serde(default)]
    full_name: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct RegisterResponse {
    id: String,
    username: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct LogoutRequest {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct RoleAssignmentRequest {
    user: String,
    role: String,
    domain: Domain,
}

#[derive(Debug, Serialize)]
struct ChangedResponse {
    changed: bool,
}

#[derive(Debug, Deserialize)]
struct DomainQuery {
    domain: Domain,
}

#[derive(Debug, Serialize)]
struct RolesResponse {
    roles: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PermissionEntry {
    resource: String,
    action: String,
}

#[derive(Debug, Serialize)]
struct PermissionsResponse {
    permissions: Vec<PermissionEntry>,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
}

/// POST /v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let user = state
        .flow
        .register(&req.username, &req.email, &req.full_name, &req.password)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            username: user.username,
            email: user.email,
        }),
    ))
}

/// POST /v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let pair = state.flow.login(&req.username, &req.password).await?;
    Ok(Json(pair))
}

/// POST /v1/auth/refresh
async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let pair = state.flow.refresh(&req.refresh_token).await?;
    Ok(Json(pair))
}

/// POST /v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> Result<StatusCode, AppError> {
    let claims = state.flow.verify_token(&req.access_token)?;
    state.flow.logout(claims.subject_id()).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/check
async fn check_authorization(
    State(state): State<AppState>,
    Json(req): Json<AccessRequest>,
) -> Result<Json<AccessDecision>, AppError> {
    let allowed = state
        .enforcer
        .enforce(&req.subject, req.domain, &req.resource, &req.action)?;
    info!(
        subject = %req.subject,
        domain = %req.domain,
        resource = %req.resource,
        action = %req.action,
        decision = if allowed { "ALLOW" } else { "DENY" },
        "authorization check"
    );
    Ok(Json(if allowed {
        AccessDecision::allow()
    } else {
        AccessDecision::deny()
    }))
}

/// POST /v1/policies
async fn add_policy(
    State(state): State<AppState>,
    Json(rule): Json<PolicyRule>,
) -> Result<Json<ChangedResponse>, AppError> {
    let changed = state.enforcer.add_policy(rule).await?;
    Ok(Json(ChangedResponse { changed }))
}

/// DELETE /v1/policies
async fn remove_policy(
    State(state): State<AppState>,
    Json(rule): Json<PolicyRule>,
) -> Result<Json<ChangedResponse>, AppError> {
    let changed = state.enforcer.remove_policy(&rule).await?;
    Ok(Json(ChangedResponse { changed }))
}

/// POST /v1/roles
async fn add_role(
    State(state): State<AppState>,
    Json(req): Json<RoleAssignmentRequest>,
) -> Result<Json<ChangedResponse>, AppError> {
    let changed = state
        .enforcer
        .add_role_for_user(&req.user, &req.role, req.domain)
        .await?;
    Ok(Json(ChangedResponse { changed }))
}

/// DELETE /v1/roles
async fn remove_role(
    State(state): State<AppState>,
    Json(req): Json<RoleAssignmentRequest>,
) -> Result<Json<ChangedResponse>, AppError> {
    let changed = state
        .enforcer
        .remove_role_for_user(&req.user, &req.role, req.domain)
        .await?;
    Ok(Json(ChangedResponse { changed }))
}

/// GET /v1/users/:id/roles?domain=...
async fn user_roles(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DomainQuery>,
) -> Json<RolesResponse> {
    Json(RolesResponse {
        roles: state.enforcer.get_roles_for_user(&id, query.domain),
    })
}

/// GET /v1/users/:id/permissions?domain=...
async fn user_permissions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DomainQuery>,
) -> Json<PermissionsResponse> {
    let permissions = state
        .enforcer
        .get_permissions_for_user(&id, query.domain)
        .into_iter()
        .map(|(resource, action)| PermissionEntry { resource, action })
        .collect();
    Json(PermissionsResponse { permissions })
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: iam_core::VERSION.to_string(),
    })
}

/// Create the HTTP router with all endpoints
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/refresh", post(refresh))
        .route("/v1/auth/logout", post(logout))
        .route("/v1/check", post(check_authorization))
        .route("/v1/policies", post(add_policy).delete(remove_policy))
        .route("/v1/roles", post(add_role).delete(remove_role))
        .route("/v1/users/:id/roles", get(user_roles))
        .route("/v1/users/:id/permissions", get(user_permissions))
        .route("/health", get(health_check))
        .layer(ServiceBuilder::new().layer(trace).layer(cors))
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }

    info!("Starting graceful shutdown");
}

async fn build_token_cache(config: &Config) -> TokenCache {
    #[cfg(feature = "redis-cache")]
    if let Some(url) = &config.cache.redis_url {
        match iam_core::token::RedisTokenStore::connect(url).await {
            Ok(store) => {
                info!("Token cache backed by redis");
                return TokenCache::new(Arc::new(store), config.cache.op_timeout());
            }
            Err(e) => {
                tracing::error!("Failed to connect token cache to redis, falling back to memory: {e}");
            }
        }
    }
    TokenCache::in_memory(config.cache.op_timeout())
}

/// Main server entrypoint
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting IAM server v{}", iam_core::VERSION);

    let config = Config::from_env();
    config.validate()?;
    info!("Configuration:");
    info!("  Bind: {}:{}", config.server.host, config.server.port);
    info!("  Access token TTL: {}s", config.jwt.access_ttl_secs);
    info!("  Refresh token TTL: {}s", config.jwt.refresh_ttl_secs);

    let adapter = Arc::new(MemoryAdapter::new());
    let enforcer = Arc::new(Enforcer::new(adapter).await?);
    info!("Authorization engine initialized");

    let issuer = Arc::new(TokenIssuer::new(
        &config.jwt.secret,
        config.jwt.access_ttl(),
        config.jwt.refresh_ttl(),
    ));
    let cache = build_token_cache(&config).await;

    let flow = Arc::new(AuthFlow::new(
        Arc::new(MemoryUserDirectory::new()),
        Arc::new(Argon2Hasher::new()),
        issuer,
        cache,
        enforcer.clone(),
    ));

    let state = AppState {
        flow,
        enforcer,
        start_time: std::time::Instant::now(),
    };

    let app = create_router(state);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}
