/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use twocare_api::app::{build_router, AppState};
/// use twocare_shared::clock::SystemClock;
/// use twocare_shared::config::Config;
/// use twocare_shared::db::{pool::create_pool, PgStore};
/// use twocare_shared::services::ServiceContext;
/// use twocare_shared::storage::DisabledStorage;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Arc::new(Config::from_env()?);
/// let pool = create_pool(config.database.clone()).await?;
/// let services = ServiceContext::new(
///     Arc::new(PgStore::new(pool)),
///     Arc::new(DisabledStorage),
///     Arc::new(SystemClock),
///     config,
/// );
/// let app = build_router(AppState::new(services));
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use twocare_shared::{config::Config, services::ServiceContext};

use crate::{
    error::{error_envelope_layer, handle_panic, not_found},
    middleware::{auth::jwt_auth_layer, security::SecurityHeadersLayer},
    routes,
};

/// Slack on top of the file size limit for multipart framing
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
///
/// Cloned for each request via Axum's `State` extractor; everything inside
/// is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Store, object storage, clock and config for the service layer
    pub services: ServiceContext,

    /// Application configuration (same instance as `services.config`)
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(services: ServiceContext) -> Self {
        let config = services.config.clone();
        Self { services, config }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── GET /health
/// └── /v1
///     ├── /auth        register, login, refresh (public); logout, logout-all
///     ├── /users/me    profile and avatar
///     ├── /families    families, members, invites, join
///     ├── /babies      babies and photos
///     └── /activities  care activities
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, compression, request tracing,
/// error envelope, panic catcher. JWT authentication wraps every `/v1`
/// route except the public auth endpoints.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.storage.max_file_size * 2 + MULTIPART_OVERHEAD);

    let require_auth = axum::middleware::from_fn_with_state(state.clone(), jwt_auth_layer);

    let auth_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/logout-all", post(routes::auth::logout_all))
        .route_layer(require_auth.clone())
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let user_routes = Router::new()
        .route("/me", get(routes::users::get_profile).patch(routes::users::update_profile))
        .route(
            "/me/avatar",
            post(routes::users::upload_avatar)
                .delete(routes::users::delete_avatar)
                .layer(upload_limit.clone()),
        );

    let family_routes = Router::new()
        .route("/", post(routes::families::create_family).get(routes::families::list_families))
        .route("/join", post(routes::families::join_family))
        .route(
            "/:id",
            get(routes::families::get_family)
                .patch(routes::families::update_family)
                .delete(routes::families::delete_family),
        )
        .route("/:id/members", get(routes::families::list_members))
        .route("/:id/members/:user_id", patch(routes::families::update_member_role))
        .route("/:id/invite", post(routes::families::create_invite));

    let baby_routes = Router::new()
        .route("/", post(routes::babies::create_baby).get(routes::babies::list_babies))
        .route(
            "/:id",
            get(routes::babies::get_baby)
                .patch(routes::babies::update_baby)
                .delete(routes::babies::delete_baby),
        )
        .route(
            "/:id/photos",
            post(routes::babies::upload_photo)
                .get(routes::babies::list_photos)
                .layer(upload_limit),
        );

    let activity_routes = Router::new()
        .route(
            "/",
            post(routes::activities::create_activity).get(routes::activities::list_activities),
        )
        .route(
            "/:id",
            get(routes::activities::get_activity).patch(routes::activities::update_activity),
        );

    let protected_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/families", family_routes)
        .nest("/babies", baby_routes)
        .nest("/activities", activity_routes)
        .route_layer(require_auth);

    let v1_routes = Router::new().nest("/auth", auth_routes).merge(protected_routes);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/v1", v1_routes)
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(axum::middleware::from_fn(error_envelope_layer))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
