use crate::{
    identity::IdentityProvider,
    session::{CookieBridge, SessionRefresher, refresh_session},
    store::PgAccountStore,
};
use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Method, Request, header::CONTENT_TYPE},
    middleware,
    routing::options,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    services::ServeDir,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod handlers;
mod openapi;

pub use handlers::auth::{
    AuthConfig, AuthState, DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW, FixedWindowRateLimiter,
    NoopRateLimiter, RateLimiter,
};
pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Assemble the full application: documented API routes, Swagger UI, the
/// optional static page directory and the session refresh layer.
///
/// # Errors
/// Returns an error if the configured site or dashboard URL has no valid origin.
pub fn app(auth_state: Arc<AuthState>, public_dir: Option<&Path>) -> Result<Router> {
    let config = auth_state.config();
    let origins = [config.site_url(), config.dashboard_url()]
        .into_iter()
        .map(origin)
        .collect::<Result<Vec<_>>>()?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true);

    let refresher = SessionRefresher::new(
        Arc::clone(auth_state.identity()),
        auth_state.cookies().clone(),
    );

    let (router, openapi) = router().split_for_parts();
    let mut app = router
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi))
        .route("/health", options(handlers::health::health));

    if let Some(dir) = public_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    Ok(app
        .layer(middleware::from_fn_with_state(refresher, refresh_session))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth_state)),
        ))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: &str,
    identity: Arc<dyn IdentityProvider>,
    auth_config: AuthConfig,
    cookies: CookieBridge,
    rate_limiter: Arc<dyn RateLimiter>,
    public_dir: Option<PathBuf>,
) -> Result<()> {
    let store = Arc::new(PgAccountStore::connect(dsn).await?);

    let auth_state = Arc::new(AuthState::new(
        auth_config,
        identity,
        store,
        cookies,
        rate_limiter,
    ));

    let app = app(auth_state, public_dir.as_deref())?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn origin(base_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Base URL must include a valid host: {base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build origin header")
}
