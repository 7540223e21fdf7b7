use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::handlers::{protected, public};
use crate::middleware::{rate_limit, RateLimitScope};
use crate::state::AppState;

/// Full HTTP surface of the service
pub fn app(state: AppState) -> Router {
    let max_body = state.config.api.max_request_size_bytes;
    let cors = cors_layer(&state.config.security);

    Router::new()
        // Public
        .route("/", get(public::system::root))
        .route("/health", get(public::system::health))
        .merge(auth_routes(&state))
        .merge(upload_routes(&state))
        // Protected
        .merge(user_routes())
        .merge(mapping_routes())
        .merge(report_routes())
        .route("/audit", get(protected::audit::query))
        .route(
            "/payment",
            post(protected::payment::create_payment).get(protected::payment::payment_status),
        )
        .layer(DefaultBodyLimit::max(max_body))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    use public::auth;

    let scope = RateLimitScope::new("auth", state.config.api.auth_rate_limit);
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route_layer(from_fn_with_state((state.clone(), scope), rate_limit))
}

fn upload_routes(state: &AppState) -> Router<AppState> {
    use public::{files, payment};

    let scope = RateLimitScope::new("upload", state.config.api.upload_rate_limit);
    Router::new()
        .route("/preview-excel", post(files::preview_excel))
        .route("/export-report", post(files::export_report))
        .route("/payment/public", post(payment::create_public_payment))
        .route_layer(from_fn_with_state((state.clone(), scope), rate_limit))
}

fn user_routes() -> Router<AppState> {
    use protected::user;

    Router::new()
        .route("/user/profile", get(user::get_profile).put(user::update_profile))
        .route("/user/password", put(user::change_password))
        .route("/user/stats", get(user::stats))
}

fn mapping_routes() -> Router<AppState> {
    use protected::mappings;

    Router::new()
        .route("/mappings", get(mappings::list).post(mappings::create))
        .route(
            "/mappings/:id",
            get(mappings::get).put(mappings::update).delete(mappings::delete),
        )
        .route("/mappings/:id/default", put(mappings::set_default))
}

fn report_routes() -> Router<AppState> {
    use protected::{analytics, reports};

    Router::new()
        .route("/reports", get(reports::list).post(reports::create))
        .route("/reports/:id", get(reports::get).delete(reports::delete))
        .route("/analytics", get(analytics::summary))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([header::CONTENT_DISPOSITION]);

    if security.cors_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}
