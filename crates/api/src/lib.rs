mod config;
mod rate_limit;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Json, Path as AxumPath, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{body::Body, Router};
use pickup_core::{
    mark_refresh_fields, normalize_place, Address, AddressFields, PackageRates, PickupDecision,
    PickupFilter, ShippingPackage, CHECKOUT_REFRESH_SCRIPT,
};
use pickup_observability::{AppMetrics, MetricsSnapshot};
use pickup_regions::{RegionTable, RegionTableStats};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use crate::config::ApiConfig;
use crate::rate_limit::IpRateLimiter;

const MAX_REGION_LABEL_LEN: usize = 120;
const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct ApiState {
    pub filter: PickupFilter,
    pub regions: RegionTable,
    pub metrics: Arc<AppMetrics>,
    pub api_key: String,
    pub limiter: IpRateLimiter,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    rules: RulesSummary,
    regions: RegionTableStats,
}

#[derive(Debug, Serialize)]
struct RulesSummary {
    country: String,
    method_prefix: String,
    places: usize,
    region_codes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PackageRatesResponse {
    rates: PackageRates,
    decision: PickupDecision,
}

#[derive(Debug, Deserialize)]
struct NormalizeRequest {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct NormalizeResponse {
    raw: String,
    normalized: String,
}

#[derive(Debug, Deserialize)]
struct RegionLabelRequest {
    label: String,
}

#[derive(Debug, Serialize)]
struct RegionLabelResponse {
    country: String,
    code: String,
    label: String,
    replaced: bool,
}

pub fn build_app(config: ApiConfig) -> Result<Router> {
    let rules = config.load_rules()?;
    let regions = config.load_regions()?;

    info!(
        country = rules.country(),
        places = rules.places().count(),
        region_labels = regions.stats().labels,
        "pickup rules loaded"
    );

    let state = ApiState {
        filter: PickupFilter::new(rules, Arc::new(regions.clone())),
        regions,
        metrics: AppMetrics::shared(),
        api_key: config.api_key,
        limiter: IpRateLimiter::new(config.rate_limit_window, config.rate_limit_max),
    };

    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/package_rates", post(package_rates))
        .route("/v1/pickup/evaluate", post(evaluate_pickup))
        .route("/v1/normalize", post(normalize))
        .route("/v1/address_fields", post(address_fields))
        .route("/v1/assets/checkout_refresh.js", get(checkout_refresh_script))
        .route("/v1/regions/:country/:code", put(upsert_region_label))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn(security_headers_middleware))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let rules = state.filter.rules();
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        rules: RulesSummary {
            country: rules.country().to_string(),
            method_prefix: rules.method_prefix().to_string(),
            places: rules.places().count(),
            region_codes: rules.region_codes().map(ToString::to_string).collect(),
        },
        regions: state.regions.stats(),
    };
    (StatusCode::OK, Json(payload))
}

async fn package_rates(
    State(state): State<ApiState>,
    Json(package): Json<ShippingPackage>,
) -> impl IntoResponse {
    let started = Instant::now();
    state.metrics.inc_request();

    let offered = package.rates.len();
    let (rates, decision) = state.filter.apply(package.rates, &package.destination);
    let removed = offered - rates.len();

    state.metrics.record_decision(&decision);
    state.metrics.add_rates_removed(removed);
    state.metrics.observe_latency(started.elapsed());

    info!(
        country = %package.destination.country_code(),
        reason = ?decision.reason,
        offered,
        removed,
        "package rates filtered"
    );

    (StatusCode::OK, Json(PackageRatesResponse { rates, decision }))
}

async fn evaluate_pickup(
    State(state): State<ApiState>,
    Json(destination): Json<Address>,
) -> impl IntoResponse {
    let started = Instant::now();
    state.metrics.inc_request();

    let decision = state.filter.evaluate(&destination);
    state.metrics.record_decision(&decision);
    state.metrics.observe_latency(started.elapsed());

    (StatusCode::OK, Json(decision))
}

async fn normalize(Json(request): Json<NormalizeRequest>) -> impl IntoResponse {
    let raw = request.text.unwrap_or_default();
    let normalized = normalize_place(&raw);
    (StatusCode::OK, Json(NormalizeResponse { raw, normalized }))
}

async fn address_fields(Json(fields): Json<AddressFields>) -> impl IntoResponse {
    (StatusCode::OK, Json(mark_refresh_fields(fields)))
}

async fn checkout_refresh_script() -> impl IntoResponse {
    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/javascript; charset=utf-8"),
        )],
        CHECKOUT_REFRESH_SCRIPT,
    )
}

async fn upsert_region_label(
    State(state): State<ApiState>,
    AxumPath((country, code)): AxumPath<(String, String)>,
    Json(request): Json<RegionLabelRequest>,
) -> Response {
    let label = request.label.trim().to_string();
    if label.is_empty() || label.chars().count() > MAX_REGION_LABEL_LEN {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": "invalid_label",
                "message": format!("label must be 1-{MAX_REGION_LABEL_LEN} characters")
            })),
        )
            .into_response();
    }

    let country = country.to_uppercase();
    let replaced = state.regions.upsert(&country, &code, &label).is_some();
    info!(country = %country, code = %code, replaced, "region label upserted");

    (
        StatusCode::OK,
        Json(RegionLabelResponse {
            country,
            code,
            label,
            replaced,
        }),
    )
        .into_response()
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health" | "/v1/assets/checkout_refresh.js")
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if header_key != state.api_key {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "unauthorized",
                "message": "missing or invalid x-api-key"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

async fn rate_limit_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let ip = request_ip(&request);
    if !state.limiter.allow(&ip) {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "rate_limited",
                "message": "rate limit exceeded for this IP"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

fn request_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .next()
                .unwrap_or("unknown")
                .trim()
                .to_string()
        })
        .unwrap_or_else(|| "local".to_string())
}

async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;

    response.headers_mut().insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    response.headers_mut().insert(
        header::HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}
