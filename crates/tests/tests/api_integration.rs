use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use pickup_api::{build_app, ApiConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

const API_KEY: &str = "test-pickup-key";

fn app() -> Router {
    app_with_limit(1_000)
}

fn app_with_limit(rate_limit_max: usize) -> Router {
    build_app(ApiConfig {
        api_key: API_KEY.to_string(),
        rate_limit_window: Duration::from_secs(60),
        rate_limit_max,
        ..ApiConfig::default()
    })
    .expect("app should build")
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn rate_keys(payload: &Value) -> Vec<String> {
    payload["rates"]
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect()
}

fn package(country: &str, city: &str, region: Option<&str>, rate_ids: &[&str]) -> Value {
    let rates = rate_ids
        .iter()
        .map(|id| {
            let method_id = id.split(':').next().unwrap_or(id);
            (
                id.to_string(),
                json!({ "method_id": method_id, "label": id, "cost": "0.00" }),
            )
        })
        .collect::<serde_json::Map<_, _>>();

    json!({
        "destination": { "country": country, "city": city, "state": region },
        "rates": rates
    })
}

#[tokio::test]
async fn health_is_public() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["rules"]["country"], "SA");
    assert_eq!(payload["rules"]["region_codes"], json!(["SAMDYB", "SAMKJI"]));
}

#[tokio::test]
async fn package_rates_requires_api_key() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/package_rates")
        .header("content-type", "application/json")
        .body(Body::from(package("SA", "Riyadh", None, &["local_pickup"]).to_string()))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn jeddah_keeps_pickup() {
    let response = app()
        .oneshot(json_request(
            "POST",
            "/v1/package_rates",
            package("SA", "جدة", None, &["local_pickup", "flat_rate"]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(rate_keys(&payload), vec!["local_pickup", "flat_rate"]);
    assert_eq!(payload["decision"]["reason"], "city_match");
}

#[tokio::test]
async fn riyadh_loses_every_pickup_variant() {
    let response = app()
        .oneshot(json_request(
            "POST",
            "/v1/package_rates",
            package(
                "SA",
                "Riyadh",
                None,
                &["local_pickup:1", "flat_rate:3", "local_pickup:2", "free_shipping"],
            ),
        ))
        .await
        .unwrap();

    let payload = read_json(response).await;
    assert_eq!(rate_keys(&payload), vec!["flat_rate:3", "free_shipping"]);
    assert_eq!(payload["decision"]["allowed"], false);
    assert_eq!(payload["rates"]["flat_rate:3"]["cost"], "0.00");
}

#[tokio::test]
async fn other_countries_are_left_alone() {
    let response = app()
        .oneshot(json_request(
            "POST",
            "/v1/package_rates",
            package("US", "", None, &["local_pickup"]),
        ))
        .await
        .unwrap();

    let payload = read_json(response).await;
    assert_eq!(rate_keys(&payload), vec!["local_pickup"]);
    assert_eq!(payload["decision"]["reason"], "outside_country");
}

#[tokio::test]
async fn builtin_region_label_keeps_pickup() {
    let response = app()
        .oneshot(json_request(
            "POST",
            "/v1/pickup/evaluate",
            json!({ "country": "sa", "city": "", "state": "SAMDYB" }),
        ))
        .await
        .unwrap();

    let payload = read_json(response).await;
    assert_eq!(payload["allowed"], true);
    assert_eq!(payload["reason"], "region_label_match");
    assert_eq!(payload["region_key"], "yanbu");
}

#[tokio::test]
async fn upserted_region_label_takes_effect() {
    let app = app();

    let before = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/pickup/evaluate",
            json!({ "country": "SA", "state": "SA-14" }),
        ))
        .await
        .unwrap();
    assert_eq!(read_json(before).await["allowed"], false);

    let upsert = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/v1/regions/sa/SA-14",
            json!({ "label": "ينبع البحر" }),
        ))
        .await
        .unwrap();
    assert_eq!(upsert.status(), StatusCode::OK);
    assert_eq!(read_json(upsert).await["replaced"], false);

    let after = app
        .oneshot(json_request(
            "POST",
            "/v1/pickup/evaluate",
            json!({ "country": "SA", "state": "SA-14" }),
        ))
        .await
        .unwrap();
    assert_eq!(read_json(after).await["reason"], "region_label_match");
}

#[tokio::test]
async fn blank_region_label_is_rejected() {
    let response = app()
        .oneshot(json_request(
            "PUT",
            "/v1/regions/SA/SA-14",
            json!({ "label": "   " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn normalize_reports_the_canonical_key() {
    let response = app()
        .oneshot(json_request(
            "POST",
            "/v1/normalize",
            json!({ "text": "  Yanbu Al-Bahr " }),
        ))
        .await
        .unwrap();

    let payload = read_json(response).await;
    assert_eq!(payload["normalized"], "yanbu al bahr");
}

#[tokio::test]
async fn address_fields_are_marked_for_refresh() {
    let response = app()
        .oneshot(json_request(
            "POST",
            "/v1/address_fields",
            json!({
                "city": { "label": "Town / City", "class": ["form-row-wide"] },
                "first_name": { "label": "First name", "class": "form-row-first" },
                "postcode": { "label": "Postcode" }
            }),
        ))
        .await
        .unwrap();

    let payload = read_json(response).await;
    assert_eq!(
        payload["city"]["class"],
        json!(["form-row-wide", "update_totals_on_change"])
    );
    assert_eq!(payload["first_name"]["class"], "form-row-first");
    assert_eq!(payload["postcode"], json!({ "label": "Postcode" }));
}

#[tokio::test]
async fn refresh_script_is_public_javascript() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/v1/assets/checkout_refresh.js")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/javascript"));
}

#[tokio::test]
async fn rate_limit_rejects_over_budget() {
    let app = app_with_limit(2);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/v1/normalize", json!({ "text": "jeddah" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(json_request("POST", "/v1/normalize", json!({ "text": "jeddah" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
}
