use std::sync::Arc;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;
use serde_json::json;
use uuid::Uuid;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{method, path};

use prescription_cell::router::prescription_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{TestConfig, TestUser, JwtTestUtils, MockSupabaseResponses};

fn create_test_app(config: AppConfig) -> Router {
    prescription_routes(Arc::new(config))
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_history_requires_token() {
    let app = create_test_app(TestConfig::default().to_app_config());

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json_response = json_body(response).await;
    assert_eq!(json_response["error"], "Missing authorization header");
}

#[tokio::test]
async fn test_forged_token_is_rejected() {
    let app = create_test_app(TestConfig::default().to_app_config());
    let token = JwtTestUtils::create_invalid_signature_token(&TestUser::default());

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({"patient_name": "Ana"}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_preview_over_http() {
    let config = TestConfig::default().to_app_config();
    let token = JwtTestUtils::create_test_token(&TestUser::default(), &config.supabase_jwt_secret, Some(1));
    let app = create_test_app(config);

    let request = Request::builder()
        .method("POST")
        .uri("/preview")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({
            "id": Uuid::nil(),
            "patient_name": "Ana",
            "sph_oi": "1.13",
            "antiblue": true
        }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json_response = json_body(response).await;
    assert_eq!(json_response["record"]["sph_oi"], "1.25");
    assert_eq!(json_response["material_final"], "Antiblue");
    assert_eq!(json_response["operation"]["operation"], "update");
}

#[tokio::test]
async fn test_save_over_http_creates_record() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::default().with_store_url(&mock_server.uri());
    let staff = TestUser::default();
    let token = JwtTestUtils::create_test_token(&staff, &config.supabase_jwt_secret, Some(1));

    Mock::given(method("POST"))
        .and(path("/rest/v1/prescriptions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::prescription_row(&Uuid::new_v4().to_string(), "Ana", &staff.id)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(config);
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({"patient_name": "Ana", "axis_od": "90"}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json_response = json_body(response).await;
    assert_eq!(json_response["prescription"]["created_by"], json!(staff.id));
}

#[tokio::test]
async fn test_malformed_axis_is_unprocessable() {
    let config = TestConfig::default().to_app_config();
    let token = JwtTestUtils::create_test_token(&TestUser::default(), &config.supabase_jwt_secret, Some(1));
    let app = create_test_app(config);

    let request = Request::builder()
        .method("POST")
        .uri("/preview")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({"patient_name": "Ana", "axis_od": "200"}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
