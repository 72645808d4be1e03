#![cfg(feature = "web")]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use quotation_desk::app::{AppState, router};
use quotation_desk::config::Config;
use quotation_desk::photos::NoPhotoFetcher;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app() -> Router {
    let state = AppState::new(&Config::default(), Arc::new(NoPhotoFetcher));
    router(Arc::new(state))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder().method("DELETE").uri(uri).body(Body::empty()).unwrap()
}

fn activity(reference: &str) -> Value {
    json!({
        "activity_reference_number": reference,
        "account_reference_number": "ACC-1",
        "status": "Quote-Done",
        "type_activity": "Quotation Preparation",
        "referenceid": "TSA-1",
        "remarks": "",
    })
}

#[tokio::test]
async fn quotation_download_headers() {
    let body = json!({
        "referenceNo": "Q-100",
        "items": [{"itemNo": 1, "qty": 2, "unitPrice": 50, "totalAmount": 100,
                   "description": "Color||Red", "referencePhoto": ""}],
        "vatType": "VAT Inc",
        "totalPrice": 100
    });
    let response = app().oneshot(post_json("/api/quotation", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=Quotation_Q-100.xlsx"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"PK"));
}

#[tokio::test]
async fn missing_required_field_is_rejected() {
    let mut body = activity("ACT-1");
    body.as_object_mut().unwrap().remove("type_activity");

    let response = app().oneshot(post_json("/api/activities", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"error": "Missing type_activity"}));
}

#[tokio::test]
async fn product_length_mismatch_is_rejected() {
    let mut body = activity("ACT-1");
    let fields = body.as_object_mut().unwrap();
    for (key, value) in [
        ("product_category", "Lamp,Pole"),
        ("product_quantity", "1,2"),
        ("product_amount", "10,20"),
        ("product_description", "Only one"),
        ("product_photo", "a,b"),
        ("product_sku", "s1,s2"),
        ("product_title", "t1,t2"),
    ] {
        fields.insert(key.to_string(), json!(value));
    }

    let response = app().oneshot(post_json("/api/activities", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Product arrays length mismatch");
}

#[tokio::test]
async fn save_then_cached_then_lookup() {
    let app = app();

    let first = app.clone().oneshot(post_json("/api/activities", activity("ACT-1"))).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = json_body(first).await;
    assert_eq!(first["success"], true);
    assert_eq!(first["cached"], false);
    assert_eq!(first["data"][0]["id"], 1);
    assert_eq!(first["data"][0]["remarks"], Value::Null);

    let again = json_body(app.clone().oneshot(post_json("/api/activities", activity("ACT-1"))).await.unwrap()).await;
    assert_eq!(again["cached"], true);
    assert_eq!(again["data"], first["data"]);

    app.clone().oneshot(post_json("/api/activities", activity("ACT-2"))).await.unwrap();

    let uri = "/api/activities/history?activity_reference_numbers=ACT-1&activity_reference_numbers=ACT-2";
    let lookup = json_body(app.clone().oneshot(get(uri)).await.unwrap()).await;
    assert_eq!(lookup["cached"], false);
    assert_eq!(lookup["data"].as_array().unwrap().len(), 2);

    let repeat = json_body(app.oneshot(get(uri)).await.unwrap()).await;
    assert_eq!(repeat["cached"], true);
}

#[tokio::test]
async fn history_requires_reference_numbers() {
    let response = app().oneshot(get("/api/activities/history")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Missing activity_reference_numbers");
}

#[tokio::test]
async fn delete_unknown_activity_is_not_found() {
    let response = app().oneshot(delete("/api/activities/42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_clears_cached_history() {
    let app = app();

    let saved = json_body(app.clone().oneshot(post_json("/api/activities", activity("ACT-1"))).await.unwrap()).await;
    assert_eq!(saved["data"][0]["id"], 1);
    let uri = "/api/activities/history?activity_reference_numbers=ACT-1";
    assert_eq!(json_body(app.clone().oneshot(get(uri)).await.unwrap()).await["cached"], false);
    assert_eq!(json_body(app.clone().oneshot(get(uri)).await.unwrap()).await["cached"], true);

    let removed = app.clone().oneshot(delete("/api/activities/1")).await.unwrap();
    assert_eq!(removed.status(), StatusCode::OK);

    let lookup = json_body(app.clone().oneshot(get(uri)).await.unwrap()).await;
    assert_eq!(lookup["cached"], false);
    assert_eq!(lookup["data"], json!([]));

    let resaved = json_body(app.clone().oneshot(post_json("/api/activities", activity("ACT-1"))).await.unwrap()).await;
    assert_eq!(resaved["cached"], false);
    assert_eq!(resaved["data"][0]["id"], 2);

    let lookup = json_body(app.oneshot(get(uri)).await.unwrap()).await;
    assert_eq!(lookup["cached"], false);
    assert_eq!(lookup["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn stream_sends_insert_for_owner() {
    let app = app();

    let response = app
        .clone()
        .oneshot(get("/api/activities/stream?referenceid=TSA-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

    let saved = app.oneshot(post_json("/api/activities", activity("ACT-7"))).await.unwrap();
    assert_eq!(saved.status(), StatusCode::OK);

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(5), body.frame())
        .await
        .expect("no event within timeout")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.starts_with("event: INSERT\n"), "{text}");
    assert!(text.contains("\"activity_reference_number\":\"ACT-7\""), "{text}");
}

#[tokio::test]
async fn account_registration_checks_duplicates() {
    let app = app();

    let created = app
        .clone()
        .oneshot(post_json(
            "/api/accounts",
            json!({"company_name": "Acme Lighting", "owner_referenceid": "TSA-1"}),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    assert_eq!(json_body(created).await["company_name"], "ACME LIGHTING");

    let check = json_body(
        app.clone()
            .oneshot(get("/api/accounts/check-duplicate?company_name=acme%20lightng&referenceid=TSA-2"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(check["status"], "owned_by_other");

    let rejected = app
        .oneshot(post_json(
            "/api/accounts",
            json!({"company_name": "Acme Lightings", "owner_referenceid": "TSA-2"}),
        ))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_check() {
    let response = app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
