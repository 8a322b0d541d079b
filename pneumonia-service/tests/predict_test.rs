mod common;

use axum::http::{header, Request, StatusCode};
use common::*;
use pneumonia_service::services::providers::mock::MockTextProvider;
use pneumonia_service::startup::build_router;
use serde_json::json;
use std::sync::Arc;
use tower::util::ServiceExt;

#[tokio::test]
async fn missing_file_field_is_rejected() {
    let app = build_router(test_app(0.9).await.state);

    let response = app
        .oneshot(predict_request(&[Part::Text("age", "30")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "No file uploaded" }));
}

#[tokio::test]
async fn non_multipart_request_counts_as_no_file() {
    let app = build_router(test_app(0.9).await.state);

    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "No file uploaded" }));
}

#[tokio::test]
async fn empty_file_name_is_not_selected() {
    let app = build_router(test_app(0.9).await.state);
    let image = png_bytes(32, 32);

    let response = app
        .oneshot(predict_request(&[Part::File {
            name: "file",
            file_name: Some(""),
            data: &image,
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "No file selected" }));
}

#[tokio::test]
async fn empty_file_is_not_selected() {
    let app = build_router(test_app(0.9).await.state);

    let response = app
        .oneshot(predict_request(&[Part::File {
            name: "file",
            file_name: Some("xray.png"),
            data: &[],
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await, json!({ "error": "No file selected" }));
}

#[tokio::test]
async fn positive_scan_returns_severity_and_escalation_guidance() {
    let app = build_router(test_app(0.9).await.state);
    let image = png_bytes(320, 240);

    let response = app
        .oneshot(predict_request(&[
            Part::File {
                name: "file",
                file_name: Some("xray.png"),
                data: &image,
            },
            Part::Text("age", "67"),
            Part::Text("symptoms", "fever, cough"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    assert_eq!(body["status"], "success");
    assert_eq!(body["label"], "pneumonia");
    assert!((body["probability"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    assert!((body["confidence"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    assert_eq!(body["severity"], "severe");

    let report = body["report"].as_str().unwrap();
    assert!(!report.is_empty());
    assert!(report.contains("when to go to hospital"));

    assert_eq!(
        body["patient_info"],
        json!({
            "location": "Parasarampuram, AP",
            "age": "67",
            "symptoms": "fever, cough",
            "severity": "severe",
        })
    );
}

#[tokio::test]
async fn negative_scan_has_null_severity() {
    let app = build_router(test_app(0.3).await.state);
    let image = png_bytes(64, 64);

    let response = app
        .oneshot(predict_request(&[
            Part::File {
                name: "file",
                file_name: Some("xray.png"),
                data: &image,
            },
            Part::Text("location", "Vatluru, AP"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    assert_eq!(body["label"], "normal");
    assert!((body["confidence"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    assert!(body["severity"].is_null());
    assert_eq!(body["patient_info"]["location"], "Vatluru, AP");
    assert!(body["patient_info"]["age"].is_null());
    assert!(body["report"].as_str().unwrap().contains("Reassure the user."));
}

#[tokio::test]
async fn undecodable_upload_is_a_prediction_failure() {
    let app = build_router(test_app(0.9).await.state);

    let response = app
        .oneshot(predict_request(&[Part::File {
            name: "file",
            file_name: Some("notes.txt"),
            data: b"definitely not an image",
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Prediction failed: "));
    assert!(body.get("diagnosis").is_none());
}

#[tokio::test]
async fn report_failure_returns_500_with_diagnosis() {
    let app = build_state(test_config(), 0.7, Arc::new(MockTextProvider::new(false))).await;
    let app = build_router(app.state);
    let image = png_bytes(64, 64);

    let response = app
        .oneshot(predict_request(&[Part::File {
            name: "file",
            file_name: Some("xray.png"),
            data: &image,
        }]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;

    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Prediction failed: "));
    assert!(error.contains("not configured"), "got {error}");
    assert_eq!(body["diagnosis"]["label"], "pneumonia");
    assert_eq!(body["diagnosis"]["severity"], "moderate");
}

#[tokio::test]
async fn predict_is_rate_limited_per_client() {
    let mut config = test_config();
    config.http.predict_rate_limit_per_minute = 2;
    let app = build_state(config, 0.9, Arc::new(MockTextProvider::new(true))).await;
    let app = build_router(app.state);

    let send = |ip: &'static str| {
        let request = from_peer(predict_request(&[Part::Text("age", "30")]), ip);
        app.clone().oneshot(request)
    };

    assert_eq!(send("10.0.0.1").await.unwrap().status(), StatusCode::BAD_REQUEST);
    assert_eq!(send("10.0.0.1").await.unwrap().status(), StatusCode::BAD_REQUEST);

    let limited = send("10.0.0.1").await.unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key(header::RETRY_AFTER));

    // Other clients keep their own budget.
    assert_eq!(send("10.0.0.2").await.unwrap().status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn spoofed_forwarded_for_does_not_bypass_predict_limit() {
    let mut config = test_config();
    config.http.predict_rate_limit_per_minute = 2;
    let app = build_state(config, 0.9, Arc::new(MockTextProvider::new(true))).await;
    let app = build_router(app.state);

    let mut passed = 0;
    for i in 0..20 {
        let mut request = from_peer(predict_request(&[Part::Text("age", "30")]), "10.0.0.7");
        request
            .headers_mut()
            .insert("x-forwarded-for", format!("10.9.0.{i}").parse().unwrap());

        let response = app.clone().oneshot(request).await.unwrap();
        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            passed += 1;
        }
    }

    assert_eq!(passed, 2);
}

#[tokio::test]
async fn trusted_forwarded_for_keys_the_limit_on_the_original_client() {
    let mut config = test_config();
    config.http.predict_rate_limit_per_minute = 1;
    config.http.trust_forwarded_for = true;
    let app = build_state(config, 0.9, Arc::new(MockTextProvider::new(true))).await;
    let app = build_router(app.state);

    let send = |client: &'static str| {
        let mut request = from_peer(predict_request(&[Part::Text("age", "30")]), "10.0.0.254");
        request
            .headers_mut()
            .insert("x-forwarded-for", client.parse().unwrap());
        app.clone().oneshot(request)
    };

    assert_eq!(send("203.0.113.5").await.unwrap().status(), StatusCode::BAD_REQUEST);
    assert_eq!(send("203.0.113.5").await.unwrap().status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(send("203.0.113.6").await.unwrap().status(), StatusCode::BAD_REQUEST);
}
