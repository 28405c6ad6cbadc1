//! Routing, authentication and validation behaviour that is decided before any
//! storage access. These run without MongoDB or Redis.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use coursemaster_api::models::user::UserRole;
use mongodb::bson::oid::ObjectId;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{create_test_app, error_message, METRICS_AUTH};

#[tokio::test]
async fn test_home() {
    let app = create_test_app().await;
    let (status, body) = app.get("/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "CourseMaster API" }));
}

#[tokio::test]
async fn test_health_reports_each_dependency() {
    let app = create_test_app().await;
    let (status, body) = app.get("/health", None).await;

    // Healthy with both services up, degraded otherwise
    let expected = if status == StatusCode::OK { "healthy" } else { "degraded" };
    assert!(status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], expected);
    assert_eq!(body["service"], "coursemaster-api");
    for dependency in ["mongodb", "redis"] {
        let state = body["dependencies"][dependency]["status"].as_str().unwrap();
        assert!(state == "healthy" || state == "unhealthy", "{}", dependency);
    }
}

#[tokio::test]
async fn test_metrics_requires_basic_auth() {
    let app = create_test_app().await;

    let (status, _) = app.get("/metrics", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let credentials = general_purpose::STANDARD.encode(METRICS_AUTH);
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header(header::AUTHORIZATION, format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let wrong = general_purpose::STANDARD.encode("metrics:wrong");
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .header(header::AUTHORIZATION, format!("Basic {}", wrong))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = create_test_app().await;

    for uri in [
        "/api/auth/me",
        "/api/students/dashboard",
        "/api/students/courses",
        "/api/admin/dashboard",
    ] {
        let (status, body) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(error_message(&body), "No token, authorization denied");
    }

    let course = ObjectId::new().to_hex();
    let (status, _) = app
        .post(&format!("/api/courses/{}/enroll", course), None, json!({}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let app = create_test_app().await;
    let (status, body) = app.get("/api/students/dashboard", Some("not.a.jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(&body), "Token is not valid");
}

#[tokio::test]
async fn test_admin_routes_reject_non_admins() {
    let app = create_test_app().await;

    for role in [UserRole::Student, UserRole::Instructor] {
        let token = app.token_for(role);
        let (status, body) = app.get("/api/admin/students", Some(&token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(error_message(&body), "Access denied. Admin only.");
    }
}

#[tokio::test]
async fn test_students_cannot_manage_catalog() {
    let app = create_test_app().await;
    let token = app.token_for(UserRole::Student);
    let id = ObjectId::new().to_hex();

    let (status, body) = app.delete(&format!("/api/courses/{}", id), Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        error_message(&body),
        "Access denied. Instructor or admin only."
    );

    let (status, _) = app
        .post(
            &format!("/api/courses/{}/modules", id),
            Some(&token),
            json!({ "title": "Module" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&format!("/api/quizzes/{}", id), Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .get(
            &format!("/api/quizzes/admin/course/{}/attempts", id),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_ids_are_bad_requests() {
    let app = create_test_app().await;

    let (status, body) = app.get("/api/courses/not-an-id", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "Invalid course id");

    let token = app.token_for(UserRole::Student);
    let (status, body) = app
        .get("/api/students/courses/123/lessons/456", Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "Invalid course id");

    let admin = app.token_for(UserRole::Admin);
    let (status, body) = app
        .put("/api/admin/students/xyz", Some(&admin), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "Invalid student id");
}

#[tokio::test]
async fn test_request_validation() {
    let app = create_test_app().await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "name": "Jo Student", "email": "jo@example.com", "password": "123" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "Password must be at least 6 characters");

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "not-an-email", "password": "secret" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "Please provide a valid email");

    let instructor = app.token_for(UserRole::Instructor);
    let (status, body) = app
        .post(
            "/api/quizzes",
            Some(&instructor),
            json!({
                "moduleId": ObjectId::new().to_hex(),
                "title": "Module checkpoint",
                "questions": []
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "At least one question is required");

    let admin = app.token_for(UserRole::Admin);
    let (status, body) = app
        .put(
            &format!("/api/admin/assignments/{}/review", ObjectId::new().to_hex()),
            Some(&admin),
            json!({ "grade": 150 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "Grade must be between 0 and 100");
}

#[tokio::test]
async fn test_malformed_json_is_reported_as_json() {
    let app = create_test_app().await;
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"email\":"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(error_message(&body).starts_with("Invalid request body"));
}

#[tokio::test]
async fn test_serving_uploads() {
    let app = create_test_app().await;
    std::fs::write(app.uploads.path().join("images").join("logo.png"), b"png-bytes").unwrap();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/uploads/images/logo.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"png-bytes");

    let (status, body) = app.get("/api/uploads/images/missing.png", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_message(&body), "File not found");

    let (status, _) = app.get("/api/uploads/secrets/logo.png", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The folder itself is not a file
    let (status, _) = app.get("/api/uploads/images", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_staff_only_uploads() {
    let app = create_test_app().await;
    let token = app.token_for(UserRole::Student);

    for uri in ["/api/uploads/course-thumbnail", "/api/uploads/lesson-resources"] {
        let (status, _) = app.request(Method::POST, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }

    let (status, _) = app
        .request(Method::POST, "/api/uploads/assignment", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_multipart_upload_roundtrip() {
    let app = create_test_app().await;
    let token = app.token_for(UserRole::Student);

    let boundary = "X-COURSEMASTER-BOUNDARY";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"me.png\"\r\n\
         Content-Type: image/png\r\n\r\npng-data\r\n--{b}--\r\n",
        b = boundary
    );

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/uploads/profile-picture")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", boundary),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["data"]["folder"], "images");
    assert_eq!(body["data"]["originalname"], "me.png");

    let filename = body["data"]["filename"].as_str().unwrap();
    let stored = app.uploads.path().join("images").join(filename);
    assert_eq!(std::fs::read(stored).unwrap(), b"png-data");
}
