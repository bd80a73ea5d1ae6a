//! End-to-end HTTP tests against the in-memory store.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use catalog_api::config::Environment;
use catalog_api::error::SANITIZED_MESSAGE;
use catalog_api::query::QueryPlan;
use catalog_api::store::{Document, StoreError};
use catalog_api::upload::ImageJob;
use catalog_api::{
    app_router, builtin_config, resolve, AppError, AppSettings, AppState, DocumentStore, ImageProcessor, MemoryStore,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Names files after kind and suffix. Later files finish first, so order is not completion order.
/// Files whose content is `bad` fail to decode.
#[derive(Default)]
struct StubImages {
    calls: AtomicUsize,
}

#[async_trait]
impl ImageProcessor for StubImages {
    async fn normalize(&self, job: ImageJob) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = 30u64.saturating_sub(job.bytes.len() as u64 * 5);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        if &job.bytes[..] == b"bad" {
            return Err(AppError::BadRequest("unreadable image".into()));
        }
        Ok(format!("{}-{}.jpeg", job.kind, job.suffix.unwrap_or_default()))
    }
}

/// Every operation fails the way a dropped database connection would.
struct BrokenStore;

#[async_trait]
impl DocumentStore for BrokenStore {
    async fn count(&self, _: &str, _: &QueryPlan) -> Result<u64, StoreError> {
        Err(StoreError::Db(sqlx::Error::PoolTimedOut))
    }
    async fn find(&self, _: &str, _: &QueryPlan) -> Result<Vec<Document>, StoreError> {
        Err(StoreError::Db(sqlx::Error::PoolTimedOut))
    }
    async fn find_by_id(&self, _: &str, _: &str) -> Result<Option<Document>, StoreError> {
        Err(StoreError::Db(sqlx::Error::PoolTimedOut))
    }
    async fn find_where_in(&self, _: &str, _: &str, _: &[String]) -> Result<Vec<Document>, StoreError> {
        Err(StoreError::Db(sqlx::Error::PoolTimedOut))
    }
    async fn insert(&self, _: &str, _: Document) -> Result<Document, StoreError> {
        Err(StoreError::Db(sqlx::Error::PoolTimedOut))
    }
    async fn update(&self, _: &str, _: &str, _: Document) -> Result<Option<Document>, StoreError> {
        Err(StoreError::Db(sqlx::Error::PoolTimedOut))
    }
    async fn delete(&self, _: &str, _: &str) -> Result<bool, StoreError> {
        Err(StoreError::Db(sqlx::Error::PoolTimedOut))
    }
    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Db(sqlx::Error::PoolTimedOut))
    }
}

fn app_with_images(store: Arc<dyn DocumentStore>, images: Arc<StubImages>, settings: AppSettings) -> Router {
    let registry = resolve(&builtin_config().unwrap()).unwrap();
    app_router(AppState::new(store, registry, images, settings))
}

fn app_with(store: Arc<dyn DocumentStore>, settings: AppSettings) -> Router {
    app_with_images(store, Arc::new(StubImages::default()), settings)
}

fn app() -> Router {
    app_with(Arc::new(MemoryStore::new()), AppSettings::default())
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(v) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn health_is_ok() {
    let (status, body) = send(&app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn ready_reports_store_outage() {
    let app = app_with(Arc::new(BrokenStore), AppSettings::default());
    let (status, body) = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["store"], "unavailable");
}

#[tokio::test]
async fn brand_crud_round_trip() {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/api/v1/brands", Some(json!({"name": "Acme Tools"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["slug"], "acme-tools");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/brands/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Acme Tools");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/v1/brands/{}", id),
        Some(json!({"name": "Acme Corp"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["slug"], "acme-corp");

    let (status, body) = send(&app, Method::DELETE, &format!("/api/v1/brands/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = send(&app, Method::GET, &format!("/api/v1/brands/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], format!("No brand for this id {}", id));
}

#[tokio::test]
async fn list_envelope_with_sort_and_pagination() {
    let app = app();
    for name in ["Bravo", "Alpha", "Charlie"] {
        let (status, _) = send(&app, Method::POST, "/api/v1/brands", Some(json!({"name": name}))).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = send(&app, Method::GET, "/api/v1/brands?sort=-name&limit=2&fields=name", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["results"], 2);
    assert_eq!(body["paginationResult"]["currentPage"], 1);
    assert_eq!(body["paginationResult"]["resultsPerPage"], 2);
    assert_eq!(body["paginationResult"]["numberOfPages"], 2);
    assert_eq!(body["paginationResult"]["next"], 2);
    let names: Vec<&str> = body["data"].as_array().unwrap().iter().map(|d| d["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Charlie", "Bravo"]);
    assert!(body["data"][0].get("slug").is_none());
}

#[tokio::test]
async fn keyword_and_unknown_filters() {
    let app = app();
    for name in ["Nokia", "Samsung"] {
        send(&app, Method::POST, "/api/v1/brands", Some(json!({"name": name}))).await;
    }
    let (status, body) = send(&app, Method::GET, "/api/v1/brands?keyword=sams&bogus=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], 1);
    assert_eq!(body["data"][0]["name"], "Samsung");
}

#[tokio::test]
async fn validation_failure_lists_fields() {
    let (status, body) = send(&app(), Method::POST, "/api/v1/brands", Some(json!({"name": "A"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");
    let errors = body["errors"].as_array().unwrap();
    assert!(errors.iter().any(|e| e["field"] == "name"));
}

#[tokio::test]
async fn duplicate_name_conflicts() {
    let app = app();
    let (status, _) = send(&app, Method::POST, "/api/v1/categories", Some(json!({"name": "Phones"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, Method::POST, "/api/v1/categories", Some(json!({"name": "Phones"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "fail");
}

#[tokio::test]
async fn malformed_id_and_unknown_resource_are_not_found() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/brands/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No brand for this id not-a-uuid");

    let (status, body) = send(&app, Method::GET, "/api/v1/widgets", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Unknown resource: widgets");
}

#[tokio::test]
async fn unknown_route_is_bad_request() {
    let (status, body) = send(&app(), Method::GET, "/api/v2/brands", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Can't find this route: /api/v2/brands");
}

#[tokio::test]
async fn unsupported_method_is_bad_request() {
    let app = app();
    let (status, body) = send(&app, Method::PATCH, "/api/v1/brands", Some(json!({"name": "Acme"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "Can't find this route: /api/v1/brands");

    let (status, body) = send(&app, Method::POST, "/health", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Can't find this route: /health");
}

#[tokio::test]
async fn oversized_body_gets_error_envelope() {
    let settings = AppSettings {
        max_upload_bytes: 16,
        ..AppSettings::default()
    };
    let app = app_with(Arc::new(MemoryStore::new()), settings);
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/brands",
        Some(json!({"name": "A brand name well past sixteen bytes"})),
    )
    .await;
    assert!(status.is_client_error());
    assert_eq!(body["status"], "fail");

    let (_, body) = send(&app, Method::GET, "/api/v1/brands", None).await;
    assert_eq!(body["results"], 0);
}

#[tokio::test]
async fn server_errors_are_sanitized_in_production() {
    let settings = AppSettings {
        environment: Environment::Production,
        ..AppSettings::default()
    };
    let app = app_with(Arc::new(BrokenStore), settings);
    let (status, body) = send(&app, Method::GET, "/api/v1/brands", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], SANITIZED_MESSAGE);
}

#[tokio::test]
async fn server_errors_show_details_in_development() {
    let settings = AppSettings {
        environment: Environment::Development,
        ..AppSettings::default()
    };
    let app = app_with(Arc::new(BrokenStore), settings);
    let (status, body) = send(&app, Method::GET, "/api/v1/brands", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_ne!(body["message"], SANITIZED_MESSAGE);
}

fn multipart_body(boundary: &str, fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, value) in fields {
        out.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
            .as_bytes(),
        );
    }
    for (name, content_type, bytes) in files {
        out.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}.png\"\r\nContent-Type: {}\r\n\r\n",
                boundary, name, name, content_type
            )
            .as_bytes(),
        );
        out.extend_from_slice(bytes);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    out
}

async fn send_multipart(app: &Router, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn multipart_product_create_keeps_image_order() {
    let app = app();
    let (_, category) = send(&app, Method::POST, "/api/v1/categories", Some(json!({"name": "Phones"}))).await;
    let category_id = category["data"]["id"].as_str().unwrap().to_string();

    let body = multipart_body(
        "XBOUNDARY",
        &[
            ("title", "Galaxy S24"),
            ("description", "A flagship phone with a very good camera"),
            ("quantity", "10"),
            ("price", "999.5"),
            ("colors", "black"),
            ("colors", "white"),
            ("category", &category_id),
        ],
        &[
            ("imageCover", "image/png", b"c"),
            ("images", "image/png", b"1"),
            ("images", "image/png", b"22"),
        ],
    );
    let (status, body) = send_multipart(&app, "/api/v1/products", body).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let data = &body["data"];
    assert_eq!(data["slug"], "galaxy-s24");
    assert_eq!(data["quantity"], 10);
    assert_eq!(data["price"], 999.5);
    assert_eq!(data["colors"], json!(["black", "white"]));
    assert_eq!(data["imageCover"], "product-cover.jpeg");
    assert_eq!(data["images"], json!(["product-1.jpeg", "product-2.jpeg"]));

    let id = data["id"].as_str().unwrap();
    let (status, body) = send(&app, Method::GET, &format!("/api/v1/products/{}?populate=category", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["category"]["name"], "Phones");
}

#[tokio::test]
async fn one_failed_image_aborts_the_create() {
    let app = app();
    let (_, category) = send(&app, Method::POST, "/api/v1/categories", Some(json!({"name": "Phones"}))).await;
    let category_id = category["data"]["id"].as_str().unwrap().to_string();

    let body = multipart_body(
        "XBOUNDARY",
        &[
            ("title", "Galaxy S24"),
            ("description", "A flagship phone with a very good camera"),
            ("quantity", "10"),
            ("price", "999"),
            ("category", &category_id),
        ],
        &[
            ("imageCover", "image/png", b"c"),
            ("images", "image/png", b"1"),
            ("images", "image/png", b"bad"),
        ],
    );
    let (status, body) = send_multipart(&app, "/api/v1/products", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "fail");
    assert_eq!(body["message"], "unreadable image");

    let (_, body) = send(&app, Method::GET, "/api/v1/products", None).await;
    assert_eq!(body["results"], 0);
}

#[tokio::test]
async fn multipart_update_of_missing_id_stores_no_images() {
    let images = Arc::new(StubImages::default());
    let app = app_with_images(Arc::new(MemoryStore::new()), images.clone(), AppSettings::default());
    let missing = uuid::Uuid::new_v4().to_string();
    let body = multipart_body("XBOUNDARY", &[("name", "Acme")], &[("image", "image/png", b"logo")]);
    let req = Request::builder()
        .method(Method::PUT)
        .uri(format!("/api/v1/brands/{}", missing))
        .header(CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(images.calls.load(Ordering::SeqCst), 0);

    let body = multipart_body("XBOUNDARY", &[("name", "Acme")], &[("image", "image/png", b"logo")]);
    let req = Request::builder()
        .method(Method::PUT)
        .uri("/api/v1/brands/not-a-uuid")
        .header(CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(images.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let body = multipart_body("XBOUNDARY", &[("name", "Acme")], &[("image", "text/plain", b"hello")]);
    let (status, body) = send_multipart(&app(), "/api/v1/brands", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Only images allowed");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (status, body) = send(&app(), Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/api/v1/{resource}").is_some());
}
