use std::net::SocketAddr;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::Request;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::*;

struct TestApp {
    router: Router,
    uploads: tempfile::TempDir,
}

fn test_app(pool: SqlitePool) -> TestApp {
    test_app_with_limit(pool, RateLimitState::new(1_000, Duration::from_secs(60)))
}

fn test_app_with_limit(pool: SqlitePool, rate_limit: RateLimitState) -> TestApp {
    let uploads = tempfile::tempdir().expect("tempdir");
    let max_upload_bytes = 5 * 1024 * 1024;
    let state = AppState {
        pool,
        uploads: UploadStore::new(uploads.path(), max_upload_bytes),
    };
    let options = HttpOptions {
        cors_origin: CorsOrigin::Any,
        max_upload_bytes,
    };
    TestApp {
        router: build_app(state, &options, rate_limit),
        uploads,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        user_id: Option<i64>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = user_id {
            builder = builder.header(USER_ID_HEADER, id.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.send_request(request).await
    }

    async fn send_request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json parse")
        };
        (status, json)
    }

    async fn get(&self, uri: &str, user_id: Option<i64>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, user_id, None).await
    }

    async fn send_multipart(
        &self,
        method: Method,
        uri: &str,
        user_id: i64,
        body: Vec<u8>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_ID_HEADER, user_id.to_string())
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request");
        self.send_request(request).await
    }

    fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.uploads.path())
            .expect("read uploads dir")
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

const BOUNDARY: &str = "wbnt-test-boundary";

/// A file part for [`multipart_body`]: field name, filename, bytes.
type FilePart<'a> = (&'a str, &'a str, &'a [u8]);

fn multipart_body(fields: &[(&str, &str)], file: Option<FilePart<'_>>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((name, filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn insert_user(pool: &SqlitePool, username: &str, role: &str, status: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO users (email, username, password_hash, role, status) \
         VALUES (?1, ?2, 'not-a-hash', ?3, ?4) RETURNING id",
    )
    .bind(format!("{username}@wbnt.test"))
    .bind(username)
    .bind(role)
    .bind(status)
    .fetch_one(pool)
    .await
    .expect("insert user")
}

async fn insert_product(pool: &SqlitePool, name: &str, price: i64, status: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO products (name, price, status) VALUES (?1, ?2, ?3) RETURNING id",
    )
    .bind(name)
    .bind(price)
    .bind(status)
    .fetch_one(pool)
    .await
    .expect("insert product")
}

async fn insert_review(pool: &SqlitePool, product_id: i64, username: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO product_reviews (product_id, username, rating, comment) \
         VALUES (?1, ?2, 5, 'Love it') RETURNING id",
    )
    .bind(product_id)
    .bind(username)
    .fetch_one(pool)
    .await
    .expect("insert review")
}

// ---------------------------------------------------------------------------
// Envelope and health
// ---------------------------------------------------------------------------

#[test]
fn api_error_codes_map_to_statuses() {
    for (code, status) in [
        ("validation_error", StatusCode::BAD_REQUEST),
        ("bad_request", StatusCode::BAD_REQUEST),
        ("unauthorized", StatusCode::UNAUTHORIZED),
        ("forbidden", StatusCode::FORBIDDEN),
        ("not_found", StatusCode::NOT_FOUND),
        ("conflict", StatusCode::CONFLICT),
        ("payload_too_large", StatusCode::PAYLOAD_TOO_LARGE),
        ("rate_limited", StatusCode::TOO_MANY_REQUESTS),
        ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
    ] {
        let response = ApiError::new("req-1", code, "x").into_response();
        assert_eq!(response.status(), status, "code {code}");
    }
}

#[test]
fn parse_id_treats_garbage_as_missing() {
    assert_eq!(parse_id("r", " 12 ", "Product").ok(), Some(12));
    let err = parse_id("r", "abc", "Product").unwrap_err();
    assert_eq!(err.error.code, "not_found");
    assert_eq!(err.error.message, "Product not found");
}

#[sqlx::test(migrations = "../../migrations")]
async fn health_reports_ok(pool: SqlitePool) {
    let app = test_app(pool);
    let (status, json) = app.get("/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["database"], "ok");
    assert!(json["meta"]["request_id"].is_string());
}

// ---------------------------------------------------------------------------
// Auth and gates
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn register_then_login(pool: SqlitePool) {
    let app = test_app(pool);
    let (status, json) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "ana@wbnt.test", "username": "ana", "password": "secret"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["user"]["role"], "buyer");
    assert!(json["data"]["user"].get("password_hash").is_none());
    let id = json["data"]["user"]["id"].as_i64().expect("id");

    let (status, json) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ana@wbnt.test", "password": "secret"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user"]["id"], id);

    let (status, json) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ana@wbnt.test", "password": "wrong"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["message"], "Invalid email or password");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "ana@wbnt.test", "username": "ana2", "password": "x"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = app.get(&format!("/api/auth/me/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user"]["username"], "ana");
}

#[sqlx::test(migrations = "../../migrations")]
async fn registration_rejects_missing_fields_and_bad_roles(pool: SqlitePool) {
    let app = test_app(pool);
    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "a@wbnt.test", "password": "x"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "a@wbnt.test", "username": "a", "password": "x", "role": "owner"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
async fn second_admin_registration_conflicts(pool: SqlitePool) {
    insert_user(&pool, "founder", "admin", "active").await;
    let app = test_app(pool);
    let (status, json) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "b@wbnt.test", "username": "b", "password": "x", "role": "admin"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["message"], "Only one admin account is allowed");
}

#[sqlx::test(migrations = "../../migrations")]
async fn login_refuses_banned_accounts(pool: SqlitePool) {
    insert_user(&pool, "gone", "buyer", "banned").await;
    let app = test_app(pool);
    let (status, json) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "gone@wbnt.test", "password": "whatever"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["message"], "Your account has been banned");
}

#[sqlx::test(migrations = "../../migrations")]
async fn auth_routes_are_rate_limited(pool: SqlitePool) {
    let app = test_app_with_limit(pool, RateLimitState::new(1, Duration::from_secs(60)));
    let body = json!({"email": "nobody@wbnt.test", "password": "x"});
    let (first, _) = app
        .send(Method::POST, "/api/auth/login", None, Some(body.clone()))
        .await;
    assert_eq!(first, StatusCode::UNAUTHORIZED);
    let (second, json) = app
        .send(Method::POST, "/api/auth/login", None, Some(body))
        .await;
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"]["code"], "rate_limited");
}

#[sqlx::test(migrations = "../../migrations")]
async fn rate_limit_is_tracked_per_client_address(pool: SqlitePool) {
    let app = test_app_with_limit(pool, RateLimitState::new(1, Duration::from_secs(60)));
    let login_from = |ip: [u8; 4]| {
        Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .extension(ConnectInfo(SocketAddr::from((ip, 40_000))))
            .body(Body::from(
                json!({"email": "nobody@wbnt.test", "password": "x"}).to_string(),
            ))
            .expect("request")
    };

    let (status, _) = app.send_request(login_from([10, 0, 0, 1])).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.send_request(login_from([10, 0, 0, 1])).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = app.send_request(login_from([10, 0, 0, 2])).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../migrations")]
async fn malformed_json_bodies_use_the_error_envelope(pool: SqlitePool) {
    let buyer = insert_user(&pool, "ana", "buyer", "active").await;
    let app = test_app(pool);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\": "))
        .expect("request");
    let (status, json) = app.send_request(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
    assert!(json["meta"]["request_id"].is_string());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .body(Body::from(r#"{"email":"a@wbnt.test","password":"x"}"#))
        .expect("request");
    let (status, json) = app.send_request(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");

    let (status, json) = app
        .send(
            Method::POST,
            "/api/orders",
            Some(buyer),
            Some(json!({
                "shipping_address": "Pasig",
                "payment_method": "cod",
                "items": [{"product_id": "3"}]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn gates_check_identity_status_and_role(pool: SqlitePool) {
    let buyer = insert_user(&pool, "buyer", "buyer", "active").await;
    let suspended = insert_user(&pool, "sleepy", "buyer", "suspended").await;
    let moderator = insert_user(&pool, "mika", "mod", "active").await;
    let app = test_app(pool);

    let (status, json) = app.get("/api/orders", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"]["message"], "Unauthorized");

    let (status, _) = app.get("/api/orders", Some(9_999)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/orders", Some(suspended)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/orders", Some(buyer)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = app.get("/api/admin/products", Some(buyer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["message"], "Admin or moderator access required");

    let (status, _) = app.get("/api/admin/products", Some(moderator)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = app.get("/api/admin/users", Some(moderator)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["message"], "Admin access required");
}

// ---------------------------------------------------------------------------
// Admin users
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn first_admin_is_protected(pool: SqlitePool) {
    let admin = insert_user(&pool, "founder", "admin", "active").await;
    let buyer = insert_user(&pool, "buyer", "buyer", "active").await;
    let app = test_app(pool);

    let (status, json) = app
        .send(
            Method::PATCH,
            &format!("/api/admin/users/{admin}/status"),
            Some(admin),
            Some(json!({"status": "banned"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["message"], "Cannot change the first admin account");

    let (status, json) = app
        .send(
            Method::PATCH,
            &format!("/api/admin/users/{buyer}/role"),
            Some(admin),
            Some(json!({"role": "mod"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user"]["role"], "mod");

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/api/admin/users/{buyer}/role"),
            Some(admin),
            Some(json!({"role": "admin"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::PATCH,
            "/api/admin/users/424242/status",
            Some(admin),
            Some(json!({"status": "suspended"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = app.get("/api/admin/users", Some(admin)).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = json["data"]["users"]
        .as_array()
        .expect("users")
        .iter()
        .filter_map(|u| u["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![admin, buyer]);
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn staff_manage_products_with_json_bodies(pool: SqlitePool) {
    let moderator = insert_user(&pool, "mika", "mod", "active").await;
    let app = test_app(pool);

    let (status, json) = app
        .send(
            Method::POST,
            "/api/admin/products",
            Some(moderator),
            Some(json!({"name": "Baby Tee", "price": "350"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let product = &json["data"]["product"];
    assert_eq!(product["price"], 350);
    assert_eq!(product["size"], "Free Size");
    assert_eq!(product["status"], "Available");
    let id = product["id"].as_i64().expect("id");

    let (status, json) = app
        .send(
            Method::POST,
            "/api/admin/products",
            Some(moderator),
            Some(json!({"name": "No Price"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "Name and price are required");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/admin/products",
            Some(moderator),
            Some(json!({"name": "Odd", "price": 10, "status": "Reserved"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app
        .send(
            Method::PATCH,
            &format!("/api/admin/products/{id}"),
            Some(moderator),
            Some(json!({"status": "Sold", "category": "Tops"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["product"]["status"], "Sold");
    assert_eq!(json["data"]["product"]["category"], "Tops");
    assert_eq!(json["data"]["product"]["name"], "Baby Tee");

    let (status, json) = app
        .send(
            Method::PATCH,
            &format!("/api/admin/products/{id}"),
            Some(moderator),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "No fields to update");

    let (status, _) = app
        .send(
            Method::PATCH,
            "/api/admin/products/abc",
            Some(moderator),
            Some(json!({"price": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = app
        .send(
            Method::DELETE,
            &format!("/api/admin/products/{id}"),
            Some(moderator),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["success"], true);

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/admin/products/{id}"),
            Some(moderator),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../migrations")]
async fn product_delete_removes_stored_image(pool: SqlitePool) {
    let moderator = insert_user(&pool, "mika", "mod", "active").await;
    let id = insert_product(&pool, "Cargo Pants", 800, "Available").await;
    sqlx::query("UPDATE products SET image = 'old.jpg' WHERE id = ?1")
        .bind(id)
        .execute(&pool)
        .await
        .expect("set image");
    let app = test_app(pool);
    let image_path = app.uploads.path().join("old.jpg");
    std::fs::write(&image_path, b"jpeg").expect("write image");

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/admin/products/{id}"),
            Some(moderator),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!image_path.exists());
}

#[sqlx::test(migrations = "../../migrations")]
async fn product_images_arrive_as_multipart_and_replace_old_files(pool: SqlitePool) {
    let moderator = insert_user(&pool, "mika", "mod", "active").await;
    let app = test_app(pool);

    let body = multipart_body(
        &[("name", "Baby Tee"), ("price", "350"), ("size", "S")],
        Some(("image", "tee.png", &b"0123456789"[..])),
    );
    let (status, json) = app
        .send_multipart(Method::POST, "/api/admin/products", moderator, body)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let product = &json["data"]["product"];
    assert_eq!(product["name"], "Baby Tee");
    assert_eq!(product["price"], 350);
    assert_eq!(product["size"], "S");
    let id = product["id"].as_i64().expect("id");
    let first_image = product["image"].as_str().expect("image").to_owned();
    assert!(first_image.ends_with(".png"));
    assert_eq!(app.stored_files(), vec![first_image.clone()]);
    assert_eq!(
        std::fs::read(app.uploads.path().join(&first_image)).expect("stored bytes"),
        b"0123456789"
    );

    let body = multipart_body(
        &[("price", "400")],
        Some(("image", "tee-back.webp", &b"webp-bytes"[..])),
    );
    let (status, json) = app
        .send_multipart(
            Method::PATCH,
            &format!("/api/admin/products/{id}"),
            moderator,
            body,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let product = &json["data"]["product"];
    assert_eq!(product["price"], 400);
    assert_eq!(product["name"], "Baby Tee");
    let second_image = product["image"].as_str().expect("image").to_owned();
    assert!(second_image.ends_with(".webp"));
    assert_ne!(second_image, first_image);
    assert_eq!(app.stored_files(), vec![second_image.clone()]);

    // An empty file input leaves the current image alone.
    let body = multipart_body(&[("status", "Sold")], Some(("image", "", &b""[..])));
    let (status, json) = app
        .send_multipart(
            Method::PATCH,
            &format!("/api/admin/products/{id}"),
            moderator,
            body,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["product"]["status"], "Sold");
    assert_eq!(json["data"]["product"]["image"], second_image.as_str());
    assert_eq!(app.stored_files(), vec![second_image]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn oversized_product_image_is_rejected(pool: SqlitePool) {
    let moderator = insert_user(&pool, "mika", "mod", "active").await;
    let app = test_app(pool);

    let oversized = vec![0u8; 5 * 1024 * 1024 + 10];
    let body = multipart_body(
        &[("name", "Heavy Coat"), ("price", "900")],
        Some(("image", "coat.jpg", oversized.as_slice())),
    );
    let (status, json) = app
        .send_multipart(Method::POST, "/api/admin/products", moderator, body)
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["error"]["code"], "payload_too_large");
    assert!(app.stored_files().is_empty());

    let (_, json) = app.get("/api/admin/products", Some(moderator)).await;
    assert_eq!(json["data"]["products"], json!([]));
}

#[sqlx::test(migrations = "../../migrations")]
async fn public_product_list_honours_limit(pool: SqlitePool) {
    let first = insert_product(&pool, "First", 100, "Available").await;
    let second = insert_product(&pool, "Second", 200, "Available").await;
    let third = insert_product(&pool, "Third", 300, "Sold").await;
    let app = test_app(pool);

    let (status, json) = app.get("/api/products", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = json["data"]["products"]
        .as_array()
        .expect("products")
        .iter()
        .filter_map(|p| p["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![third, second, first]);

    let (_, json) = app.get("/api/products?limit=2", None).await;
    assert_eq!(json["data"]["products"].as_array().map(Vec::len), Some(2));

    let (_, json) = app.get("/api/products?limit=0", None).await;
    assert_eq!(json["data"]["products"].as_array().map(Vec::len), Some(3));
}

// ---------------------------------------------------------------------------
// Reviews and homepage
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn reviews_by_ids_and_staff_review_list(pool: SqlitePool) {
    let moderator = insert_user(&pool, "mika", "mod", "active").await;
    let product = insert_product(&pool, "Denim Skirt", 650, "Available").await;
    let first = insert_review(&pool, product, "ana").await;
    let second = insert_review(&pool, product, "bea").await;
    let app = test_app(pool);

    let (status, json) = app
        .get(&format!("/api/reviews?ids={first},abc,{second},-4"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["reviews"].as_array().map(Vec::len), Some(2));

    let (_, json) = app.get("/api/reviews?ids=", None).await;
    assert_eq!(json["data"]["reviews"], json!([]));

    let (_, json) = app.get("/api/reviews", None).await;
    assert_eq!(json["data"]["reviews"], json!([]));

    let (status, json) = app.get("/api/admin/reviews", Some(moderator)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["reviews"][0]["product_name"], "Denim Skirt");

    let (status, json) = app
        .get(&format!("/api/admin/products/{product}/reviews"), Some(moderator))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["product"]["id"], product);
    assert_eq!(json["data"]["reviews"].as_array().map(Vec::len), Some(2));
}

#[sqlx::test(migrations = "../../migrations")]
async fn homepage_sections_are_upserted(pool: SqlitePool) {
    let moderator = insert_user(&pool, "mika", "mod", "active").await;
    wbnt_db::seed_homepage_defaults(&pool)
        .await
        .expect("seed defaults");
    let app = test_app(pool);

    let (status, json) = app.get("/api/homepage", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["data"]["content"]["achievements_title"],
        "Some of Our Achievements"
    );

    let (status, json) = app
        .send(
            Method::PATCH,
            "/api/admin/homepage",
            Some(moderator),
            Some(json!({"section_key": "cta", "content": {"title": "Shop now", "buttonText": "Go"}})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["section_key"], "cta");
    assert_eq!(json["data"]["content"]["title"], "Shop now");

    let (_, json) = app.get("/api/admin/homepage", Some(moderator)).await;
    assert_eq!(json["data"]["content"]["cta"]["buttonText"], "Go");

    let (status, _) = app
        .send(
            Method::PATCH,
            "/api/admin/homepage",
            Some(moderator),
            Some(json!({"content": "orphan"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
async fn homepage_upload_stores_one_image(pool: SqlitePool) {
    let moderator = insert_user(&pool, "mika", "mod", "active").await;
    let app = test_app(pool);

    let body = multipart_body(&[], Some(("image", "banner.gif", &b"GIF89a"[..])));
    let (status, json) = app
        .send_multipart(Method::POST, "/api/admin/homepage/upload", moderator, body)
        .await;
    assert_eq!(status, StatusCode::OK);
    let filename = json["data"]["filename"].as_str().expect("filename").to_owned();
    assert!(filename.ends_with(".gif"));
    assert_eq!(app.stored_files(), vec![filename]);

    let body = multipart_body(&[("caption", "no file here")], None);
    let (status, json) = app
        .send_multipart(Method::POST, "/api/admin/homepage/upload", moderator, body)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "No image file provided");

    let body = multipart_body(&[], Some(("image", "", &b""[..])));
    let (status, _) = app
        .send_multipart(Method::POST, "/api/admin/homepage/upload", moderator, body)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let oversized = vec![0u8; 5 * 1024 * 1024 + 10];
    let body = multipart_body(&[], Some(("image", "huge.png", oversized.as_slice())));
    let (status, json) = app
        .send_multipart(Method::POST, "/api/admin/homepage/upload", moderator, body)
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["error"]["code"], "payload_too_large");
    assert_eq!(app.stored_files().len(), 1);
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn checkout_skips_unavailable_items(pool: SqlitePool) {
    let buyer = insert_user(&pool, "ana", "buyer", "active").await;
    let available = insert_product(&pool, "Baby Tee", 450, "Available").await;
    let sold = insert_product(&pool, "Sold Jacket", 1200, "Sold").await;
    let app = test_app(pool);

    let (status, json) = app
        .send(
            Method::POST,
            "/api/orders",
            Some(buyer),
            Some(json!({
                "shipping_address": "Quezon City",
                "payment_method": "cod",
                "items": [
                    {"product_id": available, "quantity": 2},
                    {"product_id": sold, "quantity": 1},
                    {"product_id": 99_999, "quantity": 1}
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["order"]["total_amount"], 900);
    assert_eq!(json["data"]["order"]["status"], "pending");

    let (status, json) = app.get("/api/orders", Some(buyer)).await;
    assert_eq!(status, StatusCode::OK);
    let items = &json["data"]["orders"][0]["items"];
    assert_eq!(items.as_array().map(Vec::len), Some(1));
    assert_eq!(items[0]["product_name"], "Baby Tee");
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["price_at_time"], 450);

    let (status, json) = app
        .send(
            Method::POST,
            "/api/orders",
            Some(buyer),
            Some(json!({
                "shipping_address": "Quezon City",
                "payment_method": "cod",
                "items": [{"product_id": sold}]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "No valid items to order");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/orders",
            Some(buyer),
            Some(json!({"shipping_address": "Quezon City", "items": []})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
async fn checkout_rejects_totals_that_overflow(pool: SqlitePool) {
    let buyer = insert_user(&pool, "ana", "buyer", "active").await;
    let product = insert_product(&pool, "Baby Tee", 450, "Available").await;
    let app = test_app(pool.clone());

    let (status, json) = app
        .send(
            Method::POST,
            "/api/orders",
            Some(buyer),
            Some(json!({
                "shipping_address": "Quezon City",
                "payment_method": "cod",
                "items": [
                    {"product_id": product, "quantity": i64::MAX},
                    {"product_id": product, "quantity": i64::MAX}
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "validation_error");

    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&pool)
        .await
        .expect("count orders");
    assert_eq!(orders, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn buyers_cancel_only_their_open_orders(pool: SqlitePool) {
    let admin = insert_user(&pool, "founder", "admin", "active").await;
    let owner = insert_user(&pool, "ana", "buyer", "active").await;
    let stranger = insert_user(&pool, "bea", "buyer", "active").await;
    let product = insert_product(&pool, "Baby Tee", 450, "Available").await;
    let app = test_app(pool);

    let (_, json) = app
        .send(
            Method::POST,
            "/api/orders",
            Some(owner),
            Some(json!({
                "shipping_address": "Pasig",
                "payment_method": "gcash",
                "items": [{"product_id": product, "quantity": "1"}]
            })),
        )
        .await;
    let order = json["data"]["order"]["id"].as_i64().expect("order id");
    let cancel = format!("/api/orders/{order}/cancel");

    let (status, json) = app.send(Method::PATCH, &cancel, Some(stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["message"], "Access denied");

    let (status, _) = app
        .send(Method::PATCH, "/api/orders/777/cancel", Some(owner), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = app.send(Method::PATCH, &cancel, Some(owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["order"]["status"], "cancelled");
    assert_eq!(json["data"]["order"]["items"].as_array().map(Vec::len), Some(1));

    let (status, json) = app
        .send(
            Method::PATCH,
            &format!("/api/admin/orders/{order}"),
            Some(admin),
            Some(json!({"status": "shipped"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let shipped = &json["data"]["order"];
    assert_eq!(shipped["status"], "shipped");
    assert_eq!(shipped["user"]["username"], "ana");
    assert_eq!(shipped["user"]["email"], "ana@wbnt.test");
    assert_eq!(shipped["items"][0]["product_name"], "Baby Tee");

    let (status, json) = app.send(Method::PATCH, &cancel, Some(owner), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["error"]["message"],
        "Only pending or processing orders can be cancelled"
    );

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/api/admin/orders/{order}"),
            Some(admin),
            Some(json!({"status": "lost"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app.get("/api/admin/orders", Some(admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["orders"][0]["user"]["username"], "ana");
    assert_eq!(json["data"]["orders"][0]["items"][0]["product_name"], "Baby Tee");
}

// ---------------------------------------------------------------------------
// Support
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn customers_see_only_their_threads(pool: SqlitePool) {
    let owner = insert_user(&pool, "ana", "buyer", "active").await;
    let stranger = insert_user(&pool, "bea", "buyer", "active").await;
    let app = test_app(pool);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/support/threads",
            Some(owner),
            Some(json!({"subject": "  "})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app
        .send(
            Method::POST,
            "/api/support/threads",
            Some(owner),
            Some(json!({"subject": "Sizing question"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let thread = json["data"]["thread"]["id"].as_i64().expect("thread id");
    let messages = format!("/api/support/threads/{thread}/messages");

    let (status, json) = app
        .send(
            Method::POST,
            &messages,
            Some(owner),
            Some(json!({"content": "  Is the tee a size S?  "})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["messages"][0]["content"], "Is the tee a size S?");
    assert_eq!(json["data"]["messages"][0]["sender_role"], "user");

    let (status, _) = app.get(&messages, Some(stranger)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, json) = app.get("/api/support/threads", Some(stranger)).await;
    assert_eq!(json["data"]["threads"], json!([]));

    let (status, json) = app.get(&messages, Some(owner)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["thread"]["subject"], "Sizing question");
}

#[sqlx::test(migrations = "../../migrations")]
async fn moderators_claim_and_hand_off_threads(pool: SqlitePool) {
    let admin = insert_user(&pool, "founder", "admin", "active").await;
    let mod_a = insert_user(&pool, "mika", "mod", "active").await;
    let mod_b = insert_user(&pool, "nico", "mod", "active").await;
    let buyer = insert_user(&pool, "ana", "buyer", "active").await;
    let thread = wbnt_db::create_thread(&pool, buyer, "Where is my parcel?")
        .await
        .expect("thread")
        .id;
    let staff_thread = wbnt_db::create_thread(&pool, mod_b, "Internal")
        .await
        .expect("thread")
        .id;
    let app = test_app(pool);
    let messages = format!("/api/admin/support/threads/{thread}/messages");
    let assign = format!("/api/admin/support/threads/{thread}/assign");

    let (_, json) = app.get("/api/admin/support/threads", Some(admin)).await;
    let listed: Vec<i64> = json["data"]["threads"]
        .as_array()
        .expect("threads")
        .iter()
        .filter_map(|t| t["id"].as_i64())
        .collect();
    assert_eq!(listed, vec![thread]);

    let (status, json) = app.get(&messages, Some(mod_a)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["thread"]["assigned_to"], mod_a);
    assert_eq!(json["data"]["thread"]["user"]["username"], "ana");
    assert_eq!(json["data"]["thread"]["assigned_to_user"]["username"], "mika");

    let (_, json) = app.get("/api/admin/support/threads", Some(mod_b)).await;
    assert_eq!(json["data"]["threads"], json!([]));

    let (status, json) = app.get(&messages, Some(mod_b)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        json["error"]["message"],
        "This thread is assigned to another moderator"
    );

    let (status, _) = app
        .send(
            Method::PATCH,
            &assign,
            Some(mod_b),
            Some(json!({"assigned_to": mod_b})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(
            Method::PATCH,
            &assign,
            Some(admin),
            Some(json!({"assigned_to": buyer})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = app
        .send(
            Method::PATCH,
            &assign,
            Some(admin),
            Some(json!({"assigned_to": mod_b})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["thread"]["assigned_to"], mod_b);

    let (status, _) = app
        .send(
            Method::POST,
            &messages,
            Some(mod_a),
            Some(json!({"content": "On its way"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::PATCH,
            &assign,
            Some(mod_a),
            Some(json!({"assigned_to": null})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, json) = app
        .send(
            Method::POST,
            &messages,
            Some(mod_b),
            Some(json!({"content": "On its way"})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["data"]["messages"][0]["sender_role"], "admin");
    assert_eq!(json["data"]["messages"][0]["sender_id"], mod_b);

    let (status, json) = app
        .send(
            Method::PATCH,
            &format!("/api/admin/support/threads/{staff_thread}/assign"),
            Some(admin),
            Some(json!({"assigned_to": null})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"]["message"], "Can only assign buyer threads");

    let (status, _) = app
        .get("/api/admin/support/threads/nope/messages", Some(admin))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
