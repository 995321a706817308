use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use geodata::api::AppState;
use geodata::config::Config;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use tracing::field::{Field, Visit};
use tracing::span;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const ADMIN: &str = "admin";
const ADMIN_PASSWORD: &str = "correct horse battery staple";

async fn spawn_app() -> (Arc<AppState>, Router) {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.security.token_secret = "integration-test-secret".to_string();
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;

    let state = geodata::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");

    state
        .accounts()
        .create(ADMIN, ADMIN_PASSWORD, true)
        .await
        .expect("Failed to seed admin user");

    let router = geodata::api::router(state.clone()).await;
    (state, router)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();

    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, json)
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/auth",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await
}

async fn admin_token(app: &Router) -> String {
    let (status, body) = login(app, ADMIN, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["access_token"].as_str().unwrap().to_string()
}

const CA_AB_CITIES: &str = "/geolocation/country/CA/subdivision/AB/city/";

#[tokio::test]
async fn test_root_greeting() {
    let (_state, app) = spawn_app().await;

    let (status, body) = send(&app, "GET", "/", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("Computer says, \"Hello.\"".to_string()));
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let (state, app) = spawn_app().await;
    state.accounts().create("dormant", "pw", false).await.unwrap();

    let unknown = login(&app, "ghost", ADMIN_PASSWORD).await;
    let wrong = login(&app, ADMIN, "not the password").await;
    let disabled = login(&app, "dormant", "pw").await;

    for (status, body) in [&unknown, &wrong, &disabled] {
        assert_eq!(*status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credential");
    }
    assert_eq!(unknown.1, wrong.1);
    assert_eq!(wrong.1, disabled.1);
}

#[tokio::test]
async fn test_login_issues_usable_token() {
    let (_state, app) = spawn_app().await;

    let (status, body) = login(&app, ADMIN, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["expires_in"], 300);
    let token = body["data"]["access_token"].as_str().unwrap();

    let (status, body) = send(&app, "GET", "/protected", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], ADMIN);
    assert!(body["data"]["last_login_date"].is_string());

    // Legacy scheme name.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/protected")
                .header("Authorization", format!("JWT {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_requires_valid_token() {
    let (_state, app) = spawn_app().await;

    let (status, _) = send(&app, "GET", "/protected", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, "GET", "/protected", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn test_token_stops_working_when_user_is_gone() {
    let (state, app) = spawn_app().await;
    state.accounts().create("temp", "pw", true).await.unwrap();
    let (_, body) = login(&app, "temp", "pw").await;
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    state.accounts().disable("temp").await.unwrap();
    let (status, _) = send(&app, "GET", "/protected", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    state.accounts().enable("temp").await.unwrap();
    let (status, _) = send(&app, "GET", "/protected", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    state.accounts().delete("temp").await.unwrap();
    let (status, _) = send(&app, "GET", "/protected", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_country_and_subdivision_lookups() {
    let (_state, app) = spawn_app().await;

    let (status, body) = send(&app, "GET", "/geolocation/country/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().len() >= 249);

    let (status, body) = send(&app, "GET", "/geolocation/country/ca", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["alpha_3"], "CAN");

    let (status, _) = send(&app, "GET", "/geolocation/country/ZZ", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) =
        send(&app, "GET", "/geolocation/country/CA/subdivision/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 13);

    let (status, body) =
        send(&app, "GET", "/geolocation/country/FR/subdivision/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["data"].as_array().unwrap().is_empty());

    let (status, _) = send(&app, "GET", "/geolocation/country/ZZ/subdivision/", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) =
        send(&app, "GET", "/geolocation/country/CA/subdivision/AB", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["code"], "CA-AB");
    assert_eq!(body["data"]["name"], "Alberta");

    let (status, _) =
        send(&app, "GET", "/geolocation/country/CA/subdivision/ZZ", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_city_create_requires_token() {
    let (state, app) = spawn_app().await;

    let (status, _) = send(
        &app,
        "POST",
        CA_AB_CITIES,
        None,
        Some(json!({ "name": "Calgary" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let key = geodata::reference::SubdivisionKey::parse("CA-AB").unwrap();
    assert!(state.cities().list(&key).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_city_lifecycle() {
    let (_state, app) = spawn_app().await;
    let token = admin_token(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        CA_AB_CITIES,
        Some(&token),
        Some(json!({ "name": "Calgary" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], "Calgary");
    assert_eq!(body["data"]["subdivision"], "CA-AB");
    let id = body["data"]["id"].as_i64().unwrap();
    let city_uri = format!("{CA_AB_CITIES}{id}");

    let (status, body) = send(&app, "GET", &city_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id);

    let (status, body) = send(
        &app,
        "PUT",
        &city_uri,
        Some(&token),
        Some(json!({ "name": "Calgary East", "subdivision": "CA-AB" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (_, body) = send(&app, "GET", &city_uri, None, None).await;
    assert_eq!(body["data"]["name"], "Calgary East");

    let (status, _) = send(&app, "DELETE", &city_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &city_uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", &city_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_city_write_errors_are_client_errors() {
    let (_state, app) = spawn_app().await;
    let token = admin_token(&app).await;

    let (status, _) = send(
        &app,
        "POST",
        CA_AB_CITIES,
        Some(&token),
        Some(json!({ "name": "Calgary" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        "POST",
        CA_AB_CITIES,
        Some(&token),
        Some(json!({ "name": "Calgary" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "City already exists");

    let (status, body) = send(
        &app,
        "POST",
        CA_AB_CITIES,
        Some(&token),
        Some(json!({ "name": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "City name length");

    let (status, body) = send(
        &app,
        "POST",
        "/geolocation/country/ZZ/subdivision/99/city/",
        Some(&token),
        Some(json!({ "name": "Springfield" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "country_alpha2 and subdivision_code are invalid"
    );

    let (status, _) = send(
        &app,
        "GET",
        "/geolocation/country/ZZ/subdivision/99/city/1",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", CA_AB_CITIES, None, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_city_update_validates_new_values() {
    let (_state, app) = spawn_app().await;
    let token = admin_token(&app).await;

    let (_, body) = send(
        &app,
        "POST",
        CA_AB_CITIES,
        Some(&token),
        Some(json!({ "name": "Calgary" })),
    )
    .await;
    let id = body["data"]["id"].as_i64().unwrap();
    let city_uri = format!("{CA_AB_CITIES}{id}");

    let (status, _) = send(
        &app,
        "PUT",
        &city_uri,
        Some(&token),
        Some(json!({ "name": "", "subdivision": "CA-AB" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PUT",
        &city_uri,
        Some(&token),
        Some(json!({ "name": "Calgary", "subdivision": "ZZ-99" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("{CA_AB_CITIES}424242"),
        Some(&token),
        Some(json!({ "name": "Nowhere", "subdivision": "CA-AB" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", &city_uri, None, None).await;
    assert_eq!(body["data"]["name"], "Calgary");
}

#[tokio::test]
async fn test_city_list_is_ordered_by_name() {
    let (_state, app) = spawn_app().await;
    let token = admin_token(&app).await;

    for name in ["Banff", "Calgary", "Airdrie"] {
        let (status, _) = send(
            &app,
            "POST",
            CA_AB_CITIES,
            Some(&token),
            Some(json!({ "name": name })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, "GET", CA_AB_CITIES, None, None).await;
    assert_eq!(status, StatusCode::OK);

    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Airdrie", "Banff", "Calgary"]);
}

#[tokio::test]
async fn test_change_password() {
    let (_state, app) = spawn_app().await;
    let token = admin_token(&app).await;

    let (status, body) = send(
        &app,
        "PUT",
        "/geolocation/account/password",
        Some(&token),
        Some(json!({ "current_password": "wrong", "new_password": "fresh" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Current password is not correct.");

    let (status, _) = login(&app, ADMIN, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "PUT",
        "/geolocation/account/password",
        Some(&token),
        Some(json!({ "current_password": ADMIN_PASSWORD, "new_password": "fresh" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = login(&app, ADMIN, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&app, ADMIN, "fresh").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_and_metrics_fallback() {
    let (_state, app) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");

    let (status, body) = send(&app, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("Metrics not enabled".to_string()));
}

/// Collects `user_id` values recorded on `request` spans.
#[derive(Clone, Default)]
struct UserIdCapture(Arc<Mutex<Vec<i64>>>);

struct UserIdVisitor<'a>(&'a Mutex<Vec<i64>>);

impl Visit for UserIdVisitor<'_> {
    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == "user_id" {
            self.0.lock().unwrap().push(value);
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
}

impl<S> Layer<S> for UserIdCapture
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        if ctx.metadata(id).is_some_and(|meta| meta.name() == "request") {
            values.record(&mut UserIdVisitor(&self.0));
        }
    }
}

#[tokio::test]
async fn test_authenticated_user_is_recorded_on_request_span() {
    let capture = UserIdCapture::default();
    let _guard = tracing_subscriber::registry()
        .with(capture.clone())
        .set_default();

    let (state, app) = spawn_app().await;
    let admin = state.accounts().get(ADMIN).await.unwrap();
    let (_, body) = login(&app, ADMIN, ADMIN_PASSWORD).await;
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "GET", "/protected", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let recorded = capture.0.lock().unwrap().clone();
    assert_eq!(recorded, vec![i64::from(admin.id)]);
}
