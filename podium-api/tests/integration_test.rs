use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use podium_api::app;
use podium_api::state::{AppState, AuthConfig, Backends};
use podium_core::notify::{Notification, Notifier};
use podium_store::app_config::BusinessRules;
use podium_store::memory::{InMemoryKeyValueStore, InMemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;

const PASSWORD: &str = "Str0ng!Pass";

struct TestApp {
    router: Router,
    rx: mpsc::Receiver<Notification>,
    kv: Arc<InMemoryKeyValueStore>,
}

fn test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let (notifier, rx) = Notifier::channel(64);

    let state = AppState::new(
        Backends {
            identities: store.clone(),
            slots: store,
            kv: kv.clone(),
        },
        notifier,
        AuthConfig {
            secret: "integration-secret".to_string(),
            expiration: 3600,
        },
        BusinessRules::default(),
    );

    TestApp {
        router: app(state),
        rx,
        kv,
    }
}

impl TestApp {
    async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    /// Signs up and logs in; returns (id, token).
    async fn speaker(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .call(
                "POST",
                "/api/v1/speaker/signup",
                None,
                Some(json!({
                    "firstName": "Grace",
                    "lastName": "Hopper",
                    "email": email,
                    "password": PASSWORD,
                    "pricePerSession": "75.00"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);

        let (status, login) = self
            .call(
                "POST",
                "/api/v1/speaker/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", login);

        (
            body["id"].as_str().unwrap().to_string(),
            login["token"].as_str().unwrap().to_string(),
        )
    }

    async fn user(&self, email: &str) -> (String, String) {
        let (status, body) = self
            .call(
                "POST",
                "/api/v1/user/signup",
                None,
                Some(json!({
                    "firstName": "Ada",
                    "lastName": "Lovelace",
                    "email": email,
                    "password": PASSWORD
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);

        let (status, login) = self
            .call(
                "POST",
                "/api/v1/user/login",
                None,
                Some(json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", login);

        (
            body["id"].as_str().unwrap().to_string(),
            login["token"].as_str().unwrap().to_string(),
        )
    }
}

fn window(start_hour: u32, end_hour: u32) -> Value {
    json!({
        "sessionStartTime": format!("2030-01-10T{:02}:00:00Z", start_hour),
        "sessionEndTime": format!("2030-01-10T{:02}:00:00Z", end_hour),
    })
}

#[tokio::test]
async fn test_welcome_and_health() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "up");
    assert_eq!(body["cache"], "up");
}

#[tokio::test]
async fn test_speaker_booking_scenarios() {
    let app = test_app();
    let (_, token) = app.speaker("grace@example.com").await;

    // 09:00-10:00 succeeds
    let (status, slot) = app
        .call("POST", "/api/v1/bookings/create", Some(&token), Some(window(9, 10)))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", slot);
    let slot_id = slot["id"].as_str().unwrap().to_string();
    assert_eq!(slot_id.len(), 26);

    // Fetch returns identical times
    let (status, fetched) = app
        .call("GET", &format!("/api/v1/bookings/{}", slot_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["sessionStartTime"], "2030-01-10T09:00:00Z");
    assert_eq!(fetched["sessionEndTime"], "2030-01-10T10:00:00Z");

    // Two hours and before opening are rejected
    for (start, end) in [(9, 11), (8, 9)] {
        let (status, body) = app
            .call("POST", "/api/v1/bookings/create", Some(&token), Some(window(start, end)))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert!(body["error"].is_string());
    }

    // Same start again conflicts
    let (status, body) = app
        .call("POST", "/api/v1/speaker-booking/book", Some(&token), Some(window(9, 10)))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "slot already taken");
}

#[tokio::test]
async fn test_auth_failures() {
    let app = test_app();
    let (_, user_token) = app.user("ada@example.com").await;

    let (status, body) = app
        .call("POST", "/api/v1/bookings/create", None, Some(window(10, 11)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = app
        .call("POST", "/api/v1/bookings/create", Some("not-a-jwt"), Some(window(10, 11)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call("POST", "/api/v1/bookings/create", Some(&user_token), Some(window(10, 11)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .call("GET", "/api/v1/speaker-booking/bookings", Some(&user_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = test_app();
    app.user("ada@example.com").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/v1/user/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "Wr0ng!Pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn test_otp_verification_over_http() {
    let mut app = test_app();
    let (user_id, _) = app.user("ada@example.com").await;

    let (status, body) = app
        .call("POST", &format!("/api/v1/user/send-otp/{}", user_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["expiresInSeconds"], 600);

    let code = match app.rx.try_recv().unwrap() {
        Notification::VerificationRequested(event) => event.code.into_inner(),
        other => panic!("unexpected notification {:?}", other),
    };
    assert!(app.kv.contains(&format!("otp:{}", user_id)));

    let wrong = if code == "111111" { "222222" } else { "111111" };
    let verify_uri = format!("/api/v1/user/verify/{}", user_id);

    let (status, _) = app.call("POST", &verify_uri, None, Some(json!({ "otp": wrong }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.call("POST", &verify_uri, None, Some(json!({ "otp": code }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["isVerified"], true);

    let (status, body) = app.call("POST", &verify_uri, None, Some(json!({ "otp": code }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid OTP");
}

#[tokio::test]
async fn test_user_seat_and_role_scoped_cancel() {
    let app = test_app();
    let (_, speaker_token) = app.speaker("grace@example.com").await;
    let (_, user_token) = app.user("ada@example.com").await;

    let (_, slot) = app
        .call("POST", "/api/v1/speaker-booking/book", Some(&speaker_token), Some(window(13, 14)))
        .await;
    let slot_id = slot["id"].as_str().unwrap().to_string();

    let (status, seat) = app
        .call(
            "POST",
            "/api/v1/user-booking/book",
            Some(&user_token),
            Some(json!({ "bookingId": slot_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", seat);
    assert_eq!(seat["bookingId"], slot_id.as_str());

    let (_, mine) = app
        .call("GET", "/api/v1/user-booking/bookings", Some(&user_token), None)
        .await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    // A user cancelling only gives up the seat
    let (status, _) = app
        .call("POST", &format!("/api/v1/bookings/cancel/{}", slot_id), Some(&user_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call("GET", &format!("/api/v1/bookings/{}", slot_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);

    // Cancelling again finds nothing
    let (status, _) = app
        .call("POST", &format!("/api/v1/bookings/cancel/{}", slot_id), Some(&user_token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The speaker cancelling removes the slot
    let (status, _) = app
        .call("POST", &format!("/api/v1/bookings/cancel/{}", slot_id), Some(&speaker_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .call("GET", &format!("/api/v1/bookings/{}", slot_id), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_listing_cache_is_invalidated_on_create() {
    let app = test_app();
    let (_, token) = app.speaker("grace@example.com").await;

    let (_, empty) = app.call("GET", "/api/v1/bookings", None, None).await;
    assert_eq!(empty, json!([]));
    assert!(app.kv.contains("bookings:all"));

    app.call("POST", "/api/v1/bookings/create", Some(&token), Some(window(15, 16)))
        .await;
    assert!(!app.kv.contains("bookings:all"));

    let (_, listed) = app.call("GET", "/api/v1/bookings", None, None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_profiles_are_self_only() {
    let app = test_app();
    let (ada_id, ada_token) = app.user("ada@example.com").await;
    let (bob_id, _) = app.user("bob@example.com").await;

    let (status, me) = app
        .call("GET", &format!("/api/v1/user/user/{}", ada_id), Some(&ada_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(me.get("passwordHash").is_none());

    let (status, _) = app
        .call("GET", &format!("/api/v1/user/user/{}", bob_id), Some(&ada_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (speaker_id, speaker_token) = app.speaker("grace@example.com").await;
    let (other_id, _) = app.speaker("other@example.com").await;

    let (status, _) = app
        .call(
            "PUT",
            &format!("/api/v1/speaker/update/{}", other_id),
            Some(&speaker_token),
            Some(json!({ "pricePerSession": "10" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = app
        .call(
            "PUT",
            &format!("/api/v1/speaker/update/{}", speaker_id),
            Some(&speaker_token),
            Some(json!({ "pricePerSession": "99.99" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["pricePerSession"], "99.99");
}

#[tokio::test]
async fn test_speaker_with_slots_cannot_delete_account() {
    let app = test_app();
    let (speaker_id, token) = app.speaker("grace@example.com").await;

    let (_, slot) = app
        .call("POST", "/api/v1/bookings/create", Some(&token), Some(window(11, 12)))
        .await;
    let delete_uri = format!("/api/v1/speaker/delete/{}", speaker_id);

    let (status, _) = app.call("DELETE", &delete_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .call(
            "POST",
            "/api/v1/speaker-booking/delete",
            Some(&token),
            Some(json!({ "bookingId": slot["id"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call("DELETE", &delete_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call("GET", &format!("/api/v1/speaker/{}", speaker_id), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_payloads_are_bad_requests() {
    let app = test_app();

    let (status, body) = app
        .call("POST", "/api/v1/user/signup", None, Some(json!({ "email": "ada@example.com" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = app
        .call("GET", "/api/v1/bookings/not-a-ulid", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
