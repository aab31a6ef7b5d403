//! Shared fixtures for handler and dispatcher tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;

use crate::auth::{JwtManager, Role};
use crate::config::MailSettings;
use crate::mail::testing::RecordingMailer;
use crate::mail::MailDispatcher;
use crate::state::AppState;
use flashmart_core::{Category, Customer, FixedClock, Money, Product, ShippingAddress};
use flashmart_db::{Database, DbConfig};

pub const TEST_SECRET: &str = "test-secret-at-least-16";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub async fn seed_product(db: &Database, name: &str, price: i64, stock: i64) -> Product {
    let product = Product::new(name, Category::Food, Money::from_cents(price), stock, now())
        .with_description(format!("{} description", name));
    db.products().insert(&product).await.unwrap()
}

pub fn address() -> ShippingAddress {
    ShippingAddress {
        name: "Asha Rao".into(),
        phone: "9800000000".into(),
        street: "12 MG Road".into(),
        city: "Bengaluru".into(),
        state: "KA".into(),
        pincode: "560001".into(),
    }
}

pub fn address_json() -> Value {
    serde_json::to_value(address()).unwrap()
}

/// The full router over an in-memory database and a pinned clock.
pub struct TestApp {
    pub router: Router,
    pub db: Database,
    pub clock: Arc<FixedClock>,
    pub jwt: Arc<JwtManager>,
    pub mailer: Arc<RecordingMailer>,
    pub dispatcher: MailDispatcher,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_db(test_db().await)
    }

    pub fn with_db(db: Database) -> Self {
        let clock = Arc::new(FixedClock::new(now()));
        let mailer = Arc::new(RecordingMailer::default());
        let (dispatcher, handle) = MailDispatcher::new(
            db.clone(),
            clock.clone(),
            mailer.clone(),
            MailSettings::default(),
        );

        let state = AppState::new(
            db.clone(),
            clock.clone(),
            JwtManager::new(TEST_SECRET, None, 3600),
            handle,
        );
        let jwt = state.jwt.clone();

        TestApp {
            router: crate::build_router(state, &[]),
            db,
            clock,
            jwt,
            mailer,
            dispatcher,
        }
    }

    pub fn token(&self, user_id: &str, role: Role) -> String {
        let customer = Customer::new(
            user_id,
            format!("{}@example.com", user_id),
            format!("Shopper {}", user_id),
        );
        self.jwt.issue(&customer, role).unwrap()
    }

    /// Sends one request and returns the status with the parsed body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }
}
