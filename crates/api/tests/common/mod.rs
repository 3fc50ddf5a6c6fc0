//! Common test utilities for integration tests.
//!
//! Routers are wired to an in-memory record store and a mailbox that keeps
//! every sent message, so the suites run without a database.

// Not every suite uses every helper.
#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderValue, Method, Request},
    Router,
};
use chrono::Utc;
use domain::models::PortalUser;
use domain::services::MockEmailSender;
use domain::stores::{InMemoryStore, PortalUserStore};
use ezbiz_api::{app::create_app_in_memory, config::Config};
use fake::{faker::internet::en::SafeEmail, Fake};
use shared::password::hash_password;
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

pub const TEST_ADMIN_KEY: &str = "test-admin-key";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub mailbox: Arc<MockEmailSender>,
}

impl TestApp {
    /// Creates a portal user with an unverified email.
    pub async fn create_user(&self) -> PortalUser {
        let email: String = SafeEmail().fake();
        self.store
            .create(&email.to_lowercase(), None, Utc::now())
            .await
            .expect("Failed to create portal user")
    }

    /// Creates a portal user that can log in with `password`.
    pub async fn create_user_with_password(&self, password: &str) -> PortalUser {
        let email: String = SafeEmail().fake();
        let hash = hash_password(password).expect("hash password");
        self.store
            .create(&email.to_lowercase(), Some(&hash), Utc::now())
            .await
            .expect("Failed to create portal user")
    }

    pub async fn user(&self, id: i64) -> PortalUser {
        self.store
            .find_by_id(id)
            .await
            .expect("store available")
            .expect("user exists")
    }
}

/// Test configuration with the per-IP throttle disabled.
pub fn test_config() -> Config {
    Config::load_for_test(&[
        ("security.rate_limit_per_minute", "0"),
        ("security.admin_api_key", TEST_ADMIN_KEY),
    ])
    .expect("Failed to load test config")
}

pub fn test_app() -> TestApp {
    test_app_with_config(test_config())
}

pub fn test_app_with_config(config: Config) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let mailbox = Arc::new(MockEmailSender::new());
    let router = create_app_in_memory(config, store.clone(), mailbox.clone());
    TestApp {
        router,
        store,
        mailbox,
    }
}

/// JSON request arriving on a socket from the given peer IP.
pub fn json_request(method: Method, uri: &str, body: Value, peer_ip: &str) -> Request<Body> {
    let peer: IpAddr = peer_ip.parse().expect("valid peer IP");
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "integration-test")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::new(peer, 40000)));
    request
}

/// Same as [`json_request`] with an `X-Forwarded-For` header set.
pub fn forwarded_request(
    method: Method,
    uri: &str,
    body: Value,
    peer_ip: &str,
    forwarded_for: &str,
) -> Request<Body> {
    let mut request = json_request(method, uri, body, peer_ip);
    request.headers_mut().insert(
        "x-forwarded-for",
        HeaderValue::from_str(forwarded_for).expect("valid header value"),
    );
    request
}

/// Same as [`json_request`] carrying the test admin key.
pub fn admin_request(method: Method, uri: &str, body: Value, peer_ip: &str) -> Request<Body> {
    let mut request = json_request(method, uri, body, peer_ip);
    request
        .headers_mut()
        .insert("x-admin-key", HeaderValue::from_static(TEST_ADMIN_KEY));
    request
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn parse_response_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

/// Pulls the token out of a link in an email body.
pub fn token_from(body: &str, marker: &str) -> String {
    let start = body.find(marker).expect("link marker in email body") + marker.len();
    body[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}
