//! HTTP tests: the real router on an ephemeral port, called with reqwest.

mod common;

use chrono::Duration;
use common::{relying_party, test_pool, SoftAuthenticator};
use passkey_auth_server::db::users;
use passkey_auth_server::identity::local::LocalIdentityProvider;
use passkey_auth_server::identity::IdentityProvider;
use passkey_auth_server::state::AppState;
use reqwest::StatusCode;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;

const EMAIL: &str = "fan@example.com";

struct TestServer {
    base: String,
    pool: SqlitePool,
    identity: Arc<LocalIdentityProvider>,
    client: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Log `email` in through the identity provider and return a bearer token.
    async fn bearer_for(&self, email: &str) -> String {
        let token = self.identity.issue_sign_in_token(email).await.unwrap();
        self.identity.redeem_sign_in_token(&token).await.unwrap().access_token
    }
}

async fn spawn_test_server() -> TestServer {
    let pool = test_pool().await;
    let identity = Arc::new(LocalIdentityProvider::new(pool.clone(), Duration::hours(1)));
    let state = AppState::from_parts(pool.clone(), relying_party(), identity.clone(), 24);

    let app = passkey_auth_server::build_app(state).await.expect("Failed to build app");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        pool,
        identity,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn test_health() {
    let server = spawn_test_server().await;

    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_protected_routes_require_auth() {
    let server = spawn_test_server().await;

    let res = server
        .client
        .get(server.url("/api/auth/passkey/list"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Not authenticated");

    let res = server
        .client
        .post(server.url("/api/auth/passkey/register-options"))
        .bearer_auth("not-a-real-token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = server
        .client
        .delete(server.url("/api/auth/passkey/some-id"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_fields_are_bad_requests() {
    let server = spawn_test_server().await;
    users::create_user(&server.pool, EMAIL).await.unwrap();
    let token = server.bearer_for(EMAIL).await;

    let res = server
        .client
        .post(server.url("/api/auth/passkey/authenticate-options"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .client
        .post(server.url("/api/auth/passkey/authenticate-verify"))
        .json(&json!({ "email": EMAIL }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .client
        .post(server.url("/api/auth/passkey/register-verify"))
        .bearer_auth(&token)
        .json(&json!({ "credentialName": "Phone" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .client
        .post(server.url("/api/auth/passkey/authenticate-options"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_user_and_no_passkeys_look_the_same() {
    let server = spawn_test_server().await;
    users::create_user(&server.pool, EMAIL).await.unwrap();

    let unknown = server
        .client
        .post(server.url("/api/auth/passkey/authenticate-options"))
        .json(&json!({ "email": "nobody@example.com" }))
        .send()
        .await
        .unwrap();
    let no_passkeys = server
        .client
        .post(server.url("/api/auth/passkey/authenticate-options"))
        .json(&json!({ "email": EMAIL }))
        .send()
        .await
        .unwrap();

    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    assert_eq!(no_passkeys.status(), StatusCode::NOT_FOUND);
    let unknown: Value = unknown.json().await.unwrap();
    let no_passkeys: Value = no_passkeys.json().await.unwrap();
    assert_eq!(unknown, no_passkeys);
}

#[tokio::test]
async fn test_full_flow_over_http() {
    let server = spawn_test_server().await;
    users::create_user(&server.pool, EMAIL).await.unwrap();
    let token = server.bearer_for(EMAIL).await;
    let mut authenticator = SoftAuthenticator::new();

    // Register
    let options: Value = server
        .client
        .post(server.url("/api/auth/passkey/register-options"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let challenge = options["challenge"].as_str().unwrap();
    let user_handle = options["user"]["id"].as_str().unwrap().to_string();

    let res = server
        .client
        .post(server.url("/api/auth/passkey/register-verify"))
        .bearer_auth(&token)
        .json(&json!({
            "response": authenticator.registration_json(challenge),
            "credentialName": "Phone"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["verified"], true);

    // Log in with the passkey
    let options: Value = server
        .client
        .post(server.url("/api/auth/passkey/authenticate-options"))
        .json(&json!({ "email": EMAIL }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let challenge = options["challenge"].as_str().unwrap();
    assert_eq!(options["allowCredentials"][0]["id"], authenticator.credential_id_b64());

    let res = server
        .client
        .post(server.url("/api/auth/passkey/authenticate-verify"))
        .json(&json!({
            "email": EMAIL,
            "response": authenticator.assertion_json(challenge, Some(&user_handle))
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("set-cookie").is_some());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["verified"], true);
    let session_token = body["session"]["access_token"].as_str().unwrap().to_string();

    // Manage with the freshly minted session
    let list: Value = server
        .client
        .get(server.url("/api/auth/passkey/list"))
        .bearer_auth(&session_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let passkeys = list["passkeys"].as_array().unwrap();
    assert_eq!(passkeys.len(), 1);
    assert_eq!(passkeys[0]["credentialName"], "Phone");
    assert!(passkeys[0].get("publicKey").is_none());
    let id = passkeys[0]["id"].as_str().unwrap().to_string();

    let res = server
        .client
        .patch(server.url(&format!("/api/auth/passkey/{}/rename", id)))
        .bearer_auth(&session_token)
        .json(&json!({ "name": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .client
        .patch(server.url(&format!("/api/auth/passkey/{}/rename", id)))
        .bearer_auth(&session_token)
        .json(&json!({ "name": "Work phone" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["passkey"]["credentialName"], "Work phone");

    let me: Value = server
        .client
        .get(server.url("/api/users/me"))
        .bearer_auth(&session_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["email"], EMAIL);
    assert_eq!(me["hasPasskeyHandle"], true);
    assert!(me["lastLogin"].is_string());

    let res = server
        .client
        .delete(server.url(&format!("/api/auth/passkey/{}", id)))
        .bearer_auth(&session_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .client
        .delete(server.url(&format!("/api/auth/passkey/{}", id)))
        .bearer_auth(&session_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Logging out revokes the bearer token
    let res = server
        .client
        .post(server.url("/api/auth/logout"))
        .bearer_auth(&session_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .client
        .get(server.url("/api/auth/passkey/list"))
        .bearer_auth(&session_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
