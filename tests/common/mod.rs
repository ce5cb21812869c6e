#![allow(dead_code)]

use jsonwebtoken::{encode, EncodingKey, Header};
use recipe_client::auth::MemoryStorage;
use recipe_client::config::ClientOptions;
use recipe_client::RecipeClient;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

pub fn user_json(level: u32, xp: u64) -> Value {
    json!({
        "id": "7f1c2a9e-0000-4000-8000-000000000001",
        "username": "chef_anna",
        "email": "anna@example.com",
        "xp": xp,
        "level": level,
        "badges": ["first_recipe"],
        "followers_count": 3,
        "following_count": 5
    })
}

pub fn auth_json(access: &str, refresh: &str) -> Value {
    json!({
        "message": "Login successful",
        "user": user_json(1, 100),
        "tokens": { "access": access, "refresh": refresh }
    })
}

/// HS256 token whose `exp` lies `offset_secs` from now
pub fn jwt(offset_secs: i64) -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64;
    encode(
        &Header::default(),
        &json!({ "user_id": "1", "exp": now + offset_secs }),
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}

pub fn options(server: &MockServer) -> ClientOptions {
    ClientOptions::new(&format!("{}/api", server.uri())).with_default_retry(0)
}

pub fn client(server: &MockServer, storage: &MemoryStorage) -> RecipeClient {
    RecipeClient::with_storage(options(server), Arc::new(storage.clone())).unwrap()
}

pub async fn mount_login(server: &MockServer, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_json(access, refresh)))
        .mount(server)
        .await;
}
