#![allow(dead_code)]

use jsonwebtoken::{EncodingKey, Header, encode};
use link_estudiantil::{
    AppState, InMemoryRepository,
    auth::Claims,
    config::{AppConfig, Env},
};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Mints a Supabase-style HS256 token. `exp_offset` may be negative for expired tokens.
pub fn create_token(user_id: Uuid, email: &str, exp_offset: i64) -> String {
    let now = now_secs() as i64;
    let claims = Claims {
        sub: user_id,
        email: Some(email.to_string()),
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };

    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

pub fn test_config(env: Env) -> AppConfig {
    let mut config = AppConfig::default();
    config.env = env;
    config.jwt_secret = TEST_JWT_SECRET.to_string();
    config
}

pub fn app_state(env: Env, repo: InMemoryRepository) -> AppState {
    AppState::new(Arc::new(repo), test_config(env))
}
