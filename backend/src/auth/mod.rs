use std::time::{SystemTime, UNIX_EPOCH};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use cookie::{Cookie, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const SESSION_COOKIE: &str = "ac_session";

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::PasswordHash(e.to_string()))
}

/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
}

/// Signs and reads the session cookie, which carries nothing but a user id.
#[derive(Clone)]
pub struct SessionKeys {
    secret: String,
    ttl_hours: i64,
    secure: bool,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_hours: i64, secure: bool) -> Self {
        Self {
            secret: secret.to_string(),
            ttl_hours: ttl_hours.max(1),
            secure,
        }
    }

    pub fn create_token(&self, user_id: i32) -> Result<String, AppError> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + self.ttl_hours as u64 * 60 * 60) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    /// `None` for a forged, expired, or otherwise unreadable token.
    pub fn validate_token(&self, token: &str) -> Option<i32> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| log::debug!("Rejected session token: {}", e))
        .ok()?;
        token_data.claims.sub.parse().ok()
    }

    /// `Set-Cookie` value that starts a session for `user_id`.
    pub fn session_cookie(&self, user_id: i32) -> Result<String, AppError> {
        let token = self.create_token(user_id)?;
        let cookie = Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(cookie::time::Duration::hours(self.ttl_hours))
            .build();
        Ok(cookie.to_string())
    }

    /// `Set-Cookie` value that ends the session.
    pub fn removal_cookie(&self) -> String {
        let mut cookie = Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        cookie.make_removal();
        cookie.to_string()
    }

    /// User id from the request's session cookie, if it carries a valid one.
    pub fn user_id(&self, headers: &HeaderMap) -> Option<i32> {
        let token = session_token(headers)?;
        self.validate_token(&token)
    }
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.value().to_string())
}
