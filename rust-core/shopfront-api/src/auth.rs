// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Registration, login and logout.
//!
//! Passwords are stored as Argon2id PHC strings
//! (`$argon2id$v=19$m=...,t=...,p=...$<salt>$<hash>`) and never leave the
//! server.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{info, instrument, warn};

use shopfront_store::{Condition, Record};

use crate::fields::{non_empty, str_field, truthy, u64_field};
use crate::session::{self, DEFAULT_TTL, REMEMBER_ME_TTL};
use crate::{ApiError, AppState};

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_\x{4e00}-\x{9fa5}]+$").expect("username pattern"))
}

fn password_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9@$!%*?&]{6,20}$").expect("password pattern"))
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"))
}

/// Mainland mobile number: 11 digits starting with 13-19.
pub fn is_valid_phone(phone: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^1[3-9]\d{9}$").expect("phone pattern"))
        .is_match(phone)
}

/// Hash `password` with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::Internal(format!("Failed to hash password: {err}")))
}

/// Check `password` against a value produced by [`hash_password`].
///
/// Anything that is not a PHC string never matches.
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored).is_ok_and(|hash| {
        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok()
    })
}

/// Registration request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Login request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub remember_me: Option<Value>,
}

/// Availability check request
#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// Format checks for a registration, field by field.
fn validate_registration(request: &RegisterRequest) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    let mut fail = |field: &str, message: &str| {
        errors.insert(field.to_string(), message.to_string());
    };

    let username = non_empty(request.username.as_deref());
    let password = non_empty(request.password.as_deref());
    let confirm = non_empty(request.confirm_password.as_deref());
    let email = non_empty(request.email.as_deref());

    match username {
        None => fail("username", "Please enter a username"),
        Some(name) if !(3..=20).contains(&name.chars().count()) => {
            fail("username", "Username must be 3-20 characters long")
        }
        Some(name) if !username_pattern().is_match(name) => fail(
            "username",
            "Username may only contain letters, digits, underscores and CJK characters",
        ),
        Some(_) => {}
    }

    match password {
        None => fail("password", "Please enter a password"),
        Some(pw) if !(6..=20).contains(&pw.chars().count()) => {
            fail("password", "Password must be 6-20 characters long")
        }
        Some(pw)
            if !password_pattern().is_match(pw)
                || !pw.chars().any(|c| c.is_ascii_alphabetic())
                || !pw.chars().any(|c| c.is_ascii_digit()) =>
        {
            fail(
                "password",
                "Password must contain at least one letter and one digit",
            )
        }
        Some(_) => {}
    }

    match (password, confirm) {
        (_, None) => fail("confirmPassword", "Please confirm the password"),
        (Some(pw), Some(again)) if pw != again => {
            fail("confirmPassword", "The two passwords do not match")
        }
        _ => {}
    }

    match email {
        None => fail("email", "Please enter an email address"),
        Some(email) if !email_pattern().is_match(email) => {
            fail("email", "Please enter a valid email address")
        }
        Some(_) => {}
    }

    if let Some(phone) = non_empty(request.phone.as_deref()) {
        if !is_valid_phone(phone) {
            fail("phone", "Please enter a valid mobile number");
        }
    }

    errors
}

/// Register handler
#[instrument(skip(state, request))]
pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut errors = validate_registration(&request);
    let store = &state.store;

    let uniqueness = [
        ("username", request.username.as_deref(), "Username is already taken"),
        ("email", request.email.as_deref(), "Email is already registered"),
        ("phone", request.phone.as_deref(), "Phone number is already registered"),
    ];
    for (field, value, message) in uniqueness {
        let Some(value) = non_empty(value) else {
            continue;
        };
        if errors.contains_key(field) {
            continue;
        }
        if store
            .get("users", Some(&Condition::field(field, value)))
            .await
            .is_some()
        {
            errors.insert(field.to_string(), message.to_string());
        }
    }

    if !errors.is_empty() {
        return Err(ApiError::Validation {
            message: "Please fix the highlighted fields".to_string(),
            errors,
        });
    }

    // Validation guarantees these are present.
    let username = request.username.unwrap_or_default();
    let password = request.password.unwrap_or_default();
    let email = request.email.unwrap_or_default();

    let mut user = Record::new();
    user.insert("username".into(), json!(username.trim()));
    user.insert("password".into(), json!(hash_password(&password)?));
    user.insert("email".into(), json!(email.trim().to_lowercase()));
    user.insert(
        "phone".into(),
        non_empty(request.phone.as_deref()).map_or(Value::Null, |p| json!(p.trim())),
    );
    user.insert(
        "avatar".into(),
        json!(format!(
            "https://picsum.photos/100/100?random={}",
            chrono::Utc::now().timestamp_millis()
        )),
    );
    user.insert("address".into(), Value::Null);

    let created = store.insert("users", user).await;
    info!(user_id = ?created.get("id"), "User registered");

    Ok(Json(json!({
        "success": true,
        "message": "Registration successful, please log in",
        "user": public_user(&created),
    })))
}

/// Login handler
#[instrument(skip(state, request))]
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(username), Some(password)) = (
        non_empty(request.username.as_deref()),
        non_empty(request.password.as_deref()),
    ) else {
        return Err(ApiError::BadRequest(
            "Username and password are required".to_string(),
        ));
    };

    let user = state
        .store
        .get("users", Some(&Condition::field("username", username)))
        .await;
    let user = match user {
        Some(user)
            if str_field(&user, "password")
                .is_some_and(|stored| verify_password(password, stored)) =>
        {
            user
        }
        _ => {
            warn!("Failed login attempt");
            return Err(ApiError::Unauthorized(
                "Invalid username or password".to_string(),
            ));
        }
    };

    let user_id = u64_field(&user, "id")
        .ok_or_else(|| ApiError::Internal("Stored user has no id".to_string()))?;
    let ttl = if truthy(request.remember_me.as_ref()) {
        REMEMBER_ME_TTL
    } else {
        DEFAULT_TTL
    };
    let token = state.sessions.create(user_id, username, ttl);
    info!(user_id, "User logged in");

    Ok((
        [(header::SET_COOKIE, session::session_cookie(&token, ttl))],
        Json(json!({
            "success": true,
            "message": "Login successful",
            "redirectUrl": "/user/home",
            "user": public_user(&user),
        })),
    ))
}

/// Logout handler
#[instrument(skip(state, headers))]
pub async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = session::token_from_headers(&headers) {
        state.sessions.destroy(&token);
    }
    (
        [(header::SET_COOKIE, session::clear_cookie())],
        Json(json!({ "success": true, "message": "Logged out" })),
    )
}

/// Username availability handler
#[instrument(skip(state, request))]
pub async fn check_username_handler(
    State(state): State<AppState>,
    Json(request): Json<AvailabilityRequest>,
) -> Result<Json<Value>, ApiError> {
    let username = non_empty(request.username.as_deref())
        .ok_or_else(|| ApiError::BadRequest("Username is required".to_string()))?;
    let taken = state
        .store
        .get("users", Some(&Condition::field("username", username.trim())))
        .await
        .is_some();
    Ok(Json(availability(taken, "Username is already taken", "Username is available")))
}

/// Email availability handler
#[instrument(skip(state, request))]
pub async fn check_email_handler(
    State(state): State<AppState>,
    Json(request): Json<AvailabilityRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = non_empty(request.email.as_deref())
        .ok_or_else(|| ApiError::BadRequest("Email is required".to_string()))?;
    let taken = state
        .store
        .get(
            "users",
            Some(&Condition::field("email", email.trim().to_lowercase())),
        )
        .await
        .is_some();
    Ok(Json(availability(taken, "Email is already registered", "Email is available")))
}

fn availability(taken: bool, taken_message: &str, free_message: &str) -> Value {
    let message = if taken { taken_message } else { free_message };
    json!({
        "success": !taken,
        "available": !taken,
        "message": message,
    })
}

fn public_user(user: &Record) -> Value {
    json!({
        "id": user.get("id"),
        "username": user.get("username"),
        "email": user.get("email"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, password: &str, confirm: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: Some(username.into()),
            password: Some(password.into()),
            confirm_password: Some(confirm.into()),
            email: Some(email.into()),
            phone: None,
        }
    }

    #[test]
    fn test_password_round_trip() {
        let stored = hash_password("abc123").unwrap();
        assert!(stored.starts_with("$argon2id$"));
        assert!(verify_password("abc123", &stored));
        assert!(!verify_password("abc124", &stored));
        assert!(!verify_password("abc123", "plaintext"));
        assert!(!verify_password("abc123", "sha256$salt$00ff"));
        // Salted: the same password hashes differently each time.
        assert_ne!(hash_password("abc123").unwrap(), stored);
    }

    #[test]
    fn test_valid_registration_has_no_errors() {
        let errors = validate_registration(&request("shopper_1", "abc123", "abc123", "a@b.co"));
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_registration_field_errors() {
        let errors = validate_registration(&request("ab", "abcdef", "abcdeg", "nope"));
        assert!(errors.contains_key("username"));
        assert!(errors.contains_key("password"));
        assert!(errors.contains_key("confirmPassword"));
        assert!(errors.contains_key("email"));

        let missing = validate_registration(&RegisterRequest::default());
        assert_eq!(missing.len(), 4);
    }

    #[test]
    fn test_cjk_username_and_phone() {
        let mut ok = request("购物者", "pass1234", "pass1234", "x@y.cn");
        ok.phone = Some("13800138000".into());
        assert!(validate_registration(&ok).is_empty());

        assert!(!is_valid_phone("12800138000"));
        assert!(!is_valid_phone("1380013800"));
    }
}
