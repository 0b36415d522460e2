// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Cookie sessions for logged-in shoppers.
//!
//! A session is an opaque token in the `sid` cookie mapped to the user it
//! belongs to. Sessions live in memory only; restarting the server logs
//! everyone out.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{ApiError, AppState};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "sid";

/// Lifetime of a normal login.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Lifetime of a login with "remember me" ticked.
pub const REMEMBER_ME_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A logged-in user.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: u64,
    pub username: String,
    expires_at: Instant,
}

impl Session {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-memory session registry.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    /// Map from token → session.
    sessions: Arc<Mutex<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session and return its token. Expired sessions are pruned.
    pub fn create(&self, user_id: u64, username: &str, ttl: Duration) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let now = Instant::now();
        let mut sessions = self.sessions.lock().expect("session registry lock");
        sessions.retain(|_, session| !session.is_expired(now));
        sessions.insert(
            token.clone(),
            Session {
                user_id,
                username: username.to_string(),
                expires_at: now + ttl,
            },
        );
        debug!(user_id, active = sessions.len(), "Session created");
        token
    }

    /// The live session for `token`, if any.
    pub fn get(&self, token: &str) -> Option<Session> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().expect("session registry lock");
        match sessions.get(token) {
            Some(session) if session.is_expired(now) => {
                sessions.remove(token);
                None
            }
            other => other.cloned(),
        }
    }

    /// End the session for `token`. Returns whether one existed.
    pub fn destroy(&self, token: &str) -> bool {
        let mut sessions = self.sessions.lock().expect("session registry lock");
        sessions.remove(token).is_some()
    }

    /// Number of stored sessions, including ones not yet pruned.
    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session registry lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `Set-Cookie` value for a new session.
pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.as_secs()
    )
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// The session token carried in the request's `Cookie` headers.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Extractor for endpoints that require a login. Rejects with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        token_from_headers(&parts.headers)
            .and_then(|token| state.sessions.get(&token))
            .map(CurrentUser)
            .ok_or_else(|| ApiError::Unauthorized("Please log in first".to_string()))
    }
}

/// Extractor for endpoints that behave differently when logged in.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Session>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            token_from_headers(&parts.headers).and_then(|token| state.sessions.get(&token)),
        ))
    }
}
