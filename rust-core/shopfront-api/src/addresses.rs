// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Delivery addresses. Each user has at most one default address.

use std::cmp::Ordering;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use shopfront_store::{now_timestamp, Condition, Record};

use crate::auth::is_valid_phone;
use crate::fields::{non_empty, path_id, str_field, truthy, u64_field};
use crate::session::CurrentUser;
use crate::{ApiError, AppState};

/// Address create/update request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    pub receiver_name: Option<String>,
    pub receiver_phone: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub detail_address: Option<String>,
    pub is_default: Option<Value>,
}

impl AddressRequest {
    /// The address fields as stored, or 400 when any required field is
    /// missing or empty.
    fn to_record(&self) -> Result<Record, ApiError> {
        let required = [
            ("receiver_name", &self.receiver_name),
            ("receiver_phone", &self.receiver_phone),
            ("province", &self.province),
            ("city", &self.city),
            ("district", &self.district),
            ("detail_address", &self.detail_address),
        ];

        let mut record = Record::new();
        for (key, value) in required {
            let value = non_empty(value.as_deref())
                .ok_or_else(|| ApiError::BadRequest("Please fill in the full address".to_string()))?;
            record.insert(key.to_string(), json!(value));
        }
        record.insert("is_default".into(), json!(self.wants_default()));
        Ok(record)
    }

    fn wants_default(&self) -> bool {
        truthy(self.is_default.as_ref())
    }
}

fn is_default(address: &Record) -> bool {
    truthy(address.get("is_default"))
}

/// Default address first, then newest first.
fn address_order(a: &Record, b: &Record) -> Ordering {
    is_default(b)
        .cmp(&is_default(a))
        .then_with(|| str_field(b, "created_at").cmp(&str_field(a, "created_at")))
}

/// Clear the default flag on every address of `user_id` except `keep`.
async fn clear_defaults(state: &AppState, user_id: u64, keep: Option<u64>) {
    let addresses = state
        .store
        .all("addresses", Some(&Condition::field("user_id", user_id)))
        .await;
    for address in addresses.iter().filter(|a| is_default(a)) {
        let Some(id) = u64_field(address, "id") else {
            continue;
        };
        if Some(id) == keep {
            continue;
        }
        let mut patch = Record::new();
        patch.insert("is_default".into(), json!(false));
        state.store.update("addresses", id, patch).await;
        debug!(user_id, address_id = id, "Cleared default address");
    }
}

fn owner_condition(address_id: u64, user_id: u64) -> Condition {
    Condition::fields([("id", address_id), ("user_id", user_id)])
}

async fn owned_address(state: &AppState, address_id: u64, user_id: u64) -> Result<Record, ApiError> {
    state
        .store
        .get("addresses", Some(&owner_condition(address_id, user_id)))
        .await
        .ok_or_else(|| ApiError::NotFound("Address not found".to_string()))
}

/// Address list handler
#[instrument(skip(state))]
pub async fn list_addresses_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Json<Value> {
    let mut addresses = state
        .store
        .all("addresses", Some(&Condition::field("user_id", session.user_id)))
        .await;
    addresses.sort_by(address_order);
    Json(json!({ "success": true, "data": addresses }))
}

/// Address creation handler
#[instrument(skip(state, request))]
pub async fn create_address_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<AddressRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut record = request.to_record()?;
    if !request.receiver_phone.as_deref().is_some_and(is_valid_phone) {
        return Err(ApiError::BadRequest(
            "Please enter a valid phone number".to_string(),
        ));
    }

    if request.wants_default() {
        clear_defaults(&state, session.user_id, None).await;
    }

    record.insert("user_id".into(), json!(session.user_id));
    let address = state.store.insert("addresses", record).await;

    Ok(Json(json!({
        "success": true,
        "message": "Address added",
        "data": address,
    })))
}

/// Address update handler
#[instrument(skip(state, request))]
pub async fn update_address_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
    Json(request): Json<AddressRequest>,
) -> Result<Json<Value>, ApiError> {
    let address_id = path_id(&id, "Address")?;
    owned_address(&state, address_id, session.user_id).await?;
    let mut patch = request.to_record()?;

    if request.wants_default() {
        clear_defaults(&state, session.user_id, Some(address_id)).await;
    }

    patch.insert("updated_at".into(), json!(now_timestamp()));
    let address = state.store.update("addresses", address_id, patch).await;

    Ok(Json(json!({
        "success": true,
        "message": "Address updated",
        "data": address,
    })))
}

/// Address removal handler
#[instrument(skip(state))]
pub async fn delete_address_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let address_id = path_id(&id, "Address")?;
    owned_address(&state, address_id, session.user_id).await?;

    if !state
        .store
        .delete("addresses", &owner_condition(address_id, session.user_id))
        .await
    {
        return Err(ApiError::Internal("Failed to delete address".to_string()));
    }

    Ok(Json(json!({ "success": true, "message": "Address deleted" })))
}

/// Default address handler
#[instrument(skip(state))]
pub async fn set_default_address_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let address_id = path_id(&id, "Address")?;
    owned_address(&state, address_id, session.user_id).await?;

    clear_defaults(&state, session.user_id, None).await;

    let mut patch = Record::new();
    patch.insert("is_default".into(), json!(true));
    patch.insert("updated_at".into(), json!(now_timestamp()));
    let address = state.store.update("addresses", address_id, patch).await;

    Ok(Json(json!({
        "success": true,
        "message": "Default address set",
        "data": address,
    })))
}
