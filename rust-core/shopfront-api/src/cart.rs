// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Shopping cart.
//!
//! Logged-in carts are stored as `cart_items` rows (`user_id`, `product_id`,
//! `quantity`). Anonymous shoppers keep their cart client-side, so adding
//! to the cart succeeds for them without touching the store.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use shopfront_store::{Condition, Record};

use crate::display::{cart_specifications, DEFAULT_PRODUCT_IMAGE};
use crate::fields::{f64_field, field_or_null, loose_u64, path_id, str_field, u64_field};
use crate::session::{CurrentUser, MaybeUser};
use crate::{ApiError, AppState};

/// Add-to-cart request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: Option<Value>,
    pub quantity: Option<Value>,
}

/// Quantity change request
#[derive(Debug, Default, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: Option<Value>,
}

/// Whether `quantity` more units can be taken. Products without a stock
/// figure are not limited.
pub fn in_stock(product: &Record, quantity: u64) -> bool {
    u64_field(product, "stock").map_or(true, |stock| stock >= quantity)
}

/// Cart contents handler
#[instrument(skip(state))]
pub async fn list_cart_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Json<Value> {
    let lines = state
        .store
        .all("cart_items", Some(&Condition::field("user_id", session.user_id)))
        .await;

    let mut items = Vec::with_capacity(lines.len());
    let mut total = 0.0;
    for line in &lines {
        let Some(product_id) = u64_field(line, "product_id") else {
            continue;
        };
        let Some(product) = state
            .store
            .get("products", Some(&Condition::by_id(product_id)))
            .await
        else {
            // Products removed from the catalog drop out of the cart view.
            continue;
        };

        let quantity = u64_field(line, "quantity").unwrap_or(0);
        let price = f64_field(&product, "price").unwrap_or(0.0);
        let subtotal = price * quantity as f64;
        total += subtotal;

        items.push(json!({
            "id": field_or_null(line, "id"),
            "productId": product_id,
            "name": field_or_null(&product, "name"),
            "price": price,
            "quantity": quantity,
            "imageUrl": str_field(&product, "image_url")
                .filter(|url| !url.is_empty())
                .unwrap_or(DEFAULT_PRODUCT_IMAGE),
            "subtotal": subtotal,
            "specifications": cart_specifications(&product),
        }));
    }

    Json(json!({ "success": true, "data": items, "total": total }))
}

/// Login status handler
#[instrument(skip(session))]
pub async fn cart_status_handler(MaybeUser(session): MaybeUser) -> Json<Value> {
    Json(json!({
        "success": true,
        "isLoggedIn": session.is_some(),
        "userId": session.as_ref().map(|s| s.user_id),
        "username": session.as_ref().map(|s| s.username.clone()),
    }))
}

/// Add-to-cart handler
#[instrument(skip(state, session, request))]
pub async fn add_to_cart_handler(
    State(state): State<AppState>,
    MaybeUser(session): MaybeUser,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<Value>, ApiError> {
    let product_id = request
        .product_id
        .as_ref()
        .and_then(loose_u64)
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::BadRequest("Product id is required".to_string()))?;
    let quantity = match request.quantity.as_ref() {
        None | Some(Value::Null) => 1,
        Some(raw) => loose_u64(raw)
            .filter(|q| *q > 0)
            .ok_or_else(|| ApiError::BadRequest("Quantity must be at least 1".to_string()))?,
    };

    let store = &state.store;
    let product = store
        .get("products", Some(&Condition::by_id(product_id)))
        .await
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
    if !in_stock(&product, quantity) {
        return Err(ApiError::Conflict("Insufficient stock".to_string()));
    }

    if let Some(session) = &session {
        let mine = Condition::fields([
            ("user_id", session.user_id),
            ("product_id", product_id),
        ]);
        match store.get("cart_items", Some(&mine)).await {
            Some(line) => {
                let combined = u64_field(&line, "quantity")
                    .unwrap_or(0)
                    .checked_add(quantity)
                    .ok_or_else(|| ApiError::BadRequest("Quantity is too large".to_string()))?;
                if !in_stock(&product, combined) {
                    return Err(ApiError::Conflict("Exceeds available stock".to_string()));
                }
                if let Some(line_id) = u64_field(&line, "id") {
                    let mut patch = Record::new();
                    patch.insert("quantity".into(), json!(combined));
                    store.update("cart_items", line_id, patch).await;
                }
            }
            None => {
                let mut line = Record::new();
                line.insert("user_id".into(), json!(session.user_id));
                line.insert("product_id".into(), json!(product_id));
                line.insert("quantity".into(), json!(quantity));
                store.insert("cart_items", line).await;
            }
        }
        info!(user_id = session.user_id, product_id, quantity, "Added to cart");
    }

    Ok(Json(json!({
        "success": true,
        "message": "Added to cart",
        "product": {
            "id": field_or_null(&product, "id"),
            "name": field_or_null(&product, "name"),
            "price": field_or_null(&product, "price"),
        },
        "isLoggedIn": session.is_some(),
    })))
}

/// Cart item count handler
#[instrument(skip(state))]
pub async fn cart_count_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Json<Value> {
    let count: u64 = state
        .store
        .all("cart_items", Some(&Condition::field("user_id", session.user_id)))
        .await
        .iter()
        .filter_map(|line| u64_field(line, "quantity"))
        .fold(0, u64::saturating_add);
    Json(json!({ "success": true, "count": count }))
}

/// Cart quantity update handler
#[instrument(skip(state, request))]
pub async fn update_cart_item_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(item_id): Path<String>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Json<Value>, ApiError> {
    let quantity = request
        .quantity
        .as_ref()
        .and_then(loose_u64)
        .filter(|q| *q >= 1)
        .ok_or_else(|| ApiError::BadRequest("Quantity must be at least 1".to_string()))?;
    let item_id = path_id(&item_id, "Cart item")?;

    let store = &state.store;
    let line = owned_line(&state, item_id, session.user_id).await?;
    let product = match u64_field(&line, "product_id") {
        Some(product_id) => store.get("products", Some(&Condition::by_id(product_id))).await,
        None => None,
    }
    .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
    if !in_stock(&product, quantity) {
        return Err(ApiError::Conflict("Insufficient stock".to_string()));
    }

    let mut patch = Record::new();
    patch.insert("quantity".into(), json!(quantity));
    store.update("cart_items", item_id, patch).await;

    Ok(Json(json!({ "success": true, "message": "Quantity updated" })))
}

/// Cart line removal handler
#[instrument(skip(state))]
pub async fn remove_cart_item_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(item_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let item_id = path_id(&item_id, "Cart item")?;
    owned_line(&state, item_id, session.user_id).await?;

    if !state
        .store
        .delete("cart_items", &Condition::by_id(item_id))
        .await
    {
        return Err(ApiError::Internal("Failed to remove cart item".to_string()));
    }

    Ok(Json(json!({ "success": true, "message": "Removed from cart" })))
}

async fn owned_line(state: &AppState, item_id: u64, user_id: u64) -> Result<Record, ApiError> {
    state
        .store
        .get(
            "cart_items",
            Some(&Condition::fields([("id", item_id), ("user_id", user_id)])),
        )
        .await
        .ok_or_else(|| ApiError::NotFound("Cart item not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::into_record;

    #[test]
    fn test_stock_limits_only_when_present() {
        let limited = into_record(json!({"stock": 2}));
        assert!(in_stock(&limited, 2));
        assert!(!in_stock(&limited, 3));

        let unlimited = into_record(json!({"name": "Gift card"}));
        assert!(in_stock(&unlimited, 1000));
    }
}
