// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Checkout and order history.
//!
//! An order is one `orders` row plus one `order_items` row per product.
//! Line prices are captured at checkout; product names and images are
//! read live, so lines of products that have since been removed are
//! hidden from the history and shown as delisted in the detail view.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Duration, Local, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use shopfront_store::{iso_timestamp, Condition, Record};

use crate::cart::in_stock;
use crate::display::{order_specifications, status_name, DEFAULT_PRODUCT_IMAGE};
use crate::fields::{f64_field, field_or_null, loose_f64, loose_u64, path_id, str_field, truthy, u64_field};
use crate::session::CurrentUser;
use crate::{ApiError, AppState};

/// Status of a freshly placed order.
pub const PENDING_PAYMENT: &str = "pending_payment";

/// How long an unpaid order stays payable.
const PAYMENT_WINDOW_MINUTES: i64 = 30;

/// Largest accepted difference between the client total and the recomputed one.
const TOTAL_TOLERANCE: f64 = 0.01;

/// Name shown for lines whose product is no longer listed.
const DELISTED_NAME: &str = "delisted";

/// Order list query
#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
}

/// Checkout line
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: Option<Value>,
    pub quantity: Option<Value>,
}

/// Checkout request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderLineRequest>,
    pub address_id: Option<Value>,
    pub payment_method: Option<Value>,
    pub total_amount: Option<Value>,
    pub source: Option<String>,
}

/// A validated checkout line priced from the catalog.
#[derive(Debug, Clone, PartialEq)]
struct PricedLine {
    product_id: u64,
    price: f64,
    quantity: u64,
}

/// `YYYYMMDDHHMMSS` in local time followed by three random digits.
pub fn generate_order_number() -> String {
    let suffix = uuid::Uuid::new_v4().as_u128() % 1000;
    format!("{}{:03}", Local::now().format("%Y%m%d%H%M%S"), suffix)
}

/// Whether the client-supplied total agrees with the recomputed one.
/// A missing or unreadable total never agrees.
fn total_matches(claimed: Option<&Value>, computed: f64) -> bool {
    claimed
        .and_then(loose_f64)
        .is_some_and(|claimed| (claimed - computed).abs() <= TOTAL_TOLERANCE)
}

fn expire_time(order: &Record) -> Value {
    match order.get("expire_at") {
        Some(expire_at) if str_field(order, "status") == Some(PENDING_PAYMENT) => expire_at.clone(),
        _ => Value::Null,
    }
}

/// One line of an order view. `product` is `None` when it has been removed.
fn order_line(item: &Record, product: Option<&Record>) -> Value {
    let product_id = u64_field(item, "product_id").unwrap_or(0);
    let price = f64_field(item, "price").unwrap_or(0.0);
    let quantity = u64_field(item, "quantity").unwrap_or(0);
    let seed = product
        .and_then(|product| u64_field(product, "id"))
        .unwrap_or(product_id);

    json!({
        "productId": product_id,
        "name": product.map_or(json!(DELISTED_NAME), |p| field_or_null(p, "name")),
        "price": price,
        "quantity": quantity,
        "subtotal": price * quantity as f64,
        "imageUrl": product
            .and_then(|p| str_field(p, "image_url"))
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_PRODUCT_IMAGE),
        "specifications": order_specifications(product, seed),
    })
}

fn order_summary(order: &Record, items: Vec<Value>) -> Value {
    let status = str_field(order, "status").unwrap_or_default();
    json!({
        "id": field_or_null(order, "id"),
        "orderNumber": field_or_null(order, "order_number"),
        "status": status,
        "statusName": status_name(status),
        "orderDate": field_or_null(order, "created_at"),
        "totalAmount": field_or_null(order, "total_amount"),
        "items": items,
        "expireTime": expire_time(order),
    })
}

/// The order's lines joined with their products.
async fn order_lines(state: &AppState, order_id: u64) -> Vec<(Record, Option<Record>)> {
    let items = state
        .store
        .all("order_items", Some(&Condition::field("order_id", order_id)))
        .await;
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let product = match u64_field(&item, "product_id") {
            Some(product_id) => {
                state
                    .store
                    .get("products", Some(&Condition::by_id(product_id)))
                    .await
            }
            None => None,
        };
        lines.push((item, product));
    }
    lines
}

/// Order history handler
#[instrument(skip(state))]
pub async fn list_orders_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(query): Query<OrderListQuery>,
) -> Json<Value> {
    let mut orders = state
        .store
        .all("orders", Some(&Condition::field("user_id", session.user_id)))
        .await;
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        orders.retain(|order| str_field(order, "status") == Some(status));
    }
    orders.sort_by(|a, b| str_field(b, "created_at").cmp(&str_field(a, "created_at")));

    let mut summaries = Vec::with_capacity(orders.len());
    for order in &orders {
        let Some(order_id) = u64_field(order, "id") else {
            continue;
        };
        let items: Vec<Value> = order_lines(&state, order_id)
            .await
            .iter()
            .filter_map(|(item, product)| product.as_ref().map(|p| order_line(item, Some(p))))
            .collect();
        if items.is_empty() {
            continue;
        }
        summaries.push(order_summary(order, items));
    }

    Json(json!({
        "success": true,
        "data": summaries,
        "currentStatus": query.status.as_deref().unwrap_or("all"),
    }))
}

/// Price every checkout line from the catalog, rejecting unknown products,
/// unusable quantities and lines that exceed stock.
async fn price_lines(state: &AppState, lines: &[OrderLineRequest]) -> Result<Vec<PricedLine>, ApiError> {
    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        let product = match line.product_id.as_ref().and_then(loose_u64) {
            Some(product_id) => {
                state
                    .store
                    .get("products", Some(&Condition::by_id(product_id)))
                    .await
            }
            None => None,
        };
        let product = product.ok_or_else(|| {
            let shown = line
                .product_id
                .as_ref()
                .map(Value::to_string)
                .unwrap_or_default();
            ApiError::BadRequest(format!("Product {shown} does not exist"))
        })?;

        let name = str_field(&product, "name").unwrap_or_default();
        let quantity = line
            .quantity
            .as_ref()
            .and_then(loose_u64)
            .filter(|q| *q >= 1)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid quantity for {name}")))?;
        if !in_stock(&product, quantity) {
            return Err(ApiError::BadRequest(format!("Insufficient stock for {name}")));
        }

        priced.push(PricedLine {
            product_id: u64_field(&product, "id").unwrap_or_default(),
            price: f64_field(&product, "price").unwrap_or(0.0),
            quantity,
        });
    }
    Ok(priced)
}

/// Checkout handler
#[instrument(skip(state, request))]
pub async fn create_order_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.items.is_empty() {
        return Err(ApiError::BadRequest("Order has no items".to_string()));
    }
    if !truthy(request.address_id.as_ref()) {
        return Err(ApiError::BadRequest("Please choose a delivery address".to_string()));
    }
    if !truthy(request.payment_method.as_ref()) {
        return Err(ApiError::BadRequest("Please choose a payment method".to_string()));
    }

    let lines = price_lines(&state, &request.items).await?;
    let total: f64 = lines.iter().map(|l| l.price * l.quantity as f64).sum();
    if !total_matches(request.total_amount.as_ref(), total) {
        return Err(ApiError::BadRequest("Order total does not match".to_string()));
    }

    let order_number = generate_order_number();
    let expire_at = Utc::now() + Duration::minutes(PAYMENT_WINDOW_MINUTES);

    let mut order = Record::new();
    order.insert("order_number".into(), json!(order_number));
    order.insert("user_id".into(), json!(session.user_id));
    order.insert("status".into(), json!(PENDING_PAYMENT));
    order.insert("total_amount".into(), json!(total));
    order.insert("payment_method".into(), request.payment_method.clone().unwrap_or(Value::Null));
    order.insert("address_id".into(), request.address_id.clone().unwrap_or(Value::Null));
    order.insert("expire_at".into(), json!(iso_timestamp(expire_at)));
    let order = state.store.insert("orders", order).await;
    let order_id = u64_field(&order, "id").unwrap_or_default();

    for line in &lines {
        let mut item = Record::new();
        item.insert("order_id".into(), json!(order_id));
        item.insert("product_id".into(), json!(line.product_id));
        item.insert("price".into(), json!(line.price));
        item.insert("quantity".into(), json!(line.quantity));
        state.store.insert("order_items", item).await;
    }

    if request.source.as_deref() == Some("cart") {
        state
            .store
            .delete("cart_items", &Condition::field("user_id", session.user_id))
            .await;
    }

    info!(user_id = session.user_id, order_id, %order_number, total, "Order created");

    Ok(Json(json!({
        "success": true,
        "message": "Order created",
        "orderId": order_id,
        "orderNumber": order_number,
    })))
}

/// Order detail handler
#[instrument(skip(state))]
pub async fn get_order_handler(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let order_id = path_id(&id, "Order")?;
    let order = state
        .store
        .get(
            "orders",
            Some(&Condition::fields([("id", order_id), ("user_id", session.user_id)])),
        )
        .await
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    let items: Vec<Value> = order_lines(&state, order_id)
        .await
        .iter()
        .map(|(item, product)| order_line(item, product.as_ref()))
        .collect();

    let mut detail = order_summary(&order, items);
    if let Value::Object(fields) = &mut detail {
        fields.insert("paymentMethod".into(), field_or_null(&order, "payment_method"));
    }

    Ok(Json(json!({ "success": true, "data": detail })))
}
