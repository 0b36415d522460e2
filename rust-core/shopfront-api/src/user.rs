// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Account area.

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{instrument, warn};

use shopfront_store::{Condition, Record};

use crate::fields::{field_or_null, str_field};
use crate::session::{self, CurrentUser};
use crate::{ApiError, AppState};

/// Number of orders in each state shown on the account page.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct OrderCounts {
    pub pending_payment: u64,
    pub pending_shipment: u64,
    pub shipped: u64,
    pub completed: u64,
    /// Completed orders that can still be reviewed.
    pub pending_review: u64,
}

impl OrderCounts {
    pub fn tally<'a>(orders: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut counts = Self::default();
        for order in orders {
            let slot = match str_field(order, "status") {
                Some("pending_payment") => &mut counts.pending_payment,
                Some("pending_shipment") => &mut counts.pending_shipment,
                Some("shipped") => &mut counts.shipped,
                Some("completed") => {
                    counts.pending_review = counts.pending_review.saturating_add(1);
                    &mut counts.completed
                }
                _ => continue,
            };
            *slot = slot.saturating_add(1);
        }
        counts
    }
}

/// Account home handler
#[instrument(skip(state, headers))]
pub async fn home_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    CurrentUser(current): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    let Some(user) = state
        .store
        .get("users", Some(&Condition::by_id(current.user_id)))
        .await
    else {
        warn!(user_id = current.user_id, "Session refers to a missing user");
        if let Some(token) = session::token_from_headers(&headers) {
            state.sessions.destroy(&token);
        }
        return Err(ApiError::Unauthorized("Please log in first".to_string()));
    };

    let orders = state
        .store
        .all("orders", Some(&Condition::field("user_id", current.user_id)))
        .await;

    Ok(Json(json!({
        "success": true,
        "user": {
            "id": field_or_null(&user, "id"),
            "username": field_or_null(&user, "username"),
            "email": field_or_null(&user, "email"),
            "avatar": field_or_null(&user, "avatar"),
        },
        "orderCounts": OrderCounts::tally(&orders),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::into_record;

    #[test]
    fn test_completed_orders_await_review() {
        let orders: Vec<Record> = ["pending_payment", "completed", "completed", "cancelled", "shipped"]
            .into_iter()
            .map(|status| into_record(json!({ "status": status })))
            .collect();
        let counts = OrderCounts::tally(&orders);
        assert_eq!(
            counts,
            OrderCounts {
                pending_payment: 1,
                pending_shipment: 0,
                shipped: 1,
                completed: 2,
                pending_review: 2,
            }
        );
    }
}
