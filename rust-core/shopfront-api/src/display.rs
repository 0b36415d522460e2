// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Presentation helpers shared by cart and order views.

use serde_json::Value;
use shopfront_store::Record;

use crate::fields::{str_field, u64_field};

/// Specification label used when a product has nothing better.
pub const STANDARD_SPEC: &str = "standard";

/// Image shown for products without one.
pub const DEFAULT_PRODUCT_IMAGE: &str = "/images/product-default.svg";

/// Most specifications shown per order line.
const ORDER_SPEC_LIMIT: usize = 2;

/// One value per attribute array of `product.attributes`, picking
/// `values[seed % len]` so the same product always shows the same variant.
pub fn attribute_specifications(product: &Record, seed: u64) -> Vec<Value> {
    let Some(Value::Object(attributes)) = product.get("attributes") else {
        return Vec::new();
    };
    attributes
        .values()
        .filter_map(|values| match values {
            Value::Array(values) if !values.is_empty() => {
                let index = (seed % values.len() as u64) as usize;
                Some(values[index].clone())
            }
            _ => None,
        })
        .collect()
}

/// Specifications of a cart line: attributes, else the first two entries of
/// the comma-separated `specs` field, else [`STANDARD_SPEC`].
pub fn cart_specifications(product: &Record) -> Vec<Value> {
    let seed = u64_field(product, "id").unwrap_or(0);
    let specs = attribute_specifications(product, seed);
    if !specs.is_empty() {
        return specs;
    }
    match str_field(product, "specs").filter(|s| !s.is_empty()) {
        Some(specs) => specs
            .split(',')
            .map(|spec| Value::String(spec.trim().to_string()))
            .take(2)
            .collect(),
        None => vec![Value::String(STANDARD_SPEC.to_string())],
    }
}

/// Specifications of an order line, at most two.
pub fn order_specifications(product: Option<&Record>, seed: u64) -> Vec<Value> {
    let mut specs = product
        .map(|product| attribute_specifications(product, seed))
        .unwrap_or_default();
    if specs.is_empty() {
        specs.push(Value::String(STANDARD_SPEC.to_string()));
    }
    specs.truncate(ORDER_SPEC_LIMIT);
    specs
}

/// Human label for an order status; unknown statuses are shown verbatim.
pub fn status_name(status: &str) -> &str {
    match status {
        "pending_payment" => "Awaiting payment",
        "pending_shipment" => "Awaiting shipment",
        "shipped" => "Shipped",
        "completed" => "Completed",
        "cancelled" => "Cancelled",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::into_record;
    use serde_json::json;

    #[test]
    fn test_attribute_pick_is_seeded() {
        let product = into_record(json!({
            "id": 3,
            "attributes": {"color": ["black", "white"], "size": ["S", "M", "L"], "note": "n/a"}
        }));
        assert_eq!(cart_specifications(&product), vec![json!("white"), json!("S")]);
        assert_eq!(
            attribute_specifications(&product, 4),
            vec![json!("black"), json!("M")]
        );
    }

    #[test]
    fn test_cart_falls_back_to_specs_then_standard() {
        let with_specs = into_record(json!({"id": 1, "specs": "red , XL, cotton"}));
        assert_eq!(cart_specifications(&with_specs), vec![json!("red"), json!("XL")]);

        let bare = into_record(json!({"id": 1, "attributes": {}}));
        assert_eq!(cart_specifications(&bare), vec![json!(STANDARD_SPEC)]);
    }

    #[test]
    fn test_order_specifications_are_capped() {
        let product = into_record(json!({
            "id": 1,
            "attributes": {"a": ["x"], "b": ["y"], "c": ["z"]}
        }));
        assert_eq!(order_specifications(Some(&product), 1).len(), 2);
        assert_eq!(order_specifications(None, 1), vec![json!(STANDARD_SPEC)]);
    }

    #[test]
    fn test_status_names() {
        assert_eq!(status_name("shipped"), "Shipped");
        assert_eq!(status_name("refunded"), "refunded");
    }
}
