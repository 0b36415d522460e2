// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Sample catalog for a fresh store: an `admin` account (password
//! `123456`), four categories, one shop and six products.

use serde_json::{json, Value};
use tracing::{error, info};

use crate::auth::hash_password;
use crate::fields::{into_record, u64_field};
use crate::AppStore;

const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/300";

fn sample_categories() -> Vec<Value> {
    [
        ("Electronics", "laptop"),
        ("Clothing & Accessories", "handbag"),
        ("Food & Drinks", "cup"),
        ("Books & Stationery", "book"),
    ]
    .into_iter()
    .map(|(name, icon)| json!({ "name": name, "icon": icon, "parent_id": null }))
    .collect()
}

/// `category_ids` must hold at least the first three sample categories.
fn sample_products(category_ids: &[u64], shop_id: u64) -> Vec<Value> {
    let (electronics, clothing, food) = (category_ids[0], category_ids[1], category_ids[2]);
    vec![
        json!({
            "name": "Smartphone",
            "sku": "SPH-1001",
            "barcode": "6900000000001",
            "brand": "Sample Brand",
            "tags": ["phone", "digital", "bestseller"],
            "attributes": { "color": ["black", "white"], "storage": ["128GB", "256GB"] },
            "variants": [
                { "sku": "SPH-1001-128-BK", "price": 2999.0, "attributes": { "storage": "128GB", "color": "black" }, "stock": 20 }
            ],
            "description": "Fast smartphone with a sharp camera",
            "price": 2999.0,
            "original_price": 3499.0,
            "stock": 50,
            "category_id": electronics,
            "shop_id": shop_id,
            "image_url": PLACEHOLDER_IMAGE,
            "images": [PLACEHOLDER_IMAGE, "https://via.placeholder.com/300/111"],
            "weight_grams": 180,
            "dimensions_cm": { "length": 15, "width": 7, "height": 0.8 },
            "shipping": { "type": "standard", "weight_grams": 220 },
            "warranty": "1 year",
            "rating": 4.6,
            "reviews": 120,
            "is_hot": true,
            "is_new": true
        }),
        json!({
            "name": "Laptop",
            "sku": "LTP-2001",
            "barcode": "6900000000002",
            "brand": "Sample Brand",
            "tags": ["computer", "office"],
            "attributes": { "memory": ["8GB", "16GB"], "storage": ["256GB", "512GB"] },
            "variants": [],
            "description": "Light, portable and powerful",
            "price": 5999.0,
            "original_price": 6999.0,
            "stock": 30,
            "category_id": electronics,
            "shop_id": shop_id,
            "image_url": PLACEHOLDER_IMAGE,
            "images": [PLACEHOLDER_IMAGE],
            "weight_grams": 1400,
            "dimensions_cm": { "length": 32, "width": 22, "height": 1.8 },
            "shipping": { "type": "bulky", "weight_grams": 1600 },
            "warranty": "1 year",
            "rating": 4.7,
            "reviews": 85,
            "is_hot": true,
            "is_new": false
        }),
        json!({
            "name": "T-shirt",
            "sku": "TSH-3001",
            "barcode": "6900000000003",
            "brand": "Street Label",
            "tags": ["clothing", "cotton"],
            "attributes": { "color": ["white", "black"], "size": ["S", "M", "L"] },
            "variants": [
                { "sku": "TSH-3001-WH-M", "price": 99.0, "attributes": { "color": "white", "size": "M" }, "stock": 20 }
            ],
            "description": "Pure cotton, soft and breathable",
            "price": 99.0,
            "original_price": 129.0,
            "stock": 100,
            "category_id": clothing,
            "shop_id": shop_id,
            "image_url": PLACEHOLDER_IMAGE,
            "images": [PLACEHOLDER_IMAGE],
            "weight_grams": 200,
            "dimensions_cm": { "length": 30, "width": 25, "height": 2 },
            "shipping": { "type": "standard", "weight_grams": 250 },
            "warranty": "",
            "rating": 4.4,
            "reviews": 60,
            "is_hot": true,
            "is_new": true
        }),
        json!({
            "name": "Coffee beans",
            "sku": "COF-4001",
            "barcode": "6900000000004",
            "brand": "Fine Roast",
            "tags": ["food", "drinks"],
            "attributes": { "weight": ["250g", "500g"] },
            "variants": [],
            "description": "Hand-picked beans with a rich aroma",
            "price": 88.0,
            "original_price": 118.0,
            "stock": 200,
            "category_id": food,
            "shop_id": shop_id,
            "image_url": PLACEHOLDER_IMAGE,
            "images": [PLACEHOLDER_IMAGE],
            "weight_grams": 500,
            "dimensions_cm": { "length": 20, "width": 12, "height": 8 },
            "shipping": { "type": "food", "weight_grams": 520 },
            "warranty": "",
            "rating": 4.5,
            "reviews": 40,
            "is_hot": false,
            "is_new": false
        }),
        json!({
            "name": "Tablet",
            "sku": "TAB-5001",
            "barcode": "6900000000005",
            "brand": "Sample Brand",
            "tags": ["tablet", "study"],
            "attributes": { "storage": ["64GB", "128GB"] },
            "variants": [],
            "description": "High-resolution screen for study and play",
            "price": 1999.0,
            "original_price": 2299.0,
            "stock": 40,
            "category_id": electronics,
            "shop_id": shop_id,
            "image_url": PLACEHOLDER_IMAGE,
            "images": [PLACEHOLDER_IMAGE],
            "weight_grams": 600,
            "dimensions_cm": { "length": 25, "width": 17, "height": 0.7 },
            "shipping": { "type": "standard", "weight_grams": 650 },
            "warranty": "1 year",
            "rating": 4.3,
            "reviews": 30,
            "is_hot": false,
            "is_new": true
        }),
        json!({
            "name": "Sneakers",
            "sku": "SHO-6001",
            "barcode": "6900000000006",
            "brand": "Sport Co",
            "tags": ["shoes", "sport"],
            "attributes": { "color": ["white", "black"], "size": ["39", "40", "41"] },
            "variants": [],
            "description": "Comfortable, breathable running shoes",
            "price": 299.0,
            "original_price": 399.0,
            "stock": 80,
            "category_id": clothing,
            "shop_id": shop_id,
            "image_url": PLACEHOLDER_IMAGE,
            "images": [PLACEHOLDER_IMAGE],
            "weight_grams": 800,
            "dimensions_cm": { "length": 30, "width": 20, "height": 10 },
            "shipping": { "type": "standard", "weight_grams": 900 },
            "warranty": "",
            "rating": 4.2,
            "reviews": 45,
            "is_hot": false,
            "is_new": false
        }),
    ]
}

/// Insert the sample catalog unless the store already has users.
///
/// Returns whether anything was inserted.
pub async fn seed_sample_data(store: &AppStore) -> bool {
    if !store.all("users", None).await.is_empty() {
        info!("Store already has users, skipping sample data");
        return false;
    }

    let password = match hash_password("123456") {
        Ok(password) => password,
        Err(err) => {
            error!(error = %err, "Failed to hash the sample admin password");
            return false;
        }
    };
    let admin = store
        .insert(
            "users",
            into_record(json!({
                "username": "admin",
                "password": password,
                "email": "admin@example.com",
                "phone": "13800138000",
            })),
        )
        .await;
    let admin_id = u64_field(&admin, "id").unwrap_or_default();

    let mut category_ids = Vec::new();
    for category in sample_categories() {
        let stored = store.insert("categories", into_record(category)).await;
        category_ids.push(u64_field(&stored, "id").unwrap_or_default());
    }

    let shop = store
        .insert(
            "shops",
            into_record(json!({
                "name": "Sample Shop",
                "description": "A shop to explore the storefront with",
                "owner_id": admin_id,
                "logo_url": "https://via.placeholder.com/100",
            })),
        )
        .await;
    let shop_id = u64_field(&shop, "id").unwrap_or_default();

    let products = sample_products(&category_ids, shop_id);
    let product_count = products.len();
    for product in products {
        store.insert("products", into_record(product)).await;
    }

    info!(
        categories = category_ids.len(),
        products = product_count,
        "Sample data created, log in as admin / 123456"
    );
    true
}
