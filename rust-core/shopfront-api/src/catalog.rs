// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Catalog browsing: categories, products and shops.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use shopfront_store::{compare_values, Condition, Record};

use crate::display::DEFAULT_PRODUCT_IMAGE;
use crate::fields::{contains_ci, f64_field, field_or_null, path_id, str_field, u64_field};
use crate::{ApiError, AppState, AppStore};

const SORTABLE_FIELDS: [&str; 3] = ["created_at", "price", "name"];
const DEFAULT_PAGE_SIZE: usize = 20;
const DEFAULT_SHOP_RATING: f64 = 4.5;
const DEFAULT_AVATAR: &str = "/images/avatar-default.png";
const ANONYMOUS_REVIEWER: &str = "anonymous";

/// Product listing query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category_id: Option<String>,
    pub shop_id: Option<String>,
    /// Case-insensitive keyword matched against name, description and tags
    pub q: Option<String>,
    /// One of `created_at`, `price`, `name`
    pub sort: Option<String>,
    /// `ASC` or `DESC`
    pub order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Batch lookup query parameters
#[derive(Debug, Default, Deserialize)]
pub struct BatchQuery {
    /// Comma-separated product ids
    pub ids: Option<String>,
}

/// Shop search query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ShopQuery {
    pub q: Option<String>,
}

/// Category list handler
#[instrument(skip(state))]
pub async fn list_categories_handler(State(state): State<AppState>) -> Json<Value> {
    let mut categories = state.store.all("categories", None).await;
    categories.sort_by(|a, b| compare_values(a.get("id"), b.get("id")));
    Json(json!({ "success": true, "data": categories }))
}

/// Product list handler
#[instrument(skip(state))]
pub async fn list_products_handler(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Json<Value> {
    let page = positive_or(query.page.as_deref(), 1);
    let limit = positive_or(query.limit.as_deref(), DEFAULT_PAGE_SIZE);

    let mut products = match equality_filter(&query) {
        Some(condition) => state.store.all("products", condition.as_ref()).await,
        // A filter value that is not an id matches nothing.
        None => Vec::new(),
    };

    let keyword = query.q.as_deref().unwrap_or_default().trim().to_lowercase();
    if !keyword.is_empty() {
        products.retain(|product| matches_keyword(product, &keyword));
    }

    let sort_field = query
        .sort
        .as_deref()
        .filter(|s| SORTABLE_FIELDS.contains(s))
        .unwrap_or("created_at");
    let ascending = query
        .order
        .as_deref()
        .is_some_and(|o| o.eq_ignore_ascii_case("ASC"));
    products.sort_by(|a, b| {
        let ordering = compare_values(a.get(sort_field), b.get(sort_field));
        if ascending {
            ordering
        } else {
            ordering.reverse()
        }
    });

    let total = products.len();
    let data: Vec<Record> = products
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();
    debug!(total, returned = data.len(), "Listed products");

    Json(json!({
        "success": true,
        "data": data,
        "pagination": { "page": page, "limit": limit, "total": total },
    }))
}

/// `Some(None)` for no filter, `Some(Some(..))` for a field filter and
/// `None` when a filter value cannot be an id.
fn equality_filter(query: &ProductQuery) -> Option<Option<Condition>> {
    let mut fields = Record::new();
    for (key, raw) in [("category_id", &query.category_id), ("shop_id", &query.shop_id)] {
        let Some(raw) = raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };
        let id: u64 = raw.parse().ok()?;
        fields.insert(key.to_string(), Value::from(id));
    }
    Some((!fields.is_empty()).then(|| Condition::FieldEquals(fields)))
}

fn matches_keyword(product: &Record, keyword: &str) -> bool {
    let text_match = ["name", "description"]
        .iter()
        .any(|key| str_field(product, key).is_some_and(|text| contains_ci(text, keyword)));
    let tag_match = match product.get("tags") {
        Some(Value::Array(tags)) => tags
            .iter()
            .filter_map(Value::as_str)
            .any(|tag| contains_ci(tag, keyword)),
        _ => false,
    };
    text_match || tag_match
}

fn positive_or(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

/// Batch product lookup handler
#[instrument(skip(state))]
pub async fn batch_products_handler(
    State(state): State<AppState>,
    Query(query): Query<BatchQuery>,
) -> Result<Json<Value>, ApiError> {
    let raw = query
        .ids
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Product id list is required".to_string()))?;

    let ids: Vec<u64> = raw
        .split(',')
        .filter_map(|id| id.trim().parse().ok())
        .collect();
    if ids.is_empty() {
        return Err(ApiError::BadRequest("Invalid product id list".to_string()));
    }

    let mut products = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(mut product) = state.store.get("products", Some(&Condition::by_id(id))).await {
            embed_category(&state.store, &mut product).await;
            products.push(product);
        }
    }

    Ok(Json(json!({ "success": true, "products": products })))
}

/// Product detail handler
#[instrument(skip(state))]
pub async fn get_product_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = path_id(&id, "Product")?;
    let store = &state.store;
    let mut product = store
        .get("products", Some(&Condition::by_id(id)))
        .await
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;

    embed_category(store, &mut product).await;
    if let Some(shop_id) = u64_field(&product, "shop_id") {
        let shop = store.get("shops", Some(&Condition::by_id(shop_id))).await;
        product.insert("shop".into(), json!(shop));
    }

    let reviews = store
        .all("reviews", Some(&Condition::field("product_id", id)))
        .await;
    let mut with_users = Vec::with_capacity(reviews.len());
    for mut review in reviews {
        let user = match u64_field(&review, "user_id") {
            Some(user_id) => store.get("users", Some(&Condition::by_id(user_id))).await,
            None => None,
        };
        review.insert("user".into(), reviewer(user.as_ref(), &review));
        with_users.push(review);
    }
    product.insert("reviews".into(), json!(with_users));

    Ok(Json(json!({ "success": true, "data": product })))
}

fn reviewer(user: Option<&Record>, review: &Record) -> Value {
    let anonymous = crate::fields::truthy(review.get("is_anonymous"));
    let username = user
        .and_then(|u| str_field(u, "username"))
        .filter(|_| !anonymous)
        .unwrap_or(ANONYMOUS_REVIEWER);
    json!({
        "id": user.and_then(|u| u.get("id")),
        "username": username,
        "avatar": user.and_then(|u| str_field(u, "avatar")).unwrap_or(DEFAULT_AVATAR),
    })
}

async fn embed_category(store: &AppStore, product: &mut Record) {
    if let Some(category_id) = u64_field(product, "category_id") {
        let category = store
            .get("categories", Some(&Condition::by_id(category_id)))
            .await;
        product.insert("category".into(), json!(category));
    }
}

/// Shop list handler
#[instrument(skip(state))]
pub async fn list_shops_handler(
    State(state): State<AppState>,
    Query(query): Query<ShopQuery>,
) -> Json<Value> {
    let mut shops = state.store.all("shops", None).await;

    let keyword = query.q.as_deref().unwrap_or_default().trim().to_lowercase();
    if !keyword.is_empty() {
        shops.retain(|shop| {
            ["name", "description", "address"]
                .iter()
                .any(|key| str_field(shop, key).is_some_and(|text| contains_ci(text, &keyword)))
        });
    }

    let mut data = Vec::with_capacity(shops.len());
    for shop in &shops {
        let products = match u64_field(shop, "id") {
            Some(id) => {
                state
                    .store
                    .all("products", Some(&Condition::field("shop_id", id)))
                    .await
            }
            None => Vec::new(),
        };
        data.push(shop_summary(shop, &products));
    }

    Json(json!({ "success": true, "data": data }))
}

/// Listing card for a shop, with sales and price statistics of its products.
fn shop_summary(shop: &Record, products: &[Record]) -> Value {
    let total_sales = products
        .iter()
        .filter_map(|p| u64_field(p, "sold"))
        .fold(0, u64::saturating_add);
    let avg_price = if products.is_empty() {
        json!(0)
    } else {
        let sum: f64 = products.iter().filter_map(|p| f64_field(p, "price")).sum();
        json!(format!("{:.2}", sum / products.len() as f64))
    };

    json!({
        "id": field_or_null(shop, "id"),
        "name": non_blank(shop, "name").unwrap_or("Unknown shop"),
        "description": non_blank(shop, "description").unwrap_or_default(),
        "address": non_blank(shop, "address").unwrap_or_default(),
        "rating": f64_field(shop, "rating").filter(|r| *r != 0.0).unwrap_or(DEFAULT_SHOP_RATING),
        "logo_url": non_blank(shop, "logo_url").unwrap_or(DEFAULT_PRODUCT_IMAGE),
        "productCount": products.len(),
        "totalSales": total_sales,
        "avgPrice": avg_price,
    })
}

fn non_blank<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    str_field(record, key).filter(|s| !s.is_empty())
}

/// Shop detail handler
#[instrument(skip(state))]
pub async fn get_shop_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = path_id(&id, "Shop")?;
    let shop = state
        .store
        .get("shops", Some(&Condition::by_id(id)))
        .await
        .ok_or_else(|| ApiError::NotFound("Shop not found".to_string()))?;
    let products = state
        .store
        .all("products", Some(&Condition::field("shop_id", id)))
        .await;

    let mut categories = vec![Value::String("all".to_string())];
    match shop.get("categories") {
        Some(Value::Array(own)) => categories.extend(own.iter().cloned()),
        _ => {
            let mut seen: Vec<&str> = Vec::new();
            for name in products.iter().filter_map(|p| non_blank(p, "shop_category")) {
                if !seen.contains(&name) {
                    seen.push(name);
                }
            }
            categories.extend(seen.into_iter().map(|name| Value::String(name.to_string())));
        }
    }

    let listed: Vec<Value> = products
        .iter()
        .map(|product| {
            json!({
                "id": field_or_null(product, "id"),
                "name": field_or_null(product, "name"),
                "price": field_or_null(product, "price"),
                "sales": u64_field(product, "sold").unwrap_or(0),
                "imageUrl": field_or_null(product, "image_url"),
                "category": non_blank(product, "shop_category").unwrap_or("other"),
            })
        })
        .collect();

    let register_date = str_field(&shop, "created_at")
        .and_then(|at| at.get(..10))
        .unwrap_or_default();

    Ok(Json(json!({
        "success": true,
        "data": {
            "id": field_or_null(&shop, "id"),
            "name": field_or_null(&shop, "name"),
            "description": field_or_null(&shop, "description"),
            "rating": f64_field(&shop, "rating").unwrap_or(0.0),
            "registerDate": register_date,
            "logo_url": field_or_null(&shop, "logo_url"),
            "banner_url": field_or_null(&shop, "banner_url"),
            "address": field_or_null(&shop, "address"),
            "phone": field_or_null(&shop, "phone"),
            "products": listed,
            "categories": categories,
            "productCount": products.len(),
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::into_record;

    #[test]
    fn test_keyword_matches_name_description_and_tags() {
        let product = into_record(json!({
            "name": "Smartphone",
            "description": "Fast and sleek",
            "tags": ["Mobile", "Bestseller"]
        }));
        assert!(matches_keyword(&product, "phone"));
        assert!(matches_keyword(&product, "sleek"));
        assert!(matches_keyword(&product, "bestsell"));
        assert!(!matches_keyword(&product, "laptop"));
    }

    #[test]
    fn test_equality_filter() {
        let none = ProductQuery::default();
        assert!(matches!(equality_filter(&none), Some(None)));

        let both = ProductQuery {
            category_id: Some("2".into()),
            shop_id: Some(" 1 ".into()),
            ..Default::default()
        };
        let condition = equality_filter(&both).unwrap().unwrap();
        assert!(condition.matches(&into_record(json!({"category_id": 2, "shop_id": 1}))));
        assert!(!condition.matches(&into_record(json!({"category_id": 2, "shop_id": 3}))));

        let bad = ProductQuery {
            category_id: Some("phones".into()),
            ..Default::default()
        };
        assert!(equality_filter(&bad).is_none());
    }

    #[test]
    fn test_shop_summary_defaults_and_stats() {
        let shop = into_record(json!({"id": 1, "name": ""}));
        let products = vec![
            into_record(json!({"price": 10.0, "sold": 3})),
            into_record(json!({"price": 5.5})),
        ];
        let summary = shop_summary(&shop, &products);
        assert_eq!(summary["name"], "Unknown shop");
        assert_eq!(summary["rating"], 4.5);
        assert_eq!(summary["productCount"], 2);
        assert_eq!(summary["totalSales"], 3);
        assert_eq!(summary["avgPrice"], "7.75");

        assert_eq!(shop_summary(&shop, &[])["avgPrice"], 0);
    }

    #[test]
    fn test_positive_or() {
        assert_eq!(positive_or(Some("3"), 1), 3);
        assert_eq!(positive_or(Some("0"), 20), 20);
        assert_eq!(positive_or(Some("x"), 20), 20);
        assert_eq!(positive_or(None, 1), 1);
    }

    #[test]
    fn test_anonymous_reviewer() {
        let user = into_record(json!({"id": 2, "username": "bob", "avatar": "/a.png"}));
        let named = reviewer(Some(&user), &into_record(json!({})));
        assert_eq!(named["username"], "bob");

        let hidden = reviewer(Some(&user), &into_record(json!({"is_anonymous": true})));
        assert_eq!(hidden["username"], ANONYMOUS_REVIEWER);
        assert_eq!(hidden["id"], 2);

        let missing = reviewer(None, &into_record(json!({})));
        assert_eq!(missing["avatar"], DEFAULT_AVATAR);
        assert_eq!(missing["id"], Value::Null);
    }
}
