//! The product catalog resource: record type, listing schema and list view.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use listing_core::{FieldAccess, FilterOp, SortKey, Value};
use listing_engine::{FieldKind, NumericBounds, ResourceSchema};
use serde::{Deserialize, Serialize};

/// Bundled sample catalog used when no `--data` file is given.
pub const SAMPLE_DATA: &str = include_str!("../data/products.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Inactive products are hidden from every listing.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl FieldAccess for Product {
    fn field(&self, name: &str) -> Option<Value> {
        Some(match name {
            "id" => Value::I64(self.id),
            "name" => Value::String(self.name.clone()),
            "description" => Value::String(self.description.clone()),
            "category" => Value::String(self.category.clone()),
            "price" => Value::F64(self.price),
            "stock" => Value::I64(self.stock),
            "in_stock" => Value::Bool(self.stock > 0),
            "tags" => Value::List(self.tags.iter().cloned().map(Value::String).collect()),
            "created_at" => Value::DateTime(self.created_at),
            "active" => Value::Bool(self.active),
            _ => return None,
        })
    }
}

/// Trimmed row for list output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductListItem {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub in_stock: bool,
}

impl From<Product> for ProductListItem {
    fn from(p: Product) -> Self {
        Self {
            in_stock: p.stock > 0,
            id: p.id,
            name: p.name,
            category: p.category,
            price: p.price,
        }
    }
}

pub fn product_schema() -> ResourceSchema {
    ResourceSchema::new("products", "id", FieldKind::I64)
        .base_filter("active", FilterOp::Eq, Value::Bool(true))
        .filter("category", "category", FilterOp::Eq, FieldKind::String)
        .filter("tags", "tags", FilterOp::In, FieldKind::String)
        .filter("in_stock", "in_stock", FilterOp::Eq, FieldKind::Bool)
        .filter("name_prefix", "name", FilterOp::StartsWith, FieldKind::String)
        .bounded_filter(
            "min_price",
            "price",
            FilterOp::Gte,
            FieldKind::F64,
            NumericBounds::non_negative(),
        )
        .bounded_filter(
            "max_price",
            "price",
            FilterOp::Lte,
            FieldKind::F64,
            NumericBounds::non_negative(),
        )
        .bounded_filter(
            "min_stock",
            "stock",
            FilterOp::Gte,
            FieldKind::I64,
            NumericBounds::non_negative().clamping(),
        )
        .filter("created_after", "created_at", FilterOp::Gt, FieldKind::DateTimeUtc)
        .search("q", ["name", "description", "category"])
        .sortable("name", FieldKind::String)
        .sortable("price", FieldKind::F64)
        .sortable("category", FieldKind::String)
        .sortable("stock", FieldKind::I64)
        .sortable("created_at", FieldKind::DateTimeUtc)
        .facetable("category")
        .facetable("tags")
        .facetable("in_stock")
        .suggestable("name")
        .default_sort(vec![SortKey::desc("created_at")])
}

/// Load products from a JSON array file, or the bundled sample.
pub fn load_products(path: Option<&Path>) -> Result<Vec<Product>> {
    let (raw, origin) = match path {
        Some(p) => (
            std::fs::read_to_string(p)
                .with_context(|| format!("cannot read catalog {}", p.display()))?,
            p.display().to_string(),
        ),
        None => (SAMPLE_DATA.to_string(), "bundled sample".to_string()),
    };
    let products: Vec<Product> =
        serde_json::from_str(&raw).with_context(|| format!("invalid catalog JSON in {origin}"))?;
    tracing::debug!(count = products.len(), origin = %origin, "catalog loaded");
    Ok(products)
}
