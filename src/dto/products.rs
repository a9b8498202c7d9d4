use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::products;
use crate::models::{ImageList, SpecMap};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub specifications: SpecMap,
    #[serde(default)]
    pub images: ImageList,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub specifications: Option<SpecMap>,
    pub images: Option<ImageList>,
    pub stock_quantity: Option<i32>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category: String,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub specifications: SpecMap,
    pub images: ImageList,
    pub stock_quantity: i32,
    pub is_available: bool,
    pub views_count: i32,
    pub sales_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductResponse {
    pub fn from_entity(model: products::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price: model.price,
            category: model.category,
            brand: model.brand,
            model: model.model,
            specifications: model.specifications,
            images: model.images,
            stock_quantity: model.stock_quantity,
            is_available: model.is_available,
            views_count: model.views_count,
            sales_count: model.sales_count,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryCount {
    pub name: String,
    pub count: i64,
}
