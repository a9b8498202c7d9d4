use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{order_items, orders};
use crate::models::{OrderStatus, PaymentMethod, ShippingAddress};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DirectOrderItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}

/// Caller-supplied order without a cart round-trip. Totals arrive with the
/// payload and the order starts out paid.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DirectOrderRequest {
    pub items: Vec<DirectOrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_fee: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}

impl OrderItemResponse {
    pub fn from_entity(model: order_items::Model) -> Self {
        Self {
            product_id: model.product_id,
            product_name: model.product_name,
            product_price: model.product_price,
            quantity: model.quantity,
            subtotal: model.subtotal,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItemResponse>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_fee: Decimal,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderResponse {
    pub fn from_entity(order: orders::Model, items: Vec<order_items::Model>) -> Self {
        Self {
            id: order.id,
            customer_id: order.customer_id,
            order_number: order.order_number,
            status: order.status,
            items: items
                .into_iter()
                .map(OrderItemResponse::from_entity)
                .collect(),
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            subtotal: order.subtotal,
            tax_amount: order.tax_amount,
            shipping_fee: order.shipping_fee,
            total_amount: order.total_amount,
            notes: order.notes,
            tracking_number: order.tracking_number,
            paid_at: order.paid_at.map(|dt| dt.with_timezone(&Utc)),
            shipped_at: order.shipped_at.map(|dt| dt.with_timezone(&Utc)),
            delivered_at: order.delivered_at.map(|dt| dt.with_timezone(&Utc)),
            created_at: order.created_at.with_timezone(&Utc),
            updated_at: order.updated_at.with_timezone(&Utc),
        }
    }
}
