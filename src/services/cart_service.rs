use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddCartItemRequest, CartItemResponse, CartResponse, UpdateCartItemRequest},
    entity::{
        cart_items::{self, ActiveModel as CartItemActive, Column as CartCol, Entity as CartItems},
        products::{self, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::compute_totals,
    response::ApiResponse,
    state::AppState,
};

/// The cart is implicit: whatever lines exist for the customer. Reading an
/// empty cart is not an error, so there is no explicit create step.
pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartResponse>> {
    let items = load_items(state, user.customer_id).await?;
    Ok(ApiResponse::success("Cart retrieved", summarize(items)))
}

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddCartItemRequest,
) -> AppResult<ApiResponse<CartResponse>> {
    if payload.quantity <= 0 {
        return Err(AppError::Validation(
            "Quantity must be greater than 0".into(),
        ));
    }

    let product = fetch_product(state, payload.product_id).await?;
    if !product.is_available {
        return Err(AppError::ProductUnavailable(product.name));
    }
    if product.stock_quantity < payload.quantity {
        return Err(AppError::InsufficientStock(product.name));
    }

    let existing = CartItems::find()
        .filter(
            Condition::all()
                .add(CartCol::CustomerId.eq(user.customer_id))
                .add(CartCol::ProductId.eq(payload.product_id)),
        )
        .one(&state.orm)
        .await?;

    if let Some(line) = existing {
        // No reservation is held, so the summed quantity is re-checked
        // against whatever stock the product has right now.
        let new_quantity = line.quantity + payload.quantity;
        if new_quantity > product.stock_quantity {
            return Err(AppError::InsufficientStock(product.name));
        }
        let mut active: CartItemActive = line.into();
        active.quantity = Set(new_quantity);
        active.updated_at = Set(Utc::now().into());
        active.update(&state.orm).await?;
    } else {
        CartItemActive {
            id: Set(Uuid::new_v4()),
            customer_id: Set(user.customer_id),
            product_id: Set(product.id),
            product_name: Set(product.name.clone()),
            product_price: Set(product.price),
            quantity: Set(payload.quantity),
            selected: Set(true),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&state.orm)
        .await?;
    }

    let items = load_items(state, user.customer_id).await?;
    Ok(ApiResponse::success("Item added to cart", summarize(items)))
}

pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartResponse>> {
    let line = CartItems::find()
        .filter(
            Condition::all()
                .add(CartCol::CustomerId.eq(user.customer_id))
                .add(CartCol::ProductId.eq(product_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found in cart".into()))?;

    let mut active: CartItemActive = line.into();
    if let Some(quantity) = payload.quantity {
        if quantity <= 0 {
            return Err(AppError::Validation(
                "Quantity must be greater than 0".into(),
            ));
        }
        let product = fetch_product(state, product_id).await?;
        if quantity > product.stock_quantity {
            return Err(AppError::InsufficientStock(product.name));
        }
        active.quantity = Set(quantity);
    }
    if let Some(selected) = payload.selected {
        active.selected = Set(selected);
    }
    active.updated_at = Set(Utc::now().into());
    active.update(&state.orm).await?;

    let items = load_items(state, user.customer_id).await?;
    Ok(ApiResponse::success("Cart item updated", summarize(items)))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<CartResponse>> {
    let result = CartItems::delete_many()
        .filter(
            Condition::all()
                .add(CartCol::CustomerId.eq(user.customer_id))
                .add(CartCol::ProductId.eq(product_id)),
        )
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Item not found in cart".into()));
    }

    let items = load_items(state, user.customer_id).await?;
    Ok(ApiResponse::success("Item removed from cart", summarize(items)))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    // Clearing an already empty cart succeeds.
    CartItems::delete_many()
        .filter(CartCol::CustomerId.eq(user.customer_id))
        .exec(&state.orm)
        .await?;

    Ok(ApiResponse::success("Cart cleared", serde_json::json!({})))
}

async fn load_items(state: &AppState, customer_id: Uuid) -> AppResult<Vec<cart_items::Model>> {
    let items = CartItems::find()
        .filter(CartCol::CustomerId.eq(customer_id))
        .order_by_asc(CartCol::CreatedAt)
        .all(&state.orm)
        .await?;
    Ok(items)
}

async fn fetch_product(state: &AppState, product_id: Uuid) -> AppResult<products::Model> {
    Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))
}

fn summarize(models: Vec<cart_items::Model>) -> CartResponse {
    let items: Vec<CartItemResponse> = models.into_iter().map(CartItemResponse::from_entity).collect();

    let total_items: i64 = items
        .iter()
        .filter(|item| item.selected)
        .map(|item| item.quantity as i64)
        .sum();
    let subtotal: Decimal = items
        .iter()
        .filter(|item| item.selected)
        .map(|item| item.subtotal)
        .sum();

    if total_items == 0 {
        return CartResponse {
            items,
            total_items: 0,
            subtotal: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            shipping_fee: Decimal::ZERO,
            total_amount: Decimal::ZERO,
        };
    }

    let totals = compute_totals(subtotal);
    CartResponse {
        items,
        total_items,
        subtotal: totals.subtotal,
        tax_amount: totals.tax_amount,
        shipping_fee: totals.shipping_fee,
        total_amount: totals.total_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sea_orm::prelude::DateTimeWithTimeZone;

    fn line(price: Decimal, quantity: i32, selected: bool) -> cart_items::Model {
        let now: DateTimeWithTimeZone = Utc::now().into();
        cart_items::Model {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Widget".into(),
            product_price: price,
            quantity,
            selected,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn summary_covers_selected_lines_only() {
        let summary = summarize(vec![
            line(dec!(10), 3, true),
            line(dec!(50), 1, true),
            line(dec!(999), 1, false),
        ]);
        assert_eq!(summary.total_items, 4);
        assert_eq!(summary.subtotal, dec!(80));
        assert_eq!(summary.tax_amount, dec!(6.40));
        assert_eq!(summary.shipping_fee, dec!(10));
        assert_eq!(summary.total_amount, dec!(96.40));
    }

    #[test]
    fn summary_waives_shipping_from_the_threshold_up() {
        let summary = summarize(vec![line(dec!(60), 2, true)]);
        assert_eq!(summary.subtotal, dec!(120));
        assert_eq!(summary.shipping_fee, Decimal::ZERO);
    }

    #[test]
    fn empty_cart_summary_is_all_zeros() {
        let summary = summarize(vec![]);
        assert_eq!(summary.total_items, 0);
        assert_eq!(summary.total_amount, Decimal::ZERO);

        // nothing selected behaves like an empty cart
        let summary = summarize(vec![line(dec!(10), 1, false)]);
        assert_eq!(summary.total_items, 0);
        assert_eq!(summary.shipping_fee, Decimal::ZERO);
    }
}
