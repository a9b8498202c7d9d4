use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::orders::{
        CreateOrderRequest, DirectOrderRequest, OrderResponse, UpdateOrderStatusRequest,
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::{self, ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{self, ActiveModel as OrderActive, Column as OrderCol, Entity as Orders},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{OrderStatus, compute_totals, generate_order_number},
    response::{ApiResponse, Paginated},
    routes::params::{OrderListQuery, OrderSortBy, SortOrder},
    services::tracking_service,
    state::AppState,
};

/// Creates an order from the selected cart lines. Stock checks, the stock
/// decrement, the order and item inserts, the tracking record and the cart
/// cleanup run on one transaction, so a failure on any line leaves nothing
/// behind.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderResponse>> {
    let txn = state.orm.begin().await?;

    let cart_lines = CartItems::find()
        .filter(CartCol::CustomerId.eq(user.customer_id))
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    if cart_lines.is_empty() {
        return Err(AppError::Validation(
            "Shopping cart is empty, cannot create order".into(),
        ));
    }

    let selected: Vec<_> = cart_lines.iter().filter(|line| line.selected).collect();
    if selected.is_empty() {
        return Err(AppError::Validation(
            "Please select items to purchase".into(),
        ));
    }

    // Stock can move between add-to-cart and checkout, so every selected line
    // is re-validated against the live product here.
    let mut subtotal = Decimal::ZERO;
    for line in &selected {
        let product = Products::find_by_id(line.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Product"))?;
        if !product.is_available {
            return Err(AppError::ProductUnavailable(product.name));
        }
        if product.stock_quantity < line.quantity {
            return Err(AppError::InsufficientStock(product.name));
        }
        subtotal += line.product_price * Decimal::from(line.quantity);
    }

    let totals = compute_totals(subtotal);
    let now = Utc::now();
    let order_number = generate_order_number(now);

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        customer_id: Set(user.customer_id),
        order_number: Set(order_number),
        status: Set(OrderStatus::Pending),
        shipping_address: Set(payload.shipping_address),
        payment_method: Set(payload.payment_method),
        subtotal: Set(totals.subtotal),
        tax_amount: Set(totals.tax_amount),
        shipping_fee: Set(totals.shipping_fee),
        total_amount: Set(totals.total_amount),
        notes: Set(payload.notes),
        tracking_number: Set(None),
        paid_at: Set(None),
        shipped_at: Set(None),
        delivered_at: Set(None),
        archived_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(selected.len());
    for line in &selected {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            product_name: Set(line.product_name.clone()),
            product_price: Set(line.product_price),
            quantity: Set(line.quantity),
            subtotal: Set(line.product_price * Decimal::from(line.quantity)),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(item);

        take_stock(&txn, line.product_id, line.quantity, &line.product_name).await?;
    }

    tracking_service::create_tracking(&txn, order.id, &order.order_number, user.customer_id)
        .await?;

    // Purchased lines leave the cart; unselected lines stay for later.
    CartItems::delete_many()
        .filter(
            Condition::all()
                .add(CartCol::CustomerId.eq(user.customer_id))
                .add(CartCol::Selected.eq(true)),
        )
        .exec(&txn)
        .await?;

    txn.commit().await?;

    Ok(ApiResponse::created(
        "Order created",
        OrderResponse::from_entity(order, items),
    ))
}

/// Direct order path: the caller supplies items and totals, and the order
/// starts out paid. Catalog validation still applies, but a line whose product
/// vanished is tolerated with a warning.
pub async fn create_direct_order(
    state: &AppState,
    user: &AuthUser,
    payload: DirectOrderRequest,
) -> AppResult<ApiResponse<OrderResponse>> {
    if payload.items.is_empty() {
        return Err(AppError::Validation(
            "Order must contain at least one item".into(),
        ));
    }

    let txn = state.orm.begin().await?;

    for line in &payload.items {
        if line.quantity <= 0 {
            return Err(AppError::Validation(
                "Quantity must be greater than 0".into(),
            ));
        }
        match Products::find_by_id(line.product_id).one(&txn).await? {
            Some(product) => {
                if !product.is_available {
                    return Err(AppError::ProductUnavailable(product.name));
                }
                if product.stock_quantity < line.quantity {
                    return Err(AppError::InsufficientStock(product.name));
                }
            }
            None => {
                tracing::warn!(
                    product_id = %line.product_id,
                    "could not validate product, continuing with order creation"
                );
            }
        }
    }

    let now = Utc::now();
    let order_number = generate_order_number(now);

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        customer_id: Set(user.customer_id),
        order_number: Set(order_number),
        status: Set(OrderStatus::Paid),
        shipping_address: Set(payload.shipping_address),
        payment_method: Set(payload.payment_method),
        subtotal: Set(payload.subtotal),
        tax_amount: Set(payload.tax_amount),
        shipping_fee: Set(payload.shipping_fee),
        total_amount: Set(payload.total_amount),
        notes: Set(payload.notes),
        tracking_number: Set(None),
        paid_at: Set(Some(now.into())),
        shipped_at: Set(None),
        delivered_at: Set(None),
        archived_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(payload.items.len());
    for line in &payload.items {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            product_name: Set(line.product_name.clone()),
            product_price: Set(line.product_price),
            quantity: Set(line.quantity),
            subtotal: Set(line.subtotal),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(item);

        if let Err(err) = take_stock(&txn, line.product_id, line.quantity, &line.product_name).await
        {
            tracing::warn!(
                product_id = %line.product_id,
                error = %err,
                "could not update stock for direct order line"
            );
        }
    }

    tracking_service::create_tracking(&txn, order.id, &order.order_number, user.customer_id)
        .await?;

    txn.commit().await?;

    Ok(ApiResponse::created(
        "Order created",
        OrderResponse::from_entity(order, items),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderResponse>> {
    let order = find_scoped(state, OrderCol::Id.eq(id), user).await?;
    let items = load_items(state, order.id).await?;
    Ok(ApiResponse::success(
        "Order retrieved",
        OrderResponse::from_entity(order, items),
    ))
}

pub async fn get_order_by_number(
    state: &AppState,
    user: &AuthUser,
    order_number: &str,
) -> AppResult<ApiResponse<OrderResponse>> {
    let order = find_scoped(state, OrderCol::OrderNumber.eq(order_number), user).await?;
    let items = load_items(state, order.id).await?;
    Ok(ApiResponse::success(
        "Order retrieved",
        OrderResponse::from_entity(order, items),
    ))
}

/// Admin status mutation. All transition legality lives in
/// `OrderStatus::can_transition_to`; this is the only path that moves an
/// order's status.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderResponse>> {
    ensure_admin(user)?;

    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    let order = transition(state, order, payload.status, payload.tracking_number, payload.notes)
        .await?;
    let items = load_items(state, order.id).await?;

    Ok(ApiResponse::success(
        "Order status updated",
        OrderResponse::from_entity(order, items),
    ))
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderResponse>> {
    let order = find_scoped(state, OrderCol::Id.eq(id), user).await?;

    if !order.status.is_cancellable() {
        return Err(AppError::InvalidTransition {
            from: order.status,
            to: OrderStatus::Cancelled,
        });
    }

    let order = transition(state, order, OrderStatus::Cancelled, None, None).await?;
    let items = load_items(state, order.id).await?;

    // Stock restoration is best-effort housekeeping; the cancel stands even
    // if a restore fails.
    for item in &items {
        if let Err(err) = restore_stock(&state.orm, item.product_id, item.quantity).await {
            tracing::warn!(
                order_id = %order.id,
                product_id = %item.product_id,
                error = %err,
                "stock restore failed"
            );
        }
    }

    Ok(ApiResponse::success(
        "Order cancelled",
        OrderResponse::from_entity(order, items),
    ))
}

pub async fn archive_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderResponse>> {
    ensure_admin(user)?;

    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Archived);
    active.archived_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let order = active.update(&state.orm).await?;

    let items = load_items(state, order.id).await?;
    Ok(ApiResponse::success(
        "Order archived",
        OrderResponse::from_entity(order, items),
    ))
}

pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    // Pre-fetch for cleanup; a missing order here is tolerated and the final
    // delete decides whether the call 404s.
    if let Some(order) = Orders::find_by_id(id).one(&state.orm).await? {
        let items = load_items(state, order.id).await?;
        for item in &items {
            if let Err(err) = restore_stock(&state.orm, item.product_id, item.quantity).await {
                tracing::warn!(
                    order_id = %order.id,
                    product_id = %item.product_id,
                    error = %err,
                    "stock restore failed"
                );
            }
        }
        if let Err(err) = tracking_service::purge_for_order(&state.orm, order.id).await {
            tracing::warn!(order_id = %order.id, error = %err, "tracking purge failed");
        }
    }

    let result = Orders::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Order"));
    }

    Ok(ApiResponse::success("Order deleted", serde_json::json!({})))
}

pub async fn search_orders(
    state: &AppState,
    query: OrderListQuery,
    customer_scope: Option<Uuid>,
) -> AppResult<ApiResponse<Paginated<OrderResponse>>> {
    let (page, size, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(customer_id) = customer_scope.or(query.customer_id) {
        condition = condition.add(OrderCol::CustomerId.eq(customer_id));
    }
    if let Some(status) = query.status {
        condition = condition.add(OrderCol::Status.eq(status));
    }
    if let Some(order_number) = query.order_number.as_ref().filter(|s| !s.is_empty()) {
        condition =
            condition.add(Expr::col(OrderCol::OrderNumber).ilike(format!("%{order_number}%")));
    }
    if let Some(start_date) = query.start_date {
        condition = condition.add(OrderCol::CreatedAt.gte(start_date));
    }
    if let Some(end_date) = query.end_date {
        condition = condition.add(OrderCol::CreatedAt.lte(end_date));
    }

    let sort_by = query.sort_by.unwrap_or(OrderSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        OrderSortBy::CreatedAt => OrderCol::CreatedAt,
        OrderSortBy::TotalAmount => OrderCol::TotalAmount,
        OrderSortBy::OrderNumber => OrderCol::OrderNumber,
    };

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(size as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let mut items_by_order = load_items_for(state, &orders).await?;
    let items = orders
        .into_iter()
        .map(|order| {
            let order_items = items_by_order.remove(&order.id).unwrap_or_default();
            OrderResponse::from_entity(order, order_items)
        })
        .collect();

    Ok(ApiResponse::success(
        "Orders retrieved",
        Paginated::new(items, total, page, size),
    ))
}

/// Applies a status change through the transition gate, stamps milestone
/// timestamps and emits the mapped tracking event. Order state is
/// authoritative; the tracking append is best-effort telemetry.
async fn transition(
    state: &AppState,
    order: orders::Model,
    next: OrderStatus,
    tracking_number: Option<String>,
    notes: Option<String>,
) -> AppResult<orders::Model> {
    let from = order.status;
    if !from.can_transition_to(next) {
        return Err(AppError::InvalidTransition { from, to: next });
    }

    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.status = Set(next);
    match next {
        OrderStatus::Paid => active.paid_at = Set(Some(now.into())),
        OrderStatus::Shipped => active.shipped_at = Set(Some(now.into())),
        OrderStatus::Delivered => active.delivered_at = Set(Some(now.into())),
        _ => {}
    }
    if tracking_number.is_some() {
        active.tracking_number = Set(tracking_number);
    }
    if notes.is_some() {
        active.notes = Set(notes);
    }
    active.updated_at = Set(now.into());
    let order = active.update(&state.orm).await?;

    if let Some(tracking_status) = next.tracking_status() {
        let description = format!("Order status updated to: {next}");
        if let Err(err) = tracking_service::append_event(
            state,
            order.id,
            tracking_status,
            description,
            None,
            None,
            None,
        )
        .await
        {
            tracing::warn!(order_id = %order.id, error = %err, "tracking update failed");
        }
    }

    Ok(order)
}

/// Conditional decrement that fails closed: the row is only touched while
/// enough stock remains, so concurrent checkouts can never drive it negative.
async fn take_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
    product_name: &str,
) -> AppResult<()> {
    let result = Products::update_many()
        .col_expr(
            ProdCol::StockQuantity,
            Expr::col(ProdCol::StockQuantity).sub(quantity),
        )
        .col_expr(
            ProdCol::SalesCount,
            Expr::col(ProdCol::SalesCount).add(quantity),
        )
        .filter(
            Condition::all()
                .add(ProdCol::Id.eq(product_id))
                .add(ProdCol::StockQuantity.gte(quantity)),
        )
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::InsufficientStock(product_name.to_string()));
    }
    Ok(())
}

async fn restore_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), sea_orm::DbErr> {
    Products::update_many()
        .col_expr(
            ProdCol::StockQuantity,
            Expr::col(ProdCol::StockQuantity).add(quantity),
        )
        .filter(ProdCol::Id.eq(product_id))
        .exec(conn)
        .await?;
    Ok(())
}

async fn find_scoped(
    state: &AppState,
    key: sea_orm::sea_query::SimpleExpr,
    user: &AuthUser,
) -> AppResult<orders::Model> {
    let mut condition = Condition::all().add(key);
    if !user.is_admin() {
        condition = condition.add(OrderCol::CustomerId.eq(user.customer_id));
    }
    Orders::find()
        .filter(condition)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

async fn load_items(state: &AppState, order_id: Uuid) -> AppResult<Vec<order_items::Model>> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(&state.orm)
        .await?;
    Ok(items)
}

async fn load_items_for(
    state: &AppState,
    orders: &[orders::Model],
) -> AppResult<HashMap<Uuid, Vec<order_items::Model>>> {
    if orders.is_empty() {
        return Ok(HashMap::new());
    }
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(ids))
        .all(&state.orm)
        .await?;

    let mut grouped: HashMap<Uuid, Vec<order_items::Model>> = HashMap::new();
    for item in items {
        grouped.entry(item.order_id).or_default().push(item);
    }
    Ok(grouped)
}
