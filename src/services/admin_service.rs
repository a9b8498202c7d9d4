use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ColumnTrait, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait, ActiveModelTrait,
};
use uuid::Uuid;

use crate::{
    dto::admin::{DashboardStats, InventoryAdjustRequest},
    dto::products::ProductResponse,
    entity::{
        customers::Entity as Customers,
        orders::{Column as OrderCol, Entity as Orders},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::OrderStatus,
    response::{ApiResponse, Paginated},
    routes::params::LowStockQuery,
    state::AppState,
};

#[derive(Debug, FromQueryResult)]
struct RevenueRow {
    total: Option<Decimal>,
}

pub async fn dashboard(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<DashboardStats>> {
    ensure_admin(user)?;

    let total_orders = Orders::find().count(&state.orm).await? as i64;
    let pending_orders = Orders::find()
        .filter(OrderCol::Status.eq(OrderStatus::Pending))
        .count(&state.orm)
        .await? as i64;
    let total_customers = Customers::find().count(&state.orm).await? as i64;
    let total_products = Products::find().count(&state.orm).await? as i64;

    let revenue = Orders::find()
        .select_only()
        .column_as(OrderCol::TotalAmount.sum(), "total")
        .filter(OrderCol::Status.is_not_in([
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ]))
        .into_model::<RevenueRow>()
        .one(&state.orm)
        .await?;

    let stats = DashboardStats {
        total_orders,
        pending_orders,
        total_customers,
        total_products,
        total_revenue: revenue.and_then(|row| row.total).unwrap_or(Decimal::ZERO),
    };

    Ok(ApiResponse::success("Dashboard retrieved", stats))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<Paginated<ProductResponse>>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(5);
    let (page, size, offset) = query.pagination.normalize();

    let finder = Products::find()
        .filter(ProdCol::StockQuantity.lte(threshold))
        .order_by_asc(ProdCol::StockQuantity)
        .order_by_desc(ProdCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(size as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ProductResponse::from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Low stock products retrieved",
        Paginated::new(items, total, page, size),
    ))
}

pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<ProductResponse>> {
    ensure_admin(user)?;
    if payload.delta == 0 {
        return Err(AppError::Validation("Delta must not be 0".into()));
    }

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let new_stock = product.stock_quantity + payload.delta;
    if new_stock < 0 {
        return Err(AppError::Validation("Stock cannot be negative".into()));
    }

    let mut active: ProductActive = product.into();
    active.stock_quantity = Set(new_stock);
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Inventory updated",
        ProductResponse::from_entity(updated),
    ))
}
