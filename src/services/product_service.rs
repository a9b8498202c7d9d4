use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    dto::products::{CategoryCount, CreateProductRequest, ProductResponse, UpdateProductRequest},
    entity::products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Paginated},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub async fn search_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<Paginated<ProductResponse>>> {
    let (page, size, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(keyword) = query.keyword.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", keyword);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(ProdCol::Name).ilike(pattern.clone()))
                .add(Expr::col(ProdCol::Description).ilike(pattern)),
        );
    }
    if let Some(category) = query.category.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(ProdCol::Category.eq(category.clone()));
    }
    if let Some(brand) = query.brand.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(ProdCol::Brand.eq(brand.clone()));
    }
    if let Some(min_price) = query.min_price {
        condition = condition.add(ProdCol::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(ProdCol::Price.lte(max_price));
    }
    if query.in_stock_only {
        condition = condition
            .add(ProdCol::StockQuantity.gt(0))
            .add(ProdCol::IsAvailable.eq(true));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::Name => ProdCol::Name,
        ProductSortBy::Price => ProdCol::Price,
        ProductSortBy::CreatedAt => ProdCol::CreatedAt,
        ProductSortBy::SalesCount => ProdCol::SalesCount,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

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
        "Products retrieved",
        Paginated::new(items, total, page, size),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductResponse>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    // View counting is telemetry; a failed increment never fails the read.
    let bump = Products::update_many()
        .col_expr(ProdCol::ViewsCount, Expr::col(ProdCol::ViewsCount).add(1))
        .filter(ProdCol::Id.eq(id))
        .exec(&state.orm)
        .await;
    if let Err(err) = bump {
        tracing::warn!(product_id = %id, error = %err, "view count update failed");
    }

    Ok(ApiResponse::success(
        "Product retrieved",
        ProductResponse::from_entity(product),
    ))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<ProductResponse>> {
    ensure_admin(user)?;
    validate_name(&payload.name)?;
    validate_price(payload.price)?;
    validate_stock(payload.stock_quantity)?;

    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        description: Set(payload.description),
        price: Set(payload.price),
        category: Set(payload.category),
        brand: Set(payload.brand),
        model: Set(payload.model),
        specifications: Set(payload.specifications),
        images: Set(payload.images),
        stock_quantity: Set(payload.stock_quantity),
        is_available: Set(payload.is_available),
        views_count: Set(0),
        sales_count: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::created(
        "Product created",
        ProductResponse::from_entity(product),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<ProductResponse>> {
    ensure_admin(user)?;
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let mut active: ProductActive = existing.into();
    if let Some(name) = payload.name {
        validate_name(&name)?;
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(price) = payload.price {
        validate_price(price)?;
        active.price = Set(price);
    }
    if let Some(category) = payload.category {
        active.category = Set(category);
    }
    if payload.brand.is_some() {
        active.brand = Set(payload.brand);
    }
    if payload.model.is_some() {
        active.model = Set(payload.model);
    }
    if let Some(specifications) = payload.specifications {
        active.specifications = Set(specifications);
    }
    if let Some(images) = payload.images {
        active.images = Set(images);
    }
    if let Some(stock_quantity) = payload.stock_quantity {
        validate_stock(stock_quantity)?;
        active.stock_quantity = Set(stock_quantity);
    }
    if let Some(is_available) = payload.is_available {
        active.is_available = Set(is_available);
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Product updated",
        ProductResponse::from_entity(product),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::not_found("Product"));
    }

    Ok(ApiResponse::success("Product deleted", serde_json::json!({})))
}

#[derive(Debug, FromQueryResult)]
struct FacetRow {
    name: String,
    count: i64,
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<Vec<CategoryCount>>> {
    let rows = Products::find()
        .select_only()
        .column_as(ProdCol::Category, "name")
        .column_as(ProdCol::Id.count(), "count")
        .filter(ProdCol::IsAvailable.eq(true))
        .group_by(ProdCol::Category)
        .order_by_asc(ProdCol::Category)
        .into_model::<FacetRow>()
        .all(&state.orm)
        .await?;

    let data = rows
        .into_iter()
        .map(|row| CategoryCount {
            name: row.name,
            count: row.count,
        })
        .collect();

    Ok(ApiResponse::success("Categories retrieved", data))
}

pub async fn list_brands(state: &AppState) -> AppResult<ApiResponse<Vec<CategoryCount>>> {
    let rows = Products::find()
        .select_only()
        .column_as(ProdCol::Brand, "name")
        .column_as(ProdCol::Id.count(), "count")
        .filter(ProdCol::Brand.is_not_null())
        .filter(ProdCol::IsAvailable.eq(true))
        .group_by(ProdCol::Brand)
        .order_by_asc(ProdCol::Brand)
        .into_model::<FacetRow>()
        .all(&state.orm)
        .await?;

    let data = rows
        .into_iter()
        .map(|row| CategoryCount {
            name: row.name,
            count: row.count,
        })
        .collect();

    Ok(ApiResponse::success("Brands retrieved", data))
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.len() < 2 {
        return Err(AppError::Validation(
            "Product name must be at least 2 characters long".into(),
        ));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> Result<(), AppError> {
    if price <= Decimal::ZERO {
        return Err(AppError::Validation(
            "Product price must be greater than 0".into(),
        ));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> Result<(), AppError> {
    if stock < 0 {
        return Err(AppError::Validation(
            "Stock quantity cannot be negative".into(),
        ));
    }
    Ok(())
}
