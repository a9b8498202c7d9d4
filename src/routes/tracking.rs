use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::tracking::{
        DeliveryEstimateResponse, TrackingResponse, TrackingSummaryResponse, TrackingUpdateRequest,
    },
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Paginated},
    routes::params::TrackingQuery,
    services::tracking_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(search_tracking))
        .route("/admin/all", get(admin_search_tracking))
        .route("/summary", get(tracking_summary))
        .route("/order/{order_id}", get(get_by_order).put(update_tracking))
        .route("/number/{order_number}", get(get_by_order_number))
        .route("/tracking/{tracking_number}", get(get_by_tracking_number))
        .route("/estimate/{order_number}", get(delivery_estimate))
}

#[utoipa::path(
    get,
    path = "/api/tracking/order/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Tracking with event history and derived fields", body = ApiResponse<TrackingResponse>),
        (status = 404, description = "Tracking record not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Tracking"
)]
pub async fn get_by_order(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<TrackingResponse>>> {
    let resp = tracking_service::get_by_order_id(&state, order_id).await?;
    Ok(Json(resp))
}

// Public lookup so a recipient can follow a shipment without an account.
#[utoipa::path(
    get,
    path = "/api/tracking/number/{order_number}",
    params(("order_number" = String, Path, description = "Order number")),
    responses(
        (status = 200, description = "Tracking by order number", body = ApiResponse<TrackingResponse>),
        (status = 404, description = "Tracking record not found"),
    ),
    tag = "Tracking"
)]
pub async fn get_by_order_number(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> AppResult<Json<ApiResponse<TrackingResponse>>> {
    let resp = tracking_service::get_by_order_number(&state, &order_number).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/tracking/tracking/{tracking_number}",
    params(("tracking_number" = String, Path, description = "Carrier tracking number")),
    responses(
        (status = 200, description = "Tracking by carrier tracking number", body = ApiResponse<TrackingResponse>),
        (status = 404, description = "Tracking record not found"),
    ),
    tag = "Tracking"
)]
pub async fn get_by_tracking_number(
    State(state): State<AppState>,
    Path(tracking_number): Path<String>,
) -> AppResult<Json<ApiResponse<TrackingResponse>>> {
    let resp = tracking_service::get_by_tracking_number(&state, &tracking_number).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/tracking/summary",
    responses(
        (status = 200, description = "Per-order progress summary for the caller", body = ApiResponse<Vec<TrackingSummaryResponse>>),
    ),
    security(("bearer_auth" = [])),
    tag = "Tracking"
)]
pub async fn tracking_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Vec<TrackingSummaryResponse>>>> {
    let resp = tracking_service::tracking_summary(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/tracking",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("size" = Option<i64>, Query, description = "Items per page, default 20"),
        ("order_number" = Option<String>, Query, description = "Order number substring"),
        ("tracking_number" = Option<String>, Query, description = "Carrier tracking number"),
        ("status" = Option<String>, Query, description = "Filter by tracking status"),
    ),
    responses(
        (status = 200, description = "Caller's tracking records", body = ApiResponse<Paginated<TrackingResponse>>),
    ),
    security(("bearer_auth" = [])),
    tag = "Tracking"
)]
pub async fn search_tracking(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<TrackingQuery>,
) -> AppResult<Json<ApiResponse<Paginated<TrackingResponse>>>> {
    let resp = tracking_service::search_tracking(&state, query, Some(user.customer_id)).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/tracking/admin/all",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("size" = Option<i64>, Query, description = "Items per page, default 20"),
        ("customer_id" = Option<Uuid>, Query, description = "Filter by customer"),
        ("order_number" = Option<String>, Query, description = "Order number substring"),
        ("status" = Option<String>, Query, description = "Filter by tracking status"),
    ),
    responses(
        (status = 200, description = "All tracking records", body = ApiResponse<Paginated<TrackingResponse>>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Tracking"
)]
pub async fn admin_search_tracking(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<TrackingQuery>,
) -> AppResult<Json<ApiResponse<Paginated<TrackingResponse>>>> {
    ensure_admin(&user)?;
    let resp = tracking_service::search_tracking(&state, query, None).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/tracking/estimate/{order_number}",
    params(("order_number" = String, Path, description = "Order number")),
    responses(
        (status = 200, description = "Delivery estimate", body = ApiResponse<DeliveryEstimateResponse>),
        (status = 404, description = "Tracking record not found"),
    ),
    tag = "Tracking"
)]
pub async fn delivery_estimate(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> AppResult<Json<ApiResponse<DeliveryEstimateResponse>>> {
    let resp = tracking_service::delivery_estimate(&state, &order_number).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/tracking/order/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    request_body = TrackingUpdateRequest,
    responses(
        (status = 200, description = "Event appended", body = ApiResponse<TrackingResponse>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Tracking record not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Tracking"
)]
pub async fn update_tracking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<TrackingUpdateRequest>,
) -> AppResult<Json<ApiResponse<TrackingResponse>>> {
    ensure_admin(&user)?;
    let resp = tracking_service::append_event(
        &state,
        order_id,
        payload.status,
        payload.description,
        payload.location,
        payload.operator,
        payload.tracking_number,
    )
    .await?;
    Ok(Json(resp))
}
