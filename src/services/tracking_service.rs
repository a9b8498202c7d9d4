use std::collections::HashMap;

use chrono::{Duration, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    dto::tracking::{DeliveryEstimateResponse, TrackingResponse, TrackingSummaryResponse},
    entity::{
        tracking::{self, ActiveModel as TrackingActive, Column as TrackCol, Entity as Tracking},
        tracking_events::{
            self, ActiveModel as EventActive, Column as EventCol, Entity as TrackingEvents,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::TrackingStatus,
    response::{ApiResponse, Paginated},
    routes::params::TrackingQuery,
    state::AppState,
};

/// Creates the tracking record paired with a new order, seeded with its
/// `order_created` event. Runs on the order-creation transaction, so a failure
/// here aborts the order as well.
pub async fn create_tracking<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    order_number: &str,
    customer_id: Uuid,
) -> Result<tracking::Model, sea_orm::DbErr> {
    let record = TrackingActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        order_number: Set(order_number.to_string()),
        customer_id: Set(customer_id),
        tracking_number: Set(None),
        current_status: Set(TrackingStatus::OrderCreated),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(conn)
    .await?;

    EventActive {
        id: NotSet,
        tracking_id: Set(record.id),
        status: Set(TrackingStatus::OrderCreated),
        description: Set("Order created".to_string()),
        location: Set(Some("Online store".to_string())),
        operator: Set(None),
        occurred_at: NotSet,
    }
    .insert(conn)
    .await?;

    Ok(record)
}

/// Appends an event and moves `current_status` to it. The event log is
/// monotonic in time only; repeated or out-of-order statuses are accepted.
pub async fn append_event(
    state: &AppState,
    order_id: Uuid,
    status: TrackingStatus,
    description: String,
    location: Option<String>,
    operator: Option<String>,
    tracking_number: Option<String>,
) -> AppResult<ApiResponse<TrackingResponse>> {
    let record = Tracking::find()
        .filter(TrackCol::OrderId.eq(order_id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Tracking record"))?;

    EventActive {
        id: NotSet,
        tracking_id: Set(record.id),
        status: Set(status),
        description: Set(description),
        location: Set(location),
        operator: Set(operator),
        occurred_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let mut active: TrackingActive = record.into();
    active.current_status = Set(status);
    if tracking_number.is_some() {
        active.tracking_number = Set(tracking_number);
    }
    active.updated_at = Set(Utc::now().into());
    let record = active.update(&state.orm).await?;

    let events = load_events(state, record.id).await?;
    Ok(ApiResponse::success(
        "Tracking status updated",
        TrackingResponse::from_entity(record, events),
    ))
}

pub async fn get_by_order_id(
    state: &AppState,
    order_id: Uuid,
) -> AppResult<ApiResponse<TrackingResponse>> {
    let record = Tracking::find()
        .filter(TrackCol::OrderId.eq(order_id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Tracking record"))?;

    let events = load_events(state, record.id).await?;
    Ok(ApiResponse::success(
        "Tracking information retrieved",
        TrackingResponse::from_entity(record, events),
    ))
}

pub async fn get_by_order_number(
    state: &AppState,
    order_number: &str,
) -> AppResult<ApiResponse<TrackingResponse>> {
    let record = find_by_order_number(state, order_number).await?;
    let events = load_events(state, record.id).await?;
    Ok(ApiResponse::success(
        "Tracking information retrieved",
        TrackingResponse::from_entity(record, events),
    ))
}

pub async fn get_by_tracking_number(
    state: &AppState,
    tracking_number: &str,
) -> AppResult<ApiResponse<TrackingResponse>> {
    let record = Tracking::find()
        .filter(TrackCol::TrackingNumber.eq(tracking_number))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Tracking record"))?;

    let events = load_events(state, record.id).await?;
    Ok(ApiResponse::success(
        "Tracking information retrieved",
        TrackingResponse::from_entity(record, events),
    ))
}

pub async fn search_tracking(
    state: &AppState,
    query: TrackingQuery,
    customer_scope: Option<Uuid>,
) -> AppResult<ApiResponse<Paginated<TrackingResponse>>> {
    let (page, size, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(customer_id) = customer_scope.or(query.customer_id) {
        condition = condition.add(TrackCol::CustomerId.eq(customer_id));
    }
    if let Some(order_number) = query.order_number.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(Expr::col(TrackCol::OrderNumber).ilike(format!("%{order_number}%")));
    }
    if let Some(tracking_number) = query.tracking_number.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(TrackCol::TrackingNumber.eq(tracking_number.clone()));
    }
    if let Some(status) = query.status {
        condition = condition.add(TrackCol::CurrentStatus.eq(status));
    }

    let finder = Tracking::find()
        .filter(condition)
        .order_by_desc(TrackCol::UpdatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let records = finder
        .limit(size as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let mut events_by_record = load_events_for(state, &records).await?;
    let items = records
        .into_iter()
        .map(|record| {
            let events = events_by_record.remove(&record.id).unwrap_or_default();
            TrackingResponse::from_entity(record, events)
        })
        .collect();

    Ok(ApiResponse::success(
        "Tracking records retrieved",
        Paginated::new(items, total, page, size),
    ))
}

pub async fn tracking_summary(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<Vec<TrackingSummaryResponse>>> {
    let records = Tracking::find()
        .filter(TrackCol::CustomerId.eq(user.customer_id))
        .order_by_desc(TrackCol::UpdatedAt)
        .all(&state.orm)
        .await?;

    let summaries = records
        .into_iter()
        .map(|record| {
            let created_at = record.created_at.with_timezone(&Utc);
            TrackingSummaryResponse {
                order_number: record.order_number,
                current_status: record.current_status,
                last_update: record.updated_at.with_timezone(&Utc),
                estimated_delivery: record.current_status.estimated_delivery(created_at),
                progress_percentage: record.current_status.progress_percentage(),
            }
        })
        .collect();

    Ok(ApiResponse::success("Tracking summary retrieved", summaries))
}

/// Presentational estimate quoted from the current status; the method label
/// reflects the remaining window, not an actual carrier service.
pub async fn delivery_estimate(
    state: &AppState,
    order_number: &str,
) -> AppResult<ApiResponse<DeliveryEstimateResponse>> {
    let record = find_by_order_number(state, order_number).await?;

    let days = record.current_status.estimate_days();
    let estimated_delivery_date = Utc::now() + Duration::hours((days * 24.0) as i64);
    let shipping_method = if days <= 1.0 {
        "expedited"
    } else if days <= 3.0 {
        "fast"
    } else {
        "standard"
    };

    Ok(ApiResponse::success(
        "Delivery estimate retrieved",
        DeliveryEstimateResponse {
            estimated_days: days as i64,
            estimated_delivery_date,
            shipping_method: shipping_method.to_string(),
        },
    ))
}

pub async fn purge_for_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<(), sea_orm::DbErr> {
    let record = Tracking::find()
        .filter(TrackCol::OrderId.eq(order_id))
        .one(conn)
        .await?;
    if let Some(record) = record {
        TrackingEvents::delete_many()
            .filter(EventCol::TrackingId.eq(record.id))
            .exec(conn)
            .await?;
        Tracking::delete_by_id(record.id).exec(conn).await?;
    }
    Ok(())
}

async fn find_by_order_number(
    state: &AppState,
    order_number: &str,
) -> AppResult<tracking::Model> {
    Tracking::find()
        .filter(TrackCol::OrderNumber.eq(order_number))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Tracking record"))
}

async fn load_events(state: &AppState, tracking_id: Uuid) -> AppResult<Vec<tracking_events::Model>> {
    let events = TrackingEvents::find()
        .filter(EventCol::TrackingId.eq(tracking_id))
        .order_by_asc(EventCol::Id)
        .all(&state.orm)
        .await?;
    Ok(events)
}

async fn load_events_for(
    state: &AppState,
    records: &[tracking::Model],
) -> AppResult<HashMap<Uuid, Vec<tracking_events::Model>>> {
    if records.is_empty() {
        return Ok(HashMap::new());
    }
    let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
    let events = TrackingEvents::find()
        .filter(EventCol::TrackingId.is_in(ids))
        .order_by_asc(EventCol::Id)
        .all(&state.orm)
        .await?;

    let mut grouped: HashMap<Uuid, Vec<tracking_events::Model>> = HashMap::new();
    for event in events {
        grouped.entry(event.tracking_id).or_default().push(event);
    }
    Ok(grouped)
}
