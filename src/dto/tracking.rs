use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::{tracking, tracking_events};
use crate::models::TrackingStatus;

#[derive(Debug, Deserialize, ToSchema)]
pub struct TrackingUpdateRequest {
    pub status: TrackingStatus,
    pub description: String,
    pub location: Option<String>,
    pub operator: Option<String>,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackingEventResponse {
    pub status: TrackingStatus,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub location: Option<String>,
    pub operator: Option<String>,
}

impl TrackingEventResponse {
    pub fn from_entity(model: tracking_events::Model) -> Self {
        Self {
            status: model.status,
            timestamp: model.occurred_at.with_timezone(&Utc),
            description: model.description,
            location: model.location,
            operator: model.operator,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackingResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub tracking_number: Option<String>,
    pub current_status: TrackingStatus,
    pub events: Vec<TrackingEventResponse>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub progress_percentage: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackingResponse {
    /// Hydrates the stored record and computes the read-time derived fields.
    pub fn from_entity(model: tracking::Model, events: Vec<tracking_events::Model>) -> Self {
        let created_at = model.created_at.with_timezone(&Utc);
        let estimated_delivery = model.current_status.estimated_delivery(created_at);
        let progress_percentage = model.current_status.progress_percentage();
        Self {
            id: model.id,
            order_id: model.order_id,
            order_number: model.order_number,
            customer_id: model.customer_id,
            tracking_number: model.tracking_number,
            current_status: model.current_status,
            events: events
                .into_iter()
                .map(TrackingEventResponse::from_entity)
                .collect(),
            estimated_delivery,
            progress_percentage,
            created_at,
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackingSummaryResponse {
    pub order_number: String,
    pub current_status: TrackingStatus,
    pub last_update: DateTime<Utc>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub progress_percentage: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryEstimateResponse {
    pub estimated_days: i64,
    pub estimated_delivery_date: DateTime<Utc>,
    pub shipping_method: String,
}
