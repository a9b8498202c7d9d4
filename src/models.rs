use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use sea_orm::sea_query::StringLen;
use sea_orm::{DeriveActiveEnum, EnumIter, FromJsonQueryResult};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const TAX_RATE: Decimal = dec!(0.08);
pub const FREE_SHIPPING_THRESHOLD: Decimal = dec!(100);
pub const FLAT_SHIPPING_FEE: Decimal = dec!(10);

/// Order lifecycle states. `pending → paid → processing → shipped → delivered
/// → completed` with `cancelled`/`refunded` reachable from `pending`/`paid`
/// only. `archived` is an administrative marker set outside the lifecycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "refunded")]
    Refunded,
    #[sea_orm(string_value = "archived")]
    Archived,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Archived => "archived",
        }
    }

    /// Single gate for status mutations. Re-setting the current status is
    /// allowed and overwrites the milestone timestamp.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Paid)
                | (Pending, Cancelled)
                | (Pending, Refunded)
                | (Paid, Processing)
                | (Paid, Cancelled)
                | (Paid, Refunded)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Delivered, Completed)
        )
    }

    pub fn is_cancellable(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Paid)
    }

    /// Tracking event emitted when an order reaches this status. Statuses
    /// outside the map produce no event.
    pub fn tracking_status(self) -> Option<TrackingStatus> {
        match self {
            OrderStatus::Paid => Some(TrackingStatus::PaymentReceived),
            OrderStatus::Processing => Some(TrackingStatus::Processing),
            OrderStatus::Shipped => Some(TrackingStatus::Shipped),
            OrderStatus::Delivered => Some(TrackingStatus::Delivered),
            OrderStatus::Cancelled => Some(TrackingStatus::Cancelled),
            OrderStatus::Refunded => Some(TrackingStatus::Refunded),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shipment-progress states, finer grained than `OrderStatus`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    #[sea_orm(string_value = "order_created")]
    OrderCreated,
    #[sea_orm(string_value = "payment_received")]
    PaymentReceived,
    #[sea_orm(string_value = "order_confirmed")]
    OrderConfirmed,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "packed")]
    Packed,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "in_transit")]
    InTransit,
    #[sea_orm(string_value = "out_for_delivery")]
    OutForDelivery,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "delivery_failed")]
    DeliveryFailed,
    #[sea_orm(string_value = "returned")]
    Returned,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl TrackingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TrackingStatus::OrderCreated => "order_created",
            TrackingStatus::PaymentReceived => "payment_received",
            TrackingStatus::OrderConfirmed => "order_confirmed",
            TrackingStatus::Processing => "processing",
            TrackingStatus::Packed => "packed",
            TrackingStatus::Shipped => "shipped",
            TrackingStatus::InTransit => "in_transit",
            TrackingStatus::OutForDelivery => "out_for_delivery",
            TrackingStatus::Delivered => "delivered",
            TrackingStatus::DeliveryFailed => "delivery_failed",
            TrackingStatus::Returned => "returned",
            TrackingStatus::Cancelled => "cancelled",
            TrackingStatus::Refunded => "refunded",
        }
    }

    /// Remaining time to delivery counted from order creation. `None` once the
    /// shipment reached a terminal state; off-path states fall back to the
    /// 7-day default.
    pub fn delivery_offset(self) -> Option<Duration> {
        match self {
            TrackingStatus::OrderCreated => Some(Duration::days(7)),
            TrackingStatus::PaymentReceived => Some(Duration::days(6)),
            TrackingStatus::OrderConfirmed => Some(Duration::days(5)),
            TrackingStatus::Processing => Some(Duration::days(4)),
            TrackingStatus::Packed => Some(Duration::days(3)),
            TrackingStatus::Shipped => Some(Duration::days(2)),
            TrackingStatus::InTransit => Some(Duration::days(1)),
            TrackingStatus::OutForDelivery => Some(Duration::hours(12)),
            TrackingStatus::Delivered | TrackingStatus::Cancelled | TrackingStatus::Refunded => {
                None
            }
            TrackingStatus::DeliveryFailed | TrackingStatus::Returned => Some(Duration::days(7)),
        }
    }

    pub fn estimated_delivery(self, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.delivery_offset().map(|offset| created_at + offset)
    }

    /// Days-to-delivery used by the estimate endpoint, which quotes 7 days
    /// even for terminal states.
    pub fn estimate_days(self) -> f64 {
        match self.delivery_offset() {
            Some(offset) => offset.num_hours() as f64 / 24.0,
            None => 7.0,
        }
    }

    pub fn progress_percentage(self) -> i32 {
        match self {
            TrackingStatus::OrderCreated => 10,
            TrackingStatus::PaymentReceived => 20,
            TrackingStatus::OrderConfirmed => 30,
            TrackingStatus::Processing => 40,
            TrackingStatus::Packed => 50,
            TrackingStatus::Shipped => 60,
            TrackingStatus::InTransit => 80,
            TrackingStatus::OutForDelivery => 90,
            TrackingStatus::Delivered => 100,
            _ => 0,
        }
    }
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "credit_card")]
    CreditCard,
    #[sea_orm(string_value = "debit_card")]
    DebitCard,
    #[sea_orm(string_value = "paypal")]
    Paypal,
    #[sea_orm(string_value = "wechat_pay")]
    WechatPay,
    #[sea_orm(string_value = "alipay")]
    Alipay,
    #[sea_orm(string_value = "bank_transfer")]
    BankTransfer,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
pub struct ShippingAddress {
    pub recipient_name: String,
    pub phone: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "United States".to_string()
}

#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema,
)]
#[serde(transparent)]
pub struct ImageList(pub Vec<String>);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct SpecMap(pub BTreeMap<String, serde_json::Value>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_fee: Decimal,
    pub total_amount: Decimal,
}

/// Canonical money formulas, shared by the cart summary and the order engine:
/// 8% tax rounded to cents, flat $10 shipping waived from $100 up.
pub fn compute_totals(subtotal: Decimal) -> OrderTotals {
    let tax_amount =
        (subtotal * TAX_RATE).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let shipping_fee = if subtotal >= FREE_SHIPPING_THRESHOLD {
        Decimal::ZERO
    } else {
        FLAT_SHIPPING_FEE
    };
    OrderTotals {
        subtotal,
        tax_amount,
        shipping_fee,
        total_amount: subtotal + tax_amount + shipping_fee,
    }
}

static ORDER_SEQ: OnceLock<AtomicU32> = OnceLock::new();

/// Human-facing order number: `AWE` + YYMMDD + 4 digits. The suffix comes from
/// a randomly seeded process-wide counter, so numbers never repeat within a
/// run; the unique index on `orders.order_number` backstops across runs.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let seq = ORDER_SEQ.get_or_init(|| AtomicU32::new(rand::thread_rng().gen_range(0..10_000)));
    let suffix = seq.fetch_add(1, Ordering::Relaxed) % 10_000;
    format!("AWE{}{suffix:04}", now.format("%y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn totals_under_free_shipping_threshold() {
        // 3 x $10 + 1 x $50
        let totals = compute_totals(dec!(80));
        assert_eq!(totals.subtotal, dec!(80));
        assert_eq!(totals.tax_amount, dec!(6.40));
        assert_eq!(totals.shipping_fee, dec!(10));
        assert_eq!(totals.total_amount, dec!(96.40));
    }

    #[test]
    fn totals_at_free_shipping_threshold() {
        let totals = compute_totals(dec!(100));
        assert_eq!(totals.shipping_fee, Decimal::ZERO);
        assert_eq!(totals.total_amount, dec!(108.00));
    }

    #[test]
    fn totals_are_consistent() {
        for subtotal in [dec!(0.01), dec!(19.99), dec!(99.99), dec!(100), dec!(2499.95)] {
            let t = compute_totals(subtotal);
            assert_eq!(t.total_amount, t.subtotal + t.tax_amount + t.shipping_fee);
            assert!(t.tax_amount >= Decimal::ZERO);
        }
    }

    #[test]
    fn order_number_format() {
        let now = Utc::now();
        let number = generate_order_number(now);
        assert_eq!(number.len(), 13);
        assert!(number.starts_with("AWE"));
        assert!(number[3..].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(&number[3..9], now.format("%y%m%d").to_string().as_str());
    }

    #[test]
    fn order_numbers_unique_across_a_run() {
        let now = Utc::now();
        let numbers: HashSet<String> = (0..1000).map(|_| generate_order_number(now)).collect();
        assert_eq!(numbers.len(), 1000);
    }

    #[test]
    fn happy_path_transitions_are_legal() {
        use OrderStatus::*;
        let path = [Pending, Paid, Processing, Shipped, Delivered, Completed];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn cancel_is_only_legal_from_pending_or_paid() {
        use OrderStatus::*;
        assert!(Pending.is_cancellable());
        assert!(Paid.is_cancellable());
        for status in [Processing, Shipped, Delivered, Completed, Cancelled, Refunded, Archived] {
            assert!(!status.is_cancellable(), "{status}");
            assert!(!status.can_transition_to(Cancelled), "{status}");
        }
    }

    #[test]
    fn terminal_states_admit_no_transitions() {
        use OrderStatus::*;
        for terminal in [Completed, Cancelled, Refunded] {
            for next in [Pending, Paid, Processing, Shipped, Delivered] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn skipping_lifecycle_stages_is_rejected() {
        use OrderStatus::*;
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Paid.can_transition_to(Delivered));
        assert!(!Processing.can_transition_to(Completed));
    }

    #[test]
    fn progress_is_monotonic_along_the_pipeline() {
        use TrackingStatus::*;
        let pipeline = [
            OrderCreated,
            PaymentReceived,
            OrderConfirmed,
            Processing,
            Packed,
            Shipped,
            InTransit,
            OutForDelivery,
            Delivered,
        ];
        let mut last = 0;
        for status in pipeline {
            let progress = status.progress_percentage();
            assert!(progress > last, "{status} fell back to {progress}");
            last = progress;
        }
        assert_eq!(last, 100);
        assert_eq!(TrackingStatus::Cancelled.progress_percentage(), 0);
        assert_eq!(TrackingStatus::Refunded.progress_percentage(), 0);
    }

    #[test]
    fn estimated_delivery_is_none_for_terminal_states() {
        let created = Utc::now();
        for status in [
            TrackingStatus::Delivered,
            TrackingStatus::Cancelled,
            TrackingStatus::Refunded,
        ] {
            assert_eq!(status.estimated_delivery(created), None);
        }
    }

    #[test]
    fn estimated_delivery_is_in_the_future_for_active_states() {
        use TrackingStatus::*;
        let created = Utc::now();
        for status in [
            OrderCreated,
            PaymentReceived,
            OrderConfirmed,
            Processing,
            Packed,
            Shipped,
            InTransit,
            OutForDelivery,
            DeliveryFailed,
            Returned,
        ] {
            let estimate = status.estimated_delivery(created).expect("active estimate");
            assert!(estimate > created, "{status}");
        }
    }

    #[test]
    fn out_for_delivery_estimates_half_a_day() {
        assert_eq!(TrackingStatus::OutForDelivery.estimate_days(), 0.5);
        assert_eq!(TrackingStatus::OrderCreated.estimate_days(), 7.0);
        // terminal states quote the default window
        assert_eq!(TrackingStatus::Delivered.estimate_days(), 7.0);
    }
}
