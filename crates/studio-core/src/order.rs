//! Tailor orders and try-on approvals.
//!
//! Orders are not fulfilled anywhere; they receive an identifier and are kept
//! in an in-memory [`OrderBook`] so they can be looked up again.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::model::TailorForm;

pub const ORDER_PREFIX: &str = "ORD";
pub const APPROVAL_PREFIX: &str = "TRY";
const DELIVERY_DAYS: i64 = 7;

/// `PREFIX-<unix millis>-<6 uppercase alphanumerics>`.
pub fn generate_order_id(prefix: &str) -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect::<String>()
        .to_uppercase();
    format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), suffix)
}

/// Estimated delivery date, `YYYY-MM-DD`.
pub fn estimated_delivery(today: NaiveDate) -> String {
    (today + Duration::days(DELIVERY_DAYS))
        .format("%Y-%m-%d")
        .to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignImages {
    pub front: Option<String>,
    pub back: Option<String>,
}

/// Body of `POST /api/submit-order`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderRequest {
    #[serde(flatten)]
    pub form: TailorForm,
    pub design_images: DesignImages,
    pub try_on_image: Option<String>,
    pub timestamp: Option<String>,
}

impl OrderRequest {
    /// Best-effort typed view of an arbitrary JSON body.
    pub fn from_value_lenient(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!(error = %e, "Order body does not match the expected shape");
            Self::default()
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub success: bool,
    pub order_id: String,
    pub message: String,
}

/// Body of `POST /api/approve-design`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalRequest {
    pub image_url: Option<String>,
    pub person_details: Option<Value>,
    pub clothing_details: Option<Value>,
    pub timestamp: Option<String>,
}

impl ApprovalRequest {
    pub fn from_value_lenient(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    /// A clothing attribute as text, "Unknown" when absent.
    pub fn clothing_attr(&self, key: &str) -> String {
        self.clothing_details
            .as_ref()
            .and_then(|details| details.get(key))
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingInfo {
    pub status: String,
    pub next_update: String,
}

impl Default for TrackingInfo {
    fn default() -> Self {
        Self {
            status: "Processing".to_string(),
            next_update: "24 hours".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    pub success: bool,
    pub order_id: String,
    pub message: String,
    pub estimated_delivery: String,
    pub tracking_info: TrackingInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderKind {
    Tailor,
    Approval,
}

/// A received order as stored in the [`OrderBook`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub order_id: String,
    pub kind: OrderKind,
    pub received_at: DateTime<Utc>,
    pub payload: Value,
}

/// In-memory order store keyed by order id.
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: RwLock<HashMap<String, OrderRecord>>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, kind: OrderKind, payload: Value) -> OrderRecord {
        let prefix = match kind {
            OrderKind::Tailor => ORDER_PREFIX,
            OrderKind::Approval => APPROVAL_PREFIX,
        };
        let record = OrderRecord {
            order_id: generate_order_id(prefix),
            kind,
            received_at: Utc::now(),
            payload,
        };
        match self.orders.write() {
            Ok(mut orders) => {
                orders.insert(record.order_id.clone(), record.clone());
            }
            Err(_) => warn!(order_id = %record.order_id, "Order book poisoned; order not kept"),
        }
        record
    }

    pub fn get(&self, order_id: &str) -> Option<OrderRecord> {
        self.orders.read().ok()?.get(order_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.orders.read().map(|orders| orders.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_order_ids_are_distinct() {
        let a = generate_order_id(ORDER_PREFIX);
        let b = generate_order_id(ORDER_PREFIX);
        assert_ne!(a, b);
        let parts: Vec<&str> = a.split('-').collect();
        assert_eq!(parts[0], "ORD");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[2], parts[2].to_uppercase());
    }

    #[test]
    fn test_delivery_is_a_week_out() {
        let today = NaiveDate::from_ymd_opt(2024, 12, 28).unwrap();
        assert_eq!(estimated_delivery(today), "2025-01-04");
    }

    #[test]
    fn test_lenient_order_parsing() {
        let order = OrderRequest::from_value_lenient(&json!({
            "fullName": "Ada Lovelace",
            "contact": "ada@example.com",
            "bust": "88",
            "designImages": { "front": "front_1" },
            "tryOnImage": "data:image/png;base64,AAAA"
        }));
        assert_eq!(order.form.full_name, "Ada Lovelace");
        assert_eq!(order.design_images.front.as_deref(), Some("front_1"));
        assert!(order.form.is_submittable());

        let odd = OrderRequest::from_value_lenient(&json!({ "bust": 88 }));
        assert_eq!(odd, OrderRequest::default());
    }

    #[test]
    fn test_order_book() {
        let book = OrderBook::new();
        let record = book.record(OrderKind::Approval, json!({ "imageUrl": "x" }));
        assert!(record.order_id.starts_with("TRY-"));
        assert_eq!(book.get(&record.order_id).unwrap().payload["imageUrl"], "x");
        assert_eq!(book.len(), 1);
        assert!(book.get("ORD-0-AAAAAA").is_none());
    }
}
