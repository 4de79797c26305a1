//! Wire models for the order event stream.
//!
//! Each text frame carries one JSON envelope of the form
//! `{ "type": string, "data": {...} }`. Only `order:new` is acted on.

pub mod order;

use serde::Deserialize;

pub use order::{LineItem, Order, OrderType};

/// Envelope type of a newly placed order.
pub const NEW_ORDER: &str = "order:new";

/// Raw event envelope as received from the stream.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A parsed stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    /// A new order to send to the kitchen.
    NewOrder(Order),
    /// Any other event type; carried only for logging.
    Other(String),
}

impl OrderEvent {
    /// Parses a text frame into an event.
    ///
    /// # Errors
    ///
    /// Returns [`KitchenLinkError::Json`](crate::KitchenLinkError::Json) if
    /// the frame is not a JSON envelope, or if an `order:new` envelope
    /// carries a `data` field that is not an order object.
    pub fn parse(text: &str) -> crate::Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)?;

        if envelope.kind != NEW_ORDER {
            return Ok(OrderEvent::Other(envelope.kind));
        }

        let order: Order = serde_json::from_value(envelope.data)?;
        Ok(OrderEvent::NewOrder(order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_new_order() {
        let text = r#"{"type":"order:new","data":{"id":"abc123de","tableId":"t-0007","items":[]}}"#;

        match OrderEvent::parse(text).unwrap() {
            OrderEvent::NewOrder(order) => {
                assert_eq!(order.id, "abc123de");
                assert_eq!(order.table_id, "t-0007");
            }
            other => panic!("expected new order, got {other:?}"),
        }
    }

    #[test]
    fn other_types_are_not_errors() {
        let text = r#"{"type":"order:updated","data":{"id":"1"}}"#;
        assert_eq!(
            OrderEvent::parse(text).unwrap(),
            OrderEvent::Other("order:updated".to_string())
        );

        let text = r#"{"type":"heartbeat"}"#;
        assert_eq!(
            OrderEvent::parse(text).unwrap(),
            OrderEvent::Other("heartbeat".to_string())
        );
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(OrderEvent::parse("not json").is_err());
        assert!(OrderEvent::parse(r#"{"data":{}}"#).is_err());
        assert!(OrderEvent::parse(r#"{"type":"order:new","data":"oops"}"#).is_err());
        assert!(OrderEvent::parse(r#"{"type":"order:new"}"#).is_err());
    }

    #[test]
    fn accepts_both_service_mode_keys() {
        let text = r#"{"type":"order:new","data":{"id":"a","type":"takeaway","orderType":"takeaway","items":[]}}"#;

        match OrderEvent::parse(text).unwrap() {
            OrderEvent::NewOrder(order) => {
                assert_eq!(order.order_type, OrderType::Other("takeaway".to_string()));
            }
            other => panic!("expected new order, got {other:?}"),
        }
    }
}
