//! Order payload carried by `order:new` events.
//!
//! The upstream service is loose about types: ids may arrive as numbers,
//! quantities and prices as strings. Deserialization is therefore lenient
//! and falls back to a sane default instead of rejecting the whole order.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

/// How the order will be served.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OrderType {
    #[default]
    DineIn,
    /// Any other service mode (`takeaway`, `delivery`, ...), kept verbatim.
    Other(String),
}

impl OrderType {
    pub fn as_str(&self) -> &str {
        match self {
            OrderType::DineIn => "dine-in",
            OrderType::Other(kind) => kind,
        }
    }
}

impl From<String> for OrderType {
    fn from(value: String) -> Self {
        if value == "dine-in" {
            OrderType::DineIn
        } else {
            OrderType::Other(value)
        }
    }
}

/// A customer order as delivered by the stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "WireOrder")]
pub struct Order {
    pub id: String,
    pub order_type: OrderType,
    pub table_id: String,
    pub items: Vec<LineItem>,
}

/// Order as sent on the wire. The service mode arrives as `orderType`,
/// `type`, or both; `orderType` wins.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOrder {
    #[serde(default, deserialize_with = "lenient_string")]
    id: String,
    #[serde(default, deserialize_with = "order_type")]
    order_type: Option<OrderType>,
    #[serde(default, rename = "type", deserialize_with = "order_type")]
    kind: Option<OrderType>,
    #[serde(default, deserialize_with = "lenient_string")]
    table_id: String,
    #[serde(default, deserialize_with = "line_items")]
    items: Vec<LineItem>,
}

impl From<WireOrder> for Order {
    fn from(wire: WireOrder) -> Self {
        Self {
            id: wire.id,
            order_type: wire.order_type.or(wire.kind).unwrap_or_default(),
            table_id: wire.table_id,
            items: wire.items,
        }
    }
}

/// One ordered product.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "WireLineItem")]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub modifiers: Vec<String>,
}

/// Item as sent on the wire, where `price` and `options` are older names
/// for `unitPrice` and `modifiers`. The newer name wins when both are valid.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireLineItem {
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(default = "default_quantity", deserialize_with = "quantity")]
    quantity: u32,
    #[serde(default, deserialize_with = "unit_price")]
    unit_price: Option<Decimal>,
    #[serde(default, deserialize_with = "unit_price")]
    price: Option<Decimal>,
    #[serde(default, deserialize_with = "modifiers")]
    modifiers: Option<Vec<String>>,
    #[serde(default, deserialize_with = "modifiers")]
    options: Option<Vec<String>>,
}

impl From<WireLineItem> for LineItem {
    fn from(wire: WireLineItem) -> Self {
        Self {
            name: wire.name,
            quantity: wire.quantity,
            unit_price: wire.unit_price.or(wire.price).unwrap_or(Decimal::ZERO),
            modifiers: wire.modifiers.or(wire.options).unwrap_or_default(),
        }
    }
}

impl LineItem {
    /// Creates an item with no modifiers.
    pub fn new(name: impl Into<String>, quantity: u32, unit_price: Decimal) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.max(1),
            unit_price,
            modifiers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_modifiers<I, S>(mut self, modifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modifiers = modifiers.into_iter().map(Into::into).collect();
        self
    }

    /// `unit_price × quantity`, unrounded. Zero if the product does not
    /// fit in a [`Decimal`].
    pub fn subtotal(&self) -> Decimal {
        self.unit_price
            .checked_mul(Decimal::from(self.quantity))
            .unwrap_or_else(|| {
                warn!(
                    item = %self.name,
                    quantity = self.quantity,
                    unit_price = %self.unit_price,
                    "Subtotal overflowed, printing zero"
                );
                Decimal::ZERO
            })
    }
}

fn default_quantity() -> u32 {
    1
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

fn order_type<'de, D>(deserializer: D) -> Result<Option<OrderType>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(OrderType::from(s)),
        _ => None,
    })
}

fn quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(parsed
        .filter(|q| *q > 0)
        .and_then(|q| u32::try_from(q).ok())
        .unwrap_or_else(default_quantity))
}

fn unit_price<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    })
}

fn modifiers<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => Some(
            values
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    })
}

fn line_items<'de, D>(deserializer: D) -> Result<Vec<LineItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values
            .into_iter()
            .filter(Value::is_object)
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(serde::de::Error::custom)?,
        _ => Vec::new(),
    })
}
