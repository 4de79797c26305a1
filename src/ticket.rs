//! Ticket rendering: orders in, ESC/POS bytes out.
//!
//! Every encoder is a pure function of its arguments. The print time is
//! passed in by the caller so identical inputs always produce identical
//! bytes.

use std::sync::Arc;

use chrono::{NaiveDateTime, NaiveTime};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::escpos::EscPosBuilder;
use crate::models::{LineItem, Order, OrderType};

/// Indent in front of each item subtotal on a bill.
const SUBTOTAL_INDENT: usize = 20;

/// Number of characters of an id or table id printed on tickets.
const SHORT_ID_LEN: usize = 4;

/// An encoded, ready-to-send print job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketDocument {
    bytes: Arc<[u8]>,
}

impl TicketDocument {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<EscPosBuilder> for TicketDocument {
    fn from(builder: EscPosBuilder) -> Self {
        Self {
            bytes: builder.build().into(),
        }
    }
}

impl AsRef<[u8]> for TicketDocument {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Renders the ticket sent to the kitchen when an order arrives.
pub fn encode_kitchen_ticket(order: &Order, printed_at: NaiveTime) -> TicketDocument {
    let mut b = EscPosBuilder::new();

    b.reset().center().double_size();
    b.line(&header_line(order));
    b.normal_size();
    b.bold().line(&destination_line(order)).bold_off();
    b.rule_double();
    b.left();
    b.line(&format!("Time: {}", printed_at.format("%H:%M:%S")));
    b.rule_single();

    for item in &order.items {
        item_block(&mut b, item);
    }

    b.rule_double();
    b.feed(3);
    b.cut_partial();

    b.into()
}

/// Renders a customer bill with per-item subtotals and the given total.
///
/// `total` is printed verbatim; it is not recomputed from the items.
pub fn encode_bill_receipt(order: &Order, total: &str, printed_at: NaiveTime) -> TicketDocument {
    let mut b = EscPosBuilder::new();

    b.reset().center().double_size();
    b.line("BILL");
    b.normal_size();
    b.line(&header_line(order));
    b.bold().line(&destination_line(order)).bold_off();
    b.rule_double();
    b.left();
    b.line(&format!("Time: {}", printed_at.format("%H:%M:%S")));
    b.rule_single();

    for item in &order.items {
        item_block(&mut b, item);
        b.line(&format!(
            "{}${}",
            " ".repeat(SUBTOTAL_INDENT),
            format_money(item.subtotal())
        ));
    }

    b.rule_single();
    b.bold().line(&format!("TOTAL: ${total}")).bold_off();
    b.rule_double();
    b.center();
    b.line("Thank you for dining with us!");
    b.feed(3);
    b.cut_partial();

    b.into()
}

/// Renders the page printed from the settings screen to verify a printer.
pub fn encode_test_page(host: &str, port: u16, printed_at: NaiveDateTime) -> TicketDocument {
    let mut b = EscPosBuilder::new();

    b.reset().center().double_size();
    b.line("TEST PRINT");
    b.normal_size();
    b.rule_double();
    b.left();
    b.line(&format!("Printer IP: {host}:{port}"));
    b.line(&format!("Time: {}", printed_at.format("%Y-%m-%d %H:%M:%S")));
    b.rule_double();
    b.center();
    b.line("Kitchen Link");
    b.feed(3);
    b.cut_partial();

    b.into()
}

/// `ORDER #` followed by the last four characters of the id, uppercased.
pub fn header_line(order: &Order) -> String {
    format!("ORDER #{}", last_chars(&order.id, SHORT_ID_LEN).to_uppercase())
}

/// `TABLE xxxx` for dine-in orders, otherwise the uppercased order type.
pub fn destination_line(order: &Order) -> String {
    match &order.order_type {
        OrderType::DineIn => format!("TABLE {}", last_chars(&order.table_id, SHORT_ID_LEN)),
        OrderType::Other(kind) => kind.to_uppercase(),
    }
}

/// Formats an amount with exactly two decimals, rounding half away from zero.
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}

fn item_block(b: &mut EscPosBuilder, item: &LineItem) {
    b.bold()
        .line(&format!("{}x {}", item.quantity, item.name))
        .bold_off();
    for modifier in &item.modifiers {
        b.line(&format!("   - {modifier}"));
    }
}

fn last_chars(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    match s.char_indices().nth(count - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn last_chars_handles_short_and_multibyte_input() {
        assert_eq!(last_chars("abc123de", 4), "23de");
        assert_eq!(last_chars("ab", 4), "ab");
        assert_eq!(last_chars("", 4), "");
        assert_eq!(last_chars("xxäöüß", 4), "äöüß");
    }

    #[test]
    fn money_rounds_half_up() {
        assert_eq!(format_money(dec!(19)), "19.00");
        assert_eq!(format_money(dec!(2.345)), "2.35");
        assert_eq!(format_money(dec!(2.344)), "2.34");
        assert_eq!(format_money(dec!(0.005)), "0.01");
        assert_eq!(format_money(Decimal::ZERO), "0.00");
    }

    #[test]
    fn takeaway_destination_is_uppercased_type() {
        let order = Order {
            id: "x".to_string(),
            order_type: OrderType::Other("takeaway".to_string()),
            table_id: "t-1".to_string(),
            items: vec![],
        };
        assert_eq!(destination_line(&order), "TAKEAWAY");
        assert_eq!(header_line(&order), "ORDER #X");
    }
}
