//! Order arithmetic. Every amount is a [`Decimal`] kept at two decimal places.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::common::app_error::AppError;

const MONEY_SCALE: u32 = 2;

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Price of `quantity` units at `unit_price`.
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    round_money(unit_price * Decimal::from(quantity))
}

/// Sum of the snapshot prices stored on an order's items.
pub fn order_total<'a, I>(item_prices: I) -> Decimal
where
    I: IntoIterator<Item = &'a Decimal>,
{
    round_money(item_prices.into_iter().copied().sum())
}

/// Largest quantity of one meal an order may hold.
pub const MAX_QUANTITY: i32 = 10_000;

/// Largest amount a `NUMERIC(10, 2)` price or total column holds.
pub fn max_amount() -> Decimal {
    Decimal::new(9_999_999_999, MONEY_SCALE)
}

pub fn validate_quantity(quantity: i32) -> Result<(), AppError> {
    if quantity <= 0 {
        return Err(AppError::BadRequest(format!(
            "Quantity must be positive, got {quantity}"
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "Quantity must not exceed {MAX_QUANTITY}, got {quantity}"
        )));
    }
    Ok(())
}

/// Checks an item's quantity and snapshot price after a change, before it is stored.
pub fn validate_item(quantity: i64, price: Decimal) -> Result<(), AppError> {
    if quantity > i64::from(MAX_QUANTITY) {
        return Err(AppError::BadRequest(format!(
            "Quantity must not exceed {MAX_QUANTITY}, got {quantity}"
        )));
    }
    validate_amount(price)
}

pub fn validate_amount(amount: Decimal) -> Result<(), AppError> {
    let max = max_amount();
    if amount > max {
        return Err(AppError::BadRequest(format!(
            "Amount {amount} exceeds the maximum of {max}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Decrease { quantity: i32, price: Decimal },
    Delete,
}

/// Decides what happens to an item when `remove_qty` units are taken off it.
///
/// The remaining snapshot price keeps the item's average unit price, so an item that was
/// added at different menu prices is reduced proportionally rather than at today's price.
pub fn plan_removal(current_qty: i32, current_price: Decimal, remove_qty: i32) -> Removal {
    let remaining = current_qty - remove_qty;
    if remaining <= 0 || current_qty <= 0 {
        return Removal::Delete;
    }

    let price = round_money(current_price * Decimal::from(remaining) / Decimal::from(current_qty));
    Removal::Decrease {
        quantity: remaining,
        price,
    }
}
