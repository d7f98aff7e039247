//! Invoice amount calculation.
//!
//! All inputs and outputs are integer minor currency units. Intermediate
//! values are exact decimals; conversion back to minor units happens once,
//! on the discount, rounding half away from zero.

use crate::models::InvoiceItem;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// 10,000 basis points of a percent is 100%.
pub const DISCOUNT_SCALE: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceAmounts {
    pub subtotal: i64,
    pub discount_amount: i64,
    pub total: i64,
}

/// Compute subtotal, discount and total for a list of items.
///
/// `discount_bp` outside `[0, DISCOUNT_SCALE]` is clamped into range; callers
/// reject such input before it gets here.
pub fn compute(items: &[InvoiceItem], discount_bp: i64) -> InvoiceAmounts {
    let subtotal = items.iter().fold(Decimal::ZERO, |acc, item| {
        Decimal::from(item.quantity)
            .checked_mul(Decimal::from(item.unit_price))
            .and_then(|line| acc.checked_add(line))
            .unwrap_or(Decimal::MAX)
    });

    let rate = Decimal::from(discount_bp.clamp(0, DISCOUNT_SCALE)) / Decimal::from(DISCOUNT_SCALE);
    let discount = (subtotal * rate).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    let subtotal = subtotal.to_i64().unwrap_or(i64::MAX);
    let discount_amount = discount.to_i64().unwrap_or(0).min(subtotal);

    InvoiceAmounts {
        subtotal,
        discount_amount,
        total: subtotal - discount_amount,
    }
}

/// Whether the subtotal of `items` fits in a signed 64-bit amount.
pub fn fits_in_minor_units(items: &[InvoiceItem]) -> bool {
    items
        .iter()
        .try_fold(0i64, |acc, item| {
            item.quantity
                .checked_mul(item.unit_price)
                .and_then(|line| acc.checked_add(line))
        })
        .is_some()
}
