//! Turning a client-side cart into priced order lines.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ProductStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("order total is too large")]
    TotalOverflow,
}

/// One cart entry as posted by the storefront.
#[derive(Debug, Clone, Deserialize)]
pub struct CartLine {
    pub product_id: i64,
    /// Lenient: missing, zero, negative, or non-numeric quantities become 1.
    #[serde(default)]
    pub quantity: Option<serde_json::Value>,
}

/// The bits of a product that pricing needs.
#[derive(Debug, Clone, Copy)]
pub struct PriceQuote {
    pub product_id: i64,
    pub price: i64,
    pub status: ProductStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub product_id: i64,
    pub quantity: i64,
    pub price_at_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub total_amount: i64,
}

impl PricedOrder {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Normalise a posted quantity: integers and integer strings are accepted,
/// anything else (or anything below one) counts as a single unit.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn normalize_quantity(raw: Option<&serde_json::Value>) -> i64 {
    let parsed = match raw {
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(serde_json::Value::String(s)) => parse_leading_int(s),
        _ => None,
    };
    parsed.unwrap_or(1).max(1)
}

/// Parse the integer prefix of a form value: `"5 pcs"` is 5, `"12.9"` is 12.
#[must_use]
pub fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Price a cart against current product data.
///
/// Lines whose product is unknown (`lookup` returns `None`) or no longer
/// `Available` are dropped silently. Prices are captured at call time.
///
/// # Errors
///
/// Returns [`CheckoutError::TotalOverflow`] when a line subtotal or the
/// order total does not fit in an `i64`.
pub fn price_cart<F>(lines: &[CartLine], mut lookup: F) -> Result<PricedOrder, CheckoutError>
where
    F: FnMut(i64) -> Option<PriceQuote>,
{
    let mut order = PricedOrder::default();
    for line in lines {
        let Some(quote) = lookup(line.product_id) else {
            continue;
        };
        if quote.status != ProductStatus::Available {
            continue;
        }
        let quantity = normalize_quantity(line.quantity.as_ref());
        order.total_amount = quote
            .price
            .checked_mul(quantity)
            .and_then(|subtotal| order.total_amount.checked_add(subtotal))
            .ok_or(CheckoutError::TotalOverflow)?;
        order.lines.push(PricedLine {
            product_id: quote.product_id,
            quantity,
            price_at_time: quote.price,
        });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    fn line(product_id: i64, quantity: serde_json::Value) -> CartLine {
        CartLine {
            product_id,
            quantity: Some(quantity),
        }
    }

    fn catalog() -> HashMap<i64, PriceQuote> {
        [
            (1, 450, ProductStatus::Available),
            (2, 1200, ProductStatus::Sold),
            (3, 300, ProductStatus::Available),
        ]
        .into_iter()
        .map(|(id, price, status)| {
            (
                id,
                PriceQuote {
                    product_id: id,
                    price,
                    status,
                },
            )
        })
        .collect()
    }

    #[test]
    fn quantity_normalisation() {
        assert_eq!(normalize_quantity(None), 1);
        assert_eq!(normalize_quantity(Some(&json!(3))), 3);
        assert_eq!(normalize_quantity(Some(&json!(0))), 1);
        assert_eq!(normalize_quantity(Some(&json!(-4))), 1);
        assert_eq!(normalize_quantity(Some(&json!("2"))), 2);
        assert_eq!(normalize_quantity(Some(&json!("5 pcs"))), 5);
        assert_eq!(normalize_quantity(Some(&json!("many"))), 1);
        assert_eq!(normalize_quantity(Some(&json!(2.9))), 2);
        assert_eq!(normalize_quantity(Some(&json!(null))), 1);
    }

    #[test]
    fn sold_and_missing_products_are_skipped() {
        let products = catalog();
        let cart = vec![line(1, json!(2)), line(2, json!(1)), line(99, json!(1))];
        let priced = price_cart(&cart, |id| products.get(&id).copied()).expect("price");
        assert_eq!(
            priced.lines,
            vec![PricedLine {
                product_id: 1,
                quantity: 2,
                price_at_time: 450
            }]
        );
        assert_eq!(priced.total_amount, 900);
    }

    #[test]
    fn total_sums_every_available_line() {
        let products = catalog();
        let cart = vec![line(1, json!(1)), line(3, json!("3"))];
        let priced = price_cart(&cart, |id| products.get(&id).copied()).expect("price");
        assert_eq!(priced.total_amount, 450 + 900);
        assert_eq!(priced.lines.len(), 2);
    }

    #[test]
    fn cart_of_unavailable_items_prices_to_empty() {
        let products = catalog();
        let priced =
            price_cart(&[line(2, json!(1))], |id| products.get(&id).copied()).expect("price");
        assert!(priced.is_empty());
        assert_eq!(priced.total_amount, 0);
    }

    #[test]
    fn oversized_quantities_are_rejected_not_wrapped() {
        let products = catalog();
        let cart = vec![line(1, json!(i64::MAX)), line(1, json!(i64::MAX))];
        assert_eq!(
            price_cart(&cart, |id| products.get(&id).copied()),
            Err(CheckoutError::TotalOverflow)
        );

        // A single line whose subtotal fits still prices.
        let big = i64::MAX / 450;
        let priced = price_cart(&[line(1, json!(big))], |id| products.get(&id).copied())
            .expect("price");
        assert_eq!(priced.total_amount, big * 450);
    }
}
