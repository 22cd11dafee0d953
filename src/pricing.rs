// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Order pricing.
//!
//! Expands a requested basket of `(item, quantity)` pairs into priced lines
//! and a total. Pricing fails atomically: if any item in the basket is
//! missing or unavailable, the whole basket is rejected and every failing
//! id is reported.

use crate::base::ItemId;
use crate::catalog::PriceSource;
use crate::error::EngineError;
use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Meal tag carried on every order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MealType {
    Breakfast,
    Lunch,
    EveningSnacks,
    Dinner,
    Other,
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MealType::Breakfast => "BREAKFAST",
            MealType::Lunch => "LUNCH",
            MealType::EveningSnacks => "EVENING_SNACKS",
            MealType::Dinner => "DINNER",
            MealType::Other => "OTHER",
        };
        write!(f, "{s}")
    }
}

/// One requested basket line before pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketLine {
    pub item_id: ItemId,
    pub quantity: u32,
}

/// One basket line resolved against the catalog at call time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedLine {
    pub item_id: ItemId,
    pub item_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub subtotal: Decimal,
}

/// A fully priced basket: the input to the atomic booking transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedOrder {
    pub meal_type: MealType,
    pub lines: Vec<PricedLine>,
    pub total: Decimal,
}

/// Prices a basket against the catalog snapshot.
///
/// Prices are read once, in a single [`PriceSource::resolve_prices`] call;
/// later catalog edits do not affect the returned [`PricedOrder`].
///
/// # Errors
///
/// - [`EngineError::InvalidBasket`] for an empty basket, a zero quantity,
///   or any missing/unavailable item (all offending ids listed).
/// - [`EngineError::DependencyUnavailable`] when the catalog backend fails;
///   this aborts pricing and is never swallowed.
pub fn price_basket(
    catalog: &dyn PriceSource,
    meal_type: MealType,
    basket: &[BasketLine],
) -> Result<PricedOrder, EngineError> {
    if basket.is_empty() {
        return Err(EngineError::InvalidBasket {
            reasons: vec!["basket must contain at least one item".into()],
        });
    }

    let ids: Vec<ItemId> = basket.iter().map(|line| line.item_id).collect();
    let quotes = catalog.resolve_prices(&ids)?;

    // Collect every failure before reporting, so the caller sees the whole
    // picture instead of the first bad line.
    let mut reasons = Vec::new();
    for line in basket {
        if line.quantity == 0 {
            reasons.push(format!("item {}: quantity must be positive", line.item_id));
            continue;
        }
        match quotes.get(&line.item_id) {
            None => reasons.push(format!("item {} not on the menu", line.item_id)),
            Some(quote) if !quote.available => {
                reasons.push(format!("item {} ({}) is unavailable", line.item_id, quote.name));
            }
            Some(_) => {}
        }
    }
    if !reasons.is_empty() {
        return Err(EngineError::InvalidBasket { reasons });
    }

    let lines: Vec<PricedLine> = basket
        .iter()
        .map(|line| {
            let quote = &quotes[&line.item_id];
            let subtotal = quote.unit_price * Decimal::from(line.quantity);
            PricedLine {
                item_id: line.item_id,
                item_name: quote.name.clone(),
                unit_price: quote.unit_price,
                quantity: line.quantity,
                subtotal,
            }
        })
        .collect();
    let total = lines.iter().map(|line| line.subtotal).sum();

    Ok(PricedOrder {
        meal_type,
        lines,
        total,
    })
}

/// Length of the random order-number suffix.
const ORDER_SUFFIX_LEN: usize = 6;

/// Alphabet the suffix is drawn from, uniformly.
const ORDER_SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a human-legible order number: `ORD-YYYYMMDD-XXXXXX`.
///
/// Uniqueness is enforced at persistence time by the order store; callers
/// regenerate on collision (bounded by the engine config).
pub fn generate_order_number() -> String {
    let date = Utc::now().format("%Y%m%d");
    let mut rng = rand::thread_rng();
    let suffix: String = (0..ORDER_SUFFIX_LEN)
        .map(|_| ORDER_SUFFIX_CHARSET[rng.gen_range(0..ORDER_SUFFIX_CHARSET.len())] as char)
        .collect();
    format!("ORD-{date}-{suffix}")
}
