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

//! Immutable food order records.
//!
//! An order is created atomically with its debit ledger entry and never
//! edited or cancelled afterward. Its lines are denormalized snapshots of
//! the catalog at order time, not live references.

use crate::base::{AccountId, EntryId, OrderId};
use crate::pricing::{MealType, PricedOrder};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Item name, unit price, quantity, and subtotal captured at order time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLine {
    pub item_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub subtotal: Decimal,
}

/// One persisted point-of-sale order.
///
/// Invariants: `total == Σ line.subtotal` and `total` equals the amount of
/// the referenced debit entry (`entry_id`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodOrder {
    pub id: OrderId,
    /// Human-readable, globally unique (`ORD-YYYYMMDD-XXXXXX`).
    pub order_number: String,
    pub account_id: AccountId,
    pub meal_type: MealType,
    pub total: Decimal,
    /// The single debit ledger entry created with this order.
    pub entry_id: EntryId,
    /// Staff account that served the order.
    pub served_by: AccountId,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
}

impl FoodOrder {
    pub(crate) fn from_priced(
        id: OrderId,
        order_number: String,
        account_id: AccountId,
        entry_id: EntryId,
        served_by: AccountId,
        priced: &PricedOrder,
        created_at: DateTime<Utc>,
    ) -> Self {
        let lines = priced
            .lines
            .iter()
            .map(|line| OrderLine {
                item_name: line.item_name.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                subtotal: line.subtotal,
            })
            .collect();
        Self {
            id,
            order_number,
            account_id,
            meal_type: priced.meal_type,
            total: priced.total,
            entry_id,
            served_by,
            lines,
            created_at,
        }
    }

    /// Sum of line subtotals; equal to `total` by construction.
    pub fn line_total(&self) -> Decimal {
        self.lines.iter().map(|line| line.subtotal).sum()
    }

    /// Debit memo of the original receipt form, e.g. `"Canteen - LUNCH (2 items)"`.
    pub fn debit_memo(meal_type: MealType, line_count: usize) -> String {
        format!("Canteen - {meal_type} ({line_count} items)")
    }
}
