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

//! Catalog snapshot provider.
//!
//! Pricing reads the catalog exactly once per order, at call time. Orders
//! capture denormalized line snapshots, so later price or availability edits
//! never retroactively change an already-priced order.

use crate::base::ItemId;
use crate::error::EngineError;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mutable catalog record. The order path never stores references to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: ItemId,
    pub name: String,
    pub category: String,
    pub unit_price: Decimal,
    pub available: bool,
}

/// Unit price and availability for one item, read at order time.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub name: String,
    pub unit_price: Decimal,
    pub available: bool,
}

/// Resolves item ids to current unit prices.
///
/// Ids unknown to the backend are simply absent from the returned map; the
/// pricing engine treats absence the same as unavailability. An unreachable
/// backend returns [`EngineError::DependencyUnavailable`], which aborts
/// pricing (unlike notification failures, catalog failures are never
/// swallowed).
pub trait PriceSource: Send + Sync {
    fn resolve_prices(
        &self,
        ids: &[ItemId],
    ) -> Result<HashMap<ItemId, PriceQuote>, EngineError>;
}

/// In-memory catalog backed by a concurrent map.
#[derive(Debug, Default)]
pub struct Catalog {
    items: DashMap<ItemId, MenuItem>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
        }
    }

    /// Inserts or replaces a catalog record.
    pub fn upsert(&self, item: MenuItem) {
        self.items.insert(item.id, item);
    }

    /// Updates the unit price of an existing item.
    pub fn set_price(&self, id: ItemId, unit_price: Decimal) -> Result<(), EngineError> {
        let mut item = self
            .items
            .get_mut(&id)
            .ok_or_else(|| EngineError::not_found(format!("menu item {id}")))?;
        item.unit_price = unit_price;
        Ok(())
    }

    /// Toggles availability of an existing item.
    pub fn set_available(&self, id: ItemId, available: bool) -> Result<(), EngineError> {
        let mut item = self
            .items
            .get_mut(&id)
            .ok_or_else(|| EngineError::not_found(format!("menu item {id}")))?;
        item.available = available;
        Ok(())
    }

    pub fn get(&self, id: ItemId) -> Option<MenuItem> {
        self.items.get(&id).map(|item| item.clone())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl PriceSource for Catalog {
    fn resolve_prices(
        &self,
        ids: &[ItemId],
    ) -> Result<HashMap<ItemId, PriceQuote>, EngineError> {
        let mut quotes = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(item) = self.items.get(id) {
                quotes.insert(
                    *id,
                    PriceQuote {
                        name: item.name.clone(),
                        unit_price: item.unit_price,
                        available: item.available,
                    },
                );
            }
        }
        Ok(quotes)
    }
}
