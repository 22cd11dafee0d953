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

//! Concurrent append-only order store with order-number uniqueness.
//!
//! The booking path first *reserves* an order number (an atomic
//! check-and-insert on the number index), then appends the debit under the
//! wallet lock, then *publishes* the finished order under the reserved
//! number. A reservation dropped without publishing releases the number, so
//! no failure path can leave an order without its debit or vice versa.

use crate::base::{AccountId, OrderId};
use crate::error::EngineError;
use crate::order::FoodOrder;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Thread-safe order store keyed by order number and order id.
#[derive(Debug, Default)]
pub struct OrderStore {
    /// Number index; `None` marks a reserved-but-unpublished number.
    by_number: DashMap<String, Option<Arc<FoodOrder>>>,
    by_id: DashMap<OrderId, Arc<FoodOrder>>,
}

/// An exclusively held order number. Releases the number on drop unless the
/// order was published under it.
#[derive(Debug)]
pub struct NumberReservation<'a> {
    store: &'a OrderStore,
    number: Option<String>,
}

impl NumberReservation<'_> {
    pub fn number(&self) -> &str {
        self.number.as_deref().expect("reservation already consumed")
    }
}

impl Drop for NumberReservation<'_> {
    fn drop(&mut self) {
        if let Some(number) = self.number.take() {
            self.store.by_number.remove(&number);
        }
    }
}

impl OrderStore {
    pub fn new() -> Self {
        Self {
            by_number: DashMap::new(),
            by_id: DashMap::new(),
        }
    }

    /// Atomically claims an order number.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Conflict`] if the number is already reserved
    /// or published.
    pub fn reserve(&self, number: String) -> Result<NumberReservation<'_>, EngineError> {
        // Entry API gives an atomic check-and-insert, so two concurrent
        // reservations of the same number cannot both succeed.
        match self.by_number.entry(number.clone()) {
            Entry::Occupied(_) => Err(EngineError::Conflict(format!(
                "order number {number} already exists"
            ))),
            Entry::Vacant(entry) => {
                entry.insert(None);
                Ok(NumberReservation {
                    store: self,
                    number: Some(number),
                })
            }
        }
    }

    /// Publishes a finished order under its reserved number.
    ///
    /// Infallible by construction: the reservation guarantees exclusive
    /// ownership of the number slot.
    pub fn publish(&self, mut reservation: NumberReservation<'_>, order: Arc<FoodOrder>) {
        let number = reservation.number.take().expect("reservation already consumed");
        debug_assert_eq!(number, order.order_number);
        self.by_id.insert(order.id, Arc::clone(&order));
        self.by_number.insert(number, Some(order));
    }

    pub fn get(&self, id: OrderId) -> Option<Arc<FoodOrder>> {
        self.by_id.get(&id).map(|order| Arc::clone(&order))
    }

    pub fn get_by_number(&self, number: &str) -> Option<Arc<FoodOrder>> {
        self.by_number.get(number).and_then(|slot| slot.clone())
    }

    /// All published orders for one account, newest first.
    pub fn for_account(&self, account_id: AccountId) -> Vec<Arc<FoodOrder>> {
        let mut orders: Vec<Arc<FoodOrder>> = self
            .by_id
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .map(|entry| Arc::clone(&entry))
            .collect();
        orders.sort_by(|a, b| b.id.0.cmp(&a.id.0));
        orders
    }

    /// Number of published orders.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
