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

//! The wallet and booking engine.
//!
//! The [`Engine`] owns accounts, rooms, the order store, and the injected
//! catalog and notifier capabilities. Operations on different accounts run
//! in parallel; per-account and per-room sequences are serialized by the
//! aggregate mutexes.
//!
//! # Atomicity
//!
//! A booking commits in three steps that cannot be observed partially:
//! reserve a unique order number (nothing else written; released on any
//! later failure), then — under the account's wallet lock — run the funds
//! check, append the single debit entry, and publish the completed order
//! under the reserved number. No failure path leaves a debit without an
//! order or an order without its debit.
//!
//! # Lock order
//!
//! Account before room, always. No operation holds two account locks or two
//! room locks at once.

use crate::account::{Account, Role, WalletSummary};
use crate::base::{AccountId, EntryId, OrderId, RoomId};
use crate::catalog::{Catalog, PriceSource};
use crate::error::EngineError;
use crate::ledger::{EntryKind, LedgerEntry};
use crate::notify::{EventKind, Notifier, NoopNotifier, NotifyPayload};
use crate::order::FoodOrder;
use crate::order_store::{NumberReservation, OrderStore};
use crate::pricing::{generate_order_number, price_basket, BasketLine, MealType};
use crate::room::{Room, RoomSnapshot};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tunables injected at engine construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// A balance at or below this value raises the low-balance flag and
    /// event (inclusive boundary).
    pub low_balance_threshold: Decimal,
    /// Order-number regeneration attempts before giving up with `Conflict`.
    pub order_number_max_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            low_balance_threshold: dec!(100.00),
            order_number_max_attempts: 5,
        }
    }
}

/// Result of a successful booking.
#[derive(Debug, Clone)]
pub struct BookingReceipt {
    pub order: Arc<FoodOrder>,
    pub previous_balance: Decimal,
    pub new_balance: Decimal,
    pub low_balance: bool,
}

/// Result of a successful manual credit/debit.
#[derive(Debug, Clone)]
pub struct TransactionReceipt {
    pub entry: LedgerEntry,
    pub previous_balance: Decimal,
    pub new_balance: Decimal,
    pub low_balance: bool,
}

/// Central engine managing wallets, orders, and rooms.
pub struct Engine {
    accounts: DashMap<AccountId, Arc<Account>>,
    /// Roll number -> account id, for quick orders at the counter.
    roll_index: DashMap<String, AccountId>,
    rooms: DashMap<RoomId, Arc<Room>>,
    room_no_index: DashMap<String, RoomId>,
    orders: OrderStore,
    next_entry_id: AtomicU64,
    next_order_id: AtomicU64,
    price_source: Arc<dyn PriceSource>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl Engine {
    /// Engine with an empty in-memory catalog, a no-op notifier, and
    /// default config. Mostly useful for wallet- and room-only callers;
    /// booking callers want [`Engine::with_parts`] so they keep a handle on
    /// the catalog.
    pub fn new() -> Self {
        Self::with_parts(
            Arc::new(Catalog::new()),
            Arc::new(NoopNotifier),
            EngineConfig::default(),
        )
    }

    pub fn with_parts(
        price_source: Arc<dyn PriceSource>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            accounts: DashMap::new(),
            roll_index: DashMap::new(),
            rooms: DashMap::new(),
            room_no_index: DashMap::new(),
            orders: OrderStore::new(),
            next_entry_id: AtomicU64::new(1),
            next_order_id: AtomicU64::new(1),
            price_source,
            notifier,
            config,
        }
    }

    // === Accounts ===

    /// Registers an account under a caller-assigned id.
    ///
    /// # Errors
    ///
    /// [`EngineError::Conflict`] when the id or the roll number is taken.
    pub fn register_account(
        &self,
        id: AccountId,
        name: impl Into<String>,
        role: Role,
        roll_no: Option<String>,
    ) -> Result<Arc<Account>, EngineError> {
        if let Some(roll) = &roll_no {
            match self.roll_index.entry(roll.clone()) {
                Entry::Occupied(_) => {
                    return Err(EngineError::Conflict(format!(
                        "roll number {roll} already registered"
                    )));
                }
                Entry::Vacant(entry) => {
                    entry.insert(id);
                }
            }
        }
        match self.accounts.entry(id) {
            Entry::Occupied(_) => {
                if let Some(roll) = &roll_no {
                    self.roll_index.remove(roll);
                }
                Err(EngineError::Conflict(format!("account {id} already registered")))
            }
            Entry::Vacant(entry) => {
                let account = Arc::new(Account::new(id, name, role, roll_no));
                entry.insert(Arc::clone(&account));
                Ok(account)
            }
        }
    }

    /// Removes an account, releasing its room slot if it held one.
    pub fn remove_account(&self, id: AccountId) -> Result<(), EngineError> {
        let (_, account) = self
            .accounts
            .remove(&id)
            .ok_or_else(|| EngineError::not_found(format!("account {id}")))?;
        if let Some(roll) = account.roll_no() {
            self.roll_index.remove(roll);
        }
        let mut slot = account.room_slot();
        if let Some(room_id) = slot.take() {
            if let Some(room) = self.rooms.get(&room_id) {
                room.remove(id);
            }
        }
        Ok(())
    }

    pub fn account(&self, id: AccountId) -> Option<Arc<Account>> {
        self.accounts.get(&id).map(|account| Arc::clone(&account))
    }

    /// All accounts, ordered by id (deterministic for report output).
    pub fn accounts(&self) -> Vec<Arc<Account>> {
        let mut accounts: Vec<Arc<Account>> = self
            .accounts
            .iter()
            .map(|entry| Arc::clone(&entry))
            .collect();
        accounts.sort_by_key(|account| account.id().0);
        accounts
    }

    fn require_account(&self, id: AccountId) -> Result<Arc<Account>, EngineError> {
        self.account(id)
            .ok_or_else(|| EngineError::not_found(format!("account {id}")))
    }

    fn require_student(&self, id: AccountId) -> Result<Arc<Account>, EngineError> {
        let account = self.require_account(id)?;
        if !account.is_student() {
            return Err(EngineError::InvalidRole);
        }
        Ok(account)
    }

    // === Wallet queries ===

    /// Current derived balance for an account.
    pub fn balance(&self, account_id: AccountId) -> Result<Decimal, EngineError> {
        Ok(self.require_account(account_id)?.balance())
    }

    /// Ledger entries, newest first.
    pub fn ledger_entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, EngineError> {
        Ok(self.require_account(account_id)?.entries_newest_first())
    }

    pub fn wallet_summary(&self, account_id: AccountId) -> Result<WalletSummary, EngineError> {
        Ok(self.require_account(account_id)?.wallet_summary())
    }

    // === Manual transactions ===

    /// Posts a manual credit or debit (admin top-up / correction).
    ///
    /// Debits run the same insufficient-funds check as a booking, under the
    /// same wallet lock.
    pub fn create_transaction(
        &self,
        account_id: AccountId,
        kind: EntryKind,
        amount: Decimal,
        memo: Option<String>,
    ) -> Result<TransactionReceipt, EngineError> {
        let account = self.require_student(account_id)?;
        let entry = LedgerEntry {
            id: self.alloc_entry_id(),
            account_id,
            kind,
            amount,
            memo: memo.unwrap_or_else(|| format!("Manual {kind}")),
            created_at: Utc::now(),
        };
        let (previous_balance, new_balance) = account.append_entry(entry.clone())?;
        let low_balance = new_balance <= self.config.low_balance_threshold;

        tracing::info!(
            account = %account_id,
            %kind,
            %amount,
            balance = %new_balance,
            "transaction posted"
        );
        self.dispatch(
            account_id,
            EventKind::TransactionPosted,
            NotifyPayload {
                amount,
                balance: new_balance,
                summary: entry.memo.clone(),
            },
        );
        if low_balance {
            self.dispatch_low_balance(account_id, new_balance);
        }

        Ok(TransactionReceipt {
            entry,
            previous_balance,
            new_balance,
            low_balance,
        })
    }

    // === Booking ===

    /// The atomic booking transaction: price the basket, verify funds,
    /// append exactly one debit entry, persist exactly one order — or write
    /// nothing at all.
    pub fn create_order(
        &self,
        account_id: AccountId,
        meal_type: MealType,
        basket: &[BasketLine],
        served_by: AccountId,
    ) -> Result<BookingReceipt, EngineError> {
        self.require_account(served_by)
            .map_err(|_| EngineError::not_found(format!("staff account {served_by}")))?;
        let account = self.require_student(account_id)?;

        let priced = price_basket(self.price_source.as_ref(), meal_type, basket)?;

        let reservation = self.reserve_order_number()?;
        let now = Utc::now();
        let entry_id = self.alloc_entry_id();
        let entry = LedgerEntry {
            id: entry_id,
            account_id,
            kind: EntryKind::Debit,
            amount: priced.total,
            memo: FoodOrder::debit_memo(meal_type, priced.lines.len()),
            created_at: now,
        };

        // Critical section: funds check, debit append, and order publish
        // happen under one wallet guard. On an early return the unpublished
        // reservation drops and releases the order number.
        let (order, previous_balance, new_balance) = {
            let mut wallet = account.lock_wallet();
            let (previous, new) = wallet.append(entry)?;
            let order = Arc::new(FoodOrder::from_priced(
                self.alloc_order_id(),
                reservation.number().to_string(),
                account_id,
                entry_id,
                served_by,
                &priced,
                now,
            ));
            self.orders.publish(reservation, Arc::clone(&order));
            (order, previous, new)
        };

        let low_balance = new_balance <= self.config.low_balance_threshold;
        tracing::info!(
            account = %account_id,
            order = %order.order_number,
            total = %order.total,
            balance = %new_balance,
            "order booked"
        );
        self.dispatch(
            account_id,
            EventKind::OrderPlaced,
            NotifyPayload {
                amount: order.total,
                balance: new_balance,
                summary: format!("{} ({})", order.order_number, meal_type),
            },
        );
        if low_balance {
            self.dispatch_low_balance(account_id, new_balance);
        }

        Ok(BookingReceipt {
            order,
            previous_balance,
            new_balance,
            low_balance,
        })
    }

    /// Quick order by roll number, for the canteen counter.
    pub fn create_order_by_roll_no(
        &self,
        roll_no: &str,
        meal_type: MealType,
        basket: &[BasketLine],
        served_by: AccountId,
    ) -> Result<BookingReceipt, EngineError> {
        let account_id = self
            .roll_index
            .get(roll_no)
            .map(|entry| *entry)
            .ok_or_else(|| {
                EngineError::not_found(format!("student with roll number \"{roll_no}\""))
            })?;
        self.create_order(account_id, meal_type, basket, served_by)
    }

    // === Order queries ===

    pub fn get_order(&self, id: OrderId) -> Option<Arc<FoodOrder>> {
        self.orders.get(id)
    }

    pub fn get_order_by_number(&self, number: &str) -> Option<Arc<FoodOrder>> {
        self.orders.get_by_number(number)
    }

    /// An account's orders, newest first.
    pub fn orders_for_account(&self, account_id: AccountId) -> Vec<Arc<FoodOrder>> {
        self.orders.for_account(account_id)
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    // === Rooms ===

    /// Provisions a room with a unique room number.
    pub fn add_room(
        &self,
        id: RoomId,
        room_no: impl Into<String>,
        floor: i32,
        capacity: u32,
    ) -> Result<RoomSnapshot, EngineError> {
        if capacity == 0 {
            return Err(EngineError::InvalidInput(
                "room capacity must be at least 1".into(),
            ));
        }
        let room_no = room_no.into();
        match self.room_no_index.entry(room_no.clone()) {
            Entry::Occupied(_) => {
                return Err(EngineError::Conflict(format!(
                    "room number {room_no} already exists"
                )));
            }
            Entry::Vacant(entry) => {
                entry.insert(id);
            }
        }
        match self.rooms.entry(id) {
            Entry::Occupied(_) => {
                self.room_no_index.remove(&room_no);
                Err(EngineError::Conflict(format!("room {id} already exists")))
            }
            Entry::Vacant(entry) => {
                let room = Arc::new(Room::new(id, room_no, floor, capacity));
                let snapshot = room.snapshot();
                entry.insert(room);
                Ok(snapshot)
            }
        }
    }

    pub fn room(&self, id: RoomId) -> Result<RoomSnapshot, EngineError> {
        Ok(self.require_room(id)?.snapshot())
    }

    fn require_room(&self, id: RoomId) -> Result<Arc<Room>, EngineError> {
        self.rooms
            .get(&id)
            .map(|room| Arc::clone(&room))
            .ok_or_else(|| EngineError::not_found(format!("room {id}")))
    }

    /// Assigns a student to a room.
    ///
    /// The student's room claim and the room's occupancy set are settled
    /// under their respective locks in account → room order; the occupancy
    /// check and the insert are one atomic operation, so the last open slot
    /// can only be granted once.
    pub fn assign_room(
        &self,
        room_id: RoomId,
        account_id: AccountId,
    ) -> Result<RoomSnapshot, EngineError> {
        let room = self.require_room(room_id)?;
        let account = self.require_student(account_id)?;

        let mut slot = account.room_slot();
        // The account may have been removed between the lookup and taking
        // the slot lock; an occupant inserted for it now could never be
        // unassigned.
        if !self.accounts.contains_key(&account_id) {
            return Err(EngineError::not_found(format!("account {account_id}")));
        }
        if slot.is_some() {
            return Err(EngineError::AlreadyAssigned);
        }
        if !room.try_add(account_id) {
            return Err(EngineError::RoomFull);
        }
        *slot = Some(room_id);
        drop(slot);

        tracing::info!(account = %account_id, room = %room_id, "room assigned");
        Ok(room.snapshot())
    }

    /// Removes a student from the room they are assigned to.
    pub fn unassign_room(
        &self,
        room_id: RoomId,
        account_id: AccountId,
    ) -> Result<RoomSnapshot, EngineError> {
        let room = self.require_room(room_id)?;
        let account = self.require_account(account_id)?;

        let mut slot = account.room_slot();
        if *slot != Some(room_id) {
            return Err(EngineError::NotAssignedHere);
        }
        let removed = room.remove(account_id);
        debug_assert!(removed, "claimed room did not hold the occupant");
        *slot = None;
        drop(slot);

        tracing::info!(account = %account_id, room = %room_id, "room unassigned");
        Ok(room.snapshot())
    }

    // === Internals ===

    fn alloc_entry_id(&self) -> EntryId {
        EntryId(self.next_entry_id.fetch_add(1, Ordering::Relaxed))
    }

    fn alloc_order_id(&self) -> OrderId {
        OrderId(self.next_order_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Reserves a fresh order number, regenerating on collision up to the
    /// configured bound.
    fn reserve_order_number(&self) -> Result<NumberReservation<'_>, EngineError> {
        for _ in 0..self.config.order_number_max_attempts {
            match self.orders.reserve(generate_order_number()) {
                Ok(reservation) => return Ok(reservation),
                Err(EngineError::Conflict(_)) => continue,
                Err(other) => return Err(other),
            }
        }
        Err(EngineError::Conflict(
            "order number generation exhausted its retries".into(),
        ))
    }

    /// Fire-and-forget: a failing sink is logged and never surfaced.
    fn dispatch(&self, account_id: AccountId, kind: EventKind, payload: NotifyPayload) {
        if let Err(err) = self.notifier.notify(account_id, kind, &payload) {
            tracing::warn!(account = %account_id, %kind, %err, "notification dispatch failed");
        }
    }

    fn dispatch_low_balance(&self, account_id: AccountId, balance: Decimal) {
        self.dispatch(
            account_id,
            EventKind::LowBalance,
            NotifyPayload {
                amount: Decimal::ZERO,
                balance,
                summary: format!("balance {balance} at or below threshold"),
            },
        );
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
