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

//! # Mess Ledger
//!
//! A ledger-backed wallet and atomic booking engine for hostel mess
//! operations. Student balances are derived values over an append-only
//! transaction ledger; point-of-sale food orders price a basket against the
//! current menu, verify funds, debit the wallet, and persist an immutable
//! order record as one indivisible unit. Room assignment follows the same
//! read-check-write discipline against a capacity-bounded occupancy set.
//!
//! ## Core Components
//!
//! - [`Engine`]: central coordinator for wallets, bookings, and rooms
//! - [`Account`]: per-student wallet with an append-only ledger
//! - [`Catalog`]: mutable menu resolved to price snapshots at order time
//! - [`Room`]: capacity-bounded occupancy aggregate
//! - [`Notifier`]: injected fire-and-forget notification capability
//! - [`EngineError`]: error types for every failure path
//!
//! ## Example
//!
//! ```
//! use mess_ledger_rs::{
//!     AccountId, BasketLine, Catalog, Engine, EngineConfig, EntryKind, ItemId,
//!     MealType, MenuItem, NoopNotifier, Role,
//! };
//! use rust_decimal_macros::dec;
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(Catalog::new());
//! catalog.upsert(MenuItem {
//!     id: ItemId(1),
//!     name: "Tea".into(),
//!     category: "Beverages".into(),
//!     unit_price: dec!(10.00),
//!     available: true,
//! });
//! let engine = Engine::with_parts(
//!     catalog,
//!     Arc::new(NoopNotifier),
//!     EngineConfig::default(),
//! );
//!
//! engine
//!     .register_account(AccountId(1), "Asha", Role::Student, Some("CS101".into()))
//!     .unwrap();
//! engine
//!     .register_account(AccountId(100), "Mani", Role::CanteenManager, None)
//!     .unwrap();
//!
//! // Top up, then book three teas.
//! engine
//!     .create_transaction(AccountId(1), EntryKind::Credit, dec!(50.00), None)
//!     .unwrap();
//! let receipt = engine
//!     .create_order(
//!         AccountId(1),
//!         MealType::EveningSnacks,
//!         &[BasketLine { item_id: ItemId(1), quantity: 3 }],
//!         AccountId(100),
//!     )
//!     .unwrap();
//!
//! assert_eq!(receipt.order.total, dec!(30.00));
//! assert_eq!(receipt.new_balance, dec!(20.00));
//! ```
//!
//! ## Thread Safety
//!
//! The engine serves many concurrent request handlers. Per-account and
//! per-room critical sections (funds check + debit, occupancy check +
//! insert) are serialized by aggregate mutexes; everything else reads
//! already-committed immutable history and needs no locking.

pub mod account;
mod base;
pub mod catalog;
mod engine;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod order;
mod order_store;
pub mod pricing;
pub mod room;

pub use account::{Account, Role, WalletSummary};
pub use base::{AccountId, EntryId, ItemId, OrderId, RoomId};
pub use catalog::{Catalog, MenuItem, PriceQuote, PriceSource};
pub use engine::{BookingReceipt, Engine, EngineConfig, TransactionReceipt};
pub use error::EngineError;
pub use ledger::{EntryKind, LedgerEntry};
pub use notify::{ChannelNotifier, EventKind, NoopNotifier, Notifier, NotifyEvent, NotifyPayload};
pub use order::{FoodOrder, OrderLine};
pub use pricing::{BasketLine, MealType, PricedLine, PricedOrder};
pub use room::{Room, RoomSnapshot};
