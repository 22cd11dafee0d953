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

//! Error types for wallet, booking, and room operations.

use rust_decimal::Decimal;
use thiserror::Error;

/// Engine operation errors.
///
/// Every failure path leaves the ledger, order store, and room state
/// untouched; these errors are returned synchronously to the caller with
/// zero partial writes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Referenced account, room, item, or order does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Malformed amount, quantity, or other input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation requires a student (wallet-holding) account
    #[error("operation requires a student account")]
    InvalidRole,

    /// Debit or booking would exceed the current balance
    #[error("insufficient balance: current {balance}, required {required}")]
    InsufficientFunds {
        balance: Decimal,
        required: Decimal,
    },

    /// Basket was empty, had a zero quantity, or referenced items that are
    /// missing or unavailable; the whole basket is rejected
    #[error("invalid basket: {}", reasons.join(", "))]
    InvalidBasket { reasons: Vec<String> },

    /// Room occupancy already equals capacity
    #[error("room is full")]
    RoomFull,

    /// Student already holds a room
    #[error("student is already assigned to a room")]
    AlreadyAssigned,

    /// Student's current room differs from the target room
    #[error("student is not assigned to this room")]
    NotAssignedHere,

    /// Lost a uniqueness race (order number, room number, roll number)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Catalog backend unreachable; pricing must abort
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
}

impl EngineError {
    /// Convenience constructor for [`EngineError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}
