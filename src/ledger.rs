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

//! Immutable ledger entries.
//!
//! A ledger entry is one signed monetary record on a student wallet. Entries
//! are append-only: created by a booking, a manual admin credit/debit, and
//! never updated or deleted afterward. The balance is always derivable as
//! `Σ credit − Σ debit` over an account's entries.

use crate::base::{AccountId, EntryId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sign of a ledger entry. The kind together with the (always positive)
/// amount fully determines the entry's contribution to the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryKind {
    Credit,
    Debit,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Credit => write!(f, "CREDIT"),
            EntryKind::Debit => write!(f, "DEBIT"),
        }
    }
}

/// One immutable signed monetary record contributing to a balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub kind: EntryKind,
    /// Always strictly positive; the sign lives in `kind`.
    pub amount: Decimal,
    pub memo: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// The entry's contribution to the account balance: `+amount` for a
    /// credit, `-amount` for a debit.
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            EntryKind::Credit => self.amount,
            EntryKind::Debit => -self.amount,
        }
    }
}
