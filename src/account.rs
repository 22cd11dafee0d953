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

//! Accounts and per-account wallets.
//!
//! The wallet is the critical section of the whole engine: the
//! "read balance → compare to required amount → append debit" sequence runs
//! under one mutex guard, so two concurrent debits can never both pass the
//! sufficiency check against a stale balance.
//!
//! # Example
//!
//! ```
//! use mess_ledger_rs::{Account, AccountId, Role};
//! use rust_decimal_macros::dec;
//!
//! let account = Account::new(AccountId(1), "Asha", Role::Student, Some("CS101".into()));
//! assert_eq!(account.balance(), dec!(0.00));
//! ```

use crate::base::{AccountId, RoomId};
use crate::error::EngineError;
use crate::ledger::{EntryKind, LedgerEntry};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use std::fmt;

/// Account role. Only [`Role::Student`] holds a wallet and may occupy a room;
/// the other roles act on student accounts but never own ledger entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Admin,
    CanteenManager,
    Caretaker,
    Warden,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Student => "STUDENT",
            Role::Admin => "ADMIN",
            Role::CanteenManager => "CANTEEN_MANAGER",
            Role::Caretaker => "CARETAKER",
            Role::Warden => "WARDEN",
        };
        write!(f, "{s}")
    }
}

/// Wallet state guarded by the account mutex.
///
/// `balance` is a running cache of the fold over `entries`. Both are updated
/// under the same guard, and the equality is re-checked after every append in
/// debug builds (and property-tested).
#[derive(Debug)]
pub(crate) struct WalletData {
    entries: Vec<LedgerEntry>,
    balance: Decimal,
}

impl WalletData {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            balance: Decimal::ZERO,
        }
    }

    pub(crate) fn balance(&self) -> Decimal {
        self.balance
    }

    /// Pure fold: `Σ credit − Σ debit` over all entries.
    fn fold_balance(&self) -> Decimal {
        self.entries.iter().map(LedgerEntry::signed_amount).sum()
    }

    fn assert_invariants(&self) {
        debug_assert_eq!(
            self.balance,
            self.fold_balance(),
            "Invariant violated: cached balance diverged from ledger fold"
        );
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance went negative: {}",
            self.balance
        );
    }

    /// Appends one entry, enforcing `amount > 0` and, for debits, the
    /// sufficiency check against the current balance. Returns the balance
    /// before and after the append.
    pub(crate) fn append(&mut self, entry: LedgerEntry) -> Result<(Decimal, Decimal), EngineError> {
        if entry.amount <= Decimal::ZERO {
            return Err(EngineError::InvalidInput(
                "amount must be positive".into(),
            ));
        }
        let previous = self.balance;
        if entry.kind == EntryKind::Debit && previous < entry.amount {
            return Err(EngineError::InsufficientFunds {
                balance: previous,
                required: entry.amount,
            });
        }
        self.balance += entry.signed_amount();
        self.entries.push(entry);
        self.assert_invariants();
        Ok((previous, self.balance))
    }
}

/// Point-in-time wallet aggregate for reporting.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WalletSummary {
    pub account_id: AccountId,
    pub balance: Decimal,
    pub total_credited: Decimal,
    pub total_debited: Decimal,
    pub entry_count: usize,
}

/// A registered account with an append-only wallet ledger and an optional
/// room assignment.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    name: String,
    role: Role,
    roll_no: Option<String>,
    wallet: Mutex<WalletData>,
    /// The student's current room, if any. Locked before any room mutex
    /// (account → room order, crate-wide).
    room: Mutex<Option<RoomId>>,
}

impl Account {
    const DECIMAL_PRECISION: u32 = 2;

    pub fn new(
        id: AccountId,
        name: impl Into<String>,
        role: Role,
        roll_no: Option<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            roll_no,
            wallet: Mutex::new(WalletData::new()),
            room: Mutex::new(None),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn roll_no(&self) -> Option<&str> {
        self.roll_no.as_deref()
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    /// Current derived balance.
    pub fn balance(&self) -> Decimal {
        self.wallet.lock().balance
    }

    /// Recomputes the balance by folding the full ledger. Equal to
    /// [`Account::balance`] by invariant; exposed so callers can verify.
    pub fn fold_balance(&self) -> Decimal {
        self.wallet.lock().fold_balance()
    }

    /// All ledger entries, newest first.
    pub fn entries_newest_first(&self) -> Vec<LedgerEntry> {
        let data = self.wallet.lock();
        data.entries.iter().rev().cloned().collect()
    }

    /// Wallet aggregate computed under a single guard.
    pub fn wallet_summary(&self) -> WalletSummary {
        let data = self.wallet.lock();
        let total_credited = data
            .entries
            .iter()
            .filter(|e| e.kind == EntryKind::Credit)
            .map(|e| e.amount)
            .sum();
        let total_debited = data
            .entries
            .iter()
            .filter(|e| e.kind == EntryKind::Debit)
            .map(|e| e.amount)
            .sum();
        WalletSummary {
            account_id: self.id,
            balance: data.balance,
            total_credited,
            total_debited,
            entry_count: data.entries.len(),
        }
    }

    /// Appends one ledger entry atomically with the sufficiency check.
    /// Returns `(previous_balance, new_balance)`.
    pub(crate) fn append_entry(
        &self,
        entry: LedgerEntry,
    ) -> Result<(Decimal, Decimal), EngineError> {
        debug_assert_eq!(entry.account_id, self.id);
        self.wallet.lock().append(entry)
    }

    /// Locks the wallet so the caller can run the funds check, the debit
    /// append, and order publication as one serialized section. The booking
    /// path holds this guard across all three steps.
    pub(crate) fn lock_wallet(&self) -> MutexGuard<'_, WalletData> {
        self.wallet.lock()
    }

    /// The student's current room assignment.
    pub fn current_room(&self) -> Option<RoomId> {
        *self.room.lock()
    }

    pub(crate) fn room_slot(&self) -> MutexGuard<'_, Option<RoomId>> {
        self.room.lock()
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let data = self.wallet.lock();
        let mut state = serializer.serialize_struct("Account", 5)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("role", &self.role)?;
        state.serialize_field("roll_no", &self.roll_no)?;
        state.serialize_field(
            "balance",
            &data.balance.round_dp(Account::DECIMAL_PRECISION),
        )?;
        state.end()
    }
}
