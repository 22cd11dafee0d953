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

//! Notification dispatch.
//!
//! A [`Notifier`] is an injected capability, not a global handle. The engine
//! invokes it after a successful booking or transaction and on low-balance
//! crossings; dispatch is fire-and-forget, and a failing or unreachable
//! sink never unwinds the operation that triggered it — failures are logged
//! and swallowed at the call site.

use crate::base::AccountId;
use crossbeam::channel::{unbounded, Receiver, Sender, TrySendError};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// What happened, from the notification sink's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    TransactionPosted,
    OrderPlaced,
    LowBalance,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::TransactionPosted => "TRANSACTION_POSTED",
            EventKind::OrderPlaced => "ORDER_PLACED",
            EventKind::LowBalance => "LOW_BALANCE",
        };
        write!(f, "{s}")
    }
}

/// Summary payload handed to the sink. Deliberately flat: the delivery side
/// (email, bot) renders it however it likes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotifyPayload {
    pub amount: Decimal,
    pub balance: Decimal,
    pub summary: String,
}

/// A fully addressed notification event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotifyEvent {
    pub account_id: AccountId,
    pub kind: EventKind,
    pub payload: NotifyPayload,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The sink is gone or refuses delivery
    #[error("notification sink unavailable")]
    SinkUnavailable,
}

/// Fire-and-forget notification sink.
///
/// Implementations must be cheap to call from the booking path; anything
/// slow belongs behind a queue (see [`ChannelNotifier`]).
pub trait Notifier: Send + Sync {
    fn notify(
        &self,
        account_id: AccountId,
        kind: EventKind,
        payload: &NotifyPayload,
    ) -> Result<(), NotifyError>;
}

/// Satisfies a "notifications disabled" configuration without conditional
/// branching at call sites.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(
        &self,
        _account_id: AccountId,
        _kind: EventKind,
        _payload: &NotifyPayload,
    ) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Enqueues events onto an unbounded channel for an out-of-process delivery
/// worker. Dropping the receiver models an unreachable sink.
#[derive(Debug)]
pub struct ChannelNotifier {
    tx: Sender<NotifyEvent>,
}

impl ChannelNotifier {
    /// Creates the notifier and the receiving end the delivery worker
    /// drains.
    pub fn new() -> (Self, Receiver<NotifyEvent>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(
        &self,
        account_id: AccountId,
        kind: EventKind,
        payload: &NotifyPayload,
    ) -> Result<(), NotifyError> {
        let event = NotifyEvent {
            account_id,
            kind,
            payload: payload.clone(),
        };
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Disconnected(_)) | Err(TrySendError::Full(_)) => {
                Err(NotifyError::SinkUnavailable)
            }
        }
    }
}
