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

//! Capacity-bounded rooms.
//!
//! The occupancy counter is the cardinality of the assignment set, both
//! living under one mutex, so the occupancy invariant
//! (`occupied == |occupants| <= capacity`) cannot be violated by
//! interleaved updates. The occupancy check and the insert are one
//! serialized operation per room: two concurrent assigns against the last
//! open slot cannot both succeed.

use crate::base::{AccountId, RoomId};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;

/// A bounded room aggregate.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    room_no: String,
    floor: i32,
    capacity: u32,
    occupants: Mutex<HashSet<AccountId>>,
}

/// Read-only view of a room at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub room_no: String,
    pub floor: i32,
    pub capacity: u32,
    pub occupied: u32,
    pub occupants: Vec<AccountId>,
}

impl Room {
    pub fn new(id: RoomId, room_no: impl Into<String>, floor: i32, capacity: u32) -> Self {
        debug_assert!(capacity > 0, "room capacity must be positive");
        Self {
            id,
            room_no: room_no.into(),
            floor,
            capacity,
            occupants: Mutex::new(HashSet::new()),
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn room_no(&self) -> &str {
        &self.room_no
    }

    pub fn floor(&self) -> i32 {
        self.floor
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn occupied(&self) -> u32 {
        self.occupants.lock().len() as u32
    }

    /// Adds an occupant if a slot is free; the check and the insert are one
    /// atomic operation. Returns `false` when the room is full.
    pub(crate) fn try_add(&self, account_id: AccountId) -> bool {
        let mut occupants = self.occupants.lock();
        if occupants.len() as u32 >= self.capacity {
            return false;
        }
        let inserted = occupants.insert(account_id);
        debug_assert!(inserted, "occupant inserted twice");
        debug_assert!(occupants.len() as u32 <= self.capacity);
        true
    }

    /// Removes an occupant. Returns `false` when the account was not
    /// present; occupancy never goes below zero.
    pub(crate) fn remove(&self, account_id: AccountId) -> bool {
        self.occupants.lock().remove(&account_id)
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        let occupants = self.occupants.lock();
        let mut ids: Vec<AccountId> = occupants.iter().copied().collect();
        ids.sort_by_key(|id| id.0);
        RoomSnapshot {
            id: self.id,
            room_no: self.room_no.clone(),
            floor: self.floor,
            capacity: self.capacity,
            occupied: occupants.len() as u32,
            occupants: ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_until_full() {
        let room = Room::new(RoomId(1), "101", 1, 2);
        assert!(room.try_add(AccountId(1)));
        assert!(room.try_add(AccountId(2)));
        assert!(!room.try_add(AccountId(3)));
        assert_eq!(room.occupied(), 2);
    }

    #[test]
    fn remove_frees_a_slot() {
        let room = Room::new(RoomId(1), "101", 1, 1);
        room.try_add(AccountId(1));
        assert!(room.remove(AccountId(1)));
        assert_eq!(room.occupied(), 0);
        assert!(room.try_add(AccountId(2)));
    }

    #[test]
    fn removing_absent_account_is_reported() {
        let room = Room::new(RoomId(1), "101", 1, 1);
        assert!(!room.remove(AccountId(5)));
        assert_eq!(room.occupied(), 0);
    }

    #[test]
    fn snapshot_counter_equals_set_size() {
        let room = Room::new(RoomId(7), "204", 2, 3);
        room.try_add(AccountId(2));
        room.try_add(AccountId(1));

        let snapshot = room.snapshot();
        assert_eq!(snapshot.occupied, 2);
        assert_eq!(snapshot.occupants.len(), snapshot.occupied as usize);
        assert_eq!(snapshot.occupants, vec![AccountId(1), AccountId(2)]);
    }
}
