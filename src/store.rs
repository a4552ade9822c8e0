// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of PlexSpaces.
//
// PlexSpaces is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// PlexSpaces is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with PlexSpaces. If not, see <https://www.gnu.org/licenses/>.

//! Replica store abstractions.
//!
//! ## Purpose
//! Defines the two seams the mutex protocol depends on: a [`Pool`] bound to
//! one replica, and the [`Conn`] it hands out for a single sub-operation.
//! Any key-value store that supports set-if-absent with expiry plus atomic
//! compare-and-delete / compare-and-extend can back these traits.

use crate::LockResult;
use async_trait::async_trait;
use std::time::Duration;

/// A connection to one replica, used by exactly one sub-operation.
///
/// All operations are asynchronous and may fail with a transport or protocol
/// error; errors propagate to the caller, which decides whether the failure
/// counts against quorum. The connection is returned to its pool on drop.
#[async_trait]
pub trait Conn: Send {
    /// Atomically set `key = value` with TTL `ttl` only if `key` does not
    /// exist. Returns `true` when the write was applied.
    async fn set_nx_px(&mut self, key: &str, value: &str, ttl: Duration) -> LockResult<bool>;

    /// Read the current value of `key`, or `None` if absent.
    async fn get(&mut self, key: &str) -> LockResult<Option<String>>;

    /// Remaining TTL of `key` in milliseconds.
    ///
    /// Follows Redis semantics: `-2` when the key is missing, `-1` when the
    /// key carries no TTL. Used only for observation in tests.
    async fn pttl(&mut self, key: &str) -> LockResult<i64>;

    /// Delete `key` only if it currently holds `expected`. Returns `true`
    /// when the key was deleted. Atomic at the replica.
    async fn delete_if_equal(&mut self, key: &str, expected: &str) -> LockResult<bool>;

    /// Reset the TTL of `key` to `ttl` only if it currently holds
    /// `expected`. Returns `true` when the TTL was reset. Atomic at the
    /// replica.
    async fn pexpire_if_equal(&mut self, key: &str, expected: &str, ttl: Duration)
        -> LockResult<bool>;
}

/// Produces connections to a single replica.
///
/// Pools are internally synchronized; the mutex holds one pool per replica
/// and acquires a fresh connection per sub-operation.
#[async_trait]
pub trait Pool: Send + Sync {
    /// Acquire a connection to the replica.
    async fn get(&self) -> LockResult<Box<dyn Conn>>;
}
