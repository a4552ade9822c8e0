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

//! # PlexSpaces Redlock
//!
//! ## Purpose
//! Provides a distributed mutual-exclusion primitive across a set of
//! independent Redis replicas, implementing the Redlock algorithm. A caller
//! acquires a named lease visible to every client of the same replica set;
//! the lease is held for a bounded duration and may be extended or
//! released.
//!
//! ## Architecture Context
//! This crate is used internally by:
//! - **Background Scheduler**: single-holder leases so only one scheduler
//!   processes requests at a time across nodes
//! - **Future Coordination Tasks**: any component that needs a
//!   cross-process critical section
//!
//! ## Design Decisions
//! - **Quorum writes**: a lease is held iff `⌊N/2⌋ + 1` replicas accepted
//!   it, so no two holders can coexist
//! - **Clock-drift adjusted validity**: acquisition latency and a drift
//!   allowance are subtracted from the lease TTL before success is reported
//! - **Unguessable lease values**: release and extension are conditional on
//!   the value, so a stale holder cannot destroy a successor's lease
//! - **Per-replica fault tolerance**: replica errors count as non-successes
//!   and never abort an operation; only the aggregate outcome surfaces
//!
//! ## Backend Support
//! - **InMemory**: simulated replicas with fault injection (feature:
//!   `memory-backend`, for testing)
//! - **Redis**: `SET NX PX` plus Lua compare-scoped scripts (feature:
//!   `redis-backend`)
//!
//! ## Examples
//!
//! ```rust,no_run
//! use plexspaces_redlock::{memory::MemoryPool, set_tries, Pool, Redlock};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pools: Vec<Arc<dyn Pool>> = (0..5)
//!     .map(|_| Arc::new(MemoryPool::new()) as Arc<dyn Pool>)
//!     .collect();
//! let redlock = Redlock::new(pools);
//! let mut mutex = redlock.new_mutex("scheduler:leader", [set_tries(8)]);
//!
//! mutex.lock().await?;
//! // critical section
//! mutex.extend().await?;
//! mutex.unlock().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod mutex;
pub mod redlock;
pub mod store;
pub mod value;

mod quorum;

#[cfg(feature = "memory-backend")]
pub mod memory;

#[cfg(feature = "redis-backend")]
pub mod redis;

pub use error::{LockError, LockResult};
pub use mutex::{DelayFn, Mutex};
pub use redlock::{
    set_drift_factor, set_expiry, set_gen_value_func, set_retry_delay, set_retry_delay_func,
    set_tries, MutexOption, Redlock,
};
pub use store::{Conn, Pool};
pub use value::{gen_value, GenValueFn};
