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

//! Error types for distributed mutex operations.

use thiserror::Error;

/// Result type for mutex operations.
pub type LockResult<T> = Result<T, LockError>;

/// Errors that can occur during mutex operations.
///
/// Per-replica transport failures never surface directly; they are counted
/// as non-successes for the affected replica and only cross the API boundary
/// as [`LockError::LockFailed`] when quorum is missed.
#[derive(Error, Debug)]
pub enum LockError {
    /// Quorum was not reached within the validity window
    #[error("Lock failed: quorum not reached within lock validity")]
    LockFailed,

    /// Lock value generation failed
    #[error("Value generation error: {0}")]
    ValueGeneration(String),

    /// Backend error (replica transport, protocol, etc.)
    #[error("Backend error: {0}")]
    BackendError(String),

    /// IO error
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[cfg(feature = "redis-backend")]
impl From<redis::RedisError> for LockError {
    fn from(err: redis::RedisError) -> Self {
        LockError::BackendError(format!("Redis error: {}", err))
    }
}
