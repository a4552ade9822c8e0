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

//! Quorum and validity decision logic.
//!
//! Pure functions, isolated from all I/O. An acquisition round holds a
//! valid lease iff a majority of replicas accepted the write and the lease
//! TTL has not already been eaten by acquisition latency and clock drift.

use std::time::Duration;

/// Clock-drift allowance for a lease with the given expiry.
///
/// `expiry * factor` covers proportional skew between client and replica
/// clocks; the additive 2ms bounds sub-millisecond clock granularity.
pub(crate) fn drift(expiry: Duration, factor: f64) -> Duration {
    expiry.mul_f64(factor.max(0.0)) + Duration::from_millis(2)
}

/// Decide whether an acquisition round obtained a valid lease.
///
/// Returns the remaining validity window (`expiry - elapsed - drift`) when
/// at least `⌊n_pools/2⌋ + 1` replicas reported success and that window is
/// strictly positive; `None` otherwise.
pub(crate) fn decide(
    successes: usize,
    n_pools: usize,
    elapsed: Duration,
    expiry: Duration,
    factor: f64,
) -> Option<Duration> {
    let quorum = n_pools / 2 + 1;
    let validity = expiry
        .checked_sub(elapsed)?
        .checked_sub(drift(expiry, factor))?;
    if successes >= quorum && !validity.is_zero() {
        Some(validity)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPIRY: Duration = Duration::from_secs(8);

    #[test]
    fn test_drift_formula() {
        assert_eq!(drift(EXPIRY, 0.01), Duration::from_millis(82));
        assert_eq!(drift(Duration::from_millis(100), 0.0), Duration::from_millis(2));
        // Negative factors never shrink the allowance below the granularity bound
        assert_eq!(drift(EXPIRY, -1.0), Duration::from_millis(2));
    }

    #[test]
    fn test_quorum_boundary() {
        let elapsed = Duration::from_millis(10);
        // 5 replicas: quorum is 3
        assert!(decide(3, 5, elapsed, EXPIRY, 0.01).is_some());
        assert!(decide(2, 5, elapsed, EXPIRY, 0.01).is_none());
        // 4 replicas: quorum is 3, not 2
        assert!(decide(3, 4, elapsed, EXPIRY, 0.01).is_some());
        assert!(decide(2, 4, elapsed, EXPIRY, 0.01).is_none());
        // single replica degenerates to a plain lock
        assert!(decide(1, 1, elapsed, EXPIRY, 0.01).is_some());
        assert!(decide(0, 1, elapsed, EXPIRY, 0.01).is_none());
    }

    #[test]
    fn test_validity_window() {
        let expiry = Duration::from_millis(100);
        // drift is 2ms at factor 0: 97ms elapsed leaves 1ms of validity
        let validity = decide(3, 3, Duration::from_millis(97), expiry, 0.0).unwrap();
        assert_eq!(validity, Duration::from_millis(1));
        assert_eq!(
            decide(3, 3, Duration::from_millis(10), expiry, 0.0).unwrap(),
            Duration::from_millis(88)
        );
    }

    #[test]
    fn test_validity_must_be_strictly_positive() {
        let expiry = Duration::from_millis(100);
        // exactly zero validity is not a lock
        assert!(decide(3, 3, Duration::from_millis(98), expiry, 0.0).is_none());
        // elapsed beyond expiry fails even with unanimous success
        assert!(decide(3, 3, Duration::from_millis(150), expiry, 0.0).is_none());
    }
}
