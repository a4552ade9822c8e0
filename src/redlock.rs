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

//! Factory for distributed mutexes over a fixed replica set.

use crate::mutex::{DelayFn, Mutex};
use crate::store::Pool;
use crate::value::gen_value;
use crate::LockResult;
use std::sync::Arc;
use std::time::Duration;

/// Default lease TTL written on acquisition.
const DEFAULT_EXPIRY: Duration = Duration::from_secs(8);
/// Default number of acquisition attempts.
const DEFAULT_TRIES: u32 = 32;
/// Default constant backoff between attempts.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);
/// Default clock drift factor.
const DEFAULT_DRIFT_FACTOR: f64 = 0.01;

/// Creates distributed mutexes bound to a fixed list of replica pools.
///
/// The pool list is ordered and stable; the quorum of every mutex created
/// here is `⌊N/2⌋ + 1` over that list.
pub struct Redlock {
    pools: Vec<Arc<dyn Pool>>,
}

impl Redlock {
    /// Create a new factory from the given replica pools.
    pub fn new(pools: Vec<Arc<dyn Pool>>) -> Self {
        Self { pools }
    }

    /// Create a new mutex with the given name.
    ///
    /// Options are applied in the order supplied, over the defaults:
    /// 8s expiry, 32 tries, constant 500ms retry delay, drift factor 0.01,
    /// random lease values.
    pub fn new_mutex(
        &self,
        name: impl Into<String>,
        options: impl IntoIterator<Item = MutexOption>,
    ) -> Mutex {
        let mut mutex = Mutex {
            name: name.into(),
            expiry: DEFAULT_EXPIRY,
            tries: DEFAULT_TRIES,
            delay_func: Arc::new(|_| DEFAULT_RETRY_DELAY),
            factor: DEFAULT_DRIFT_FACTOR,
            gen_value_func: Arc::new(gen_value),
            quorum: self.pools.len() / 2 + 1,
            pools: self.pools.clone(),
            value: String::new(),
            until: None,
        };
        for option in options {
            option.apply(&mut mutex);
        }
        mutex
    }
}

/// A configurator applied to a newly built mutex before it is returned.
pub struct MutexOption(Box<dyn FnOnce(&mut Mutex)>);

impl MutexOption {
    fn new(f: impl FnOnce(&mut Mutex) + 'static) -> Self {
        Self(Box::new(f))
    }

    fn apply(self, mutex: &mut Mutex) {
        (self.0)(mutex)
    }
}

/// Override the lease TTL written on acquisition.
pub fn set_expiry(expiry: Duration) -> MutexOption {
    MutexOption::new(move |m| m.expiry = expiry)
}

/// Override the number of acquisition attempts.
pub fn set_tries(tries: u32) -> MutexOption {
    MutexOption::new(move |m| m.tries = tries)
}

/// Use a constant backoff between acquisition attempts.
pub fn set_retry_delay(delay: Duration) -> MutexOption {
    MutexOption::new(move |m| m.delay_func = Arc::new(move |_| delay))
}

/// Use an arbitrary backoff, keyed by the 1-indexed attempt number.
pub fn set_retry_delay_func(
    delay_func: impl Fn(u32) -> Duration + Send + Sync + 'static,
) -> MutexOption {
    MutexOption::new(move |m| m.delay_func = Arc::new(delay_func) as Arc<DelayFn>)
}

/// Override the clock drift factor.
pub fn set_drift_factor(factor: f64) -> MutexOption {
    MutexOption::new(move |m| m.factor = factor)
}

/// Override the lease value generator.
pub fn set_gen_value_func(
    gen_value_func: impl Fn() -> LockResult<String> + Send + Sync + 'static,
) -> MutexOption {
    MutexOption::new(move |m| m.gen_value_func = Arc::new(gen_value_func))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_mutex_defaults() {
        let redlock = Redlock::new(vec![]);
        let mutex = redlock.new_mutex("test-mutex", []);

        assert_eq!(mutex.name(), "test-mutex");
        assert_eq!(mutex.expiry, DEFAULT_EXPIRY);
        assert_eq!(mutex.tries, DEFAULT_TRIES);
        assert_eq!(mutex.factor, DEFAULT_DRIFT_FACTOR);
        assert!(mutex.value().is_empty());
        assert!(mutex.until().is_none());
        assert_eq!((mutex.delay_func)(1), DEFAULT_RETRY_DELAY);
        assert_eq!((mutex.delay_func)(31), DEFAULT_RETRY_DELAY);
    }

    #[test]
    fn test_quorum_per_pool_count() {
        // quorum is always a strict majority of the replica set
        for (n, quorum) in [(1, 1), (2, 2), (3, 2), (4, 3), (5, 3), (8, 5)] {
            let redlock = Redlock::new((0..n).map(|_| unreachable_pool()).collect());
            assert_eq!(redlock.new_mutex("q", []).quorum, quorum, "n = {n}");
        }
    }

    #[test]
    fn test_options_override_in_order() {
        let redlock = Redlock::new(vec![]);
        let mutex = redlock.new_mutex(
            "test-mutex",
            [
                set_expiry(Duration::from_secs(2)),
                set_tries(4),
                set_drift_factor(0.02),
                set_retry_delay(Duration::from_millis(50)),
                set_retry_delay_func(|attempt| Duration::from_millis(10 * attempt as u64)),
            ],
        );

        assert_eq!(mutex.expiry, Duration::from_secs(2));
        assert_eq!(mutex.tries, 4);
        assert_eq!(mutex.factor, 0.02);
        // the later delay option wins
        assert_eq!((mutex.delay_func)(3), Duration::from_millis(30));
    }

    #[test]
    fn test_gen_value_override() {
        let redlock = Redlock::new(vec![]);
        let mutex = redlock.new_mutex(
            "test-mutex",
            [set_gen_value_func(|| Ok("fixed-value".to_string()))],
        );
        assert_eq!((mutex.gen_value_func)().unwrap(), "fixed-value");
    }

    fn unreachable_pool() -> Arc<dyn Pool> {
        use crate::store::Conn;
        use crate::LockError;
        use async_trait::async_trait;

        struct Unreachable;

        #[async_trait]
        impl Pool for Unreachable {
            async fn get(&self) -> crate::LockResult<Box<dyn Conn>> {
                Err(LockError::BackendError("unreachable".to_string()))
            }
        }

        Arc::new(Unreachable)
    }
}
