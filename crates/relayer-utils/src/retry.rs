// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Retry policies.
//!
//! The bridge steps poll the chains once per tick, so a retry here is a
//! "tick budget" rather than a sleep: the interval is informational and the
//! caller only cares whether [`Backoff::next_backoff`] still yields a value.

use std::time::Duration;

use backoff::backoff::Backoff;

/// Constant with Max Retry Count is a backoff policy which always returns
/// a constant duration, until it exceeds the maximum retry count.
#[derive(Debug, Clone)]
pub struct ConstantWithMaxRetryCount {
    interval: Duration,
    max_retry_count: usize,
    count: usize,
}

impl ConstantWithMaxRetryCount {
    /// Creates a new Constant backoff with `interval` and `max_retry_count`.
    ///
    /// After `max_retry_count` calls to `next_backoff` the policy returns `None`
    /// until it is [`reset`](Backoff::reset).
    pub fn new(interval: Duration, max_retry_count: usize) -> Self {
        Self {
            interval,
            max_retry_count,
            count: 0,
        }
    }

    /// Retries consumed since the last reset.
    pub const fn attempts(&self) -> usize {
        self.count
    }

    /// The configured upper bound.
    pub const fn max_retry_count(&self) -> usize {
        self.max_retry_count
    }
}

impl Backoff for ConstantWithMaxRetryCount {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.count >= self.max_retry_count {
            return None;
        }
        self.count += 1;
        Some(self.interval)
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_after_max_retries_and_recovers_on_reset() {
        let mut policy =
            ConstantWithMaxRetryCount::new(Duration::from_millis(10), 2);
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(10)));
        assert_eq!(policy.next_backoff(), Some(Duration::from_millis(10)));
        assert_eq!(policy.next_backoff(), None);
        assert_eq!(policy.attempts(), 2);

        policy.reset();
        assert_eq!(policy.attempts(), 0);
        assert!(policy.next_backoff().is_some());
    }

    #[test]
    fn zero_budget_never_retries() {
        let mut policy = ConstantWithMaxRetryCount::new(Duration::ZERO, 0);
        assert!(policy.next_backoff().is_none());
    }
}
