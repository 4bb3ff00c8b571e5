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

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A clock that can be replaced in tests.
///
/// Leader election and the driver loops read time only through this trait.
#[async_trait::async_trait]
pub trait Timer: Send + Sync + std::fmt::Debug {
    /// Seconds since the Unix epoch. Never decreases between two calls on the
    /// same instance.
    fn now_unix(&self) -> i64;
    /// Completes once `duration` has elapsed, yielding the wall-clock time at
    /// wake-up.
    async fn after(&self, duration: Duration) -> SystemTime;
    /// Starts the timer.
    fn start(&self);
    /// Stops the timer.
    fn close(&self) -> crate::Result<()>;
}

/// [`Timer`] backed by the system clock and tokio sleeps.
#[derive(Debug, Default)]
pub struct SystemTimer {
    started: AtomicBool,
    last_seen: AtomicI64,
}

impl SystemTimer {
    /// Creates a new, not yet started, system timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether [`Timer::start`] was called and [`Timer::close`] was not.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

#[async_trait::async_trait]
impl Timer for SystemTimer {
    fn now_unix(&self) -> i64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        // clamp wall-clock steps backwards.
        let previous = self.last_seen.fetch_max(now, Ordering::AcqRel);
        previous.max(now)
    }

    async fn after(&self, duration: Duration) -> SystemTime {
        tokio::time::sleep(duration).await;
        SystemTime::now()
    }

    fn start(&self) {
        self.started.store(true, Ordering::Release);
        tracing::trace!("system timer started");
    }

    fn close(&self) -> crate::Result<()> {
        self.started.store(false, Ordering::Release);
        tracing::trace!("system timer closed");
        Ok(())
    }
}
