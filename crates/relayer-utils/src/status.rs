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

use std::collections::HashMap;

use parking_lot::RwLock;

/// The step the state machine is currently running.
pub const METRIC_CURRENT_STATE_MACHINE_STEP: &str = "current state machine step";
/// Number of batches fully relayed (transfer and set-status executed).
pub const METRIC_NUM_BATCHES: &str = "num batches";
/// Deposits reported executed by the destination.
pub const METRIC_NUM_TRANSACTIONS_SUCCEEDED: &str = "num transactions succeeded";
/// Deposits reported rejected.
pub const METRIC_NUM_TRANSACTIONS_REJECTED: &str = "num transactions rejected";
/// The last error a step ran into.
pub const METRIC_LAST_ERROR: &str = "last encountered error";

/// Status handler name of the Ethereum to MultiversX direction.
pub const ETH_TO_MULTIVERSX_STATUS_HANDLER_NAME: &str = "eth-to-multiversx";
/// Status handler name of the MultiversX to Ethereum direction.
pub const MULTIVERSX_TO_ETH_STATUS_HANDLER_NAME: &str = "multiversx-to-eth";

/// Value of [`METRIC_CURRENT_STATE_MACHINE_STEP`] once a machine loop exits.
pub const STOPPED_STEP_VALUE: &str = "stopped";

/// A named bag of metrics a component reports into.
pub trait StatusHandler: Send + Sync + std::fmt::Debug {
    /// The handler name.
    fn name(&self) -> &str;
    /// Overwrites an int metric.
    fn set_int_metric(&self, metric: &str, value: i64);
    /// Adds `delta` to an int metric, starting from zero.
    fn add_int_metric(&self, metric: &str, delta: i64);
    /// Overwrites a string metric.
    fn set_string_metric(&self, metric: &str, value: &str);
    /// A snapshot of all int metrics.
    fn int_metrics(&self) -> HashMap<String, i64>;
    /// A snapshot of all string metrics.
    fn string_metrics(&self) -> HashMap<String, String>;
}

/// In-memory [`StatusHandler`].
#[derive(Debug)]
pub struct InMemoryStatusHandler {
    name: String,
    int_metrics: RwLock<HashMap<String, i64>>,
    string_metrics: RwLock<HashMap<String, String>>,
}

impl InMemoryStatusHandler {
    /// Creates a new status handler with the given name.
    ///
    /// Returns [`crate::Error::EmptyName`] if `name` is empty.
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::Error::EmptyName);
        }
        Ok(Self {
            name,
            int_metrics: Default::default(),
            string_metrics: Default::default(),
        })
    }

    /// Reads a single int metric.
    pub fn int_metric(&self, metric: &str) -> Option<i64> {
        self.int_metrics.read().get(metric).copied()
    }

    /// Reads a single string metric.
    pub fn string_metric(&self, metric: &str) -> Option<String> {
        self.string_metrics.read().get(metric).cloned()
    }
}

impl StatusHandler for InMemoryStatusHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_int_metric(&self, metric: &str, value: i64) {
        self.int_metrics.write().insert(metric.to_owned(), value);
    }

    fn add_int_metric(&self, metric: &str, delta: i64) {
        let mut guard = self.int_metrics.write();
        let entry = guard.entry(metric.to_owned()).or_default();
        *entry = entry.saturating_add(delta);
    }

    fn set_string_metric(&self, metric: &str, value: &str) {
        self.string_metrics
            .write()
            .insert(metric.to_owned(), value.to_owned());
    }

    fn int_metrics(&self) -> HashMap<String, i64> {
        self.int_metrics.read().clone()
    }

    fn string_metrics(&self) -> HashMap<String, String> {
        self.string_metrics.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_is_rejected() {
        let err = InMemoryStatusHandler::new("").unwrap_err();
        assert!(matches!(err, crate::Error::EmptyName));
    }

    #[test]
    fn int_metrics_set_and_add() {
        let handler =
            InMemoryStatusHandler::new(ETH_TO_MULTIVERSX_STATUS_HANDLER_NAME)
                .unwrap();
        assert_eq!(handler.name(), "eth-to-multiversx");

        handler.add_int_metric(METRIC_NUM_BATCHES, 2);
        handler.add_int_metric(METRIC_NUM_BATCHES, 3);
        assert_eq!(handler.int_metric(METRIC_NUM_BATCHES), Some(5));

        handler.set_int_metric(METRIC_NUM_BATCHES, 1);
        assert_eq!(handler.int_metrics().get(METRIC_NUM_BATCHES), Some(&1));
    }

    #[test]
    fn string_metrics_are_overwritten() {
        let handler = InMemoryStatusHandler::new("test").unwrap();
        handler.set_string_metric(METRIC_CURRENT_STATE_MACHINE_STEP, "a");
        handler.set_string_metric(METRIC_CURRENT_STATE_MACHINE_STEP, "b");
        assert_eq!(
            handler.string_metric(METRIC_CURRENT_STATE_MACHINE_STEP),
            Some("b".to_string())
        );
        assert_eq!(handler.string_metrics().len(), 1);
    }
}
