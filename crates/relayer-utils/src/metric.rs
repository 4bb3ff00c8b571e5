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

use prometheus::core::{AtomicF64, GenericCounter};
use prometheus::{register_counter_with_registry, Encoder, Registry, TextEncoder};

/// A struct definition for collecting metrics in the relayer.
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    /// Batches whose set-status action was executed.
    pub batches_executed: GenericCounter<AtomicF64>,
    /// Step executions that returned an error.
    pub step_errors: GenericCounter<AtomicF64>,
    /// Failed whitelist refreshes.
    pub role_provider_refresh_failures: GenericCounter<AtomicF64>,
    /// Peer messages dropped by the antiflood policy.
    pub antiflood_denials: GenericCounter<AtomicF64>,
    /// Batches the batch validator declared invalid.
    pub batch_validator_vetoes: GenericCounter<AtomicF64>,
}

impl Metrics {
    /// Instantiates the various metrics and their counters, also creates a registry for the counters and
    /// registers the counters
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let batches_executed = register_counter_with_registry!(
            "batches_executed",
            "The total number of batches relayed end to end",
            registry
        )?;

        let step_errors = register_counter_with_registry!(
            "step_errors",
            "How many times a state machine step returned an error",
            registry
        )?;

        let role_provider_refresh_failures = register_counter_with_registry!(
            "role_provider_refresh_failures",
            "How many times fetching the staked relayers failed",
            registry
        )?;

        let antiflood_denials = register_counter_with_registry!(
            "antiflood_denials",
            "Peer messages dropped because a topic quota was reached",
            registry
        )?;

        let batch_validator_vetoes = register_counter_with_registry!(
            "batch_validator_vetoes",
            "Batches rejected by the batch validator",
            registry
        )?;

        Ok(Self {
            registry,
            batches_executed,
            step_errors,
            role_provider_refresh_failures,
            antiflood_denials,
            batch_validator_vetoes,
        })
    }

    /// Renders every registered metric in the prometheus text format.
    pub fn gather(&self) -> crate::Result<String> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|_| {
            crate::Error::Generic("prometheus produced non utf-8 output")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_instances_do_not_clash() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        first.step_errors.inc();
        assert_eq!(first.step_errors.get() as u64, 1);
        assert_eq!(second.step_errors.get() as u64, 0);
    }

    #[test]
    fn gather_renders_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.batches_executed.inc_by(2.0);
        let text = metrics.gather().unwrap();
        assert!(text.contains("batches_executed 2"));
        assert!(text.contains("antiflood_denials 0"));
    }
}
