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

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Timing of one state machine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StateMachineConfig {
    /// Delay between two steps unless the step overrides it.
    #[serde(default = "defaults::step_duration_in_millis")]
    pub step_duration_in_millis: u64,
    /// Per-step overrides.
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self {
            step_duration_in_millis: defaults::step_duration_in_millis(),
            steps: Vec::new(),
        }
    }
}

impl StateMachineConfig {
    /// The default delay between two steps.
    pub const fn step_duration(&self) -> Duration {
        Duration::from_millis(self.step_duration_in_millis)
    }

    /// The delay to wait after `step`.
    pub fn duration_for(&self, step: &str) -> Duration {
        self.steps
            .iter()
            .find(|s| s.name == step)
            .map(|s| Duration::from_millis(s.duration_in_millis))
            .unwrap_or_else(|| self.step_duration())
    }
}

/// Delay override of a single step.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StepConfig {
    /// The step identifier.
    pub name: String,
    /// Delay after the step.
    pub duration_in_millis: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_override_wins_over_default() {
        let config = StateMachineConfig {
            step_duration_in_millis: 500,
            steps: vec![StepConfig {
                name: "GetPending".into(),
                duration_in_millis: 2_000,
            }],
        };
        assert_eq!(config.duration_for("GetPending"), Duration::from_secs(2));
        assert_eq!(
            config.duration_for("ProposeTransfer"),
            Duration::from_millis(500)
        );
    }
}
