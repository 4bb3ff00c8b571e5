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
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Per-topic message quotas of the relayer network.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AntifloodConfig {
    /// If `false`, every peer message is accepted.
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,
    /// Quota of topics without an explicit entry.
    #[serde(default = "defaults::antiflood_default_max_messages")]
    pub default_max_messages: u32,
    /// How often all counters are zeroed.
    #[serde(default = "defaults::antiflood_reset_interval_in_seconds")]
    pub reset_interval_in_seconds: u64,
    /// Explicit quotas, by topic.
    #[serde(default)]
    pub topics: HashMap<String, u32>,
}

impl AntifloodConfig {
    /// The counter reset period.
    pub const fn reset_interval(&self) -> Duration {
        Duration::from_secs(self.reset_interval_in_seconds)
    }
}

impl Default for AntifloodConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_max_messages: defaults::antiflood_default_max_messages(),
            reset_interval_in_seconds:
                defaults::antiflood_reset_interval_in_seconds(),
            topics: HashMap::new(),
        }
    }
}
