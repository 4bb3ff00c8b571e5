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

use bridge_relayer_types::service_url::ServiceUrl;
use serde::{Deserialize, Serialize};

use crate::defaults;

/// The optional batch validation service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BatchValidatorConfig {
    /// If `false`, every batch is considered valid.
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of the service. Supports `$ENV_VAR`.
    #[serde(default)]
    pub url: Option<ServiceUrl>,
    /// Per-request timeout.
    #[serde(default = "defaults::batch_validator_request_time_in_millis")]
    pub request_time_in_millis: u64,
}

impl BatchValidatorConfig {
    /// The per-request timeout.
    pub const fn request_time(&self) -> Duration {
        Duration::from_millis(self.request_time_in_millis)
    }
}

impl Default for BatchValidatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            request_time_in_millis:
                defaults::batch_validator_request_time_in_millis(),
        }
    }
}
