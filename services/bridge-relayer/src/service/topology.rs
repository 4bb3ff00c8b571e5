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

use std::sync::Arc;
use std::time::Duration;

use bridge_relayer_role_provider::RoleProvider;
use bridge_relayer_topology::{TopologyHandler, TopologyHandlerArgs};
use bridge_relayer_types::clients::TopologyProvider;
use bridge_relayer_utils::timer::Timer;

/// Leader election over the whitelist as currently known by the role
/// provider.
///
/// Every question builds a fresh [`TopologyHandler`] from one whitelist
/// snapshot, so a refresh never shows up halfway through an election.
#[derive(Debug, Clone)]
pub struct LiveTopology {
    role_provider: Arc<RoleProvider>,
    timer: Arc<dyn Timer>,
    step_duration: Duration,
    address: Vec<u8>,
}

impl LiveTopology {
    /// Checks the leader window and the address up front, so that
    /// [`TopologyProvider::my_turn_as_leader`] can not fail later on.
    pub fn new(
        role_provider: Arc<RoleProvider>,
        timer: Arc<dyn Timer>,
        step_duration: Duration,
        address: Vec<u8>,
    ) -> bridge_relayer_utils::Result<Self> {
        let topology = Self {
            role_provider,
            timer,
            step_duration,
            address,
        };
        topology.snapshot()?;
        Ok(topology)
    }

    /// The election over the current whitelist.
    pub fn snapshot(&self) -> bridge_relayer_utils::Result<TopologyHandler> {
        TopologyHandler::new(
            TopologyHandlerArgs::builder()
                .sorted_public_keys(self.role_provider.sorted_public_keys())
                .timer(self.timer.clone())
                .step_duration(self.step_duration)
                .address(self.address.clone())
                .build(),
        )
    }
}

impl TopologyProvider for LiveTopology {
    fn my_turn_as_leader(&self) -> bool {
        match self.snapshot() {
            Ok(topology) => topology.my_turn_as_leader(),
            Err(error) => {
                tracing::error!(%error, "leader election failed");
                false
            }
        }
    }
}
