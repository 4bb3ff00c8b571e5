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

#![warn(missing_docs)]

//! # Relayer Configuration Module 🕸️
//!
//! A module for configuring the relayer.
//!
//! ## Overview
//!
//! The relayer configuration module is responsible for configuring the relayer.
//! Possible configuration include:
//! * `eth` and `multiversx`: endpoints and contract addresses of both chains.
//! * `p2p`: the relayer-to-relayer network.
//! * `state-machine`: step durations of each bridge direction.
//! * `relayer`: the local relayer identity, role provider and leader rotation.
//! * `antiflood`: per-topic message quotas.
//! * `batch-validator`: the optional batch validation service.
//! * `quorum`: where the signature quorum comes from.

/// Antiflood configuration
pub mod antiflood;
/// Batch validator configuration
pub mod batch_validator;
/// Chain endpoints and contracts
pub mod chains;
/// CLI configuration
#[cfg(feature = "cli")]
pub mod cli;
/// Default values of the configuration
pub mod defaults;
/// State machine configuration
pub mod state_machine;
/// Utils for processing configuration
pub mod utils;

use std::collections::HashMap;
use std::time::Duration;

use bridge_relayer_types::relayer_address::RelayerAddress;
use serde::{Deserialize, Serialize};

use antiflood::AntifloodConfig;
use batch_validator::BatchValidatorConfig;
use chains::{EthConfig, MultiversXConfig};
use state_machine::StateMachineConfig;

/// Name of the Ethereum to MultiversX state machine.
pub const ETH_TO_MULTIVERSX: &str = "eth-to-multiversx";
/// Name of the MultiversX to Ethereum state machine.
pub const MULTIVERSX_TO_ETH: &str = "multiversx-to-eth";

/// BridgeRelayerConfig is the configuration for the bridge relayer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct BridgeRelayerConfig {
    /// The EVM side of the bridge.
    #[serde(default)]
    pub eth: EthConfig,
    /// The MultiversX side of the bridge.
    #[serde(default)]
    pub multiversx: MultiversXConfig,
    /// Relayer-to-relayer network.
    #[serde(default)]
    pub p2p: P2pConfig,
    /// Step durations, by state machine name.
    #[serde(default)]
    pub state_machine: HashMap<String, StateMachineConfig>,
    /// Local relayer settings.
    #[serde(default)]
    pub relayer: RelayerSettings,
    /// Antiflood quotas.
    #[serde(default)]
    pub antiflood: AntifloodConfig,
    /// Batch validator service.
    #[serde(default)]
    pub batch_validator: BatchValidatorConfig,
    /// Quorum policy.
    #[serde(default)]
    pub quorum: QuorumConfig,
}

impl BridgeRelayerConfig {
    /// The state machine configuration for `name`, or the defaults if the
    /// config does not mention it.
    ///
    /// Config keys are matched case-insensitively.
    pub fn state_machine(&self, name: &str) -> StateMachineConfig {
        self.state_machine
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, config)| config.clone())
            .unwrap_or_default()
    }
}

/// P2P network settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct P2pConfig {
    /// Port, or port range, to listen on.
    #[serde(default = "defaults::p2p_port")]
    pub port: String,
    /// Seed of the node identity.
    #[serde(default)]
    pub seed: String,
    /// Peers to connect to at startup.
    #[serde(default)]
    pub initial_peer_list: Vec<String>,
    /// Protocol identifier shared by all relayers.
    #[serde(default = "defaults::protocol_id")]
    pub protocol_id: String,
    /// Prefix of the relayer topics (`<name>_join`, `<name>_sign`), lowercased.
    #[serde(default = "defaults::topic_name")]
    pub topic_name: String,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            port: defaults::p2p_port(),
            seed: String::new(),
            initial_peer_list: Vec::new(),
            protocol_id: defaults::protocol_id(),
            topic_name: defaults::topic_name(),
        }
    }
}

/// Settings of the local relayer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct RelayerSettings {
    /// This relayer's MultiversX address, used for leader election.
    #[serde(default)]
    pub address: RelayerAddress,
    /// Whitelist refresh settings.
    #[serde(default)]
    pub role_provider: RoleProviderConfig,
    /// Leader rotation settings.
    #[serde(default)]
    pub topology: TopologyConfig,
}

/// Role provider settings.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RoleProviderConfig {
    /// Refresh period of the whitelist.
    #[serde(default = "defaults::role_provider_polling_interval_in_millis")]
    pub polling_interval_in_millis: u64,
    /// If `false`, the whitelist is fetched once at startup.
    #[serde(default = "defaults::enabled")]
    pub use_polling: bool,
}

impl RoleProviderConfig {
    /// The polling interval as a [`Duration`].
    pub const fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_in_millis)
    }
}

impl Default for RoleProviderConfig {
    fn default() -> Self {
        Self {
            polling_interval_in_millis:
                defaults::role_provider_polling_interval_in_millis(),
            use_polling: true,
        }
    }
}

/// Leader rotation settings.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TopologyConfig {
    /// How long each relayer stays leader.
    #[serde(default = "defaults::topology_step_duration_in_seconds")]
    pub step_duration_in_seconds: u64,
}

impl TopologyConfig {
    /// The leader window as a [`Duration`].
    pub const fn step_duration(&self) -> Duration {
        Duration::from_secs(self.step_duration_in_seconds)
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            step_duration_in_seconds:
                defaults::topology_step_duration_in_seconds(),
        }
    }
}

/// Where the quorum comes from.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum QuorumPolicy {
    /// Ask the destination chain.
    #[default]
    OnChain,
    /// Use [`QuorumConfig::fixed_quorum`].
    Fixed,
}

/// Quorum settings.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct QuorumConfig {
    /// The policy.
    #[serde(default)]
    pub policy: QuorumPolicy,
    /// The quorum used by [`QuorumPolicy::Fixed`].
    #[serde(default)]
    pub fixed_quorum: Option<u64>,
}
