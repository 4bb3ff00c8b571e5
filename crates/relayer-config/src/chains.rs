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

use serde::{Deserialize, Serialize};

use crate::defaults;

/// The EVM side of the bridge.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EthConfig {
    /// Which EVM chain this is, for example `Ethereum` or `Bsc`.
    #[serde(default = "default_eth_chain")]
    pub chain: bridge_relayer_types::Chain,
    /// JSON-RPC endpoint. Supports `$ENV_VAR`.
    #[serde(default)]
    pub network_address: Option<bridge_relayer_types::service_url::ServiceUrl>,
    /// Bridge contract address.
    #[serde(default)]
    pub bridge_contract_address: String,
    /// Safe contract address.
    #[serde(default)]
    pub safe_contract_address: String,
    /// Ticks a quorum or proposal wait may take before giving up.
    #[serde(default = "defaults::max_retries_on_quorum_reached")]
    pub max_retries_on_quorum_reached: u64,
    /// Resend period of unconfirmed transactions.
    #[serde(default = "defaults::interval_to_resend_txs_in_seconds")]
    pub interval_to_resend_txs_in_seconds: u64,
}

fn default_eth_chain() -> bridge_relayer_types::Chain {
    bridge_relayer_types::Chain::Ethereum
}

impl Default for EthConfig {
    fn default() -> Self {
        Self {
            chain: default_eth_chain(),
            network_address: None,
            bridge_contract_address: String::new(),
            safe_contract_address: String::new(),
            max_retries_on_quorum_reached:
                defaults::max_retries_on_quorum_reached(),
            interval_to_resend_txs_in_seconds:
                defaults::interval_to_resend_txs_in_seconds(),
        }
    }
}

/// The MultiversX side of the bridge.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MultiversXConfig {
    /// Proxy endpoint. Supports `$ENV_VAR`.
    #[serde(default)]
    pub network_address: Option<bridge_relayer_types::service_url::ServiceUrl>,
    /// Multisig contract address (bech32).
    #[serde(default)]
    pub multisig_contract_address: String,
    /// How long the proxy caches chain data.
    #[serde(default = "defaults::proxy_cache_expiration_seconds")]
    pub proxy_cache_expiration_seconds: u64,
    /// Ticks a quorum or proposal wait may take before giving up.
    #[serde(default = "defaults::max_retries_on_quorum_reached")]
    pub max_retries_on_quorum_reached: u64,
    /// Resend period of unconfirmed transactions.
    #[serde(default = "defaults::interval_to_resend_txs_in_seconds")]
    pub interval_to_resend_txs_in_seconds: u64,
}

impl Default for MultiversXConfig {
    fn default() -> Self {
        Self {
            network_address: None,
            multisig_contract_address: String::new(),
            proxy_cache_expiration_seconds:
                defaults::proxy_cache_expiration_seconds(),
            max_retries_on_quorum_reached:
                defaults::max_retries_on_quorum_reached(),
            interval_to_resend_txs_in_seconds:
                defaults::interval_to_resend_txs_in_seconds(),
        }
    }
}
