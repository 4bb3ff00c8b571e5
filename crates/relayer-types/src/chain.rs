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

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// A chain at one end of a bridge.
#[derive(
    Debug, Display, Clone, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum Chain {
    /// Ethereum mainnet or testnet.
    #[display(fmt = "Ethereum")]
    Ethereum,
    /// Binance smart chain.
    #[display(fmt = "Bsc")]
    Bsc,
    /// MultiversX.
    #[display(fmt = "MultiversX")]
    MultiversX,
    /// Any other EVM-compatible chain, by name.
    #[display(fmt = "{}", _0)]
    Other(String),
}

impl Chain {
    /// The lowercase name, as used in URLs.
    pub fn to_lowercase(&self) -> String {
        self.to_string().to_lowercase()
    }

    /// Whether this is the MultiversX side of the bridge.
    pub const fn is_multiversx(&self) -> bool {
        matches!(self, Self::MultiversX)
    }
}
