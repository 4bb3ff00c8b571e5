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

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Status byte of a deposit that was executed on the destination.
pub const EXECUTED: u8 = 3;
/// Status byte of a deposit that was rejected.
pub const REJECTED: u8 = 4;

/// Identifier of a transfer batch, assigned by the source chain.
#[derive(
    Debug,
    Display,
    From,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct BatchId(pub u64);

/// Identifier of a proposal on the destination chain.
#[derive(
    Debug,
    Display,
    From,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ActionId(pub u64);

/// A single deposit inside a [`TransferBatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositTransfer {
    /// Deposit nonce on the source chain.
    pub nonce: u64,
    /// Receiver, as displayed on the destination chain.
    pub to: String,
    /// Sender, as displayed on the source chain.
    pub from: String,
    /// Token identifier.
    pub token: String,
    /// Transferred amount, in the token's smallest unit.
    pub amount: u128,
}

impl std::fmt::Display for DepositTransfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "to: {}, from: {}, token address: {}, amount: {}, deposit nonce: {}",
            self.to, self.from, self.token, self.amount, self.nonce
        )
    }
}

/// A bundle of deposits relayed together.
///
/// The relayer never changes the deposits; only the per-deposit `statuses`
/// are filled in by the bridge steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferBatch {
    /// The batch identifier.
    #[serde(rename = "batchId")]
    pub id: BatchId,
    /// The deposits, in source order.
    pub deposits: Vec<DepositTransfer>,
    /// One status byte per deposit once resolved, empty before.
    #[serde(default)]
    pub statuses: Vec<u8>,
}

impl TransferBatch {
    /// Creates a batch with no resolved statuses.
    pub fn new(id: BatchId, deposits: Vec<DepositTransfer>) -> Self {
        Self {
            id,
            deposits,
            statuses: Vec::new(),
        }
    }

    /// Sets `status` on every deposit of the batch.
    pub fn set_status_on_all_transactions(&mut self, status: u8) {
        self.statuses = vec![status; self.deposits.len()];
    }

    /// Replaces the statuses with the ones reported by a chain.
    ///
    /// The list must hold exactly one status per deposit.
    pub fn apply_statuses(
        &mut self,
        statuses: Vec<u8>,
    ) -> bridge_relayer_utils::Result<()> {
        if statuses.len() != self.deposits.len() {
            return Err(bridge_relayer_utils::Error::BatchIdStatusMismatch {
                batch_id: self.id.0,
                deposits: self.deposits.len(),
                statuses: statuses.len(),
            });
        }
        self.statuses = statuses;
        Ok(())
    }

    /// Counts the deposits carrying `status`.
    pub fn count_with_status(&self, status: u8) -> usize {
        self.statuses.iter().filter(|s| **s == status).count()
    }

    /// The JSON body sent to external services.
    pub fn to_json_bytes(&self) -> bridge_relayer_utils::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
