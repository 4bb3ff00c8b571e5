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

use bridge_relayer_utils::Result;

use crate::batch::{ActionId, BatchId, TransferBatch};

/// One side of the bridge, as seen by the relayer.
///
/// Implementations talk to a chain (EVM or MultiversX) and are expected to
/// report its state truthfully. Every failure is surfaced as
/// [`bridge_relayer_utils::Error::ChainClient`] or any other error the client
/// runs into; the bridge steps treat all of them as recoverable.
#[async_trait::async_trait]
pub trait Bridge: Send + Sync {
    /// The next batch waiting to be relayed from this chain, if any.
    async fn get_pending(&self) -> Result<Option<TransferBatch>>;
    /// Proposes the transfer of `batch` on this chain, returning the tx hash.
    async fn propose_transfer(&self, batch: &TransferBatch) -> Result<String>;
    /// Whether a transfer proposal for `batch` exists on this chain.
    async fn was_proposed_transfer(&self, batch: &TransferBatch) -> Result<bool>;
    /// The action id of the transfer proposal for `batch`.
    async fn get_action_id_for_propose_transfer(
        &self,
        batch: &TransferBatch,
    ) -> Result<ActionId>;
    /// Proposes the deposit statuses of `batch` on this chain.
    async fn propose_set_status(&self, batch: &TransferBatch) -> Result<String>;
    /// Whether a set-status proposal for `batch` exists on this chain.
    async fn was_proposed_set_status(
        &self,
        batch: &TransferBatch,
    ) -> Result<bool>;
    /// The action id of the set-status proposal for `batch`.
    async fn get_action_id_for_set_status_on_pending_transfer(
        &self,
        batch: &TransferBatch,
    ) -> Result<ActionId>;
    /// Signs `action_id`, the proposal made for `batch`, with this
    /// relayer's key.
    async fn sign(
        &self,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> Result<String>;
    /// Whether this relayer already signed `action_id`.
    async fn was_signed(
        &self,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> Result<bool>;
    /// Number of relayers that signed `action_id`.
    async fn signers_count(
        &self,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> Result<u64>;
    /// Executes `action_id` for `batch`.
    async fn execute(
        &self,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> Result<String>;
    /// Whether `action_id` was already executed for `batch_id`.
    async fn was_executed(
        &self,
        action_id: ActionId,
        batch_id: BatchId,
    ) -> Result<bool>;
    /// Per-deposit statuses recorded on this chain for `batch_id`.
    async fn get_transactions_statuses(&self, batch_id: BatchId)
        -> Result<Vec<u8>>;
    /// Nonce of the last deposit from the other chain executed on this
    /// chain, `0` before the first one.
    async fn get_last_executed_deposit_nonce(&self) -> Result<u64>;
}

/// Source of the number of signatures an action needs.
#[async_trait::async_trait]
pub trait QuorumProvider: Send + Sync {
    /// The current quorum.
    async fn get_quorum(&self) -> Result<u64>;
}

/// Read-only view calls against the MultiversX bridge contract.
#[async_trait::async_trait]
pub trait VmQueryClient: Send + Sync {
    /// Runs `function` with `params` and returns the raw return data.
    async fn execute_vm_query_on_bridge_contract(
        &self,
        function: &str,
        params: &[Vec<u8>],
    ) -> Result<Vec<Vec<u8>>>;
}

/// Decides whether the local relayer may submit proposals right now.
pub trait TopologyProvider: Send + Sync {
    /// `true` while this relayer is the leader.
    fn my_turn_as_leader(&self) -> bool;
}

/// A fixed quorum, for deployments that do not read it from chain.
#[derive(Debug, Clone, Copy)]
pub struct FixedQuorum(pub u64);

#[async_trait::async_trait]
impl QuorumProvider for FixedQuorum {
    async fn get_quorum(&self) -> Result<u64> {
        Ok(self.0)
    }
}

/// Second opinion on a batch before it is proposed.
#[async_trait::async_trait]
pub trait BatchValidator: Send + Sync {
    /// `Ok(false)` vetoes the batch.
    async fn validate_batch(&self, batch: &TransferBatch) -> Result<bool>;
}
