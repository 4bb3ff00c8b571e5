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

use bridge_relayer_p2p::{
    MessageSigner, NetMessenger, SignatureVerifier, SignedExecution,
};
use bridge_relayer_types::clients::{Bridge, VmQueryClient};
use bridge_relayer_types::{ActionId, BatchId, TransferBatch};
use bridge_relayer_utils::Error;

fn refused(call: &'static str) -> Error {
    Error::ChainClient(format!("dry run: {call} is disabled"))
}

/// A chain that never has pending batches and refuses every transaction.
///
/// The whitelist it reports holds only the local relayer, which therefore
/// leads every window.
#[derive(Debug, Clone)]
pub struct DryRunChainClient {
    name: &'static str,
    local_address: Vec<u8>,
}

impl DryRunChainClient {
    /// Creates the client of chain `name`.
    pub fn new(name: &'static str, local_address: Vec<u8>) -> Self {
        Self {
            name,
            local_address,
        }
    }
}

#[async_trait::async_trait]
impl Bridge for DryRunChainClient {
    async fn get_pending(
        &self,
    ) -> bridge_relayer_utils::Result<Option<TransferBatch>> {
        tracing::trace!(chain = self.name, "dry run: no pending batch");
        Ok(None)
    }

    async fn propose_transfer(
        &self,
        _batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<String> {
        Err(refused("propose transfer"))
    }

    async fn was_proposed_transfer(
        &self,
        _batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<bool> {
        Ok(false)
    }

    async fn get_action_id_for_propose_transfer(
        &self,
        _batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<ActionId> {
        Err(refused("action id lookup"))
    }

    async fn propose_set_status(
        &self,
        _batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<String> {
        Err(refused("propose set status"))
    }

    async fn was_proposed_set_status(
        &self,
        _batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<bool> {
        Ok(false)
    }

    async fn get_action_id_for_set_status_on_pending_transfer(
        &self,
        _batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<ActionId> {
        Err(refused("action id lookup"))
    }

    async fn sign(
        &self,
        _action_id: ActionId,
        _batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<String> {
        Err(refused("sign"))
    }

    async fn was_signed(
        &self,
        _action_id: ActionId,
        _batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<bool> {
        Ok(false)
    }

    async fn signers_count(
        &self,
        _action_id: ActionId,
        _batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<u64> {
        Ok(0)
    }

    async fn execute(
        &self,
        _action_id: ActionId,
        _batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<String> {
        Err(refused("execute"))
    }

    async fn was_executed(
        &self,
        _action_id: ActionId,
        _batch_id: BatchId,
    ) -> bridge_relayer_utils::Result<bool> {
        Ok(false)
    }

    async fn get_transactions_statuses(
        &self,
        _batch_id: BatchId,
    ) -> bridge_relayer_utils::Result<Vec<u8>> {
        Err(refused("statuses lookup"))
    }

    async fn get_last_executed_deposit_nonce(
        &self,
    ) -> bridge_relayer_utils::Result<u64> {
        Ok(0)
    }
}

#[async_trait::async_trait]
impl SignedExecution for DryRunChainClient {
    fn message_hash(
        &self,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<Vec<u8>> {
        Ok([action_id.0.to_be_bytes(), batch.id.0.to_be_bytes()].concat())
    }

    async fn execute_with_signatures(
        &self,
        _action_id: ActionId,
        _batch: &TransferBatch,
        _signatures: Vec<Vec<u8>>,
    ) -> bridge_relayer_utils::Result<String> {
        Err(refused("execute"))
    }
}

#[async_trait::async_trait]
impl VmQueryClient for DryRunChainClient {
    async fn execute_vm_query_on_bridge_contract(
        &self,
        function: &str,
        _params: &[Vec<u8>],
    ) -> bridge_relayer_utils::Result<Vec<Vec<u8>>> {
        tracing::trace!(chain = self.name, function, "dry run: vm query");
        Ok(vec![self.local_address.clone()])
    }
}

/// Drops outbound messages after logging them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMessenger;

#[async_trait::async_trait]
impl NetMessenger for LoggingMessenger {
    async fn broadcast(
        &self,
        topic: &str,
        data: Vec<u8>,
    ) -> bridge_relayer_utils::Result<()> {
        tracing::debug!(topic, bytes = data.len(), "dry run: broadcast dropped");
        Ok(())
    }

    async fn send_to_peer(
        &self,
        topic: &str,
        data: Vec<u8>,
        peer: &str,
    ) -> bridge_relayer_utils::Result<()> {
        tracing::debug!(
            topic,
            peer,
            bytes = data.len(),
            "dry run: direct message dropped"
        );
        Ok(())
    }
}

/// Leaves messages unsigned and accepts none.
#[derive(Debug, Clone)]
pub struct NoKeys {
    public_key: Vec<u8>,
}

impl NoKeys {
    /// Advertises `public_key` on outbound messages.
    pub fn new(public_key: Vec<u8>) -> Self {
        Self { public_key }
    }
}

impl MessageSigner for NoKeys {
    fn public_key(&self) -> Vec<u8> {
        self.public_key.clone()
    }

    fn sign(&self, _message: &[u8]) -> bridge_relayer_utils::Result<Vec<u8>> {
        Ok(Vec::new())
    }
}

impl SignatureVerifier for NoKeys {
    fn verify(
        &self,
        _public_key: &[u8],
        _message: &[u8],
        _signature: &[u8],
    ) -> bridge_relayer_utils::Result<()> {
        Err(Error::InvalidSignature)
    }
}
