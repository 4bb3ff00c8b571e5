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
use std::sync::Arc;

use parking_lot::Mutex;

use bridge_relayer_types::clients::{Bridge, QuorumProvider};
use bridge_relayer_types::{ActionId, BatchId, TransferBatch};
use bridge_relayer_utils::Result;

use crate::{Broadcaster, MessageSigner, SignaturesHolder};

/// The bridge contract calls that depend on relayer signatures, on chains
/// where relayers sign off chain.
#[async_trait::async_trait]
pub trait SignedExecution: Send + Sync {
    /// The hash relayers sign to approve `action_id` for `batch`.
    fn message_hash(
        &self,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> Result<Vec<u8>>;
    /// Executes `action_id` for `batch` with the gathered `signatures`.
    async fn execute_with_signatures(
        &self,
        action_id: ActionId,
        batch: &TransferBatch,
        signatures: Vec<Vec<u8>>,
    ) -> Result<String>;
}

/// Arguments of [`RelayedSignaturesBridge::new`].
#[derive(typed_builder::TypedBuilder)]
pub struct RelayedSignaturesBridgeArgs {
    /// Serves the reads and proposals.
    pub inner: Arc<dyn Bridge>,
    /// Hashes and executes the approved actions.
    pub contract: Arc<dyn SignedExecution>,
    /// Carries the local signatures to the other relayers.
    pub broadcaster: Arc<Broadcaster>,
    /// Holds the signatures of the other relayers.
    pub holder: Arc<SignaturesHolder>,
    /// Signs message hashes with the local key of this chain.
    pub signer: Arc<dyn MessageSigner>,
    /// Caps the signatures handed to the contract.
    pub quorum: Arc<dyn QuorumProvider>,
}

/// A [`Bridge`] whose actions are approved over the relayer network.
///
/// Signing broadcasts a signature over the action message hash on the sign
/// topic; the signers of an action are the signatures gathered for its hash,
/// our own included, and execution hands them to the contract. The
/// `sign`, `was_signed`, `signers_count` and `execute` calls of the wrapped
/// bridge are never made.
pub struct RelayedSignaturesBridge {
    inner: Arc<dyn Bridge>,
    contract: Arc<dyn SignedExecution>,
    broadcaster: Arc<Broadcaster>,
    holder: Arc<SignaturesHolder>,
    signer: Arc<dyn MessageSigner>,
    quorum: Arc<dyn QuorumProvider>,
    own: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    hashes: Mutex<HashMap<(ActionId, BatchId), Vec<u8>>>,
}

impl std::fmt::Debug for RelayedSignaturesBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayedSignaturesBridge")
            .field("broadcaster", &self.broadcaster)
            .field("actions", &self.hashes.lock().len())
            .finish_non_exhaustive()
    }
}

impl RelayedSignaturesBridge {
    /// Wraps `args.inner`.
    pub fn new(args: RelayedSignaturesBridgeArgs) -> Self {
        Self {
            inner: args.inner,
            contract: args.contract,
            broadcaster: args.broadcaster,
            holder: args.holder,
            signer: args.signer,
            quorum: args.quorum,
            own: Mutex::new(HashMap::new()),
            hashes: Mutex::new(HashMap::new()),
        }
    }

    fn message_hash(
        &self,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> Result<Vec<u8>> {
        let hash = self.contract.message_hash(action_id, batch)?;
        self.hashes
            .lock()
            .insert((action_id, batch.id), hash.clone());
        Ok(hash)
    }

    fn gathered(&self, hash: &[u8]) -> Vec<Vec<u8>> {
        let mut signatures = self.holder.signatures(hash);
        if let Some(own) = self.own.lock().get(hash) {
            if !signatures.contains(own) {
                signatures.push(own.clone());
            }
        }
        signatures
    }

    fn forget(&self, action_id: ActionId, batch_id: BatchId) {
        let Some(hash) = self.hashes.lock().remove(&(action_id, batch_id))
        else {
            return;
        };
        self.holder.forget(&hash);
        self.own.lock().remove(&hash);
        tracing::trace!(
            %action_id,
            %batch_id,
            stored = self.holder.len(),
            "dropped signatures of a finished action"
        );
    }
}

#[async_trait::async_trait]
impl Bridge for RelayedSignaturesBridge {
    async fn get_pending(&self) -> Result<Option<TransferBatch>> {
        self.inner.get_pending().await
    }

    async fn propose_transfer(&self, batch: &TransferBatch) -> Result<String> {
        self.inner.propose_transfer(batch).await
    }

    async fn was_proposed_transfer(&self, batch: &TransferBatch) -> Result<bool> {
        self.inner.was_proposed_transfer(batch).await
    }

    async fn get_action_id_for_propose_transfer(
        &self,
        batch: &TransferBatch,
    ) -> Result<ActionId> {
        self.inner.get_action_id_for_propose_transfer(batch).await
    }

    async fn propose_set_status(&self, batch: &TransferBatch) -> Result<String> {
        self.inner.propose_set_status(batch).await
    }

    async fn was_proposed_set_status(
        &self,
        batch: &TransferBatch,
    ) -> Result<bool> {
        self.inner.was_proposed_set_status(batch).await
    }

    async fn get_action_id_for_set_status_on_pending_transfer(
        &self,
        batch: &TransferBatch,
    ) -> Result<ActionId> {
        self.inner
            .get_action_id_for_set_status_on_pending_transfer(batch)
            .await
    }

    /// Broadcasts our signature; no transaction is sent, the message hash is
    /// returned in its place.
    async fn sign(
        &self,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> Result<String> {
        let hash = self.message_hash(action_id, batch)?;
        let signature = self.signer.sign(&hash)?;
        self.broadcaster
            .broadcast_signature(signature.clone(), hash.clone())
            .await?;
        self.own.lock().insert(hash.clone(), signature);
        Ok(hex::encode(hash))
    }

    async fn was_signed(
        &self,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> Result<bool> {
        let hash = self.message_hash(action_id, batch)?;
        Ok(self.own.lock().contains_key(&hash))
    }

    async fn signers_count(
        &self,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> Result<u64> {
        let hash = self.message_hash(action_id, batch)?;
        Ok(u64::try_from(self.gathered(&hash).len()).unwrap_or(u64::MAX))
    }

    async fn execute(
        &self,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> Result<String> {
        let hash = self.message_hash(action_id, batch)?;
        let mut signatures = self.gathered(&hash);
        let quorum = self.quorum.get_quorum().await?;
        let quorum = usize::try_from(quorum).unwrap_or(usize::MAX);
        if signatures.len() > quorum {
            tracing::debug!(
                %action_id,
                quorum,
                total = signatures.len(),
                "reducing the signatures to the quorum"
            );
            signatures.truncate(quorum);
        }
        let tx_hash = self
            .contract
            .execute_with_signatures(action_id, batch, signatures)
            .await?;
        self.forget(action_id, batch.id);
        Ok(tx_hash)
    }

    async fn was_executed(
        &self,
        action_id: ActionId,
        batch_id: BatchId,
    ) -> Result<bool> {
        let executed = self.inner.was_executed(action_id, batch_id).await?;
        if executed {
            self.forget(action_id, batch_id);
        }
        Ok(executed)
    }

    async fn get_transactions_statuses(
        &self,
        batch_id: BatchId,
    ) -> Result<Vec<u8>> {
        self.inner.get_transactions_statuses(batch_id).await
    }

    async fn get_last_executed_deposit_nonce(&self) -> Result<u64> {
        self.inner.get_last_executed_deposit_nonce().await
    }
}
