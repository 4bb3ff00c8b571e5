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

use backoff::backoff::Backoff;
use parking_lot::Mutex;

use bridge_relayer_state_machine::StepIdentifier;
use bridge_relayer_types::batch::{EXECUTED, REJECTED};
use bridge_relayer_types::clients::{
    BatchValidator, Bridge, QuorumProvider, TopologyProvider,
};
use bridge_relayer_types::{ActionId, TransferBatch};
use bridge_relayer_utils::metric::Metrics;
use bridge_relayer_utils::retry::ConstantWithMaxRetryCount;
use bridge_relayer_utils::status::{
    StatusHandler, METRIC_LAST_ERROR, METRIC_NUM_BATCHES,
    METRIC_NUM_TRANSACTIONS_REJECTED, METRIC_NUM_TRANSACTIONS_SUCCEEDED,
};
use bridge_relayer_utils::{probe, Error};

use crate::ActionKind;

/// Arguments of [`BridgeExecutor::new`].
#[derive(typed_builder::TypedBuilder)]
pub struct BridgeExecutorArgs {
    /// Name used in logs, usually the direction.
    #[builder(setter(into))]
    pub name: String,
    /// The chain batches come from. Set-status actions run here.
    pub source_bridge: Arc<dyn Bridge>,
    /// The chain batches go to. Transfer actions run here.
    pub destination_bridge: Arc<dyn Bridge>,
    /// Whether this relayer leads the current window.
    pub topology_provider: Arc<dyn TopologyProvider>,
    /// Signatures needed to execute a transfer on the destination chain.
    pub destination_quorum: Arc<dyn QuorumProvider>,
    /// Signatures needed to execute a set-status on the source chain.
    pub source_quorum: Arc<dyn QuorumProvider>,
    /// Consulted by the leader before proposing a transfer.
    pub batch_validator: Arc<dyn BatchValidator>,
    /// Receives the per-direction counters.
    pub status_handler: Arc<dyn StatusHandler>,
    /// Ticks a wait may stay unresolved before the batch is dropped.
    #[builder(default = 3)]
    pub max_retries_on_quorum_reached: usize,
    /// Nominal time between two ticks, for logs only.
    #[builder(default = Duration::from_secs(12))]
    pub step_interval: Duration,
    /// Process wide counters.
    #[builder(default, setter(strip_option))]
    pub metrics: Option<Arc<Metrics>>,
}

#[derive(Debug)]
struct State {
    batch: Option<TransferBatch>,
    action_id: Option<ActionId>,
    retries: ConstantWithMaxRetryCount,
}

/// Holds the batch in flight for one bridge direction and performs the chain
/// calls of the bridge steps.
///
/// Steps of one machine run one at a time, so the state lock is never
/// contended; it is never held across a chain call.
pub struct BridgeExecutor {
    name: String,
    source_bridge: Arc<dyn Bridge>,
    destination_bridge: Arc<dyn Bridge>,
    topology_provider: Arc<dyn TopologyProvider>,
    destination_quorum: Arc<dyn QuorumProvider>,
    source_quorum: Arc<dyn QuorumProvider>,
    batch_validator: Arc<dyn BatchValidator>,
    status_handler: Arc<dyn StatusHandler>,
    metrics: Option<Arc<Metrics>>,
    state: Mutex<State>,
}

impl std::fmt::Debug for BridgeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeExecutor")
            .field("name", &self.name)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl BridgeExecutor {
    /// Creates an executor with no batch in flight.
    pub fn new(args: BridgeExecutorArgs) -> Self {
        Self {
            name: args.name,
            source_bridge: args.source_bridge,
            destination_bridge: args.destination_bridge,
            topology_provider: args.topology_provider,
            destination_quorum: args.destination_quorum,
            source_quorum: args.source_quorum,
            batch_validator: args.batch_validator,
            status_handler: args.status_handler,
            metrics: args.metrics,
            state: Mutex::new(State {
                batch: None,
                action_id: None,
                retries: ConstantWithMaxRetryCount::new(
                    args.step_interval,
                    args.max_retries_on_quorum_reached,
                ),
            }),
        }
    }

    /// The executor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The status handler the executor reports into.
    pub fn status_handler(&self) -> &Arc<dyn StatusHandler> {
        &self.status_handler
    }

    /// `true` while this relayer leads the current window.
    pub fn is_leader(&self) -> bool {
        self.topology_provider.my_turn_as_leader()
    }

    /// A copy of the batch in flight.
    pub fn batch(&self) -> Option<TransferBatch> {
        self.state.lock().batch.clone()
    }

    /// The action being signed or executed.
    pub fn action_id(&self) -> Option<ActionId> {
        self.state.lock().action_id
    }

    fn bridge_for(&self, kind: ActionKind) -> &Arc<dyn Bridge> {
        match kind {
            ActionKind::Transfer => &self.destination_bridge,
            ActionKind::SetStatus => &self.source_bridge,
        }
    }

    fn quorum_for(&self, kind: ActionKind) -> &Arc<dyn QuorumProvider> {
        match kind {
            ActionKind::Transfer => &self.destination_quorum,
            ActionKind::SetStatus => &self.source_quorum,
        }
    }

    /// Drops the batch in flight.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.batch = None;
        state.action_id = None;
        state.retries.reset();
    }

    /// Fetches the next pending batch from the source chain and makes it the
    /// batch in flight.
    ///
    /// The deposits must continue right after the last deposit the
    /// destination executed; otherwise the batch is not taken.
    pub async fn fetch_pending_batch(
        &self,
    ) -> bridge_relayer_utils::Result<Option<TransferBatch>> {
        self.reset();
        let batch = self.source_bridge.get_pending().await?;
        if let Some(batch) = &batch {
            let last_nonce = self
                .destination_bridge
                .get_last_executed_deposit_nonce()
                .await?;
            verify_deposit_nonces(batch, last_nonce)?;
            tracing::info!(
                executor = %self.name,
                batch_id = %batch.id,
                deposits = batch.deposits.len(),
                "fetched new batch"
            );
            self.state.lock().batch = Some(batch.clone());
        }
        Ok(batch)
    }

    /// Asks the batch validator about `batch`.
    pub async fn validate_batch(
        &self,
        batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<bool> {
        let valid = self.batch_validator.validate_batch(batch).await?;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::BatchValidator,
            executor = %self.name,
            batch_id = %batch.id,
            valid,
        );
        if !valid {
            if let Some(metrics) = &self.metrics {
                metrics.batch_validator_vetoes.inc();
            }
        }
        Ok(valid)
    }

    /// Proposes the transfer of `batch` on the destination chain.
    pub async fn propose_transfer(
        &self,
        batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<()> {
        let hash = self.destination_bridge.propose_transfer(batch).await?;
        tracing::info!(
            executor = %self.name,
            batch_id = %batch.id,
            tx_hash = %hash,
            "proposed transfer"
        );
        Ok(())
    }

    /// Proposes the deposit statuses of `batch` on the source chain.
    pub async fn propose_set_status(
        &self,
        batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<()> {
        let hash = self.source_bridge.propose_set_status(batch).await?;
        tracing::info!(
            executor = %self.name,
            batch_id = %batch.id,
            statuses = ?batch.statuses,
            tx_hash = %hash,
            "proposed set status"
        );
        Ok(())
    }

    /// Whether the `kind` action for `batch` was proposed.
    pub async fn was_proposed(
        &self,
        kind: ActionKind,
        batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<bool> {
        let bridge = self.bridge_for(kind);
        match kind {
            ActionKind::Transfer => bridge.was_proposed_transfer(batch).await,
            ActionKind::SetStatus => bridge.was_proposed_set_status(batch).await,
        }
    }

    /// Reads the action id of the `kind` proposal for `batch` and makes it
    /// the action in flight.
    pub async fn fetch_action_id(
        &self,
        kind: ActionKind,
        batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<ActionId> {
        let bridge = self.bridge_for(kind);
        let action_id = match kind {
            ActionKind::Transfer => {
                bridge.get_action_id_for_propose_transfer(batch).await?
            }
            ActionKind::SetStatus => {
                bridge
                    .get_action_id_for_set_status_on_pending_transfer(batch)
                    .await?
            }
        };
        self.state.lock().action_id = Some(action_id);
        Ok(action_id)
    }

    /// Whether this relayer already signed `action_id` on the chain of `kind`.
    pub async fn was_signed(
        &self,
        kind: ActionKind,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<bool> {
        self.bridge_for(kind).was_signed(action_id, batch).await
    }

    /// Signs `action_id` on the chain of `kind`.
    pub async fn sign(
        &self,
        kind: ActionKind,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<()> {
        let hash = self.bridge_for(kind).sign(action_id, batch).await?;
        tracing::info!(
            executor = %self.name,
            %action_id,
            %kind,
            tx_hash = %hash,
            "signed action"
        );
        Ok(())
    }

    /// Whether `action_id` gathered enough signatures on the chain of `kind`.
    pub async fn is_quorum_reached(
        &self,
        kind: ActionKind,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<bool> {
        let signers = self
            .bridge_for(kind)
            .signers_count(action_id, batch)
            .await?;
        let quorum = self.quorum_for(kind).get_quorum().await?;
        tracing::info!(
            executor = %self.name,
            %action_id,
            %kind,
            signers,
            quorum,
            "got signatures"
        );
        Ok(signers >= quorum)
    }

    /// Whether `action_id` was executed for the batch in flight.
    pub async fn was_executed(
        &self,
        kind: ActionKind,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<bool> {
        self.bridge_for(kind).was_executed(action_id, batch.id).await
    }

    /// Executes `action_id` on the chain of `kind`.
    pub async fn execute(
        &self,
        kind: ActionKind,
        action_id: ActionId,
        batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<()> {
        let hash = self.bridge_for(kind).execute(action_id, batch).await?;
        tracing::info!(
            executor = %self.name,
            %action_id,
            %kind,
            batch_id = %batch.id,
            tx_hash = %hash,
            "executed action"
        );
        Ok(())
    }

    /// Fills the statuses of the batch in flight from the destination chain.
    ///
    /// Any failure, including a status list that does not match the deposits,
    /// marks every deposit as rejected so the source still learns an outcome.
    pub async fn resolve_statuses_from_destination(&self) {
        let Some(batch) = self.batch() else {
            return;
        };
        let resolved = match self
            .destination_bridge
            .get_transactions_statuses(batch.id)
            .await
        {
            Ok(statuses) => {
                let mut resolved = batch.clone();
                resolved.apply_statuses(statuses).map(|()| resolved)
            }
            Err(e) => Err(e),
        };
        let batch = match resolved {
            Ok(batch) => batch,
            Err(e) => {
                self.record_error(&e);
                let mut rejected = batch;
                rejected.set_status_on_all_transactions(REJECTED);
                rejected
            }
        };
        tracing::debug!(
            executor = %self.name,
            batch_id = %batch.id,
            statuses = ?batch.statuses,
            "resolved deposit statuses"
        );
        self.state.lock().batch = Some(batch);
    }

    /// Marks every deposit of the batch in flight as rejected.
    pub fn reject_all_deposits(&self) {
        if let Some(batch) = self.state.lock().batch.as_mut() {
            batch.set_status_on_all_transactions(REJECTED);
        }
    }

    /// Counts the batch in flight as done: its statuses reached the source.
    pub fn record_batch_done(&self, batch: &TransferBatch) {
        let succeeded = batch.count_with_status(EXECUTED);
        let rejected = batch.count_with_status(REJECTED);
        self.status_handler.add_int_metric(METRIC_NUM_BATCHES, 1);
        self.status_handler.add_int_metric(
            METRIC_NUM_TRANSACTIONS_SUCCEEDED,
            i64::try_from(succeeded).unwrap_or(i64::MAX),
        );
        self.status_handler.add_int_metric(
            METRIC_NUM_TRANSACTIONS_REJECTED,
            i64::try_from(rejected).unwrap_or(i64::MAX),
        );
        if let Some(metrics) = &self.metrics {
            metrics.batches_executed.inc();
        }
        tracing::info!(
            executor = %self.name,
            batch_id = %batch.id,
            succeeded,
            rejected,
            "batch relayed"
        );
    }

    /// Logs `error` and keeps it as the last error of this direction.
    pub fn record_error(&self, error: &Error) {
        tracing::error!(executor = %self.name, %error, "bridge step failed");
        self.status_handler
            .set_string_metric(METRIC_LAST_ERROR, &error.to_string());
        if let Some(metrics) = &self.metrics {
            metrics.step_errors.inc();
        }
    }

    /// Moves forward to `next`, giving it a fresh retry budget.
    pub fn advance(&self, next: StepIdentifier) -> StepIdentifier {
        self.state.lock().retries.reset();
        next
    }

    /// Stays on `current` while the retry budget lasts, then gives up on the
    /// batch and goes back to `give_up`.
    pub fn retry_or(
        &self,
        current: StepIdentifier,
        give_up: StepIdentifier,
    ) -> StepIdentifier {
        let mut state = self.state.lock();
        match state.retries.next_backoff() {
            Some(_) => current,
            None => {
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::DEBUG,
                    kind = %probe::Kind::Retry,
                    executor = %self.name,
                    step = %current,
                    attempts = state.retries.attempts(),
                    exhausted = true,
                );
                tracing::warn!(
                    executor = %self.name,
                    step = %current,
                    max_retries = state.retries.max_retry_count(),
                    "retries exhausted, dropping the batch"
                );
                state.retries.reset();
                give_up
            }
        }
    }
}

fn verify_deposit_nonces(
    batch: &TransferBatch,
    last_nonce: u64,
) -> bridge_relayer_utils::Result<()> {
    let mut expected = last_nonce.saturating_add(1);
    for deposit in &batch.deposits {
        if deposit.nonce != expected {
            return Err(Error::InvalidDepositNonce {
                batch_id: batch.id.0,
                got: deposit.nonce,
                expected,
            });
        }
        expected = expected.saturating_add(1);
    }
    Ok(())
}
