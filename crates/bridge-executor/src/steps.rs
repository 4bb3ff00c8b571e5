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

use bridge_relayer_state_machine::{Step, StepIdentifier};
use bridge_relayer_utils::Error;

use crate::{ActionKind, BridgeExecutor};

/// Fetches the next pending batch from the source chain.
pub const GET_PENDING: StepIdentifier = StepIdentifier("GetPending");
/// The leader proposes the transfer on the destination chain.
pub const PROPOSE_TRANSFER: StepIdentifier = StepIdentifier("ProposeTransfer");
/// Waits until the transfer proposal shows up on the destination chain.
pub const WAIT_FOR_TRANSFER_PROPOSAL: StepIdentifier =
    StepIdentifier("WaitForTransferProposal");
/// Signs the transfer action.
pub const SIGN_PROPOSED_TRANSFER: StepIdentifier =
    StepIdentifier("SignProposedTransfer");
/// Waits for the transfer action to gather a quorum.
pub const WAIT_FOR_TRANSFER_QUORUM: StepIdentifier =
    StepIdentifier("WaitForTransferQuorum");
/// The leader executes the transfer action.
pub const EXECUTE_TRANSFER: StepIdentifier = StepIdentifier("ExecuteTransfer");
/// The leader proposes the deposit statuses on the source chain.
pub const PROPOSE_SET_STATUS: StepIdentifier = StepIdentifier("ProposeSetStatus");
/// Waits until the set-status proposal shows up on the source chain.
pub const WAIT_FOR_SET_STATUS_PROPOSAL: StepIdentifier =
    StepIdentifier("WaitForSetStatusProposal");
/// Signs the set-status action.
pub const SIGN_PROPOSED_SET_STATUS: StepIdentifier =
    StepIdentifier("SignProposedSetStatus");
/// Waits for the set-status action to gather a quorum.
pub const WAIT_FOR_SET_STATUS_QUORUM: StepIdentifier =
    StepIdentifier("WaitForSetStatusQuorum");
/// The leader executes the set-status action.
pub const EXECUTE_SET_STATUS: StepIdentifier = StepIdentifier("ExecuteSetStatus");

/// Every step identifier, in pipeline order.
pub const ALL_STEPS: [StepIdentifier; 11] = [
    GET_PENDING,
    PROPOSE_TRANSFER,
    WAIT_FOR_TRANSFER_PROPOSAL,
    SIGN_PROPOSED_TRANSFER,
    WAIT_FOR_TRANSFER_QUORUM,
    EXECUTE_TRANSFER,
    PROPOSE_SET_STATUS,
    WAIT_FOR_SET_STATUS_PROPOSAL,
    SIGN_PROPOSED_SET_STATUS,
    WAIT_FOR_SET_STATUS_QUORUM,
    EXECUTE_SET_STATUS,
];

impl ActionKind {
    fn wait_for_proposal(self) -> StepIdentifier {
        match self {
            Self::Transfer => WAIT_FOR_TRANSFER_PROPOSAL,
            Self::SetStatus => WAIT_FOR_SET_STATUS_PROPOSAL,
        }
    }

    fn sign_proposed(self) -> StepIdentifier {
        match self {
            Self::Transfer => SIGN_PROPOSED_TRANSFER,
            Self::SetStatus => SIGN_PROPOSED_SET_STATUS,
        }
    }

    fn wait_for_quorum(self) -> StepIdentifier {
        match self {
            Self::Transfer => WAIT_FOR_TRANSFER_QUORUM,
            Self::SetStatus => WAIT_FOR_SET_STATUS_QUORUM,
        }
    }

    fn execute(self) -> StepIdentifier {
        match self {
            Self::Transfer => EXECUTE_TRANSFER,
            Self::SetStatus => EXECUTE_SET_STATUS,
        }
    }
}

/// Builds the full step set around `executor`.
pub fn create_steps(
    executor: Arc<BridgeExecutor>,
) -> HashMap<StepIdentifier, Arc<dyn Step>> {
    let mut steps: Vec<Arc<dyn Step>> = vec![
        Arc::new(GetPendingStep {
            executor: executor.clone(),
        }),
        Arc::new(ProposeTransferStep {
            executor: executor.clone(),
        }),
        Arc::new(ProposeSetStatusStep {
            executor: executor.clone(),
        }),
    ];
    for kind in [ActionKind::Transfer, ActionKind::SetStatus] {
        steps.push(Arc::new(WaitForProposalStep {
            executor: executor.clone(),
            kind,
        }));
        steps.push(Arc::new(SignProposedStep {
            executor: executor.clone(),
            kind,
        }));
        steps.push(Arc::new(WaitForQuorumStep {
            executor: executor.clone(),
            kind,
        }));
        steps.push(Arc::new(ExecuteStep {
            executor: executor.clone(),
            kind,
        }));
    }
    steps
        .into_iter()
        .map(|step| (step.identifier(), step))
        .collect()
}

struct GetPendingStep {
    executor: Arc<BridgeExecutor>,
}

#[async_trait::async_trait]
impl Step for GetPendingStep {
    async fn execute(&self) -> bridge_relayer_utils::Result<StepIdentifier> {
        match self.executor.fetch_pending_batch().await {
            Ok(Some(_)) => Ok(self.executor.advance(PROPOSE_TRANSFER)),
            Ok(None) => {
                tracing::debug!(
                    executor = %self.executor.name(),
                    "no pending batch"
                );
                Ok(GET_PENDING)
            }
            Err(e) => {
                self.executor.record_error(&e);
                Ok(GET_PENDING)
            }
        }
    }

    fn identifier(&self) -> StepIdentifier {
        GET_PENDING
    }
}

struct ProposeTransferStep {
    executor: Arc<BridgeExecutor>,
}

#[async_trait::async_trait]
impl Step for ProposeTransferStep {
    async fn execute(&self) -> bridge_relayer_utils::Result<StepIdentifier> {
        let executor = &self.executor;
        let Some(batch) = executor.batch() else {
            return Ok(GET_PENDING);
        };
        match executor.was_proposed(ActionKind::Transfer, &batch).await {
            Ok(true) => {
                return Ok(executor.advance(WAIT_FOR_TRANSFER_PROPOSAL))
            }
            Ok(false) => {}
            Err(e) => {
                executor.record_error(&e);
                return Ok(executor.retry_or(PROPOSE_TRANSFER, GET_PENDING));
            }
        }
        if !executor.is_leader() {
            return Ok(executor.advance(WAIT_FOR_TRANSFER_PROPOSAL));
        }
        match executor.validate_batch(&batch).await {
            Ok(true) => {}
            Ok(false) => {
                executor.record_error(&Error::ValidatorRejected {
                    batch_id: batch.id.0,
                });
                executor.reject_all_deposits();
                return Ok(executor.advance(PROPOSE_SET_STATUS));
            }
            Err(e) => {
                executor.record_error(&e);
                return Ok(executor.retry_or(PROPOSE_TRANSFER, GET_PENDING));
            }
        }
        match executor.propose_transfer(&batch).await {
            Ok(()) => Ok(executor.advance(WAIT_FOR_TRANSFER_PROPOSAL)),
            Err(e) => {
                executor.record_error(&e);
                executor.reject_all_deposits();
                Ok(executor.advance(PROPOSE_SET_STATUS))
            }
        }
    }

    fn identifier(&self) -> StepIdentifier {
        PROPOSE_TRANSFER
    }
}

struct WaitForProposalStep {
    executor: Arc<BridgeExecutor>,
    kind: ActionKind,
}

#[async_trait::async_trait]
impl Step for WaitForProposalStep {
    async fn execute(&self) -> bridge_relayer_utils::Result<StepIdentifier> {
        let executor = &self.executor;
        let Some(batch) = executor.batch() else {
            return Ok(GET_PENDING);
        };
        match executor.was_proposed(self.kind, &batch).await {
            Ok(true) => {}
            Ok(false) => {
                // the leader skipped the transfer and went for the statuses.
                if self.kind == ActionKind::Transfer
                    && matches!(
                        executor.was_proposed(ActionKind::SetStatus, &batch).await,
                        Ok(true)
                    )
                {
                    executor.reject_all_deposits();
                    return Ok(executor.advance(PROPOSE_SET_STATUS));
                }
                return Ok(executor.retry_or(self.identifier(), GET_PENDING));
            }
            Err(e) => {
                executor.record_error(&e);
                return Ok(executor.retry_or(self.identifier(), GET_PENDING));
            }
        }
        match executor.fetch_action_id(self.kind, &batch).await {
            Ok(action_id) => {
                tracing::debug!(
                    executor = %executor.name(),
                    %action_id,
                    kind = %self.kind,
                    "proposal found"
                );
                Ok(executor.advance(self.kind.sign_proposed()))
            }
            Err(e) => {
                executor.record_error(&e);
                Ok(executor.retry_or(self.identifier(), GET_PENDING))
            }
        }
    }

    fn identifier(&self) -> StepIdentifier {
        self.kind.wait_for_proposal()
    }
}

struct SignProposedStep {
    executor: Arc<BridgeExecutor>,
    kind: ActionKind,
}

#[async_trait::async_trait]
impl Step for SignProposedStep {
    async fn execute(&self) -> bridge_relayer_utils::Result<StepIdentifier> {
        let executor = &self.executor;
        let (Some(batch), Some(action_id)) =
            (executor.batch(), executor.action_id())
        else {
            return Ok(GET_PENDING);
        };
        // a batch picked up again after a drop may carry our signature.
        match executor.was_signed(self.kind, action_id, &batch).await {
            Ok(true) => {
                tracing::debug!(
                    executor = %executor.name(),
                    %action_id,
                    kind = %self.kind,
                    "action already signed"
                );
                return Ok(executor.advance(self.kind.wait_for_quorum()));
            }
            Ok(false) => {}
            Err(e) => {
                executor.record_error(&e);
                return Ok(executor.retry_or(self.identifier(), GET_PENDING));
            }
        }
        match executor.sign(self.kind, action_id, &batch).await {
            Ok(()) => Ok(executor.advance(self.kind.wait_for_quorum())),
            Err(e) => {
                executor.record_error(&e);
                Ok(executor.retry_or(self.identifier(), GET_PENDING))
            }
        }
    }

    fn identifier(&self) -> StepIdentifier {
        self.kind.sign_proposed()
    }
}

struct WaitForQuorumStep {
    executor: Arc<BridgeExecutor>,
    kind: ActionKind,
}

#[async_trait::async_trait]
impl Step for WaitForQuorumStep {
    async fn execute(&self) -> bridge_relayer_utils::Result<StepIdentifier> {
        let executor = &self.executor;
        let (Some(batch), Some(action_id)) =
            (executor.batch(), executor.action_id())
        else {
            return Ok(GET_PENDING);
        };
        match executor.is_quorum_reached(self.kind, action_id, &batch).await {
            Ok(true) => Ok(executor.advance(self.kind.execute())),
            Ok(false) => {
                // another relayer set may already have pushed it through.
                if matches!(
                    executor.was_executed(self.kind, action_id, &batch).await,
                    Ok(true)
                ) {
                    return Ok(executor.advance(self.kind.execute()));
                }
                Ok(executor.retry_or(self.identifier(), GET_PENDING))
            }
            Err(e) => {
                executor.record_error(&e);
                Ok(executor.retry_or(self.identifier(), GET_PENDING))
            }
        }
    }

    fn identifier(&self) -> StepIdentifier {
        self.kind.wait_for_quorum()
    }
}

struct ExecuteStep {
    executor: Arc<BridgeExecutor>,
    kind: ActionKind,
}

impl ExecuteStep {
    async fn on_executed(&self) -> StepIdentifier {
        let executor = &self.executor;
        match self.kind {
            ActionKind::Transfer => {
                executor.resolve_statuses_from_destination().await;
                executor.advance(PROPOSE_SET_STATUS)
            }
            ActionKind::SetStatus => {
                if let Some(batch) = executor.batch() {
                    executor.record_batch_done(&batch);
                }
                executor.reset();
                GET_PENDING
            }
        }
    }
}

#[async_trait::async_trait]
impl Step for ExecuteStep {
    async fn execute(&self) -> bridge_relayer_utils::Result<StepIdentifier> {
        let executor = &self.executor;
        let (Some(batch), Some(action_id)) =
            (executor.batch(), executor.action_id())
        else {
            return Ok(GET_PENDING);
        };
        match executor.was_executed(self.kind, action_id, &batch).await {
            Ok(true) => return Ok(self.on_executed().await),
            Ok(false) => {}
            Err(e) => {
                executor.record_error(&e);
                return Ok(executor.retry_or(self.identifier(), GET_PENDING));
            }
        }
        if !executor.is_leader() {
            return Ok(executor.retry_or(self.identifier(), GET_PENDING));
        }
        match executor.execute(self.kind, action_id, &batch).await {
            Ok(()) => Ok(self.on_executed().await),
            Err(e) => {
                executor.record_error(&e);
                Ok(executor.retry_or(self.identifier(), GET_PENDING))
            }
        }
    }

    fn identifier(&self) -> StepIdentifier {
        self.kind.execute()
    }
}

struct ProposeSetStatusStep {
    executor: Arc<BridgeExecutor>,
}

#[async_trait::async_trait]
impl Step for ProposeSetStatusStep {
    async fn execute(&self) -> bridge_relayer_utils::Result<StepIdentifier> {
        let executor = &self.executor;
        if executor.batch().map_or(false, |b| b.statuses.is_empty()) {
            executor.resolve_statuses_from_destination().await;
        }
        let Some(batch) = executor.batch() else {
            return Ok(GET_PENDING);
        };
        match executor.was_proposed(ActionKind::SetStatus, &batch).await {
            Ok(true) => {
                return Ok(executor.advance(WAIT_FOR_SET_STATUS_PROPOSAL))
            }
            Ok(false) => {}
            Err(e) => {
                executor.record_error(&e);
                return Ok(executor.retry_or(PROPOSE_SET_STATUS, GET_PENDING));
            }
        }
        if !executor.is_leader() {
            return Ok(executor.advance(WAIT_FOR_SET_STATUS_PROPOSAL));
        }
        match executor.propose_set_status(&batch).await {
            Ok(()) => Ok(executor.advance(WAIT_FOR_SET_STATUS_PROPOSAL)),
            Err(e) => {
                executor.record_error(&e);
                Ok(executor.retry_or(PROPOSE_SET_STATUS, GET_PENDING))
            }
        }
    }

    fn identifier(&self) -> StepIdentifier {
        PROPOSE_SET_STATUS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    use bridge_relayer_state_machine::{StateMachine, StateMachineArgs};
    use bridge_relayer_types::batch::{EXECUTED, REJECTED};
    use bridge_relayer_types::clients::{
        BatchValidator, Bridge, FixedQuorum, TopologyProvider,
    };
    use bridge_relayer_types::{ActionId, BatchId, DepositTransfer, TransferBatch};
    use bridge_relayer_utils::status::{
        InMemoryStatusHandler, METRIC_LAST_ERROR, METRIC_NUM_BATCHES,
        METRIC_NUM_TRANSACTIONS_REJECTED, METRIC_NUM_TRANSACTIONS_SUCCEEDED,
    };
    use parking_lot::Mutex;

    use crate::BridgeExecutorArgs;

    const TRANSFER_ACTION: ActionId = ActionId(11);
    const SET_STATUS_ACTION: ActionId = ActionId(12);

    /// In-memory chain. Signing counts as one signer.
    #[derive(Default)]
    struct StubBridge {
        pending: Mutex<Option<TransferBatch>>,
        proposed_transfer: AtomicBool,
        proposed_set_status: AtomicBool,
        fail_propose_transfer: AtomicBool,
        extra_signers: AtomicU64,
        last_executed_nonce: AtomicU64,
        signed: Mutex<HashSet<ActionId>>,
        executed: Mutex<HashSet<ActionId>>,
        statuses: Mutex<Option<Vec<u8>>>,
        proposed_statuses: Mutex<Option<Vec<u8>>>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl StubBridge {
        fn called(&self, call: &'static str) {
            self.calls.lock().push(call);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().clone()
        }
    }

    #[async_trait::async_trait]
    impl Bridge for StubBridge {
        async fn get_pending(
            &self,
        ) -> bridge_relayer_utils::Result<Option<TransferBatch>> {
            Ok(self.pending.lock().take())
        }
        async fn propose_transfer(
            &self,
            _batch: &TransferBatch,
        ) -> bridge_relayer_utils::Result<String> {
            self.called("propose_transfer");
            if self.fail_propose_transfer.load(Ordering::SeqCst) {
                return Err(Error::ChainClient("out of gas".into()));
            }
            self.proposed_transfer.store(true, Ordering::SeqCst);
            Ok("0xpropose".into())
        }
        async fn was_proposed_transfer(
            &self,
            _batch: &TransferBatch,
        ) -> bridge_relayer_utils::Result<bool> {
            Ok(self.proposed_transfer.load(Ordering::SeqCst))
        }
        async fn get_action_id_for_propose_transfer(
            &self,
            _batch: &TransferBatch,
        ) -> bridge_relayer_utils::Result<ActionId> {
            Ok(TRANSFER_ACTION)
        }
        async fn propose_set_status(
            &self,
            batch: &TransferBatch,
        ) -> bridge_relayer_utils::Result<String> {
            self.called("propose_set_status");
            *self.proposed_statuses.lock() = Some(batch.statuses.clone());
            self.proposed_set_status.store(true, Ordering::SeqCst);
            Ok("0xstatus".into())
        }
        async fn was_proposed_set_status(
            &self,
            _batch: &TransferBatch,
        ) -> bridge_relayer_utils::Result<bool> {
            Ok(self.proposed_set_status.load(Ordering::SeqCst))
        }
        async fn get_action_id_for_set_status_on_pending_transfer(
            &self,
            _batch: &TransferBatch,
        ) -> bridge_relayer_utils::Result<ActionId> {
            Ok(SET_STATUS_ACTION)
        }
        async fn sign(
            &self,
            action_id: ActionId,
            _batch: &TransferBatch,
        ) -> bridge_relayer_utils::Result<String> {
            self.called("sign");
            // the contract refuses a second signature from the same relayer.
            if !self.signed.lock().insert(action_id) {
                return Err(Error::ChainClient("already signed".into()));
            }
            Ok("0xsign".into())
        }
        async fn was_signed(
            &self,
            action_id: ActionId,
            _batch: &TransferBatch,
        ) -> bridge_relayer_utils::Result<bool> {
            Ok(self.signed.lock().contains(&action_id))
        }
        async fn signers_count(
            &self,
            action_id: ActionId,
            _batch: &TransferBatch,
        ) -> bridge_relayer_utils::Result<u64> {
            let own = u64::from(self.signed.lock().contains(&action_id));
            Ok(own + self.extra_signers.load(Ordering::SeqCst))
        }
        async fn execute(
            &self,
            action_id: ActionId,
            _batch: &TransferBatch,
        ) -> bridge_relayer_utils::Result<String> {
            self.called("execute");
            self.executed.lock().insert(action_id);
            Ok("0xexecute".into())
        }
        async fn was_executed(
            &self,
            action_id: ActionId,
            _batch_id: BatchId,
        ) -> bridge_relayer_utils::Result<bool> {
            Ok(self.executed.lock().contains(&action_id))
        }
        async fn get_transactions_statuses(
            &self,
            _batch_id: BatchId,
        ) -> bridge_relayer_utils::Result<Vec<u8>> {
            self.statuses
                .lock()
                .clone()
                .ok_or_else(|| Error::ChainClient("no statuses".into()))
        }
        async fn get_last_executed_deposit_nonce(
            &self,
        ) -> bridge_relayer_utils::Result<u64> {
            Ok(self.last_executed_nonce.load(Ordering::SeqCst))
        }
    }

    struct Leader(bool);

    impl TopologyProvider for Leader {
        fn my_turn_as_leader(&self) -> bool {
            self.0
        }
    }

    struct Validator(bool);

    #[async_trait::async_trait]
    impl BatchValidator for Validator {
        async fn validate_batch(
            &self,
            _batch: &TransferBatch,
        ) -> bridge_relayer_utils::Result<bool> {
            Ok(self.0)
        }
    }

    struct Harness {
        source: Arc<StubBridge>,
        destination: Arc<StubBridge>,
        status: Arc<InMemoryStatusHandler>,
        machine: StateMachine,
    }

    impl Harness {
        fn new(leader: bool, valid: bool, quorum: u64) -> Self {
            Self::with_quorums(leader, valid, quorum, quorum)
        }

        fn with_quorums(
            leader: bool,
            valid: bool,
            destination_quorum: u64,
            source_quorum: u64,
        ) -> Self {
            let source = Arc::new(StubBridge::default());
            *source.pending.lock() = Some(batch());
            let destination = Arc::new(StubBridge::default());
            *destination.statuses.lock() = Some(vec![EXECUTED, REJECTED]);
            let status =
                Arc::new(InMemoryStatusHandler::new("eth-to-multiversx").unwrap());
            let executor = Arc::new(BridgeExecutor::new(
                BridgeExecutorArgs::builder()
                    .name("eth-to-multiversx")
                    .source_bridge(source.clone())
                    .destination_bridge(destination.clone())
                    .topology_provider(Arc::new(Leader(leader)))
                    .destination_quorum(Arc::new(FixedQuorum(destination_quorum)))
                    .source_quorum(Arc::new(FixedQuorum(source_quorum)))
                    .batch_validator(Arc::new(Validator(valid)))
                    .status_handler(status.clone())
                    .max_retries_on_quorum_reached(2)
                    .build(),
            ));
            let machine = StateMachine::new(
                StateMachineArgs::builder()
                    .steps(create_steps(executor))
                    .start_state(GET_PENDING)
                    .status_handler(status.clone())
                    .build(),
            )
            .unwrap();
            Self {
                source,
                destination,
                status,
                machine,
            }
        }

        async fn run(&mut self, ticks: usize) -> Vec<StepIdentifier> {
            let mut visited = Vec::with_capacity(ticks);
            for _ in 0..ticks {
                self.machine.execute().await.unwrap();
                visited.push(self.machine.current_step());
            }
            visited
        }
    }

    fn deposit(nonce: u64) -> DepositTransfer {
        DepositTransfer {
            nonce,
            to: format!("erd1receiver{nonce}"),
            from: format!("0xsender{nonce}"),
            token: "WEGLD".into(),
            amount: 10,
        }
    }

    fn batch() -> TransferBatch {
        TransferBatch::new(BatchId(1), vec![deposit(1), deposit(2)])
    }

    #[tokio::test]
    async fn leader_relays_batch_end_to_end() {
        let mut harness = Harness::new(true, true, 1);
        let visited = harness.run(11).await;
        let mut expected = ALL_STEPS[1..].to_vec();
        expected.push(GET_PENDING);
        assert_eq!(visited, expected);

        assert_eq!(
            harness.destination.calls(),
            vec!["propose_transfer", "sign", "execute"]
        );
        assert_eq!(
            harness.source.calls(),
            vec!["propose_set_status", "sign", "execute"]
        );
        assert_eq!(
            *harness.source.proposed_statuses.lock(),
            Some(vec![EXECUTED, REJECTED])
        );
        assert_eq!(harness.status.int_metric(METRIC_NUM_BATCHES), Some(1));
        assert_eq!(
            harness.status.int_metric(METRIC_NUM_TRANSACTIONS_SUCCEEDED),
            Some(1)
        );
        assert_eq!(
            harness.status.int_metric(METRIC_NUM_TRANSACTIONS_REJECTED),
            Some(1)
        );

        // nothing left: the machine idles on GetPending.
        assert_eq!(harness.run(2).await, vec![GET_PENDING, GET_PENDING]);
    }

    #[tokio::test]
    async fn follower_never_proposes_nor_executes() {
        let mut harness = Harness::new(false, true, 1);
        // the leader's proposal is already on chain.
        harness.destination.proposed_transfer.store(true, Ordering::SeqCst);

        let visited = harness.run(5).await;
        assert_eq!(
            visited,
            vec![
                PROPOSE_TRANSFER,
                WAIT_FOR_TRANSFER_PROPOSAL,
                SIGN_PROPOSED_TRANSFER,
                WAIT_FOR_TRANSFER_QUORUM,
                EXECUTE_TRANSFER,
            ]
        );
        // waiting for the leader to execute.
        assert_eq!(harness.run(1).await, vec![EXECUTE_TRANSFER]);
        harness.destination.executed.lock().insert(TRANSFER_ACTION);
        assert_eq!(harness.run(1).await, vec![PROPOSE_SET_STATUS]);

        assert_eq!(harness.destination.calls(), vec!["sign"]);
        assert!(harness.source.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_quorum_drops_batch_after_retries() {
        let mut harness = Harness::new(true, true, 3);
        let visited = harness.run(7).await;
        assert_eq!(
            &visited[3..],
            &[
                WAIT_FOR_TRANSFER_QUORUM,
                WAIT_FOR_TRANSFER_QUORUM,
                WAIT_FOR_TRANSFER_QUORUM,
                GET_PENDING,
            ]
        );
        assert!(!harness.destination.calls().contains(&"execute"));
    }

    #[tokio::test]
    async fn dropped_batch_picked_up_again_is_not_signed_twice() {
        let mut harness = Harness::new(true, true, 3);
        assert_eq!(harness.run(7).await[6], GET_PENDING);

        *harness.source.pending.lock() = Some(batch());
        let visited = harness.run(4).await;
        assert_eq!(
            visited,
            vec![
                PROPOSE_TRANSFER,
                WAIT_FOR_TRANSFER_PROPOSAL,
                SIGN_PROPOSED_TRANSFER,
                WAIT_FOR_TRANSFER_QUORUM,
            ]
        );
        assert_eq!(
            harness.destination.calls(),
            vec!["propose_transfer", "sign"]
        );

        // the other relayers catch up and the transfer goes through.
        harness.destination.extra_signers.store(2, Ordering::SeqCst);
        assert_eq!(harness.run(2).await, vec![EXECUTE_TRANSFER, PROPOSE_SET_STATUS]);
        assert_eq!(
            harness.destination.calls(),
            vec!["propose_transfer", "sign", "execute"]
        );
    }

    #[tokio::test]
    async fn gapped_deposit_nonces_keep_the_batch_out() {
        let mut harness = Harness::new(true, true, 1);
        harness.destination.last_executed_nonce.store(5, Ordering::SeqCst);
        assert_eq!(harness.run(1).await, vec![GET_PENDING]);
        let last_error = harness.status.string_metric(METRIC_LAST_ERROR).unwrap();
        assert!(last_error.contains("Invalid deposit nonce 1 in batch 1, expected 6"));

        harness.destination.last_executed_nonce.store(0, Ordering::SeqCst);
        *harness.source.pending.lock() =
            Some(TransferBatch::new(BatchId(2), vec![deposit(1), deposit(3)]));
        assert_eq!(harness.run(1).await, vec![GET_PENDING]);
        let last_error = harness.status.string_metric(METRIC_LAST_ERROR).unwrap();
        assert!(last_error.contains("Invalid deposit nonce 3 in batch 2, expected 2"));
        assert!(harness.destination.calls().is_empty());

        *harness.source.pending.lock() = Some(batch());
        assert_eq!(harness.run(1).await, vec![PROPOSE_TRANSFER]);
    }

    #[tokio::test]
    async fn each_action_is_held_to_the_quorum_of_its_chain() {
        let mut harness = Harness::with_quorums(true, true, 1, 2);
        let visited = harness.run(10).await;
        // one signature is enough on the destination.
        assert_eq!(visited[4], EXECUTE_TRANSFER);
        assert_eq!(
            &visited[8..],
            &[WAIT_FOR_SET_STATUS_QUORUM, WAIT_FOR_SET_STATUS_QUORUM]
        );
        assert!(!harness.source.calls().contains(&"execute"));

        harness.source.extra_signers.store(1, Ordering::SeqCst);
        assert_eq!(harness.run(2).await, vec![EXECUTE_SET_STATUS, GET_PENDING]);
        assert_eq!(
            harness.source.calls(),
            vec!["propose_set_status", "sign", "execute"]
        );
    }

    #[tokio::test]
    async fn vetoed_batch_is_rejected_on_source() {
        let mut harness = Harness::new(true, false, 1);
        let visited = harness.run(3).await;
        assert_eq!(
            visited,
            vec![PROPOSE_TRANSFER, PROPOSE_SET_STATUS, WAIT_FOR_SET_STATUS_PROPOSAL]
        );
        assert!(harness.destination.calls().is_empty());
        assert_eq!(
            *harness.source.proposed_statuses.lock(),
            Some(vec![REJECTED, REJECTED])
        );
        let last_error = harness.status.string_metric(METRIC_LAST_ERROR).unwrap();
        assert!(last_error.contains("rejected by the batch validator"));
    }

    #[tokio::test]
    async fn failed_proposal_rejects_every_deposit() {
        let mut harness = Harness::new(true, true, 1);
        harness
            .destination
            .fail_propose_transfer
            .store(true, Ordering::SeqCst);
        let visited = harness.run(3).await;
        assert_eq!(visited[1], PROPOSE_SET_STATUS);
        assert_eq!(
            *harness.source.proposed_statuses.lock(),
            Some(vec![REJECTED, REJECTED])
        );
    }

    #[tokio::test]
    async fn status_mismatch_falls_back_to_rejected() {
        let mut harness = Harness::new(true, true, 1);
        *harness.destination.statuses.lock() = Some(vec![EXECUTED]);
        harness.run(7).await;
        assert_eq!(
            *harness.source.proposed_statuses.lock(),
            Some(vec![REJECTED, REJECTED])
        );
        let last_error = harness.status.string_metric(METRIC_LAST_ERROR).unwrap();
        assert!(last_error.contains("mismatch"));
    }

    #[tokio::test]
    async fn executed_action_is_not_executed_twice() {
        let mut harness = Harness::new(true, true, 1);
        harness.run(5).await;
        assert_eq!(harness.machine.current_step(), EXECUTE_TRANSFER);
        harness.destination.executed.lock().insert(TRANSFER_ACTION);
        assert_eq!(harness.run(1).await, vec![PROPOSE_SET_STATUS]);
        assert!(!harness.destination.calls().contains(&"execute"));
    }

    #[test]
    fn step_set_covers_every_identifier() {
        let harness_executor = Arc::new(BridgeExecutor::new(
            BridgeExecutorArgs::builder()
                .name("test")
                .source_bridge(Arc::new(StubBridge::default()))
                .destination_bridge(Arc::new(StubBridge::default()))
                .topology_provider(Arc::new(Leader(true)))
                .destination_quorum(Arc::new(FixedQuorum(1)))
                .source_quorum(Arc::new(FixedQuorum(1)))
                .batch_validator(Arc::new(Validator(true)))
                .status_handler(Arc::new(
                    InMemoryStatusHandler::new("test").unwrap(),
                ))
                .build(),
        ));
        let steps = create_steps(harness_executor);
        assert_eq!(steps.len(), ALL_STEPS.len());
        for id in ALL_STEPS {
            assert_eq!(steps[&id].identifier(), id);
        }
    }
}
