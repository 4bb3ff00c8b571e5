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

mod scheduler;
mod topology;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;

use bridge_relayer_antiflood::{AntifloodHandler, TopicFloodPreventer};
use bridge_relayer_batch_validator::create_batch_validator;
use bridge_relayer_config::{
    BridgeRelayerConfig, QuorumPolicy, ETH_TO_MULTIVERSX, MULTIVERSX_TO_ETH,
};
use bridge_relayer_context::{RelayerContext, Shutdown};
use bridge_relayer_executor::steps::GET_PENDING;
use bridge_relayer_executor::{create_steps, BridgeExecutor, BridgeExecutorArgs};
use bridge_relayer_p2p::{
    Broadcaster, BroadcasterArgs, MessageSigner, NetMessenger,
    RelayedSignaturesBridge, RelayedSignaturesBridgeArgs, SignatureVerifier,
    SignaturesHolder, SignedExecution,
};
use bridge_relayer_role_provider::{RoleProvider, RoleProviderArgs};
use bridge_relayer_state_machine::{StateMachine, StateMachineArgs};
use bridge_relayer_types::clients::{
    Bridge, FixedQuorum, QuorumProvider, VmQueryClient,
};
use bridge_relayer_types::Chain;
use bridge_relayer_utils::metric::Metrics;
use bridge_relayer_utils::probe;
use bridge_relayer_utils::status::InMemoryStatusHandler;
use bridge_relayer_utils::timer::{SystemTimer, Timer};
use bridge_relayer_utils::Error;

use scheduler::ScheduledMachine;
pub use topology::LiveTopology;

/// The chain clients and network plumbing the relayer runs on.
#[derive(typed_builder::TypedBuilder)]
pub struct RelayerCollaborators {
    /// The EVM side bridge contracts. Its actions are signed over the
    /// relayer network, its own signing calls are not used.
    pub eth_bridge: Arc<dyn Bridge>,
    /// Hashes and executes EVM actions with the gathered signatures.
    pub eth_contract: Arc<dyn SignedExecution>,
    /// Signs EVM message hashes.
    pub eth_signer: Arc<dyn MessageSigner>,
    /// The MultiversX side bridge contracts.
    pub multiversx_bridge: Arc<dyn Bridge>,
    /// Read-only queries on the MultiversX bridge, used for the whitelist.
    pub multiversx_query: Arc<dyn VmQueryClient>,
    /// Quorum of actions executed on the EVM chain.
    pub eth_quorum: Arc<dyn QuorumProvider>,
    /// Quorum of actions executed on MultiversX.
    pub multiversx_quorum: Arc<dyn QuorumProvider>,
    /// Transport of the relayer network.
    pub messenger: Arc<dyn NetMessenger>,
    /// Signs relayer messages.
    pub signer: Arc<dyn MessageSigner>,
    /// Checks relayer messages.
    pub verifier: Arc<dyn SignatureVerifier>,
    /// Clock of the leader rotation.
    #[builder(default = Arc::new(SystemTimer::new()) as Arc<dyn Timer>)]
    pub timer: Arc<dyn Timer>,
}

/// One direction of the bridge, before it becomes a state machine.
struct Direction {
    name: &'static str,
    source: Arc<dyn Bridge>,
    destination: Arc<dyn Bridge>,
    source_chain: Chain,
    destination_chain: Chain,
    source_quorum: Arc<dyn QuorumProvider>,
    destination_quorum: Arc<dyn QuorumProvider>,
    max_retries: u64,
}

/// The whole relayer: both bridge directions and the services they share.
pub struct Relayer {
    metrics: Arc<Metrics>,
    antiflood_reset: std::time::Duration,
    role_provider: Arc<RoleProvider>,
    topology: Arc<LiveTopology>,
    antiflood: AntifloodHandler,
    broadcaster: Arc<Broadcaster>,
    signatures: Arc<SignaturesHolder>,
    status_handlers: HashMap<String, Arc<InMemoryStatusHandler>>,
    machines: Vec<ScheduledMachine>,
}

impl std::fmt::Debug for Relayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relayer")
            .field("broadcaster", &self.broadcaster)
            .field("machines", &self.machines.len())
            .finish_non_exhaustive()
    }
}

impl Relayer {
    /// Wires every component from the configuration in `ctx`.
    ///
    /// Must be called within a tokio runtime, the role provider starts
    /// refreshing the whitelist right away.
    pub fn new(
        ctx: RelayerContext,
        collaborators: RelayerCollaborators,
    ) -> bridge_relayer_utils::Result<Self> {
        let config = &ctx.config;
        let settings = &config.relayer;

        let role_provider = Arc::new(RoleProvider::new(
            RoleProviderArgs::builder()
                .chain_client(collaborators.multiversx_query.clone())
                .polling_interval(settings.role_provider.polling_interval())
                .use_polling(settings.role_provider.use_polling)
                .metrics(ctx.metrics.clone())
                .build(),
        )?);
        let topology = Arc::new(LiveTopology::new(
            role_provider.clone(),
            collaborators.timer.clone(),
            settings.topology.step_duration(),
            settings.address.as_bytes().to_vec(),
        )?);
        let antiflood = antiflood_from_config(config)?;

        let broadcaster = Arc::new(Broadcaster::new(
            BroadcasterArgs::builder()
                .name(config.p2p.topic_name.clone())
                .messenger(collaborators.messenger.clone())
                .whitelist(role_provider.clone())
                .verifier(collaborators.verifier.clone())
                .signer(collaborators.signer.clone())
                .antiflood(antiflood.clone())
                .metrics(ctx.metrics.clone())
                .build(),
        )?);
        let signatures = Arc::new(SignaturesHolder::new());
        broadcaster.add_broadcast_client(signatures.clone());

        let fixed_quorum: Option<Arc<dyn QuorumProvider>> =
            match config.quorum.policy {
                QuorumPolicy::OnChain => None,
                QuorumPolicy::Fixed => {
                    let quorum = config.quorum.fixed_quorum.ok_or_else(|| {
                        Error::InvalidConfig(
                            "quorum.fixed-quorum is required by the fixed policy"
                                .into(),
                        )
                    })?;
                    Some(Arc::new(FixedQuorum(quorum)))
                }
            };
        let eth_quorum = fixed_quorum
            .clone()
            .unwrap_or_else(|| collaborators.eth_quorum.clone());
        let multiversx_quorum = fixed_quorum
            .unwrap_or_else(|| collaborators.multiversx_quorum.clone());

        let eth_bridge: Arc<dyn Bridge> = Arc::new(RelayedSignaturesBridge::new(
            RelayedSignaturesBridgeArgs::builder()
                .inner(collaborators.eth_bridge.clone())
                .contract(collaborators.eth_contract.clone())
                .broadcaster(broadcaster.clone())
                .holder(signatures.clone())
                .signer(collaborators.eth_signer.clone())
                .quorum(eth_quorum.clone())
                .build(),
        ));
        let directions = [
            Direction {
                name: ETH_TO_MULTIVERSX,
                source: eth_bridge.clone(),
                destination: collaborators.multiversx_bridge.clone(),
                source_chain: config.eth.chain.clone(),
                destination_chain: Chain::MultiversX,
                source_quorum: eth_quorum.clone(),
                destination_quorum: multiversx_quorum.clone(),
                max_retries: config.multiversx.max_retries_on_quorum_reached,
            },
            Direction {
                name: MULTIVERSX_TO_ETH,
                source: collaborators.multiversx_bridge.clone(),
                destination: eth_bridge,
                source_chain: Chain::MultiversX,
                destination_chain: config.eth.chain.clone(),
                source_quorum: multiversx_quorum,
                destination_quorum: eth_quorum,
                max_retries: config.eth.max_retries_on_quorum_reached,
            },
        ];

        let now = Instant::now();
        let mut status_handlers = HashMap::new();
        let mut machines = Vec::with_capacity(directions.len());
        for direction in directions {
            let status_handler =
                Arc::new(InMemoryStatusHandler::new(direction.name)?);
            let machine = build_machine(
                &ctx,
                direction,
                topology.clone(),
                status_handler.clone(),
            )?;
            let machine_config = config.state_machine(machine.name());
            status_handlers.insert(machine.name().to_owned(), status_handler);
            machines.push(ScheduledMachine::new(machine, machine_config, now));
        }

        Ok(Self {
            metrics: ctx.metrics.clone(),
            antiflood_reset: config.antiflood.reset_interval(),
            role_provider,
            topology,
            antiflood,
            broadcaster,
            signatures,
            status_handlers,
            machines,
        })
    }

    /// The whitelist of relayers.
    pub fn role_provider(&self) -> &Arc<RoleProvider> {
        &self.role_provider
    }

    /// The leader rotation shared by both directions.
    pub fn topology(&self) -> &Arc<LiveTopology> {
        &self.topology
    }

    /// Quotas of the relayer network topics.
    pub fn antiflood(&self) -> &AntifloodHandler {
        &self.antiflood
    }

    /// The relayer message gate; inbound network messages go through
    /// [`Broadcaster::process_received_message`].
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Signatures received from other relayers.
    pub fn signatures(&self) -> &Arc<SignaturesHolder> {
        &self.signatures
    }

    /// The status handler of the state machine called `name`.
    pub fn status_handler(
        &self,
        name: &str,
    ) -> Option<Arc<InMemoryStatusHandler>> {
        self.status_handlers.get(name).cloned()
    }

    /// Runs both state machines until `shutdown` fires.
    ///
    /// The tick in flight completes before this returns. The role provider
    /// is closed on the way out.
    #[tracing::instrument(skip_all)]
    pub async fn run(
        &mut self,
        mut shutdown: Shutdown,
    ) -> bridge_relayer_utils::Result<()> {
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Lifecycle,
            relayer_running = true,
            machines = self.machines.len(),
        );
        if let Err(error) = self.broadcaster.broadcast_join_topic().await {
            tracing::warn!(%error, "failed to announce this relayer");
        }
        let reset_task = self.spawn_antiflood_reset();

        scheduler::drive(&mut self.machines, &mut shutdown, &self.metrics)
            .await;

        if let Some(task) = reset_task {
            task.abort();
        }
        self.role_provider.close();
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Lifecycle,
            relayer_running = false,
        );
        Ok(())
    }

    fn spawn_antiflood_reset(&self) -> Option<JoinHandle<()>> {
        if !self.antiflood.is_enabled() || self.antiflood_reset.is_zero() {
            return None;
        }
        let antiflood = self.antiflood.clone();
        let interval = self.antiflood_reset;
        let task = async move {
            loop {
                tokio::time::sleep(interval).await;
                antiflood.reset_all();
                tracing::trace!("antiflood counters reset");
            }
        };
        Some(tokio::spawn(task.in_current_span()))
    }
}

fn antiflood_from_config(
    config: &BridgeRelayerConfig,
) -> bridge_relayer_utils::Result<AntifloodHandler> {
    let settings = &config.antiflood;
    if !settings.enabled {
        return Ok(AntifloodHandler::disabled());
    }
    let preventer = TopicFloodPreventer::new(settings.default_max_messages)?;
    let antiflood = AntifloodHandler::new(Arc::new(preventer));
    for (topic, max_messages) in &settings.topics {
        antiflood.set_max_messages_for_topic(topic, *max_messages)?;
    }
    Ok(antiflood)
}

fn build_machine(
    ctx: &RelayerContext,
    direction: Direction,
    topology: Arc<LiveTopology>,
    status_handler: Arc<InMemoryStatusHandler>,
) -> bridge_relayer_utils::Result<StateMachine> {
    let config = &ctx.config;
    let batch_validator = create_batch_validator(
        &config.batch_validator,
        direction.source_chain,
        direction.destination_chain,
    )?;
    let executor = Arc::new(BridgeExecutor::new(
        BridgeExecutorArgs::builder()
            .name(direction.name)
            .source_bridge(direction.source)
            .destination_bridge(direction.destination)
            .topology_provider(topology)
            .destination_quorum(direction.destination_quorum)
            .source_quorum(direction.source_quorum)
            .batch_validator(batch_validator)
            .status_handler(status_handler.clone())
            .max_retries_on_quorum_reached(
                usize::try_from(direction.max_retries).unwrap_or(usize::MAX),
            )
            .step_interval(config.state_machine(direction.name).step_duration())
            .metrics(ctx.metrics.clone())
            .build(),
    ));
    StateMachine::new(
        StateMachineArgs::builder()
            .steps(create_steps(executor))
            .start_state(GET_PENDING)
            .status_handler(status_handler)
            .name(direction.name)
            .build(),
    )
}
