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

use tokio::time::Instant;

use bridge_relayer_config::state_machine::StateMachineConfig;
use bridge_relayer_context::Shutdown;
use bridge_relayer_state_machine::StateMachine;
use bridge_relayer_utils::metric::Metrics;
use bridge_relayer_utils::probe;
use bridge_relayer_utils::status::{
    StatusHandler, METRIC_CURRENT_STATE_MACHINE_STEP, STOPPED_STEP_VALUE,
};

/// A state machine together with the pace it is driven at.
pub(crate) struct ScheduledMachine {
    pub(crate) machine: StateMachine,
    pub(crate) config: StateMachineConfig,
    pub(crate) next_run: Instant,
}

impl ScheduledMachine {
    /// The first tick happens one step duration after `now`.
    pub(crate) fn new(
        machine: StateMachine,
        config: StateMachineConfig,
        now: Instant,
    ) -> Self {
        let next_run = now + config.duration_for(machine.current_step().as_str());
        Self {
            machine,
            config,
            next_run,
        }
    }

    async fn tick(&mut self, metrics: &Metrics) {
        if let Err(error) = self.machine.execute().await {
            metrics.step_errors.inc();
            tracing::error!(
                %error,
                machine = %self.machine.name(),
                step = %self.machine.current_step(),
                "state machine step failed"
            );
        }
        let step = self.machine.current_step();
        self.next_run = Instant::now() + self.config.duration_for(step.as_str());
    }

    fn stopped(&self) {
        self.machine
            .status_handler()
            .set_string_metric(METRIC_CURRENT_STATE_MACHINE_STEP, STOPPED_STEP_VALUE);
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::StateMachine,
            machine = %self.machine.name(),
            stopped = true,
        );
    }
}

/// Drives every machine from a single task until `shutdown` fires.
///
/// Machines due at the same instant run one after the other. A tick in
/// flight always completes; shutdown is only observed between ticks.
pub(crate) async fn drive(
    machines: &mut [ScheduledMachine],
    shutdown: &mut Shutdown,
    metrics: &Arc<Metrics>,
) {
    loop {
        let Some(next) = machines.iter().map(|m| m.next_run).min() else {
            shutdown.recv().await;
            break;
        };
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = tokio::time::sleep_until(next) => {}
        }
        let now = Instant::now();
        for scheduled in machines.iter_mut().filter(|m| m.next_run <= now) {
            scheduled.tick(metrics).await;
        }
    }
    tracing::debug!("scheduler stopped");
    for scheduled in machines.iter() {
        scheduled.stopped();
    }
}
