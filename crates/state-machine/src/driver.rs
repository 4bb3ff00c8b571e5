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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::Instrument;

use bridge_relayer_utils::probe;
use bridge_relayer_utils::status::{
    METRIC_CURRENT_STATE_MACHINE_STEP, STOPPED_STEP_VALUE,
};
use bridge_relayer_utils::timer::Timer;

use crate::StateMachine;

/// A [`StateMachine`] running its own loop: one step every
/// `duration_between_steps`, until closed or until a step fails.
#[derive(Debug)]
pub struct StateMachineLoop {
    loop_status: Arc<AtomicBool>,
    closed: AtomicBool,
    notify_close: broadcast::Sender<()>,
    handle: JoinHandle<StateMachine>,
}

impl StateMachineLoop {
    /// Spawns the loop on the current tokio runtime.
    pub fn spawn(
        machine: StateMachine,
        timer: Arc<dyn Timer>,
        duration_between_steps: Duration,
    ) -> Self {
        let (notify_close, close) = broadcast::channel(1);
        let loop_status = Arc::new(AtomicBool::new(true));
        let handle = tokio::spawn(
            run(
                machine,
                timer,
                duration_between_steps,
                close,
                loop_status.clone(),
            )
            .in_current_span(),
        );
        Self {
            loop_status,
            closed: AtomicBool::new(false),
            notify_close,
            handle,
        }
    }

    /// `true` until the loop exits.
    pub fn is_running(&self) -> bool {
        self.loop_status.load(Ordering::Acquire)
    }

    /// Asks the loop to stop at its next wake-up. Safe to call more than once.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.notify_close.send(());
        }
    }

    /// Waits for the loop to exit and hands the machine back.
    pub async fn join(self) -> bridge_relayer_utils::Result<StateMachine> {
        self.handle
            .await
            .map_err(|_| bridge_relayer_utils::Error::Generic("state machine loop panicked"))
    }
}

#[tracing::instrument(skip_all, fields(machine = %machine.name()))]
async fn run(
    mut machine: StateMachine,
    timer: Arc<dyn Timer>,
    duration_between_steps: Duration,
    mut close: broadcast::Receiver<()>,
    loop_status: Arc<AtomicBool>,
) -> StateMachine {
    loop {
        tokio::select! {
            _ = close.recv() => {
                tracing::debug!("state machine loop closed");
                break;
            }
            _ = timer.after(duration_between_steps) => {}
        }
        if let Err(e) = machine.execute().await {
            tracing::error!(
                error = %e,
                step = %machine.current_step(),
                "state machine stopped"
            );
            break;
        }
    }
    machine
        .status_handler()
        .set_string_metric(METRIC_CURRENT_STATE_MACHINE_STEP, STOPPED_STEP_VALUE);
    loop_status.store(false, Ordering::Release);
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::StateMachine,
        machine = %machine.name(),
        stopped = true,
    );
    machine
}
