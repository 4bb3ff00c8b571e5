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

#![warn(missing_docs)]
//! # Relayer State Machine 🕸️
//!
//! A graph of named steps. Each call to [`StateMachine::execute`] runs the
//! current step and moves the cursor to the step it names.
//!
//! The machine does not schedule itself: the owner calls `execute` once per
//! tick. [`driver::StateMachineLoop`] is the self-driven variant, for callers
//! that want the machine to own its loop.

use std::collections::HashMap;
use std::sync::Arc;

use bridge_relayer_utils::status::{
    StatusHandler, METRIC_CURRENT_STATE_MACHINE_STEP,
};
use bridge_relayer_utils::{probe, Error};

/// Self-driven state machine loop.
pub mod driver;

/// Name of a step in the graph.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display,
)]
pub struct StepIdentifier(pub &'static str);

impl StepIdentifier {
    /// The identifier as a string.
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

/// A node of the state graph.
#[async_trait::async_trait]
pub trait Step: Send + Sync {
    /// Runs the step and names the step to run next.
    async fn execute(&self) -> bridge_relayer_utils::Result<StepIdentifier>;
    /// The identifier this step is registered under.
    fn identifier(&self) -> StepIdentifier;
}

/// Arguments of [`StateMachine::new`].
#[derive(typed_builder::TypedBuilder)]
pub struct StateMachineArgs {
    /// Every step of the graph, by identifier.
    pub steps: HashMap<StepIdentifier, Arc<dyn Step>>,
    /// The step to start from.
    pub start_state: StepIdentifier,
    /// Receives the current step before each execution.
    pub status_handler: Arc<dyn StatusHandler>,
    /// Name used in logs.
    #[builder(default = String::from("state machine"), setter(into))]
    pub name: String,
}

/// The step driven state machine.
pub struct StateMachine {
    name: String,
    steps: HashMap<StepIdentifier, Arc<dyn Step>>,
    current: Arc<dyn Step>,
    status_handler: Arc<dyn StatusHandler>,
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("current", &self.current.identifier())
            .field("steps", &self.steps.len())
            .finish()
    }
}

impl StateMachine {
    /// Builds the machine with its cursor on `args.start_state`.
    ///
    /// Fails with [`Error::EmptyStepsMap`] for an empty graph,
    /// [`Error::MisregisteredStep`] if a step is stored under an identifier
    /// that is not its own, and [`Error::StepNotFound`] if the start state is
    /// not in the graph.
    pub fn new(args: StateMachineArgs) -> bridge_relayer_utils::Result<Self> {
        if args.steps.is_empty() {
            return Err(Error::EmptyStepsMap);
        }
        if let Some((key, step)) = args
            .steps
            .iter()
            .find(|(key, step)| **key != step.identifier())
        {
            return Err(Error::MisregisteredStep {
                key: key.to_string(),
                step: step.identifier().to_string(),
            });
        }
        let current = args
            .steps
            .get(&args.start_state)
            .cloned()
            .ok_or_else(|| Error::StepNotFound(args.start_state.to_string()))?;
        Ok(Self {
            name: args.name,
            steps: args.steps,
            current,
            status_handler: args.status_handler,
        })
    }

    /// The machine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The step the next [`StateMachine::execute`] will run.
    pub fn current_step(&self) -> StepIdentifier {
        self.current.identifier()
    }

    /// The status handler the machine reports into.
    pub fn status_handler(&self) -> &Arc<dyn StatusHandler> {
        &self.status_handler
    }

    /// Runs the current step and moves to the step it returns.
    ///
    /// A step error is returned as is and leaves the cursor in place. An
    /// identifier with no registered step fails with [`Error::StepNotFound`],
    /// also leaving the cursor in place.
    #[tracing::instrument(skip_all, fields(machine = %self.name, step = %self.current.identifier()))]
    pub async fn execute(&mut self) -> bridge_relayer_utils::Result<()> {
        let current = self.current.identifier();
        self.status_handler
            .set_string_metric(METRIC_CURRENT_STATE_MACHINE_STEP, current.as_str());
        let next = self.current.execute().await?;
        let step = self
            .steps
            .get(&next)
            .cloned()
            .ok_or_else(|| Error::StepNotFound(next.to_string()))?;
        if next != current {
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::StateMachine,
                machine = %self.name,
                from = %current,
                to = %next,
            );
        }
        self.current = step;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bridge_relayer_utils::status::InMemoryStatusHandler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub const S0: StepIdentifier = StepIdentifier("S0");
    pub const S1: StepIdentifier = StepIdentifier("S1");
    pub const S2: StepIdentifier = StepIdentifier("S2");

    /// Always moves to the same step, or fails when `next` is `None`.
    pub struct FixedStep {
        pub id: StepIdentifier,
        pub next: Option<StepIdentifier>,
        pub calls: AtomicUsize,
    }

    impl FixedStep {
        pub fn new(id: StepIdentifier, next: Option<StepIdentifier>) -> Arc<Self> {
            Arc::new(Self {
                id,
                next,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl Step for FixedStep {
        async fn execute(&self) -> bridge_relayer_utils::Result<StepIdentifier> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.next.ok_or(Error::Generic("step failed"))
        }

        fn identifier(&self) -> StepIdentifier {
            self.id
        }
    }

    pub fn steps(
        list: Vec<Arc<FixedStep>>,
    ) -> HashMap<StepIdentifier, Arc<dyn Step>> {
        list.into_iter()
            .map(|step| (step.id, step as Arc<dyn Step>))
            .collect()
    }

    pub fn machine(
        steps: HashMap<StepIdentifier, Arc<dyn Step>>,
        start: StepIdentifier,
    ) -> (StateMachine, Arc<InMemoryStatusHandler>) {
        let status = Arc::new(InMemoryStatusHandler::new("test").unwrap());
        let machine = StateMachine::new(
            StateMachineArgs::builder()
                .steps(steps)
                .start_state(start)
                .status_handler(status.clone())
                .name("test")
                .build(),
        )
        .unwrap();
        (machine, status)
    }

    fn chain() -> HashMap<StepIdentifier, Arc<dyn Step>> {
        steps(vec![
            FixedStep::new(S0, Some(S1)),
            FixedStep::new(S1, Some(S2)),
            FixedStep::new(S2, Some(S2)),
        ])
    }

    #[tokio::test]
    async fn walks_the_graph() {
        let (mut machine, status) = machine(chain(), S0);
        assert_eq!(machine.current_step(), S0);

        let mut cursor = Vec::new();
        for _ in 0..3 {
            machine.execute().await.unwrap();
            cursor.push(machine.current_step());
        }
        assert_eq!(cursor, vec![S1, S2, S2]);
        // the metric holds the step that ran last.
        assert_eq!(
            status.string_metric(METRIC_CURRENT_STATE_MACHINE_STEP),
            Some("S2".to_owned())
        );
    }

    #[tokio::test]
    async fn identical_machines_walk_identically() {
        let (mut first, _) = machine(chain(), S0);
        let (mut second, _) = machine(chain(), S0);
        for _ in 0..5 {
            first.execute().await.unwrap();
            second.execute().await.unwrap();
            assert_eq!(first.current_step(), second.current_step());
        }
    }

    #[tokio::test]
    async fn unknown_next_step_keeps_cursor() {
        let unknown = StepIdentifier("unknown");
        let (mut machine, _) = machine(
            steps(vec![
                FixedStep::new(S0, Some(S1)),
                FixedStep::new(S1, Some(unknown)),
            ]),
            S0,
        );
        machine.execute().await.unwrap();
        let err = machine.execute().await.unwrap_err();
        assert!(matches!(err, Error::StepNotFound(ref id) if id == "unknown"));
        assert_eq!(machine.current_step(), S1);
    }

    #[tokio::test]
    async fn step_error_keeps_cursor() {
        let (mut machine, _) = machine(steps(vec![FixedStep::new(S0, None)]), S0);
        assert!(machine.execute().await.is_err());
        assert_eq!(machine.current_step(), S0);
    }

    #[test]
    fn construction_errors() {
        let status: Arc<dyn StatusHandler> =
            Arc::new(InMemoryStatusHandler::new("test").unwrap());
        let build = |steps, start| {
            StateMachine::new(
                StateMachineArgs::builder()
                    .steps(steps)
                    .start_state(start)
                    .status_handler(status.clone())
                    .build(),
            )
        };

        assert!(matches!(
            build(HashMap::new(), S0),
            Err(Error::EmptyStepsMap)
        ));

        let mut misregistered = steps(vec![FixedStep::new(S0, Some(S0))]);
        misregistered.insert(S1, FixedStep::new(S2, Some(S2)));
        assert!(matches!(
            build(misregistered, S0),
            Err(Error::MisregisteredStep { .. })
        ));

        assert!(matches!(
            build(steps(vec![FixedStep::new(S0, Some(S0))]), S1),
            Err(Error::StepNotFound(_))
        ));
    }
}
