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
//! # Relayer Topology 🕸️
//!
//! Decides which relayer may submit proposals at a given moment.
//!
//! Time is cut in windows of `step_duration`; window `k` belongs to the
//! relayer at index `k mod N` of the sorted relayer set. Every relayer with a
//! synchronized clock and the same sorted set agrees on the leader.

use std::sync::Arc;
use std::time::Duration;

use bridge_relayer_types::clients::TopologyProvider;
use bridge_relayer_utils::timer::Timer;
use bridge_relayer_utils::Error;

/// Shortest leader window accepted.
pub const MIN_STEP_DURATION: Duration = Duration::from_secs(1);

/// Arguments of [`TopologyHandler::new`].
#[derive(typed_builder::TypedBuilder)]
pub struct TopologyHandlerArgs {
    /// Relayer public keys, sorted byte-lexicographically by the caller.
    pub sorted_public_keys: Vec<Vec<u8>>,
    /// Clock used to find the current window.
    pub timer: Arc<dyn Timer>,
    /// Length of one leader window. Sub-second precision is ignored.
    pub step_duration: Duration,
    /// The local relayer's address.
    #[builder(setter(into))]
    pub address: Vec<u8>,
}

/// An immutable snapshot of the relayer set, answering "is it my turn?".
#[derive(Debug, Clone)]
pub struct TopologyHandler {
    sorted_public_keys: Vec<Vec<u8>>,
    timer: Arc<dyn Timer>,
    step_seconds: i64,
    address: Vec<u8>,
}

impl TopologyHandler {
    /// Creates a handler over `args.sorted_public_keys`.
    ///
    /// Fails with [`Error::InvalidStepDuration`] for windows shorter than one
    /// second and [`Error::EmptyAddress`] when the local address is empty.
    pub fn new(args: TopologyHandlerArgs) -> bridge_relayer_utils::Result<Self> {
        if args.step_duration < MIN_STEP_DURATION {
            return Err(Error::InvalidStepDuration(args.step_duration));
        }
        if args.address.is_empty() {
            return Err(Error::EmptyAddress);
        }
        let step_seconds = i64::try_from(args.step_duration.as_secs())
            .map_err(|_| Error::InvalidStepDuration(args.step_duration))?;
        Ok(Self {
            sorted_public_keys: args.sorted_public_keys,
            timer: args.timer,
            step_seconds,
            address: args.address,
        })
    }

    /// Index of the current leader, `None` for an empty relayer set.
    pub fn leader_index(&self) -> Option<usize> {
        let n = i64::try_from(self.sorted_public_keys.len()).ok()?;
        if n == 0 {
            return None;
        }
        let window = self.timer.now_unix().div_euclid(self.step_seconds);
        usize::try_from(window.rem_euclid(n)).ok()
    }

    /// The current leader's public key.
    pub fn current_leader(&self) -> Option<&[u8]> {
        self.leader_index()
            .map(|index| self.sorted_public_keys[index].as_slice())
    }

    /// Number of relayers in the snapshot.
    pub fn len(&self) -> usize {
        self.sorted_public_keys.len()
    }

    /// `true` if the snapshot holds no relayer.
    pub fn is_empty(&self) -> bool {
        self.sorted_public_keys.is_empty()
    }
}

impl TopologyProvider for TopologyHandler {
    fn my_turn_as_leader(&self) -> bool {
        let is_leader = self
            .current_leader()
            .map(|leader| leader == self.address.as_slice())
            .unwrap_or(false);
        tracing::trace!(
            address = %hex::encode(&self.address),
            is_leader,
            "checked leader turn"
        );
        is_leader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::SystemTime;

    #[derive(Debug, Default)]
    struct FakeTimer {
        now: AtomicI64,
    }

    impl FakeTimer {
        fn set(&self, now: i64) {
            self.now.store(now, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl Timer for FakeTimer {
        fn now_unix(&self) -> i64 {
            self.now.load(Ordering::SeqCst)
        }
        async fn after(&self, _duration: Duration) -> SystemTime {
            SystemTime::now()
        }
        fn start(&self) {}
        fn close(&self) -> bridge_relayer_utils::Result<()> {
            Ok(())
        }
    }

    fn handler(
        keys: &[&[u8]],
        step: Duration,
        address: &[u8],
        timer: Arc<FakeTimer>,
    ) -> bridge_relayer_utils::Result<TopologyHandler> {
        TopologyHandler::new(
            TopologyHandlerArgs::builder()
                .sorted_public_keys(keys.iter().map(|k| k.to_vec()).collect())
                .timer(timer)
                .step_duration(step)
                .address(address.to_vec())
                .build(),
        )
    }

    #[test]
    fn leadership_alternates_every_step() {
        let timer = Arc::new(FakeTimer::default());
        let topology = handler(
            &[b"aaa", b"bbb"],
            Duration::from_secs(1),
            b"aaa",
            timer.clone(),
        )
        .unwrap();

        for (now, expected) in [(0, true), (1, false), (2, true), (3, false)] {
            timer.set(now);
            assert_eq!(topology.my_turn_as_leader(), expected, "at t={now}");
        }
    }

    #[test]
    fn empty_relayer_set_never_leads() {
        let timer = Arc::new(FakeTimer::default());
        let topology =
            handler(&[], Duration::from_secs(1), b"aaa", timer.clone()).unwrap();
        assert!(topology.is_empty());
        for now in 0..5 {
            timer.set(now);
            assert!(!topology.my_turn_as_leader());
        }
    }

    #[test]
    fn exactly_one_leader_per_window() {
        let keys: [&[u8]; 3] = [b"aaa", b"bbb", b"ccc"];
        let timer = Arc::new(FakeTimer::default());
        let handlers: Vec<_> = keys
            .iter()
            .map(|own| {
                handler(&keys, Duration::from_secs(2), own, timer.clone())
                    .unwrap()
            })
            .collect();

        let mut seconds_as_leader = [0u32; 3];
        // one full rotation: N * step seconds.
        for now in 100..106 {
            timer.set(now);
            let leaders: Vec<usize> = handlers
                .iter()
                .enumerate()
                .filter(|(_, h)| h.my_turn_as_leader())
                .map(|(i, _)| i)
                .collect();
            assert_eq!(leaders.len(), 1, "at t={now}");
            seconds_as_leader[leaders[0]] += 1;
        }
        assert_eq!(seconds_as_leader, [2, 2, 2]);
    }

    #[test]
    fn sub_second_steps_are_rejected() {
        let timer = Arc::new(FakeTimer::default());
        let err = handler(&[b"aaa"], Duration::from_millis(999), b"aaa", timer)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStepDuration(_)));
    }

    #[test]
    fn empty_address_is_rejected() {
        let timer = Arc::new(FakeTimer::default());
        let err =
            handler(&[b"aaa"], Duration::from_secs(1), b"", timer).unwrap_err();
        assert!(matches!(err, Error::EmptyAddress));
    }

    #[test]
    fn step_duration_is_floored_to_seconds() {
        let timer = Arc::new(FakeTimer::default());
        let topology = handler(
            &[b"aaa", b"bbb"],
            Duration::from_millis(1_900),
            b"bbb",
            timer.clone(),
        )
        .unwrap();
        timer.set(1);
        assert!(topology.my_turn_as_leader());
        assert_eq!(topology.current_leader(), Some(&b"bbb"[..]));
    }
}
