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
//! # Relayer Antiflood 🕸️
//!
//! Caps how many messages a single peer may be credited with on a topic
//! between two resets.
//!
//! [`TopicFloodPreventer`] does the counting; [`AntifloodHandler`] is the
//! policy surface the message gate talks to.

mod handler;
mod preventer;

pub use handler::AntifloodHandler;
pub use preventer::TopicFloodPreventer;

/// Smallest quota a topic may be given.
pub const TOPIC_MIN_MESSAGES: u32 = 1;

/// Counts messages per `(topic, peer)` against a per-topic quota.
pub trait FloodPreventer: Send + Sync + std::fmt::Debug {
    /// Credits `peer` with `num_messages` on `topic`.
    ///
    /// Fails with [`bridge_relayer_utils::Error::SystemBusy`], leaving the
    /// counter untouched, if that would take the peer over the quota.
    fn increase_load(
        &self,
        peer: &str,
        topic: &str,
        num_messages: u32,
    ) -> bridge_relayer_utils::Result<()>;
    /// Sets the quota of `topic`. Existing counters are kept as they are.
    fn set_max_messages_for_topic(&self, topic: &str, max_num: u32);
    /// Zeroes every peer counter of `topic`.
    fn reset_for_topic(&self, topic: &str);
    /// Topics that currently hold counters.
    fn topics(&self) -> Vec<String>;
}
