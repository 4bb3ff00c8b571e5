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

use bridge_relayer_utils::Error;
use parking_lot::RwLock;

use crate::{FloodPreventer, TOPIC_MIN_MESSAGES};

#[derive(Debug, Default)]
struct Counters {
    /// topic -> peer -> messages since the last reset.
    load: HashMap<String, HashMap<String, u32>>,
    /// topic -> quota.
    max_messages: HashMap<String, u32>,
}

/// The default [`FloodPreventer`].
///
/// Quotas and counters live behind one lock, so a quota change and a load
/// increase never interleave.
#[derive(Debug)]
pub struct TopicFloodPreventer {
    default_max_messages: u32,
    counters: RwLock<Counters>,
}

impl TopicFloodPreventer {
    /// Creates a preventer applying `default_max_messages` to topics without
    /// an explicit quota.
    pub fn new(default_max_messages: u32) -> bridge_relayer_utils::Result<Self> {
        if default_max_messages < TOPIC_MIN_MESSAGES {
            return Err(Error::InvalidNumberOfMessages {
                topic: String::from("*"),
                got: default_max_messages,
                min: TOPIC_MIN_MESSAGES,
            });
        }
        Ok(Self {
            default_max_messages,
            counters: RwLock::new(Counters::default()),
        })
    }

    /// The quota applied to topics without an explicit one.
    pub const fn default_max_messages(&self) -> u32 {
        self.default_max_messages
    }

    /// The quota of `topic`, without installing the default.
    pub fn max_messages_for_topic(&self, topic: &str) -> u32 {
        self.counters
            .read()
            .max_messages
            .get(topic)
            .copied()
            .unwrap_or(self.default_max_messages)
    }

    /// Messages `peer` was credited with on `topic` since the last reset.
    pub fn load(&self, peer: &str, topic: &str) -> u32 {
        self.counters
            .read()
            .load
            .get(topic)
            .and_then(|peers| peers.get(peer))
            .copied()
            .unwrap_or_default()
    }
}

impl FloodPreventer for TopicFloodPreventer {
    fn increase_load(
        &self,
        peer: &str,
        topic: &str,
        num_messages: u32,
    ) -> bridge_relayer_utils::Result<()> {
        let mut guard = self.counters.write();
        let counters = &mut *guard;
        // a topic seen for the first time gets the default quota.
        let max = *counters
            .max_messages
            .entry(topic.to_owned())
            .or_insert(self.default_max_messages);
        let current = counters
            .load
            .entry(topic.to_owned())
            .or_default()
            .entry(peer.to_owned())
            .or_default();
        match current.checked_add(num_messages) {
            Some(next) if next <= max => {
                *current = next;
                Ok(())
            }
            _ => Err(Error::SystemBusy),
        }
    }

    fn set_max_messages_for_topic(&self, topic: &str, max_num: u32) {
        self.counters
            .write()
            .max_messages
            .insert(topic.to_owned(), max_num);
    }

    fn reset_for_topic(&self, topic: &str) {
        self.counters
            .write()
            .load
            .insert(topic.to_owned(), HashMap::new());
    }

    fn topics(&self) -> Vec<String> {
        let counters = self.counters.read();
        counters
            .load
            .keys()
            .chain(counters.max_messages.keys())
            .fold(Vec::new(), |mut topics, topic| {
                if !topics.contains(topic) {
                    topics.push(topic.clone());
                }
                topics
            })
    }
}
