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

use bridge_relayer_utils::{probe, Error};

use crate::{FloodPreventer, TOPIC_MIN_MESSAGES};

/// Policy wrapper around a [`FloodPreventer`].
#[derive(Debug, Clone)]
pub struct AntifloodHandler {
    preventer: Option<Arc<dyn FloodPreventer>>,
}

impl AntifloodHandler {
    /// Creates a handler enforcing the quotas of `preventer`.
    pub fn new(preventer: Arc<dyn FloodPreventer>) -> Self {
        Self {
            preventer: Some(preventer),
        }
    }

    /// A handler that lets every message through.
    pub fn disabled() -> Self {
        Self { preventer: None }
    }

    /// `false` for [`AntifloodHandler::disabled`].
    pub fn is_enabled(&self) -> bool {
        self.preventer.is_some()
    }

    /// Charges `num_messages` to `peer` on `topic`.
    ///
    /// A denied message surfaces as [`Error::CannotProcessMessage`] carrying
    /// the preventer's reason; the caller is expected to drop it.
    pub fn can_process_message(
        &self,
        peer: &str,
        topic: &str,
        num_messages: u32,
    ) -> bridge_relayer_utils::Result<()> {
        let Some(preventer) = &self.preventer else {
            return Ok(());
        };
        preventer
            .increase_load(peer, topic, num_messages)
            .map_err(|reason| {
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::DEBUG,
                    kind = %probe::Kind::Antiflood,
                    peer,
                    topic,
                    num_messages,
                    denied = true,
                );
                Error::CannotProcessMessage {
                    peer: peer.to_owned(),
                    topic: topic.to_owned(),
                    reason: Box::new(reason),
                }
            })
    }

    /// Sets the quota of `topic`, which must be at least
    /// [`TOPIC_MIN_MESSAGES`].
    pub fn set_max_messages_for_topic(
        &self,
        topic: &str,
        max_num: u32,
    ) -> bridge_relayer_utils::Result<()> {
        if max_num < TOPIC_MIN_MESSAGES {
            return Err(Error::InvalidNumberOfMessages {
                topic: topic.to_owned(),
                got: max_num,
                min: TOPIC_MIN_MESSAGES,
            });
        }
        if let Some(preventer) = &self.preventer {
            preventer.set_max_messages_for_topic(topic, max_num);
        }
        Ok(())
    }

    /// Zeroes every peer counter of `topic`.
    pub fn reset_for_topic(&self, topic: &str) {
        if let Some(preventer) = &self.preventer {
            preventer.reset_for_topic(topic);
        }
    }

    /// Zeroes the counters of every known topic.
    pub fn reset_all(&self) {
        if let Some(preventer) = &self.preventer {
            for topic in preventer.topics() {
                preventer.reset_for_topic(&topic);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TopicFloodPreventer;

    const PEER: &str = "peer";
    const TOPIC: &str = "relayers_sign";

    fn handler(default_quota: u32) -> AntifloodHandler {
        AntifloodHandler::new(Arc::new(
            TopicFloodPreventer::new(default_quota).unwrap(),
        ))
    }

    #[test]
    fn denial_names_peer_and_topic() {
        let handler = handler(10);
        handler.set_max_messages_for_topic(TOPIC, 5).unwrap();
        for _ in 0..5 {
            handler.can_process_message(PEER, TOPIC, 1).unwrap();
        }
        let err = handler.can_process_message(PEER, TOPIC, 1).unwrap_err();
        match err {
            Error::CannotProcessMessage {
                peer,
                topic,
                reason,
            } => {
                assert_eq!(peer, PEER);
                assert_eq!(topic, TOPIC);
                assert!(matches!(*reason, Error::SystemBusy));
            }
            other => panic!("unexpected error: {other}"),
        }

        handler.reset_for_topic(TOPIC);
        for _ in 0..5 {
            handler.can_process_message(PEER, TOPIC, 1).unwrap();
        }
    }

    #[test]
    fn raising_the_quota_admits_more() {
        let handler = handler(10);
        handler.set_max_messages_for_topic(TOPIC, 20).unwrap();
        handler.can_process_message(PEER, TOPIC, 20).unwrap();
        assert!(handler.can_process_message(PEER, TOPIC, 1).is_err());
    }

    #[test]
    fn quota_below_minimum_is_rejected() {
        let handler = handler(10);
        let err = handler.set_max_messages_for_topic(TOPIC, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidNumberOfMessages { got: 0, min: 1, .. }
        ));
    }

    #[test]
    fn quota_of_one_admits_a_single_message() {
        let handler = handler(10);
        handler.set_max_messages_for_topic(TOPIC, 1).unwrap();
        handler.can_process_message(PEER, TOPIC, 1).unwrap();
        assert!(handler.can_process_message(PEER, TOPIC, 1).is_err());
    }

    #[test]
    fn reset_all_covers_every_topic() {
        let handler = handler(1);
        handler.can_process_message(PEER, "a", 1).unwrap();
        handler.can_process_message(PEER, "b", 1).unwrap();
        handler.reset_all();
        handler.can_process_message(PEER, "a", 1).unwrap();
        handler.can_process_message(PEER, "b", 1).unwrap();
    }

    #[test]
    fn disabled_handler_admits_everything() {
        let handler = AntifloodHandler::disabled();
        assert!(!handler.is_enabled());
        for _ in 0..1_000 {
            handler.can_process_message(PEER, TOPIC, u32::MAX).unwrap();
        }
        // quota validation still applies.
        assert!(handler.set_max_messages_for_topic(TOPIC, 0).is_err());
    }
}
