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
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bridge_relayer_antiflood::AntifloodHandler;
use bridge_relayer_utils::metric::Metrics;
use bridge_relayer_utils::Error;
use parking_lot::{Mutex, RwLock};

use crate::{
    topic_names, BroadcastClient, EthereumSignature, MessageSigner,
    NetMessenger, SignatureVerifier, SignedMessage, Whitelist,
    JOIN_TOPIC_MESSAGE,
};

/// Arguments of [`Broadcaster::new`].
#[derive(typed_builder::TypedBuilder)]
pub struct BroadcasterArgs {
    /// Topic prefix, lowercased.
    #[builder(setter(into))]
    pub name: String,
    /// The transport.
    pub messenger: Arc<dyn NetMessenger>,
    /// Whitelisted relayers, usually the role provider.
    pub whitelist: Arc<dyn Whitelist>,
    /// Verifies inbound signatures.
    pub verifier: Arc<dyn SignatureVerifier>,
    /// Signs outbound messages.
    pub signer: Arc<dyn MessageSigner>,
    /// Quotas charged with one message per inbound message.
    #[builder(default = AntifloodHandler::disabled())]
    pub antiflood: AntifloodHandler,
    /// Counts antiflood denials.
    #[builder(default, setter(strip_option))]
    pub metrics: Option<Arc<Metrics>>,
}

/// Sends and receives relayer messages on the join and sign topics.
pub struct Broadcaster {
    join_topic: String,
    sign_topic: String,
    messenger: Arc<dyn NetMessenger>,
    whitelist: Arc<dyn Whitelist>,
    verifier: Arc<dyn SignatureVerifier>,
    signer: Arc<dyn MessageSigner>,
    antiflood: AntifloodHandler,
    metrics: Option<Arc<Metrics>>,
    public_key: Vec<u8>,
    counter: AtomicU64,
    nonces: Mutex<HashMap<Vec<u8>, u64>>,
    clients: RwLock<Vec<Arc<dyn BroadcastClient>>>,
}

impl std::fmt::Debug for Broadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("join_topic", &self.join_topic)
            .field("sign_topic", &self.sign_topic)
            .field("public_key", &hex::encode(&self.public_key))
            .finish_non_exhaustive()
    }
}

impl Broadcaster {
    /// Creates the gate. Fails with [`Error::EmptyName`] for an empty name.
    pub fn new(args: BroadcasterArgs) -> bridge_relayer_utils::Result<Self> {
        if args.name.is_empty() {
            return Err(Error::EmptyName);
        }
        let (join_topic, sign_topic) = topic_names(&args.name);
        // nonces keep increasing across restarts.
        let start = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Ok(Self {
            join_topic,
            sign_topic,
            public_key: args.signer.public_key(),
            messenger: args.messenger,
            whitelist: args.whitelist,
            verifier: args.verifier,
            signer: args.signer,
            antiflood: args.antiflood,
            metrics: args.metrics,
            counter: AtomicU64::new(start),
            nonces: Mutex::new(HashMap::new()),
            clients: RwLock::new(Vec::new()),
        })
    }

    /// The topic peers announce themselves on.
    pub fn join_topic(&self) -> &str {
        &self.join_topic
    }

    /// The topic signatures travel on.
    pub fn sign_topic(&self) -> &str {
        &self.sign_topic
    }

    /// Registers a receiver of accepted signatures.
    pub fn add_broadcast_client(&self, client: Arc<dyn BroadcastClient>) {
        self.clients.write().push(client);
    }

    /// Wraps, signs and broadcasts a signature on the sign topic.
    pub async fn broadcast_signature(
        &self,
        signature: Vec<u8>,
        message_hash: Vec<u8>,
    ) -> bridge_relayer_utils::Result<()> {
        let payload = serde_json::to_vec(&EthereumSignature {
            signature,
            message_hash,
        })?;
        self.broadcast_message(payload, &self.sign_topic).await
    }

    /// Announces this relayer on the join topic.
    pub async fn broadcast_join_topic(&self) -> bridge_relayer_utils::Result<()> {
        self.broadcast_message(JOIN_TOPIC_MESSAGE.to_vec(), &self.join_topic)
            .await
    }

    async fn broadcast_message(
        &self,
        payload: Vec<u8>,
        topic: &str,
    ) -> bridge_relayer_utils::Result<()> {
        let message = self.create_message(payload)?;
        let data = serde_json::to_vec(&message)?;
        tracing::trace!(topic, nonce = message.nonce, "broadcasting message");
        self.messenger.broadcast(topic, data).await
    }

    fn create_message(
        &self,
        payload: Vec<u8>,
    ) -> bridge_relayer_utils::Result<SignedMessage> {
        let nonce = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let signature = self
            .signer
            .sign(&SignedMessage::signed_bytes(&payload, nonce))?;
        Ok(SignedMessage {
            payload,
            public_key_bytes: self.public_key.clone(),
            signature,
            nonce,
        })
    }

    /// Runs an inbound message through the gate and dispatches it.
    ///
    /// Errors mean the message was dropped and must not be relayed further.
    #[tracing::instrument(skip_all, fields(topic = %topic, peer = %from_peer))]
    pub async fn process_received_message(
        &self,
        topic: &str,
        data: &[u8],
        from_peer: &str,
    ) -> bridge_relayer_utils::Result<()> {
        let message = self.pre_process_message(data)?;
        if !self.whitelist.is_whitelisted(&message.public_key_bytes) {
            return Err(Error::PeerNotWhitelisted(hex::encode(
                &message.public_key_bytes,
            )));
        }
        self.process_nonce(&message)?;
        if let Err(e) = self.antiflood.can_process_message(from_peer, topic, 1) {
            if let Some(metrics) = &self.metrics {
                metrics.antiflood_denials.inc();
            }
            return Err(e);
        }

        if topic == self.join_topic {
            self.process_join_message(from_peer).await;
        } else if topic == self.sign_topic {
            self.process_sign_message(&message);
        } else {
            tracing::debug!("message on an unknown topic");
        }
        Ok(())
    }

    fn pre_process_message(
        &self,
        data: &[u8],
    ) -> bridge_relayer_utils::Result<SignedMessage> {
        let message: SignedMessage = serde_json::from_slice(data)?;
        message.check_lengths()?;
        self.verifier.verify(
            &message.public_key_bytes,
            &SignedMessage::signed_bytes(&message.payload, message.nonce),
            &message.signature,
        )?;
        Ok(message)
    }

    fn process_nonce(
        &self,
        message: &SignedMessage,
    ) -> bridge_relayer_utils::Result<()> {
        let mut nonces = self.nonces.lock();
        if let Some(&last) = nonces.get(&message.public_key_bytes) {
            if message.nonce <= last {
                return Err(Error::NonceTooLow {
                    public_key: hex::encode(&message.public_key_bytes),
                    got: message.nonce,
                    last,
                });
            }
        }
        nonces.insert(message.public_key_bytes.clone(), message.nonce);
        Ok(())
    }

    async fn process_join_message(&self, peer: &str) {
        let clients = self.clients.read().clone();
        let mut unique = HashMap::new();
        for client in &clients {
            for message in client.all_stored_signatures() {
                unique.insert(message.unique_id(), message);
            }
        }
        tracing::debug!(peer, count = unique.len(), "replaying stored signatures");
        for message in unique.into_values() {
            let sent = match serde_json::to_vec(&message) {
                Ok(data) => {
                    self.messenger
                        .send_to_peer(&self.sign_topic, data, peer)
                        .await
                }
                Err(e) => Err(e.into()),
            };
            if let Err(error) = sent {
                tracing::debug!(peer, %error, "error sending stored signature");
            }
        }
    }

    fn process_sign_message(&self, message: &SignedMessage) {
        let signature: EthereumSignature =
            match serde_json::from_slice(&message.payload) {
                Ok(signature) => signature,
                Err(error) => {
                    tracing::debug!(
                        %error,
                        "received message does not contain a valid signature"
                    );
                    return;
                }
            };
        let clients = self.clients.read().clone();
        for client in &clients {
            client.process_new_message(message, &signature);
        }
    }
}
