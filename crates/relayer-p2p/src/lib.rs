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
//! # Relayer P2P Gate 🕸️
//!
//! Relayers exchange signatures over two topics, `<name>_join` and
//! `<name>_sign`. The transport itself is behind [`NetMessenger`]; this crate
//! is the gate every message crosses:
//!
//! * outbound payloads are wrapped in a [`SignedMessage`] with an increasing
//!   nonce and signed by the local key,
//! * inbound messages are size checked, verified, matched against the
//!   whitelist, replay checked and charged to the antiflood quotas before
//!   being dispatched.
//!
//! [`RelayedSignaturesBridge`] puts the sign topic to work: EVM actions are
//! approved by signatures exchanged between relayers instead of on-chain
//! signing transactions.

use bridge_relayer_role_provider::RoleProvider;

mod broadcaster;
mod holder;
mod message;
mod relayed;
#[cfg(test)]
mod test_utils;

pub use broadcaster::{Broadcaster, BroadcasterArgs};
pub use holder::SignaturesHolder;
pub use message::{EthereumSignature, SignedMessage, MAX_FIELD_SIZE};
pub use relayed::{
    RelayedSignaturesBridge, RelayedSignaturesBridgeArgs, SignedExecution,
};

/// Suffix of the topic peers announce themselves on.
pub const JOIN_TOPIC_SUFFIX: &str = "_join";
/// Suffix of the topic signatures travel on.
pub const SIGN_TOPIC_SUFFIX: &str = "_sign";
/// Payload of a join announcement.
pub const JOIN_TOPIC_MESSAGE: &[u8] = b"join topic";

/// The peer to peer transport.
#[async_trait::async_trait]
pub trait NetMessenger: Send + Sync {
    /// Sends `data` to every peer listening on `topic`.
    async fn broadcast(
        &self,
        topic: &str,
        data: Vec<u8>,
    ) -> bridge_relayer_utils::Result<()>;
    /// Sends `data` on `topic` to a single connected peer.
    async fn send_to_peer(
        &self,
        topic: &str,
        data: Vec<u8>,
        peer: &str,
    ) -> bridge_relayer_utils::Result<()>;
}

/// Checks a signature made by a relayer key.
pub trait SignatureVerifier: Send + Sync {
    /// Fails with [`bridge_relayer_utils::Error::InvalidSignature`] unless
    /// `signature` is a signature of `message` by `public_key`.
    fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> bridge_relayer_utils::Result<()>;
}

/// Signs outbound messages with the local relayer key.
pub trait MessageSigner: Send + Sync {
    /// The public key matching the signing key.
    fn public_key(&self) -> Vec<u8>;
    /// Signs `message`.
    fn sign(&self, message: &[u8]) -> bridge_relayer_utils::Result<Vec<u8>>;
}

/// Tells whether a public key belongs to a whitelisted relayer.
pub trait Whitelist: Send + Sync {
    /// `public_key` is the raw key, the same bytes carried by the messages.
    fn is_whitelisted(&self, public_key: &[u8]) -> bool;
}

impl Whitelist for RoleProvider {
    fn is_whitelisted(&self, public_key: &[u8]) -> bool {
        RoleProvider::is_whitelisted(self, &hex::encode(public_key))
    }
}

/// Receives the signatures accepted by the gate.
pub trait BroadcastClient: Send + Sync {
    /// Called for every accepted message on the sign topic.
    fn process_new_message(
        &self,
        message: &SignedMessage,
        signature: &EthereumSignature,
    );
    /// Every message the client holds, replayed to joining peers.
    fn all_stored_signatures(&self) -> Vec<SignedMessage>;
}

/// The `(join, sign)` topic names for `name`.
pub fn topic_names(name: &str) -> (String, String) {
    let name = name.to_lowercase();
    (
        format!("{name}{JOIN_TOPIC_SUFFIX}"),
        format!("{name}{SIGN_TOPIC_SUFFIX}"),
    )
}
