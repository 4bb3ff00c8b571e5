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

use bridge_relayer_utils::Error;
use serde::{Deserialize, Serialize};

/// Largest accepted byte field in an inbound [`SignedMessage`].
pub const MAX_FIELD_SIZE: usize = 1024;

/// The envelope of every relayer message.
///
/// `signature` covers `payload || nonce` with the nonce as 8 big-endian bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedMessage {
    /// The wrapped payload.
    #[serde(with = "hex::serde")]
    pub payload: Vec<u8>,
    /// Sender public key.
    #[serde(with = "hex::serde")]
    pub public_key_bytes: Vec<u8>,
    /// Sender signature.
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
    /// Per sender, strictly increasing.
    pub nonce: u64,
}

impl SignedMessage {
    /// The bytes the signature is made over.
    pub fn signed_bytes(payload: &[u8], nonce: u64) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(payload.len() + 8);
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&nonce.to_be_bytes());
        bytes
    }

    /// Identity of the message regardless of its nonce: sender and payload.
    pub fn unique_id(&self) -> String {
        format!(
            "{}:{}",
            hex::encode(&self.public_key_bytes),
            hex::encode(&self.payload)
        )
    }

    /// Fails with [`Error::InvalidSize`] if a field is over [`MAX_FIELD_SIZE`].
    pub fn check_lengths(&self) -> bridge_relayer_utils::Result<()> {
        if self.public_key_bytes.len() > MAX_FIELD_SIZE {
            return Err(Error::InvalidSize("public key"));
        }
        if self.signature.len() > MAX_FIELD_SIZE {
            return Err(Error::InvalidSize("signature"));
        }
        if self.payload.len() > MAX_FIELD_SIZE {
            return Err(Error::InvalidSize("payload"));
        }
        Ok(())
    }
}

/// Payload of the sign topic: a signature over an Ethereum message hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EthereumSignature {
    /// The signature.
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
    /// The signed hash.
    #[serde(with = "hex::serde")]
    pub message_hash: Vec<u8>,
}
