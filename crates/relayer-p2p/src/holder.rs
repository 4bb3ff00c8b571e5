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

use parking_lot::RwLock;

use crate::{BroadcastClient, EthereumSignature, SignedMessage};

/// Keeps the signatures received from other relayers, one per sender and
/// payload.
#[derive(Debug, Default)]
pub struct SignaturesHolder {
    signed_messages: RwLock<HashMap<String, (SignedMessage, EthereumSignature)>>,
}

impl SignaturesHolder {
    /// Creates an empty holder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every signature collected for `message_hash`.
    pub fn signatures(&self, message_hash: &[u8]) -> Vec<Vec<u8>> {
        self.signed_messages
            .read()
            .values()
            .filter(|(_, sig)| sig.message_hash == message_hash)
            .map(|(_, sig)| sig.signature.clone())
            .collect()
    }

    /// Forgets the signatures collected for `message_hash`.
    pub fn forget(&self, message_hash: &[u8]) {
        self.signed_messages
            .write()
            .retain(|_, (_, sig)| sig.message_hash != message_hash);
    }

    /// Number of stored signatures.
    pub fn len(&self) -> usize {
        self.signed_messages.read().len()
    }

    /// `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.signed_messages.read().is_empty()
    }
}

impl BroadcastClient for SignaturesHolder {
    fn process_new_message(
        &self,
        message: &SignedMessage,
        signature: &EthereumSignature,
    ) {
        self.signed_messages
            .write()
            .insert(message.unique_id(), (message.clone(), signature.clone()));
    }

    fn all_stored_signatures(&self) -> Vec<SignedMessage> {
        self.signed_messages
            .read()
            .values()
            .map(|(message, _)| message.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed(key: u8, hash: u8, sig: u8, nonce: u64) -> (SignedMessage, EthereumSignature) {
        let signature = EthereumSignature {
            signature: vec![sig],
            message_hash: vec![hash],
        };
        let message = SignedMessage {
            payload: serde_json::to_vec(&signature).unwrap(),
            public_key_bytes: vec![key],
            signature: vec![0xaa],
            nonce,
        };
        (message, signature)
    }

    #[test]
    fn duplicates_are_stored_once() {
        let holder = SignaturesHolder::new();
        let (m1, s1) = signed(1, 10, 100, 1);
        let (mut m1_again, _) = signed(1, 10, 100, 2);
        m1_again.signature = vec![0xbb];
        let (m2, s2) = signed(2, 10, 101, 1);
        let (m3, s3) = signed(2, 11, 102, 2);

        holder.process_new_message(&m1, &s1);
        holder.process_new_message(&m1_again, &s1);
        holder.process_new_message(&m2, &s2);
        holder.process_new_message(&m3, &s3);

        assert_eq!(holder.len(), 3);
        let mut for_hash = holder.signatures(&[10]);
        for_hash.sort();
        assert_eq!(for_hash, vec![vec![100], vec![101]]);
        assert_eq!(holder.all_stored_signatures().len(), 3);

        holder.forget(&[10]);
        assert_eq!(holder.len(), 1);
        assert!(holder.signatures(&[10]).is_empty());
        assert_eq!(holder.signatures(&[11]), vec![vec![102]]);
    }
}
