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

use std::collections::HashSet;

use bridge_relayer_utils::Error;
use parking_lot::Mutex;

use crate::{MessageSigner, NetMessenger, SignatureVerifier, Whitelist};

/// "Signs" by prefixing the message with the key.
pub struct ConcatSigner(pub Vec<u8>);

impl MessageSigner for ConcatSigner {
    fn public_key(&self) -> Vec<u8> {
        self.0.clone()
    }

    fn sign(&self, message: &[u8]) -> bridge_relayer_utils::Result<Vec<u8>> {
        Ok([self.0.as_slice(), message].concat())
    }
}

pub struct ConcatVerifier;

impl SignatureVerifier for ConcatVerifier {
    fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        signature: &[u8],
    ) -> bridge_relayer_utils::Result<()> {
        if signature == [public_key, message].concat() {
            Ok(())
        } else {
            Err(Error::InvalidSignature)
        }
    }
}

pub struct Keys(pub HashSet<Vec<u8>>);

impl Keys {
    pub fn of(keys: &[&[u8]]) -> Self {
        Self(keys.iter().map(|k| k.to_vec()).collect())
    }
}

impl Whitelist for Keys {
    fn is_whitelisted(&self, public_key: &[u8]) -> bool {
        self.0.contains(public_key)
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    pub broadcasts: Mutex<Vec<(String, Vec<u8>)>>,
    pub direct: Mutex<Vec<(String, Vec<u8>, String)>>,
}

impl RecordingMessenger {
    /// Hands out and forgets everything broadcast so far.
    pub fn take_broadcasts(&self) -> Vec<(String, Vec<u8>)> {
        std::mem::take(&mut *self.broadcasts.lock())
    }
}

#[async_trait::async_trait]
impl NetMessenger for RecordingMessenger {
    async fn broadcast(
        &self,
        topic: &str,
        data: Vec<u8>,
    ) -> bridge_relayer_utils::Result<()> {
        self.broadcasts.lock().push((topic.to_owned(), data));
        Ok(())
    }

    async fn send_to_peer(
        &self,
        topic: &str,
        data: Vec<u8>,
        peer: &str,
    ) -> bridge_relayer_utils::Result<()> {
        self.direct
            .lock()
            .push((topic.to_owned(), data, peer.to_owned()));
        Ok(())
    }
}
