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

#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Bridge Relayer Crate 🕸️
//!
//! Relays transfer batches between an EVM chain and MultiversX.
//!
//! ## Overview
//!
//! Every relayer of the bridge runs the same process. Each one watches both
//! chains, and for every pending batch the relayers of the current leader
//! window take turns:
//!
//!   1. the leader proposes the transfer on the destination chain,
//!   2. every whitelisted relayer signs the proposal,
//!   3. once a quorum of signatures is reached the leader executes it,
//!   4. the deposit outcomes are written back to the source chain the same
//!      way.
//!
//! Two state machines, `eth-to-multiversx` and `multiversx-to-eth`, drive
//! these steps. They share the whitelist (refreshed from the MultiversX
//! contract), the leader rotation and the relayer message gate.
//!
//! # Features
//!
//! * `integration-tests`: JSON logs, for log scraping tests. Disabled by default.

/// Read-only chain clients for running the relayer without submitting
/// anything.
pub mod dry_run;
/// Composition of the relayer and its long-running tasks.
pub mod service;

pub use bridge_relayer_utils::{Error, Result};
