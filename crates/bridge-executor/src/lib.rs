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
//! # Bridge Executor 🕸️
//!
//! The steps moving a transfer batch from one chain to the other:
//!
//! ```text
//! GetPending -> ProposeTransfer -> WaitForTransferProposal -> SignProposedTransfer
//!   -> WaitForTransferQuorum -> ExecuteTransfer -> ProposeSetStatus
//!   -> WaitForSetStatusProposal -> SignProposedSetStatus -> WaitForSetStatusQuorum
//!   -> ExecuteSetStatus -> GetPending
//! ```
//!
//! Transfer actions live on the destination chain, set-status actions on the
//! source chain. Only the leader proposes and executes; every relayer signs.

mod executor;
/// The step set and its identifiers.
pub mod steps;

pub use executor::{BridgeExecutor, BridgeExecutorArgs};
pub use steps::create_steps;

/// The two kinds of on-chain actions a batch goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ActionKind {
    /// Moves the deposits to the destination chain.
    #[display(fmt = "transfer")]
    Transfer,
    /// Writes the deposit outcomes back to the source chain.
    #[display(fmt = "set status")]
    SetStatus,
}
