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
//! Types shared across the bridge relayer: the transfer batch model, chain
//! identifiers, the interfaces of the external chain clients and a couple of
//! serde helpers used by the configuration.

/// Transfer batches and deposits.
pub mod batch;
/// Chains the relayer knows about.
pub mod chain;
/// Interfaces of the external chain clients.
pub mod clients;
/// Relayer addresses that can be read from the environment.
pub mod relayer_address;
/// Service URLs that can be read from the environment.
pub mod service_url;

pub use batch::{ActionId, BatchId, DepositTransfer, TransferBatch};
pub use chain::Chain;
