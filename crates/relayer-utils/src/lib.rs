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
//! # Relayer Utils 🕸️
//!
//! Shared building blocks of the bridge relayer: the error type every crate
//! returns, probe targets for lifecycle tracing, retry policies, the clock
//! abstraction and the status/metrics surfaces.

use std::time::Duration;

/// Metrics functionality
pub mod metric;
/// A module used for debugging relayer lifecycle, sync state, or other relayer state.
pub mod probe;
/// Retry functionality
pub mod retry;
/// Named status handlers holding int and string metrics.
pub mod status;
/// Wall-clock source and delay primitives.
pub mod timer;

/// An enum of all possible errors that could be encountered during the execution of the
/// bridge relayer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while iterating over a glob pattern.
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    /// Error from Glob Iterator.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// Reqwest error
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// Prometheus registry error.
    #[error(transparent)]
    PrometheusError(#[from] prometheus::Error),
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
    /// Error while parsing the config files.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// The loaded configuration is not usable.
    #[error("Invalid config: {}", _0)]
    InvalidConfig(String),
    /// Topology step duration below one second.
    #[error("Invalid step duration {:?}, expected at least 1s", _0)]
    InvalidStepDuration(Duration),
    /// An empty relayer address was supplied.
    #[error("Empty relayer address")]
    EmptyAddress,
    /// Role provider polling interval below the allowed minimum.
    #[error("Invalid polling interval {:?}, expected at least {:?}", got, min)]
    InvalidPollingInterval {
        /// The configured interval.
        got: Duration,
        /// The smallest accepted interval.
        min: Duration,
    },
    /// A state machine was built without any steps.
    #[error("Empty steps map")]
    EmptyStepsMap,
    /// A step was registered under an identifier that is not its own.
    #[error("Step '{}' registered under identifier '{}'", step, key)]
    MisregisteredStep {
        /// The map key used at registration.
        key: String,
        /// The identifier the step reports.
        step: String,
    },
    /// A step identifier has no registered step.
    #[error("Step not found for identifier '{}'", _0)]
    StepNotFound(String),
    /// The antiflood quota for a topic is exhausted.
    #[error("System busy")]
    SystemBusy,
    /// A message was dropped by the antiflood policy.
    #[error("Cannot process message from peer {} on topic {} now: {}", peer, topic, reason)]
    CannotProcessMessage {
        /// The sending peer.
        peer: String,
        /// The topic the message arrived on.
        topic: String,
        /// What the flood preventer reported.
        #[source]
        reason: Box<Error>,
    },
    /// A topic quota below the accepted minimum.
    #[error("Invalid number of messages {} for topic {}, minimum is {}", got, topic, min)]
    InvalidNumberOfMessages {
        /// The topic the quota was meant for.
        topic: String,
        /// The rejected quota.
        got: u32,
        /// The smallest accepted quota.
        min: u32,
    },
    /// Opaque failure surfaced by a chain client.
    #[error("Chain client failure: {}", _0)]
    ChainClient(String),
    /// The batch validator declared the batch invalid.
    #[error("Batch {} rejected by the batch validator", batch_id)]
    ValidatorRejected {
        /// The vetoed batch.
        batch_id: u64,
    },
    /// Transport, status or parse failure while talking to the batch validator.
    #[error("Batch validator error: {}", _0)]
    BatchValidator(String),
    /// A chain the batch validator does not know about.
    #[error("Invalid chain: {:?}", _0)]
    InvalidChain(String),
    /// Batch validator request timeout below the allowed minimum.
    #[error("Invalid request time {:?}, expected at least {:?}", got, min)]
    InvalidRequestTime {
        /// The configured request time.
        got: Duration,
        /// The smallest accepted request time.
        min: Duration,
    },
    /// The destination returned a statuses list that does not match the batch.
    #[error("Status count mismatch for batch ID {}: {} deposits, {} statuses", batch_id, deposits, statuses)]
    BatchIdStatusMismatch {
        /// The batch being resolved.
        batch_id: u64,
        /// Number of deposits in the batch.
        deposits: usize,
        /// Number of statuses the destination reported.
        statuses: usize,
    },
    /// A fetched batch does not continue from the last executed deposit.
    #[error("Invalid deposit nonce {} in batch {}, expected {}", got, batch_id, expected)]
    InvalidDepositNonce {
        /// The fetched batch.
        batch_id: u64,
        /// The nonce of the offending deposit.
        got: u64,
        /// The nonce that deposit should carry.
        expected: u64,
    },
    /// An empty name was supplied where one is required.
    #[error("Empty name")]
    EmptyName,
    /// The sender of a message is not a whitelisted relayer.
    #[error("Current peer is not whitelisted: {}", _0)]
    PeerNotWhitelisted(String),
    /// A message field exceeds the allowed size.
    #[error("Invalid size for {} field", _0)]
    InvalidSize(&'static str),
    /// A replayed or stale message.
    #[error("Nonce too low in received message from {}: got {}, last seen {}", public_key, got, last)]
    NonceTooLow {
        /// Hex public key of the sender.
        public_key: String,
        /// The nonce carried by the message.
        got: u64,
        /// The last accepted nonce for that sender.
        last: u64,
    },
    /// A message signature did not verify.
    #[error("Invalid message signature")]
    InvalidSignature,
}

/// A type alias for the result for the bridge relayer, that uses the `Error` enum.
pub type Result<T> = std::result::Result<T, Error>;
