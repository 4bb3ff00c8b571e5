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

/// Feature switches default to `true`.
pub const fn enabled() -> bool {
    true
}
/// The p2p port is set to `10010` by default.
pub fn p2p_port() -> String {
    String::from("10010")
}
/// The protocol id shared by all relayers of a bridge.
pub fn protocol_id() -> String {
    String::from("/erd/relay/1.0.0")
}
/// The prefix of the relayer topics.
pub fn topic_name() -> String {
    String::from("eth-multiversx")
}
/// The whitelist is refreshed every minute by default.
pub const fn role_provider_polling_interval_in_millis() -> u64 {
    60_000
}
/// Each relayer is leader for one minute by default.
pub const fn topology_step_duration_in_seconds() -> u64 {
    60
}
/// The state machines tick every 12 seconds by default.
pub const fn step_duration_in_millis() -> u64 {
    12_000
}
/// Quorum and proposal waits give up after `3` ticks by default.
pub const fn max_retries_on_quorum_reached() -> u64 {
    3
}
/// Transactions are resent after one minute by default.
pub const fn interval_to_resend_txs_in_seconds() -> u64 {
    60
}
/// The MultiversX proxy cache expires after 10 minutes by default.
pub const fn proxy_cache_expiration_seconds() -> u64 {
    600
}
/// A peer may send `100` messages per topic between resets by default.
pub const fn antiflood_default_max_messages() -> u32 {
    100
}
/// Antiflood counters are reset every second by default.
pub const fn antiflood_reset_interval_in_seconds() -> u64 {
    1
}
/// Batch validator requests time out after one second by default.
pub const fn batch_validator_request_time_in_millis() -> u64 {
    1_000
}
