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
//! # Relayer Role Provider 🕸️
//!
//! Keeps the set of relayers currently staked on the MultiversX bridge
//! contract, refreshed in the background.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::Instrument;

use bridge_relayer_types::clients::VmQueryClient;
use bridge_relayer_utils::metric::Metrics;
use bridge_relayer_utils::{probe, Error};

/// View function listing the staked relayers.
pub const GET_ALL_STAKED_RELAYERS: &str = "getAllStakedRelayers";
/// Shortest polling interval accepted while polling is on.
pub const MIN_POLLING_INTERVAL: Duration = Duration::from_secs(1);
/// Wait after a failed refresh.
pub const POLLING_INTERVAL_ON_ERROR: Duration = Duration::from_secs(5);
/// Wait before the first refresh.
const INITIAL_DELAY: Duration = Duration::from_nanos(1);

/// Arguments of [`RoleProvider::new`].
#[derive(typed_builder::TypedBuilder)]
pub struct RoleProviderArgs {
    /// Client used to call [`GET_ALL_STAKED_RELAYERS`].
    pub chain_client: Arc<dyn VmQueryClient>,
    /// Refresh period on success.
    pub polling_interval: Duration,
    /// If `false` the whitelist is fetched once and the refresher exits.
    #[builder(default = true)]
    pub use_polling: bool,
    /// Counts failed refreshes.
    #[builder(default, setter(strip_option))]
    pub metrics: Option<Arc<Metrics>>,
}

/// The whitelist of relayers, refreshed by a background task.
///
/// Readers always observe a complete refresh result: the previous one or the
/// new one.
#[derive(Debug)]
pub struct RoleProvider {
    whitelist: Arc<RwLock<HashSet<String>>>,
    loop_status: Arc<AtomicBool>,
    closed: AtomicBool,
    notify_close: broadcast::Sender<()>,
}

impl RoleProvider {
    /// Validates `args` and spawns the refresher on the current tokio runtime.
    ///
    /// The first refresh starts right away.
    pub fn new(args: RoleProviderArgs) -> bridge_relayer_utils::Result<Self> {
        if args.use_polling && args.polling_interval < MIN_POLLING_INTERVAL {
            return Err(Error::InvalidPollingInterval {
                got: args.polling_interval,
                min: MIN_POLLING_INTERVAL,
            });
        }
        let (notify_close, close_rx) = broadcast::channel(1);
        let provider = Self {
            whitelist: Default::default(),
            loop_status: Arc::new(AtomicBool::new(true)),
            closed: AtomicBool::new(false),
            notify_close,
        };
        let refresher = Refresher {
            chain_client: args.chain_client,
            polling_interval: args.polling_interval,
            use_polling: args.use_polling,
            metrics: args.metrics,
            whitelist: provider.whitelist.clone(),
            loop_status: provider.loop_status.clone(),
        };
        tokio::spawn(refresher.run(close_rx).in_current_span());
        Ok(provider)
    }

    /// Whether `hex_address` (lowercase hex, no prefix) is a whitelisted
    /// relayer.
    pub fn is_whitelisted(&self, hex_address: &str) -> bool {
        self.whitelist.read().contains(hex_address)
    }

    /// The whitelisted relayers as raw addresses, sorted byte-lexicographically.
    pub fn sorted_public_keys(&self) -> Vec<Vec<u8>> {
        let mut keys: Vec<Vec<u8>> = self
            .whitelist
            .read()
            .iter()
            .filter_map(|address| hex::decode(address).ok())
            .collect();
        keys.sort();
        keys
    }

    /// `true` while the refresher task is alive.
    pub fn is_loop_running(&self) -> bool {
        self.loop_status.load(Ordering::Acquire)
    }

    /// Stops the refresher. Returns immediately; safe to call more than once.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // the refresher may already be gone, nothing to stop then.
        let _ = self.notify_close.send(());
        tracing::debug!("role provider closed");
    }
}

impl Drop for RoleProvider {
    fn drop(&mut self) {
        self.close();
    }
}

struct Refresher {
    chain_client: Arc<dyn VmQueryClient>,
    polling_interval: Duration,
    use_polling: bool,
    metrics: Option<Arc<Metrics>>,
    whitelist: Arc<RwLock<HashSet<String>>>,
    loop_status: Arc<AtomicBool>,
}

impl Refresher {
    #[tracing::instrument(
        name = "role_provider",
        skip_all,
        fields(polling_interval = ?self.polling_interval, use_polling = self.use_polling)
    )]
    async fn run(self, mut close: broadcast::Receiver<()>) {
        let mut on_error = Constant::new(POLLING_INTERVAL_ON_ERROR);
        let mut delay = INITIAL_DELAY;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::RoleProvider,
            started = true,
        );
        loop {
            tokio::select! {
                _ = close.recv() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            match self.refresh().await {
                Ok(()) if !self.use_polling => break,
                Ok(()) => delay = self.polling_interval,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        "failed to fetch the whitelisted relayers"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.role_provider_refresh_failures.inc();
                    }
                    delay = on_error
                        .next_backoff()
                        .unwrap_or(POLLING_INTERVAL_ON_ERROR);
                }
            }
        }
        self.loop_status.store(false, Ordering::Release);
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::RoleProvider,
            stopped = true,
        );
    }

    async fn refresh(&self) -> bridge_relayer_utils::Result<()> {
        let results = self
            .chain_client
            .execute_vm_query_on_bridge_contract(GET_ALL_STAKED_RELAYERS, &[])
            .await?;
        let fresh: HashSet<String> = results.iter().map(hex::encode).collect();
        let previous =
            std::mem::replace(&mut *self.whitelist.write(), fresh.clone());
        log_whitelist_diff(&previous, &fresh);
        Ok(())
    }
}

fn log_whitelist_diff(previous: &HashSet<String>, fresh: &HashSet<String>) {
    let mut joiners: Vec<&str> =
        fresh.difference(previous).map(String::as_str).collect();
    let mut leavers: Vec<&str> =
        previous.difference(fresh).map(String::as_str).collect();
    if joiners.is_empty() && leavers.is_empty() {
        tracing::debug!("fetched whitelisted relayers: no changes!");
        return;
    }
    joiners.sort_unstable();
    leavers.sort_unstable();
    tracing::debug!(
        "fetched whitelisted relayers: new joiners: [{}] leavers: [{}]",
        joiners.join(", "),
        leavers.join(", ")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Answers with queued results, then repeats the last one.
    /// `None` stands for a failed call.
    #[derive(Default)]
    struct StubChainClient {
        responses: Mutex<VecDeque<Option<Vec<Vec<u8>>>>>,
        last: Mutex<Option<Vec<Vec<u8>>>>,
        calls: Mutex<usize>,
    }

    impl StubChainClient {
        fn new(responses: Vec<Option<Vec<Vec<u8>>>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }
    }

    #[async_trait::async_trait]
    impl VmQueryClient for StubChainClient {
        async fn execute_vm_query_on_bridge_contract(
            &self,
            function: &str,
            params: &[Vec<u8>],
        ) -> bridge_relayer_utils::Result<Vec<Vec<u8>>> {
            assert_eq!(function, GET_ALL_STAKED_RELAYERS);
            assert!(params.is_empty());
            *self.calls.lock() += 1;
            let next = self.responses.lock().pop_front();
            let response = match next {
                Some(response) => {
                    *self.last.lock() = response.clone();
                    response
                }
                None => self.last.lock().clone(),
            };
            response.ok_or_else(|| Error::ChainClient("unreachable".into()))
        }
    }

    fn addresses(list: &[&[u8]]) -> Option<Vec<Vec<u8>>> {
        Some(list.iter().map(|a| a.to_vec()).collect())
    }

    const POLLING: Duration = Duration::from_secs(2);

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn refresh_swaps_whitelist_and_logs_diff() {
        let client = StubChainClient::new(vec![
            addresses(&[b"aaa", b"bbb"]),
            addresses(&[b"bbb", b"ccc"]),
        ]);
        let provider = RoleProvider::new(
            RoleProviderArgs::builder()
                .chain_client(client.clone())
                .polling_interval(POLLING)
                .build(),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(provider.is_whitelisted(&hex::encode(b"aaa")));
        assert!(!provider.is_whitelisted(&hex::encode(b"ccc")));

        tokio::time::sleep(POLLING).await;
        assert_eq!(client.calls(), 2);
        assert!(!provider.is_whitelisted(&hex::encode(b"aaa")));
        assert!(provider.is_whitelisted(&hex::encode(b"bbb")));
        assert!(provider.is_whitelisted(&hex::encode(b"ccc")));
        assert_eq!(
            provider.sorted_public_keys(),
            vec![b"bbb".to_vec(), b"ccc".to_vec()]
        );
        assert!(logs_contain("new joiners: [636363] leavers: [616161]"));

        tokio::time::sleep(POLLING).await;
        assert!(logs_contain("no changes!"));
        provider.close();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_keeps_previous_set_and_retries() {
        let client = StubChainClient::new(vec![
            addresses(&[b"aaa"]),
            None,
            addresses(&[b"bbb"]),
        ]);
        let metrics = Arc::new(Metrics::new().unwrap());
        let provider = RoleProvider::new(
            RoleProviderArgs::builder()
                .chain_client(client.clone())
                .polling_interval(POLLING)
                .metrics(metrics.clone())
                .build(),
        )
        .unwrap();

        // first success, then a failure after one polling interval.
        tokio::time::sleep(POLLING + Duration::from_millis(10)).await;
        assert_eq!(client.calls(), 2);
        assert!(provider.is_whitelisted(&hex::encode(b"aaa")));
        assert_eq!(metrics.role_provider_refresh_failures.get() as u64, 1);

        // the retry comes after the error interval, not the polling one.
        tokio::time::sleep(POLLING).await;
        assert_eq!(client.calls(), 2);
        tokio::time::sleep(POLLING_INTERVAL_ON_ERROR - POLLING).await;
        assert_eq!(client.calls(), 3);
        assert!(provider.is_whitelisted(&hex::encode(b"bbb")));
        assert!(!provider.is_whitelisted(&hex::encode(b"aaa")));
    }

    #[tokio::test(start_paused = true)]
    async fn without_polling_stops_after_first_success() {
        let client = StubChainClient::new(vec![None, addresses(&[b"aaa"])]);
        let provider = RoleProvider::new(
            RoleProviderArgs::builder()
                .chain_client(client.clone())
                .polling_interval(Duration::ZERO)
                .use_polling(false)
                .build(),
        )
        .unwrap();

        tokio::time::sleep(POLLING_INTERVAL_ON_ERROR + Duration::from_millis(10))
            .await;
        assert_eq!(client.calls(), 2);
        assert!(provider.is_whitelisted(&hex::encode(b"aaa")));
        assert!(!provider.is_loop_running());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn close_stops_refresher_and_keeps_last_answers() {
        let client = StubChainClient::new(vec![addresses(&[b"aaa"])]);
        let provider = RoleProvider::new(
            RoleProviderArgs::builder()
                .chain_client(client.clone())
                .polling_interval(POLLING)
                .build(),
        )
        .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(provider.is_loop_running());

        provider.close();
        provider.close();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!provider.is_loop_running());
        assert!(provider.is_whitelisted(&hex::encode(b"aaa")));

        tokio::time::sleep(POLLING * 3).await;
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn short_polling_interval_is_rejected() {
        let client = StubChainClient::new(vec![]);
        let err = RoleProvider::new(
            RoleProviderArgs::builder()
                .chain_client(client)
                .polling_interval(Duration::from_millis(999))
                .build(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPollingInterval { .. }));
    }
}
