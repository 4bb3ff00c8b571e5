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

//! Bridge Relayer Binary.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use tokio::signal::unix;

use bridge_relayer::dry_run::{DryRunChainClient, LoggingMessenger, NoKeys};
use bridge_relayer::service::{Relayer, RelayerCollaborators};
use bridge_relayer_config::cli::{load_config, setup_logger, Opts};
use bridge_relayer_context::RelayerContext;
use bridge_relayer_types::clients::FixedQuorum;
use bridge_relayer_utils::probe;

/// The main entry point for the relayer.
///
/// # Arguments
///
/// * `args` - The command line arguments.
#[paw::main]
#[tokio::main]
async fn main(args: Opts) -> anyhow::Result<()> {
    setup_logger(args.verbose, "bridge_relayer")?;
    match dotenv::dotenv() {
        Ok(_) => {
            tracing::trace!("Loaded .env file");
        }
        Err(e) => {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }

    // The configuration is validated and configured from the given directory
    let config = load_config(args.config_dir.clone())?;
    let ctx = RelayerContext::new(config)?;

    // chain clients are plugged in here; the dry run ones never transact.
    let address = ctx.config.relayer.address.as_bytes().to_vec();
    let multiversx = Arc::new(DryRunChainClient::new("multiversx", address.clone()));
    let keys = Arc::new(NoKeys::new(address.clone()));
    let eth = Arc::new(DryRunChainClient::new("eth", address));
    let collaborators = RelayerCollaborators::builder()
        .eth_bridge(eth.clone())
        .eth_contract(eth)
        .eth_signer(keys.clone())
        .multiversx_bridge(multiversx.clone())
        .multiversx_query(multiversx)
        .eth_quorum(Arc::new(FixedQuorum(1)))
        .multiversx_quorum(Arc::new(FixedQuorum(1)))
        .messenger(Arc::new(LoggingMessenger))
        .signer(keys.clone())
        .verifier(keys)
        .build();
    tracing::warn!("Running with dry run chain clients, nothing is submitted");

    let mut relayer = Relayer::new(ctx.clone(), collaborators)?;
    let shutdown_signal = ctx.shutdown_signal();
    let relayer_handle =
        tokio::spawn(async move { relayer.run(shutdown_signal).await });
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        started = true
    );

    // watch for signals
    let mut ctrlc_signal = unix::signal(unix::SignalKind::interrupt())?;
    let mut termination_signal = unix::signal(unix::SignalKind::terminate())?;
    let mut quit_signal = unix::signal(unix::SignalKind::quit())?;
    tokio::select! {
        _ = ctrlc_signal.recv() => {
            tracing::warn!("Interrupted (Ctrl+C) ...");
        },
        _ = termination_signal.recv() => {
            tracing::warn!("Got Terminate signal ...");
        },
        _ = quit_signal.recv() => {
            tracing::warn!("Quitting ...");
        },
    }
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        shutdown = true
    );
    tracing::warn!("Shutting down...");
    // send shutdown signal to all of the application.
    ctx.shutdown();
    // the tick in flight completes before the relayer returns.
    relayer_handle.await??;
    tracing::info!("Clean Exit ..");
    Ok(())
}
