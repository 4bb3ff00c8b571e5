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

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File};

use crate::BridgeRelayerConfig;

/// Smallest accepted whitelist polling interval.
pub const MIN_POLLING_INTERVAL: Duration = Duration::from_secs(1);
/// Smallest accepted batch validator request time.
pub const MIN_REQUEST_TIME: Duration = Duration::from_millis(1);
/// Smallest accepted antiflood quota.
pub const MIN_TOPIC_MESSAGES: u32 = 1;

/// A helper function that will search for all config files in the given directory and return them as a vec
/// of the paths.
///
/// Supported file extensions are:
/// - `.toml`.
/// - `.json`.
pub fn search_config_files<P: AsRef<Path>>(
    base_dir: P,
) -> bridge_relayer_utils::Result<Vec<PathBuf>> {
    // A pattern that covers all toml or json files in the config directory and subdirectories.
    let toml_pattern = format!("{}/**/*.toml", base_dir.as_ref().display());
    let json_pattern = format!("{}/**/*.json", base_dir.as_ref().display());
    tracing::trace!(
        "Loading config files from {} and {}",
        toml_pattern,
        json_pattern
    );
    let toml_files = glob::glob(&toml_pattern)?;
    let json_files = glob::glob(&json_pattern)?;
    toml_files
        .chain(json_files)
        .map(|v| v.map_err(bridge_relayer_utils::Error::from))
        .collect()
}

/// Try to parse the [`BridgeRelayerConfig`] from the given config file(s).
pub fn parse_from_files(
    files: &[PathBuf],
) -> bridge_relayer_utils::Result<BridgeRelayerConfig> {
    let mut builder = Config::builder();
    for config_file in files {
        tracing::trace!("Loading config file: {}", config_file.display());
        // get file extension
        let ext = config_file
            .extension()
            .map(|e| e.to_str().unwrap_or(""))
            .unwrap_or("");
        let format = match ext {
            "toml" => config::FileFormat::Toml,
            "json" => config::FileFormat::Json,
            _ => {
                tracing::warn!("Unknown file extension: {}", ext);
                continue;
            }
        };
        builder = builder
            .add_source(File::from(config_file.as_path()).format(format));
    }

    // also merge in the environment (with a prefix of BRIDGE).
    let builder = builder
        .add_source(config::Environment::with_prefix("BRIDGE").separator("_"));
    let cfg = builder.build()?;
    let config: Result<
        BridgeRelayerConfig,
        serde_path_to_error::Error<config::ConfigError>,
    > = serde_path_to_error::deserialize(cfg);
    match config {
        Ok(c) => postloading_process(c),
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// Load the configuration files and
///
/// Returns `Ok(BridgeRelayerConfig)` on success, or `Err(anyhow::Error)` on failure.
///
/// # Arguments
///
/// * `path` - The path to the configuration directory
///
/// # Example
///
/// ```no_run
/// use bridge_relayer_config::utils::load;
///
/// let path = "/path/to/config";
/// let config = load(path);
/// ```
///
/// it is the same as using the [`search_config_files`] and [`parse_from_files`] functions combined.
pub fn load<P: AsRef<Path>>(
    path: P,
) -> bridge_relayer_utils::Result<BridgeRelayerConfig> {
    parse_from_files(&search_config_files(path)?)
}

/// The postloading_process exists to validate configuration and standardize
/// the format of the configuration
pub fn postloading_process(
    mut config: BridgeRelayerConfig,
) -> bridge_relayer_utils::Result<BridgeRelayerConfig> {
    use bridge_relayer_utils::Error::InvalidConfig;
    tracing::trace!("Checking configration sanity ...");

    if config.relayer.address.is_empty() {
        return Err(InvalidConfig("relayer.address must be set".into()));
    }

    let role_provider = &config.relayer.role_provider;
    if role_provider.use_polling
        && role_provider.polling_interval() < MIN_POLLING_INTERVAL
    {
        return Err(InvalidConfig(format!(
            "relayer.role-provider.polling-interval-in-millis must be at least {} when polling is on",
            MIN_POLLING_INTERVAL.as_millis()
        )));
    }

    if config.relayer.topology.step_duration_in_seconds == 0 {
        return Err(InvalidConfig(
            "relayer.topology.step-duration-in-seconds must be at least 1"
                .into(),
        ));
    }

    let validator = &config.batch_validator;
    if validator.enabled {
        if validator.url.is_none() {
            return Err(InvalidConfig(
                "batch-validator.url is required when the validator is enabled"
                    .into(),
            ));
        }
        if validator.request_time() < MIN_REQUEST_TIME {
            return Err(InvalidConfig(
                "batch-validator.request-time-in-millis must be at least 1"
                    .into(),
            ));
        }
    }

    let antiflood = &config.antiflood;
    if antiflood.default_max_messages < MIN_TOPIC_MESSAGES {
        return Err(InvalidConfig(
            "antiflood.default-max-messages must be at least 1".into(),
        ));
    }
    if let Some((topic, _)) = antiflood
        .topics
        .iter()
        .find(|(_, quota)| **quota < MIN_TOPIC_MESSAGES)
    {
        return Err(InvalidConfig(format!(
            "antiflood.topics.{topic} must be at least 1"
        )));
    }
    if antiflood.enabled && antiflood.reset_interval_in_seconds == 0 {
        return Err(InvalidConfig(
            "antiflood.reset-interval-in-seconds must be at least 1".into(),
        ));
    }

    if config.quorum.policy == crate::QuorumPolicy::Fixed
        && config.quorum.fixed_quorum.unwrap_or_default() == 0
    {
        return Err(InvalidConfig(
            "quorum.fixed-quorum must be set and positive with the fixed policy"
                .into(),
        ));
    }

    // the zero step duration would spin the driver.
    for (name, machine) in config.state_machine.iter_mut() {
        if machine.step_duration_in_millis == 0 {
            tracing::warn!(
                "!!WARNING!!: state-machine.{} has a zero step duration, using the default",
                name
            );
            machine.step_duration_in_millis =
                crate::defaults::step_duration_in_millis();
        }
        let fallback = machine.step_duration_in_millis;
        for step in machine.steps.iter_mut() {
            if step.duration_in_millis == 0 {
                tracing::warn!(
                    "!!WARNING!!: state-machine.{}.steps.{} has a zero duration, using {}ms",
                    name,
                    step.name,
                    fallback
                );
                step.duration_in_millis = fallback;
            }
        }
    }

    tracing::trace!(
        "postloaded config: {}",
        serde_json::to_string_pretty(&config)?
    );

    Ok(config)
}
