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
//! # Batch Validator Client 🕸️
//!
//! The leader asks an external service whether a batch matches what the
//! service sees on chain before proposing its transfer.
//!
//! Two [`BatchValidator`] implementations live here: [`HttpBatchValidator`]
//! posting the batch to the service, and [`DisabledBatchValidator`] accepting
//! every batch.

use std::sync::Arc;

use bridge_relayer_config::batch_validator::BatchValidatorConfig;
use bridge_relayer_types::clients::BatchValidator;
use bridge_relayer_types::{Chain, TransferBatch};
use bridge_relayer_utils::Error;
use serde::{Deserialize, Serialize};

mod http;

pub use http::{HttpBatchValidator, HttpBatchValidatorArgs, MIN_REQUEST_TIME};

/// Body of a `200` answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicroserviceResponse {
    /// Whether the batch checks out.
    pub valid: bool,
}

/// Body of a `400` answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroserviceBadRequestBody {
    /// The HTTP status, repeated.
    pub status_code: u16,
    /// What went wrong.
    pub message: String,
    /// Short error name.
    pub error: String,
}

/// Accepts every batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBatchValidator;

#[async_trait::async_trait]
impl BatchValidator for DisabledBatchValidator {
    async fn validate_batch(
        &self,
        batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<bool> {
        tracing::trace!(batch_id = %batch.id, "batch validation disabled");
        Ok(true)
    }
}

/// Builds the validator for the `source -> destination` direction.
///
/// A disabled config yields a [`DisabledBatchValidator`]. An enabled one
/// needs a URL.
pub fn create_batch_validator(
    config: &BatchValidatorConfig,
    source_chain: Chain,
    destination_chain: Chain,
) -> bridge_relayer_utils::Result<Arc<dyn BatchValidator>> {
    if !config.enabled {
        return Ok(Arc::new(DisabledBatchValidator));
    }
    let url = config.url.clone().ok_or_else(|| {
        Error::InvalidConfig(
            "batch-validator.url is required when the validator is enabled"
                .into(),
        )
    })?;
    let validator = HttpBatchValidator::new(
        HttpBatchValidatorArgs::builder()
            .source_chain(source_chain)
            .destination_chain(destination_chain)
            .url(url)
            .request_time(config.request_time())
            .build(),
    )?;
    Ok(Arc::new(validator))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_relayer_types::BatchId;

    #[tokio::test]
    async fn disabled_validator_accepts_everything() {
        let batch = TransferBatch::new(BatchId(1), Vec::new());
        assert!(DisabledBatchValidator.validate_batch(&batch).await.unwrap());
    }

    #[test]
    fn response_wire_shape() {
        let body = serde_json::to_string(&MicroserviceResponse { valid: true })
            .unwrap();
        assert_eq!(body, r#"{"valid":true}"#);

        let bad: MicroserviceBadRequestBody = serde_json::from_str(
            r#"{"statusCode":400,"message":"wrong nonce","error":"Bad Request"}"#,
        )
        .unwrap();
        assert_eq!(bad.status_code, 400);
        assert_eq!(bad.message, "wrong nonce");
    }

    #[tokio::test]
    async fn factory_follows_config() {
        let disabled = create_batch_validator(
            &BatchValidatorConfig::default(),
            Chain::Ethereum,
            Chain::MultiversX,
        )
        .unwrap();
        let batch = TransferBatch::new(BatchId(1), Vec::new());
        assert!(disabled.validate_batch(&batch).await.unwrap());

        let missing_url = BatchValidatorConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(matches!(
            create_batch_validator(&missing_url, Chain::Ethereum, Chain::MultiversX),
            Err(Error::InvalidConfig(_))
        ));

        let enabled = BatchValidatorConfig {
            enabled: true,
            url: Some("http://127.0.0.1:1".parse().unwrap()),
            request_time_in_millis: 100,
        };
        assert!(matches!(
            create_batch_validator(
                &enabled,
                Chain::Other("Polygon".into()),
                Chain::MultiversX
            ),
            Err(Error::InvalidChain(_))
        ));
        assert!(create_batch_validator(&enabled, Chain::Bsc, Chain::MultiversX)
            .is_ok());
    }
}
