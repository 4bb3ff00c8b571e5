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

use std::time::Duration;

use bridge_relayer_types::clients::BatchValidator;
use bridge_relayer_types::service_url::ServiceUrl;
use bridge_relayer_types::{Chain, TransferBatch};
use bridge_relayer_utils::Error;
use reqwest::StatusCode;

use crate::{MicroserviceBadRequestBody, MicroserviceResponse};

/// Shortest accepted request timeout.
pub const MIN_REQUEST_TIME: Duration = Duration::from_millis(1);

/// Arguments of [`HttpBatchValidator::new`].
#[derive(Debug, typed_builder::TypedBuilder)]
pub struct HttpBatchValidatorArgs {
    /// Chain the batch comes from.
    pub source_chain: Chain,
    /// Chain the batch goes to.
    pub destination_chain: Chain,
    /// Base URL of the service.
    pub url: ServiceUrl,
    /// Timeout of one validation request.
    pub request_time: Duration,
}

/// Posts batches to `{url}/{source}/{destination}` and reads back
/// `{"valid": bool}`.
#[derive(Debug, Clone)]
pub struct HttpBatchValidator {
    request_url: String,
    client: reqwest::Client,
}

fn check_chain(chain: &Chain) -> bridge_relayer_utils::Result<()> {
    match chain {
        Chain::Ethereum | Chain::Bsc | Chain::MultiversX => Ok(()),
        Chain::Other(name) => Err(Error::InvalidChain(name.clone())),
    }
}

fn request_failed(e: impl std::fmt::Display) -> Error {
    Error::BatchValidator(format!("{e} while executing request"))
}

impl HttpBatchValidator {
    /// Checks the arguments and builds the HTTP client.
    ///
    /// Only Ethereum, Bsc and MultiversX are known to the service; any
    /// other chain fails with [`Error::InvalidChain`]. A request time under
    /// [`MIN_REQUEST_TIME`] fails with [`Error::InvalidRequestTime`].
    pub fn new(args: HttpBatchValidatorArgs) -> bridge_relayer_utils::Result<Self> {
        check_chain(&args.source_chain)?;
        check_chain(&args.destination_chain)?;
        if args.request_time < MIN_REQUEST_TIME {
            return Err(Error::InvalidRequestTime {
                got: args.request_time,
                min: MIN_REQUEST_TIME,
            });
        }
        let client = reqwest::Client::builder()
            .timeout(args.request_time)
            .build()?;
        Ok(Self {
            request_url: format!(
                "{}/{}/{}",
                args.url.base(),
                args.source_chain.to_lowercase(),
                args.destination_chain.to_lowercase()
            ),
            client,
        })
    }

    /// Where batches are posted.
    pub fn request_url(&self) -> &str {
        &self.request_url
    }

    async fn do_request(
        &self,
        body: Vec<u8>,
    ) -> bridge_relayer_utils::Result<Vec<u8>> {
        let response = self
            .client
            .post(&self.request_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(request_failed)?;
        let status = response.status();
        let data = response.bytes().await.map_err(request_failed)?;
        if status == StatusCode::BAD_REQUEST && !data.is_empty() {
            let bad: MicroserviceBadRequestBody = serde_json::from_slice(&data)
                .map_err(|e| {
                    Error::BatchValidator(format!(
                        "{e} during bad response unmarshal"
                    ))
                })?;
            return Err(Error::BatchValidator(format!(
                "got status {status}: {}",
                bad.message
            )));
        }
        if status != StatusCode::OK {
            return Err(Error::BatchValidator(format!("got status {status}")));
        }
        Ok(data.to_vec())
    }
}

#[async_trait::async_trait]
impl BatchValidator for HttpBatchValidator {
    #[tracing::instrument(skip_all, fields(batch_id = %batch.id, url = %self.request_url))]
    async fn validate_batch(
        &self,
        batch: &TransferBatch,
    ) -> bridge_relayer_utils::Result<bool> {
        let body = batch.to_json_bytes()?;
        let data = self.do_request(body).await?;
        if data.is_empty() {
            return Err(Error::BatchValidator("empty response".into()));
        }
        let response: MicroserviceResponse = serde_json::from_slice(&data)
            .map_err(|e| {
                Error::BatchValidator(format!("{e} during response unmarshal"))
            })?;
        tracing::debug!(valid = response.valid, "batch validator answered");
        Ok(response.valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::{Json, Router};
    use bridge_relayer_types::{BatchId, DepositTransfer};

    async fn serve(router: Router) -> SocketAddr {
        let server = axum::Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0)))
            .serve(router.into_make_service());
        let addr = server.local_addr();
        tokio::spawn(server);
        addr
    }

    fn validator(addr: SocketAddr, request_time: Duration) -> HttpBatchValidator {
        HttpBatchValidator::new(
            HttpBatchValidatorArgs::builder()
                .source_chain(Chain::Ethereum)
                .destination_chain(Chain::MultiversX)
                .url(format!("http://{addr}/").parse().unwrap())
                .request_time(request_time)
                .build(),
        )
        .unwrap()
    }

    fn batch(id: u64) -> TransferBatch {
        TransferBatch::new(
            BatchId(id),
            vec![DepositTransfer {
                nonce: 1,
                to: "erd1qqq".into(),
                from: "0xabc".into(),
                token: "USDC".into(),
                amount: 1_000,
            }],
        )
    }

    fn canned(status: AxumStatus, body: &'static str) -> Router {
        Router::new().route(
            "/ethereum/multiversx",
            post(move || async move { (status, body) }),
        )
    }

    #[test]
    fn construction_checks() {
        let args = |src, dst, ms| {
            HttpBatchValidatorArgs::builder()
                .source_chain(src)
                .destination_chain(dst)
                .url("http://validator.local".parse().unwrap())
                .request_time(Duration::from_micros(ms))
                .build()
        };
        let ok = HttpBatchValidator::new(args(
            Chain::Bsc,
            Chain::MultiversX,
            1_000,
        ))
        .unwrap();
        assert_eq!(ok.request_url(), "http://validator.local/bsc/multiversx");

        assert!(matches!(
            HttpBatchValidator::new(args(
                Chain::Other("Polygon".into()),
                Chain::MultiversX,
                1_000
            )),
            Err(Error::InvalidChain(name)) if name == "Polygon"
        ));
        assert!(matches!(
            HttpBatchValidator::new(args(
                Chain::Ethereum,
                Chain::Other("Arbitrum".into()),
                1_000
            )),
            Err(Error::InvalidChain(_))
        ));
        assert!(matches!(
            HttpBatchValidator::new(args(Chain::Ethereum, Chain::MultiversX, 999)),
            Err(Error::InvalidRequestTime { .. })
        ));
    }

    #[tokio::test]
    async fn posts_the_batch_as_json() {
        // `Json` refuses bodies without the JSON content type.
        let router = Router::new().route(
            "/ethereum/multiversx",
            post(|Json(body): Json<serde_json::Value>| async move {
                Json(MicroserviceResponse {
                    valid: body["batchId"] == 7 && body["deposits"][0]["nonce"] == 1,
                })
            }),
        );
        let addr = serve(router).await;
        let validator = validator(addr, Duration::from_secs(2));
        assert!(validator.validate_batch(&batch(7)).await.unwrap());
        assert!(!validator.validate_batch(&batch(8)).await.unwrap());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn reads_verdict() {
        let addr = serve(canned(AxumStatus::OK, r#"{"valid": false}"#)).await;
        let validator = validator(addr, Duration::from_secs(2));
        assert!(!validator.validate_batch(&batch(1)).await.unwrap());
        assert!(logs_contain("batch validator answered"));
    }

    #[tokio::test]
    async fn bad_request_surfaces_service_message() {
        let addr = serve(canned(
            AxumStatus::BAD_REQUEST,
            r#"{"statusCode":400,"message":"unknown deposit","error":"Bad Request"}"#,
        ))
        .await;
        let err = validator(addr, Duration::from_secs(2))
            .validate_batch(&batch(1))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Batch validator error: got status 400 Bad Request: unknown deposit"
        );
    }

    #[tokio::test]
    async fn other_statuses_are_errors() {
        let addr =
            serve(canned(AxumStatus::INTERNAL_SERVER_ERROR, "boom")).await;
        let err = validator(addr, Duration::from_secs(2))
            .validate_batch(&batch(1))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Batch validator error: got status 500 Internal Server Error"
        );
    }

    #[tokio::test]
    async fn empty_and_malformed_bodies() {
        let addr = serve(canned(AxumStatus::OK, "")).await;
        let err = validator(addr, Duration::from_secs(2))
            .validate_batch(&batch(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty response"));

        let addr = serve(canned(AxumStatus::OK, "not json")).await;
        let err = validator(addr, Duration::from_secs(2))
            .validate_batch(&batch(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("during response unmarshal"));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let router = Router::new().route(
            "/ethereum/multiversx",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(MicroserviceResponse { valid: true })
            }),
        );
        let addr = serve(router).await;
        let err = validator(addr, Duration::from_millis(50))
            .validate_batch(&batch(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("while executing request"));
    }

    #[tokio::test]
    async fn unknown_route_is_an_error() {
        let router = Router::new().route(
            "/bsc/multiversx",
            post(|| async { Json(MicroserviceResponse { valid: true }) }),
        );
        let addr = serve(router).await;
        let err = validator(addr, Duration::from_secs(2))
            .validate_batch(&batch(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("got status 404"));
    }
}
