use std::time::Duration;
use tracing::{debug, error};

use super::request::FraudCheckRequest;
use super::response::FraudCheckResponse;

const API_KEY_HEADER: &str = "X-API-KEY";

/// HTTP client for the internal edge -> scoring call, authenticated by
/// the pre-shared key.
pub struct ScoringClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ScoringClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()?;

        Ok(ScoringClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub async fn validate_invoice(
        &self,
        request: &FraudCheckRequest,
    ) -> anyhow::Result<FraudCheckResponse> {
        debug!("Forwarding fraud validation request to scoring service");

        let response = self
            .http
            .post(format!("{}/api/v1/invoices/validate", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to reach scoring service");
                anyhow::anyhow!("scoring service unreachable: {e}")
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "Scoring service rejected the request");
            anyhow::bail!("scoring service returned {status}");
        }

        Ok(response.json().await?)
    }
}
