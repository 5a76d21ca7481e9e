//! Vision-endpoint verification client.
//!
//! Posts the action description and query as JSON to a configured endpoint
//! and expects `{"passed": bool, "details": string}` back. Transport
//! failures and timeouts count as failed verifications, never as crashes.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;
use uiscribe::{VerificationOutcome, VerificationRequest, VerificationService};

pub struct HttpVerifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpVerifier {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    passed: bool,
    #[serde(default)]
    details: String,
}

#[async_trait]
impl VerificationService for HttpVerifier {
    async fn verify(&self, request: VerificationRequest) -> VerificationOutcome {
        let before_image = request.before_image.as_ref().and_then(|path| {
            let bytes = std::fs::read(path).ok()?;
            Some(base64::engine::general_purpose::STANDARD.encode(bytes))
        });

        let payload = serde_json::json!({
            "action_description": request.action_description,
            "expected_result": request.expected_result,
            "query": request.query,
            "before_image": before_image,
        });

        debug!("Verifying via {}: {}", self.endpoint, request.query);
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(request.timeout)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(response) => match response.json::<VerifyResponse>().await {
                Ok(verdict) => VerificationOutcome {
                    passed: verdict.passed,
                    details: verdict.details,
                },
                Err(e) => VerificationOutcome::failed(format!("Malformed verifier response: {e}")),
            },
            Err(e) => VerificationOutcome::failed(format!("Verification request failed: {e}")),
        }
    }
}
