//! Post-action verification through an external vision-capable service.
//!
//! The service itself (typically an HTTP endpoint wrapping a vision model)
//! is a black box to this crate: callers hand it a described action plus a
//! query and get back a pass/fail answer.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// One verification question about the live UI.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    /// What was just done, e.g. `"Clicked at (500, 300)"`.
    pub action_description: String,
    /// What the UI is expected to show as a result.
    pub expected_result: String,
    /// The concrete question for the vision service.
    pub query: String,
    /// Hard deadline; exceeding it counts as a failed verification.
    pub timeout: Duration,
    /// Optional pre-action screenshot for before/after comparison.
    pub before_image: Option<PathBuf>,
}

/// The service's answer.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub passed: bool,
    pub details: String,
}

impl VerificationOutcome {
    pub fn passed(details: impl Into<String>) -> Self {
        Self {
            passed: true,
            details: details.into(),
        }
    }

    pub fn failed(details: impl Into<String>) -> Self {
        Self {
            passed: false,
            details: details.into(),
        }
    }
}

/// Vision-backed verification capability.
#[async_trait]
pub trait VerificationService: Send + Sync {
    async fn verify(&self, request: VerificationRequest) -> VerificationOutcome;
}
