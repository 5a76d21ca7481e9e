//! Macro playback.
//!
//! Replays a stored macro's events in order, reproducing the recorded
//! pacing at an adjustable speed, with optional per-step verification
//! against the live UI. Ordinary playback failures surface inside the
//! returned [`PlaybackResult`]; the player does not panic for them.

use crate::error::{MacroError, Result};
use crate::events::{EventData, Macro, MacroEvent};
use crate::injector::InputInjector;
use crate::package;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};
use uiscribe::{VerificationOutcome, VerificationRequest, VerificationService};

#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    /// Time-scale divisor: 2.0 replays twice as fast as recorded.
    pub speed_multiplier: f64,
    pub verify_each_step: bool,
    pub stop_on_verification_failure: bool,
    /// Pace through the macro without dispatching any input.
    pub dry_run: bool,
    pub verification_timeout: Duration,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            verify_each_step: false,
            stop_on_verification_failure: true,
            dry_run: false,
            verification_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRecord {
    pub event_index: usize,
    pub passed: bool,
    pub details: String,
}

/// Structured playback outcome; always returned, even on failure.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackResult {
    pub success: bool,
    pub events_total: usize,
    /// Events whose dispatch ran, the failing one included.
    pub events_executed: usize,
    /// Wall-clock seconds spent replaying.
    pub total_duration: f64,
    /// The event that stopped playback, when stop-on-failure fired.
    pub failed_event: Option<MacroEvent>,
    pub verifications: Vec<VerificationRecord>,
    pub error: Option<String>,
}

impl PlaybackResult {
    fn empty(events_total: usize) -> Self {
        Self {
            success: false,
            events_total,
            events_executed: 0,
            total_duration: 0.0,
            failed_event: None,
            verifications: Vec::new(),
            error: None,
        }
    }

    pub fn verifications_passed(&self) -> usize {
        self.verifications.iter().filter(|v| v.passed).count()
    }

    pub fn verifications_failed(&self) -> usize {
        self.verifications.iter().filter(|v| !v.passed).count()
    }
}

/// Replays macros through an injector, optionally verifying each step.
pub struct MacroPlayer {
    injector: Mutex<Box<dyn InputInjector>>,
    verifier: Option<Arc<dyn VerificationService>>,
    busy: AtomicBool,
}

impl MacroPlayer {
    pub fn new(
        injector: Box<dyn InputInjector>,
        verifier: Option<Arc<dyn VerificationService>>,
    ) -> Self {
        Self {
            injector: Mutex::new(injector),
            verifier,
            busy: AtomicBool::new(false),
        }
    }

    /// Load and replay a stored package (directory or `macro.json` path).
    pub async fn play_file(&self, path: &Path, options: &PlaybackOptions) -> Result<PlaybackResult> {
        let macro_doc = package::load_macro(path)?;
        Ok(self.play(&macro_doc, options).await)
    }

    /// Replay a loaded macro. A concurrent `play` on the same player fails
    /// fast instead of interleaving input streams.
    pub async fn play(&self, macro_doc: &Macro, options: &PlaybackOptions) -> PlaybackResult {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            let mut result = PlaybackResult::empty(macro_doc.events.len());
            result.error = Some(MacroError::PlaybackInProgress.to_string());
            return result;
        }
        let result = self.run(macro_doc, options).await;
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn run(&self, macro_doc: &Macro, options: &PlaybackOptions) -> PlaybackResult {
        let started = tokio::time::Instant::now();
        let speed = options.speed_multiplier.max(0.01);
        let mut result = PlaybackResult::empty(macro_doc.events.len());
        let mut dispatch_failures = 0usize;
        let mut previous_timestamp: Option<f64> = None;

        info!(
            "Playing macro '{}' ({} events, {speed}x speed{})",
            macro_doc.name,
            macro_doc.events.len(),
            if options.dry_run { ", dry run" } else { "" }
        );

        for (index, event) in macro_doc.events.iter().enumerate() {
            // Reproduce the recorded pacing between consecutive events.
            if let Some(previous) = previous_timestamp {
                let delay = (event.timestamp - previous).max(0.0) / speed;
                if delay > 0.0 {
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                }
            }
            previous_timestamp = Some(event.timestamp);

            debug!("Event {}/{}: {:?}", index + 1, result.events_total, event.event_type);

            let dispatched = if options.dry_run {
                Ok(())
            } else {
                self.dispatch(event, speed).await
            };
            // The failing event still counts as executed: its dispatch ran
            // before the failure was observed.
            result.events_executed = index + 1;

            if let Err(e) = dispatched {
                warn!("Dispatch failed for event {}: {e}", index + 1);
                dispatch_failures += 1;
                if result.error.is_none() {
                    result.error = Some(e.to_string());
                }
                if options.stop_on_verification_failure {
                    result.failed_event = Some(event.clone());
                    break;
                }
                continue;
            }

            if options.verify_each_step && !options.dry_run {
                let Some(verifier) = &self.verifier else {
                    continue;
                };
                let request = verification_request(event, options.verification_timeout);
                let outcome = match tokio::time::timeout(
                    options.verification_timeout,
                    verifier.verify(request),
                )
                .await
                {
                    Ok(outcome) => outcome,
                    // A slow verifier is a failed check, not a fatal error.
                    Err(_) => VerificationOutcome::failed("Verification timed out"),
                };

                let passed = outcome.passed;
                result.verifications.push(VerificationRecord {
                    event_index: index,
                    passed,
                    details: outcome.details,
                });

                if !passed {
                    warn!("Verification failed for event {}", index + 1);
                    if options.stop_on_verification_failure {
                        result.failed_event = Some(event.clone());
                        break;
                    }
                }
            }
        }

        result.total_duration = started.elapsed().as_secs_f64();
        result.success = result.failed_event.is_none()
            && dispatch_failures == 0
            && result.verifications_failed() == 0;

        info!(
            "Playback {}: {}/{} events, {:.2}s",
            if result.success { "succeeded" } else { "failed" },
            result.events_executed,
            result.events_total,
            result.total_duration
        );
        result
    }

    async fn dispatch(&self, event: &MacroEvent, speed: f64) -> Result<()> {
        match &event.data {
            EventData::Click { x, y, button, .. } => {
                self.lock_injector()?.click(*x, *y, *button)
            }
            EventData::Scroll {
                x,
                y,
                scroll_dx,
                scroll_dy,
            } => self.lock_injector()?.scroll(*x, *y, *scroll_dx, *scroll_dy),
            EventData::Text { text, .. } => self.lock_injector()?.type_text(text),
            EventData::Key { key } => self.lock_injector()?.press_key(key),
            // State markers carry evidence, not input.
            EventData::Marker { .. } => Ok(()),
            EventData::Wait { duration } => {
                tokio::time::sleep(Duration::from_secs_f64(duration.max(0.0) / speed)).await;
                Ok(())
            }
        }
    }

    fn lock_injector(&self) -> Result<std::sync::MutexGuard<'_, Box<dyn InputInjector>>> {
        self.injector
            .lock()
            .map_err(|_| MacroError::DispatchError("Input injector is poisoned".into()))
    }
}

/// Derive the verification question from the event being replayed.
fn verification_request(event: &MacroEvent, timeout: Duration) -> VerificationRequest {
    let target = event
        .ui_context
        .as_ref()
        .map(|element| format!(" on {}", element.label()))
        .unwrap_or_default();

    let (action_description, expected_result, query) = match &event.data {
        EventData::Click { x, y, .. } => (
            format!("Clicked at ({x}, {y}){target}"),
            "UI should respond to the click action".to_string(),
            format!("UI change or response from clicking at coordinates ({x}, {y})"),
        ),
        EventData::Scroll { x, y, scroll_dy, .. } => (
            format!("Scrolled at ({x}, {y}) by {scroll_dy}"),
            "Content should scroll in response to the wheel".to_string(),
            format!("visible content scrolled at ({x}, {y})"),
        ),
        EventData::Text { text, .. } => (
            format!("Typed text '{text}'{target}"),
            "Text should appear in the UI or trigger expected action".to_string(),
            format!("text '{text}' appears in the input field or text area"),
        ),
        EventData::Key { key } => {
            let query = match key.as_str() {
                "enter" => "form was submitted or action was triggered by pressing Enter".to_string(),
                "tab" => "focus moved to next element or field".to_string(),
                "escape" => "dialog closed or action was cancelled".to_string(),
                other => format!("UI responded to pressing the '{other}' key"),
            };
            (
                format!("Pressed key '{key}'"),
                format!("UI should respond to the '{key}' key press"),
                query,
            )
        }
        EventData::Marker { action, .. } => (
            format!("State marker: {action:?}"),
            "No UI change expected".to_string(),
            "screen state captured".to_string(),
        ),
        EventData::Wait { duration } => (
            format!("Waited {duration:.2}s"),
            "No UI change expected".to_string(),
            "screen state unchanged".to_string(),
        ),
    };

    VerificationRequest {
        action_description,
        expected_result,
        query,
        timeout,
        before_image: event.screenshot_path.as_ref().map(Into::into),
    }
}
