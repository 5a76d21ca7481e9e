//! The macro recording state machine.
//!
//! One recorder owns at most one active recording. Listener callbacks run
//! on platform threads and funnel through [`MacroRecorder::process_input`];
//! every mutation of recorder state happens behind a single mutex held only
//! for the mutation itself — element resolution and screenshot I/O run
//! outside the lock so the input thread is never blocked on disk.
//!
//! Cross-thread requests (the stop toggle key) are queued as
//! [`RecorderCommand`]s and drained by the owning control flow instead of
//! being acted on inside the listener callback.

use crate::error::{MacroError, Result};
use crate::events::{EventData, Macro, MacroEvent, MarkerKind, MouseButton};
use crate::listener::{InputEvent, InputSource, KeyPress, ListenerGuard};
use crate::package::{MacroPackage, SavedPackage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};
use uiscribe::{
    AccessibilityProvider, AnnotationKind, Annotator, Element, ElementResolver, Point,
    ProcessIndex, ScreenCapture,
};

/// Keys that commit the text buffer by default.
const DEFAULT_COMMIT_KEYS: &[&str] = &["enter", "tab", "escape"];

/// Modifiers are only meaningful inside hotkey combinations, which the
/// embedding layer records separately; alone they are noise.
const MODIFIER_KEYS: &[&str] = &["ctrl", "alt", "shift", "cmd"];

/// Caret movement that would desynchronize the text buffer from the field.
const NAVIGATION_KEYS: &[&str] = &[
    "left", "right", "up", "down", "home", "end", "page_up", "page_down",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Recording,
    Paused,
    Stopped,
}

impl RecorderState {
    pub fn name(&self) -> &'static str {
        match self {
            RecorderState::Idle => "idle",
            RecorderState::Recording => "recording",
            RecorderState::Paused => "paused",
            RecorderState::Stopped => "stopped",
        }
    }
}

/// Requests queued from listener threads for the owning control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderCommand {
    /// The toggle key was pressed; the owner should stop the recording.
    StopRequested,
}

/// Per-recording configuration, echoed into the saved metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    pub capture_ui_context: bool,
    pub capture_screenshots: bool,

    /// Reserved minimum pointer travel for move coalescing; movement is
    /// currently never recorded, only tracked.
    pub mouse_move_threshold: f64,

    /// Keys that flush the text buffer, lowercase.
    pub commit_keys: Vec<String>,

    /// The recorder's own start/stop toggle, filtered from the stream.
    pub toggle_key: String,

    /// Root directory for macro packages.
    pub output_dir: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            capture_ui_context: true,
            capture_screenshots: true,
            mouse_move_threshold: 50.0,
            commit_keys: DEFAULT_COMMIT_KEYS.iter().map(|k| k.to_string()).collect(),
            toggle_key: "f9".to_string(),
            output_dir: PathBuf::from("macros"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartSummary {
    pub macro_name: String,
    pub state: RecorderState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopSummary {
    pub macro_name: String,
    pub events_recorded: usize,
    pub state: RecorderState,
    pub saved: Option<SavedPackage>,
    /// Set when saving failed; the frozen macro is retained in memory and
    /// `save_last` can retry.
    pub save_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSummary {
    pub state: RecorderState,
    pub macro_name: Option<String>,
    pub events_recorded: usize,
}

/// Mutable state of the active recording.
struct Session {
    macro_doc: Macro,
    text_buffer: String,
    last_position: Point,
    screenshot_counter: u32,
    package_dir: Option<PathBuf>,
}

struct Inner {
    state: RecorderState,
    config: RecorderConfig,
    session: Option<Session>,
    listener: Option<ListenerGuard>,
    /// Last frozen recording, kept for save retries.
    last_macro: Option<Macro>,
    last_package_dir: Option<PathBuf>,
}

/// Records global input into a macro document.
pub struct MacroRecorder {
    inner: Mutex<Inner>,
    resolver: ElementResolver,
    annotator: Annotator,
    provider: Arc<dyn AccessibilityProvider>,
    input: Arc<dyn InputSource>,
    commands_tx: Sender<RecorderCommand>,
    commands_rx: Mutex<Option<Receiver<RecorderCommand>>>,
}

impl MacroRecorder {
    pub fn new(
        provider: Arc<dyn AccessibilityProvider>,
        processes: Arc<dyn ProcessIndex>,
        capture: Arc<dyn ScreenCapture>,
        input: Arc<dyn InputSource>,
    ) -> Arc<Self> {
        let (commands_tx, commands_rx) = mpsc::channel();
        Arc::new(Self {
            inner: Mutex::new(Inner {
                state: RecorderState::Idle,
                config: RecorderConfig::default(),
                session: None,
                listener: None,
                last_macro: None,
                last_package_dir: None,
            }),
            resolver: ElementResolver::new(Arc::clone(&provider), processes),
            annotator: Annotator::new(capture),
            provider,
            input,
            commands_tx,
            commands_rx: Mutex::new(Some(commands_rx)),
        })
    }

    /// The command queue receiver; present until first taken. The owning
    /// control flow drains it and reacts to stop requests.
    pub fn take_command_receiver(&self) -> Option<Receiver<RecorderCommand>> {
        self.lock_commands().take()
    }

    /// Begin a new recording. Fails with [`MacroError::AlreadyRecording`]
    /// unless the recorder is idle (or a previous recording has stopped).
    pub fn start_recording(
        self: &Arc<Self>,
        name: &str,
        description: &str,
        config: RecorderConfig,
    ) -> Result<StartSummary> {
        {
            let mut inner = self.lock();
            match inner.state {
                RecorderState::Idle | RecorderState::Stopped => {}
                RecorderState::Recording | RecorderState::Paused => {
                    return Err(MacroError::AlreadyRecording)
                }
            }

            let package_dir = if config.capture_screenshots {
                Some(MacroPackage::new(&config.output_dir).create_layout(name)?)
            } else {
                None
            };

            inner.session = Some(Session {
                macro_doc: Macro::new(name, description),
                text_buffer: String::new(),
                last_position: self.provider.cursor_position(),
                screenshot_counter: 0,
                package_dir,
            });
            inner.config = config;
            inner.state = RecorderState::Recording;
        }

        // Attach outside the lock; the hook spawns its own thread and
        // callbacks re-check state anyway.
        let weak = Arc::downgrade(self);
        let callback = Arc::new(move |event: InputEvent| {
            if let Some(recorder) = weak.upgrade() {
                recorder.process_input(event);
            }
        });
        let guard = match self.input.attach(callback) {
            Ok(guard) => guard,
            Err(e) => {
                let mut inner = self.lock();
                inner.session = None;
                inner.state = RecorderState::Idle;
                return Err(e);
            }
        };
        self.lock().listener = Some(guard);

        self.record_marker(MarkerKind::InitialState);
        info!("Started recording macro: {name}");

        Ok(StartSummary {
            macro_name: name.to_string(),
            state: RecorderState::Recording,
        })
    }

    /// Pause (`true`) or resume (`false`) the active recording.
    pub fn pause_recording(&self, pause: bool) -> Result<RecorderState> {
        let mut inner = self.lock();
        match (pause, inner.state) {
            (true, RecorderState::Recording) => {
                if let Some(listener) = &inner.listener {
                    listener.set_delivering(false);
                }
                inner.state = RecorderState::Paused;
                info!("Recording paused");
                Ok(RecorderState::Paused)
            }
            (false, RecorderState::Paused) => {
                if let Some(listener) = &inner.listener {
                    listener.set_delivering(true);
                }
                inner.state = RecorderState::Recording;
                info!("Recording resumed");
                Ok(RecorderState::Recording)
            }
            (true, state) => Err(MacroError::InvalidTransition {
                action: "pause",
                state: state.name(),
            }),
            (false, state) => Err(MacroError::InvalidTransition {
                action: "resume",
                state: state.name(),
            }),
        }
    }

    /// Stop the active recording, flush pending text, stamp the final
    /// marker and optionally save the package.
    pub fn stop_recording(&self, save: bool) -> Result<StopSummary> {
        let pending = {
            let mut inner = self.lock();
            match inner.state {
                RecorderState::Recording | RecorderState::Paused => {}
                state => {
                    return Err(MacroError::InvalidTransition {
                        action: "stop",
                        state: state.name(),
                    })
                }
            }
            // Dropping the guard stops event delivery for good.
            inner.listener = None;
            inner.state = RecorderState::Stopped;
            inner.session.as_mut().and_then(|s| {
                (!s.text_buffer.trim().is_empty())
                    .then(|| (std::mem::take(&mut s.text_buffer), s.last_position))
            })
        };

        if let Some((text, cursor)) = pending {
            self.commit_text(text, cursor);
        }
        self.record_marker(MarkerKind::FinalState);

        let (mut macro_doc, package_dir, config) = {
            let mut inner = self.lock();
            let session = inner.session.take().ok_or(MacroError::InvalidTransition {
                action: "stop",
                state: "idle",
            })?;
            (
                session.macro_doc,
                session.package_dir,
                inner.config.clone(),
            )
        };

        macro_doc.finalize(serde_json::to_value(&config).unwrap_or(serde_json::Value::Null));

        let mut summary = StopSummary {
            macro_name: macro_doc.name.clone(),
            events_recorded: macro_doc.events.len(),
            state: RecorderState::Stopped,
            saved: None,
            save_error: None,
        };

        {
            let mut inner = self.lock();
            inner.last_macro = Some(macro_doc.clone());
            inner.last_package_dir = package_dir.clone();
        }

        if save {
            // Screenshot-less recordings have no directory yet; lay one
            // out now.
            let target = match package_dir {
                Some(dir) => Ok(dir),
                None => MacroPackage::new(&config.output_dir).create_layout(&macro_doc.name),
            };
            let save_outcome = target.and_then(|dir| {
                self.lock().last_package_dir = Some(dir.clone());
                MacroPackage::new(&config.output_dir).save(&macro_doc, &dir)
            });
            match save_outcome {
                Ok(saved) => summary.saved = Some(saved),
                Err(e) => {
                    warn!("Saving macro failed (events retained in memory): {e}");
                    summary.save_error = Some(e.to_string());
                }
            }
        }

        info!(
            "Stopped recording macro: {} ({} events)",
            summary.macro_name, summary.events_recorded
        );
        Ok(summary)
    }

    /// Retry saving the most recently stopped recording.
    pub fn save_last(&self) -> Result<SavedPackage> {
        let (macro_doc, package_dir, output_dir) = {
            let inner = self.lock();
            let macro_doc = inner
                .last_macro
                .clone()
                .ok_or_else(|| MacroError::SaveError("No stopped recording to save".into()))?;
            (
                macro_doc,
                inner.last_package_dir.clone(),
                inner.config.output_dir.clone(),
            )
        };
        let package = MacroPackage::new(&output_dir);
        let dir = match package_dir {
            Some(dir) => dir,
            None => package.create_layout(&macro_doc.name)?,
        };
        self.lock().last_package_dir = Some(dir.clone());
        package.save(&macro_doc, &dir)
    }

    /// The most recently stopped recording, frozen.
    pub fn last_macro(&self) -> Option<Macro> {
        self.lock().last_macro.clone()
    }

    pub fn status(&self) -> StatusSummary {
        let inner = self.lock();
        StatusSummary {
            state: inner.state,
            macro_name: inner.session.as_ref().map(|s| s.macro_doc.name.clone()),
            events_recorded: inner
                .session
                .as_ref()
                .map(|s| s.macro_doc.events.len())
                .unwrap_or(0),
        }
    }

    /// Feed one normalized input event through the capture policy.
    ///
    /// Called from listener threads; also the entry point for tests.
    pub fn process_input(&self, event: InputEvent) {
        match event {
            InputEvent::MouseMove { x, y } => {
                let mut inner = self.lock();
                if inner.state == RecorderState::Recording {
                    if let Some(session) = inner.session.as_mut() {
                        session.last_position = Point::new(x, y);
                    }
                }
            }
            InputEvent::MouseDown { x, y, button } => self.handle_click(x, y, button),
            // Button-up is not an action; the press is the atomic click.
            InputEvent::MouseUp { .. } => {}
            InputEvent::Wheel { x, y, dx, dy } => {
                let mut inner = self.lock();
                if inner.state != RecorderState::Recording {
                    return;
                }
                if let Some(session) = inner.session.as_mut() {
                    session.macro_doc.push(MacroEvent::new(
                        now(),
                        EventData::Scroll {
                            x,
                            y,
                            scroll_dx: dx,
                            scroll_dy: dy,
                        },
                    ));
                    debug!("Recorded mouse scroll at ({x}, {y}) dy={dy}");
                }
            }
            InputEvent::KeyDown(key) => self.handle_key(key),
            InputEvent::KeyUp(_) => {}
        }
    }

    fn handle_click(&self, x: i32, y: i32, button: MouseButton) {
        let pending = {
            let mut inner = self.lock();
            if inner.state != RecorderState::Recording {
                return;
            }
            let Some(session) = inner.session.as_mut() else {
                return;
            };
            let pending = (!session.text_buffer.trim().is_empty())
                .then(|| (std::mem::take(&mut session.text_buffer), session.last_position));
            session.last_position = Point::new(x, y);
            pending
        };

        // Typed text precedes the click that follows it.
        if let Some((text, cursor)) = pending {
            self.commit_text(text, cursor);
        }

        let point = Point::new(x, y);
        let (capture_context, capture_screenshots, screen) = self.capture_flags();
        let ui_context = capture_context
            .then(|| self.resolver.resolve_at_point(point))
            .flatten();
        let screenshot_path = capture_screenshots
            .then(|| self.take_screenshot(ui_context.as_ref(), point, AnnotationKind::Click))
            .flatten();

        let event = MacroEvent::new(
            now(),
            EventData::Click {
                x,
                y,
                button,
                screen_size: screen,
            },
        )
        .with_ui_context(ui_context)
        .with_screenshot(screenshot_path);

        match &event.ui_context {
            Some(element) => debug!(
                "Recorded mouse click at ({x}, {y}) on {}",
                element.label()
            ),
            None => debug!("Recorded mouse click at ({x}, {y})"),
        }
        self.append(event);
    }

    fn handle_key(&self, key: KeyPress) {
        let (recording, commit_keys, toggle_key) = {
            let inner = self.lock();
            (
                inner.state == RecorderState::Recording,
                inner.config.commit_keys.clone(),
                inner.config.toggle_key.clone(),
            )
        };
        if !recording {
            return;
        }

        match key {
            KeyPress::Char(c) => {
                let mut inner = self.lock();
                if inner.state != RecorderState::Recording {
                    return;
                }
                if let Some(session) = inner.session.as_mut() {
                    session.text_buffer.push(c);
                    debug!("Buffered '{c}' (buffer: '{}')", session.text_buffer);
                }
            }
            KeyPress::Named(name) => {
                let name = name.to_lowercase();
                if name == toggle_key {
                    // The recorder never records its own activation; hand
                    // the request to the owning control flow instead.
                    debug!("Toggle key pressed; queueing stop request");
                    let _ = self.commands_tx.send(RecorderCommand::StopRequested);
                } else if commit_keys.contains(&name) {
                    self.flush_text_buffer();
                    self.append(MacroEvent::new(now(), EventData::Key { key: name }));
                } else if name == "backspace" {
                    let mut inner = self.lock();
                    if let Some(session) = inner.session.as_mut() {
                        session.text_buffer.pop();
                        debug!("Backspace (buffer: '{}')", session.text_buffer);
                    }
                } else if name == "delete" {
                    // Caret position is unknown here; leave the buffer be.
                    debug!("Delete pressed; buffer unchanged");
                } else if MODIFIER_KEYS.contains(&name.as_str()) {
                    // Surfaces inside hotkey combinations only.
                } else if NAVIGATION_KEYS.contains(&name.as_str()) {
                    debug!("Ignored navigation key: {name}");
                } else {
                    self.append(MacroEvent::new(now(), EventData::Key { key: name }));
                }
            }
        }
    }

    /// Flush the text buffer as a committed KeyboardType event.
    fn flush_text_buffer(&self) {
        let pending = {
            let mut inner = self.lock();
            let Some(session) = inner.session.as_mut() else {
                return;
            };
            (!session.text_buffer.trim().is_empty())
                .then(|| (std::mem::take(&mut session.text_buffer), session.last_position))
        };
        if let Some((text, cursor)) = pending {
            self.commit_text(text, cursor);
        }
    }

    /// Build and append the committed-text event; resolution and capture
    /// run outside the lock.
    fn commit_text(&self, text: String, cursor: Point) {
        let (capture_context, capture_screenshots, _) = self.capture_flags();
        let ui_context = capture_context
            .then(|| self.resolver.resolve_at_point(cursor))
            .flatten();
        let screenshot_path = capture_screenshots
            .then(|| self.take_screenshot(ui_context.as_ref(), cursor, AnnotationKind::TextEntry))
            .flatten();

        debug!("Committed text: '{text}'");
        let event = MacroEvent::new(
            now(),
            EventData::Text {
                text,
                cursor_position: cursor,
            },
        )
        .with_ui_context(ui_context)
        .with_screenshot(screenshot_path);
        self.append(event);
    }

    fn record_marker(&self, kind: MarkerKind) {
        let cursor = self.provider.cursor_position();
        let (capture_context, capture_screenshots, _) = self.capture_flags();
        let ui_context = (capture_context && kind == MarkerKind::InitialState)
            .then(|| self.resolver.resolve_at_point(cursor))
            .flatten();
        let screenshot_path = capture_screenshots
            .then(|| self.take_screenshot(None, cursor, AnnotationKind::Marker))
            .flatten();

        self.append(
            MacroEvent::new(
                now(),
                EventData::Marker {
                    action: kind,
                    cursor_position: cursor,
                },
            )
            .with_ui_context(ui_context)
            .with_screenshot(screenshot_path),
        );
    }

    /// Render and write the annotated screenshot for an event, returning
    /// its package-relative path. Failures degrade to `None`; a failed
    /// capture never interrupts recording.
    fn take_screenshot(
        &self,
        element: Option<&Element>,
        point: Point,
        kind: AnnotationKind,
    ) -> Option<String> {
        let (dir, index) = {
            let mut inner = self.lock();
            let session = inner.session.as_mut()?;
            let dir = session.package_dir.clone()?;
            session.screenshot_counter += 1;
            (dir, session.screenshot_counter)
        };

        let image = match self.annotator.annotate(element, point, kind) {
            Ok(image) => image,
            Err(e) => {
                warn!("Failed to render screenshot: {e}");
                return None;
            }
        };

        let relative = format!("screenshots/{index:03}_{}.png", kind.file_stem());
        let path = dir.join(&relative);
        if let Err(e) = image.save(&path) {
            warn!("Failed to write screenshot {path:?}: {e}");
            return None;
        }
        Some(relative)
    }

    fn append(&self, event: MacroEvent) {
        let mut inner = self.lock();
        if let Some(session) = inner.session.as_mut() {
            session.macro_doc.push(event);
        }
    }

    fn capture_flags(&self) -> (bool, bool, (u32, u32)) {
        let inner = self.lock();
        (
            inner.config.capture_ui_context,
            inner.config.capture_screenshots,
            self.provider.screen_size(),
        )
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicked listener thread must not brick the recorder.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_commands(&self) -> MutexGuard<'_, Option<Receiver<RecorderCommand>>> {
        self.commands_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
