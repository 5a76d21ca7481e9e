//! Macro recording and playback.
//!
//! This crate captures global mouse/keyboard input into replayable "macro"
//! documents with resolved UI context and annotated screenshots, persists
//! them as self-contained packages, and plays them back at a controllable
//! speed with optional per-step verification.

pub mod error;
pub mod events;
pub mod injector;
pub mod listener;
pub mod package;
pub mod player;
pub mod recorder;

pub use error::{MacroError, Result};
pub use events::{
    EventData, Macro, MacroEvent, MacroEventType, MacroMetadata, MarkerKind, MouseButton,
};
pub use injector::{EnigoInjector, InputInjector};
pub use listener::{GlobalInputSource, InputEvent, InputSource, KeyPress, ListenerGuard};
pub use package::{load_macro, MacroPackage, SavedPackage};
pub use player::{MacroPlayer, PlaybackOptions, PlaybackResult, VerificationRecord};
pub use recorder::{
    MacroRecorder, RecorderCommand, RecorderConfig, RecorderState, StartSummary, StopSummary,
};
