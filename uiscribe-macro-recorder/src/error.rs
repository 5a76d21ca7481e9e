use thiserror::Error;

#[derive(Error, Debug)]
pub enum MacroError {
    #[error("Already recording a macro; stop the current recording first")]
    AlreadyRecording,

    #[error("Invalid recorder transition: cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("Failed to attach input listeners: {0}")]
    ListenerError(String),

    #[error("Failed to save macro package: {0}")]
    SaveError(String),

    #[error("Failed to load macro: {0}")]
    LoadError(String),

    #[error("A playback is already in progress")]
    PlaybackInProgress,

    #[error("Playback dispatch failed: {0}")]
    DispatchError(String),
}

pub type Result<T> = std::result::Result<T, MacroError>;
