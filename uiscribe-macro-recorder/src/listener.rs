//! Global input capture.
//!
//! The recorder consumes normalized [`InputEvent`]s through the
//! [`InputSource`] seam; [`GlobalInputSource`] implements it with an `rdev`
//! listener thread. rdev reports button presses and wheel events without
//! coordinates, so the listener tracks the pointer position itself and
//! attaches it.

use crate::error::{MacroError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// A keyboard press, already split into printable vs named keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPress {
    /// A printable character.
    Char(char),
    /// A named key, lowercase: `"enter"`, `"backspace"`, `"f9"`…
    Named(String),
}

/// Normalized global input event.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    MouseMove { x: i32, y: i32 },
    MouseDown { x: i32, y: i32, button: crate::events::MouseButton },
    MouseUp { x: i32, y: i32, button: crate::events::MouseButton },
    Wheel { x: i32, y: i32, dx: i32, dy: i32 },
    KeyDown(KeyPress),
    KeyUp(KeyPress),
}

pub type InputCallback = Arc<dyn Fn(InputEvent) + Send + Sync>;

/// Keeps the listener alive; delivery can be suspended for pause and is
/// stopped for good on drop.
pub struct ListenerGuard {
    delivering: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl ListenerGuard {
    pub fn new(delivering: Arc<AtomicBool>, stopped: Arc<AtomicBool>) -> Self {
        Self {
            delivering,
            stopped,
        }
    }

    /// Gate event delivery without tearing the hook down (pause/resume).
    pub fn set_delivering(&self, delivering: bool) {
        self.delivering.store(delivering, Ordering::SeqCst);
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.delivering.store(false, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Source of global input events.
pub trait InputSource: Send + Sync {
    /// Install the hook and start delivering events to `callback`.
    ///
    /// Attach failures are fatal to starting a recording; the recorder
    /// never proceeds without input capture.
    fn attach(&self, callback: InputCallback) -> Result<ListenerGuard>;
}

/// `rdev`-backed process-wide input hook.
///
/// The OS hook cannot be unregistered portably once installed, so the
/// listener thread lives until process exit; the guard's flags gate
/// delivery instead.
#[derive(Debug, Default)]
pub struct GlobalInputSource;

impl GlobalInputSource {
    pub fn new() -> Self {
        Self
    }
}

impl InputSource for GlobalInputSource {
    fn attach(&self, callback: InputCallback) -> Result<ListenerGuard> {
        let delivering = Arc::new(AtomicBool::new(true));
        let stopped = Arc::new(AtomicBool::new(false));

        let delivering_flag = Arc::clone(&delivering);
        let stopped_flag = Arc::clone(&stopped);

        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();

        std::thread::Builder::new()
            .name("uiscribe-input-listener".to_string())
            .spawn(move || {
                // Pointer position tracked locally; rdev button/wheel
                // events carry no coordinates.
                let mut last_position = (0i32, 0i32);
                let _ = ready_tx.send(Ok(()));

                let result = rdev::listen(move |event: rdev::Event| {
                    if stopped_flag.load(Ordering::SeqCst) {
                        return;
                    }
                    if let rdev::EventType::MouseMove { x, y } = event.event_type {
                        last_position = (x as i32, y as i32);
                    }
                    if !delivering_flag.load(Ordering::SeqCst) {
                        return;
                    }
                    if let Some(input) = normalize(&event, last_position) {
                        callback(input);
                    }
                });
                if let Err(e) = result {
                    error!("Global input listener terminated: {e:?}");
                }
            })
            .map_err(|e| MacroError::ListenerError(format!("Failed to spawn listener: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(ListenerGuard::new(delivering, stopped)),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(MacroError::ListenerError(format!(
                "Listener thread died during startup: {e}"
            ))),
        }
    }
}

fn normalize(event: &rdev::Event, position: (i32, i32)) -> Option<InputEvent> {
    use crate::events::MouseButton;
    let (x, y) = position;

    match event.event_type {
        rdev::EventType::MouseMove { x, y } => Some(InputEvent::MouseMove {
            x: x as i32,
            y: y as i32,
        }),
        rdev::EventType::ButtonPress(button) => Some(InputEvent::MouseDown {
            x,
            y,
            button: map_button(button)?,
        }),
        rdev::EventType::ButtonRelease(button) => Some(InputEvent::MouseUp {
            x,
            y,
            button: map_button(button)?,
        }),
        rdev::EventType::Wheel { delta_x, delta_y } => Some(InputEvent::Wheel {
            x,
            y,
            dx: delta_x as i32,
            dy: delta_y as i32,
        }),
        rdev::EventType::KeyPress(key) => Some(InputEvent::KeyDown(map_key(key, event))),
        rdev::EventType::KeyRelease(key) => Some(InputEvent::KeyUp(map_key(key, event))),
    }
}

fn map_button(button: rdev::Button) -> Option<crate::events::MouseButton> {
    use crate::events::MouseButton;
    match button {
        rdev::Button::Left => Some(MouseButton::Left),
        rdev::Button::Right => Some(MouseButton::Right),
        rdev::Button::Middle => Some(MouseButton::Middle),
        rdev::Button::Unknown(code) => {
            debug!("Ignoring unknown mouse button {code}");
            None
        }
    }
}

/// Printable keys become characters via the event's unicode name; the rest
/// map to stable lowercase names.
fn map_key(key: rdev::Key, event: &rdev::Event) -> KeyPress {
    if let Some(name) = &event.name {
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if !c.is_control() {
                return KeyPress::Char(c);
            }
        }
    }
    KeyPress::Named(key_name(key))
}

fn key_name(key: rdev::Key) -> String {
    use rdev::Key;
    match key {
        Key::Return => "enter".to_string(),
        Key::Tab => "tab".to_string(),
        Key::Escape => "escape".to_string(),
        Key::Backspace => "backspace".to_string(),
        Key::Delete => "delete".to_string(),
        Key::Space => "space".to_string(),
        Key::UpArrow => "up".to_string(),
        Key::DownArrow => "down".to_string(),
        Key::LeftArrow => "left".to_string(),
        Key::RightArrow => "right".to_string(),
        Key::Home => "home".to_string(),
        Key::End => "end".to_string(),
        Key::PageUp => "page_up".to_string(),
        Key::PageDown => "page_down".to_string(),
        Key::ShiftLeft | Key::ShiftRight => "shift".to_string(),
        Key::ControlLeft | Key::ControlRight => "ctrl".to_string(),
        Key::Alt | Key::AltGr => "alt".to_string(),
        Key::MetaLeft | Key::MetaRight => "cmd".to_string(),
        Key::CapsLock => "caps_lock".to_string(),
        Key::F1 => "f1".to_string(),
        Key::F2 => "f2".to_string(),
        Key::F3 => "f3".to_string(),
        Key::F4 => "f4".to_string(),
        Key::F5 => "f5".to_string(),
        Key::F6 => "f6".to_string(),
        Key::F7 => "f7".to_string(),
        Key::F8 => "f8".to_string(),
        Key::F9 => "f9".to_string(),
        Key::F10 => "f10".to_string(),
        Key::F11 => "f11".to_string(),
        Key::F12 => "f12".to_string(),
        other => format!("{other:?}").to_lowercase(),
    }
}
