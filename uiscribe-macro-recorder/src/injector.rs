//! Synthesized input for playback.

use crate::error::{MacroError, Result};
use crate::events::MouseButton;
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use std::thread;
use std::time::Duration;

/// Delivers recorded events back into the desktop.
pub trait InputInjector: Send {
    fn click(&mut self, x: i32, y: i32, button: MouseButton) -> Result<()>;
    fn scroll(&mut self, x: i32, y: i32, dx: i32, dy: i32) -> Result<()>;
    fn type_text(&mut self, text: &str) -> Result<()>;
    fn press_key(&mut self, key: &str) -> Result<()>;
}

/// `enigo`-backed injector.
pub struct EnigoInjector {
    enigo: Enigo,
}

impl EnigoInjector {
    pub fn new() -> Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| MacroError::DispatchError(format!("Failed to initialize input: {e:?}")))?;
        Ok(Self { enigo })
    }
}

impl InputInjector for EnigoInjector {
    fn click(&mut self, x: i32, y: i32, button: MouseButton) -> Result<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| MacroError::DispatchError(format!("Failed to move mouse: {e:?}")))?;
        // Give the window manager a beat to register the hover target.
        thread::sleep(Duration::from_millis(20));
        self.enigo
            .button(map_button(button), Direction::Click)
            .map_err(|e| MacroError::DispatchError(format!("Failed to click: {e:?}")))
    }

    fn scroll(&mut self, x: i32, y: i32, dx: i32, dy: i32) -> Result<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| MacroError::DispatchError(format!("Failed to move mouse: {e:?}")))?;
        if dx != 0 {
            self.enigo
                .scroll(dx, Axis::Horizontal)
                .map_err(|e| MacroError::DispatchError(format!("Failed to scroll: {e:?}")))?;
        }
        if dy != 0 {
            self.enigo
                .scroll(dy, Axis::Vertical)
                .map_err(|e| MacroError::DispatchError(format!("Failed to scroll: {e:?}")))?;
        }
        Ok(())
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        self.enigo
            .text(text)
            .map_err(|e| MacroError::DispatchError(format!("Failed to type text: {e:?}")))
    }

    fn press_key(&mut self, key: &str) -> Result<()> {
        let key = map_key(key)?;
        self.enigo
            .key(key, Direction::Click)
            .map_err(|e| MacroError::DispatchError(format!("Failed to press key: {e:?}")))
    }
}

fn map_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

fn map_key(name: &str) -> Result<Key> {
    let key = match name {
        "enter" => Key::Return,
        "tab" => Key::Tab,
        "escape" => Key::Escape,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" => Key::Delete,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "page_up" => Key::PageUp,
        "page_down" => Key::PageDown,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => {
                    return Err(MacroError::DispatchError(format!(
                        "Unknown key name: {other}"
                    )))
                }
            }
        }
    };
    Ok(key)
}
