//! The macro document model.
//!
//! A [`Macro`] is an ordered sequence of immutable [`MacroEvent`]s plus
//! aggregate metadata, frozen at recording stop and serialized to
//! `macro.json`. Event order is non-decreasing capture time and doubles as
//! replay order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uiscribe::{Element, Point};

pub const MACRO_FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroEventType {
    MouseClick,
    MouseScroll,
    KeyboardType,
    KeyboardKey,
    /// Initial/final state marker; carries a screenshot, replays as a no-op.
    Screenshot,
    Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    InitialState,
    FinalState,
}

/// Event-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventData {
    Click {
        x: i32,
        y: i32,
        button: MouseButton,
        screen_size: (u32, u32),
    },
    Scroll {
        x: i32,
        y: i32,
        scroll_dx: i32,
        scroll_dy: i32,
    },
    Text {
        text: String,
        cursor_position: Point,
    },
    Key {
        key: String,
    },
    Marker {
        action: MarkerKind,
        cursor_position: Point,
    },
    Wait {
        duration: f64,
    },
}

impl EventData {
    pub fn event_type(&self) -> MacroEventType {
        match self {
            EventData::Click { .. } => MacroEventType::MouseClick,
            EventData::Scroll { .. } => MacroEventType::MouseScroll,
            EventData::Text { .. } => MacroEventType::KeyboardType,
            EventData::Key { .. } => MacroEventType::KeyboardKey,
            EventData::Marker { .. } => MacroEventType::Screenshot,
            EventData::Wait { .. } => MacroEventType::Wait,
        }
    }
}

/// One captured user action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroEvent {
    pub event_type: MacroEventType,

    /// Capture time in seconds (fractional) since the Unix epoch.
    pub timestamp: f64,

    pub data: EventData,

    /// Resolved element under the action, when UI-context capture was on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_context: Option<Element>,

    /// Package-relative path of the annotated evidence image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
}

impl MacroEvent {
    pub fn new(timestamp: f64, data: EventData) -> Self {
        Self {
            event_type: data.event_type(),
            timestamp,
            data,
            ui_context: None,
            screenshot_path: None,
        }
    }

    pub fn with_ui_context(mut self, element: Option<Element>) -> Self {
        self.ui_context = element;
        self
    }

    pub fn with_screenshot(mut self, path: Option<String>) -> Self {
        self.screenshot_path = path;
        self
    }

    pub fn is_marker(&self) -> bool {
        self.event_type == MacroEventType::Screenshot
    }
}

/// Aggregate facts about a finished recording.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroMetadata {
    pub total_events: usize,

    /// Wall-clock span from first to last event, seconds.
    pub duration: f64,

    pub event_counts: BTreeMap<MacroEventType, usize>,

    /// Distinct control types seen across resolved elements.
    pub element_types: Vec<String>,

    pub ui_elements_detected: usize,

    /// Echo of the recording configuration, for provenance.
    pub recording_settings: serde_json::Value,
}

/// A named, replayable recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Macro {
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub version: String,
    pub events: Vec<MacroEvent>,
    #[serde(default)]
    pub metadata: MacroMetadata,
}

impl Macro {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            created_at: chrono::Local::now().to_rfc3339(),
            version: MACRO_FORMAT_VERSION.to_string(),
            events: Vec::new(),
            metadata: MacroMetadata::default(),
        }
    }

    pub fn push(&mut self, event: MacroEvent) {
        self.events.push(event);
    }

    /// Recompute aggregate metadata from the event list.
    pub fn finalize(&mut self, recording_settings: serde_json::Value) {
        let mut counts: BTreeMap<MacroEventType, usize> = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.event_type).or_default() += 1;
        }

        let mut element_types: Vec<String> = self
            .events
            .iter()
            .filter_map(|e| e.ui_context.as_ref())
            .map(|el| el.control_type.to_string())
            .collect();
        element_types.sort_unstable();
        element_types.dedup();

        self.metadata = MacroMetadata {
            total_events: self.events.len(),
            duration: match (self.events.first(), self.events.last()) {
                (Some(first), Some(last)) => (last.timestamp - first.timestamp).max(0.0),
                _ => 0.0,
            },
            event_counts: counts,
            ui_elements_detected: self
                .events
                .iter()
                .filter(|e| e.ui_context.is_some())
                .count(),
            element_types,
            recording_settings,
        };
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Events that replay as real input (markers and waits excluded).
    pub fn action_events(&self) -> impl Iterator<Item = &MacroEvent> {
        self.events.iter().filter(|e| !e.is_marker())
    }
}
