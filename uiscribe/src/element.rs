//! The element model: a read-only projection of live accessibility state.
//!
//! Elements are constructed fresh on every resolution call and never cached
//! across calls; the accessibility tree mutates continuously underneath us.

use crate::geometry::{Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Control-type vocabulary exposed by the accessibility tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ControlType {
    Button,
    Text,
    Edit,
    CheckBox,
    RadioButton,
    ComboBox,
    List,
    ListItem,
    Menu,
    MenuItem,
    Tree,
    TreeItem,
    ToolBar,
    Tab,
    TabItem,
    Window,
    Dialog,
    Pane,
    Group,
    Document,
    StatusBar,
    Image,
    Hyperlink,
    Unknown,
}

impl ControlType {
    /// Control types a user actually interacts with, as opposed to
    /// structural containers. Used to disambiguate nested hits.
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            ControlType::Button
                | ControlType::MenuItem
                | ControlType::ListItem
                | ControlType::Hyperlink
                | ControlType::Edit
                | ControlType::CheckBox
        )
    }

    /// Generic containers that should lose to interactive descendants.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ControlType::Window
                | ControlType::Pane
                | ControlType::Document
                | ControlType::Group
                | ControlType::Dialog
        )
    }
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Which resolution tier produced an element.
///
/// Every strategy tags its results so downstream consumers (and tests) can
/// tell exact hits from heuristics and assert which fallback tier fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Bare window lookup; no accessibility subtree was available.
    WindowIdentity,
    /// Native child-window enumeration inside a shell container.
    ShellChildEnumeration,
    /// Window-to-process correlation against known applications.
    ProcessIdentity,
    /// Coordinate-zone guessing inside a shell container. Low confidence.
    CoordinateHeuristic,
    /// Depth-first descent of a window's accessibility subtree.
    WindowDescent,
    /// Smallest/closest element in a captured hierarchy snapshot.
    RegionSnapshot,
}

impl Default for DetectionMethod {
    fn default() -> Self {
        DetectionMethod::RegionSnapshot
    }
}

/// A UI element observed at resolution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub control_type: ControlType,
    pub text: String,
    pub bounds: Rect,

    /// Distance from the search root; deeper elements are more specific.
    #[serde(default)]
    pub depth: usize,

    /// 0.0 for containment hits; positive when the element is merely the
    /// closest candidate to the query point.
    #[serde(default)]
    pub distance: f64,

    #[serde(default)]
    pub detection_method: DetectionMethod,

    /// Free-form platform properties: class name, automation id, handle…
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,

    /// Containing ancestors from the search root down to this element.
    /// Populated only by the window-descent strategy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_hierarchy: Vec<Element>,
}

impl Element {
    pub fn new(control_type: ControlType, text: impl Into<String>, bounds: Rect) -> Self {
        Self {
            control_type,
            text: text.into(),
            bounds,
            depth: 0,
            distance: 0.0,
            detection_method: DetectionMethod::default(),
            properties: BTreeMap::new(),
            context_hierarchy: Vec::new(),
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_method(mut self, method: DetectionMethod) -> Self {
        self.detection_method = method;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Whether the query point was actually inside this element's bounds.
    pub fn is_exact_hit(&self) -> bool {
        self.distance == 0.0
    }

    pub fn contains(&self, p: Point) -> bool {
        self.bounds.contains(p)
    }

    /// `"Button: Save"` / `"Pane"` style label for captions and logs.
    pub fn label(&self) -> String {
        if self.text.is_empty() {
            self.control_type.to_string()
        } else {
            format!("{}: {}", self.control_type, self.text)
        }
    }
}

/// One node of a captured hierarchy snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub element: Element,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementNode>,
}

impl ElementNode {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            children: Vec::new(),
        }
    }

    pub fn with_children(element: Element, children: Vec<ElementNode>) -> Self {
        Self { element, children }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interactive_vs_container_classification() {
        assert!(ControlType::Button.is_interactive());
        assert!(ControlType::Edit.is_interactive());
        assert!(ControlType::Hyperlink.is_interactive());
        assert!(!ControlType::Pane.is_interactive());
        assert!(ControlType::Pane.is_container());
        assert!(ControlType::Window.is_container());
        assert!(!ControlType::Button.is_container());
    }

    #[test]
    fn test_element_label() {
        let e = Element::new(
            ControlType::Button,
            "Save",
            Rect::new(0, 0, 10, 10),
        );
        assert_eq!(e.label(), "Button: Save");

        let anon = Element::new(ControlType::Pane, "", Rect::new(0, 0, 10, 10));
        assert_eq!(anon.label(), "Pane");
    }

    #[test]
    fn test_element_serialization_skips_empty_fields() {
        let e = Element::new(ControlType::Button, "OK", Rect::new(1, 2, 3, 4));
        let json = serde_json::to_string(&e).unwrap();
        assert!(!json.contains("properties"));
        assert!(!json.contains("context_hierarchy"));
        assert!(json.contains("\"Button\""));

        let back: Element = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn test_detection_method_snake_case() {
        let json = serde_json::to_string(&DetectionMethod::ShellChildEnumeration).unwrap();
        assert_eq!(json, "\"shell_child_enumeration\"");
    }
}
