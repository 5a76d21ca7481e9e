//! The platform accessibility capability consumed by the resolver.
//!
//! The OS bindings themselves live outside this crate; embedders inject an
//! implementation. [`NullProvider`] is the no-accessibility fallback: the
//! resolver degrades to coordinate-only behavior with it.

use crate::element::ElementNode;
use crate::errors::AutomationError;
use crate::geometry::{Point, Rect};

/// Opaque native window identifier.
pub type WindowHandle = u64;

/// What the platform reports about a top-level or child window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub class_name: String,
    pub title: String,
    pub bounds: Rect,
}

/// Read-only access to the platform's window and accessibility state.
///
/// All queries observe live, mutable state; results are snapshots valid at
/// call time only.
pub trait AccessibilityProvider: Send + Sync {
    /// The window owning the given screen point, if any.
    fn window_at(&self, point: Point) -> Result<Option<WindowInfo>, AutomationError>;

    /// Direct native children of a window (not the accessibility tree).
    fn child_windows(&self, handle: WindowHandle) -> Result<Vec<WindowInfo>, AutomationError>;

    /// The process owning a window.
    fn process_of(&self, handle: WindowHandle) -> Result<Option<u32>, AutomationError>;

    /// The accessibility subtree rooted at a window, if exposed.
    fn window_subtree(&self, handle: WindowHandle) -> Result<Option<ElementNode>, AutomationError>;

    /// A bounded snapshot of the element hierarchy inside `region`.
    fn hierarchy_snapshot(
        &self,
        region: Rect,
        max_depth: usize,
        min_size: u32,
    ) -> Result<Vec<ElementNode>, AutomationError>;

    /// Primary screen dimensions.
    fn screen_size(&self) -> (u32, u32);

    /// Current pointer position.
    fn cursor_position(&self) -> Point;
}

/// Provider for environments without accessibility bindings.
///
/// Every query reports an empty result; the resolver's coordinate-based
/// tiers still function.
#[derive(Debug, Default)]
pub struct NullProvider {
    screen: (u32, u32),
}

impl NullProvider {
    pub fn new() -> Self {
        Self {
            screen: (1920, 1080),
        }
    }

    pub fn with_screen_size(width: u32, height: u32) -> Self {
        Self {
            screen: (width, height),
        }
    }
}

impl AccessibilityProvider for NullProvider {
    fn window_at(&self, _point: Point) -> Result<Option<WindowInfo>, AutomationError> {
        Ok(None)
    }

    fn child_windows(&self, _handle: WindowHandle) -> Result<Vec<WindowInfo>, AutomationError> {
        Ok(Vec::new())
    }

    fn process_of(&self, _handle: WindowHandle) -> Result<Option<u32>, AutomationError> {
        Ok(None)
    }

    fn window_subtree(
        &self,
        _handle: WindowHandle,
    ) -> Result<Option<ElementNode>, AutomationError> {
        Ok(None)
    }

    fn hierarchy_snapshot(
        &self,
        _region: Rect,
        _max_depth: usize,
        _min_size: u32,
    ) -> Result<Vec<ElementNode>, AutomationError> {
        Ok(Vec::new())
    }

    fn screen_size(&self) -> (u32, u32) {
        self.screen
    }

    fn cursor_position(&self) -> Point {
        Point::new(0, 0)
    }
}
