//! Point-to-element resolution.
//!
//! `resolve_at_point` runs an ordered cascade of strategies, each with the
//! uniform signature `(&ResolveContext) -> Option<Element>`, and returns the
//! first success. The order is a plain list so individual tiers can be
//! tested and replaced without touching the control flow. A miss at every
//! tier is `None`, never an error: internal failures degrade to the next
//! strategy.

mod descent;
mod region;
mod shell;
mod snapshot;

pub use descent::WindowDescentStrategy;
pub use region::RegionSnapshotStrategy;
pub use shell::ShellContainerStrategy;
pub use snapshot::resolve_in_snapshot;

use crate::element::Element;
use crate::geometry::Point;
use crate::process::ProcessIndex;
use crate::provider::{AccessibilityProvider, WindowInfo};
use std::sync::Arc;
use tracing::debug;

/// Per-query inputs handed to every strategy.
///
/// The window-identity lookup runs once, up front; strategies share its
/// result instead of re-querying the platform.
pub struct ResolveContext<'a> {
    pub point: Point,
    pub window: Option<&'a WindowInfo>,
    pub provider: &'a dyn AccessibilityProvider,
    pub processes: &'a dyn ProcessIndex,
}

/// One tier of the resolution cascade.
pub trait ResolveStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Some` claims the query; `None` passes it to the next tier.
    fn resolve(&self, ctx: &ResolveContext<'_>) -> Option<Element>;
}

/// The resolution cascade over a platform provider and process index.
pub struct ElementResolver {
    provider: Arc<dyn AccessibilityProvider>,
    processes: Arc<dyn ProcessIndex>,
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl ElementResolver {
    /// Resolver with the standard strategy order: shell containers,
    /// accessibility-tree descent, region-snapshot fallback.
    pub fn new(provider: Arc<dyn AccessibilityProvider>, processes: Arc<dyn ProcessIndex>) -> Self {
        Self::with_strategies(
            provider,
            processes,
            vec![
                Box::new(ShellContainerStrategy::new()),
                Box::new(WindowDescentStrategy),
                Box::new(RegionSnapshotStrategy::default()),
            ],
        )
    }

    pub fn with_strategies(
        provider: Arc<dyn AccessibilityProvider>,
        processes: Arc<dyn ProcessIndex>,
        strategies: Vec<Box<dyn ResolveStrategy>>,
    ) -> Self {
        Self {
            provider,
            processes,
            strategies,
        }
    }

    /// Resolve the most specific element at a screen point.
    ///
    /// Never errors for a valid coordinate; `None` means every tier missed.
    pub fn resolve_at_point(&self, point: Point) -> Option<Element> {
        let window = match self.provider.window_at(point) {
            Ok(window) => window,
            Err(e) => {
                debug!("Window lookup failed at ({}, {}): {e}", point.x, point.y);
                None
            }
        };

        if let Some(info) = &window {
            debug!(
                "Window at ({}, {}): '{}' class='{}'",
                point.x, point.y, info.title, info.class_name
            );
        }

        let ctx = ResolveContext {
            point,
            window: window.as_ref(),
            provider: self.provider.as_ref(),
            processes: self.processes.as_ref(),
        };

        for strategy in &self.strategies {
            if let Some(element) = strategy.resolve(&ctx) {
                debug!(
                    strategy = strategy.name(),
                    "Resolved {} at ({}, {})",
                    element.label(),
                    point.x,
                    point.y
                );
                return Some(element);
            }
        }

        debug!("No element at ({}, {})", point.x, point.y);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ControlType, DetectionMethod, Element, ElementNode};
    use crate::errors::AutomationError;
    use crate::geometry::Rect;
    use crate::provider::WindowHandle;
    use std::collections::HashMap;

    pub(crate) struct MockProcessIndex {
        pub names: HashMap<u32, String>,
        pub running: Vec<String>,
    }

    impl MockProcessIndex {
        pub fn empty() -> Self {
            Self {
                names: HashMap::new(),
                running: Vec::new(),
            }
        }
    }

    impl ProcessIndex for MockProcessIndex {
        fn name_of(&self, pid: u32) -> Option<String> {
            self.names.get(&pid).cloned()
        }

        fn running_names(&self) -> Vec<String> {
            self.running.clone()
        }
    }

    #[derive(Default)]
    pub(crate) struct MockProvider {
        pub windows: Vec<WindowInfo>,
        pub children: HashMap<WindowHandle, Vec<WindowInfo>>,
        pub processes: HashMap<WindowHandle, u32>,
        pub subtrees: HashMap<WindowHandle, ElementNode>,
        pub snapshot: Vec<ElementNode>,
        pub fail_window_at: bool,
    }

    impl AccessibilityProvider for MockProvider {
        fn window_at(&self, point: Point) -> Result<Option<WindowInfo>, AutomationError> {
            if self.fail_window_at {
                return Err(AutomationError::PlatformError("window_at down".into()));
            }
            Ok(self
                .windows
                .iter()
                .find(|w| w.bounds.contains(point))
                .cloned())
        }

        fn child_windows(
            &self,
            handle: WindowHandle,
        ) -> Result<Vec<WindowInfo>, AutomationError> {
            Ok(self.children.get(&handle).cloned().unwrap_or_default())
        }

        fn process_of(&self, handle: WindowHandle) -> Result<Option<u32>, AutomationError> {
            Ok(self.processes.get(&handle).copied())
        }

        fn window_subtree(
            &self,
            handle: WindowHandle,
        ) -> Result<Option<ElementNode>, AutomationError> {
            Ok(self.subtrees.get(&handle).cloned())
        }

        fn hierarchy_snapshot(
            &self,
            _region: Rect,
            _max_depth: usize,
            _min_size: u32,
        ) -> Result<Vec<ElementNode>, AutomationError> {
            Ok(self.snapshot.clone())
        }

        fn screen_size(&self) -> (u32, u32) {
            (1920, 1080)
        }

        fn cursor_position(&self) -> Point {
            Point::new(0, 0)
        }
    }

    fn window(handle: WindowHandle, class: &str, title: &str, bounds: Rect) -> WindowInfo {
        WindowInfo {
            handle,
            class_name: class.to_string(),
            title: title.to_string(),
            bounds,
        }
    }

    fn resolver(provider: MockProvider, processes: MockProcessIndex) -> ElementResolver {
        ElementResolver::new(Arc::new(provider), Arc::new(processes))
    }

    fn app_window_with_button() -> MockProvider {
        let win_bounds = Rect::new(0, 0, 800, 600);
        let mut provider = MockProvider {
            windows: vec![window(1, "Chrome_WidgetWin_1", "Editor", win_bounds)],
            ..Default::default()
        };
        let tree = ElementNode::with_children(
            Element::new(ControlType::Window, "Editor", win_bounds),
            vec![ElementNode::with_children(
                Element::new(ControlType::Pane, "Toolbar", Rect::new(0, 0, 800, 60)),
                vec![
                    ElementNode::new(Element::new(
                        ControlType::Button,
                        "Save",
                        Rect::new(10, 10, 60, 50),
                    )),
                    ElementNode::new(Element::new(
                        ControlType::Button,
                        "Open",
                        Rect::new(70, 10, 120, 50),
                    )),
                ],
            )],
        );
        provider.subtrees.insert(1, tree);
        provider
    }

    #[test]
    fn test_containment_returns_the_right_button() {
        let resolver = resolver(app_window_with_button(), MockProcessIndex::empty());

        let element = resolver.resolve_at_point(Point::new(30, 30)).unwrap();
        assert_eq!(element.control_type, ControlType::Button);
        assert_eq!(element.text, "Save");
        assert_eq!(element.detection_method, DetectionMethod::WindowDescent);
        assert!(element.is_exact_hit());

        let sibling = resolver.resolve_at_point(Point::new(100, 30)).unwrap();
        assert_eq!(sibling.text, "Open");
    }

    #[test]
    fn test_descent_attaches_context_hierarchy() {
        let resolver = resolver(app_window_with_button(), MockProcessIndex::empty());
        let element = resolver.resolve_at_point(Point::new(30, 30)).unwrap();

        let labels: Vec<String> = element
            .context_hierarchy
            .iter()
            .map(|e| e.label())
            .collect();
        assert_eq!(
            labels,
            vec!["Window: Editor", "Pane: Toolbar", "Button: Save"]
        );
        assert_eq!(element.context_hierarchy[0].depth, 0);
        assert_eq!(element.context_hierarchy[2].depth, 2);
    }

    #[test]
    fn test_interactive_preferred_over_deeper_container() {
        let win_bounds = Rect::new(0, 0, 400, 400);
        let mut provider = MockProvider {
            windows: vec![window(1, "AppWindow", "App", win_bounds)],
            ..Default::default()
        };
        // A pane nested deeper than the button, both containing the point.
        let tree = ElementNode::with_children(
            Element::new(ControlType::Window, "App", win_bounds),
            vec![
                ElementNode::new(Element::new(
                    ControlType::Button,
                    "Toggle",
                    Rect::new(50, 50, 150, 150),
                )),
                ElementNode::with_children(
                    Element::new(ControlType::Pane, "", Rect::new(0, 0, 400, 400)),
                    vec![ElementNode::new(Element::new(
                        ControlType::Group,
                        "",
                        Rect::new(40, 40, 160, 160),
                    ))],
                ),
            ],
        );
        provider.subtrees.insert(1, tree);

        let resolver = resolver(provider, MockProcessIndex::empty());
        let element = resolver.resolve_at_point(Point::new(100, 100)).unwrap();
        assert_eq!(element.control_type, ControlType::Button);
        assert_eq!(element.text, "Toggle");
    }

    #[test]
    fn test_window_identity_when_subtree_is_missing() {
        let provider = MockProvider {
            windows: vec![window(7, "SomeApp", "Opaque", Rect::new(0, 0, 300, 300))],
            ..Default::default()
        };
        let resolver = resolver(provider, MockProcessIndex::empty());

        let element = resolver.resolve_at_point(Point::new(50, 50)).unwrap();
        assert_eq!(element.control_type, ControlType::Window);
        assert_eq!(element.detection_method, DetectionMethod::WindowIdentity);
        assert_eq!(element.text, "Opaque");
    }

    #[test]
    fn test_region_snapshot_when_no_window_owns_the_point() {
        let provider = MockProvider {
            snapshot: vec![ElementNode::new(Element::new(
                ControlType::Button,
                "Floating",
                Rect::new(490, 290, 520, 320),
            ))],
            ..Default::default()
        };
        let resolver = resolver(provider, MockProcessIndex::empty());

        let element = resolver.resolve_at_point(Point::new(500, 300)).unwrap();
        assert_eq!(element.text, "Floating");
        assert_eq!(element.detection_method, DetectionMethod::RegionSnapshot);
        assert!(element.is_exact_hit());
    }

    #[test]
    fn test_all_strategies_missing_yields_none_not_error() {
        let resolver = resolver(MockProvider::default(), MockProcessIndex::empty());
        assert!(resolver.resolve_at_point(Point::new(10, 10)).is_none());

        let failing = MockProvider {
            fail_window_at: true,
            ..Default::default()
        };
        let resolver = resolver_from(failing);
        assert!(resolver.resolve_at_point(Point::new(10, 10)).is_none());
    }

    fn resolver_from(provider: MockProvider) -> ElementResolver {
        resolver(provider, MockProcessIndex::empty())
    }

    #[test]
    fn test_resolution_is_idempotent_on_static_tree() {
        let resolver = resolver(app_window_with_button(), MockProcessIndex::empty());
        let first = resolver.resolve_at_point(Point::new(30, 30)).unwrap();
        let second = resolver.resolve_at_point(Point::new(30, 30)).unwrap();
        assert_eq!(first.control_type, second.control_type);
        assert_eq!(first.text, second.text);
        assert_eq!(first.bounds, second.bounds);
    }

    #[test]
    fn test_taskbar_child_enumeration_tier() {
        let bar = Rect::new(0, 1040, 1920, 1080);
        let mut provider = MockProvider {
            windows: vec![window(100, "Shell_TrayWnd", "", bar)],
            ..Default::default()
        };
        provider.children.insert(
            100,
            vec![window(
                101,
                "MSTaskListWClass",
                "Running applications",
                Rect::new(600, 1040, 1400, 1080),
            )],
        );
        provider.children.insert(
            101,
            vec![window(
                102,
                "TaskListThumbnailWnd",
                "Firefox",
                Rect::new(700, 1040, 760, 1080),
            )],
        );

        let resolver = resolver(provider, MockProcessIndex::empty());
        let element = resolver.resolve_at_point(Point::new(730, 1060)).unwrap();
        assert_eq!(element.control_type, ControlType::Button);
        assert_eq!(element.text, "Firefox");
        assert_eq!(
            element.detection_method,
            DetectionMethod::ShellChildEnumeration
        );
    }

    #[test]
    fn test_taskbar_process_identity_tier() {
        let bar = Rect::new(0, 1040, 1920, 1080);
        let mut provider = MockProvider {
            windows: vec![window(100, "MSTaskSwWClass", "", bar)],
            ..Default::default()
        };
        provider.processes.insert(100, 4242);

        let processes = MockProcessIndex {
            names: HashMap::from([(4242, "firefox.exe".to_string())]),
            running: Vec::new(),
        };

        let resolver = resolver(provider, processes);
        let element = resolver.resolve_at_point(Point::new(700, 1060)).unwrap();
        assert_eq!(element.text, "Firefox");
        assert_eq!(element.detection_method, DetectionMethod::ProcessIdentity);
    }

    #[test]
    fn test_taskbar_coordinate_heuristic_tier() {
        let bar = Rect::new(0, 1040, 1920, 1080);
        let provider = MockProvider {
            windows: vec![window(100, "Shell_TrayWnd", "", bar)],
            ..Default::default()
        };
        let resolver = resolver(provider, MockProcessIndex::empty());

        // Inside the start-button zone.
        let element = resolver.resolve_at_point(Point::new(30, 1060)).unwrap();
        assert_eq!(element.text, "Start Button");
        assert_eq!(
            element.detection_method,
            DetectionMethod::CoordinateHeuristic
        );

        // Far right lands in the tray zone.
        let tray = resolver.resolve_at_point(Point::new(1850, 1060)).unwrap();
        assert_eq!(tray.text, "System Tray");
    }

    #[test]
    fn test_taskbar_app_slot_guess_uses_running_processes() {
        let bar = Rect::new(0, 1040, 1920, 1080);
        let provider = MockProvider {
            windows: vec![window(100, "Shell_TrayWnd", "", bar)],
            ..Default::default()
        };
        let processes = MockProcessIndex {
            names: HashMap::new(),
            running: vec!["chrome.exe".to_string(), "firefox.exe".to_string()],
        };
        let resolver = resolver(provider, processes);

        // App area starts at 420; first half of it maps to the first
        // known app in sorted order (chrome).
        let element = resolver.resolve_at_point(Point::new(500, 1060)).unwrap();
        assert_eq!(element.text, "Chrome");
        assert_eq!(
            element.detection_method,
            DetectionMethod::CoordinateHeuristic
        );
    }
}
