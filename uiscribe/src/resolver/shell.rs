//! Specialized resolution inside desktop-shell containers.
//!
//! Shell surfaces like the taskbar expose little or nothing through the
//! accessibility tree, so this strategy works from native window
//! enumeration and process identity instead, falling back to coordinate
//! zones as a last resort. The class-to-resolver mapping is a table so new
//! shell surfaces can be added without touching the generic cascade.

use super::{ResolveContext, ResolveStrategy};
use crate::element::{ControlType, DetectionMethod, Element};
use crate::geometry::{Point, Rect};
use crate::provider::WindowInfo;
use tracing::debug;

/// Window classes of the taskbar and its descendants.
const TASKBAR_CLASSES: &[&str] = &[
    "Shell_TrayWnd",
    "MSTaskSwWClass",
    "MSTaskListWClass",
    "ReBarWindow32",
    "TrayNotifyWnd",
];

/// Titles that describe the container rather than a concrete button.
const PLACEHOLDER_TITLES: &[&str] = &["Running applications", "DesktopWindowXamlSource"];

/// Applications that commonly appear as taskbar buttons, keyed by a
/// process-name fragment.
const KNOWN_APPS: &[(&str, &str)] = &[
    ("firefox", "Firefox"),
    ("chrome", "Chrome"),
    ("msedge", "Microsoft Edge"),
    ("notepad", "Notepad"),
    ("explorer", "File Explorer"),
    ("code", "Visual Studio Code"),
    ("outlook", "Outlook"),
    ("teams", "Microsoft Teams"),
    ("winword", "Word"),
    ("excel", "Excel"),
    ("powerpnt", "PowerPoint"),
];

/// Approximate Windows 11 taskbar geometry, from the container's left edge.
const START_BUTTON_WIDTH: i32 = 60;
const SEARCH_AREA_WIDTH: i32 = 300;
const TASK_VIEW_WIDTH: i32 = 60;
const TRAY_WIDTH: i32 = 200;

fn known_app_display(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    KNOWN_APPS
        .iter()
        .find(|(fragment, _)| lower.contains(fragment))
        .map(|(_, display)| *display)
}

type ShellResolveFn = fn(&ResolveContext<'_>, &WindowInfo) -> Option<Element>;

/// Strategy table keyed by recognized shell container classes.
pub struct ShellContainerStrategy {
    table: Vec<(&'static [&'static str], ShellResolveFn)>,
}

impl ShellContainerStrategy {
    pub fn new() -> Self {
        Self {
            table: vec![(TASKBAR_CLASSES, resolve_taskbar as ShellResolveFn)],
        }
    }
}

impl Default for ShellContainerStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolveStrategy for ShellContainerStrategy {
    fn name(&self) -> &'static str {
        "shell_container"
    }

    fn resolve(&self, ctx: &ResolveContext<'_>) -> Option<Element> {
        let window = ctx.window?;
        let resolver = self
            .table
            .iter()
            .find(|(classes, _)| classes.contains(&window.class_name.as_str()))
            .map(|(_, resolver)| *resolver)?;
        resolver(ctx, window)
    }
}

/// The taskbar sub-cascade: native child enumeration, then process
/// identity, then coordinate zones. The last tier always answers, so a
/// recognized taskbar click never falls through to generic tree search.
fn resolve_taskbar(ctx: &ResolveContext<'_>, window: &WindowInfo) -> Option<Element> {
    resolve_from_children(ctx, window)
        .or_else(|| resolve_from_process(ctx, window))
        .or_else(|| Some(resolve_from_zones(ctx, window)))
}

struct ButtonCandidate {
    info: WindowInfo,
    depth: usize,
    known_app: bool,
    distance: f64,
}

fn collect_candidates(
    ctx: &ResolveContext<'_>,
    handle: u64,
    depth: usize,
    out: &mut Vec<ButtonCandidate>,
) {
    if depth > 3 {
        return;
    }
    let children = match ctx.provider.child_windows(handle) {
        Ok(children) => children,
        Err(e) => {
            debug!("Child enumeration failed at depth {depth}: {e}");
            return;
        }
    };
    for child in children {
        if !child.bounds.contains(ctx.point) {
            continue;
        }
        out.push(ButtonCandidate {
            known_app: known_app_display(&child.title).is_some()
                || known_app_display(&child.class_name).is_some(),
            distance: child.bounds.center_distance(ctx.point),
            depth,
            info: child.clone(),
        });
        collect_candidates(ctx, child.handle, depth + 1, out);
    }
}

fn resolve_from_children(ctx: &ResolveContext<'_>, window: &WindowInfo) -> Option<Element> {
    let mut candidates = Vec::new();
    collect_candidates(ctx, window.handle, 1, &mut candidates);
    if candidates.is_empty() {
        return None;
    }

    // Known-application buttons first, then the deepest (most specific)
    // window, then the one whose center is nearest the click.
    candidates.sort_by(|a, b| {
        b.known_app
            .cmp(&a.known_app)
            .then(b.depth.cmp(&a.depth))
            .then(a.distance.total_cmp(&b.distance))
    });
    let best = &candidates[0];

    let text = describe_button(ctx, window, &best.info);
    debug!(
        "Taskbar child at depth {}: '{}' class='{}'",
        best.depth, text, best.info.class_name
    );

    Some(
        Element::new(ControlType::Button, text, best.info.bounds)
            .with_depth(best.depth)
            .with_method(DetectionMethod::ShellChildEnumeration)
            .with_property("class_name", best.info.class_name.clone())
            .with_property("handle", best.info.handle.to_string())
            .with_property("parent_handle", window.handle.to_string()),
    )
}

/// Keep a meaningful title; replace container placeholders with the zone
/// heuristic's description.
fn describe_button(ctx: &ResolveContext<'_>, container: &WindowInfo, child: &WindowInfo) -> String {
    if let Some(display) = known_app_display(&child.title) {
        return display.to_string();
    }
    let title = child.title.trim();
    if !title.is_empty() && !PLACEHOLDER_TITLES.contains(&title) {
        return title.to_string();
    }
    zone_description(ctx, container.bounds)
}

fn resolve_from_process(ctx: &ResolveContext<'_>, window: &WindowInfo) -> Option<Element> {
    let pid = ctx.provider.process_of(window.handle).ok().flatten()?;
    let name = ctx.processes.name_of(pid)?;
    let display = known_app_display(&name)?;
    debug!("Taskbar window belongs to {name} (pid {pid})");

    Some(
        Element::new(ControlType::Button, display, window.bounds)
            .with_method(DetectionMethod::ProcessIdentity)
            .with_property("class_name", window.class_name.clone())
            .with_property("process_id", pid.to_string())
            .with_property("process_name", name),
    )
}

fn resolve_from_zones(ctx: &ResolveContext<'_>, window: &WindowInfo) -> Element {
    let text = zone_description(ctx, window.bounds);
    Element::new(ControlType::Button, text, window.bounds)
        .with_method(DetectionMethod::CoordinateHeuristic)
        .with_property("class_name", window.class_name.clone())
        .with_property("handle", window.handle.to_string())
}

/// Position-proportional guess at what lives under a taskbar coordinate.
///
/// The app-button slot estimate correlates position against the sorted
/// running known applications; it is approximate by nature and callers
/// should treat it as a hint (the `coordinate_heuristic` tag marks it).
fn zone_description(ctx: &ResolveContext<'_>, bounds: Rect) -> String {
    let x = ctx.point.x;
    let start_end = bounds.left + START_BUTTON_WIDTH;
    let search_end = start_end + SEARCH_AREA_WIDTH;
    let task_view_end = search_end + TASK_VIEW_WIDTH;
    let tray_start = bounds.right - TRAY_WIDTH;

    if x <= start_end {
        return "Start Button".to_string();
    }
    if x <= search_end {
        return "Search Area".to_string();
    }
    if x <= task_view_end {
        return "Task View Button".to_string();
    }
    if x >= tray_start {
        return "System Tray".to_string();
    }

    app_slot_guess(ctx, Point::new(x, ctx.point.y), task_view_end, tray_start)
}

fn app_slot_guess(
    ctx: &ResolveContext<'_>,
    point: Point,
    app_start: i32,
    app_end: i32,
) -> String {
    let width = (app_end - app_start).max(1);
    let relative = (point.x - app_start) as f64 / width as f64;

    let mut apps: Vec<&'static str> = ctx
        .processes
        .running_names()
        .iter()
        .filter_map(|name| known_app_display(name))
        .collect();
    apps.sort_unstable();
    apps.dedup();

    if !apps.is_empty() {
        let index = ((relative * apps.len() as f64) as usize).min(apps.len() - 1);
        return apps[index].to_string();
    }

    if relative < 0.3 {
        "Left App Button".to_string()
    } else if relative < 0.7 {
        "Center App Button".to_string()
    } else {
        "Right App Button".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_app_display_matches_fragments() {
        assert_eq!(known_app_display("firefox.exe"), Some("Firefox"));
        assert_eq!(known_app_display("Mozilla Firefox"), Some("Firefox"));
        assert_eq!(known_app_display("MSEDGE.EXE"), Some("Microsoft Edge"));
        assert_eq!(known_app_display("svchost.exe"), None);
    }

    #[test]
    fn test_taskbar_classes_are_recognized() {
        let strategy = ShellContainerStrategy::new();
        for class in TASKBAR_CLASSES {
            assert!(
                strategy
                    .table
                    .iter()
                    .any(|(classes, _)| classes.contains(class)),
                "{class} missing from strategy table"
            );
        }
    }
}
