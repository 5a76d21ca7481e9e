//! Depth-first descent of a window's accessibility subtree.

use super::{ResolveContext, ResolveStrategy};
use crate::element::{ControlType, DetectionMethod, Element, ElementNode};
use crate::provider::WindowInfo;
use tracing::debug;

/// Generic resolution for ordinary application windows: walk the window's
/// accessibility subtree and pick the most specific element containing the
/// point.
pub struct WindowDescentStrategy;

impl ResolveStrategy for WindowDescentStrategy {
    fn name(&self) -> &'static str {
        "window_descent"
    }

    fn resolve(&self, ctx: &ResolveContext<'_>) -> Option<Element> {
        let window = ctx.window?;

        let subtree = match ctx.provider.window_subtree(window.handle) {
            Ok(Some(subtree)) => subtree,
            Ok(None) => return Some(window_element(window)),
            Err(e) => {
                debug!("Subtree query failed for '{}': {e}", window.title);
                return Some(window_element(window));
            }
        };

        let mut containing = Vec::new();
        collect_containing(&subtree, 0, ctx, &mut containing);
        if containing.is_empty() {
            // Window geometry says the point is ours even though the
            // accessibility tree disagrees; report the window itself.
            return Some(window_element(window));
        }

        let best = pick_best(&containing);
        let mut element = best.clone().with_method(DetectionMethod::WindowDescent);
        element.context_hierarchy = containing;
        Some(element)
    }
}

/// Element describing a bare window when no subtree is available.
fn window_element(window: &WindowInfo) -> Element {
    Element::new(ControlType::Window, window.title.clone(), window.bounds)
        .with_method(DetectionMethod::WindowIdentity)
        .with_property("class_name", window.class_name.clone())
        .with_property("handle", window.handle.to_string())
}

/// Collect every element whose bounds contain the point, parents before
/// children, so the result doubles as the context hierarchy.
fn collect_containing(
    node: &ElementNode,
    depth: usize,
    ctx: &ResolveContext<'_>,
    out: &mut Vec<Element>,
) {
    if !node.element.bounds.contains(ctx.point) {
        return;
    }
    out.push(node.element.clone().with_depth(depth));
    for child in &node.children {
        collect_containing(child, depth + 1, ctx, out);
    }
}

/// Disambiguate nested hits: interactive control types beat containers;
/// among candidates of the same class, greater depth wins; remaining ties
/// go to the smallest bounding area, keeping the first encountered.
fn pick_best(containing: &[Element]) -> &Element {
    let interactive: Vec<&Element> = containing
        .iter()
        .filter(|e| e.control_type.is_interactive())
        .collect();

    let pool: Vec<&Element> = if interactive.is_empty() {
        containing.iter().collect()
    } else {
        interactive
    };

    let mut best = pool[0];
    for candidate in &pool[1..] {
        let deeper = candidate.depth > best.depth;
        let same_depth_smaller =
            candidate.depth == best.depth && candidate.bounds.area() < best.bounds.area();
        if deeper || same_depth_smaller {
            best = candidate;
        }
    }
    best
}
