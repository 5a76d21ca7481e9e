//! Pure resolution over an already-captured hierarchy snapshot.

use crate::element::{Element, ElementNode};
use crate::geometry::Point;

/// Find the element for a point inside a captured hierarchy tree.
///
/// Among elements whose bounds contain the point, the smallest-area one
/// wins (the most specific in the hierarchy). When nothing contains the
/// point, the element whose center is closest wins and carries its
/// `distance` so callers can tell exact hits from best-effort guesses.
///
/// Deterministic: equal areas and equal distances keep the first element
/// encountered in tree order.
pub fn resolve_in_snapshot(nodes: &[ElementNode], point: Point) -> Option<Element> {
    let mut best_containing: Option<(i64, Element)> = None;
    let mut best_near: Option<(f64, Element)> = None;

    fn visit(
        node: &ElementNode,
        depth: usize,
        point: Point,
        best_containing: &mut Option<(i64, Element)>,
        best_near: &mut Option<(f64, Element)>,
    ) {
        let bounds = node.element.bounds;
        if bounds.contains(point) {
            let area = bounds.area();
            // Strict comparison keeps the first-encountered element on ties.
            if best_containing.as_ref().map_or(true, |(a, _)| area < *a) {
                let mut element = node.element.clone().with_depth(depth);
                element.distance = 0.0;
                *best_containing = Some((area, element));
            }
        } else {
            let distance = bounds.center_distance(point);
            if best_near.as_ref().map_or(true, |(d, _)| distance < *d) {
                let mut element = node.element.clone().with_depth(depth);
                element.distance = distance;
                *best_near = Some((distance, element));
            }
        }

        for child in &node.children {
            visit(child, depth + 1, point, best_containing, best_near);
        }
    }

    for node in nodes {
        visit(node, 0, point, &mut best_containing, &mut best_near);
    }

    best_containing
        .map(|(_, e)| e)
        .or(best_near.map(|(_, e)| e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ControlType;
    use crate::geometry::Rect;

    fn leaf(control_type: ControlType, text: &str, bounds: Rect) -> ElementNode {
        ElementNode::new(Element::new(control_type, text, bounds))
    }

    fn sample_tree() -> Vec<ElementNode> {
        vec![ElementNode::with_children(
            Element::new(ControlType::Pane, "root", Rect::new(0, 0, 1000, 1000)),
            vec![
                leaf(ControlType::Button, "inner", Rect::new(100, 100, 200, 200)),
                leaf(ControlType::Edit, "field", Rect::new(500, 500, 700, 550)),
            ],
        )]
    }

    #[test]
    fn test_smallest_containing_element_wins() {
        let element = resolve_in_snapshot(&sample_tree(), Point::new(150, 150)).unwrap();
        assert_eq!(element.text, "inner");
        assert_eq!(element.distance, 0.0);
        assert_eq!(element.depth, 1);
    }

    #[test]
    fn test_containing_parent_wins_when_children_miss() {
        let element = resolve_in_snapshot(&sample_tree(), Point::new(900, 50)).unwrap();
        assert_eq!(element.text, "root");
        assert_eq!(element.distance, 0.0);
    }

    #[test]
    fn test_closest_element_reported_with_distance() {
        let nodes = vec![
            leaf(ControlType::Button, "near", Rect::new(0, 0, 10, 10)),
            leaf(ControlType::Button, "far", Rect::new(500, 500, 510, 510)),
        ];
        let element = resolve_in_snapshot(&nodes, Point::new(20, 5)).unwrap();
        assert_eq!(element.text, "near");
        assert!(element.distance > 0.0);
    }

    #[test]
    fn test_stable_tie_break_on_equal_areas() {
        let nodes = vec![
            leaf(ControlType::Button, "first", Rect::new(0, 0, 100, 100)),
            leaf(ControlType::Button, "second", Rect::new(0, 0, 100, 100)),
        ];
        for _ in 0..3 {
            let element = resolve_in_snapshot(&nodes, Point::new(50, 50)).unwrap();
            assert_eq!(element.text, "first");
        }
    }

    #[test]
    fn test_empty_snapshot_yields_none() {
        assert!(resolve_in_snapshot(&[], Point::new(0, 0)).is_none());
    }
}
