//! Last-resort resolution through a small hierarchy snapshot.
//!
//! Custom-drawn UI regions often expose nothing at the window level; a
//! bounded snapshot around the point sometimes still reveals elements the
//! direct queries missed.

use super::snapshot::resolve_in_snapshot;
use super::{ResolveContext, ResolveStrategy};
use crate::element::{DetectionMethod, Element};
use crate::geometry::Rect;
use tracing::debug;

pub struct RegionSnapshotStrategy {
    pub region_size: i32,
    pub max_depth: usize,
    pub min_size: u32,
}

impl Default for RegionSnapshotStrategy {
    fn default() -> Self {
        Self {
            region_size: 100,
            max_depth: 6,
            min_size: 5,
        }
    }
}

impl ResolveStrategy for RegionSnapshotStrategy {
    fn name(&self) -> &'static str {
        "region_snapshot"
    }

    fn resolve(&self, ctx: &ResolveContext<'_>) -> Option<Element> {
        let (width, height) = ctx.provider.screen_size();
        let screen = Rect::new(0, 0, width as i32, height as i32);
        let region =
            Rect::centered_on(ctx.point, self.region_size, self.region_size).clamp_to(screen);

        let nodes = match ctx
            .provider
            .hierarchy_snapshot(region, self.max_depth, self.min_size)
        {
            Ok(nodes) => nodes,
            Err(e) => {
                debug!("Hierarchy snapshot failed around {:?}: {e}", ctx.point);
                return None;
            }
        };
        if nodes.is_empty() {
            return None;
        }

        resolve_in_snapshot(&nodes, ctx.point)
            .map(|element| element.with_method(DetectionMethod::RegionSnapshot))
    }
}
