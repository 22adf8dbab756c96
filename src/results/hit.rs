//! Hit testing
//!
//! Picks the single region under a point. Dense text produces nested and
//! overlapping detections, so the smallest box wins, then the higher
//! confidence, then the earlier list position.

use std::cmp::Ordering;

use super::types::{DetectedRegion, Point};

/// Index of the best active region containing `point`
pub fn hit(point: Point, regions: &[DetectedRegion]) -> Option<usize> {
    regions
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_active() && r.bbox.contains(point))
        .min_by(|(ia, a), (ib, b)| hit_order(a, b).then_with(|| ia.cmp(ib)))
        .map(|(index, _)| index)
}

fn hit_order(a: &DetectedRegion, b: &DetectedRegion) -> Ordering {
    a.bbox
        .area()
        .cmp(&b.bbox.area())
        .then_with(|| b.rank_confidence().total_cmp(&a.rank_confidence()))
}
