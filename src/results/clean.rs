//! Overlap cleanup
//!
//! Collapses overlapping detections into one active survivor per cluster.
//! Clusters are the connected components of the "boxes intersect" relation
//! over active regions. Removed regions never take part and are never
//! reactivated.

use std::cmp::Ordering;

use super::types::{DetectedRegion, RegionStatus};

/// Resolve overlaps in place and return how many regions were removed
pub fn clean_regions(regions: &mut [DetectedRegion]) -> usize {
    let active: Vec<usize> = regions
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_active())
        .map(|(i, _)| i)
        .collect();

    let mut clusters = DisjointSet::new(active.len());
    for a in 0..active.len() {
        for b in (a + 1)..active.len() {
            if regions[active[a]].bbox.intersects(&regions[active[b]].bbox) {
                clusters.union(a, b);
            }
        }
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); active.len()];
    for (slot, &index) in active.iter().enumerate() {
        members[clusters.find(slot)].push(index);
    }

    let mut removed = 0;
    for cluster in members.into_iter().filter(|m| m.len() > 1) {
        let survivor = cluster
            .iter()
            .copied()
            .min_by(|&a, &b| survivor_order(regions, a, b))
            .unwrap_or(cluster[0]);

        for index in cluster {
            if index != survivor {
                regions[index].status = RegionStatus::Removed;
                removed += 1;
            }
        }
    }
    removed
}

/// Ordering where the preferred survivor sorts first
///
/// Non-empty text beats empty text, then higher confidence, then larger
/// area, then the earlier list position.
fn survivor_order(regions: &[DetectedRegion], a: usize, b: usize) -> Ordering {
    let (ra, rb) = (&regions[a], &regions[b]);
    rb.has_text()
        .cmp(&ra.has_text())
        .then_with(|| rb.rank_confidence().total_cmp(&ra.rank_confidence()))
        .then_with(|| rb.bbox.area().cmp(&ra.bbox.area()))
        .then_with(|| a.cmp(&b))
}

/// Union-find over cluster slots
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}
