//! Spatial index (§4.3): an octree over AABB entries tagged by kind.
//!
//! Owned by the world; rebuilt on static-collider changes (level load,
//! builder-room edits) via [`Octree::rebuild`]. `query_point` and
//! `query_ray` are the only two broad-phase operations `character::step`
//! and the projectile engine need.

use crate::math::{fixed_sqrt, FixedNum, FixedVec3};

#[derive(Debug, Clone)]
pub struct AabbEntry<T> {
    pub id: u64,
    pub kind: T,
    pub min: FixedVec3,
    pub max: FixedVec3,
}

impl<T: Copy> AabbEntry<T> {
    fn intersects(&self, min: FixedVec3, max: FixedVec3) -> bool {
        self.min.x <= max.x
            && self.max.x >= min.x
            && self.min.y <= max.y
            && self.max.y >= min.y
            && self.min.z <= max.z
            && self.max.z >= min.z
    }

    fn intersects_sphere(&self, center: FixedVec3, radius: FixedNum) -> bool {
        let cx = center.x.clamp(self.min.x, self.max.x);
        let cy = center.y.clamp(self.min.y, self.max.y);
        let cz = center.z.clamp(self.min.z, self.max.z);
        let closest = FixedVec3::new(cx, cy, cz);
        (closest - center).length_squared() <= radius * radius
    }
}

struct Node<T> {
    min: FixedVec3,
    max: FixedVec3,
    entries: Vec<AabbEntry<T>>,
    children: Option<Box<[Node<T>; 8]>>,
    depth: u32,
}

impl<T: Copy> Node<T> {
    fn new(min: FixedVec3, max: FixedVec3, depth: u32) -> Self {
        Self {
            min,
            max,
            entries: Vec::new(),
            children: None,
            depth,
        }
    }

    fn insert(&mut self, entry: AabbEntry<T>, max_depth: u32, max_entries: usize) {
        if self.children.is_none() {
            self.entries.push(entry);
            if self.entries.len() > max_entries && self.depth < max_depth {
                self.subdivide(max_depth, max_entries);
            }
            return;
        }
        self.insert_into_children(entry, max_depth, max_entries);
    }

    fn subdivide(&mut self, max_depth: u32, max_entries: usize) {
        let mid = (self.min + self.max) / FixedNum::from_num(2.0);
        let mut children: Vec<Node<T>> = Vec::with_capacity(8);
        for i in 0..8 {
            let (xlo, ylo, zlo) = (i & 1 == 0, i & 2 == 0, i & 4 == 0);
            let cmin = FixedVec3::new(
                if xlo { self.min.x } else { mid.x },
                if ylo { self.min.y } else { mid.y },
                if zlo { self.min.z } else { mid.z },
            );
            let cmax = FixedVec3::new(
                if xlo { mid.x } else { self.max.x },
                if ylo { mid.y } else { self.max.y },
                if zlo { mid.z } else { self.max.z },
            );
            children.push(Node::new(cmin, cmax, self.depth + 1));
        }
        let boxed: Box<[Node<T>; 8]> = Box::new(children.try_into().ok().unwrap());
        let drained: Vec<_> = self.entries.drain(..).collect();
        self.children = Some(boxed);
        if let Some(children) = &mut self.children {
            for entry in drained {
                for child in children.iter_mut() {
                    if entry.intersects(child.min, child.max) {
                        child.insert(entry.clone(), max_depth, max_entries);
                    }
                }
            }
        }
    }

    fn insert_into_children(&mut self, entry: AabbEntry<T>, max_depth: u32, max_entries: usize) {
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                if entry.intersects(child.min, child.max) {
                    child.insert(entry.clone(), max_depth, max_entries);
                }
            }
        }
    }

    fn query_point(&self, center: FixedVec3, radius: FixedNum, out: &mut Vec<u64>, seen: &mut std::collections::HashSet<u64>) {
        let expanded_min = FixedVec3::new(center.x - radius, center.y - radius, center.z - radius);
        let expanded_max = FixedVec3::new(center.x + radius, center.y + radius, center.z + radius);
        if !aabbs_intersect(self.min, self.max, expanded_min, expanded_max) {
            return;
        }
        for entry in &self.entries {
            if entry.intersects_sphere(center, radius) && seen.insert(entry.id) {
                out.push(entry.id);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_point(center, radius, out, seen);
            }
        }
    }

    fn collect_ray_candidates(&self, origin: FixedVec3, dir: FixedVec3, max_dist: FixedNum, out: &mut Vec<(u64, FixedNum)>) {
        if ray_vs_aabb(origin, dir, max_dist, self.min, self.max).is_none() {
            return;
        }
        for entry in &self.entries {
            if let Some(t) = ray_vs_aabb(origin, dir, max_dist, entry.min, entry.max) {
                out.push((entry.id, t));
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.collect_ray_candidates(origin, dir, max_dist, out);
            }
        }
    }
}

pub struct Octree<T> {
    root: Node<T>,
    max_depth: u32,
    max_entries_per_node: usize,
}

impl<T: Copy> Octree<T> {
    pub fn new(world_min: FixedVec3, world_max: FixedVec3, max_depth: u32, max_entries_per_node: usize) -> Self {
        Self {
            root: Node::new(world_min, world_max, 0),
            max_depth,
            max_entries_per_node,
        }
    }

    pub fn insert(&mut self, entry: AabbEntry<T>) {
        self.root.insert(entry, self.max_depth, self.max_entries_per_node);
    }

    /// Clears and rebuilds from scratch. Called on level load / builder
    /// edits (§4.12); never called mid-tick.
    pub fn rebuild(&mut self, entries: impl IntoIterator<Item = AabbEntry<T>>) {
        let world_min = self.root.min;
        let world_max = self.root.max;
        self.root = Node::new(world_min, world_max, 0);
        for e in entries {
            self.insert(e);
        }
    }

    pub fn query_point(&self, center: FixedVec3, radius: FixedNum) -> Vec<u64> {
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        self.root.query_point(center, radius, &mut out, &mut seen);
        out
    }

    /// Entries sorted ascending by first-hit `t` along the ray; duplicates
    /// are not possible since each leaf holds its own entry clones keyed by
    /// stable id, and we dedupe by id while keeping the smallest t.
    pub fn query_ray(&self, origin: FixedVec3, dir: FixedVec3, max_dist: FixedNum) -> Vec<(u64, FixedNum)> {
        let mut candidates = Vec::new();
        self.root.collect_ray_candidates(origin, dir, max_dist, &mut candidates);
        let mut best: std::collections::HashMap<u64, FixedNum> = std::collections::HashMap::new();
        for (id, t) in candidates {
            best.entry(id).and_modify(|cur| if t < *cur { *cur = t }).or_insert(t);
        }
        let mut out: Vec<(u64, FixedNum)> = best.into_iter().collect();
        out.sort_by(|a, b| a.1.cmp(&b.1));
        out
    }
}

/// Ray-vs-AABB via the slab method with zero-direction guards (§4.4).
/// Returns the smallest non-negative `t` within `[0, max_dist]`, or `None`.
pub fn ray_vs_aabb(origin: FixedVec3, dir: FixedVec3, max_dist: FixedNum, min: FixedVec3, max: FixedVec3) -> Option<FixedNum> {
    let mut t_min = FixedNum::ZERO;
    let mut t_max = max_dist;

    for axis in 0..3 {
        let (o, d, lo, hi) = match axis {
            0 => (origin.x, dir.x, min.x, max.x),
            1 => (origin.y, dir.y, min.y, max.y),
            _ => (origin.z, dir.z, min.z, max.z),
        };
        if d == FixedNum::ZERO {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let inv_d = FixedNum::ONE / d;
        let mut t1 = (lo - o) * inv_d;
        let mut t2 = (hi - o) * inv_d;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }
    Some(t_min)
}

/// Distance from `point` to the closest point on the AABB; used by
/// point-radius queries where a sphere check over-approximates.
pub fn aabb_closest_point_distance(point: FixedVec3, min: FixedVec3, max: FixedVec3) -> FixedNum {
    let cx = point.x.clamp(min.x, max.x);
    let cy = point.y.clamp(min.y, max.y);
    let cz = point.z.clamp(min.z, max.z);
    fixed_sqrt((FixedVec3::new(cx, cy, cz) - point).length_squared())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fnum;

    fn entry(id: u64, center: FixedVec3, half: FixedNum) -> AabbEntry<u8> {
        AabbEntry {
            id,
            kind: 0,
            min: center - FixedVec3::new(half, half, half),
            max: center + FixedVec3::new(half, half, half),
        }
    }

    #[test]
    fn point_query_finds_overlapping_entries_without_duplicates() {
        let mut tree: Octree<u8> = Octree::new(
            FixedVec3::new(fnum(-100.0), fnum(-100.0), fnum(-100.0)),
            FixedVec3::new(fnum(100.0), fnum(100.0), fnum(100.0)),
            6,
            2,
        );
        for i in 0..40 {
            let c = FixedVec3::new(fnum(i as f64 * 0.5), fnum(0.0), fnum(0.0));
            tree.insert(entry(i, c, fnum(0.3)));
        }
        let hits = tree.query_point(FixedVec3::new(fnum(5.0), fnum(0.0), fnum(0.0)), fnum(0.4));
        let mut set = std::collections::HashSet::new();
        for h in &hits {
            assert!(set.insert(*h), "duplicate id returned: {h}");
        }
        assert!(hits.contains(&10));
    }

    #[test]
    fn ray_query_orders_by_first_hit() {
        let mut tree: Octree<u8> = Octree::new(
            FixedVec3::new(fnum(-100.0), fnum(-100.0), fnum(-100.0)),
            FixedVec3::new(fnum(100.0), fnum(100.0), fnum(100.0)),
            6,
            8,
        );
        tree.insert(entry(1, FixedVec3::new(fnum(10.0), fnum(0.0), fnum(0.0)), fnum(0.5)));
        tree.insert(entry(2, FixedVec3::new(fnum(5.0), fnum(0.0), fnum(0.0)), fnum(0.5)));

        let hits = tree.query_ray(FixedVec3::ZERO, FixedVec3::new(FixedNum::ONE, FixedNum::ZERO, FixedNum::ZERO), fnum(50.0));
        assert_eq!(hits.first().unwrap().0, 2);
    }

    #[test]
    fn ray_vs_aabb_misses_when_parallel_and_outside() {
        let min = FixedVec3::new(fnum(1.0), fnum(-1.0), fnum(-1.0));
        let max = FixedVec3::new(fnum(2.0), fnum(1.0), fnum(1.0));
        let origin = FixedVec3::new(fnum(0.0), fnum(5.0), fnum(0.0));
        let dir = FixedVec3::new(FixedNum::ONE, FixedNum::ZERO, FixedNum::ZERO);
        assert!(ray_vs_aabb(origin, dir, fnum(50.0), min, max).is_none());
    }
}
