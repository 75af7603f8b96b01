//! Spatial-hash broadphase
//!
//! The body population of a pinball table is dominated by static geometry
//! that never needs pairing against itself, plus one or a few dynamic
//! balls. Static bodies live in a persistent uniform grid maintained on
//! add/remove; kinematic and dynamic bodies are hashed in fresh every
//! step (they move), queried per dynamic body, and pulled back out.
//!
//! The grid is purely an accelerator: the pair set must equal what an
//! exhaustive dynamic-vs-everything test would produce under the same
//! `can_collide` rules.

use std::collections::HashMap;

use super::body::{Aabb, Body, BodyHandle, BodyType};
use crate::consts::HUGE_BODY_CELL_LIMIT;

/// Inclusive cell range covered by an AABB, or `None` when the body must
/// be treated as huge (unbounded AABB or too many cells).
fn cell_range(aabb: &Aabb, cell_size: f32) -> Option<(i32, i32, i32, i32)> {
    if !aabb.is_finite() {
        return None;
    }
    let x0 = (aabb.lower.x / cell_size).floor() as i64;
    let y0 = (aabb.lower.y / cell_size).floor() as i64;
    let x1 = (aabb.upper.x / cell_size).ceil() as i64;
    let y1 = (aabb.upper.y / cell_size).ceil() as i64;
    let cells = (x1 - x0 + 1) * (y1 - y0 + 1);
    if cells < 0 || cells as usize > HUGE_BODY_CELL_LIMIT {
        return None;
    }
    Some((x0 as i32, y0 as i32, x1 as i32, y1 as i32))
}

/// Collision-pair generator specialized for static-heavy populations.
pub struct SpatialHashBroadphase {
    cell_size: f32,
    /// Persistent buckets of static bodies
    cells: HashMap<(i32, i32), Vec<BodyHandle>>,
    /// Static bodies whose AABB is unbounded or spans too many cells
    huge: Vec<BodyHandle>,
    /// Moving-body partitions, maintained on add/remove
    dynamic: Vec<BodyHandle>,
    kinematic: Vec<BodyHandle>,
    /// Moving bodies classified huge during the current pair pass
    temp_huge: Vec<BodyHandle>,
}

impl SpatialHashBroadphase {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            huge: Vec::new(),
            dynamic: Vec::new(),
            kinematic: Vec::new(),
            temp_huge: Vec::new(),
        }
    }

    pub fn dynamic_bodies(&self) -> &[BodyHandle] {
        &self.dynamic
    }

    pub fn kinematic_bodies(&self) -> &[BodyHandle] {
        &self.kinematic
    }

    /// Track a body that just entered the world.
    pub fn on_body_added(&mut self, handle: BodyHandle, body: &Body) {
        match body.body_type {
            BodyType::Dynamic => self.dynamic.push(handle),
            BodyType::Kinematic => self.kinematic.push(handle),
            BodyType::Static => self.insert_static(handle, body),
        }
    }

    /// Forget a body that left the world.
    pub fn on_body_removed(&mut self, handle: BodyHandle, body: &Body) {
        match body.body_type {
            BodyType::Dynamic => retain_handle(&mut self.dynamic, handle),
            BodyType::Kinematic => retain_handle(&mut self.kinematic, handle),
            BodyType::Static => self.remove_from_grid(handle, body),
        }
    }

    fn insert_static(&mut self, handle: BodyHandle, body: &Body) {
        match cell_range(&body.aabb(), self.cell_size) {
            Some((x0, y0, x1, y1)) => {
                for y in y0..=y1 {
                    for x in x0..=x1 {
                        self.cells.entry((x, y)).or_default().push(handle);
                    }
                }
            }
            None => self.huge.push(handle),
        }
    }

    fn remove_from_grid(&mut self, handle: BodyHandle, body: &Body) {
        match cell_range(&body.aabb(), self.cell_size) {
            Some((x0, y0, x1, y1)) => {
                for y in y0..=y1 {
                    for x in x0..=x1 {
                        if let Some(bucket) = self.cells.get_mut(&(x, y)) {
                            retain_handle(bucket, handle);
                            if bucket.is_empty() {
                                self.cells.remove(&(x, y));
                            }
                        }
                    }
                }
            }
            None => retain_handle(&mut self.huge, handle),
        }
    }

    /// Generate candidate collision pairs for this step.
    ///
    /// Pairs come out (dynamic, other) with each unordered pair appearing
    /// at most once: a dynamic body removes itself from the hash before
    /// querying, so a pair of dynamic bodies is produced only by whichever
    /// of the two is processed first.
    pub fn collision_pairs(
        &mut self,
        bodies: &HashMap<BodyHandle, Body>,
    ) -> Vec<(BodyHandle, BodyHandle)> {
        // Hash the movers in; the grid holds everything for the duration
        // of this call.
        for handle in self.kinematic.iter().chain(self.dynamic.iter()) {
            let body = &bodies[handle];
            match cell_range(&body.aabb(), self.cell_size) {
                Some((x0, y0, x1, y1)) => {
                    for y in y0..=y1 {
                        for x in x0..=x1 {
                            self.cells.entry((x, y)).or_default().push(*handle);
                        }
                    }
                }
                None => self.temp_huge.push(*handle),
            }
        }

        let mut pairs = Vec::new();
        let mut candidates: Vec<BodyHandle> = Vec::new();

        let dynamic = self.dynamic.clone();
        for handle in dynamic {
            let body = &bodies[&handle];
            let aabb = body.aabb();

            // Self-removal first so the query cannot pair a body with
            // itself or re-produce a pair an earlier ball already made.
            let range = cell_range(&aabb, self.cell_size);
            match range {
                Some((x0, y0, x1, y1)) => {
                    for y in y0..=y1 {
                        for x in x0..=x1 {
                            if let Some(bucket) = self.cells.get_mut(&(x, y)) {
                                retain_handle(bucket, handle);
                            }
                        }
                    }
                }
                None => retain_handle(&mut self.temp_huge, handle),
            }

            candidates.clear();
            if let Some((x0, y0, x1, y1)) = range {
                for y in y0..=y1 {
                    for x in x0..=x1 {
                        if let Some(bucket) = self.cells.get(&(x, y)) {
                            for other in bucket {
                                if !candidates.contains(other) {
                                    candidates.push(*other);
                                }
                            }
                        }
                    }
                }
            } else {
                // A huge dynamic body must consider every cell; fall back
                // to scanning all buckets once.
                for bucket in self.cells.values() {
                    for other in bucket {
                        if !candidates.contains(other) {
                            candidates.push(*other);
                        }
                    }
                }
            }
            for other in self.huge.iter().chain(self.temp_huge.iter()) {
                if *other != handle && !candidates.contains(other) {
                    candidates.push(*other);
                }
            }

            for other in &candidates {
                let other_body = &bodies[other];
                if !aabb.overlaps(&other_body.aabb()) {
                    continue;
                }
                if can_collide(body, other_body) {
                    pairs.push((handle, *other));
                }
            }
        }

        // Pull the kinematic bodies back out; the moving-body portion of
        // the hash never persists across steps.
        let kinematic = self.kinematic.clone();
        for handle in kinematic {
            let body = &bodies[&handle];
            match cell_range(&body.aabb(), self.cell_size) {
                Some((x0, y0, x1, y1)) => {
                    for y in y0..=y1 {
                        for x in x0..=x1 {
                            if let Some(bucket) = self.cells.get_mut(&(x, y)) {
                                retain_handle(bucket, handle);
                                if bucket.is_empty() {
                                    self.cells.remove(&(x, y));
                                }
                            }
                        }
                    }
                }
                None => retain_handle(&mut self.temp_huge, handle),
            }
        }
        self.temp_huge.clear();
        // Dynamic-only buckets may be left empty; drop them
        self.cells.retain(|_, bucket| !bucket.is_empty());

        pairs
    }
}

fn retain_handle(list: &mut Vec<BodyHandle>, handle: BodyHandle) {
    if let Some(pos) = list.iter().position(|h| *h == handle) {
        list.remove(pos);
    }
}

/// Pair admission rules shared by the broadphase and its exhaustive
/// reference: at least one body dynamic, sleep rules, and some pair of
/// shapes with compatible category/mask bits.
pub fn can_collide(a: &Body, b: &Body) -> bool {
    if a.body_type != BodyType::Dynamic && b.body_type != BodyType::Dynamic {
        return false;
    }
    // Two sleepers can't wake each other; neither can static geometry
    // wake a sleeper.
    if a.is_sleeping() && b.is_sleeping() {
        return false;
    }
    if (a.is_sleeping() && b.body_type == BodyType::Static)
        || (b.is_sleeping() && a.body_type == BodyType::Static)
    {
        return false;
    }
    a.shapes
        .iter()
        .any(|sa| b.shapes.iter().any(|sb| sa.can_collide(sb)))
}
