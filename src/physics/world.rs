//! Physics world and its fixed step pipeline
//!
//! The step order is load-bearing and mirrors the documented pipeline:
//! forces → broadphase → narrowphase → wake → overlap-end events →
//! solve → integrate → impact events → sleep → deferred removal.
//! Impact events therefore describe solved contacts, and the
//! first-impact flag is set exactly once per contact lifetime.
//!
//! Per-step body iteration uses the broadphase's dynamic/kinematic
//! partitions; the full body map is only touched for O(1) lookups and
//! the force-zeroing sweep.

use std::collections::{BTreeSet, HashMap, HashSet};

use glam::Vec2;

use super::body::{Body, BodyHandle, ContactMaterialTable, ContactParams, SleepState};
use super::broadphase::SpatialHashBroadphase;
use super::narrowphase::{self, Contact};
use super::solver::{ContactEquation, DistanceEquation, FrictionEquation, Solver};
use crate::consts::{SLEEP_SPEED_LIMIT, SLEEP_TIME_LIMIT};
use crate::math::{cross_scalar, Vec2Ext};

/// Handle to a spring attached to the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpringHandle(u32);

/// Handle to a constraint attached to the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintHandle(u32);

/// Linear spring between two body anchors; forces accumulate during the
/// force phase of each step.
#[derive(Debug, Clone)]
pub struct Spring {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// Anchor in body A local coordinates
    pub anchor_a: Vec2,
    pub anchor_b: Vec2,
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
}

/// Constraint flavors supported by the solver
#[derive(Debug, Clone, Copy)]
pub enum ConstraintKind {
    Distance { rest_length: f32 },
}

/// A solver constraint joining two bodies.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub anchor_a: Vec2,
    pub anchor_b: Vec2,
    pub kind: ConstraintKind,
    /// When false, the joined bodies never generate contact pairs
    pub collide_connected: bool,
}

/// Identifies a touching shape pair across steps. Normalized so the
/// lower (body, shape) always comes first.
pub type PairKey = (BodyHandle, usize, BodyHandle, usize);

pub(crate) fn pair_key(a: BodyHandle, sa: usize, b: BodyHandle, sb: usize) -> PairKey {
    if (a, sa) <= (b, sb) {
        (a, sa, b, sb)
    } else {
        (b, sb, a, sa)
    }
}

/// Contact lifecycle events buffered during a step and drained by the
/// game afterwards.
#[derive(Debug, Clone)]
pub enum WorldEvent {
    BeginContact {
        body_a: BodyHandle,
        shape_a: usize,
        body_b: BodyHandle,
        shape_b: usize,
        contacts: Vec<Contact>,
    },
    EndContact {
        body_a: BodyHandle,
        shape_a: usize,
        body_b: BodyHandle,
        shape_b: usize,
    },
    /// First touch of a body pair this contact lifetime; coarser than
    /// the per-shape events above
    Impact {
        body_a: BodyHandle,
        body_b: BodyHandle,
    },
}

/// 2D rigid-body world with a spatial-hash broadphase.
pub struct PhysicsWorld {
    pub gravity: Vec2,
    bodies: HashMap<BodyHandle, Body>,
    next_body: u32,
    broadphase: SpatialHashBroadphase,
    springs: Vec<(SpringHandle, Spring)>,
    next_spring: u32,
    constraints: Vec<(ConstraintHandle, Constraint)>,
    next_constraint: u32,
    pub materials: ContactMaterialTable,
    solver: Solver,
    pub sleep_enabled: bool,
    /// Explicitly disabled body pairs (normalized order)
    disabled_pairs: HashSet<(BodyHandle, BodyHandle)>,
    /// Shape pairs touching as of the last completed step
    touching: BTreeSet<PairKey>,
    events: Vec<WorldEvent>,
    /// Bodies queued for removal while a step is running
    removal_queue: Vec<BodyHandle>,
    stepping: bool,
}

impl PhysicsWorld {
    pub fn new(gravity: Vec2, cell_size: f32, solver_iterations: u32) -> Self {
        Self {
            gravity,
            bodies: HashMap::new(),
            next_body: 0,
            broadphase: SpatialHashBroadphase::new(cell_size),
            springs: Vec::new(),
            next_spring: 0,
            constraints: Vec::new(),
            next_constraint: 0,
            materials: ContactMaterialTable::new(ContactParams::default()),
            solver: Solver::new(solver_iterations),
            sleep_enabled: true,
            disabled_pairs: HashSet::new(),
            touching: BTreeSet::new(),
            events: Vec::new(),
            removal_queue: Vec::new(),
            stepping: false,
        }
    }

    // --- body management ---

    pub fn add_body(&mut self, body: Body) -> BodyHandle {
        let handle = BodyHandle(self.next_body);
        self.next_body += 1;
        self.broadphase.on_body_added(handle, &body);
        self.bodies.insert(handle, body);
        handle
    }

    /// Remove a body. During a step the removal is queued and performed
    /// in the cleanup phase; bodies are never detached mid-step.
    pub fn remove_body(&mut self, handle: BodyHandle) {
        if self.stepping {
            self.removal_queue.push(handle);
        } else {
            self.detach_body(handle);
        }
    }

    fn detach_body(&mut self, handle: BodyHandle) {
        let Some(body) = self.bodies.remove(&handle) else {
            return;
        };
        self.broadphase.on_body_removed(handle, &body);
        self.springs
            .retain(|(_, s)| s.body_a != handle && s.body_b != handle);
        self.constraints
            .retain(|(_, c)| c.body_a != handle && c.body_b != handle);
        self.disabled_pairs
            .retain(|(a, b)| *a != handle && *b != handle);
        // Close out any live contacts so the other party still gets its
        // end-of-overlap notification.
        let stale: Vec<PairKey> = self
            .touching
            .iter()
            .filter(|(a, _, b, _)| *a == handle || *b == handle)
            .copied()
            .collect();
        for (a, sa, b, sb) in stale {
            self.touching.remove(&(a, sa, b, sb));
            self.events.push(WorldEvent::EndContact {
                body_a: a,
                shape_a: sa,
                body_b: b,
                shape_b: sb,
            });
        }
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(&handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(&handle)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn dynamic_bodies(&self) -> &[BodyHandle] {
        self.broadphase.dynamic_bodies()
    }

    pub fn kinematic_bodies(&self) -> &[BodyHandle] {
        self.broadphase.kinematic_bodies()
    }

    // --- springs / constraints / pair rules ---

    pub fn add_spring(&mut self, spring: Spring) -> SpringHandle {
        let handle = SpringHandle(self.next_spring);
        self.next_spring += 1;
        self.springs.push((handle, spring));
        handle
    }

    pub fn remove_spring(&mut self, handle: SpringHandle) {
        self.springs.retain(|(h, _)| *h != handle);
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> ConstraintHandle {
        let handle = ConstraintHandle(self.next_constraint);
        self.next_constraint += 1;
        self.constraints.push((handle, constraint));
        handle
    }

    pub fn remove_constraint(&mut self, handle: ConstraintHandle) {
        self.constraints.retain(|(h, _)| *h != handle);
    }

    /// Suppress collision between two bodies regardless of geometry
    pub fn disable_collision(&mut self, a: BodyHandle, b: BodyHandle) {
        self.disabled_pairs.insert(normalize(a, b));
    }

    pub fn enable_collision(&mut self, a: BodyHandle, b: BodyHandle) {
        self.disabled_pairs.remove(&normalize(a, b));
    }

    /// Shape pairs touching as of the last completed step, in stable
    /// order.
    pub fn touching_pairs(&self) -> impl Iterator<Item = PairKey> + '_ {
        self.touching.iter().copied()
    }

    /// Drain the contact events buffered by the last step.
    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn wake_body(&mut self, handle: BodyHandle) {
        if let Some(body) = self.bodies.get_mut(&handle) {
            body.wake_up();
        }
    }

    // --- step pipeline ---

    /// Advance the world by one fixed timestep.
    pub fn step(&mut self, dt: f32) {
        self.stepping = true;

        self.apply_forces(dt);
        let pairs = self.broadphase_pairs();
        let (mut contacts, mut frictions, current_touching) = self.narrowphase(&pairs);
        self.wake_flagged();
        self.emit_overlap_events(&contacts, &current_touching);
        let mut distances = self.constraint_equations(dt);
        self.solver
            .solve(dt, &mut contacts, &mut frictions, &mut distances, &mut self.bodies);
        self.integrate(dt);
        self.emit_impact_events(&contacts);
        self.update_sleep(dt);
        self.touching = current_touching;

        self.stepping = false;
        let queued = std::mem::take(&mut self.removal_queue);
        for handle in queued {
            self.detach_body(handle);
        }
    }

    /// Phase 1: gravity and spring forces into awake dynamic bodies,
    /// velocity integration of accumulated forces, then damping.
    fn apply_forces(&mut self, dt: f32) {
        let springs = self.springs.clone();
        for (_, spring) in &springs {
            self.apply_spring(spring);
        }
        let dynamic = self.broadphase.dynamic_bodies().to_vec();
        for handle in dynamic {
            let gravity = self.gravity;
            let Some(body) = self.bodies.get_mut(&handle) else {
                continue;
            };
            if body.is_sleeping() {
                continue;
            }
            body.force += gravity * body.mass * body.gravity_scale;
            body.velocity += body.force * body.inv_mass * dt;
            body.angular_velocity += body.torque * body.inv_inertia * dt;
            body.velocity *= 1.0 / (1.0 + dt * body.damping);
            body.angular_velocity *= 1.0 / (1.0 + dt * body.angular_damping);
        }
    }

    fn apply_spring(&mut self, spring: &Spring) {
        let (Some(a), Some(b)) = (
            self.bodies.get(&spring.body_a),
            self.bodies.get(&spring.body_b),
        ) else {
            return;
        };
        let wa = a.position + spring.anchor_a.rotated(a.angle);
        let wb = b.position + spring.anchor_b.rotated(b.angle);
        let delta = wb - wa;
        let length = delta.length();
        if length < 1e-9 {
            return;
        }
        let axis = delta / length;
        let va = a.velocity + cross_scalar(a.angular_velocity, wa - a.position);
        let vb = b.velocity + cross_scalar(b.angular_velocity, wb - b.position);
        let rel = (vb - va).dot(axis);
        let magnitude = spring.stiffness * (length - spring.rest_length) + spring.damping * rel;
        let force = axis * magnitude;
        if let Some(a) = self.bodies.get_mut(&spring.body_a) {
            apply_force_at(a, force, wa);
        }
        if let Some(b) = self.bodies.get_mut(&spring.body_b) {
            apply_force_at(b, -force, wb);
        }
    }

    /// Phase 2: candidate pairs minus disabled and constraint-joined
    /// non-colliding pairs.
    fn broadphase_pairs(&mut self) -> Vec<(BodyHandle, BodyHandle)> {
        let mut pairs = self.broadphase.collision_pairs(&self.bodies);
        if !self.disabled_pairs.is_empty() {
            pairs.retain(|&(a, b)| !self.disabled_pairs.contains(&normalize(a, b)));
        }
        for (_, constraint) in &self.constraints {
            if constraint.collide_connected {
                continue;
            }
            let joined = normalize(constraint.body_a, constraint.body_b);
            pairs.retain(|&(a, b)| normalize(a, b) != joined);
        }
        pairs
    }

    /// Phase 3: exact shape tests, building contact/friction equations.
    #[allow(clippy::type_complexity)]
    fn narrowphase(
        &mut self,
        pairs: &[(BodyHandle, BodyHandle)],
    ) -> (Vec<ContactEquation>, Vec<FrictionEquation>, BTreeSet<PairKey>) {
        let mut contacts: Vec<ContactEquation> = Vec::new();
        let mut frictions: Vec<FrictionEquation> = Vec::new();
        let mut current: BTreeSet<PairKey> = BTreeSet::new();

        for &(ha, hb) in pairs {
            let a = &self.bodies[&ha];
            let b = &self.bodies[&hb];
            let mut woke = false;
            for (ia, sa) in a.shapes.iter().enumerate() {
                for (ib, sb) in b.shapes.iter().enumerate() {
                    if !sa.can_collide(sb) {
                        continue;
                    }
                    let Some(contact) = narrowphase::collide(a, ia, b, ib) else {
                        continue;
                    };
                    let key = pair_key(ha, ia, hb, ib);
                    current.insert(key);
                    let params = self.materials.get(sa.material, sb.material);
                    let eq_index = contacts.len();
                    contacts.push(ContactEquation {
                        body_a: ha,
                        body_b: hb,
                        shape_a: ia,
                        shape_b: ib,
                        contact,
                        restitution: params.restitution,
                        first_impact: !self.touching.contains(&key),
                        r_a: contact.point - a.position,
                        r_b: contact.point - b.position,
                        target_velocity: 0.0,
                        normal_impulse: 0.0,
                    });
                    if params.friction > 0.0 {
                        frictions.push(FrictionEquation {
                            body_a: ha,
                            body_b: hb,
                            friction: params.friction,
                            contact_index: eq_index,
                            r_a: contact.point - a.position,
                            r_b: contact.point - b.position,
                            tangent: Vec2::new(-contact.normal.y, contact.normal.x),
                            impulse: 0.0,
                        });
                    }
                    woke = true;
                }
            }
            if woke {
                // Sleeping participants are woken in the next phase, not
                // here, so pair generation sees a consistent sleep state.
                for handle in [ha, hb] {
                    if let Some(body) = self.bodies.get_mut(&handle) {
                        if body.is_sleeping() {
                            body.wake_flagged = true;
                        }
                    }
                }
            }
        }
        (contacts, frictions, current)
    }

    /// Phase 4: wake bodies flagged during narrowphase.
    fn wake_flagged(&mut self) {
        let dynamic = self.broadphase.dynamic_bodies().to_vec();
        for handle in dynamic {
            if let Some(body) = self.bodies.get_mut(&handle) {
                if body.wake_flagged {
                    body.wake_flagged = false;
                    body.wake_up();
                }
            }
        }
    }

    /// Phase 5: begin events for new overlaps, end events for pairs that
    /// stopped touching.
    fn emit_overlap_events(&mut self, contacts: &[ContactEquation], current: &BTreeSet<PairKey>) {
        for key in current.difference(&self.touching) {
            let (a, sa, b, sb) = *key;
            let points: Vec<Contact> = contacts
                .iter()
                .filter(|eq| pair_key(eq.body_a, eq.shape_a, eq.body_b, eq.shape_b) == *key)
                .map(|eq| eq.contact)
                .collect();
            self.events.push(WorldEvent::BeginContact {
                body_a: a,
                shape_a: sa,
                body_b: b,
                shape_b: sb,
                contacts: points,
            });
        }
        for key in self.touching.difference(current) {
            let (a, sa, b, sb) = *key;
            self.events.push(WorldEvent::EndContact {
                body_a: a,
                shape_a: sa,
                body_b: b,
                shape_b: sb,
            });
        }
    }

    /// Phase 6 input: refresh constraint equations from current poses.
    fn constraint_equations(&mut self, dt: f32) -> Vec<DistanceEquation> {
        let mut equations = Vec::new();
        for (_, constraint) in &self.constraints {
            let (Some(a), Some(b)) = (
                self.bodies.get(&constraint.body_a),
                self.bodies.get(&constraint.body_b),
            ) else {
                continue;
            };
            if a.is_sleeping() && b.is_sleeping() {
                continue;
            }
            let ra = constraint.anchor_a.rotated(a.angle);
            let rb = constraint.anchor_b.rotated(b.angle);
            let delta = (b.position + rb) - (a.position + ra);
            let length = delta.length();
            let axis = if length > 1e-9 { delta / length } else { Vec2::X };
            match constraint.kind {
                ConstraintKind::Distance { rest_length } => {
                    equations.push(DistanceEquation {
                        body_a: constraint.body_a,
                        body_b: constraint.body_b,
                        r_a: ra,
                        r_b: rb,
                        axis,
                        bias: 0.2 / dt * (length - rest_length),
                        impulse: 0.0,
                    });
                }
            }
        }
        equations
    }

    /// Phase 7: advance kinematic then dynamic bodies; zero force
    /// accumulators on every body.
    fn integrate(&mut self, dt: f32) {
        let kinematic = self.broadphase.kinematic_bodies().to_vec();
        for handle in kinematic {
            if let Some(body) = self.bodies.get_mut(&handle) {
                body.position += body.velocity * dt;
                body.angle += body.angular_velocity * dt;
            }
        }
        let dynamic = self.broadphase.dynamic_bodies().to_vec();
        for handle in dynamic {
            if let Some(body) = self.bodies.get_mut(&handle) {
                if body.is_sleeping() {
                    continue;
                }
                body.position += body.velocity * dt;
                body.angle += body.angular_velocity * dt;
            }
        }
        for body in self.bodies.values_mut() {
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
    }

    /// Phase 8: one impact event per body pair whose contact is new this
    /// step.
    fn emit_impact_events(&mut self, contacts: &[ContactEquation]) {
        let mut seen: HashSet<(BodyHandle, BodyHandle)> = HashSet::new();
        for eq in contacts {
            if !eq.first_impact {
                continue;
            }
            let key = normalize(eq.body_a, eq.body_b);
            if seen.insert(key) {
                self.events.push(WorldEvent::Impact {
                    body_a: eq.body_a,
                    body_b: eq.body_b,
                });
            }
        }
    }

    /// Phase 9: per-body sleep timers.
    fn update_sleep(&mut self, dt: f32) {
        if !self.sleep_enabled {
            return;
        }
        let dynamic = self.broadphase.dynamic_bodies().to_vec();
        let limit_sq = SLEEP_SPEED_LIMIT * SLEEP_SPEED_LIMIT;
        for handle in dynamic {
            let Some(body) = self.bodies.get_mut(&handle) else {
                continue;
            };
            if body.is_sleeping() {
                continue;
            }
            if body.speed_squared() < limit_sq {
                body.sleep_state = SleepState::Sleepy;
                body.sleep_time += dt;
                if body.sleep_time > SLEEP_TIME_LIMIT {
                    body.sleep();
                }
            } else {
                body.wake_up();
            }
        }
    }
}

fn normalize(a: BodyHandle, b: BodyHandle) -> (BodyHandle, BodyHandle) {
    if a <= b { (a, b) } else { (b, a) }
}

fn apply_force_at(body: &mut Body, force: Vec2, world_point: Vec2) {
    body.force += force;
    body.torque += crate::math::cross(world_point - body.position, force);
}
