//! Contact, friction and constraint equations plus the velocity solver
//!
//! All equations produced during a step are pooled and solved globally
//! with iterative sequential impulses. Island splitting would be a
//! performance refinement only; the global solve is the semantic
//! reference.

use std::collections::HashMap;

use glam::Vec2;

use super::body::{Body, BodyHandle};
use super::narrowphase::Contact;
use crate::math::{cross, cross_scalar};

/// Positional correction factor per step
const BAUMGARTE: f32 = 0.2;
/// Penetration tolerated without correction
const PENETRATION_SLOP: f32 = 0.005;

/// Normal non-penetration equation for one contact point.
#[derive(Debug, Clone)]
pub struct ContactEquation {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub shape_a: usize,
    pub shape_b: usize,
    pub contact: Contact,
    pub restitution: f32,
    /// True when this pair was not touching last step
    pub first_impact: bool,
    pub(crate) r_a: Vec2,
    pub(crate) r_b: Vec2,
    /// Post-solve target normal velocity (restitution + position bias)
    pub(crate) target_velocity: f32,
    pub(crate) normal_impulse: f32,
}

/// Coulomb friction equation, clamped by its contact's normal impulse.
#[derive(Debug, Clone)]
pub struct FrictionEquation {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub friction: f32,
    /// Index of the paired normal equation in the contact pool
    pub contact_index: usize,
    pub(crate) r_a: Vec2,
    pub(crate) r_b: Vec2,
    pub(crate) tangent: Vec2,
    pub(crate) impulse: f32,
}

/// Equality equation holding two anchors at a fixed distance.
#[derive(Debug, Clone)]
pub struct DistanceEquation {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub(crate) r_a: Vec2,
    pub(crate) r_b: Vec2,
    pub(crate) axis: Vec2,
    pub(crate) bias: f32,
    pub(crate) impulse: f32,
}

/// Scratch velocity state for one body during a solve.
struct VelocityState {
    handle: BodyHandle,
    inv_mass: f32,
    inv_inertia: f32,
    velocity: Vec2,
    angular_velocity: f32,
}

/// Pooled-equation Gauss-Seidel velocity solver.
pub struct Solver {
    pub iterations: u32,
}

impl Solver {
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Solve all equations and write resulting velocities back.
    pub fn solve(
        &self,
        dt: f32,
        contacts: &mut [ContactEquation],
        frictions: &mut [FrictionEquation],
        distances: &mut [DistanceEquation],
        bodies: &mut HashMap<BodyHandle, Body>,
    ) {
        if contacts.is_empty() && frictions.is_empty() && distances.is_empty() {
            return;
        }

        // Gather the participating bodies into dense scratch state
        let mut index: HashMap<BodyHandle, usize> = HashMap::new();
        let mut states: Vec<VelocityState> = Vec::new();
        let mut intern = |handle: BodyHandle,
                          index: &mut HashMap<BodyHandle, usize>,
                          states: &mut Vec<VelocityState>,
                          bodies: &HashMap<BodyHandle, Body>| {
            *index.entry(handle).or_insert_with(|| {
                let body = &bodies[&handle];
                states.push(VelocityState {
                    handle,
                    inv_mass: body.inv_mass,
                    inv_inertia: body.inv_inertia,
                    velocity: body.velocity,
                    angular_velocity: body.angular_velocity,
                });
                states.len() - 1
            })
        };

        let contact_pairs: Vec<(usize, usize)> = contacts
            .iter()
            .map(|eq| {
                (
                    intern(eq.body_a, &mut index, &mut states, bodies),
                    intern(eq.body_b, &mut index, &mut states, bodies),
                )
            })
            .collect();
        let friction_pairs: Vec<(usize, usize)> = frictions
            .iter()
            .map(|eq| {
                (
                    intern(eq.body_a, &mut index, &mut states, bodies),
                    intern(eq.body_b, &mut index, &mut states, bodies),
                )
            })
            .collect();
        let distance_pairs: Vec<(usize, usize)> = distances
            .iter()
            .map(|eq| {
                (
                    intern(eq.body_a, &mut index, &mut states, bodies),
                    intern(eq.body_b, &mut index, &mut states, bodies),
                )
            })
            .collect();

        // Restitution targets use approach speed before any solving
        for (eq, &(ia, ib)) in contacts.iter_mut().zip(&contact_pairs) {
            let vn = normal_velocity(&states[ia], &states[ib], eq.r_a, eq.r_b, eq.contact.normal);
            let bounce = -eq.restitution * vn.min(0.0);
            let bias =
                BAUMGARTE / dt * (eq.contact.penetration - PENETRATION_SLOP).max(0.0);
            eq.target_velocity = bounce + bias;
        }

        for _ in 0..self.iterations {
            for (eq, &(ia, ib)) in contacts.iter_mut().zip(&contact_pairs) {
                let n = eq.contact.normal;
                let k = effective_mass(&states[ia], &states[ib], eq.r_a, eq.r_b, n);
                if k <= 0.0 {
                    continue;
                }
                let vn = normal_velocity(&states[ia], &states[ib], eq.r_a, eq.r_b, n);
                let lambda = -(vn - eq.target_velocity) / k;
                let new_total = (eq.normal_impulse + lambda).max(0.0);
                let delta = new_total - eq.normal_impulse;
                eq.normal_impulse = new_total;
                apply(&mut states, ia, ib, eq.r_a, eq.r_b, n * delta);
            }

            for (eq, &(ia, ib)) in frictions.iter_mut().zip(&friction_pairs) {
                let t = eq.tangent;
                let k = effective_mass(&states[ia], &states[ib], eq.r_a, eq.r_b, t);
                if k <= 0.0 {
                    continue;
                }
                let vt = normal_velocity(&states[ia], &states[ib], eq.r_a, eq.r_b, t);
                let lambda = -vt / k;
                let max = eq.friction * contacts[eq.contact_index].normal_impulse;
                let new_total = (eq.impulse + lambda).clamp(-max, max);
                let delta = new_total - eq.impulse;
                eq.impulse = new_total;
                apply(&mut states, ia, ib, eq.r_a, eq.r_b, t * delta);
            }

            for (eq, &(ia, ib)) in distances.iter_mut().zip(&distance_pairs) {
                let u = eq.axis;
                let k = effective_mass(&states[ia], &states[ib], eq.r_a, eq.r_b, u);
                if k <= 0.0 {
                    continue;
                }
                let vu = normal_velocity(&states[ia], &states[ib], eq.r_a, eq.r_b, u);
                let lambda = -(vu + eq.bias) / k;
                eq.impulse += lambda;
                apply(&mut states, ia, ib, eq.r_a, eq.r_b, u * lambda);
            }
        }

        for state in &states {
            if let Some(body) = bodies.get_mut(&state.handle) {
                body.velocity = state.velocity;
                body.angular_velocity = state.angular_velocity;
            }
        }
    }
}

/// Relative velocity of the contact points projected on `axis`
fn normal_velocity(a: &VelocityState, b: &VelocityState, r_a: Vec2, r_b: Vec2, axis: Vec2) -> f32 {
    let va = a.velocity + cross_scalar(a.angular_velocity, r_a);
    let vb = b.velocity + cross_scalar(b.angular_velocity, r_b);
    (vb - va).dot(axis)
}

/// Effective mass of the pair along `axis`
fn effective_mass(a: &VelocityState, b: &VelocityState, r_a: Vec2, r_b: Vec2, axis: Vec2) -> f32 {
    let rn_a = cross(r_a, axis);
    let rn_b = cross(r_b, axis);
    a.inv_mass + b.inv_mass + a.inv_inertia * rn_a * rn_a + b.inv_inertia * rn_b * rn_b
}

/// Apply equal and opposite impulse along the pair
fn apply(states: &mut [VelocityState], ia: usize, ib: usize, r_a: Vec2, r_b: Vec2, impulse: Vec2) {
    {
        let a = &mut states[ia];
        a.velocity -= impulse * a.inv_mass;
        a.angular_velocity -= a.inv_inertia * cross(r_a, impulse);
    }
    {
        let b = &mut states[ib];
        b.velocity += impulse * b.inv_mass;
        b.angular_velocity += b.inv_inertia * cross(r_b, impulse);
    }
}
