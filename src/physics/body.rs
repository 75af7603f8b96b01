//! Rigid bodies, shapes and contact materials

use glam::Vec2;

use crate::entity::EntityId;
use crate::math::Vec2Ext;

/// Stable handle to a body inside a [`crate::physics::PhysicsWorld`].
/// Never reused within a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub(crate) u32);

/// Simulation role of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    /// Never moves; lives in the broadphase spatial hash
    Static,
    /// Moved by setting velocity directly (flippers, moving targets)
    Kinematic,
    /// Fully simulated (pinballs)
    Dynamic,
}

/// Sleep state of a dynamic body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepState {
    Awake,
    /// Below the idle speed limit, accumulating sleep time
    Sleepy,
    Sleeping,
}

/// Surface material id; pairs resolve to contact parameters through
/// [`ContactMaterialTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Material(pub u16);

/// Contact response parameters for a material pair
#[derive(Debug, Clone, Copy)]
pub struct ContactParams {
    /// Bounciness in [0, 1]
    pub restitution: f32,
    /// Coulomb friction coefficient
    pub friction: f32,
}

impl Default for ContactParams {
    fn default() -> Self {
        Self {
            restitution: 0.3,
            friction: 0.3,
        }
    }
}

/// Per-material-pair contact parameter lookup with a default fallback.
#[derive(Debug, Default)]
pub struct ContactMaterialTable {
    pairs: std::collections::HashMap<(Material, Material), ContactParams>,
    default: ContactParams,
}

impl ContactMaterialTable {
    pub fn new(default: ContactParams) -> Self {
        Self {
            pairs: std::collections::HashMap::new(),
            default,
        }
    }

    pub fn set(&mut self, a: Material, b: Material, params: ContactParams) {
        self.pairs.insert(Self::key(a, b), params);
    }

    pub fn get(&self, a: Material, b: Material) -> ContactParams {
        self.pairs
            .get(&Self::key(a, b))
            .copied()
            .unwrap_or(self.default)
    }

    fn key(a: Material, b: Material) -> (Material, Material) {
        if a <= b { (a, b) } else { (b, a) }
    }
}

/// Shape geometry in body-local coordinates
#[derive(Debug, Clone, Copy)]
pub enum ShapeKind {
    Circle {
        radius: f32,
    },
    /// Thin wall between two local points
    Segment {
        a: Vec2,
        b: Vec2,
    },
    /// Infinite half-plane; solid side is below the local +Y normal.
    /// Its AABB is unbounded, which routes it to the broadphase
    /// huge-body list.
    Plane,
}

/// A collision shape attached to a body.
#[derive(Debug, Clone)]
pub struct Shape {
    pub kind: ShapeKind,
    /// Offset from the body origin, in body-local coordinates
    pub offset: Vec2,
    pub material: Material,
    /// Category bit(s) this shape belongs to
    pub group: u16,
    /// Categories this shape collides with
    pub mask: u16,
    /// Entity resolved for contact callbacks; falls back to the body owner
    pub owner: Option<EntityId>,
}

impl Shape {
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            offset: Vec2::ZERO,
            material: Material::default(),
            group: 1,
            mask: u16::MAX,
            owner: None,
        }
    }

    pub fn circle(radius: f32) -> Self {
        Self::new(ShapeKind::Circle { radius })
    }

    pub fn segment(a: Vec2, b: Vec2) -> Self {
        Self::new(ShapeKind::Segment { a, b })
    }

    pub fn plane() -> Self {
        Self::new(ShapeKind::Plane)
    }

    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_groups(mut self, group: u16, mask: u16) -> Self {
        self.group = group;
        self.mask = mask;
        self
    }

    /// Category/mask compatibility test (symmetric by construction)
    pub fn can_collide(&self, other: &Shape) -> bool {
        self.group & other.mask != 0 && other.group & self.mask != 0
    }
}

/// Axis-aligned bounding box; may be unbounded for planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub lower: Vec2,
    pub upper: Vec2,
}

impl Aabb {
    pub const EVERYTHING: Aabb = Aabb {
        lower: Vec2::new(f32::NEG_INFINITY, f32::NEG_INFINITY),
        upper: Vec2::new(f32::INFINITY, f32::INFINITY),
    };

    pub fn new(lower: Vec2, upper: Vec2) -> Self {
        Self { lower, upper }
    }

    pub fn merge(self, other: Aabb) -> Aabb {
        Aabb {
            lower: self.lower.min(other.lower),
            upper: self.upper.max(other.upper),
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.lower.x <= other.upper.x
            && other.lower.x <= self.upper.x
            && self.lower.y <= other.upper.y
            && other.lower.y <= self.upper.y
    }

    pub fn is_finite(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite()
    }
}

/// A 2D rigid body.
#[derive(Debug, Clone)]
pub struct Body {
    pub body_type: BodyType,
    pub position: Vec2,
    pub angle: f32,
    pub velocity: Vec2,
    pub angular_velocity: f32,
    /// Force accumulator, zeroed after integration each step
    pub force: Vec2,
    /// Torque accumulator, zeroed after integration each step
    pub torque: f32,
    pub mass: f32,
    pub(crate) inv_mass: f32,
    pub(crate) inv_inertia: f32,
    /// Linear velocity damping per second
    pub damping: f32,
    pub angular_damping: f32,
    pub gravity_scale: f32,
    pub shapes: Vec<Shape>,
    /// Entity responsible for this body; stamped by `Game::add_entity`
    pub owner: Option<EntityId>,
    pub sleep_state: SleepState,
    pub(crate) sleep_time: f32,
    /// Set by narrowphase to wake the body after pair generation
    pub(crate) wake_flagged: bool,
}

impl Body {
    pub fn new(body_type: BodyType, position: Vec2) -> Self {
        let mass = if body_type == BodyType::Dynamic { 1.0 } else { 0.0 };
        let mut body = Self {
            body_type,
            position,
            angle: 0.0,
            velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            force: Vec2::ZERO,
            torque: 0.0,
            mass,
            inv_mass: 0.0,
            inv_inertia: 0.0,
            damping: 0.1,
            angular_damping: 0.1,
            gravity_scale: 1.0,
            shapes: Vec::new(),
            owner: None,
            sleep_state: SleepState::Awake,
            sleep_time: 0.0,
            wake_flagged: false,
        };
        body.update_mass_properties();
        body
    }

    pub fn dynamic(position: Vec2, mass: f32) -> Self {
        let mut body = Self::new(BodyType::Dynamic, position);
        body.mass = mass;
        body.update_mass_properties();
        body
    }

    pub fn static_at(position: Vec2) -> Self {
        Self::new(BodyType::Static, position)
    }

    pub fn kinematic(position: Vec2) -> Self {
        Self::new(BodyType::Kinematic, position)
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.add_shape(shape);
        self
    }

    pub fn add_shape(&mut self, shape: Shape) {
        self.shapes.push(shape);
        self.update_mass_properties();
    }

    /// Recompute inverse mass and inertia from mass and shape geometry.
    /// Non-dynamic bodies get zero inverse terms (infinite mass).
    pub fn update_mass_properties(&mut self) {
        if self.body_type != BodyType::Dynamic || self.mass <= 0.0 {
            self.inv_mass = 0.0;
            self.inv_inertia = 0.0;
            return;
        }
        self.inv_mass = 1.0 / self.mass;
        // Disc inertia about the body origin, parallel-axis for offsets
        let mut inertia = 0.0;
        let per_shape_mass = self.mass / self.shapes.len().max(1) as f32;
        for shape in &self.shapes {
            let local = match shape.kind {
                ShapeKind::Circle { radius } => 0.5 * per_shape_mass * radius * radius,
                ShapeKind::Segment { a, b } => {
                    per_shape_mass * (b - a).length_squared() / 12.0
                }
                ShapeKind::Plane => 0.0,
            };
            inertia += local + per_shape_mass * shape.offset.length_squared();
        }
        self.inv_inertia = if inertia > 0.0 { 1.0 / inertia } else { 0.0 };
    }

    /// World-space position of a shape's offset
    pub fn shape_world_position(&self, shape: &Shape) -> Vec2 {
        self.position + shape.offset.rotated(self.angle)
    }

    /// World-space AABB of one shape
    pub fn shape_aabb(&self, shape: &Shape) -> Aabb {
        let center = self.shape_world_position(shape);
        match shape.kind {
            ShapeKind::Circle { radius } => Aabb::new(
                center - Vec2::splat(radius),
                center + Vec2::splat(radius),
            ),
            ShapeKind::Segment { a, b } => {
                let wa = self.position + (a + shape.offset).rotated(self.angle);
                let wb = self.position + (b + shape.offset).rotated(self.angle);
                Aabb::new(wa.min(wb), wa.max(wb))
            }
            ShapeKind::Plane => Aabb::EVERYTHING,
        }
    }

    /// World-space AABB over all shapes
    pub fn aabb(&self) -> Aabb {
        let mut iter = self.shapes.iter();
        let Some(first) = iter.next() else {
            return Aabb::new(self.position, self.position);
        };
        iter.fold(self.shape_aabb(first), |acc, s| acc.merge(self.shape_aabb(s)))
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleep_state == SleepState::Sleeping
    }

    /// Wake the body and reset its sleep timer
    pub fn wake_up(&mut self) {
        self.sleep_state = SleepState::Awake;
        self.sleep_time = 0.0;
    }

    /// Put the body to sleep immediately, zeroing velocities
    pub fn sleep(&mut self) {
        self.sleep_state = SleepState::Sleeping;
        self.velocity = Vec2::ZERO;
        self.angular_velocity = 0.0;
    }

    /// Apply a force at the center of mass (accumulated until integration)
    pub fn apply_force(&mut self, force: Vec2) {
        self.force += force;
    }

    /// Apply an instantaneous impulse at a world point
    pub fn apply_impulse(&mut self, impulse: Vec2, world_point: Vec2) {
        self.velocity += impulse * self.inv_mass;
        self.angular_velocity +=
            self.inv_inertia * crate::math::cross(world_point - self.position, impulse);
    }

    /// Squared speed used by the sleep bookkeeping
    pub(crate) fn speed_squared(&self) -> f32 {
        self.velocity.length_squared() + self.angular_velocity * self.angular_velocity
    }
}
