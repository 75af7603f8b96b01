//! 2D rigid-body simulation: bodies, spatial-hash broadphase, contact
//! generation, the pooled-equation solver and the stepping world.

pub mod body;
pub mod broadphase;
pub mod narrowphase;
pub mod solver;
pub mod world;

pub use body::{
    Aabb, Body, BodyHandle, BodyType, ContactMaterialTable, ContactParams, Material, Shape,
    ShapeKind, SleepState,
};
pub use broadphase::SpatialHashBroadphase;
pub use narrowphase::Contact;
pub use solver::Solver;
pub use world::{
    Constraint, ConstraintHandle, ConstraintKind, PairKey, PhysicsWorld, Spring, SpringHandle,
    WorldEvent,
};
