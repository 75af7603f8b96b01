//! Entity contract
//!
//! An entity is a capability bag, not a class hierarchy: every method on
//! [`Entity`] has a default no-op body, and an entity participates in a
//! loop phase only when the corresponding bit in [`Entity::caps`] is set.
//! Capabilities are read once when the entity is added and never
//! re-evaluated, which is what lets the entity list keep its per-phase
//! filter views incremental.

pub mod list;

pub use list::{EntityList, FilterList, ListMap};

use std::ops::{BitOr, BitOrAssign};

use crate::events::GameEvent;
use crate::game::Game;
use crate::physics::{Body, BodyHandle, Constraint, Contact, Spring};
use crate::renderer::SpriteId;

/// Stable identifier for an added entity. Never reused within a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) u32);

/// Identifies one shape on one body, for contact callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeRef {
    pub body: BodyHandle,
    pub shape: usize,
}

/// Phase-participation bitmask, fixed at add time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Caps(u8);

impl Caps {
    pub const NONE: Caps = Caps(0);
    pub const BEFORE_TICK: Caps = Caps(1);
    pub const ON_TICK: Caps = Caps(1 << 1);
    pub const AFTER_PHYSICS: Caps = Caps(1 << 2);
    pub const ON_RENDER: Caps = Caps(1 << 3);
    pub const ON_PAUSE: Caps = Caps(1 << 4);
    pub const ON_UNPAUSE: Caps = Caps(1 << 5);

    /// All phase capabilities, in scheduler order
    pub const ALL: [Caps; 6] = [
        Caps::BEFORE_TICK,
        Caps::ON_TICK,
        Caps::AFTER_PHYSICS,
        Caps::ON_RENDER,
        Caps::ON_PAUSE,
        Caps::ON_UNPAUSE,
    ];

    #[inline]
    pub fn contains(self, other: Caps) -> bool {
        self.0 & other.0 == other.0
    }

    /// Index of a single-bit capability into per-phase filter arrays
    pub(crate) fn index(self) -> usize {
        debug_assert_eq!(self.0.count_ones(), 1);
        self.0.trailing_zeros() as usize
    }
}

impl BitOr for Caps {
    type Output = Caps;
    fn bitor(self, rhs: Caps) -> Caps {
        Caps(self.0 | rhs.0)
    }
}

impl BitOrAssign for Caps {
    fn bitor_assign(&mut self, rhs: Caps) {
        self.0 |= rhs.0;
    }
}

/// A polymorphic game object.
///
/// Everything is optional: implement only the hooks that apply and
/// declare the matching phase bits in [`Entity::caps`]. The `take_*`
/// methods are consumed exactly once by [`Game::add_entity`] and move
/// their declarations into the owning systems (physics world, renderer,
/// entity tree).
#[allow(unused_variables)]
pub trait Entity: 'static {
    /// Phases this entity participates in (read once at add time)
    fn caps(&self) -> Caps {
        Caps::NONE
    }

    /// Whether ticking stops for this entity while the game is paused.
    /// Non-pausable entities (e.g. pause-menu UI) keep ticking.
    fn pausable(&self) -> bool {
        true
    }

    /// Survives `Game::clear_entities` table resets
    fn persistent(&self) -> bool {
        false
    }

    /// Tags for `Game::tagged` lookup (read once at add time)
    fn tags(&self) -> &'static [&'static str] {
        &[]
    }

    /// Event kinds this entity handles (read once at add time)
    fn handled_events(&self) -> &'static [&'static str] {
        &[]
    }

    /// Render primitives to register with the renderer at add time
    fn sprites(&self) -> Vec<SpriteId> {
        Vec::new()
    }

    /// Physics bodies to move into the world at add time. The game stamps
    /// this entity as owner on each.
    fn take_bodies(&mut self) -> Vec<Body> {
        Vec::new()
    }

    /// Springs to attach at add time
    fn take_springs(&mut self) -> Vec<Spring> {
        Vec::new()
    }

    /// Constraints to attach at add time
    fn take_constraints(&mut self) -> Vec<Constraint> {
        Vec::new()
    }

    /// Children to add (and parent to this entity) at add time
    fn take_children(&mut self) -> Vec<Box<dyn Entity>> {
        Vec::new()
    }

    /// Handles for the bodies taken by `take_bodies`, in the same order
    fn bodies_attached(&mut self, handles: &[BodyHandle]) {}

    // --- lifecycle hooks ---

    /// Runs before any attachment wiring
    fn on_add(&mut self, game: &mut Game, me: EntityId) {}
    /// Runs after bodies/sprites/indices are wired, before children
    fn after_added(&mut self, game: &mut Game, me: EntityId) {}
    /// Runs when destruction is requested, children-first
    fn on_destroy(&mut self, game: &mut Game, me: EntityId) {}

    // --- phase hooks (gated by caps) ---

    fn before_tick(&mut self, game: &mut Game, me: EntityId, dt: f32) {}
    fn on_tick(&mut self, game: &mut Game, me: EntityId, dt: f32) {}
    fn after_physics(&mut self, game: &mut Game, me: EntityId) {}
    fn on_render(&mut self, game: &mut Game, me: EntityId) {}
    fn on_pause(&mut self, game: &mut Game, me: EntityId) {}
    fn on_unpause(&mut self, game: &mut Game, me: EntityId) {}

    // --- physics contact hooks (routed by owner, no registration) ---

    /// A shape owned by this entity started touching another shape
    fn on_begin_contact(
        &mut self,
        game: &mut Game,
        me: EntityId,
        other: Option<EntityId>,
        own_shape: ShapeRef,
        other_shape: ShapeRef,
        contacts: &[Contact],
    ) {
    }

    /// Fires once per tick while the contact persists
    fn on_contacting(
        &mut self,
        game: &mut Game,
        me: EntityId,
        other: Option<EntityId>,
        own_shape: ShapeRef,
        other_shape: ShapeRef,
    ) {
    }

    /// The contact from `on_begin_contact` ended
    fn on_end_contact(
        &mut self,
        game: &mut Game,
        me: EntityId,
        other: Option<EntityId>,
        own_shape: ShapeRef,
        other_shape: ShapeRef,
    ) {
    }

    /// Coarse body-level first-impact event for gameplay triggers
    fn on_impact(&mut self, game: &mut Game, me: EntityId, other: Option<EntityId>) {}

    // --- custom events ---

    /// Receives events whose kind appears in `handled_events`
    fn on_event(&mut self, game: &mut Game, me: EntityId, event: &GameEvent) {}
}
