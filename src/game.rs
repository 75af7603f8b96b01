//! The game: fixed-step scheduler, entity lifecycle and the dispatch bus
//!
//! The host calls [`Game::run_frame`] once per display frame. A
//! fractional accumulator converts frames into a whole number of fixed
//! ticks; every tick runs the same phase sequence at the same `dt`, so a
//! run is reproducible from its inputs regardless of display timing.
//!
//! Entity callbacks receive `&mut Game`. To make that borrow legal the
//! entity box is taken out of its record for the duration of the
//! callback and put back afterwards; an entity whose box is currently
//! out (it is the one executing) is skipped by dispatch and phase runs.

use std::collections::{BTreeSet, HashMap};

use crate::config::GameConfig;
use crate::contacts::ContactTracker;
use crate::entity::list::EntityRecord;
use crate::entity::{Caps, Entity, EntityId, EntityList, ShapeRef};
use crate::error::GameError;
use crate::events::{self, GameEvent};
use crate::physics::world::pair_key;
use crate::physics::{BodyHandle, Contact, PairKey, PhysicsWorld, WorldEvent};
use crate::renderer::{NullRenderer, Renderer};

/// A suspended callback owned by an entity.
struct Timer {
    owner: EntityId,
    remaining: f32,
    callback: Option<Box<dyn FnOnce(&mut Game)>>,
}

enum ContactPhase {
    Begin(Vec<Contact>),
    During,
    End,
}

/// The simulation root. Owns the entities, the physics world, the
/// renderer handle and the scheduler state.
pub struct Game {
    config: GameConfig,
    entities: EntityList,
    world: PhysicsWorld,
    renderer: Box<dyn Renderer>,
    tracker: ContactTracker,
    timers: Vec<Timer>,
    /// Entities marked destroyed, detached at the next sweep
    pending_removal: Vec<EntityId>,
    /// Entities that destroyed themselves mid-callback; their
    /// `on_destroy` hook runs at the sweep, once the box is back
    deferred_destroy_hooks: Vec<EntityId>,
    paused: bool,
    next_entity_id: u32,
    /// Fractional tick accumulator
    iterations_remaining: f32,
    frames: u64,
    ticks: u64,
}

impl Game {
    pub fn new(config: GameConfig) -> Self {
        Self::with_renderer(config, Box::new(NullRenderer::new()))
    }

    pub fn with_renderer(config: GameConfig, renderer: Box<dyn Renderer>) -> Self {
        let mut world = PhysicsWorld::new(
            config.gravity.into(),
            config.cell_size,
            config.solver_iterations,
        );
        world.sleep_enabled = config.sleep_enabled;
        Self {
            config,
            entities: EntityList::new(),
            world,
            renderer,
            tracker: ContactTracker::new(),
            timers: Vec::new(),
            pending_removal: Vec::new(),
            deferred_destroy_hooks: Vec::new(),
            paused: false,
            next_entity_id: 0,
            iterations_remaining: 0.0,
            frames: 0,
            ticks: 0,
        }
    }

    // --- accessors ---

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.world
    }

    pub fn renderer_mut(&mut self) -> &mut dyn Renderer {
        self.renderer.as_mut()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains(id) && !self.pending_removal.contains(&id)
    }

    /// Live ids declared with `tag` at add time
    pub fn tagged(&self, tag: &'static str) -> &[EntityId] {
        self.entities.tagged(tag)
    }

    /// Body handles attached to an entity, in `take_bodies` order
    pub fn bodies_of(&self, id: EntityId) -> &[BodyHandle] {
        self.entities
            .get(id)
            .map(|r| r.bodies.as_slice())
            .unwrap_or(&[])
    }

    pub fn slow_mo(&self) -> f32 {
        self.config.slow_mo
    }

    /// Set the time dilation factor. Must be in (0, 1].
    pub fn set_slow_mo(&mut self, slow_mo: f32) -> Result<(), GameError> {
        if !(slow_mo > 0.0 && slow_mo <= 1.0) {
            return Err(GameError::invalid(format!(
                "slow_mo must be in (0, 1], got {slow_mo}"
            )));
        }
        self.config.slow_mo = slow_mo;
        Ok(())
    }

    /// Change the quality preset and notify interested entities.
    pub fn set_quality(&mut self, quality: crate::config::QualityPreset) {
        self.config.quality = quality;
        self.dispatch(GameEvent::with_value(events::QUALITY, quality as u8 as f32));
    }

    /// Whether two shapes were touching as of the last tick
    pub fn is_touching(&self, a: ShapeRef, b: ShapeRef) -> bool {
        self.tracker
            .is_touching(&pair_key(a.body, a.shape, b.body, b.shape))
    }

    // --- scheduler ---

    /// Advance by one display frame: run the fixed ticks the accumulator
    /// releases, then the once-per-frame phases. `after_physics` runs
    /// after all sub-steps; rendering never pauses.
    pub fn run_frame(&mut self) {
        self.iterations_remaining += self.config.tick_iterations as f32 * self.config.slow_mo;
        let dt = self.config.tick_dt();
        while self.iterations_remaining >= 1.0 {
            self.iterations_remaining -= 1.0;
            self.tick(dt);
        }
        self.sweep();
        self.run_phase(Caps::AFTER_PHYSICS, true, |e, g, id| e.after_physics(g, id));
        self.sweep();
        self.run_phase(Caps::ON_RENDER, false, |e, g, id| e.on_render(g, id));
        self.renderer.render();
        self.frames += 1;
    }

    /// One fixed simulation tick. Every phase is preceded by a sweep so
    /// no phase sees an entity destroyed by an earlier one.
    fn tick(&mut self, dt: f32) {
        self.sweep();
        self.run_phase(Caps::BEFORE_TICK, true, |e, g, id| e.before_tick(g, id, dt));
        self.sweep();
        if !self.paused {
            self.poll_timers(dt);
        }
        self.sweep();
        self.run_phase(Caps::ON_TICK, true, |e, g, id| e.on_tick(g, id, dt));
        self.sweep();
        if !self.paused {
            self.world.step(dt);
            self.route_physics();
        }
        self.ticks += 1;
    }

    /// Pause the simulation. Physics stops entirely; pausable entities
    /// stop receiving tick phases. Idempotent.
    pub fn pause(&mut self) {
        if self.paused {
            return;
        }
        log::debug!("pausing at tick {}", self.ticks);
        self.paused = true;
        self.sweep();
        self.run_phase(Caps::ON_PAUSE, false, |e, g, id| e.on_pause(g, id));
    }

    pub fn unpause(&mut self) {
        if !self.paused {
            return;
        }
        log::debug!("unpausing at tick {}", self.ticks);
        self.paused = false;
        self.sweep();
        self.run_phase(Caps::ON_UNPAUSE, false, |e, g, id| e.on_unpause(g, id));
    }

    /// Run one phase over its filter list snapshot. `skip_pausable`
    /// phases drop pausable entities while the game is paused.
    fn run_phase(
        &mut self,
        cap: Caps,
        skip_pausable: bool,
        mut call: impl FnMut(&mut dyn Entity, &mut Game, EntityId),
    ) {
        let ids = self.entities.phase(cap).to_vec();
        for id in ids {
            if skip_pausable
                && self.paused
                && self.entities.get(id).is_none_or(|r| r.pausable)
            {
                continue;
            }
            self.with_entity(id, |e, g| call(e, g, id));
        }
    }

    /// Take-call-putback wrapper around one entity callback. Returns
    /// `None` when the entity is destroyed, pending removal, or currently
    /// executing another callback (its box is out).
    fn with_entity<R>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut dyn Entity, &mut Game) -> R,
    ) -> Option<R> {
        if self.pending_removal.contains(&id) {
            return None;
        }
        let mut entity = self.entities.take_entity(id)?;
        let result = f(entity.as_mut(), self);
        self.entities.put_entity(id, entity);
        Some(result)
    }

    // --- entity lifecycle ---

    /// Add an entity and wire up everything it declares.
    pub fn add_entity(&mut self, entity: impl Entity) -> EntityId {
        self.add_boxed(Box::new(entity), None)
    }

    /// Add an entity as a child of an existing one.
    pub fn add_child(
        &mut self,
        parent: EntityId,
        child: impl Entity,
    ) -> Result<EntityId, GameError> {
        if !self.contains(parent) {
            return Err(GameError::invalid(format!(
                "cannot add child: parent {parent:?} does not exist"
            )));
        }
        Ok(self.add_boxed(Box::new(child), Some(parent)))
    }

    /// Reparent an existing root entity under another. Fails when the
    /// child already has a parent.
    pub fn adopt(&mut self, parent: EntityId, child: EntityId) -> Result<(), GameError> {
        if !self.contains(parent) || !self.contains(child) {
            return Err(GameError::invalid("adopt: both entities must exist"));
        }
        if self.entities.get(child).and_then(|r| r.parent).is_some() {
            return Err(GameError::invalid(format!(
                "adopt: entity {child:?} already has a parent"
            )));
        }
        self.entities.get_mut(child).unwrap().parent = Some(parent);
        self.entities.get_mut(parent).unwrap().children.push(child);
        Ok(())
    }

    fn add_boxed(&mut self, mut entity: Box<dyn Entity>, parent: Option<EntityId>) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;

        let caps = entity.caps();
        let pausable = entity.pausable();
        let persistent = entity.persistent();
        let tags = entity.tags();
        let handled = entity.handled_events();

        entity.on_add(self, id);

        // Attachment wiring: bodies first (stamped with the owner), then
        // springs, constraints and sprites.
        let mut handles = Vec::new();
        for mut body in entity.take_bodies() {
            body.owner = Some(id);
            for shape in &mut body.shapes {
                if shape.owner.is_none() {
                    shape.owner = Some(id);
                }
            }
            handles.push(self.world.add_body(body));
        }
        entity.bodies_attached(&handles);
        for spring in entity.take_springs() {
            self.world.add_spring(spring);
        }
        for constraint in entity.take_constraints() {
            self.world.add_constraint(constraint);
        }
        let sprites = entity.sprites();
        for sprite in &sprites {
            self.renderer.add(*sprite);
        }
        let children = entity.take_children();

        self.entities.insert(
            id,
            EntityRecord {
                entity: Some(entity),
                caps,
                pausable,
                persistent,
                tags,
                handled,
                parent,
                children: Vec::new(),
                bodies: handles,
                sprites,
            },
        );
        if let Some(parent) = parent {
            if let Some(record) = self.entities.get_mut(parent) {
                record.children.push(id);
            }
        }

        self.with_entity(id, |e, g| e.after_added(g, id));

        for child in children {
            self.add_boxed(child, Some(id));
        }

        log::debug!("added entity {id:?} (tags {tags:?})");
        id
    }

    /// Request destruction of an entity and its subtree. Children are
    /// destroyed first. Idempotent: destroying an already-destroyed id
    /// is a no-op. The records detach at the next sweep. An entity may
    /// destroy itself from inside its own callback; its `on_destroy`
    /// hook then fires at the sweep.
    pub fn destroy_entity(&mut self, id: EntityId) -> Result<(), GameError> {
        if !self.entities.contains(id) || self.pending_removal.contains(&id) {
            return Ok(());
        }
        let children = self
            .entities
            .get(id)
            .map(|r| r.children.clone())
            .unwrap_or_default();
        for child in children {
            if !self.entities.contains(child) && !self.pending_removal.contains(&child) {
                return Err(GameError::inconsistent(
                    id,
                    format!("child link {child:?} points at no record"),
                ));
            }
            self.destroy_entity(child)?;
        }
        // The inverse link must hold too; a parent that lost track of
        // this child means the tree bookkeeping is broken.
        if let Some(parent) = self.entities.get(id).and_then(|r| r.parent) {
            let linked = self
                .entities
                .get(parent)
                .is_some_and(|r| r.children.contains(&id));
            if !linked && !self.pending_removal.contains(&parent) {
                return Err(GameError::inconsistent(
                    id,
                    format!("parent {parent:?} child list does not contain this entity"),
                ));
            }
        }
        if self.with_entity(id, |e, g| e.on_destroy(g, id)).is_none() {
            // The entity is destroying itself from inside one of its own
            // callbacks; the hook runs at the sweep instead.
            self.deferred_destroy_hooks.push(id);
        }
        self.timers.retain(|t| t.owner != id);
        self.pending_removal.push(id);
        log::debug!("destroyed entity {id:?}");
        Ok(())
    }

    /// Destroy every root entity not marked persistent, cascading into
    /// their subtrees. Persistent roots survive; used to reset the
    /// table between games.
    pub fn clear_entities(&mut self) -> Result<(), GameError> {
        let roots: Vec<EntityId> = self
            .entities
            .all()
            .iter()
            .copied()
            .filter(|id| {
                self.entities
                    .get(*id)
                    .is_some_and(|r| r.parent.is_none() && !r.persistent)
            })
            .collect();
        for id in roots {
            self.destroy_entity(id)?;
        }
        Ok(())
    }

    /// Detach every pending entity from all systems. Contact-end
    /// callbacks for their touching pairs reach the surviving side on
    /// the next tick via the tracker diff.
    fn sweep(&mut self) {
        if self.pending_removal.is_empty() {
            return;
        }
        let deferred = std::mem::take(&mut self.deferred_destroy_hooks);
        for id in deferred {
            if let Some(mut entity) = self.entities.take_entity(id) {
                entity.on_destroy(self, id);
                self.entities.put_entity(id, entity);
            }
        }
        let pending = std::mem::take(&mut self.pending_removal);
        for id in pending {
            let Some(record) = self.entities.remove(id) else {
                continue;
            };
            for handle in record.bodies {
                self.world.remove_body(handle);
            }
            for sprite in record.sprites {
                self.renderer.remove(sprite);
            }
            if let Some(parent) = record.parent {
                if let Some(parent_record) = self.entities.get_mut(parent) {
                    parent_record.children.retain(|c| *c != id);
                }
            }
        }
    }

    // --- timers ---

    /// Suspend a callback for `delay` seconds of simulated time. The
    /// callback is dropped if the owner is destroyed first, and timers
    /// freeze while the game is paused.
    pub fn wait(&mut self, owner: EntityId, delay: f32, callback: impl FnOnce(&mut Game) + 'static) {
        if !self.contains(owner) {
            log::warn!("wait: owner {owner:?} does not exist, dropping callback");
            return;
        }
        self.timers.push(Timer {
            owner,
            remaining: delay,
            callback: Some(Box::new(callback)),
        });
    }

    /// Cancel every suspended callback owned by `owner` without running it.
    pub fn clear_timers(&mut self, owner: EntityId) {
        self.timers.retain(|t| t.owner != owner);
    }

    fn poll_timers(&mut self, dt: f32) {
        for timer in &mut self.timers {
            timer.remaining -= dt;
        }
        // Collect due callbacks first: they get &mut Game and may add or
        // cancel timers themselves.
        let mut due = Vec::new();
        let mut i = 0;
        while i < self.timers.len() {
            if self.timers[i].remaining <= 0.0 {
                let timer = self.timers.remove(i);
                due.push((timer.owner, timer.callback));
            } else {
                i += 1;
            }
        }
        for (owner, callback) in due {
            // An earlier callback this tick may have destroyed the owner
            if !self.contains(owner) {
                continue;
            }
            if let Some(callback) = callback {
                callback(self);
            }
        }
    }

    // --- dispatch bus ---

    /// Deliver an event synchronously to every registered handler, in
    /// registration order. An entity dispatching from inside its own
    /// handler does not receive the event (its box is out).
    pub fn dispatch(&mut self, event: GameEvent) {
        let handlers = self.entities.handlers(event.kind).to_vec();
        for id in handlers {
            self.with_entity(id, |e, g| e.on_event(g, id, &event));
        }
    }

    // --- contact routing ---

    /// Convert the world's post-step state into entity callbacks:
    /// begin for new shape pairs (with contact points), impact once per
    /// new body pair, contacting for every touching pair, and end for
    /// pairs that separated.
    fn route_physics(&mut self) {
        let mut begin_points: HashMap<PairKey, Vec<Contact>> = HashMap::new();
        let mut impacts: Vec<(BodyHandle, BodyHandle)> = Vec::new();
        for event in self.world.drain_events() {
            match event {
                WorldEvent::BeginContact {
                    body_a,
                    shape_a,
                    body_b,
                    shape_b,
                    contacts,
                } => {
                    begin_points.insert(pair_key(body_a, shape_a, body_b, shape_b), contacts);
                }
                WorldEvent::Impact { body_a, body_b } => impacts.push((body_a, body_b)),
                // Separation callbacks are derived from the tracker diff,
                // which also covers bodies that were removed outright.
                WorldEvent::EndContact { .. } => {}
            }
        }

        let current: BTreeSet<PairKey> = self.world.touching_pairs().collect();
        let diff = self.tracker.update(current);

        for key in &diff.began {
            let points = begin_points.remove(key).unwrap_or_default();
            self.route_contact(*key, &ContactPhase::Begin(points));
        }
        for (body_a, body_b) in impacts {
            self.route_impact(body_a, body_b);
        }
        for key in &diff.during {
            self.route_contact(*key, &ContactPhase::During);
        }
        for key in &diff.ended {
            self.route_contact(*key, &ContactPhase::End);
        }
    }

    /// Entity resolved for a shape's contact callbacks: the shape owner,
    /// falling back to the body owner.
    fn shape_owner(&self, shape: ShapeRef) -> Option<EntityId> {
        let body = self.world.body(shape.body)?;
        body.shapes
            .get(shape.shape)
            .and_then(|s| s.owner)
            .or(body.owner)
    }

    fn route_contact(&mut self, key: PairKey, phase: &ContactPhase) {
        let (body_a, shape_a, body_b, shape_b) = key;
        let ref_a = ShapeRef {
            body: body_a,
            shape: shape_a,
        };
        let ref_b = ShapeRef {
            body: body_b,
            shape: shape_b,
        };
        let owner_a = self.shape_owner(ref_a);
        let owner_b = self.shape_owner(ref_b);

        if let Some(id) = owner_a {
            self.deliver_contact(id, owner_b, ref_a, ref_b, phase);
        }
        // Self-contact between two shapes of one entity is delivered once
        if let Some(id) = owner_b {
            if owner_a != Some(id) {
                self.deliver_contact(id, owner_a, ref_b, ref_a, phase);
            }
        }
    }

    fn deliver_contact(
        &mut self,
        id: EntityId,
        other: Option<EntityId>,
        own_shape: ShapeRef,
        other_shape: ShapeRef,
        phase: &ContactPhase,
    ) {
        self.with_entity(id, |e, g| match phase {
            ContactPhase::Begin(points) => {
                e.on_begin_contact(g, id, other, own_shape, other_shape, points)
            }
            ContactPhase::During => e.on_contacting(g, id, other, own_shape, other_shape),
            ContactPhase::End => e.on_end_contact(g, id, other, own_shape, other_shape),
        });
    }

    fn route_impact(&mut self, body_a: BodyHandle, body_b: BodyHandle) {
        let owner_a = self.world.body(body_a).and_then(|b| b.owner);
        let owner_b = self.world.body(body_b).and_then(|b| b.owner);
        if let Some(id) = owner_a {
            self.with_entity(id, |e, g| e.on_impact(g, id, owner_b));
        }
        if let Some(id) = owner_b {
            if owner_a != Some(id) {
                self.with_entity(id, |e, g| e.on_impact(g, id, owner_a));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::physics::{Body, Shape};

    type Log = Rc<RefCell<Vec<String>>>;

    /// Configurable test entity that records which hooks fired.
    struct Probe {
        log: Log,
        name: &'static str,
        caps: Caps,
        pausable: bool,
        handled: &'static [&'static str],
        bodies: Vec<Body>,
        children: Vec<Box<dyn Entity>>,
    }

    impl Probe {
        fn new(log: &Log, name: &'static str, caps: Caps) -> Self {
            Self {
                log: log.clone(),
                name,
                caps,
                pausable: true,
                handled: &[],
                bodies: Vec::new(),
                children: Vec::new(),
            }
        }

        fn record(&self, what: &str) {
            self.log.borrow_mut().push(format!("{}:{}", self.name, what));
        }
    }

    impl Entity for Probe {
        fn caps(&self) -> Caps {
            self.caps
        }
        fn pausable(&self) -> bool {
            self.pausable
        }
        fn handled_events(&self) -> &'static [&'static str] {
            self.handled
        }
        fn take_bodies(&mut self) -> Vec<Body> {
            std::mem::take(&mut self.bodies)
        }
        fn take_children(&mut self) -> Vec<Box<dyn Entity>> {
            std::mem::take(&mut self.children)
        }
        fn on_destroy(&mut self, _game: &mut Game, _me: EntityId) {
            self.record("destroy");
        }
        fn on_tick(&mut self, _game: &mut Game, _me: EntityId, _dt: f32) {
            self.record("tick");
        }
        fn on_render(&mut self, _game: &mut Game, _me: EntityId) {
            self.record("render");
        }
        fn on_pause(&mut self, _game: &mut Game, _me: EntityId) {
            self.record("pause");
        }
        fn on_begin_contact(
            &mut self,
            _game: &mut Game,
            _me: EntityId,
            _other: Option<EntityId>,
            _own: ShapeRef,
            _other_shape: ShapeRef,
            contacts: &[Contact],
        ) {
            assert!(!contacts.is_empty());
            self.record("begin");
        }
        fn on_contacting(
            &mut self,
            _game: &mut Game,
            _me: EntityId,
            _other: Option<EntityId>,
            _own: ShapeRef,
            _other_shape: ShapeRef,
        ) {
            self.record("contacting");
        }
        fn on_end_contact(
            &mut self,
            _game: &mut Game,
            _me: EntityId,
            _other: Option<EntityId>,
            _own: ShapeRef,
            _other_shape: ShapeRef,
        ) {
            self.record("end");
        }
        fn on_event(&mut self, _game: &mut Game, _me: EntityId, event: &GameEvent) {
            self.record(&format!("event-{}", event.kind));
        }
    }

    fn game() -> Game {
        Game::new(GameConfig::default())
    }

    fn count(log: &Log, entry: &str) -> usize {
        log.borrow().iter().filter(|e| *e == entry).count()
    }

    #[test]
    fn test_accumulator_concrete_scenario() {
        // 5 sub-steps per frame at 60 Hz: exactly 5 ticks, dt = 1/300
        let mut g = Game::new(GameConfig {
            framerate: 60.0,
            tick_iterations: 5,
            ..Default::default()
        });
        g.run_frame();
        assert_eq!(g.ticks(), 5);
        assert_eq!(g.frames(), 1);
    }

    #[test]
    fn test_slow_mo_scales_realized_ticks() {
        let mut g = game();
        g.set_slow_mo(0.5).unwrap();
        for _ in 0..10 {
            g.run_frame();
        }
        // 10 iterations per frame at half speed: 5 per frame on average
        assert_eq!(g.ticks(), 50);
        assert!(g.set_slow_mo(0.0).is_err());
        assert!(g.set_slow_mo(1.5).is_err());
    }

    #[test]
    fn test_pause_stops_pausable_entities_and_physics() {
        let log: Log = Default::default();
        let mut g = game();
        g.add_entity(Probe::new(&log, "a", Caps::ON_TICK | Caps::ON_PAUSE));
        let mut hud = Probe::new(&log, "hud", Caps::ON_TICK | Caps::ON_RENDER);
        hud.pausable = false;
        g.add_entity(hud);
        let ball = g.add_entity({
            let mut p = Probe::new(&log, "ball", Caps::NONE);
            p.bodies = vec![Body::dynamic(Vec2::ZERO, 1.0).with_shape(Shape::circle(0.5))];
            p
        });

        g.pause();
        assert_eq!(count(&log, "a:pause"), 1);
        g.run_frame();

        // Pausable entity never ticked, the HUD did, render always runs
        assert_eq!(count(&log, "a:tick"), 0);
        assert_eq!(count(&log, "hud:tick"), 10);
        assert_eq!(count(&log, "hud:render"), 1);
        // Physics did not advance
        let body = g.bodies_of(ball)[0];
        assert_eq!(g.world().body(body).unwrap().position, Vec2::ZERO);

        g.unpause();
        g.run_frame();
        assert_eq!(count(&log, "a:tick"), 10);
        assert!(g.world().body(body).unwrap().position.y < 0.0);
    }

    #[test]
    fn test_destroy_cascade_children_first() {
        let log: Log = Default::default();
        let mut g = game();
        let mut parent = Probe::new(&log, "parent", Caps::NONE);
        let mut first = Probe::new(&log, "first", Caps::NONE);
        first.children = vec![Box::new(Probe::new(&log, "grandchild", Caps::NONE))];
        parent.children = vec![
            Box::new(first),
            Box::new(Probe::new(&log, "second", Caps::NONE)),
        ];
        let parent_id = g.add_entity(parent);
        assert_eq!(g.entity_count(), 4);

        // Exactly four destroy invocations, children before parents
        g.destroy_entity(parent_id).unwrap();
        assert_eq!(
            log.borrow().as_slice(),
            [
                "grandchild:destroy",
                "first:destroy",
                "second:destroy",
                "parent:destroy"
            ]
        );
        // Idempotent; records fully detach at the next frame
        g.destroy_entity(parent_id).unwrap();
        g.run_frame();
        assert_eq!(g.entity_count(), 0);
    }

    #[test]
    fn test_add_child_and_adopt_validation() {
        let log: Log = Default::default();
        let mut g = game();
        let a = g.add_entity(Probe::new(&log, "a", Caps::NONE));
        let b = g.add_entity(Probe::new(&log, "b", Caps::NONE));
        let c = g.add_child(a, Probe::new(&log, "c", Caps::NONE)).unwrap();

        // c already has a parent
        assert!(matches!(
            g.adopt(b, c),
            Err(GameError::InvalidOperation { .. })
        ));
        g.adopt(a, b).unwrap();
        g.destroy_entity(a).unwrap();
        g.run_frame();
        assert_eq!(g.entity_count(), 0);
    }

    #[test]
    fn test_wait_fires_after_delay_and_cancels_on_destroy() {
        let log: Log = Default::default();
        // One tick per frame, so frames count ticks directly
        let mut g = Game::new(GameConfig {
            tick_iterations: 1,
            ..Default::default()
        });
        let a = g.add_entity(Probe::new(&log, "a", Caps::NONE));
        let b = g.add_entity(Probe::new(&log, "b", Caps::NONE));

        let fired: Log = Default::default();
        let f1 = fired.clone();
        let f2 = fired.clone();
        let dt = g.config().tick_dt();
        // Fires on the second tick
        g.wait(a, dt * 1.5, move |_| f1.borrow_mut().push("a-timer".into()));
        // Ten ticks out; the owner dies two ticks into the countdown
        g.wait(b, dt * 10.0, move |_| f2.borrow_mut().push("b-timer".into()));

        g.run_frame();
        g.run_frame();
        assert_eq!(fired.borrow().as_slice(), ["a-timer"]);
        g.destroy_entity(b).unwrap();
        for _ in 0..20 {
            g.run_frame();
        }
        // The abandoned callback never resolves, silently
        assert_eq!(fired.borrow().as_slice(), ["a-timer"]);
    }

    #[test]
    fn test_clear_timers() {
        let log: Log = Default::default();
        let mut g = game();
        let a = g.add_entity(Probe::new(&log, "a", Caps::NONE));
        let fired: Log = Default::default();
        let f = fired.clone();
        g.wait(a, 0.0, move |_| f.borrow_mut().push("late".into()));
        g.clear_timers(a);
        g.run_frame();
        assert!(fired.borrow().is_empty());
    }

    #[test]
    fn test_timer_callback_can_mutate_game() {
        let log: Log = Default::default();
        let mut g = game();
        let a = g.add_entity(Probe::new(&log, "a", Caps::NONE));
        g.wait(a, 0.0, move |game| {
            game.dispatch(GameEvent::new(events::NUDGE));
        });
        let mut listener = Probe::new(&log, "listener", Caps::NONE);
        listener.handled = &[events::NUDGE];
        g.add_entity(listener);
        g.run_frame();
        assert_eq!(count(&log, "listener:event-nudge"), 1);
    }

    #[test]
    fn test_dispatch_registration_order() {
        let log: Log = Default::default();
        let mut g = game();
        for name in ["first", "second", "third"] {
            let mut p = Probe::new(&log, name, Caps::NONE);
            p.handled = &[events::SCORE];
            g.add_entity(p);
        }
        g.dispatch(GameEvent::with_value(events::SCORE, 100.0));
        assert_eq!(
            log.borrow().as_slice(),
            ["first:event-score", "second:event-score", "third:event-score"]
        );
    }

    #[test]
    fn test_contact_callbacks_route_to_body_owner() {
        let log: Log = Default::default();
        let mut g = Game::new(GameConfig {
            gravity: (0.0, 0.0),
            ..Default::default()
        });
        let mut wall = Probe::new(&log, "wall", Caps::NONE);
        wall.bodies = vec![Body::static_at(Vec2::ZERO)
            .with_shape(Shape::segment(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0)))];
        g.add_entity(wall);

        let mut ball = Probe::new(&log, "ball", Caps::NONE);
        let mut body = Body::dynamic(Vec2::new(0.0, 2.0), 1.0).with_shape(Shape::circle(0.5));
        body.velocity = Vec2::new(0.0, -6.0);
        body.damping = 0.0;
        ball.bodies = vec![body];
        g.add_entity(ball);

        for _ in 0..60 {
            g.run_frame();
        }
        // One bounce: both sides saw exactly one begin and one end, and
        // at least as many contacting ticks as begins
        assert_eq!(count(&log, "ball:begin"), 1);
        assert_eq!(count(&log, "wall:begin"), 1);
        assert_eq!(count(&log, "ball:end"), 1);
        assert_eq!(count(&log, "wall:end"), 1);
        assert!(count(&log, "ball:contacting") >= 1);
    }

    #[test]
    fn test_destroyed_entity_gets_no_callbacks_same_tick() {
        let log: Log = Default::default();
        let mut g = game();

        struct Assassin {
            victim: EntityId,
        }
        impl Entity for Assassin {
            fn caps(&self) -> Caps {
                Caps::BEFORE_TICK
            }
            fn before_tick(&mut self, game: &mut Game, _me: EntityId, _dt: f32) {
                game.destroy_entity(self.victim).unwrap();
            }
        }

        let victim = g.add_entity(Probe::new(&log, "victim", Caps::ON_TICK));
        g.add_entity(Assassin { victim });
        g.run_frame();
        // Destroyed in before_tick of the first tick: on_tick never fires
        assert_eq!(count(&log, "victim:tick"), 0);
    }

    #[test]
    fn test_self_destruction_still_fires_on_destroy() {
        struct OneShot {
            log: Log,
        }
        impl Entity for OneShot {
            fn caps(&self) -> Caps {
                Caps::ON_TICK
            }
            fn on_tick(&mut self, game: &mut Game, me: EntityId, _dt: f32) {
                self.log.borrow_mut().push("tick".into());
                game.destroy_entity(me).unwrap();
            }
            fn on_destroy(&mut self, _game: &mut Game, _me: EntityId) {
                self.log.borrow_mut().push("destroy".into());
            }
        }

        let log: Log = Default::default();
        let mut g = game();
        g.add_entity(OneShot { log: log.clone() });
        g.run_frame();
        // Ticked once, then the deferred hook ran exactly once
        assert_eq!(log.borrow().as_slice(), ["tick", "destroy"]);
        assert_eq!(g.entity_count(), 0);
    }

    #[test]
    fn test_clear_entities_spares_persistent() {
        struct Scoreboard;
        impl Entity for Scoreboard {
            fn persistent(&self) -> bool {
                true
            }
        }

        let log: Log = Default::default();
        let mut g = game();
        g.add_entity(Probe::new(&log, "ball", Caps::NONE));
        let keep = g.add_entity(Scoreboard);
        let table = g.add_entity(Probe::new(&log, "table", Caps::NONE));
        g.add_child(table, Probe::new(&log, "bumper", Caps::NONE))
            .unwrap();

        g.clear_entities().unwrap();
        g.run_frame();
        assert!(g.contains(keep));
        assert_eq!(g.entity_count(), 1);
        assert_eq!(count(&log, "ball:destroy"), 1);
        assert_eq!(count(&log, "bumper:destroy"), 1);
        assert_eq!(count(&log, "table:destroy"), 1);
    }
}
