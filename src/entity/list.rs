//! Entity list and its incrementally-maintained indices
//!
//! The list is the single source of truth for live entities. Every
//! derived view (per-phase filter lists, tag multimap, handler multimap)
//! is updated inside `insert`/`remove`, never rebuilt by scanning. A
//! membership missed on removal would mean stale events firing on
//! destroyed entities, so insert/remove touch every index or none.

use std::collections::HashMap;
use std::hash::Hash;

use super::{Caps, Entity, EntityId};
use crate::physics::BodyHandle;
use crate::renderer::SpriteId;

/// Live filtered view over inserted items.
///
/// Membership is decided once, when the item is inserted, by a predicate
/// over the item's metadata. Iteration order is insertion order.
pub struct FilterList<T, M> {
    predicate: fn(&M) -> bool,
    items: Vec<T>,
}

impl<T: PartialEq + Copy, M> FilterList<T, M> {
    pub fn new(predicate: fn(&M) -> bool) -> Self {
        Self {
            predicate,
            items: Vec::new(),
        }
    }

    /// Insert `item` if its metadata passes the filter. The predicate is
    /// never re-evaluated afterwards.
    pub fn insert(&mut self, item: T, meta: &M) {
        if (self.predicate)(meta) {
            self.items.push(item);
        }
    }

    /// Remove `item` if present. Returns whether it was a member.
    pub fn remove(&mut self, item: T) -> bool {
        if let Some(pos) = self.items.iter().position(|i| *i == item) {
            self.items.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, item: T) -> bool {
        self.items.contains(&item)
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Multimap from a key to an insertion-ordered list of values.
pub struct ListMap<K, V> {
    map: HashMap<K, Vec<V>>,
    empty: Vec<V>,
}

impl<K: Eq + Hash + Copy, V: PartialEq + Copy> ListMap<K, V> {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            empty: Vec::new(),
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.map.entry(key).or_default().push(value);
    }

    /// Remove one `value` under `key`. Returns whether it was present.
    pub fn remove(&mut self, key: K, value: V) -> bool {
        let Some(values) = self.map.get_mut(&key) else {
            return false;
        };
        let Some(pos) = values.iter().position(|v| *v == value) else {
            return false;
        };
        values.remove(pos);
        if values.is_empty() {
            self.map.remove(&key);
        }
        true
    }

    /// Values under `key`, in registration order. Callers that mutate the
    /// entity set while iterating must copy this slice first.
    pub fn get(&self, key: K) -> &[V] {
        self.map.get(&key).unwrap_or(&self.empty)
    }
}

impl<K: Eq + Hash + Copy, V: PartialEq + Copy> Default for ListMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-entity bookkeeping captured at add time.
pub struct EntityRecord {
    /// The entity itself. Taken out while one of its callbacks runs and
    /// put back afterwards, so callbacks can borrow the whole game.
    pub(crate) entity: Option<Box<dyn Entity>>,
    pub(crate) caps: Caps,
    pub(crate) pausable: bool,
    /// Survives `Game::clear_entities`
    pub(crate) persistent: bool,
    pub(crate) tags: &'static [&'static str],
    pub(crate) handled: &'static [&'static str],
    pub(crate) parent: Option<EntityId>,
    pub(crate) children: Vec<EntityId>,
    pub(crate) bodies: Vec<BodyHandle>,
    pub(crate) sprites: Vec<SpriteId>,
}

/// The authoritative entity set plus derived indices.
pub struct EntityList {
    records: HashMap<EntityId, EntityRecord>,
    /// Insertion order of live ids; kept for deterministic iteration
    order: Vec<EntityId>,
    /// One filter list per phase capability, indexed by `Caps::index`
    phase: [FilterList<EntityId, EntityRecord>; 6],
    by_tag: ListMap<&'static str, EntityId>,
    by_handler: ListMap<&'static str, EntityId>,
}

impl EntityList {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
            phase: [
                FilterList::new(|r: &EntityRecord| r.caps.contains(Caps::BEFORE_TICK)),
                FilterList::new(|r: &EntityRecord| r.caps.contains(Caps::ON_TICK)),
                FilterList::new(|r: &EntityRecord| r.caps.contains(Caps::AFTER_PHYSICS)),
                FilterList::new(|r: &EntityRecord| r.caps.contains(Caps::ON_RENDER)),
                FilterList::new(|r: &EntityRecord| r.caps.contains(Caps::ON_PAUSE)),
                FilterList::new(|r: &EntityRecord| r.caps.contains(Caps::ON_UNPAUSE)),
            ],
            by_tag: ListMap::new(),
            by_handler: ListMap::new(),
        }
    }

    /// Register an entity in the set and every derived index.
    pub fn insert(&mut self, id: EntityId, record: EntityRecord) {
        debug_assert!(!self.records.contains_key(&id), "entity id reused");
        for list in &mut self.phase {
            list.insert(id, &record);
        }
        for tag in record.tags {
            self.by_tag.insert(tag, id);
        }
        for kind in record.handled {
            self.by_handler.insert(kind, id);
        }
        self.order.push(id);
        self.records.insert(id, record);
    }

    /// Remove an entity from the set and every derived index.
    pub fn remove(&mut self, id: EntityId) -> Option<EntityRecord> {
        let record = self.records.remove(&id)?;
        if let Some(pos) = self.order.iter().position(|i| *i == id) {
            self.order.remove(pos);
        }
        for list in &mut self.phase {
            list.remove(id);
        }
        for tag in record.tags {
            self.by_tag.remove(tag, id);
        }
        for kind in record.handled {
            self.by_handler.remove(kind, id);
        }
        Some(record)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&EntityRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut EntityRecord> {
        self.records.get_mut(&id)
    }

    /// Borrow the entity out of its record for a callback.
    pub(crate) fn take_entity(&mut self, id: EntityId) -> Option<Box<dyn Entity>> {
        self.records.get_mut(&id).and_then(|r| r.entity.take())
    }

    /// Return the entity after its callback. If the record is gone (the
    /// entity removed itself mid-callback and was swept), the box drops.
    pub(crate) fn put_entity(&mut self, id: EntityId, entity: Box<dyn Entity>) {
        if let Some(record) = self.records.get_mut(&id) {
            record.entity = Some(entity);
        }
    }

    /// All live ids in insertion order
    pub fn all(&self) -> &[EntityId] {
        &self.order
    }

    /// Ids participating in the given phase, in add order
    pub fn phase(&self, cap: Caps) -> &[EntityId] {
        self.phase[cap.index()].items()
    }

    /// Ids declared with `tag` at add time
    pub fn tagged(&self, tag: &'static str) -> &[EntityId] {
        self.by_tag.get(tag)
    }

    /// Ids handling the given event kind, in registration order
    pub fn handlers(&self, kind: &'static str) -> &[EntityId] {
        self.by_handler.get(kind)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for EntityList {
    fn default() -> Self {
        Self::new()
    }
}
