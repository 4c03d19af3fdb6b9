//! ECS World (§4.7, §3 Data Model): entities with a sparse component table
//! and a tag set, queried by component code. The core's ECS is
//! deliberately simpler than an archetype-based engine framework (no
//! derive macros, no systems scheduler) — §4.7 asks only for
//! `create/destroy`, `add/get/remove(code, value)`, `tag/hasTag/untag`,
//! and `query(...codes)`, and §9 explicitly scopes dynamic-dispatch
//! engine machinery out of the core.

use crate::building::Building;
use crate::character::CharacterState;
use fixedbitset::FixedBitSet;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// Dense integer entity id, monotonically assigned by the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// One variant per component fragment row in §3's data model table. Used
/// as the ECS's sparse-table key and as the tag-set index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Player,
    ItemPhysics,
    Health,
    Stamina,
    ActiveBuffs,
    Armor,
    Helmet,
    Shootable,
    Ammo,
    WeaponType,
    Collected,
    PickupEffect,
    Building,
    Projectile,
}

pub const COMPONENT_KIND_COUNT: usize = 14;

impl ComponentKind {
    fn index(self) -> usize {
        match self {
            ComponentKind::Player => 0,
            ComponentKind::ItemPhysics => 1,
            ComponentKind::Health => 2,
            ComponentKind::Stamina => 3,
            ComponentKind::ActiveBuffs => 4,
            ComponentKind::Armor => 5,
            ComponentKind::Helmet => 6,
            ComponentKind::Shootable => 7,
            ComponentKind::Ammo => 8,
            ComponentKind::WeaponType => 9,
            ComponentKind::Collected => 10,
            ComponentKind::PickupEffect => 11,
            ComponentKind::Building => 12,
            ComponentKind::Projectile => 13,
        }
    }
}

/// Tags (§3: "Tags: Collectable"). Each variant owns one [`FixedBitSet`]
/// indexed by the entity's dense slot, growing as entities are created —
/// the teacher's `fixedbitset` dependency, used here the way it's meant to
/// be: a packed membership set rather than a per-entity byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Collectable,
}

const TAG_COUNT: usize = 1;

impl Tag {
    fn index(self) -> usize {
        match self {
            Tag::Collectable => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerComponent {
    pub state: CharacterState,
    pub last_processed_input: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemPhysics {
    pub pos: crate::math::FixedVec3,
    pub vel: crate::math::FixedVec3,
    pub size: crate::math::FixedNum,
    pub on_ground: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stamina {
    pub current: crate::math::FixedNum,
    pub max: crate::math::FixedNum,
    pub is_exhausted: bool,
    pub exhausted_at: crate::math::FixedNum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuffType {
    Speed,
    Damage,
    Regen,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveBuff {
    pub kind: BuffType,
    pub start_time: crate::math::FixedNum,
    pub duration: crate::math::FixedNum,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveBuffs(pub Vec<ActiveBuff>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Armor {
    pub current: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Helmet {
    pub has_helmet: bool,
    pub helmet_health: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shootable {
    pub damage: i32,
    pub fire_rate: crate::math::FixedNum,
    pub speed: crate::math::FixedNum,
    pub accuracy: crate::math::FixedNum,
    pub gravity_start_distance: crate::math::FixedNum,
    pub pellets_per_shot: u32,
    pub current_bloom: crate::math::FixedNum,
    pub proximity_radius: crate::math::FixedNum,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ammo {
    pub current: i32,
    pub capacity: i32,
    pub reload_time: crate::math::FixedNum,
    pub is_reloading: bool,
    pub reload_start_time: crate::math::FixedNum,
    pub infinite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponType {
    Pistol,
    Smg,
    Lmg,
    Shotgun,
    DoubleBarrel,
    Sniper,
    Assault,
    Dmr,
    Rocket,
    Hammer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collected(pub Vec<EntityId>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickupKind {
    Health,
    Stamina,
    Buff,
    ArmorPickup,
    HelmetPickup,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PickupEffect {
    pub kind: PickupKind,
    pub value: i32,
    pub buff_type: Option<BuffType>,
    pub buff_duration: Option<crate::math::FixedNum>,
}

/// Erased component storage: `Any` downcast keeps per-kind storage
/// strongly typed at the call site while the table itself stays generic
/// over `ComponentKind`, matching §4.7's `add/get/remove(code, value)`
/// contract without an enum-of-every-component match arm per operation.
type Slot = Box<dyn Any + Send + Sync>;

#[derive(Default)]
struct EntityRecord {
    components: [Option<Slot>; COMPONENT_KIND_COUNT],
}

/// Sparse-set ECS world. Owns all entities and components (§3
/// "Ownership: ECS owns entities and components").
#[derive(Default)]
pub struct World {
    next_id: u64,
    entities: FxHashMap<EntityId, EntityRecord>,
    tags: [FixedBitSet; TAG_COUNT],
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_entity(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.insert(id, EntityRecord::default());
        for set in &mut self.tags {
            if set.len() <= id.0 as usize {
                set.grow(id.0 as usize + 1);
            }
        }
        id
    }

    /// Frees all components and tags for `id`. Dependent caches (pickup
    /// grid entries, derived building colliders) are the owning systems'
    /// responsibility to drop — the world itself only owns the component
    /// table (§4.7 "dependent caches ... are notified by the owning
    /// system").
    pub fn destroy_entity(&mut self, id: EntityId) {
        self.entities.remove(&id);
        for set in &mut self.tags {
            if (id.0 as usize) < set.len() {
                set.set(id.0 as usize, false);
            }
        }
    }

    pub fn exists(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn add<T: 'static + Send + Sync>(&mut self, id: EntityId, kind: ComponentKind, value: T) {
        if let Some(rec) = self.entities.get_mut(&id) {
            rec.components[kind.index()] = Some(Box::new(value));
        }
    }

    pub fn get<T: 'static>(&self, id: EntityId, kind: ComponentKind) -> Option<&T> {
        self.entities
            .get(&id)?
            .components[kind.index()]
            .as_ref()?
            .downcast_ref::<T>()
    }

    pub fn get_mut<T: 'static>(&mut self, id: EntityId, kind: ComponentKind) -> Option<&mut T> {
        self.entities
            .get_mut(&id)?
            .components[kind.index()]
            .as_mut()?
            .downcast_mut::<T>()
    }

    pub fn remove<T: 'static>(&mut self, id: EntityId, kind: ComponentKind) -> Option<Box<T>> {
        let rec = self.entities.get_mut(&id)?;
        let slot = rec.components[kind.index()].take()?;
        slot.downcast::<T>().ok()
    }

    pub fn has(&self, id: EntityId, kind: ComponentKind) -> bool {
        self.entities
            .get(&id)
            .map(|r| r.components[kind.index()].is_some())
            .unwrap_or(false)
    }

    pub fn tag(&mut self, id: EntityId, tag: Tag) {
        if self.exists(id) {
            self.tags[tag.index()].set(id.0 as usize, true);
        }
    }

    pub fn untag(&mut self, id: EntityId, tag: Tag) {
        if (id.0 as usize) < self.tags[tag.index()].len() {
            self.tags[tag.index()].set(id.0 as usize, false);
        }
    }

    pub fn has_tag(&self, id: EntityId, tag: Tag) -> bool {
        let set = &self.tags[tag.index()];
        (id.0 as usize) < set.len() && set[id.0 as usize]
    }

    /// Every entity possessing all of `kinds`.
    pub fn query(&self, kinds: &[ComponentKind]) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, rec)| kinds.iter().all(|k| rec.components[k.index()].is_some()))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn iter_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    pub fn building_mut(&mut self, id: EntityId) -> Option<&mut Building> {
        self.get_mut::<Building>(id, ComponentKind::Building)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_add_get_remove_round_trips() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add(e, ComponentKind::Health, Health { current: 100, max: 100 });
        assert_eq!(world.get::<Health>(e, ComponentKind::Health).unwrap().current, 100);
        let removed = world.remove::<Health>(e, ComponentKind::Health).unwrap();
        assert_eq!(removed.current, 100);
        assert!(world.get::<Health>(e, ComponentKind::Health).is_none());
    }

    #[test]
    fn destroy_entity_frees_components_and_tags() {
        let mut world = World::new();
        let e = world.create_entity();
        world.add(e, ComponentKind::Health, Health { current: 1, max: 1 });
        world.tag(e, Tag::Collectable);
        world.destroy_entity(e);
        assert!(!world.exists(e));
        assert!(!world.has_tag(e, Tag::Collectable));
    }

    #[test]
    fn query_returns_only_entities_with_all_components() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();
        world.add(a, ComponentKind::Health, Health { current: 1, max: 1 });
        world.add(a, ComponentKind::Armor, Armor { current: 0, max: 10 });
        world.add(b, ComponentKind::Health, Health { current: 1, max: 1 });

        let both = world.query(&[ComponentKind::Health, ComponentKind::Armor]);
        assert_eq!(both, vec![a]);
    }

    #[test]
    fn tag_set_is_independent_per_entity() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();
        world.tag(a, Tag::Collectable);
        assert!(world.has_tag(a, Tag::Collectable));
        assert!(!world.has_tag(b, Tag::Collectable));
        world.untag(a, Tag::Collectable);
        assert!(!world.has_tag(a, Tag::Collectable));
    }
}
