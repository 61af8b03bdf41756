use tracing::{debug, warn};

use crate::level::{LevelId, LevelWorld};
use crate::session_state::{EntityKind, LevelSnapshot, SnapshotEntry};

/// Last-known savable state of one registered entity. Notifications arrive
/// before the entity instance itself changes, so this record stays
/// authoritative even if the instance is destroyed a moment later.
#[derive(Debug, Clone, PartialEq)]
struct TrackedEntity {
    unique_id: String,
    kind: EntityKind,
    present_or_active: bool,
    examined: bool,
}

/// Outcome counts for one [`LevelEntityRegistry::apply_snapshot`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotApplyStats {
    pub total: u32,
    pub applied: u32,
    pub removed: u32,
    pub absent_unmatched: u32,
    pub missing_expected: u32,
}

/// Tracks savable entities for exactly one loaded level instance.
///
/// A capture includes every entity ever registered in this instance, not just
/// the ones still present, so a permanently consumed item stays consumed when
/// the level is revisited.
#[derive(Default)]
pub struct LevelEntityRegistry {
    tracked: Vec<TrackedEntity>,
}

impl LevelEntityRegistry {
    fn find_tracked(&self, unique_id: &str) -> Option<&TrackedEntity> {
        self.tracked
            .iter()
            .find(|tracked| tracked.unique_id == unique_id)
    }

    fn find_tracked_mut(&mut self, unique_id: &str) -> Option<&mut TrackedEntity> {
        self.tracked
            .iter_mut()
            .find(|tracked| tracked.unique_id == unique_id)
    }

    pub fn is_registered(&self, unique_id: &str) -> bool {
        self.find_tracked(unique_id).is_some()
    }

    pub fn registered_count(&self) -> usize {
        self.tracked.len()
    }

    /// Called by an entity during its own initialization. A duplicate unique
    /// id within the same level instance is rejected, never silently
    /// overwritten.
    pub fn register_entity(
        &mut self,
        unique_id: &str,
        kind: EntityKind,
        initially_active: bool,
    ) -> bool {
        if self.is_registered(unique_id) {
            warn!(unique_id, "duplicate_entity_registration_rejected");
            return false;
        }
        self.tracked.push(TrackedEntity {
            unique_id: unique_id.to_string(),
            kind,
            present_or_active: initially_active,
            examined: false,
        });
        debug!(unique_id, kind = ?kind, "entity_registered");
        true
    }

    /// Marks the entity absent for every future snapshot. The record is kept.
    pub fn notify_entity_removed(&mut self, unique_id: &str) {
        match self.find_tracked_mut(unique_id) {
            Some(tracked) => {
                tracked.present_or_active = false;
                debug!(unique_id, "entity_marked_removed");
            }
            None => warn!(unique_id, "removal_notified_for_unregistered_id"),
        }
    }

    pub fn notify_entity_active_state_changed(&mut self, unique_id: &str, is_active: bool) {
        match self.find_tracked_mut(unique_id) {
            Some(tracked) => tracked.present_or_active = is_active,
            None => warn!(unique_id, "active_change_notified_for_unregistered_id"),
        }
    }

    pub fn notify_item_examined(&mut self, unique_id: &str) {
        match self.find_tracked_mut(unique_id) {
            Some(tracked) => tracked.examined = true,
            None => warn!(unique_id, "examine_notified_for_unregistered_id"),
        }
    }

    pub fn capture_snapshot(&self) -> LevelSnapshot {
        LevelSnapshot {
            entries: self
                .tracked
                .iter()
                .map(|tracked| SnapshotEntry {
                    unique_id: tracked.unique_id.clone(),
                    kind: tracked.kind,
                    present_or_active: tracked.present_or_active,
                    examined: tracked.examined,
                })
                .collect(),
        }
    }

    /// Re-applies a snapshot to the entities found in `world`, scanning
    /// fresh per entry. An absent entry with no matching entity is the
    /// normal case; a present entry with no matching entity means the level
    /// content no longer has an entity the snapshot expects, which is
    /// reported and skipped.
    pub fn apply_snapshot(
        &mut self,
        snapshot: &LevelSnapshot,
        world: &mut LevelWorld,
    ) -> SnapshotApplyStats {
        let mut stats = SnapshotApplyStats::default();
        for entry in &snapshot.entries {
            stats.total = stats.total.saturating_add(1);

            if world.find_entity(&entry.unique_id).is_none() {
                if entry.present_or_active {
                    warn!(
                        level = %world.level(),
                        unique_id = %entry.unique_id,
                        "snapshot_expected_entity_missing"
                    );
                    stats.missing_expected = stats.missing_expected.saturating_add(1);
                } else {
                    stats.absent_unmatched = stats.absent_unmatched.saturating_add(1);
                }
                continue;
            }

            if entry.kind == EntityKind::Item && !entry.present_or_active {
                world.remove_entity(&entry.unique_id);
                stats.removed = stats.removed.saturating_add(1);
            } else if let Some(entity) = world.find_entity_mut(&entry.unique_id) {
                entity.active = entry.present_or_active;
                entity.examined = entry.examined;
                stats.applied = stats.applied.saturating_add(1);
            }
            self.sync_tracked(entry);
        }

        debug!(
            level = %world.level(),
            total = stats.total,
            applied = stats.applied,
            removed = stats.removed,
            missing_expected = stats.missing_expected,
            "snapshot_applied"
        );
        stats
    }

    /// The shared mark active/inactive primitive: tracked state and the live
    /// entity change together.
    pub fn set_entity_active(
        &mut self,
        world: &mut LevelWorld,
        unique_id: &str,
        active: bool,
    ) -> bool {
        let Some(entity) = world.find_entity_mut(unique_id) else {
            warn!(unique_id, active, "set_active_for_missing_entity");
            return false;
        };
        if let Some(tracked) = self.find_tracked_mut(unique_id) {
            tracked.present_or_active = active;
        }
        entity.active = active;
        true
    }

    fn sync_tracked(&mut self, entry: &SnapshotEntry) {
        match self.find_tracked_mut(&entry.unique_id) {
            Some(tracked) => {
                tracked.present_or_active = entry.present_or_active;
                tracked.examined = entry.examined;
            }
            None => self.tracked.push(TrackedEntity {
                unique_id: entry.unique_id.clone(),
                kind: entry.kind,
                present_or_active: entry.present_or_active,
                examined: entry.examined,
            }),
        }
    }
}

/// One loaded level instance: its world plus the registry bound to it for
/// the lifetime of the load. Discarded whole when the level unloads.
pub struct ActiveLevel {
    world: LevelWorld,
    registry: LevelEntityRegistry,
}

impl ActiveLevel {
    pub fn new(world: LevelWorld) -> Self {
        Self {
            world,
            registry: LevelEntityRegistry::default(),
        }
    }

    pub fn level(&self) -> &LevelId {
        self.world.level()
    }

    pub fn world(&self) -> &LevelWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut LevelWorld {
        &mut self.world
    }

    pub fn registry(&self) -> &LevelEntityRegistry {
        &self.registry
    }

    /// One full initialization pass: every entity currently in the world
    /// registers itself. Snapshot application must wait for this pass, or
    /// matching would spuriously fail. Entities spawned later register
    /// individually.
    pub fn run_entity_init_pass(&mut self) {
        let pending: Vec<(String, EntityKind, bool)> = self
            .world
            .entities()
            .iter()
            .filter(|entity| !self.registry.is_registered(&entity.unique_id))
            .map(|entity| (entity.unique_id.clone(), entity.kind, entity.active))
            .collect();
        for (unique_id, kind, active) in pending {
            self.registry.register_entity(&unique_id, kind, active);
        }
    }

    pub fn capture_snapshot(&self) -> LevelSnapshot {
        self.registry.capture_snapshot()
    }

    pub fn apply_snapshot(&mut self, snapshot: &LevelSnapshot) -> SnapshotApplyStats {
        self.registry.apply_snapshot(snapshot, &mut self.world)
    }

    pub fn set_entity_active(&mut self, unique_id: &str, active: bool) -> bool {
        self.registry
            .set_entity_active(&mut self.world, unique_id, active)
    }

    /// Permanently consumes an entity, e.g. an item being picked up. The
    /// registry is notified first so the removal survives into snapshots.
    pub fn remove_entity(&mut self, unique_id: &str) -> bool {
        self.registry.notify_entity_removed(unique_id);
        self.world.remove_entity(unique_id)
    }

    pub fn mark_item_examined(&mut self, unique_id: &str) -> bool {
        self.registry.notify_item_examined(unique_id);
        match self.world.find_entity_mut(unique_id) {
            Some(entity) => {
                entity.examined = true;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LevelEntity, Vec2};

    fn fresh_level() -> ActiveLevel {
        let mut world = LevelWorld::new(LevelId::new("cellar"));
        world.add_entity(LevelEntity::new("item_a", EntityKind::Item, Vec2::default()));
        world.add_entity(LevelEntity::new("item_b", EntityKind::Item, Vec2::default()));
        world.add_entity(LevelEntity::new(
            "npc_n",
            EntityKind::PersistentActor,
            Vec2 { x: 3.0, y: 0.0 },
        ));
        let mut level = ActiveLevel::new(world);
        level.run_entity_init_pass();
        level
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = LevelEntityRegistry::default();
        assert!(registry.register_entity("key", EntityKind::Item, true));
        assert!(!registry.register_entity("key", EntityKind::Item, false));
        assert_eq!(registry.registered_count(), 1);

        let snapshot = registry.capture_snapshot();
        assert!(snapshot.entry("key").expect("entry").present_or_active);
    }

    #[test]
    fn init_pass_is_idempotent() {
        let mut level = fresh_level();
        level.run_entity_init_pass();
        assert_eq!(level.registry().registered_count(), 3);
    }

    #[test]
    fn capture_includes_removed_entities_as_absent() {
        let mut level = fresh_level();
        assert!(level.remove_entity("item_b"));

        let snapshot = level.capture_snapshot();
        assert_eq!(snapshot.entries.len(), 3);
        assert!(!snapshot.entry("item_b").expect("entry").present_or_active);
        assert!(snapshot.entry("item_a").expect("entry").present_or_active);
    }

    #[test]
    fn snapshot_round_trip_restores_picked_up_and_inactive_state() {
        let mut first_visit = fresh_level();
        first_visit.remove_entity("item_b");
        first_visit.set_entity_active("npc_n", false);
        first_visit.mark_item_examined("item_a");
        let snapshot = first_visit.capture_snapshot();

        let mut revisit = fresh_level();
        let stats = revisit.apply_snapshot(&snapshot);

        let item_a = revisit.world().find_entity("item_a").expect("item_a");
        assert!(item_a.active);
        assert!(item_a.examined);
        assert!(revisit.world().find_entity("item_b").is_none());
        let npc = revisit.world().find_entity("npc_n").expect("npc_n");
        assert!(!npc.active);
        assert_eq!(stats.applied, 2);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.missing_expected, 0);
    }

    #[test]
    fn expected_entity_missing_is_a_counted_warning_not_a_failure() {
        let snapshot = LevelSnapshot {
            entries: vec![
                SnapshotEntry {
                    unique_id: "gone_from_content".to_string(),
                    kind: EntityKind::Item,
                    present_or_active: true,
                    examined: false,
                },
                SnapshotEntry {
                    unique_id: "consumed_long_ago".to_string(),
                    kind: EntityKind::Item,
                    present_or_active: false,
                    examined: false,
                },
            ],
        };

        let mut level = ActiveLevel::new(LevelWorld::new(LevelId::new("cellar")));
        level.run_entity_init_pass();
        let stats = level.apply_snapshot(&snapshot);

        assert_eq!(stats.missing_expected, 1);
        assert_eq!(stats.absent_unmatched, 1);
        assert_eq!(stats.applied, 0);
    }

    #[test]
    fn inactive_persistent_actor_is_deactivated_not_removed() {
        let snapshot = LevelSnapshot {
            entries: vec![SnapshotEntry {
                unique_id: "npc_n".to_string(),
                kind: EntityKind::PersistentActor,
                present_or_active: false,
                examined: false,
            }],
        };

        let mut level = fresh_level();
        level.apply_snapshot(&snapshot);

        let npc = level.world().find_entity("npc_n").expect("npc_n");
        assert!(!npc.active);
    }

    #[test]
    fn set_entity_active_updates_tracked_state_and_entity_together() {
        let mut level = fresh_level();
        assert!(level.set_entity_active("npc_n", false));

        assert!(!level.world().find_entity("npc_n").expect("npc").active);
        let snapshot = level.capture_snapshot();
        assert!(!snapshot.entry("npc_n").expect("entry").present_or_active);
    }

    #[test]
    fn set_entity_active_for_missing_entity_is_rejected() {
        let mut level = fresh_level();
        assert!(!level.set_entity_active("nobody", true));
    }

    #[test]
    fn active_change_notification_survives_instance_destruction() {
        let mut level = fresh_level();
        // The entity announces the change, then its instance goes away
        // without a removal notification.
        level
            .registry
            .notify_entity_active_state_changed("npc_n", false);
        level.world.remove_entity("npc_n");

        let snapshot = level.capture_snapshot();
        assert!(!snapshot.entry("npc_n").expect("entry").present_or_active);
    }

    #[test]
    fn apply_keeps_registry_authoritative_for_later_captures() {
        let mut first_visit = fresh_level();
        first_visit.remove_entity("item_b");
        let snapshot = first_visit.capture_snapshot();

        let mut revisit = fresh_level();
        revisit.apply_snapshot(&snapshot);
        let recaptured = revisit.capture_snapshot();

        assert!(!recaptured.entry("item_b").expect("entry").present_or_active);
    }
}
