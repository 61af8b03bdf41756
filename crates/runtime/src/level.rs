use std::fmt;

use tracing::warn;

use crate::session_state::EntityKind;

/// Identifier of a loadable level, stable across load/unload within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LevelId(pub String);

impl LevelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

/// An interactive object placed in a level whose presence/state outlives the
/// level being unloaded and reloaded within one session.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelEntity {
    pub unique_id: String,
    pub kind: EntityKind,
    pub active: bool,
    pub examined: bool,
    pub position: Vec2,
}

impl LevelEntity {
    pub fn new(unique_id: impl Into<String>, kind: EntityKind, position: Vec2) -> Self {
        Self {
            unique_id: unique_id.into(),
            kind,
            active: true,
            examined: false,
            position,
        }
    }
}

/// A named spawn location inside a level, resolvable by stable id.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPoint {
    pub id: String,
    pub position: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub control_enabled: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            position: Vec2::default(),
            velocity: Vec2::default(),
            control_enabled: true,
        }
    }
}

/// In-memory model of one loaded level instance: its interactive entities,
/// its entry points, and the player avatar placed in it.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelWorld {
    level: LevelId,
    entities: Vec<LevelEntity>,
    entry_points: Vec<EntryPoint>,
    player: PlayerState,
}

impl LevelWorld {
    pub fn new(level: LevelId) -> Self {
        Self {
            level,
            entities: Vec::new(),
            entry_points: Vec::new(),
            player: PlayerState::default(),
        }
    }

    pub fn level(&self) -> &LevelId {
        &self.level
    }

    pub fn add_entity(&mut self, entity: LevelEntity) -> bool {
        if self.find_entity(&entity.unique_id).is_some() {
            warn!(
                level = %self.level,
                unique_id = %entity.unique_id,
                "duplicate_level_entity_ignored"
            );
            return false;
        }
        self.entities.push(entity);
        true
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[LevelEntity] {
        &self.entities
    }

    pub fn find_entity(&self, unique_id: &str) -> Option<&LevelEntity> {
        self.entities
            .iter()
            .find(|entity| entity.unique_id == unique_id)
    }

    pub fn find_entity_mut(&mut self, unique_id: &str) -> Option<&mut LevelEntity> {
        self.entities
            .iter_mut()
            .find(|entity| entity.unique_id == unique_id)
    }

    pub fn remove_entity(&mut self, unique_id: &str) -> bool {
        let before = self.entities.len();
        self.entities.retain(|entity| entity.unique_id != unique_id);
        before != self.entities.len()
    }

    pub fn add_entry_point(&mut self, entry_point: EntryPoint) -> bool {
        if self.find_entry_point(&entry_point.id).is_some() {
            warn!(
                level = %self.level,
                entry_point = %entry_point.id,
                "duplicate_entry_point_ignored"
            );
            return false;
        }
        self.entry_points.push(entry_point);
        true
    }

    pub fn entry_points(&self) -> &[EntryPoint] {
        &self.entry_points
    }

    pub fn find_entry_point(&self, id: &str) -> Option<&EntryPoint> {
        self.entry_points.iter().find(|entry| entry.id == id)
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut PlayerState {
        &mut self.player
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_with_entities(ids: &[&str]) -> LevelWorld {
        let mut world = LevelWorld::new(LevelId::new("test_level"));
        for id in ids {
            world.add_entity(LevelEntity::new(*id, EntityKind::Item, Vec2::default()));
        }
        world
    }

    #[test]
    fn add_entity_rejects_duplicate_unique_id() {
        let mut world = world_with_entities(&["a"]);
        let duplicate = LevelEntity::new("a", EntityKind::Item, Vec2 { x: 1.0, y: 1.0 });
        assert!(!world.add_entity(duplicate));
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn remove_entity_reports_whether_anything_was_removed() {
        let mut world = world_with_entities(&["a", "b"]);
        assert!(world.remove_entity("a"));
        assert!(!world.remove_entity("a"));
        assert_eq!(world.entity_count(), 1);
        assert!(world.find_entity("b").is_some());
    }

    #[test]
    fn entry_points_resolve_by_stable_id() {
        let mut world = LevelWorld::new(LevelId::new("test_level"));
        world.add_entry_point(EntryPoint {
            id: "north_door".to_string(),
            position: Vec2 { x: 4.0, y: -2.0 },
        });

        let found = world.find_entry_point("north_door").expect("entry point");
        assert_eq!(found.position, Vec2 { x: 4.0, y: -2.0 });
        assert!(world.find_entry_point("south_door").is_none());
    }

    #[test]
    fn duplicate_entry_point_is_ignored() {
        let mut world = LevelWorld::new(LevelId::new("test_level"));
        assert!(world.add_entry_point(EntryPoint {
            id: "door".to_string(),
            position: Vec2::default(),
        }));
        assert!(!world.add_entry_point(EntryPoint {
            id: "door".to_string(),
            position: Vec2 { x: 9.0, y: 9.0 },
        }));
        assert_eq!(world.entry_points().len(), 1);
    }

    #[test]
    fn player_defaults_to_controllable_at_origin() {
        let world = LevelWorld::new(LevelId::new("test_level"));
        assert!(world.player().control_enabled);
        assert_eq!(world.player().position, Vec2::default());
        assert_eq!(world.player().velocity, Vec2::default());
    }
}
