use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::info;

use super::doc::{parse_campaign_json, validate_campaign, CampaignDoc, CampaignError};
use crate::level::{EntryPoint, LevelEntity, LevelId, LevelWorld};
use crate::stages::{StageConfig, StageDescriptor, StageId};

/// Validated campaign content, indexed for runtime lookup: level worlds for
/// the provider, stage descriptors and the objective map for progression.
pub struct CampaignDatabase {
    doc: CampaignDoc,
    level_index_by_id: HashMap<String, usize>,
}

impl CampaignDatabase {
    pub fn from_doc(doc: CampaignDoc) -> Result<Self, CampaignError> {
        validate_campaign(&doc)?;
        let mut level_index_by_id = HashMap::with_capacity(doc.levels.len());
        for (index, level) in doc.levels.iter().enumerate() {
            level_index_by_id.insert(level.id.clone(), index);
        }
        Ok(Self {
            doc,
            level_index_by_id,
        })
    }

    pub fn name(&self) -> &str {
        &self.doc.name
    }

    pub fn initial_level(&self) -> LevelId {
        LevelId::new(self.doc.initial_level.clone())
    }

    pub fn initial_entry_point(&self) -> &str {
        &self.doc.initial_entry_point
    }

    pub fn level_count(&self) -> usize {
        self.doc.levels.len()
    }

    pub fn has_level(&self, level: &LevelId) -> bool {
        self.level_index_by_id.contains_key(level.as_str())
    }

    /// Instantiates a fresh world for one authored level; per-session state
    /// on top of it comes from snapshots, not from here.
    pub fn build_level_world(&self, level: &LevelId) -> Option<LevelWorld> {
        let index = self.level_index_by_id.get(level.as_str()).copied()?;
        let def = &self.doc.levels[index];
        let mut world = LevelWorld::new(level.clone());
        for entity_def in &def.entities {
            let mut entity = LevelEntity::new(
                entity_def.unique_id.clone(),
                entity_def.kind,
                entity_def.position.to_vec2(),
            );
            entity.active = entity_def.initially_active;
            world.add_entity(entity);
        }
        for entry_def in &def.entry_points {
            world.add_entry_point(EntryPoint {
                id: entry_def.id.clone(),
                position: entry_def.position.to_vec2(),
            });
        }
        Some(world)
    }

    pub fn stage_descriptors(&self) -> Vec<StageDescriptor> {
        self.doc
            .stages
            .iter()
            .map(|stage| StageDescriptor {
                id: StageId(stage.id),
                config: StageConfig {
                    music_cue: stage.music_cue.clone(),
                    ambient_light: stage.ambient_light,
                    activate_entities: stage.activate_entities.clone(),
                    deactivate_entities: stage.deactivate_entities.clone(),
                },
                auto_advance_delay_seconds: stage.auto_advance_delay_seconds,
            })
            .collect()
    }

    pub fn objective_map(&self) -> HashMap<String, StageId> {
        self.doc
            .objectives
            .iter()
            .map(|objective| (objective.name.clone(), StageId(objective.next_stage)))
            .collect()
    }
}

/// Reads, parses, and validates an authored campaign file.
pub fn load_campaign(path: &Path) -> Result<CampaignDatabase, CampaignError> {
    let raw = fs::read_to_string(path).map_err(|source| CampaignError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = parse_campaign_json(&raw)?;
    let database = CampaignDatabase::from_doc(doc)?;
    info!(
        campaign = database.name(),
        levels = database.level_count(),
        stages = database.doc.stages.len(),
        path = %path.display(),
        "campaign_loaded"
    );
    Ok(database)
}
