use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::level::Vec2;
use crate::session_state::EntityKind;

pub const CAMPAIGN_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("read campaign '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse campaign json: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
    #[error("parse campaign json at {path}: {source}")]
    ParseAt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {path}: {message}")]
    Validation { path: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2Def {
    pub x: f32,
    pub y: f32,
}

impl Vec2Def {
    pub fn to_vec2(self) -> Vec2 {
        Vec2 {
            x: self.x,
            y: self.y,
        }
    }
}

/// Root of an authored campaign file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignDoc {
    pub format_version: u32,
    pub name: String,
    pub initial_level: String,
    pub initial_entry_point: String,
    pub levels: Vec<LevelDef>,
    pub stages: Vec<StageDef>,
    #[serde(default)]
    pub objectives: Vec<ObjectiveDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDef {
    pub id: String,
    #[serde(default)]
    pub entities: Vec<LevelEntityDef>,
    #[serde(default)]
    pub entry_points: Vec<EntryPointDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelEntityDef {
    pub unique_id: String,
    pub kind: EntityKind,
    pub position: Vec2Def,
    #[serde(default = "default_initially_active")]
    pub initially_active: bool,
}

fn default_initially_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPointDef {
    pub id: String,
    pub position: Vec2Def,
}

/// Stage ids must be strictly increasing in authored order, so list order
/// and id order agree for auto-advance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDef {
    pub id: u32,
    #[serde(default)]
    pub music_cue: Option<String>,
    #[serde(default)]
    pub ambient_light: Option<f32>,
    #[serde(default)]
    pub activate_entities: Vec<String>,
    #[serde(default)]
    pub deactivate_entities: Vec<String>,
    #[serde(default)]
    pub auto_advance_delay_seconds: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveDef {
    pub name: String,
    pub next_stage: u32,
}

pub fn parse_campaign_json(raw: &str) -> Result<CampaignDoc, CampaignError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, CampaignDoc>(&mut deserializer) {
        Ok(doc) => Ok(doc),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(CampaignError::Parse { source })
            } else {
                Err(CampaignError::ParseAt { path, source })
            }
        }
    }
}

fn validation_err(path: &str, message: impl Into<String>) -> CampaignError {
    CampaignError::Validation {
        path: path.to_string(),
        message: message.into(),
    }
}

fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> CampaignError {
    validation_err(path, format!("expected {expected}, got {actual}"))
}

fn check_finite(path: &str, value: f32) -> Result<(), CampaignError> {
    if !value.is_finite() {
        return Err(expected_actual(path, "finite number", value));
    }
    Ok(())
}

pub fn validate_campaign(doc: &CampaignDoc) -> Result<(), CampaignError> {
    if doc.format_version != CAMPAIGN_FORMAT_VERSION {
        return Err(expected_actual(
            "format_version",
            CAMPAIGN_FORMAT_VERSION,
            doc.format_version,
        ));
    }
    if doc.name.trim().is_empty() {
        return Err(validation_err("name", "expected a non-empty campaign name"));
    }
    if doc.levels.is_empty() {
        return Err(validation_err("levels", "expected at least one level"));
    }
    if doc.stages.is_empty() {
        return Err(validation_err("stages", "expected at least one stage"));
    }

    let mut known_levels: HashMap<&str, usize> = HashMap::with_capacity(doc.levels.len());
    for (index, level) in doc.levels.iter().enumerate() {
        let id_path = format!("levels[{index}].id");
        if level.id.trim().is_empty() {
            return Err(validation_err(&id_path, "expected a non-empty level id"));
        }
        if let Some(first_index) = known_levels.insert(&level.id, index) {
            return Err(validation_err(
                &id_path,
                format!(
                    "duplicate level id '{}' (first seen at levels[{first_index}].id)",
                    level.id
                ),
            ));
        }

        let mut known_entities: HashMap<&str, usize> = HashMap::with_capacity(level.entities.len());
        for (entity_index, entity) in level.entities.iter().enumerate() {
            let entity_path = format!("levels[{index}].entities[{entity_index}]");
            if entity.unique_id.trim().is_empty() {
                return Err(validation_err(
                    &format!("{entity_path}.unique_id"),
                    "expected a non-empty unique id",
                ));
            }
            if let Some(first_index) = known_entities.insert(&entity.unique_id, entity_index) {
                return Err(validation_err(
                    &format!("{entity_path}.unique_id"),
                    format!(
                        "duplicate unique_id '{}' (first seen at levels[{index}].entities[{first_index}])",
                        entity.unique_id
                    ),
                ));
            }
            check_finite(&format!("{entity_path}.position.x"), entity.position.x)?;
            check_finite(&format!("{entity_path}.position.y"), entity.position.y)?;
        }

        let mut known_entry_points: HashMap<&str, usize> =
            HashMap::with_capacity(level.entry_points.len());
        for (entry_index, entry) in level.entry_points.iter().enumerate() {
            let entry_path = format!("levels[{index}].entry_points[{entry_index}]");
            if entry.id.trim().is_empty() {
                return Err(validation_err(
                    &format!("{entry_path}.id"),
                    "expected a non-empty entry point id",
                ));
            }
            if let Some(first_index) = known_entry_points.insert(&entry.id, entry_index) {
                return Err(validation_err(
                    &format!("{entry_path}.id"),
                    format!(
                        "duplicate entry point id '{}' (first seen at levels[{index}].entry_points[{first_index}])",
                        entry.id
                    ),
                ));
            }
            check_finite(&format!("{entry_path}.position.x"), entry.position.x)?;
            check_finite(&format!("{entry_path}.position.y"), entry.position.y)?;
        }
    }

    let mut previous_stage_id: Option<u32> = None;
    for (index, stage) in doc.stages.iter().enumerate() {
        let stage_path = format!("stages[{index}]");
        if let Some(previous) = previous_stage_id {
            if stage.id <= previous {
                return Err(expected_actual(
                    &format!("{stage_path}.id"),
                    format!("id greater than {previous}"),
                    stage.id,
                ));
            }
        }
        previous_stage_id = Some(stage.id);

        if let Some(delay) = stage.auto_advance_delay_seconds {
            let delay_path = format!("{stage_path}.auto_advance_delay_seconds");
            check_finite(&delay_path, delay)?;
            if delay <= 0.0 {
                return Err(expected_actual(&delay_path, "> 0", delay));
            }
        }
        if let Some(light) = stage.ambient_light {
            check_finite(&format!("{stage_path}.ambient_light"), light)?;
        }
    }

    let stage_ids: HashSet<u32> = doc.stages.iter().map(|stage| stage.id).collect();
    let mut known_objectives: HashMap<&str, usize> = HashMap::with_capacity(doc.objectives.len());
    for (index, objective) in doc.objectives.iter().enumerate() {
        let objective_path = format!("objectives[{index}]");
        if objective.name.trim().is_empty() {
            return Err(validation_err(
                &format!("{objective_path}.name"),
                "expected a non-empty objective name",
            ));
        }
        if let Some(first_index) = known_objectives.insert(&objective.name, index) {
            return Err(validation_err(
                &format!("{objective_path}.name"),
                format!(
                    "duplicate objective '{}' (first seen at objectives[{first_index}])",
                    objective.name
                ),
            ));
        }
        if !stage_ids.contains(&objective.next_stage) {
            return Err(validation_err(
                &format!("{objective_path}.next_stage"),
                format!("references unknown stage id {}", objective.next_stage),
            ));
        }
    }

    let Some(initial_index) = known_levels.get(doc.initial_level.as_str()).copied() else {
        return Err(validation_err(
            "initial_level",
            format!("references unknown level '{}'", doc.initial_level),
        ));
    };
    let initial_level = &doc.levels[initial_index];
    if !initial_level
        .entry_points
        .iter()
        .any(|entry| entry.id == doc.initial_entry_point)
    {
        return Err(validation_err(
            "initial_entry_point",
            format!(
                "references unknown entry point '{}' in level '{}'",
                doc.initial_entry_point, doc.initial_level
            ),
        ));
    }

    Ok(())
}
