mod database;
mod doc;

pub use database::{load_campaign, CampaignDatabase};
pub use doc::{
    parse_campaign_json, validate_campaign, CampaignDoc, CampaignError, EntryPointDef, LevelDef,
    LevelEntityDef, ObjectiveDef, StageDef, Vec2Def, CAMPAIGN_FORMAT_VERSION,
};
