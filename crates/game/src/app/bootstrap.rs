use thiserror::Error;
use tracing::info;

use runtime::{
    load_campaign, resolve_app_paths, CampaignError, GameSession, LevelId, StageProgression,
    StartupError,
};

use super::provider::CampaignLevelProvider;

/// Simulated load latency of the campaign provider, in polled ticks.
const LOAD_LATENCY_TICKS: u32 = 3;
const UNLOAD_LATENCY_TICKS: u32 = 2;

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Campaign(#[from] CampaignError),
}

pub(crate) struct SessionWiring {
    pub(crate) session: GameSession,
    pub(crate) initial_level: LevelId,
    pub(crate) initial_entry_point: String,
}

/// Resolve paths, load the authored campaign, and assemble a session around
/// a campaign-backed level provider.
pub(crate) fn build_session() -> Result<SessionWiring, BootstrapError> {
    let paths = resolve_app_paths()?;
    info!(
        root = %paths.root.display(),
        campaign_file = %paths.campaign_file.display(),
        "startup"
    );

    let campaign = load_campaign(&paths.campaign_file)?;
    let stages = StageProgression::new(campaign.stage_descriptors(), campaign.objective_map());
    let initial_level = campaign.initial_level();
    let initial_entry_point = campaign.initial_entry_point().to_string();
    let provider =
        CampaignLevelProvider::new(campaign, LOAD_LATENCY_TICKS, UNLOAD_LATENCY_TICKS);
    let session = GameSession::new(Box::new(provider), stages);

    Ok(SessionWiring {
        session,
        initial_level,
        initial_entry_point,
    })
}
