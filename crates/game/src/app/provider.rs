use tracing::debug;

use runtime::{
    CampaignDatabase, LevelId, LevelLoadError, LevelProvider, LevelWorld, LoadPoll, UnloadPoll,
};

struct PendingLoad {
    level: LevelId,
    world: LevelWorld,
    remaining_ticks: u32,
}

struct PendingUnload {
    level: LevelId,
    remaining_ticks: u32,
}

/// Level provider backed by the authored campaign. Loads and unloads resolve
/// after a fixed number of polls, standing in for real streaming latency so
/// the transition pipeline's suspension points are actually exercised.
pub(crate) struct CampaignLevelProvider {
    campaign: CampaignDatabase,
    load_latency_ticks: u32,
    unload_latency_ticks: u32,
    pending_load: Option<PendingLoad>,
    pending_unload: Option<PendingUnload>,
}

impl CampaignLevelProvider {
    pub(crate) fn new(
        campaign: CampaignDatabase,
        load_latency_ticks: u32,
        unload_latency_ticks: u32,
    ) -> Self {
        Self {
            campaign,
            load_latency_ticks,
            unload_latency_ticks,
            pending_load: None,
            pending_unload: None,
        }
    }
}

impl LevelProvider for CampaignLevelProvider {
    /// The world is instantiated up front; only its delivery is delayed, so
    /// a poll can never fail.
    fn begin_load(&mut self, level: &LevelId) -> Result<(), LevelLoadError> {
        let Some(world) = self.campaign.build_level_world(level) else {
            return Err(LevelLoadError::UnknownLevel(level.clone()));
        };
        debug!(level = %level, latency_ticks = self.load_latency_ticks, "load_begun");
        self.pending_load = Some(PendingLoad {
            level: level.clone(),
            world,
            remaining_ticks: self.load_latency_ticks,
        });
        Ok(())
    }

    fn poll_load(&mut self, level: &LevelId) -> LoadPoll {
        match self.pending_load.take() {
            Some(pending) if pending.level == *level && pending.remaining_ticks == 0 => {
                debug!(level = %level, "load_ready");
                LoadPoll::Ready(pending.world)
            }
            Some(mut pending) => {
                pending.remaining_ticks = pending.remaining_ticks.saturating_sub(1);
                self.pending_load = Some(pending);
                LoadPoll::Pending
            }
            None => LoadPoll::Pending,
        }
    }

    fn begin_unload(&mut self, level: &LevelId) -> Result<(), LevelLoadError> {
        debug!(level = %level, latency_ticks = self.unload_latency_ticks, "unload_begun");
        self.pending_unload = Some(PendingUnload {
            level: level.clone(),
            remaining_ticks: self.unload_latency_ticks,
        });
        Ok(())
    }

    fn poll_unload(&mut self, level: &LevelId) -> UnloadPoll {
        match self.pending_unload.take() {
            Some(pending) if pending.level == *level && pending.remaining_ticks == 0 => {
                debug!(level = %level, "unload_done");
                UnloadPoll::Done
            }
            Some(mut pending) => {
                pending.remaining_ticks = pending.remaining_ticks.saturating_sub(1);
                self.pending_unload = Some(pending);
                UnloadPoll::Pending
            }
            None => UnloadPoll::Pending,
        }
    }
}
