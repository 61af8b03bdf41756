use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::events::{EventBus, GameEvent};
use crate::registry::ActiveLevel;

/// Identifier of one step in the fixed narrative progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub u32);

/// Environment settings applied on stage entry. Lighting and music are
/// consumed by presentation collaborators listening for `StageEntered`; the
/// activation lists go through the level registry's shared primitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageConfig {
    pub music_cue: Option<String>,
    pub ambient_light: Option<f32>,
    pub activate_entities: Vec<String>,
    pub deactivate_entities: Vec<String>,
}

/// Authored, immutable description of one narrative stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDescriptor {
    pub id: StageId,
    pub config: StageConfig,
    pub auto_advance_delay_seconds: Option<f32>,
}

pub fn stage_timer_name(stage: StageId) -> String {
    format!("stage_auto_advance_{}", stage.0)
}

/// Ordered narrative stages with a current-stage cursor. At most one
/// auto-advance timer is armed at a time, always for the current stage;
/// advancing by timer or by objective cancels the timer of the stage being
/// left.
pub struct StageProgression {
    stages: Vec<StageDescriptor>,
    objective_to_stage: HashMap<String, StageId>,
    current: Option<StageId>,
}

impl StageProgression {
    pub fn new(
        stages: Vec<StageDescriptor>,
        objective_to_stage: HashMap<String, StageId>,
    ) -> Self {
        Self {
            stages,
            objective_to_stage,
            current: None,
        }
    }

    pub fn current_stage(&self) -> Option<StageId> {
        self.current
    }

    pub fn descriptor(&self, stage: StageId) -> Option<&StageDescriptor> {
        self.stages
            .iter()
            .find(|descriptor| descriptor.id == stage)
    }

    fn stage_index(&self, stage: StageId) -> Option<usize> {
        self.stages
            .iter()
            .position(|descriptor| descriptor.id == stage)
    }

    /// Enters the first authored stage.
    pub fn start(&mut self, bus: &mut EventBus, active: &mut Option<ActiveLevel>) {
        match self.stages.first().map(|descriptor| descriptor.id) {
            Some(first) => {
                self.set_stage(first, bus, active);
            }
            None => warn!("no_stages_authored"),
        }
    }

    /// Returns whether the cursor moved. An unknown id is rejected with no
    /// state change; a request for the current stage is a no-op.
    pub fn set_stage(
        &mut self,
        stage: StageId,
        bus: &mut EventBus,
        active: &mut Option<ActiveLevel>,
    ) -> bool {
        let Some(index) = self.stage_index(stage) else {
            warn!(stage = stage.0, "unknown_stage_rejected");
            return false;
        };
        if self.current == Some(stage) {
            debug!(stage = stage.0, "stage_change_noop");
            return false;
        }

        if let Some(previous) = self.current {
            bus.cancel_timed(&stage_timer_name(previous));
        }
        self.current = Some(stage);
        info!(stage = stage.0, "stage_entered");
        bus.publish(&GameEvent::StageEntered { stage });

        let descriptor = &self.stages[index];
        if let Some(level) = active.as_mut() {
            for unique_id in &descriptor.config.activate_entities {
                level.set_entity_active(unique_id, true);
            }
            for unique_id in &descriptor.config.deactivate_entities {
                level.set_entity_active(unique_id, false);
            }
        }

        if let Some(delay) = descriptor.auto_advance_delay_seconds {
            let name = stage_timer_name(stage);
            if let Err(error) =
                bus.schedule_timed(&name, delay, GameEvent::StageTimerElapsed { stage })
            {
                warn!(stage = stage.0, error = %error, "stage_timer_not_armed");
            }
        }
        true
    }

    /// A stale timer, one whose stage is no longer current, is a harmless
    /// no-op by id comparison.
    pub fn handle_timer_elapsed(
        &mut self,
        stage: StageId,
        bus: &mut EventBus,
        active: &mut Option<ActiveLevel>,
    ) {
        if self.current != Some(stage) {
            debug!(stage = stage.0, "stale_stage_timer_ignored");
            return;
        }
        let next = self
            .stage_index(stage)
            .and_then(|index| self.stages.get(index + 1))
            .map(|descriptor| descriptor.id);
        let Some(next) = next else {
            debug!(stage = stage.0, "final_stage_timer_elapsed");
            return;
        };
        info!(from = stage.0, to = next.0, "stage_auto_advanced");
        self.set_stage(next, bus, active);
    }

    /// The "progress on completion, don't wait for the timer" path. A mapped
    /// objective advances immediately and the outstanding timer is canceled
    /// through [`set_stage`]. An unmapped objective is logged and ignored
    /// with the timer left armed; the final objective in the sequence has no
    /// mapping.
    ///
    /// [`set_stage`]: StageProgression::set_stage
    pub fn on_objective_completed(
        &mut self,
        objective: &str,
        bus: &mut EventBus,
        active: &mut Option<ActiveLevel>,
    ) {
        match self.objective_to_stage.get(objective).copied() {
            Some(stage) => {
                info!(objective, stage = stage.0, "objective_completed");
                self.set_stage(stage, bus, active);
            }
            None => debug!(objective, "unmapped_objective_ignored"),
        }
    }

    /// Cancels the outstanding timer and clears the cursor; part of the
    /// session end flow.
    pub fn reset(&mut self, bus: &mut EventBus) {
        if let Some(current) = self.current.take() {
            bus.cancel_timed(&stage_timer_name(current));
        }
    }
}
