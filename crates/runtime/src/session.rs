use tracing::info;

use crate::events::{EventBus, GameEvent};
use crate::level::LevelId;
use crate::registry::ActiveLevel;
use crate::session_state::SessionStateCache;
use crate::stages::{StageId, StageProgression};
use crate::status::{GameStatus, GameStatusMachine};
use crate::transition::{LevelProvider, TransitionOrchestrator, TransitionUpdate};

/// Composition root for one play session. Owns every core component and
/// wires them into each other per call; nothing here is a process-wide
/// singleton. Collaborators reach the bus through [`bus_mut`] and everything
/// else through the documented session operations.
///
/// [`bus_mut`]: GameSession::bus_mut
pub struct GameSession {
    bus: EventBus,
    status: GameStatusMachine,
    cache: SessionStateCache,
    stages: StageProgression,
    orchestrator: TransitionOrchestrator,
    provider: Box<dyn LevelProvider>,
    active: Option<ActiveLevel>,
}

impl GameSession {
    pub fn new(provider: Box<dyn LevelProvider>, stages: StageProgression) -> Self {
        Self {
            bus: EventBus::default(),
            status: GameStatusMachine::new(),
            cache: SessionStateCache::default(),
            stages,
            orchestrator: TransitionOrchestrator::default(),
            provider,
            active: None,
        }
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn status(&self) -> GameStatus {
        self.status.current()
    }

    pub fn time_scale(&self) -> f32 {
        self.status.time_scale()
    }

    pub fn cache(&self) -> &SessionStateCache {
        &self.cache
    }

    pub fn current_stage(&self) -> Option<StageId> {
        self.stages.current_stage()
    }

    pub fn active_level(&self) -> Option<&ActiveLevel> {
        self.active.as_ref()
    }

    pub fn active_level_mut(&mut self) -> Option<&mut ActiveLevel> {
        self.active.as_mut()
    }

    pub fn current_level_id(&self) -> Option<&LevelId> {
        self.active.as_ref().map(|level| level.level())
    }

    pub fn transition_in_flight(&self) -> bool {
        self.orchestrator.in_flight()
    }

    pub fn fade_alpha(&self) -> f32 {
        self.orchestrator.fade_alpha()
    }

    /// Enters the first narrative stage and requests the opening transition.
    pub fn start(&mut self, level: LevelId, entry_point: &str) -> bool {
        self.stages.start(&mut self.bus, &mut self.active);
        self.request_transition(level, entry_point)
    }

    /// An accepted request puts the session into `Loading`; completion or
    /// abort brings it back to `Playing` in [`tick`].
    ///
    /// [`tick`]: GameSession::tick
    pub fn request_transition(&mut self, target: LevelId, entry_point: &str) -> bool {
        let accepted = self.orchestrator.request_transition(target, entry_point);
        if accepted {
            self.status.change_status(GameStatus::Loading, &mut self.bus);
        }
        accepted
    }

    pub fn change_status(&mut self, next: GameStatus) -> bool {
        self.status.change_status(next, &mut self.bus)
    }

    /// The single publish path: bus subscribers first, then core routing.
    pub fn publish(&mut self, event: GameEvent) {
        self.bus.publish(&event);
        self.route(event);
    }

    fn route(&mut self, event: GameEvent) {
        match event {
            GameEvent::ObjectiveCompleted { objective } => {
                self.stages
                    .on_objective_completed(&objective, &mut self.bus, &mut self.active);
            }
            GameEvent::StageTimerElapsed { stage } => {
                self.stages
                    .handle_timer_elapsed(stage, &mut self.bus, &mut self.active);
            }
            GameEvent::TransitionRequested {
                target,
                entry_point,
            } => {
                self.request_transition(target, &entry_point);
            }
            _ => {}
        }
    }

    /// One frame of the cooperative scheduler. Timed events advance on
    /// scaled time, so pausing freezes pending auto-advance timers; the
    /// transition pipeline runs on unscaled time so a fade never wedges
    /// while paused.
    pub fn tick(&mut self, dt_seconds: f32) -> TransitionUpdate {
        let scaled_dt = dt_seconds * self.status.time_scale();
        let due = self.bus.advance(scaled_dt);
        for event in due {
            self.publish(event);
        }

        let update = self.orchestrator.tick(
            dt_seconds,
            self.provider.as_mut(),
            &mut self.active,
            &mut self.cache,
            &mut self.bus,
        );
        if matches!(
            update,
            TransitionUpdate::Completed | TransitionUpdate::Aborted
        ) && self.status.current() == GameStatus::Loading
        {
            self.status
                .change_status(GameStatus::Playing, &mut self.bus);
        }
        update
    }

    /// The once-per-session-end flow, and the sanctioned exit from
    /// `GameOver`: forgets all per-level state, drops the active level, and
    /// returns to the menu.
    pub fn end_session(&mut self) {
        info!("session_ended");
        self.cache.clear_all();
        self.stages.reset(&mut self.bus);
        self.active = None;
        self.status.change_status(GameStatus::Menu, &mut self.bus);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use super::*;
    use crate::events::EventKind;
    use crate::level::{EntryPoint, LevelWorld, Vec2};
    use crate::stages::{StageConfig, StageDescriptor};
    use crate::transition::{LevelLoadError, LoadPoll, UnloadPoll};

    const DT: f32 = 0.05;

    /// Loads resolve on the first poll; good enough to exercise routing.
    struct InstantProvider;

    impl LevelProvider for InstantProvider {
        fn begin_load(&mut self, level: &LevelId) -> Result<(), LevelLoadError> {
            if level.as_str() == "missing" {
                return Err(LevelLoadError::UnknownLevel(level.clone()));
            }
            Ok(())
        }

        fn poll_load(&mut self, level: &LevelId) -> LoadPoll {
            let mut world = LevelWorld::new(level.clone());
            world.add_entry_point(EntryPoint {
                id: "door".to_string(),
                position: Vec2 { x: 1.0, y: 1.0 },
            });
            LoadPoll::Ready(world)
        }

        fn begin_unload(&mut self, _level: &LevelId) -> Result<(), LevelLoadError> {
            Ok(())
        }

        fn poll_unload(&mut self, _level: &LevelId) -> UnloadPoll {
            UnloadPoll::Done
        }
    }

    fn stage(id: u32, delay: Option<f32>) -> StageDescriptor {
        StageDescriptor {
            id: StageId(id),
            config: StageConfig::default(),
            auto_advance_delay_seconds: delay,
        }
    }

    fn session_with_stages(stages: Vec<StageDescriptor>) -> GameSession {
        let mut objectives = HashMap::new();
        objectives.insert("open_the_gate".to_string(), StageId(2));
        GameSession::new(
            Box::new(InstantProvider),
            StageProgression::new(stages, objectives),
        )
    }

    fn pump_to_rest(session: &mut GameSession) -> TransitionUpdate {
        for _ in 0..200 {
            let update = session.tick(DT);
            if matches!(
                update,
                TransitionUpdate::Completed | TransitionUpdate::Aborted
            ) {
                return update;
            }
        }
        panic!("transition never came to rest");
    }

    #[test]
    fn start_flows_from_loading_to_playing() {
        let mut session = session_with_stages(vec![stage(1, None), stage(2, None)]);
        assert_eq!(session.status(), GameStatus::Loading);

        assert!(session.start(LevelId::new("atrium"), "door"));
        let update = pump_to_rest(&mut session);

        assert_eq!(update, TransitionUpdate::Completed);
        assert_eq!(session.status(), GameStatus::Playing);
        assert_eq!(session.current_level_id(), Some(&LevelId::new("atrium")));
        assert_eq!(session.current_stage(), Some(StageId(1)));
    }

    #[test]
    fn due_stage_timer_advances_through_the_publish_path() {
        // The opening transition takes well under 2 simulated seconds.
        let mut session = session_with_stages(vec![stage(1, Some(2.0)), stage(2, None)]);
        session.start(LevelId::new("atrium"), "door");
        pump_to_rest(&mut session);
        assert_eq!(session.current_stage(), Some(StageId(1)));

        for _ in 0..40 {
            session.tick(DT);
        }

        assert_eq!(session.current_stage(), Some(StageId(2)));
    }

    #[test]
    fn pausing_freezes_stage_timers() {
        let mut session = session_with_stages(vec![stage(1, Some(2.0)), stage(2, None)]);
        session.start(LevelId::new("atrium"), "door");
        pump_to_rest(&mut session);

        session.change_status(GameStatus::Paused);
        for _ in 0..60 {
            session.tick(DT);
        }
        assert_eq!(session.current_stage(), Some(StageId(1)));

        session.change_status(GameStatus::Playing);
        for _ in 0..40 {
            session.tick(DT);
        }
        assert_eq!(session.current_stage(), Some(StageId(2)));
    }

    #[test]
    fn transition_request_event_is_routed_to_the_orchestrator() {
        let mut session = session_with_stages(vec![stage(1, None)]);
        session.start(LevelId::new("atrium"), "door");
        pump_to_rest(&mut session);

        session.publish(GameEvent::TransitionRequested {
            target: LevelId::new("cellar"),
            entry_point: "door".to_string(),
        });
        assert!(session.transition_in_flight());
        pump_to_rest(&mut session);

        assert_eq!(session.current_level_id(), Some(&LevelId::new("cellar")));
    }

    #[test]
    fn objective_event_reaches_subscribers_and_the_stage_manager() {
        let mut session = session_with_stages(vec![stage(1, None), stage(2, None)]);
        session.start(LevelId::new("atrium"), "door");
        pump_to_rest(&mut session);

        let seen = Rc::new(RefCell::new(0u32));
        let seen_for_handler = Rc::clone(&seen);
        session
            .bus_mut()
            .subscribe(EventKind::ObjectiveCompleted, move |_| {
                *seen_for_handler.borrow_mut() += 1;
            });

        session.publish(GameEvent::ObjectiveCompleted {
            objective: "open_the_gate".to_string(),
        });

        assert_eq!(*seen.borrow(), 1);
        assert_eq!(session.current_stage(), Some(StageId(2)));
    }

    #[test]
    fn aborted_transition_returns_to_playing() {
        let mut session = session_with_stages(vec![stage(1, None)]);
        session.start(LevelId::new("atrium"), "door");
        pump_to_rest(&mut session);

        assert!(session.request_transition(LevelId::new("missing"), "door"));
        assert_eq!(session.status(), GameStatus::Loading);
        let update = pump_to_rest(&mut session);

        assert_eq!(update, TransitionUpdate::Aborted);
        assert_eq!(session.status(), GameStatus::Playing);
        assert_eq!(session.current_level_id(), Some(&LevelId::new("atrium")));
    }

    #[test]
    fn end_session_clears_state_and_returns_to_menu() {
        let mut session = session_with_stages(vec![stage(1, Some(60.0))]);
        session.start(LevelId::new("atrium"), "door");
        pump_to_rest(&mut session);
        session.change_status(GameStatus::GameOver);

        session.end_session();

        assert_eq!(session.status(), GameStatus::Menu);
        assert!(session.cache().is_empty());
        assert!(session.active_level().is_none());
        assert_eq!(session.current_stage(), None);
        assert_eq!(session.bus_mut().pending_timed_count(), 0);
    }
}
