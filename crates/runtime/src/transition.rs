use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{EventBus, GameEvent};
use crate::level::{LevelId, LevelWorld, Vec2};
use crate::registry::ActiveLevel;
use crate::session_state::SessionStateCache;

pub const DEFAULT_FADE_DURATION_SECONDS: f32 = 0.35;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelLoadError {
    #[error("unknown level '{0}'")]
    UnknownLevel(LevelId),
}

/// Poll result for an in-flight level load.
pub enum LoadPoll {
    Pending,
    Ready(LevelWorld),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadPoll {
    Pending,
    Done,
}

/// The asynchronous seam to level content. Loads and unloads are polled once
/// per tick; failing to start is the only failure class, polls cannot fail.
pub trait LevelProvider {
    fn begin_load(&mut self, level: &LevelId) -> Result<(), LevelLoadError>;
    fn poll_load(&mut self, level: &LevelId) -> LoadPoll;
    fn begin_unload(&mut self, level: &LevelId) -> Result<(), LevelLoadError>;
    fn poll_unload(&mut self, level: &LevelId) -> UnloadPoll;
}

/// Full-screen overlay alpha, interpolated per frame. Presentation reads the
/// value; only the orchestrator moves it.
#[derive(Debug, Clone, Copy)]
pub struct FadeOverlay {
    alpha: f32,
    target: f32,
    duration_seconds: f32,
}

impl FadeOverlay {
    fn new(duration_seconds: f32) -> Self {
        Self {
            alpha: 0.0,
            target: 0.0,
            duration_seconds: duration_seconds.max(0.0),
        }
    }

    fn set_target(&mut self, target: f32) {
        self.target = target.clamp(0.0, 1.0);
    }

    /// Moves alpha toward the target; returns whether it arrived.
    fn advance(&mut self, dt_seconds: f32) -> bool {
        if self.duration_seconds <= f32::EPSILON {
            self.alpha = self.target;
            return true;
        }
        let step = (dt_seconds / self.duration_seconds).max(0.0);
        if self.alpha < self.target {
            self.alpha = (self.alpha + step).min(self.target);
        } else {
            self.alpha = (self.alpha - step).max(self.target);
        }
        (self.alpha - self.target).abs() <= f32::EPSILON
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransitionPhase {
    Idle,
    FadingOut,
    Loading,
    Unloading,
    InitCycleWait,
    FadingIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionUpdate {
    Idle,
    InProgress,
    Completed,
    Aborted,
}

struct PendingRequest {
    target: LevelId,
    entry_point: String,
}

/// Drives the fade, snapshot, load, apply, place pipeline as an explicit
/// state machine: every step is a discrete phase and suspension is returning
/// to the scheduler until the polled condition holds. At most one transition
/// is in flight; later requests are rejected, never queued.
pub struct TransitionOrchestrator {
    phase: TransitionPhase,
    fade: FadeOverlay,
    request: Option<PendingRequest>,
    loaded_world: Option<LevelWorld>,
    aborting: bool,
}

impl TransitionOrchestrator {
    pub fn new(fade_duration_seconds: f32) -> Self {
        Self {
            phase: TransitionPhase::Idle,
            fade: FadeOverlay::new(fade_duration_seconds),
            request: None,
            loaded_world: None,
            aborting: false,
        }
    }

    pub fn in_flight(&self) -> bool {
        self.phase != TransitionPhase::Idle
    }

    pub fn fade_alpha(&self) -> f32 {
        self.fade.alpha()
    }

    pub fn request_transition(&mut self, target: LevelId, entry_point: &str) -> bool {
        if self.in_flight() {
            warn!(level = %target, "transition_rejected_in_flight");
            return false;
        }
        info!(level = %target, entry_point, "transition_requested");
        self.request = Some(PendingRequest {
            target,
            entry_point: entry_point.to_string(),
        });
        self.aborting = false;
        self.fade.set_target(1.0);
        self.phase = TransitionPhase::FadingOut;
        true
    }

    /// One step of the pipeline per tick. The fade runs on the dt handed in
    /// here, so the caller decides whether it is scaled or wall-clock time.
    pub fn tick(
        &mut self,
        dt_seconds: f32,
        provider: &mut dyn LevelProvider,
        active: &mut Option<ActiveLevel>,
        cache: &mut SessionStateCache,
        bus: &mut EventBus,
    ) -> TransitionUpdate {
        match self.phase {
            TransitionPhase::Idle => TransitionUpdate::Idle,
            TransitionPhase::FadingOut => {
                if !self.fade.advance(dt_seconds) {
                    return TransitionUpdate::InProgress;
                }
                self.finish_fade_out(provider, active, cache, bus)
            }
            TransitionPhase::Loading => self.poll_loading(provider, active),
            TransitionPhase::Unloading => self.poll_unloading(provider, active),
            TransitionPhase::InitCycleWait => self.apply_and_place(active, cache, bus),
            TransitionPhase::FadingIn => {
                if !self.fade.advance(dt_seconds) {
                    return TransitionUpdate::InProgress;
                }
                self.phase = TransitionPhase::Idle;
                let aborted = self.aborting;
                self.aborting = false;
                if let Some(request) = self.request.take() {
                    if aborted {
                        warn!(level = %request.target, "transition_aborted");
                    } else {
                        info!(level = %request.target, "transition_completed");
                    }
                }
                if aborted {
                    TransitionUpdate::Aborted
                } else {
                    TransitionUpdate::Completed
                }
            }
        }
    }

    /// Overlay is opaque: announce the unload, capture the outgoing level,
    /// and kick off the load, or skip straight to the init wait for a
    /// same-level teleport.
    fn finish_fade_out(
        &mut self,
        provider: &mut dyn LevelProvider,
        active: &mut Option<ActiveLevel>,
        cache: &mut SessionStateCache,
        bus: &mut EventBus,
    ) -> TransitionUpdate {
        let Some(target) = self.request.as_ref().map(|request| request.target.clone()) else {
            self.phase = TransitionPhase::Idle;
            return TransitionUpdate::Idle;
        };

        if let Some(level) = active.as_mut() {
            bus.publish(&GameEvent::LevelPreUnload {
                level: level.level().clone(),
            });
            level.world_mut().player_mut().control_enabled = false;
            let snapshot = level.capture_snapshot();
            cache.record_level_state(level.level().clone(), snapshot);
        }

        let same_level = active.as_ref().map(|level| level.level()) == Some(&target);
        if same_level {
            // Teleport within the level: the world stays, no load or unload.
            debug!(level = %target, "same_level_teleport");
            self.phase = TransitionPhase::InitCycleWait;
            return TransitionUpdate::InProgress;
        }

        match provider.begin_load(&target) {
            Ok(()) => {
                self.phase = TransitionPhase::Loading;
                TransitionUpdate::InProgress
            }
            Err(error) => self.abort(active, &error),
        }
    }

    fn poll_loading(
        &mut self,
        provider: &mut dyn LevelProvider,
        active: &mut Option<ActiveLevel>,
    ) -> TransitionUpdate {
        let Some(target) = self.request.as_ref().map(|request| request.target.clone()) else {
            self.phase = TransitionPhase::Idle;
            return TransitionUpdate::Idle;
        };

        match provider.poll_load(&target) {
            LoadPoll::Pending => TransitionUpdate::InProgress,
            LoadPoll::Ready(world) => {
                self.loaded_world = Some(world);
                match active.as_ref().map(|level| level.level().clone()) {
                    Some(previous) => match provider.begin_unload(&previous) {
                        Ok(()) => {
                            self.phase = TransitionPhase::Unloading;
                            TransitionUpdate::InProgress
                        }
                        Err(error) => {
                            self.loaded_world = None;
                            self.abort(active, &error)
                        }
                    },
                    None => {
                        self.activate_loaded(active);
                        TransitionUpdate::InProgress
                    }
                }
            }
        }
    }

    fn poll_unloading(
        &mut self,
        provider: &mut dyn LevelProvider,
        active: &mut Option<ActiveLevel>,
    ) -> TransitionUpdate {
        let Some(previous) = active.as_ref().map(|level| level.level().clone()) else {
            self.activate_loaded(active);
            return TransitionUpdate::InProgress;
        };
        match provider.poll_unload(&previous) {
            UnloadPoll::Pending => TransitionUpdate::InProgress,
            UnloadPoll::Done => {
                self.activate_loaded(active);
                TransitionUpdate::InProgress
            }
        }
    }

    fn activate_loaded(&mut self, active: &mut Option<ActiveLevel>) {
        if let Some(world) = self.loaded_world.take() {
            info!(level = %world.level(), "level_activated");
            *active = Some(ActiveLevel::new(world));
        }
        self.phase = TransitionPhase::InitCycleWait;
    }

    /// Runs one full tick after activation, giving entities their
    /// initialization pass before any snapshot matching happens.
    fn apply_and_place(
        &mut self,
        active: &mut Option<ActiveLevel>,
        cache: &mut SessionStateCache,
        bus: &mut EventBus,
    ) -> TransitionUpdate {
        let (target, entry_point) = match self.request.as_ref() {
            Some(request) => (request.target.clone(), request.entry_point.clone()),
            None => {
                self.phase = TransitionPhase::Idle;
                return TransitionUpdate::Idle;
            }
        };

        if let Some(level) = active.as_mut() {
            level.run_entity_init_pass();
            if let Some(snapshot) = cache.level_state(&target) {
                let stats = level.apply_snapshot(snapshot);
                info!(
                    level = %target,
                    applied = stats.applied,
                    removed = stats.removed,
                    missing_expected = stats.missing_expected,
                    "level_state_restored"
                );
            }
            bus.publish(&GameEvent::LevelPostLoad {
                level: target.clone(),
            });
            place_player(level.world_mut(), &entry_point);
            level.world_mut().player_mut().control_enabled = true;
        } else {
            warn!(level = %target, "no_active_level_after_load");
        }

        self.fade.set_target(0.0);
        self.phase = TransitionPhase::FadingIn;
        TransitionUpdate::InProgress
    }

    /// Abort leaves the game recoverable rather than stuck mid-fade: control
    /// comes back, the overlay fades in, the guard clears on arrival.
    fn abort(
        &mut self,
        active: &mut Option<ActiveLevel>,
        error: &LevelLoadError,
    ) -> TransitionUpdate {
        warn!(error = %error, "transition_pipeline_aborted");
        if let Some(level) = active.as_mut() {
            level.world_mut().player_mut().control_enabled = true;
        }
        self.loaded_world = None;
        self.aborting = true;
        self.fade.set_target(0.0);
        self.phase = TransitionPhase::FadingIn;
        TransitionUpdate::InProgress
    }
}

impl Default for TransitionOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_FADE_DURATION_SECONDS)
    }
}

/// Entry point resolution failing leaves the player where they are; the
/// transition still completes.
fn place_player(world: &mut LevelWorld, entry_point: &str) {
    match world.find_entry_point(entry_point).map(|entry| entry.position) {
        Some(position) => {
            let player = world.player_mut();
            player.position = position;
            player.velocity = Vec2::default();
            debug!(entry_point, "player_placed");
        }
        None => warn!(
            level = %world.level(),
            entry_point,
            "entry_point_unresolved"
        ),
    }
}
