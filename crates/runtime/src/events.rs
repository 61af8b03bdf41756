use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::level::LevelId;
use crate::stages::StageId;
use crate::status::GameStatus;

/// Every message that crosses component boundaries. A closed union rather
/// than an open type-keyed map: dispatch is by the derived [`EventKind`] tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    StatusChanged {
        previous: GameStatus,
        current: GameStatus,
    },
    TransitionRequested {
        target: LevelId,
        entry_point: String,
    },
    LevelPreUnload {
        level: LevelId,
    },
    LevelPostLoad {
        level: LevelId,
    },
    ObjectiveCompleted {
        objective: String,
    },
    StageEntered {
        stage: StageId,
    },
    StageTimerElapsed {
        stage: StageId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StatusChanged,
    TransitionRequested,
    LevelPreUnload,
    LevelPostLoad,
    ObjectiveCompleted,
    StageEntered,
    StageTimerElapsed,
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StatusChanged { .. } => EventKind::StatusChanged,
            Self::TransitionRequested { .. } => EventKind::TransitionRequested,
            Self::LevelPreUnload { .. } => EventKind::LevelPreUnload,
            Self::LevelPostLoad { .. } => EventKind::LevelPostLoad,
            Self::ObjectiveCompleted { .. } => EventKind::ObjectiveCompleted,
            Self::StageEntered { .. } => EventKind::StageEntered,
            Self::StageTimerElapsed { .. } => EventKind::StageTimerElapsed,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]; closures cannot be compared,
/// so removal goes through the handle instead of the handler value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("a timed event named '{name}' is already pending")]
    DuplicateTimerName { name: String },
}

type EventHandler = Box<dyn FnMut(&GameEvent)>;

struct TimedRegistration {
    name: String,
    fire_at_seconds: f64,
    event: GameEvent,
}

/// Synchronous publish/subscribe plus one-shot named delayed events.
///
/// Handlers for one kind run in unspecified order and must be independent of
/// each other. Due timed events are not self-published: [`EventBus::advance`]
/// hands them back so the session owns a single publish path.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<(SubscriberId, EventHandler)>>,
    next_subscriber_id: u64,
    pending_timed: Vec<TimedRegistration>,
    elapsed_seconds: f64,
}

impl EventBus {
    pub fn subscribe(
        &mut self,
        kind: EventKind,
        handler: impl FnMut(&GameEvent) + 'static,
    ) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber_id);
        self.next_subscriber_id = self.next_subscriber_id.saturating_add(1);
        self.handlers
            .entry(kind)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        for list in self.handlers.values_mut() {
            let before = list.len();
            list.retain(|(subscriber, _)| *subscriber != id);
            if list.len() != before {
                return true;
            }
        }
        false
    }

    /// Publishing to zero subscribers is a silent no-op.
    pub fn publish(&mut self, event: &GameEvent) {
        let Some(list) = self.handlers.get_mut(&event.kind()) else {
            return;
        };
        for (_, handler) in list.iter_mut() {
            handler(event);
        }
    }

    /// Registers a one-shot delayed publish of `event` after `delay_seconds`.
    /// Names must be unique among currently pending registrations; the name
    /// becomes available again once the timer fires or is canceled.
    pub fn schedule_timed(
        &mut self,
        name: &str,
        delay_seconds: f32,
        event: GameEvent,
    ) -> Result<(), TimerError> {
        if self.pending_timed.iter().any(|timed| timed.name == name) {
            return Err(TimerError::DuplicateTimerName {
                name: name.to_string(),
            });
        }
        let fire_at_seconds = self.elapsed_seconds + f64::from(delay_seconds.max(0.0));
        debug!(name, delay_seconds, "timed_event_scheduled");
        self.pending_timed.push(TimedRegistration {
            name: name.to_string(),
            fire_at_seconds,
            event,
        });
        Ok(())
    }

    /// Removes a pending registration if present. Firing is idempotent: a
    /// timer that already fired is gone and returns `false` here.
    pub fn cancel_timed(&mut self, name: &str) -> bool {
        let before = self.pending_timed.len();
        self.pending_timed.retain(|timed| timed.name != name);
        let canceled = before != self.pending_timed.len();
        if canceled {
            debug!(name, "timed_event_canceled");
        }
        canceled
    }

    pub fn has_pending_timed(&self, name: &str) -> bool {
        self.pending_timed.iter().any(|timed| timed.name == name)
    }

    pub fn pending_timed_count(&self) -> usize {
        self.pending_timed.len()
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    /// Advances the monotonic clock and returns every registration whose
    /// delay has elapsed, exactly once each, in registration order.
    pub fn advance(&mut self, dt_seconds: f32) -> Vec<GameEvent> {
        self.elapsed_seconds += f64::from(dt_seconds.max(0.0));
        if self.pending_timed.is_empty() {
            return Vec::new();
        }

        let elapsed = self.elapsed_seconds;
        let mut due = Vec::new();
        let mut still_pending = Vec::with_capacity(self.pending_timed.len());
        for timed in self.pending_timed.drain(..) {
            if timed.fire_at_seconds <= elapsed {
                debug!(name = %timed.name, "timed_event_fired");
                due.push(timed.event);
            } else {
                still_pending.push(timed);
            }
        }
        self.pending_timed = still_pending;
        due
    }
}
