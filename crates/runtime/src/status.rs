use tracing::{debug, info};

use crate::events::{EventBus, GameEvent};

/// High-level mode of the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameStatus {
    Menu,
    Loading,
    Playing,
    Paused,
    InDialogue,
    InCutscene,
    GameOver,
}

pub const TIME_SCALE_RUNNING: f32 = 1.0;
pub const TIME_SCALE_FROZEN: f32 = 0.0;

/// Flat state machine over [`GameStatus`]: any state may transition to any
/// other through [`change_status`]; `GameOver` is terminal in practice and is
/// left only by the session end flow. The machine is the sole owner of the
/// global time-scale side effect. Other components request a status change
/// instead of touching time themselves, so pause state cannot diverge.
///
/// [`change_status`]: GameStatusMachine::change_status
pub struct GameStatusMachine {
    current: GameStatus,
    previous: Option<GameStatus>,
    time_scale: f32,
}

impl GameStatusMachine {
    pub fn new() -> Self {
        Self {
            current: GameStatus::Loading,
            previous: None,
            time_scale: TIME_SCALE_RUNNING,
        }
    }

    pub fn current(&self) -> GameStatus {
        self.current
    }

    pub fn previous(&self) -> Option<GameStatus> {
        self.previous
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Returns whether the status actually changed. A request for the current
    /// status publishes nothing, so two identical requests in a row produce
    /// exactly one `StatusChanged` event.
    pub fn change_status(&mut self, next: GameStatus, bus: &mut EventBus) -> bool {
        if next == self.current {
            debug!(status = ?next, "status_change_noop");
            return false;
        }

        let previous = self.current;
        self.previous = Some(previous);
        self.current = next;

        if next == GameStatus::Paused {
            self.time_scale = TIME_SCALE_FROZEN;
        } else if previous == GameStatus::Paused {
            self.time_scale = TIME_SCALE_RUNNING;
        }

        info!(previous = ?previous, current = ?next, "status_changed");
        bus.publish(&GameEvent::StatusChanged {
            previous,
            current: next,
        });
        true
    }
}

impl Default for GameStatusMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::events::EventKind;

    fn status_change_spy(bus: &mut EventBus) -> Rc<RefCell<Vec<(GameStatus, GameStatus)>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_for_handler = Rc::clone(&seen);
        bus.subscribe(EventKind::StatusChanged, move |event| {
            if let GameEvent::StatusChanged { previous, current } = event {
                seen_for_handler.borrow_mut().push((*previous, *current));
            }
        });
        seen
    }

    #[test]
    fn initial_state_is_loading_with_running_time() {
        let machine = GameStatusMachine::new();
        assert_eq!(machine.current(), GameStatus::Loading);
        assert_eq!(machine.previous(), None);
        assert_eq!(machine.time_scale(), TIME_SCALE_RUNNING);
    }

    #[test]
    fn repeated_change_to_same_status_publishes_once() {
        let mut bus = EventBus::default();
        let seen = status_change_spy(&mut bus);
        let mut machine = GameStatusMachine::new();

        assert!(machine.change_status(GameStatus::Playing, &mut bus));
        assert!(!machine.change_status(GameStatus::Playing, &mut bus));

        assert_eq!(
            *seen.borrow(),
            vec![(GameStatus::Loading, GameStatus::Playing)]
        );
    }

    #[test]
    fn entering_and_leaving_paused_toggles_time_scale() {
        let mut bus = EventBus::default();
        let mut machine = GameStatusMachine::new();
        machine.change_status(GameStatus::Playing, &mut bus);

        machine.change_status(GameStatus::Paused, &mut bus);
        assert_eq!(machine.time_scale(), TIME_SCALE_FROZEN);

        machine.change_status(GameStatus::Playing, &mut bus);
        assert_eq!(machine.time_scale(), TIME_SCALE_RUNNING);
    }

    #[test]
    fn non_pause_transitions_leave_time_scale_alone() {
        let mut bus = EventBus::default();
        let mut machine = GameStatusMachine::new();

        machine.change_status(GameStatus::Playing, &mut bus);
        machine.change_status(GameStatus::InDialogue, &mut bus);
        machine.change_status(GameStatus::InCutscene, &mut bus);

        assert_eq!(machine.time_scale(), TIME_SCALE_RUNNING);
    }

    #[test]
    fn previous_status_tracks_the_last_real_change() {
        let mut bus = EventBus::default();
        let mut machine = GameStatusMachine::new();

        machine.change_status(GameStatus::Playing, &mut bus);
        machine.change_status(GameStatus::GameOver, &mut bus);

        assert_eq!(machine.previous(), Some(GameStatus::Playing));
        assert_eq!(machine.current(), GameStatus::GameOver);
    }
}
