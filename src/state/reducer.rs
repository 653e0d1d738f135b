//! State transition function.

use super::Command;
use crate::types::{NotificationId, State};

/// Timer side effect requested by a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Purge this id after the grace delay, unless already scheduled.
    ScheduleRemoval(NotificationId),
    /// Drop any pending purge for this id.
    CancelRemoval(NotificationId),
}

/// Result of applying one command.
#[derive(Clone, Debug)]
pub struct Transition<C> {
    pub state: State<C>,
    /// Effects in the order they must be applied.
    pub effects: Vec<Effect>,
}

impl<C> Transition<C> {
    fn pure(state: State<C>) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }
}

/// Apply a command to a state.
///
/// The input state is left untouched; the returned state is a fresh
/// aggregate. `limit` bounds the number of active notifications.
pub fn apply_command<C: Clone>(
    state: &State<C>,
    command: Command<C>,
    limit: usize,
) -> Transition<C> {
    match command {
        Command::Add(notification) => {
            // A live id is merged into, never duplicated
            if state.contains(&notification.id) {
                return apply_command(state, Command::Update(notification.into()), limit);
            }

            let mut notifications = Vec::with_capacity(state.notifications.len() + 1);
            notifications.push(notification);
            notifications.extend(state.notifications.iter().cloned());

            // Evicted entries must not leave purge timers behind
            let effects = notifications
                .split_off(limit.min(notifications.len()))
                .into_iter()
                .map(|evicted| Effect::CancelRemoval(evicted.id))
                .collect();

            Transition {
                state: State {
                    notifications,
                    paused_at: state.paused_at,
                },
                effects,
            }
        }

        Command::Update(patch) => {
            let id = patch.id.clone();
            let mut next = state.clone();

            // A dismissed entry keeps its purge deadline
            let effects = match next.notifications.iter_mut().find(|n| n.id == id) {
                Some(target) if !target.visible => {
                    patch.apply_to(target);
                    Vec::new()
                }
                Some(target) => {
                    patch.apply_to(target);
                    vec![Effect::CancelRemoval(id)]
                }
                None => vec![Effect::CancelRemoval(id)],
            };

            Transition {
                state: next,
                effects,
            }
        }

        Command::Upsert(notification) => {
            if state.contains(&notification.id) {
                apply_command(state, Command::Update(notification.into()), limit)
            } else {
                apply_command(state, Command::Add(notification), limit)
            }
        }

        Command::Dismiss(target) => {
            let mut next = state.clone();
            let mut effects = Vec::new();

            for n in next.notifications.iter_mut() {
                if target.as_ref().map_or(true, |id| &n.id == id) {
                    n.visible = false;
                    effects.push(Effect::ScheduleRemoval(n.id.clone()));
                }
            }

            Transition {
                state: next,
                effects,
            }
        }

        Command::Remove(None) => Transition {
            effects: state
                .notifications
                .iter()
                .map(|n| Effect::CancelRemoval(n.id.clone()))
                .collect(),
            state: State {
                notifications: Vec::new(),
                paused_at: state.paused_at,
            },
        },

        Command::Remove(Some(id)) => {
            let notifications = state
                .notifications
                .iter()
                .filter(|n| n.id != id)
                .cloned()
                .collect();

            Transition {
                state: State {
                    notifications,
                    paused_at: state.paused_at,
                },
                effects: vec![Effect::CancelRemoval(id)],
            }
        }

        Command::Pause(time) => Transition::pure(State {
            notifications: state.notifications.clone(),
            paused_at: Some(time),
        }),

        Command::Unpause(time) => {
            let Some(paused_at) = state.paused_at else {
                // Not paused: nothing to credit
                return Transition::pure(state.clone());
            };

            let frozen = time.duration_since(paused_at);
            let notifications = state
                .notifications
                .iter()
                .cloned()
                .map(|mut n| {
                    n.pause_duration += frozen;
                    n
                })
                .collect();

            Transition::pure(State {
                notifications,
                paused_at: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Kind, Notification, NotificationPatch, Timestamp};
    use std::time::Duration;

    const LIMIT: usize = 10;

    fn note(id: &str) -> Notification<&'static str> {
        Notification::new(id.into(), Kind::Info, "hello", Timestamp(0))
    }

    fn ids(state: &State<&'static str>) -> Vec<String> {
        state.notifications.iter().map(|n| n.id.0.clone()).collect()
    }

    fn run(state: &State<&'static str>, command: Command<&'static str>) -> State<&'static str> {
        apply_command(state, command, LIMIT).state
    }

    #[test]
    fn test_add_prepends() {
        let state = run(&State::new(), Command::add(note("a")));
        let state = run(&state, Command::add(note("b")));
        assert_eq!(ids(&state), vec!["b", "a"]);
    }

    #[test]
    fn test_add_evicts_oldest_and_cancels_its_purge() {
        let mut state = State::new();
        for i in 0..3 {
            state = apply_command(&state, Command::add(note(&i.to_string())), 3).state;
        }

        let transition = apply_command(&state, Command::add(note("3")), 3);
        assert_eq!(ids(&transition.state), vec!["3", "2", "1"]);
        assert_eq!(transition.effects, vec![Effect::CancelRemoval("0".into())]);
    }

    #[test]
    fn test_add_live_id_merges() {
        let state = run(&State::new(), Command::add(note("a")));
        let state = run(&state, Command::add(note("b")));
        let mut again = note("a");
        again.content = "again";
        let transition = apply_command(&state, Command::add(again), LIMIT);

        assert_eq!(ids(&transition.state), vec!["b", "a"]);
        assert_eq!(transition.state.notifications[1].content, "again");
        assert_eq!(transition.effects, vec![Effect::CancelRemoval("a".into())]);
    }

    #[test]
    fn test_input_state_untouched() {
        let state = run(&State::new(), Command::add(note("a")));
        let _ = run(&state, Command::dismiss("a"));
        assert!(state.notifications[0].visible);
    }

    #[test]
    fn test_update_merges_and_cancels() {
        let state = run(&State::new(), Command::add(note("a")));
        let transition = apply_command(
            &state,
            Command::update(NotificationPatch::new("a".into()).with_height(32)),
            LIMIT,
        );

        assert_eq!(transition.state.notifications[0].height, Some(32));
        assert_eq!(transition.effects, vec![Effect::CancelRemoval("a".into())]);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let state = run(&State::new(), Command::add(note("a")));
        let next = run(
            &state,
            Command::update(NotificationPatch::new("zzz".into()).with_content("other")),
        );
        assert_eq!(ids(&next), vec!["a"]);
        assert_eq!(next.notifications[0].content, "hello");
    }

    #[test]
    fn test_update_of_dismissed_keeps_purge() {
        let state = run(&State::new(), Command::add(note("a")));
        let state = run(&state, Command::dismiss("a"));

        let transition = apply_command(
            &state,
            Command::update(NotificationPatch::new("a".into()).with_height(10)),
            LIMIT,
        );
        assert!(transition.effects.is_empty());
        assert_eq!(transition.state.notifications[0].height, Some(10));
        assert!(!transition.state.notifications[0].visible);
    }

    #[test]
    fn test_upsert_replaces_without_duplicating() {
        let state = run(&State::new(), Command::upsert(note("a")));
        let mut replacement = note("a");
        replacement.content = "replaced";
        replacement.kind = Kind::Success;
        let state = run(&state, Command::upsert(replacement));

        assert_eq!(state.len(), 1);
        assert_eq!(state.notifications[0].content, "replaced");
        assert_eq!(state.notifications[0].kind, Kind::Success);
    }

    #[test]
    fn test_upsert_does_not_revive_dismissed() {
        let state = run(&State::new(), Command::upsert(note("a")));
        let state = run(&state, Command::dismiss("a"));
        let state = run(&state, Command::upsert(note("a")));
        assert!(!state.notifications[0].visible);
    }

    #[test]
    fn test_dismiss_one() {
        let state = run(&State::new(), Command::add(note("a")));
        let state = run(&state, Command::add(note("b")));
        let transition = apply_command(&state, Command::dismiss("a"), LIMIT);

        let a = transition.state.get(&"a".into()).unwrap();
        let b = transition.state.get(&"b".into()).unwrap();
        assert!(!a.visible);
        assert!(b.visible);
        assert_eq!(transition.effects, vec![Effect::ScheduleRemoval("a".into())]);
    }

    #[test]
    fn test_dismiss_unknown_schedules_nothing() {
        let state = run(&State::new(), Command::add(note("a")));
        let transition = apply_command(&state, Command::dismiss("ghost"), LIMIT);
        assert!(transition.effects.is_empty());
        assert!(transition.state.notifications[0].visible);
    }

    #[test]
    fn test_dismiss_all() {
        let state = run(&State::new(), Command::add(note("a")));
        let state = run(&state, Command::add(note("b")));
        let transition = apply_command(&state, Command::dismiss_all(), LIMIT);

        assert!(transition.state.notifications.iter().all(|n| !n.visible));
        assert_eq!(transition.effects.len(), 2);
    }

    #[test]
    fn test_remove() {
        let state = run(&State::new(), Command::add(note("a")));
        let state = run(&state, Command::add(note("b")));

        let transition = apply_command(&state, Command::remove("a"), LIMIT);
        assert_eq!(ids(&transition.state), vec!["b"]);
        assert_eq!(transition.effects, vec![Effect::CancelRemoval("a".into())]);

        let cleared = run(&transition.state, Command::remove_all());
        assert!(cleared.is_empty());
    }

    #[test]
    fn test_remove_keeps_pause() {
        let state = run(&State::new(), Command::pause(Timestamp(7)));
        let state = run(&state, Command::remove_all());
        assert_eq!(state.paused_at, Some(Timestamp(7)));
    }

    #[test]
    fn test_pause_overwrites() {
        let state = run(&State::new(), Command::add(note("a")));
        let state = run(&state, Command::pause(Timestamp(100)));
        let state = run(&state, Command::pause(Timestamp(300)));
        assert_eq!(state.paused_at, Some(Timestamp(300)));

        let state = run(&state, Command::unpause(Timestamp(500)));
        assert_eq!(state.notifications[0].pause_duration, Duration::from_millis(200));
        assert_eq!(state.paused_at, None);
    }

    #[test]
    fn test_unpause_credits_every_notification() {
        let state = run(&State::new(), Command::add(note("a")));
        let state = run(&state, Command::add(note("b")));
        let state = run(&state, Command::pause(Timestamp(1000)));
        let state = run(&state, Command::unpause(Timestamp(3000)));

        for n in &state.notifications {
            assert_eq!(n.pause_duration, Duration::from_millis(2000));
        }
    }

    #[test]
    fn test_unpause_when_not_paused_is_noop() {
        let state = run(&State::new(), Command::add(note("a")));
        let state = run(&state, Command::unpause(Timestamp(1_700_000_000_000)));
        assert_eq!(state.notifications[0].pause_duration, Duration::ZERO);
    }

    #[test]
    fn test_unpause_before_pause_never_shrinks() {
        let state = run(&State::new(), Command::add(note("a")));
        let state = run(&state, Command::pause(Timestamp(500)));
        let state = run(&state, Command::unpause(Timestamp(400)));
        assert_eq!(state.notifications[0].pause_duration, Duration::ZERO);
    }
}
