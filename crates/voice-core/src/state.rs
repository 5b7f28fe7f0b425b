//! Agent lifecycle states and the table of legal transitions between them.
//!
//! `transition` is pure: the controller performs the side effects (opening
//! the session, tearing down audio) and feeds the outcome back in as an event.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentState {
    #[default]
    Idle,
    Listening,
    Thinking,
    Speaking,
    Error,
}

impl AgentState {
    /// True while a session is running.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            AgentState::Listening | AgentState::Thinking | AgentState::Speaking
        )
    }

    /// Whether a toggle in this state starts a session (otherwise it stops one).
    pub fn toggle_starts(self) -> bool {
        matches!(self, AgentState::Idle | AgentState::Error)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AgentState::Idle => "IDLE",
            AgentState::Listening => "LISTENING",
            AgentState::Thinking => "THINKING",
            AgentState::Speaking => "SPEAKING",
            AgentState::Error => "ERROR",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// Microphone, output and remote session are all up.
    Started,
    /// Any part of startup failed; everything was torn down.
    StartFailed,
    StopRequested,
    /// User speech transcription arrived.
    InputFragment,
    /// Agent speech transcription arrived.
    OutputFragment,
    AudioReceived,
    TurnComplete,
    RemoteClosed,
    RemoteError,
}

pub fn transition(state: AgentState, event: StateEvent) -> AgentState {
    use AgentState::*;
    use StateEvent::*;

    match (state, event) {
        (Idle | Error, Started) => Listening,
        (Idle | Error, StartFailed) => Error,

        (Listening | Thinking | Speaking, InputFragment) => Thinking,
        (Listening | Thinking | Speaking, OutputFragment | AudioReceived) => Speaking,
        (Listening | Thinking | Speaking, TurnComplete) => Listening,
        (Listening | Thinking | Speaking, StopRequested | RemoteClosed | RemoteError) => Idle,

        // Events that do not apply to the current state leave it unchanged.
        (state, _) => state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTIVE: [AgentState; 3] = [
        AgentState::Listening,
        AgentState::Thinking,
        AgentState::Speaking,
    ];

    #[test]
    fn start_outcome_decides_listening_or_error() {
        assert_eq!(transition(AgentState::Idle, StateEvent::Started), AgentState::Listening);
        assert_eq!(transition(AgentState::Idle, StateEvent::StartFailed), AgentState::Error);
        assert_eq!(transition(AgentState::Error, StateEvent::Started), AgentState::Listening);
    }

    #[test]
    fn conversation_cycle() {
        let mut state = transition(AgentState::Idle, StateEvent::Started);
        state = transition(state, StateEvent::InputFragment);
        assert_eq!(state, AgentState::Thinking);
        state = transition(state, StateEvent::AudioReceived);
        assert_eq!(state, AgentState::Speaking);
        state = transition(state, StateEvent::OutputFragment);
        assert_eq!(state, AgentState::Speaking);
        state = transition(state, StateEvent::TurnComplete);
        assert_eq!(state, AgentState::Listening);
    }

    #[test]
    fn every_active_state_stops_to_idle() {
        for state in ACTIVE {
            for event in [
                StateEvent::StopRequested,
                StateEvent::RemoteClosed,
                StateEvent::RemoteError,
            ] {
                assert_eq!(transition(state, event), AgentState::Idle, "{:?} {:?}", state, event);
            }
        }
    }

    #[test]
    fn content_is_ignored_outside_a_session() {
        for state in [AgentState::Idle, AgentState::Error] {
            for event in [
                StateEvent::InputFragment,
                StateEvent::OutputFragment,
                StateEvent::AudioReceived,
                StateEvent::TurnComplete,
                StateEvent::RemoteClosed,
            ] {
                assert_eq!(transition(state, event), state);
            }
        }
    }

    #[test]
    fn start_events_do_not_apply_while_active() {
        for state in ACTIVE {
            assert_eq!(transition(state, StateEvent::Started), state);
            assert_eq!(transition(state, StateEvent::StartFailed), state);
        }
    }

    #[test]
    fn toggle_direction() {
        assert!(AgentState::Idle.toggle_starts());
        assert!(AgentState::Error.toggle_starts());
        assert!(ACTIVE.iter().all(|s| !s.toggle_starts() && s.is_active()));
    }

    #[test]
    fn serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&AgentState::Listening).unwrap(),
            "\"LISTENING\""
        );
        assert_eq!(AgentState::Speaking.to_string(), "SPEAKING");
    }
}
