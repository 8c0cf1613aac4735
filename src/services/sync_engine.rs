//! Reducer turning game events into state changes.
//!
//! The same [`apply_event`] runs for optimistic local updates and for events
//! received from the relay, so every client converges on the same state when it
//! sees the same events.

use tracing::{debug, warn};

use crate::{
    dto::message::{GameEvent, GameMessage},
    state::{
        game::{Player, SentenceEntry, SharedGameState, VoteEntry},
        state_machine::GamePhase,
    },
};

/// What applying an event did to the local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event was applied; `from` and `to` are the phases around it.
    Applied {
        /// Phase before the event.
        from: GamePhase,
        /// Phase after it.
        to: GamePhase,
    },
    /// The event was published by this client and was skipped.
    SelfEcho,
    /// The event was overtaken by a newer one and left the state untouched.
    Stale,
}

/// Apply one event to `state`.
pub fn apply_event(state: &mut SharedGameState, event: &GameEvent) -> Outcome {
    let from = state.phase;

    match event {
        GameEvent::PlayerJoined(payload) => {
            state.upsert_player(payload.player.clone());
        }
        GameEvent::GameStarted(payload) => {
            // A new session starts from the first question, even on a client
            // that is still showing the end of the previous one.
            state.phase = GamePhase::Spinning;
            state.current_question = payload.question.clone();
            state.question_index = 0;
            state.selected_team = None;
            state.live_sentence_words.clear();
            state.sentences.clear();
            state.votes.clear();
        }
        GameEvent::TeamSelected(payload) => {
            state.selected_team = Some(payload.team.clone());
            state.phase = GamePhase::Spinning;
        }
        GameEvent::SentenceUpdate(payload) => {
            state.live_sentence_words = payload.words.clone();
        }
        GameEvent::SentenceSubmitted(payload) => {
            state.upsert_sentence(SentenceEntry {
                player_id: payload.player_id.clone(),
                sentence: payload.sentence.clone(),
            });
            state.phase = GamePhase::Voting;
            state.live_sentence_words.clear();
        }
        GameEvent::VoteCast(payload) => {
            state.upsert_vote(VoteEntry {
                player_id: payload.player_id.clone(),
                vote: payload.vote,
                reason: payload.reason.clone(),
            });
            // Every client closes the round on the same vote, even if the
            // closing phase change never arrives.
            if state.phase == GamePhase::Voting && state.voting_complete() {
                state.phase = GamePhase::Results;
            }
        }
        GameEvent::PhaseChanged(payload) => {
            if !payload.transition.apply(state) {
                return Outcome::Stale;
            }
        }
        GameEvent::ForceSubmit(payload) => {
            if !payload.transition.apply(state) {
                return Outcome::Stale;
            }
        }
        GameEvent::GameReset(payload) => {
            *state = payload.new_state.clone();
        }
    }

    Outcome::Applied {
        from,
        to: state.phase,
    }
}

/// Per-client store: the replicated state plus the local identity.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    state: SharedGameState,
    local_player: Option<Player>,
}

impl SyncEngine {
    /// Fresh client on the landing screen.
    pub fn new(teams: &[String]) -> Self {
        Self {
            state: SharedGameState::new(teams),
            local_player: None,
        }
    }

    /// Current replicated state.
    pub fn state(&self) -> &SharedGameState {
        &self.state
    }

    /// Player registered on this client, if any.
    pub fn local_player(&self) -> Option<&Player> {
        self.local_player.as_ref()
    }

    /// Id used to recognise our own frames.
    pub fn local_id(&self) -> Option<&str> {
        self.local_player.as_ref().map(|player| player.id.as_str())
    }

    pub(crate) fn state_mut(&mut self) -> &mut SharedGameState {
        &mut self.state
    }

    pub(crate) fn set_local_player(&mut self, player: Player) {
        self.local_player = Some(player);
    }

    /// Apply an event produced by this client before it is published.
    pub fn apply_local(&mut self, event: &GameEvent) -> Outcome {
        let outcome = apply_event(&mut self.state, event);
        debug!(kind = event.kind(), ?outcome, "applied local event");
        outcome
    }

    /// Apply an event received from the relay, skipping our own.
    pub fn apply_remote(&mut self, event: &GameEvent) -> Outcome {
        if self.local_id() == Some(event.sender_id()) {
            return Outcome::SelfEcho;
        }

        let outcome = apply_event(&mut self.state, event);
        debug!(
            kind = event.kind(),
            sender = event.sender_id(),
            ?outcome,
            "applied remote event"
        );
        outcome
    }

    /// Decode and apply a raw relay frame. Undecodable frames are dropped.
    pub fn receive_frame(&mut self, frame: &str) -> Option<Outcome> {
        match GameMessage::decode(frame) {
            Ok(message) => Some(self.apply_remote(&message.event)),
            Err(err) => {
                warn!(error = %err, "dropping undecodable frame");
                None
            }
        }
    }

    /// Return to landing defaults and forget the local identity.
    pub fn reset(&mut self, teams: &[String]) {
        self.state = SharedGameState::new(teams);
        self.local_player = None;
    }
}
