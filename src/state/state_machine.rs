use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Screens a client can be on. The order mirrors the flow of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Registration form; the client has no identity yet.
    #[default]
    Landing,
    /// Registered and waiting for an admin to start.
    Waiting,
    /// The admin spins the wheel to pick the next team.
    Spinning,
    /// The selected team builds its sentence.
    Sentence,
    /// Everybody votes on the submitted sentence.
    Voting,
    /// Tally of the round.
    Results,
    /// Every question has been played.
    Finished,
}

/// Local intents checked against the phase graph before anything is broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Submit the registration form.
    Register,
    /// Admin starts the session with the first question.
    StartGame,
    /// Admin spins the wheel (first spin or spin again).
    SelectTeam,
    /// Move on with the selected team.
    ConfirmTeam,
    /// Add, remove or clear words of the live sentence.
    EditSentence,
    /// Submit the live sentence for voting.
    SubmitSentence,
    /// Cast a vote on the current sentence.
    CastVote,
    /// All votes are in, or the admin forces the round closed.
    CloseVoting,
    /// Continue with the next team on the same question.
    NextTeam,
    /// Continue with the next question.
    NextQuestion,
    /// No questions are left.
    Finish,
    /// Leave the final screen and start over.
    Restart,
}

/// Error returned when an intent is not legal from the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the client was in when the intent was made.
    pub from: GamePhase,
    /// The rejected intent.
    pub event: PhaseEvent,
}

impl GamePhase {
    /// Compute the phase reached by `event`, or reject it when the edge does not exist.
    pub fn next(self, event: PhaseEvent) -> Result<GamePhase, InvalidTransition> {
        let next = match (self, event) {
            (GamePhase::Landing, PhaseEvent::Register) => GamePhase::Waiting,
            (GamePhase::Waiting, PhaseEvent::StartGame) => GamePhase::Spinning,
            (GamePhase::Spinning, PhaseEvent::SelectTeam) => GamePhase::Spinning,
            (GamePhase::Spinning, PhaseEvent::ConfirmTeam) => GamePhase::Sentence,
            (GamePhase::Sentence, PhaseEvent::EditSentence) => GamePhase::Sentence,
            (GamePhase::Sentence, PhaseEvent::SubmitSentence) => GamePhase::Voting,
            (GamePhase::Voting, PhaseEvent::CastVote) => GamePhase::Voting,
            (GamePhase::Voting, PhaseEvent::CloseVoting) => GamePhase::Results,
            (GamePhase::Results, PhaseEvent::NextTeam | PhaseEvent::NextQuestion) => {
                GamePhase::Spinning
            }
            (GamePhase::Results, PhaseEvent::Finish) => GamePhase::Finished,
            (GamePhase::Finished, PhaseEvent::Restart) => GamePhase::Landing,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }

    /// Check an intent without caring about the target phase.
    pub fn ensure(self, event: PhaseEvent) -> Result<(), InvalidTransition> {
        self.next(event).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(phase: GamePhase, event: PhaseEvent) -> GamePhase {
        phase.next(event).unwrap()
    }

    #[test]
    fn initial_phase_is_landing() {
        assert_eq!(GamePhase::default(), GamePhase::Landing);
    }

    #[test]
    fn full_happy_path_through_session() {
        let mut phase = GamePhase::Landing;

        phase = apply(phase, PhaseEvent::Register);
        assert_eq!(phase, GamePhase::Waiting);
        phase = apply(phase, PhaseEvent::StartGame);
        assert_eq!(phase, GamePhase::Spinning);
        phase = apply(phase, PhaseEvent::SelectTeam);
        assert_eq!(phase, GamePhase::Spinning);
        phase = apply(phase, PhaseEvent::ConfirmTeam);
        assert_eq!(phase, GamePhase::Sentence);
        phase = apply(phase, PhaseEvent::EditSentence);
        assert_eq!(phase, GamePhase::Sentence);
        phase = apply(phase, PhaseEvent::SubmitSentence);
        assert_eq!(phase, GamePhase::Voting);
        phase = apply(phase, PhaseEvent::CastVote);
        assert_eq!(phase, GamePhase::Voting);
        phase = apply(phase, PhaseEvent::CloseVoting);
        assert_eq!(phase, GamePhase::Results);
        phase = apply(phase, PhaseEvent::Finish);
        assert_eq!(phase, GamePhase::Finished);
        phase = apply(phase, PhaseEvent::Restart);
        assert_eq!(phase, GamePhase::Landing);
    }

    #[test]
    fn results_loops_back_to_spinning() {
        assert_eq!(
            apply(GamePhase::Results, PhaseEvent::NextTeam),
            GamePhase::Spinning
        );
        assert_eq!(
            apply(GamePhase::Results, PhaseEvent::NextQuestion),
            GamePhase::Spinning
        );
    }

    #[test]
    fn invalid_transition_returns_error() {
        let err = GamePhase::Waiting
            .next(PhaseEvent::SubmitSentence)
            .unwrap_err();
        assert_eq!(err.from, GamePhase::Waiting);
        assert_eq!(err.event, PhaseEvent::SubmitSentence);
    }

    #[test]
    fn voting_cannot_be_skipped_from_sentence() {
        assert!(GamePhase::Sentence.ensure(PhaseEvent::CloseVoting).is_err());
        assert!(GamePhase::Spinning.ensure(PhaseEvent::CastVote).is_err());
        assert!(GamePhase::Landing.ensure(PhaseEvent::StartGame).is_err());
    }

    #[test]
    fn phases_serialize_as_snake_case() {
        let json = serde_json::to_string(&GamePhase::Finished).unwrap();
        assert_eq!(json, "\"finished\"");
        let phase: GamePhase = serde_json::from_str("\"voting\"").unwrap();
        assert_eq!(phase, GamePhase::Voting);
    }
}
