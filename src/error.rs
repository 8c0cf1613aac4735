use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::state::state_machine::{GamePhase, InvalidTransition};

/// Reasons a local intent is rejected. A rejected intent changes nothing and
/// publishes nothing.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The intent needs a registered local player.
    #[error("no local player is registered")]
    NotRegistered,
    /// Registration was attempted twice on the same client.
    #[error("already registered as `{0}`")]
    AlreadyRegistered(String),
    /// Admin-only intent attempted by a regular player.
    #[error("only an admin may {0}")]
    NotAdmin(&'static str),
    /// The intent is not legal from the current phase.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// Registration form failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    /// Input is well-formed but not acceptable.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The player already voted on the current sentence.
    #[error("player `{0}` has already voted this round")]
    AlreadyVoted(String),
    /// Only the selected team and admins may edit the sentence.
    #[error("only team `{team}` or an admin may edit the sentence")]
    CannotEdit {
        /// Team currently building the sentence.
        team: String,
    },
    /// Continue was requested before the wheel picked a team.
    #[error("no team has been selected")]
    NoTeamSelected,
    /// Every team already played the current question.
    #[error("no teams are left to pick from")]
    NoTeamsLeft,
    /// Neither predefined nor player questions exist.
    #[error("no question is available")]
    NoQuestions,
    /// Submit was requested with an empty sentence.
    #[error("the sentence has no words")]
    EmptySentence,
    /// Removal of a word that does not exist.
    #[error("no word at position {0}")]
    NoSuchWord(usize),
}

/// Errors raised while decoding a relay frame. The frame is dropped.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, unknown kind, or a payload that does not match its kind.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    /// The declared phase disagrees with the phase implied by the command.
    #[error("declared phase {declared:?} does not match transition target {implied:?}")]
    InconsistentPhase {
        /// Phase written in the payload.
        declared: GamePhase,
        /// Phase the transition command leads to.
        implied: GamePhase,
    },
}

/// Relay server errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// The relay cannot accept another connection.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
