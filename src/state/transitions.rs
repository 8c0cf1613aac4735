use serde::{Deserialize, Serialize};

use crate::state::{game::SharedGameState, state_machine::GamePhase};

/// Typed phase change carried by `phase_changed` and `force_submit`.
///
/// Each command names the fields it is allowed to touch, so a broadcast can never
/// overwrite state that its transition does not own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "command",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum TransitionCommand {
    /// Spinning → sentence, with the selected team removed from the pool.
    BeginSentence {
        /// Pool left once the selected team is taken out.
        available_teams: Vec<String>,
    },
    /// Voting → results.
    CloseVoting,
    /// Results → spinning for the next team on the same question.
    NextTeam,
    /// Results → spinning on a fresh question with a full team pool.
    NextQuestion {
        /// Must be ahead of the receiver's index, otherwise the command is stale.
        question_index: usize,
        /// Text of the new question.
        current_question: String,
        /// Every configured team.
        available_teams: Vec<String>,
    },
    /// Results → finished.
    Finish,
}

impl TransitionCommand {
    /// Phase every client lands in once the command is applied.
    pub fn target_phase(&self) -> GamePhase {
        match self {
            TransitionCommand::BeginSentence { .. } => GamePhase::Sentence,
            TransitionCommand::CloseVoting => GamePhase::Results,
            TransitionCommand::NextTeam | TransitionCommand::NextQuestion { .. } => {
                GamePhase::Spinning
            }
            TransitionCommand::Finish => GamePhase::Finished,
        }
    }

    /// Apply the command, returning `false` when it is stale and was skipped.
    ///
    /// A `NextQuestion` that does not move `question_index` forward has already
    /// been applied (or was overtaken) and leaves the state untouched. A
    /// `CloseVoting` outside voting arrived after the round moved on.
    pub fn apply(&self, state: &mut SharedGameState) -> bool {
        match self {
            TransitionCommand::BeginSentence { available_teams } => {
                state.available_teams = available_teams.clone();
            }
            TransitionCommand::CloseVoting => {
                if state.phase != GamePhase::Voting {
                    return false;
                }
            }
            TransitionCommand::Finish => {}
            TransitionCommand::NextTeam => {
                clear_round(state);
            }
            TransitionCommand::NextQuestion {
                question_index,
                current_question,
                available_teams,
            } => {
                if *question_index <= state.question_index {
                    return false;
                }
                clear_round(state);
                state.question_index = *question_index;
                state.current_question = current_question.clone();
                state.available_teams = available_teams.clone();
            }
        }

        state.phase = self.target_phase();
        true
    }
}

fn clear_round(state: &mut SharedGameState) {
    state.selected_team = None;
    state.sentences.clear();
    state.votes.clear();
}
