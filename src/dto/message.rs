//! Wire format of the events exchanged between clients through the relay.
//!
//! A frame is a JSON object `{ "type", "payload", "timestamp" }`. Every payload
//! carries the full value needed to apply it plus the `senderId` of the client
//! that broadcast it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{
    error::DecodeError,
    state::{
        game::{Player, PlayerId, SharedGameState, VoteChoice},
        state_machine::GamePhase,
        transitions::TransitionCommand,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A player registered on some client.
pub struct PlayerJoined {
    /// Player whose client broadcast the event.
    pub sender_id: PlayerId,
    /// The new player, upserted by id.
    pub player: Player,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// The admin started the session with its first question.
pub struct GameStarted {
    /// Player whose client broadcast the event.
    pub sender_id: PlayerId,
    /// Question shown for the first round.
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// The admin's wheel landed on `team`.
pub struct TeamSelected {
    /// Player whose client broadcast the event.
    pub sender_id: PlayerId,
    /// Team that will build the next sentence.
    pub team: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Full replacement of the live sentence being edited.
pub struct SentenceUpdate {
    /// Player whose client broadcast the event.
    pub sender_id: PlayerId,
    /// Every word of the sentence, in order.
    pub words: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A sentence handed in for voting.
pub struct SentenceSubmitted {
    /// Player whose client broadcast the event.
    pub sender_id: PlayerId,
    /// Player the sentence is recorded under.
    pub player_id: PlayerId,
    /// The submitted words joined by single spaces.
    pub sentence: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// One player's vote on the current sentence.
pub struct VoteCast {
    /// Player whose client broadcast the event.
    pub sender_id: PlayerId,
    /// Voter; a second vote from the same player replaces the first.
    pub player_id: PlayerId,
    /// Agree or disagree.
    pub vote: VoteChoice,
    /// Free-text justification, possibly empty.
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Phase change requested by a player continuing the game.
pub struct PhaseChanged {
    /// Player whose client broadcast the event.
    pub sender_id: PlayerId,
    /// Phase the command leads to; must agree with `transition`.
    pub new_phase: GamePhase,
    /// What to do besides moving the phase.
    pub transition: TransitionCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Admin override closing the voting round early.
pub struct ForceSubmit {
    /// Player whose client broadcast the event.
    pub sender_id: PlayerId,
    /// Phase the command leads to; must agree with `transition`.
    pub next_phase: GamePhase,
    /// Always closes voting.
    pub transition: TransitionCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Wholesale replacement of the shared state.
pub struct GameReset {
    /// Player whose client broadcast the event.
    pub sender_id: PlayerId,
    /// State every receiver adopts as-is.
    pub new_state: SharedGameState,
}

impl PhaseChanged {
    /// Build the payload, deriving the target phase from `transition`.
    pub fn new(sender_id: PlayerId, transition: TransitionCommand) -> Self {
        Self {
            sender_id,
            new_phase: transition.target_phase(),
            transition,
        }
    }
}

impl ForceSubmit {
    /// Build the payload, deriving the next phase from `transition`.
    pub fn new(sender_id: PlayerId, transition: TransitionCommand) -> Self {
        Self {
            sender_id,
            next_phase: transition.target_phase(),
            transition,
        }
    }
}

/// Closed set of events a client can broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum GameEvent {
    /// `player_joined`
    PlayerJoined(PlayerJoined),
    /// `game_started`
    GameStarted(GameStarted),
    /// `team_selected`
    TeamSelected(TeamSelected),
    /// `sentence_update`
    SentenceUpdate(SentenceUpdate),
    /// `sentence_submitted`
    SentenceSubmitted(SentenceSubmitted),
    /// `vote_cast`
    VoteCast(VoteCast),
    /// `phase_changed`
    PhaseChanged(PhaseChanged),
    /// `force_submit`
    ForceSubmit(ForceSubmit),
    /// `game_reset`
    GameReset(GameReset),
}

impl GameEvent {
    /// Wire name of the event, used for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::PlayerJoined(_) => "player_joined",
            GameEvent::GameStarted(_) => "game_started",
            GameEvent::TeamSelected(_) => "team_selected",
            GameEvent::SentenceUpdate(_) => "sentence_update",
            GameEvent::SentenceSubmitted(_) => "sentence_submitted",
            GameEvent::VoteCast(_) => "vote_cast",
            GameEvent::PhaseChanged(_) => "phase_changed",
            GameEvent::ForceSubmit(_) => "force_submit",
            GameEvent::GameReset(_) => "game_reset",
        }
    }

    /// Identifier of the player whose client broadcast the event.
    pub fn sender_id(&self) -> &str {
        match self {
            GameEvent::PlayerJoined(payload) => &payload.sender_id,
            GameEvent::GameStarted(payload) => &payload.sender_id,
            GameEvent::TeamSelected(payload) => &payload.sender_id,
            GameEvent::SentenceUpdate(payload) => &payload.sender_id,
            GameEvent::SentenceSubmitted(payload) => &payload.sender_id,
            GameEvent::VoteCast(payload) => &payload.sender_id,
            GameEvent::PhaseChanged(payload) => &payload.sender_id,
            GameEvent::ForceSubmit(payload) => &payload.sender_id,
            GameEvent::GameReset(payload) => &payload.sender_id,
        }
    }

    /// Reject phase changes whose declared phase disagrees with their command.
    fn validate(&self) -> Result<(), DecodeError> {
        let (declared, transition) = match self {
            GameEvent::PhaseChanged(payload) => (payload.new_phase, &payload.transition),
            GameEvent::ForceSubmit(payload) => (payload.next_phase, &payload.transition),
            _ => return Ok(()),
        };

        let implied = transition.target_phase();
        if declared != implied {
            return Err(DecodeError::InconsistentPhase { declared, implied });
        }
        Ok(())
    }
}

/// An event stamped with the time it was published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameMessage {
    /// The event carried by the frame.
    pub event: GameEvent,
    /// Milliseconds since the Unix epoch; informational only.
    pub timestamp: i64,
}

impl GameMessage {
    /// Stamp `event` with the current wall-clock time.
    pub fn now(event: GameEvent) -> Self {
        Self {
            event,
            timestamp: epoch_millis(OffsetDateTime::now_utc()),
        }
    }

    /// Serialize into a relay frame.
    pub fn encode(&self) -> serde_json::Result<String> {
        let mut value = serde_json::to_value(&self.event)?;
        if let Value::Object(object) = &mut value {
            object.insert("timestamp".into(), self.timestamp.into());
        }
        serde_json::to_string(&value)
    }

    /// Parse a relay frame. Unknown kinds and malformed payloads are errors.
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        let mut value: Value = serde_json::from_str(frame)?;
        let timestamp = match &mut value {
            Value::Object(object) => object
                .remove("timestamp")
                .and_then(|stamp| stamp.as_i64())
                .unwrap_or_default(),
            _ => 0,
        };
        let event = GameEvent::deserialize(value)?;
        event.validate()?;

        Ok(Self { event, timestamp })
    }
}

fn epoch_millis(now: OffsetDateTime) -> i64 {
    now.unix_timestamp() * 1000 + i64::from(now.millisecond())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Player {
        Player {
            id: "alice".into(),
            name: "Alice".into(),
            team: "Executive".into(),
            role: "Manager".into(),
            is_admin: true,
            question: None,
        }
    }

    #[test]
    fn frame_uses_type_payload_timestamp_envelope() {
        let message = GameMessage {
            event: GameEvent::TeamSelected(TeamSelected {
                sender_id: "alice".into(),
                team: "Review".into(),
            }),
            timestamp: 1_700_000_000_123,
        };

        let frame: Value = serde_json::from_str(&message.encode().unwrap()).unwrap();
        assert_eq!(frame["type"], "team_selected");
        assert_eq!(frame["payload"]["team"], "Review");
        assert_eq!(frame["payload"]["senderId"], "alice");
        assert_eq!(frame["timestamp"], 1_700_000_000_123_i64);
    }

    #[test]
    fn decode_reads_back_player_joined() {
        let frame = r#"{
            "type": "player_joined",
            "payload": {
                "senderId": "alice",
                "player": {"id": "alice", "name": "Alice", "team": "Executive",
                           "role": "Manager", "isAdmin": true}
            },
            "timestamp": 42
        }"#;

        let message = GameMessage::decode(frame).unwrap();
        assert_eq!(message.timestamp, 42);
        assert_eq!(message.event.kind(), "player_joined");
        assert_eq!(message.event.sender_id(), "alice");
        match message.event {
            GameEvent::PlayerJoined(payload) => assert_eq!(payload.player, alice()),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let frame = r#"{"type": "player_left", "payload": {"senderId": "x"}, "timestamp": 1}"#;
        assert!(matches!(
            GameMessage::decode(frame),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let frame = r#"{"type": "vote_cast", "payload": {"senderId": "x", "vote": "maybe"}}"#;
        assert!(GameMessage::decode(frame).is_err());
        assert!(GameMessage::decode("not json").is_err());
    }

    #[test]
    fn missing_timestamp_defaults_to_zero() {
        let frame = r#"{"type": "game_started", "payload": {"senderId": "a", "question": "Q"}}"#;
        assert_eq!(GameMessage::decode(frame).unwrap().timestamp, 0);
    }

    #[test]
    fn inconsistent_phase_change_is_rejected() {
        let frame = r#"{
            "type": "phase_changed",
            "payload": {"senderId": "a", "newPhase": "finished",
                        "transition": {"command": "close_voting"}},
            "timestamp": 1
        }"#;

        match GameMessage::decode(frame) {
            Err(DecodeError::InconsistentPhase { declared, implied }) => {
                assert_eq!(declared, GamePhase::Finished);
                assert_eq!(implied, GamePhase::Results);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn force_submit_derives_next_phase_from_command() {
        let payload = ForceSubmit::new("admin".into(), TransitionCommand::CloseVoting);
        assert_eq!(payload.next_phase, GamePhase::Results);

        let message = GameMessage::now(GameEvent::ForceSubmit(payload));
        let decoded = GameMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
        assert!(decoded.timestamp > 0);
    }
}
