use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::state::state_machine::GamePhase;

/// Opaque identifier generated by the client at registration.
pub type PlayerId = String;

/// A registered participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Unique identifier generated at registration.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Team the player belongs to.
    pub team: String,
    /// Role picked on the registration form.
    pub role: String,
    /// Admins drive the session (start, spin, force submit).
    pub is_admin: bool,
    /// Optional question the player wants the group to discuss.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

/// Side taken by a voter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    /// The sentence fits the question.
    Agree,
    /// It does not.
    Disagree,
}

/// Sentence submitted by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceEntry {
    /// Submitting player; at most one entry per player.
    pub player_id: PlayerId,
    /// Words joined by single spaces.
    pub sentence: String,
}

/// Vote cast by a player on the current sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteEntry {
    /// Voter; at most one entry per player.
    pub player_id: PlayerId,
    /// Side taken.
    pub vote: VoteChoice,
    /// Optional justification; empty when none was given.
    pub reason: String,
}

/// Entries stored in a map keyed by the owning player.
trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Player {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for SentenceEntry {
    fn key(&self) -> &str {
        &self.player_id
    }
}

impl Keyed for VoteEntry {
    fn key(&self) -> &str {
        &self.player_id
    }
}

/// The replicated aggregate every client rebuilds from the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedGameState {
    /// Current step of the session.
    pub phase: GamePhase,
    /// Registered players in join order, keyed by id.
    #[serde(with = "keyed_list")]
    pub players: IndexMap<PlayerId, Player>,
    /// Question of the running round; empty before the game starts.
    pub current_question: String,
    /// Teams the wheel may still land on this question.
    pub available_teams: Vec<String>,
    /// Team building the sentence, once the wheel has landed.
    #[serde(default)]
    pub selected_team: Option<String>,
    /// Words of the sentence being edited.
    #[serde(default)]
    pub live_sentence_words: Vec<String>,
    /// Sentences handed in, keyed by submitter.
    #[serde(with = "keyed_list")]
    pub sentences: IndexMap<PlayerId, SentenceEntry>,
    /// Votes of the current round, keyed by voter.
    #[serde(with = "keyed_list")]
    pub votes: IndexMap<PlayerId, VoteEntry>,
    /// Position in the predefined-then-player question sequence.
    pub question_index: usize,
}

/// Agree/disagree breakdown of the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTally {
    /// Number of agree votes.
    pub agree: usize,
    /// Number of disagree votes.
    pub disagree: usize,
    /// Share of agree votes, rounded to the nearest percent.
    pub agree_percentage: u8,
}

impl SharedGameState {
    /// Landing defaults with every configured team still available.
    pub fn new(teams: &[String]) -> Self {
        Self {
            phase: GamePhase::Landing,
            players: IndexMap::new(),
            current_question: String::new(),
            available_teams: teams.to_vec(),
            selected_team: None,
            live_sentence_words: Vec::new(),
            sentences: IndexMap::new(),
            votes: IndexMap::new(),
            question_index: 0,
        }
    }

    /// Insert or replace a player; a replaced record moves to the end.
    pub fn upsert_player(&mut self, player: Player) {
        upsert(&mut self.players, player);
    }

    /// Insert or replace the sentence of `entry.player_id`.
    pub fn upsert_sentence(&mut self, entry: SentenceEntry) {
        upsert(&mut self.sentences, entry);
    }

    /// Insert or replace the vote of `entry.player_id`.
    pub fn upsert_vote(&mut self, entry: VoteEntry) {
        upsert(&mut self.votes, entry);
    }

    /// Look up a player by id.
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    /// Whether `id` already voted this round.
    pub fn has_voted(&self, id: &str) -> bool {
        self.votes.contains_key(id)
    }

    /// True once every known player has voted.
    pub fn voting_complete(&self) -> bool {
        self.votes.len() >= self.players.len()
    }

    /// Most recently submitted sentence.
    pub fn current_sentence(&self) -> Option<&SentenceEntry> {
        self.sentences.values().last()
    }

    /// Live sentence as it would be submitted.
    pub fn live_sentence(&self) -> String {
        self.live_sentence_words.join(" ")
    }

    /// Count the votes of the current round.
    pub fn tally(&self) -> VoteTally {
        let agree = self
            .votes
            .values()
            .filter(|entry| entry.vote == VoteChoice::Agree)
            .count();
        let total = self.votes.len();
        let agree_percentage = if total == 0 {
            0
        } else {
            ((agree as f64 / total as f64) * 100.0).round() as u8
        };

        VoteTally {
            agree,
            disagree: total - agree,
            agree_percentage,
        }
    }

    /// Questions submitted by registered players, in player order.
    pub fn user_questions(&self) -> Vec<&str> {
        self.players
            .values()
            .filter_map(|player| player.question.as_deref())
            .filter(|question| !question.trim().is_empty())
            .collect()
    }

    /// Entry `index` of the predefined questions followed by the user questions.
    pub fn question_at(&self, predefined: &[String], index: usize) -> Option<String> {
        match predefined.get(index) {
            Some(question) => Some(question.clone()),
            None => self
                .user_questions()
                .get(index - predefined.len())
                .map(|question| question.to_string()),
        }
    }

    /// Length of the combined question sequence.
    pub fn question_count(&self, predefined: &[String]) -> usize {
        predefined.len() + self.user_questions().len()
    }

    /// True when continuing from the results screen ends the session.
    pub fn is_final_round(&self, predefined: &[String]) -> bool {
        self.available_teams.is_empty()
            && self.question_index + 1 >= self.question_count(predefined)
    }
}

fn upsert<T: Keyed>(map: &mut IndexMap<PlayerId, T>, entry: T) {
    let key = entry.key().to_owned();
    map.shift_remove(&key);
    map.insert(key, entry);
}

/// Keyed maps travel as plain JSON arrays; duplicates collapse to the last entry.
mod keyed_list {
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{Keyed, PlayerId, upsert};

    pub fn serialize<S, T>(map: &IndexMap<PlayerId, T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        serializer.collect_seq(map.values())
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<IndexMap<PlayerId, T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + Keyed,
    {
        let entries = Vec::<T>::deserialize(deserializer)?;
        let mut map = IndexMap::with_capacity(entries.len());
        for entry in entries {
            upsert(&mut map, entry);
        }
        Ok(map)
    }
}
