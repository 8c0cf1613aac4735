//! Client-side driver turning user intents into local transitions and broadcasts.
//!
//! Every intent is first planned against the current state. A rejected plan
//! returns an [`ActionError`] and leaves both the state and the relay untouched;
//! an accepted one is applied locally through the sync engine and then published.

use std::sync::Arc;

use rand::seq::IndexedRandom;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::GameSettings,
    dto::{
        message::{
            ForceSubmit, GameEvent, GameMessage, GameReset, GameStarted, PhaseChanged,
            PlayerJoined, SentenceSubmitted, SentenceUpdate, TeamSelected, VoteCast,
        },
        validation::RegistrationForm,
    },
    error::ActionError,
    services::{
        relay::{RelayChannel, Subscription},
        sync_engine::{Outcome, SyncEngine},
    },
    state::{
        game::{Player, SharedGameState, VoteChoice},
        state_machine::{GamePhase, PhaseEvent},
        transitions::TransitionCommand,
    },
};

/// One participant of a session, wired to the relay.
pub struct GameClient<R: RelayChannel> {
    engine: SyncEngine,
    relay: R,
    subscription: Subscription,
    settings: Arc<GameSettings>,
}

impl<R: RelayChannel> GameClient<R> {
    /// Start on the landing screen and subscribe to the relay.
    pub fn new(relay: R, settings: Arc<GameSettings>) -> Self {
        let subscription = relay.subscribe();
        Self {
            engine: SyncEngine::new(&settings.teams),
            relay,
            subscription,
            settings,
        }
    }

    /// Replicated state as this client sees it.
    pub fn state(&self) -> &SharedGameState {
        self.engine.state()
    }

    /// Current phase.
    pub fn phase(&self) -> GamePhase {
        self.engine.state().phase
    }

    /// The player registered here, if any.
    pub fn local_player(&self) -> Option<&Player> {
        self.engine.local_player()
    }

    /// Catalog used for validation and question order.
    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    /// Whether the local player may edit and submit the live sentence.
    pub fn can_edit_sentence(&self) -> bool {
        self.check_edit_rights().is_ok()
    }

    /// Whether continuing from the results screen would end the session.
    pub fn is_final_round(&self) -> bool {
        self.state().is_final_round(&self.settings.questions)
    }

    /// Apply every frame already queued on the relay; returns how many were read.
    pub fn sync(&mut self) -> usize {
        let mut received = 0;
        while let Some(frame) = self.subscription.try_recv() {
            self.engine.receive_frame(&frame);
            received += 1;
        }
        received
    }

    /// Wait for the next decodable frame and apply it; `None` once the relay closed.
    pub async fn recv(&mut self) -> Option<Outcome> {
        loop {
            let frame = self.subscription.recv().await?;
            if let Some(outcome) = self.engine.receive_frame(&frame) {
                return Some(outcome);
            }
        }
    }

    /// Apply a raw frame obtained outside the subscription.
    pub fn receive_frame(&mut self, frame: &str) -> Option<Outcome> {
        self.engine.receive_frame(frame)
    }

    /// Register the local player and announce it to the session.
    pub fn register(&mut self, form: RegistrationForm) -> Result<Player, ActionError> {
        let (player, phase) = self.plan_register(form).inspect_err(rejected("register"))?;
        info!(
            player = %player.id,
            team = %player.team,
            admin = player.is_admin,
            "registered local player"
        );

        self.engine.set_local_player(player.clone());
        self.broadcast(GameEvent::PlayerJoined(PlayerJoined {
            sender_id: player.id.clone(),
            player: player.clone(),
        }));
        self.engine.state_mut().phase = phase;
        Ok(player)
    }

    /// Admin starts the session with the first question.
    pub fn start_game(&mut self) -> Result<String, ActionError> {
        let (sender_id, question) = self.plan_start().inspect_err(rejected("start_game"))?;
        self.broadcast(GameEvent::GameStarted(GameStarted {
            sender_id,
            question: question.clone(),
        }));
        Ok(question)
    }

    /// Admin spins the wheel, picking uniformly among the remaining teams.
    pub fn spin(&mut self) -> Result<String, ActionError> {
        let (sender_id, team) = self.plan_spin().inspect_err(rejected("spin"))?;
        self.broadcast(GameEvent::TeamSelected(TeamSelected {
            sender_id,
            team: team.clone(),
        }));
        Ok(team)
    }

    /// Continue out of spinning: the selected team leaves the pool.
    pub fn confirm_team(&mut self) -> Result<(), ActionError> {
        let (sender_id, command) = self
            .plan_confirm_team()
            .inspect_err(rejected("confirm_team"))?;
        self.broadcast(GameEvent::PhaseChanged(PhaseChanged::new(sender_id, command)));
        Ok(())
    }

    /// Append a word to the live sentence.
    pub fn add_word(&mut self, word: &str) -> Result<(), ActionError> {
        let word = word.trim();
        let (sender_id, mut words) = self.plan_edit().inspect_err(rejected("add_word"))?;
        if word.is_empty() {
            return Err(ActionError::InvalidInput("word must not be blank".into()))
                .inspect_err(rejected("add_word"));
        }

        words.push(word.to_string());
        self.publish_words(sender_id, words);
        Ok(())
    }

    /// Remove the word at `index` from the live sentence.
    pub fn remove_word(&mut self, index: usize) -> Result<(), ActionError> {
        let (sender_id, mut words) = self.plan_edit().inspect_err(rejected("remove_word"))?;
        if index >= words.len() {
            return Err(ActionError::NoSuchWord(index)).inspect_err(rejected("remove_word"));
        }

        words.remove(index);
        self.publish_words(sender_id, words);
        Ok(())
    }

    /// Empty the live sentence.
    pub fn clear_words(&mut self) -> Result<(), ActionError> {
        let (sender_id, _) = self.plan_edit().inspect_err(rejected("clear_words"))?;
        self.publish_words(sender_id, Vec::new());
        Ok(())
    }

    /// Submit the live sentence for voting; returns the submitted text.
    pub fn submit_sentence(&mut self) -> Result<String, ActionError> {
        let (sender_id, sentence) = self
            .plan_submit()
            .inspect_err(rejected("submit_sentence"))?;
        self.broadcast(GameEvent::SentenceSubmitted(SentenceSubmitted {
            player_id: sender_id.clone(),
            sender_id,
            sentence: sentence.clone(),
        }));
        Ok(sentence)
    }

    /// Cast the local player's vote on the current sentence.
    ///
    /// The vote that completes the round moves every client to results through
    /// the reducer; no separate phase change is published.
    pub fn cast_vote(&mut self, vote: VoteChoice, reason: &str) -> Result<(), ActionError> {
        let (sender_id, reason) = self
            .plan_vote(reason)
            .inspect_err(rejected("cast_vote"))?;

        let outcome = self.broadcast(GameEvent::VoteCast(VoteCast {
            player_id: sender_id.clone(),
            sender_id,
            vote,
            reason,
        }));

        if let Outcome::Applied {
            from: GamePhase::Voting,
            to: GamePhase::Results,
        } = outcome
        {
            info!("all votes are in; round closed");
        }
        Ok(())
    }

    /// Admin closes voting before everyone voted.
    pub fn force_submit(&mut self) -> Result<(), ActionError> {
        let sender_id = self
            .require_admin("force submit")
            .and_then(|sender_id| {
                self.phase().ensure(PhaseEvent::CloseVoting)?;
                Ok(sender_id)
            })
            .inspect_err(rejected("force_submit"))?;

        self.broadcast(GameEvent::ForceSubmit(ForceSubmit::new(
            sender_id,
            TransitionCommand::CloseVoting,
        )));
        Ok(())
    }

    /// Leave the results screen: next team, next question or the end.
    pub fn continue_from_results(&mut self) -> Result<GamePhase, ActionError> {
        let (sender_id, command) = self
            .plan_continue()
            .inspect_err(rejected("continue_from_results"))?;
        let target = command.target_phase();
        self.broadcast(GameEvent::PhaseChanged(PhaseChanged::new(sender_id, command)));
        Ok(target)
    }

    /// Leave the finished screen: local reset to landing, identity included.
    pub fn restart(&mut self) -> Result<(), ActionError> {
        self.phase()
            .ensure(PhaseEvent::Restart)
            .map_err(ActionError::from)
            .inspect_err(rejected("restart"))?;

        self.engine.reset(&self.settings.teams);
        info!("session finished; back to landing");
        Ok(())
    }

    /// Admin broadcasts the full local state so late joiners converge.
    pub fn push_snapshot(&mut self) -> Result<(), ActionError> {
        let sender_id = self
            .require_admin("push a snapshot")
            .inspect_err(rejected("push_snapshot"))?;
        let new_state = self.state().clone();
        self.broadcast(GameEvent::GameReset(GameReset {
            sender_id,
            new_state,
        }));
        Ok(())
    }

    /// Build the local player and the phase the client lands in afterwards.
    fn plan_register(&self, form: RegistrationForm) -> Result<(Player, GamePhase), ActionError> {
        if let Some(player) = self.local_player() {
            return Err(ActionError::AlreadyRegistered(player.id.clone()));
        }
        form.validate()?;

        let team = form.team.trim();
        if !self.settings.teams.iter().any(|known| known == team) {
            return Err(ActionError::InvalidInput(format!("unknown team `{team}`")));
        }
        let role = form.role.trim();
        if !self.settings.roles.iter().any(|known| known == role) {
            return Err(ActionError::InvalidInput(format!("unknown role `{role}`")));
        }

        let player = Player {
            id: Uuid::new_v4().simple().to_string(),
            name: form.name.trim().to_string(),
            team: team.to_string(),
            role: role.to_string(),
            is_admin: form.is_admin,
            question: form.normalized_question(),
        };

        // A client still on landing moves to waiting; a late joiner that already
        // follows the session keeps the replicated phase.
        let phase = match self.phase() {
            GamePhase::Landing => GamePhase::Landing.next(PhaseEvent::Register)?,
            replicated => replicated,
        };
        Ok((player, phase))
    }

    fn plan_start(&self) -> Result<(String, String), ActionError> {
        let sender_id = self.require_admin("start the game")?;
        self.phase().ensure(PhaseEvent::StartGame)?;
        let question = self
            .state()
            .question_at(&self.settings.questions, 0)
            .ok_or(ActionError::NoQuestions)?;
        Ok((sender_id, question))
    }

    fn plan_spin(&self) -> Result<(String, String), ActionError> {
        let sender_id = self.require_admin("spin the wheel")?;
        self.phase().ensure(PhaseEvent::SelectTeam)?;
        let team = self
            .state()
            .available_teams
            .choose(&mut rand::rng())
            .cloned()
            .ok_or(ActionError::NoTeamsLeft)?;
        Ok((sender_id, team))
    }

    fn plan_confirm_team(&self) -> Result<(String, TransitionCommand), ActionError> {
        let sender_id = self.require_player()?;
        self.phase().ensure(PhaseEvent::ConfirmTeam)?;
        let selected = self
            .state()
            .selected_team
            .as_deref()
            .ok_or(ActionError::NoTeamSelected)?;

        let available_teams = self
            .state()
            .available_teams
            .iter()
            .filter(|team| team.as_str() != selected)
            .cloned()
            .collect();
        Ok((sender_id, TransitionCommand::BeginSentence { available_teams }))
    }

    fn plan_edit(&self) -> Result<(String, Vec<String>), ActionError> {
        let sender_id = self.check_edit_rights()?;
        self.phase().ensure(PhaseEvent::EditSentence)?;
        Ok((sender_id, self.state().live_sentence_words.clone()))
    }

    fn plan_submit(&self) -> Result<(String, String), ActionError> {
        let sender_id = self.check_edit_rights()?;
        self.phase().ensure(PhaseEvent::SubmitSentence)?;
        if self.state().live_sentence_words.is_empty() {
            return Err(ActionError::EmptySentence);
        }
        Ok((sender_id, self.state().live_sentence()))
    }

    fn plan_vote(&self, reason: &str) -> Result<(String, String), ActionError> {
        let sender_id = self.require_player()?;
        self.phase().ensure(PhaseEvent::CastVote)?;
        if self.state().has_voted(&sender_id) {
            return Err(ActionError::AlreadyVoted(sender_id));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ActionError::InvalidInput(
                "a vote needs a reason".into(),
            ));
        }
        Ok((sender_id, reason.to_string()))
    }

    fn plan_continue(&self) -> Result<(String, TransitionCommand), ActionError> {
        let sender_id = self.require_player()?;
        let state = self.state();

        let command = if !state.available_teams.is_empty() {
            state.phase.ensure(PhaseEvent::NextTeam)?;
            TransitionCommand::NextTeam
        } else {
            let question_index = state.question_index + 1;
            match state.question_at(&self.settings.questions, question_index) {
                Some(current_question) => {
                    state.phase.ensure(PhaseEvent::NextQuestion)?;
                    TransitionCommand::NextQuestion {
                        question_index,
                        current_question,
                        available_teams: self.settings.teams.clone(),
                    }
                }
                None => {
                    state.phase.ensure(PhaseEvent::Finish)?;
                    TransitionCommand::Finish
                }
            }
        };
        Ok((sender_id, command))
    }

    fn require_player(&self) -> Result<String, ActionError> {
        self.local_player()
            .map(|player| player.id.clone())
            .ok_or(ActionError::NotRegistered)
    }

    fn require_admin(&self, intent: &'static str) -> Result<String, ActionError> {
        match self.local_player() {
            Some(player) if player.is_admin => Ok(player.id.clone()),
            Some(_) => Err(ActionError::NotAdmin(intent)),
            None => Err(ActionError::NotRegistered),
        }
    }

    /// Members of the selected team and admins may edit the sentence.
    fn check_edit_rights(&self) -> Result<String, ActionError> {
        let player = self.local_player().ok_or(ActionError::NotRegistered)?;
        let selected = self.state().selected_team.as_deref();
        if player.is_admin || selected == Some(player.team.as_str()) {
            return Ok(player.id.clone());
        }
        Err(ActionError::CannotEdit {
            team: selected.unwrap_or_default().to_string(),
        })
    }

    fn publish_words(&mut self, sender_id: String, words: Vec<String>) {
        self.broadcast(GameEvent::SentenceUpdate(SentenceUpdate { sender_id, words }));
    }

    /// Apply locally first, then publish to the other clients.
    fn broadcast(&mut self, event: GameEvent) -> Outcome {
        let outcome = self.engine.apply_local(&event);
        self.relay.publish(&GameMessage::now(event));
        outcome
    }
}

fn rejected(intent: &'static str) -> impl FnOnce(&ActionError) {
    move |err: &ActionError| debug!(intent, error = %err, "intent rejected")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::relay::{RelayHub, RelayPeer};

    fn settings() -> Arc<GameSettings> {
        Arc::new(GameSettings {
            teams: vec!["Executive".into(), "Review".into()],
            roles: vec!["Manager".into(), "Developer".into()],
            questions: vec!["Q0".into()],
        })
    }

    fn client(hub: &Arc<RelayHub>) -> GameClient<RelayPeer> {
        GameClient::new(hub.connect(), settings())
    }

    fn admin(hub: &Arc<RelayHub>) -> GameClient<RelayPeer> {
        let mut client = client(hub);
        client
            .register(RegistrationForm::new("Alice", "Executive", "Manager").admin())
            .unwrap();
        client
    }

    #[test]
    fn register_moves_to_waiting_and_announces() {
        let hub = RelayHub::new(16);
        let mut observer = client(&hub);
        let mut alice = client(&hub);

        let player = alice
            .register(
                RegistrationForm::new(" Alice ", "Executive", "Manager").with_question("  "),
            )
            .unwrap();

        assert_eq!(player.name, "Alice");
        assert_eq!(player.id.len(), 32);
        assert!(player.question.is_none());
        assert_eq!(alice.phase(), GamePhase::Waiting);

        assert_eq!(observer.sync(), 1);
        assert_eq!(observer.state().player(&player.id), Some(&player));
        assert_eq!(observer.phase(), GamePhase::Landing);
    }

    #[test]
    fn register_rejects_unknown_team_and_repeats() {
        let hub = RelayHub::new(16);
        let mut alice = client(&hub);

        assert!(matches!(
            alice.register(RegistrationForm::new("Alice", "Marketing", "Manager")),
            Err(ActionError::InvalidInput(_))
        ));
        assert!(matches!(
            alice.register(RegistrationForm::new("", "Executive", "Manager")),
            Err(ActionError::Validation(_))
        ));
        assert!(alice.local_player().is_none());
        assert_eq!(alice.phase(), GamePhase::Landing);

        alice
            .register(RegistrationForm::new("Alice", "Executive", "Manager"))
            .unwrap();
        assert!(matches!(
            alice.register(RegistrationForm::new("Alice", "Executive", "Manager")),
            Err(ActionError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn late_joiner_keeps_replicated_phase() {
        let hub = RelayHub::new(16);
        let mut alice = admin(&hub);
        let mut bob = client(&hub);
        alice.start_game().unwrap();
        bob.sync();

        bob.register(RegistrationForm::new("Bob", "Review", "Developer"))
            .unwrap();

        assert_eq!(bob.phase(), GamePhase::Spinning);
    }

    #[test]
    fn non_admin_cannot_drive_the_session() {
        let hub = RelayHub::new(16);
        let mut bob = client(&hub);
        let mut listener = hub.connect().subscribe();
        bob.register(RegistrationForm::new("Bob", "Review", "Developer"))
            .unwrap();
        listener.try_recv();

        assert!(matches!(bob.start_game(), Err(ActionError::NotAdmin(_))));
        assert!(matches!(bob.push_snapshot(), Err(ActionError::NotAdmin(_))));
        assert_eq!(bob.phase(), GamePhase::Waiting);
        assert_eq!(listener.try_recv(), None);
    }

    #[test]
    fn start_without_questions_falls_back_to_player_questions() {
        let hub = RelayHub::new(16);
        let settings = Arc::new(GameSettings {
            questions: Vec::new(),
            ..(*settings()).clone()
        });
        let mut alice = GameClient::new(hub.connect(), Arc::clone(&settings));
        alice
            .register(RegistrationForm::new("Alice", "Executive", "Manager").admin())
            .unwrap();
        assert!(matches!(alice.start_game(), Err(ActionError::NoQuestions)));

        let mut bob = GameClient::new(hub.connect(), settings);
        bob.register(
            RegistrationForm::new("Bob", "Review", "Developer").with_question("Why?"),
        )
        .unwrap();
        alice.sync();

        assert_eq!(alice.start_game().unwrap(), "Why?");
    }

    #[test]
    fn confirm_requires_a_selected_team() {
        let hub = RelayHub::new(16);
        let mut alice = admin(&hub);
        alice.start_game().unwrap();

        assert!(matches!(
            alice.confirm_team(),
            Err(ActionError::NoTeamSelected)
        ));

        // Spinning again just picks anew.
        alice.spin().unwrap();
        let team = alice.spin().unwrap();
        assert_eq!(alice.state().selected_team.as_deref(), Some(team.as_str()));
        alice.confirm_team().unwrap();

        assert_eq!(alice.phase(), GamePhase::Sentence);
        assert!(!alice.state().available_teams.contains(&team));
    }

    #[test]
    fn only_selected_team_or_admin_edits() {
        let hub = RelayHub::new(16);
        let mut alice = admin(&hub);
        let mut bob = client(&hub);
        bob.register(RegistrationForm::new("Bob", "Review", "Developer"))
            .unwrap();
        alice.sync();
        alice.start_game().unwrap();
        // Force the wheel onto Executive so Bob is not on the selected team.
        alice.engine.state_mut().available_teams = vec!["Executive".into()];
        alice.spin().unwrap();
        alice.confirm_team().unwrap();
        bob.sync();

        assert!(!bob.can_edit_sentence());
        assert!(matches!(
            bob.add_word("hello"),
            Err(ActionError::CannotEdit { .. })
        ));

        alice.add_word("Team").unwrap();
        alice.add_word("trust").unwrap();
        alice.remove_word(1).unwrap();
        assert!(matches!(alice.remove_word(4), Err(ActionError::NoSuchWord(4))));
        bob.sync();
        assert_eq!(bob.state().live_sentence(), "Team");
    }

    #[test]
    fn submit_needs_words_and_vote_needs_reason() {
        let hub = RelayHub::new(16);
        let mut alice = admin(&hub);
        alice.start_game().unwrap();
        alice.spin().unwrap();
        alice.confirm_team().unwrap();

        assert!(matches!(
            alice.submit_sentence(),
            Err(ActionError::EmptySentence)
        ));
        alice.add_word("Trust").unwrap();
        alice.add_word("matters").unwrap();
        assert_eq!(alice.submit_sentence().unwrap(), "Trust matters");
        assert_eq!(alice.phase(), GamePhase::Voting);

        assert!(matches!(
            alice.cast_vote(VoteChoice::Agree, "   "),
            Err(ActionError::InvalidInput(_))
        ));
        alice.cast_vote(VoteChoice::Agree, " yes ").unwrap();
        assert_eq!(alice.phase(), GamePhase::Results);
        let player_id = alice.local_player().unwrap().id.clone();
        assert_eq!(alice.state().votes[&player_id].reason, "yes");
    }

    #[test]
    fn repeat_vote_is_rejected_locally() {
        let hub = RelayHub::new(16);
        let mut alice = admin(&hub);
        let mut bob = client(&hub);
        bob.register(RegistrationForm::new("Bob", "Review", "Developer"))
            .unwrap();
        alice.sync();
        alice.start_game().unwrap();
        alice.spin().unwrap();
        alice.confirm_team().unwrap();
        alice.add_word("Listen").unwrap();
        alice.submit_sentence().unwrap();

        alice.cast_vote(VoteChoice::Disagree, "no").unwrap();
        assert!(matches!(
            alice.cast_vote(VoteChoice::Agree, "changed my mind"),
            Err(ActionError::AlreadyVoted(_))
        ));
        assert_eq!(alice.phase(), GamePhase::Voting);

        alice.force_submit().unwrap();
        assert_eq!(alice.phase(), GamePhase::Results);
        bob.sync();
        assert_eq!(bob.phase(), GamePhase::Results);
    }

    #[test]
    fn restart_only_from_finished() {
        let hub = RelayHub::new(16);
        let mut alice = admin(&hub);
        assert!(matches!(
            alice.restart(),
            Err(ActionError::InvalidTransition(_))
        ));

        alice.engine.state_mut().phase = GamePhase::Finished;
        alice.restart().unwrap();

        assert_eq!(alice.phase(), GamePhase::Landing);
        assert!(alice.local_player().is_none());
        assert_eq!(alice.state().available_teams, settings().teams);
    }
}
