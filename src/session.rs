use crate::config::Config;
use crate::error::GameError;
use crate::event::{Button, Command, Event, EventKind};
use crate::game::{
    self, check_role_count, parse_lines, parse_players, OwnerId, Scenario, Selection, Step, UserStatus,
};
use crate::gateway::{EventFilter, Gateway, Reply};
use crate::store::GameStore;
use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

mod prompt;

/// Runs the conversation for every user: routes each inbound event to the
/// handler for the user's current status and drives the game forward.
pub struct SessionManager {
    store: Arc<dyn GameStore>,
    gateway: Arc<dyn Gateway>,
    config: Config,
    rng: Mutex<ChaCha8Rng>,
    /// One queue per user with events in flight, so each user's events are
    /// handled in arrival order.
    queues: DashMap<OwnerId, mpsc::UnboundedSender<Event>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn GameStore>, gateway: Arc<dyn Gateway>, config: Config) -> Self {
        Self {
            store,
            gateway,
            config,
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
            queues: DashMap::new(),
        }
    }

    /// Replaces the random source, making shuffles reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(ChaCha8Rng::seed_from_u64(seed));
        self
    }

    pub fn num_games(&self) -> usize {
        self.store.num_games()
    }

    /// Accepts an event from the gateway.
    ///
    /// Events a suspended conversation is waiting for are handed straight to it;
    /// the rest join the sender's queue.
    pub fn dispatch(self: &Arc<Self>, event: Event) {
        let Some(event) = self.gateway.matcher().dispatch(event) else {
            return;
        };
        let owner = event.sender;
        // The entry stays locked while sending, so the queue can't shut in between
        let queue = self.queues.entry(owner).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(self.clone().serve(owner, rx));
            tx
        });
        if queue.send(event).is_err() {
            log::error!("Event queue for {} has closed", owner);
        }
    }

    /// Handles the owner's events until the queue runs dry, then retires it.
    async fn serve(self: Arc<Self>, owner: OwnerId, mut events: mpsc::UnboundedReceiver<Event>) {
        log::debug!("Serving events for {}", owner);
        loop {
            let event = match events.try_recv() {
                Ok(event) => event,
                Err(_) => match self.next_or_retire(owner, &mut events) {
                    Some(event) => event,
                    None => {
                        log::debug!("Event queue for {} is idle", owner);
                        return;
                    }
                },
            };
            self.process(event).await;
        }
    }

    /// Takes the next queued event, or removes the owner's queue if there is none.
    fn next_or_retire(&self, owner: OwnerId, events: &mut mpsc::UnboundedReceiver<Event>) -> Option<Event> {
        let Entry::Occupied(entry) = self.queues.entry(owner) else {
            return None;
        };
        match events.try_recv() {
            Ok(event) => Some(event),
            Err(_) => {
                entry.remove();
                None
            }
        }
    }

    /// Handles a single event to completion. Failures end here: invalid input is
    /// answered with a re-prompt, everything else is logged.
    pub async fn process(&self, event: Event) {
        let owner = event.sender;
        let Err(err) = self.route(&event).await else {
            return;
        };
        if err.is_validation() {
            log::info!("Rejected input from {}: {}", owner, err);
            if let Err(err) = self.gateway.send(owner, prompt::invalid_input(&err)).await {
                log::warn!("Could not re-prompt {}: {}", owner, err);
            }
        } else if err.is_not_found() {
            log::debug!("Ignoring event from {}: {}", owner, err);
        } else if let GameError::Timeout = err {
            log::info!("Timed out waiting for {}", owner);
        } else {
            log::error!("Could not handle event from {}: {}", owner, err);
        }
    }

    async fn route(&self, event: &Event) -> Result<(), GameError> {
        let owner = event.sender;
        if let EventKind::Command(command) = &event.kind {
            return match command {
                Command::NewGame => self.new_game(event).await,
                Command::NewScenario => self.new_scenario(owner).await,
                Command::Scenarios => self.list_scenarios(owner).await,
                Command::UseScenario(name) => self.use_scenario(owner, name).await,
                Command::Unknown(name) => {
                    log::debug!("Unknown command {:?} from {}", name, owner);
                    Ok(())
                }
            };
        }

        let status = self.store.get_status(owner)?;
        match (status, &event.kind) {
            (UserStatus::GettingPlayers, EventKind::Text(text)) => self.accept_players(owner, text).await,
            (UserStatus::ConfirmShuffle, EventKind::Button(Button::ShuffleList)) => {
                self.shuffle_players(event).await
            }
            (UserStatus::ConfirmShuffle, EventKind::Button(Button::ConfirmList)) => {
                self.confirm_players(event).await
            }
            (UserStatus::GettingGameRoles, EventKind::Text(text)) => {
                self.accept_roles(owner, parse_lines(text)).await
            }
            (UserStatus::DistributingRoles, EventKind::Button(Button::StartDistribution)) => {
                self.show_boxes(event, None).await
            }
            (UserStatus::DistributingRoles, EventKind::Button(Button::Next)) => self.acknowledge(event).await,
            (UserStatus::DistributingRoles, EventKind::Button(Button::RolePick { round, index })) => {
                self.pick_box(event, *round, *index).await
            }
            (UserStatus::DistributingRoles, EventKind::Button(Button::ShowRole)) => {
                self.reveal_all(event).await
            }
            (status, kind) => {
                log::debug!("Ignoring {:?} from {} while {}", kind, owner, status);
                Ok(())
            }
        }
    }

    /// Starts a new game, first making sure the user really wants to drop any
    /// game they already have.
    async fn new_game(&self, event: &Event) -> Result<(), GameError> {
        let owner = event.sender;
        log::info!("Starting new game for {}", owner);

        if self.store.has_unfinished_game(owner)? {
            log::info!("{} has an unfinished game", owner);
            let answers = [Button::AlreadyGameYes, Button::AlreadyGameNo];
            let listener = self.gateway.matcher().listen(EventFilter::buttons(owner, &answers));
            let question = self.gateway.send(owner, prompt::already_in_game()).await?;

            let answer = match listener.recv(self.config.confirm_timeout).await {
                Ok(answer) => answer,
                Err(GameError::Timeout) => {
                    log::info!("No answer about the unfinished game from {}", owner);
                    self.gateway.edit(question, prompt::kept_game()).await?;
                    return Ok(());
                }
                Err(err) => return Err(err),
            };

            self.gateway.delete(question).await?;
            if let Some(message) = event.message {
                self.gateway.delete(message).await?;
            }
            if answer.as_button() != Some(Button::AlreadyGameYes) {
                log::info!("{} kept their unfinished game", owner);
                return Ok(());
            }

            log::info!("{} discarded their unfinished game", owner);
            match self.store.delete_game(owner) {
                Err(err) if !err.is_not_found() => return Err(err),
                _ => {}
            }
        }

        self.store.create_game(owner, vec![])?;
        self.advance(owner, UserStatus::CreatingGame)?;
        self.collect_players(owner).await
    }

    /// Asks for the player list and waits for it.
    ///
    /// If the wait runs out the user stays in [UserStatus::GettingPlayers], so a
    /// late answer is still picked up by the router.
    async fn collect_players(&self, owner: OwnerId) -> Result<(), GameError> {
        self.advance(owner, UserStatus::GettingPlayers)?;
        let listener = self.gateway.matcher().listen(EventFilter::text(owner));
        self.gateway.send(owner, prompt::enter_players()).await?;

        let answer = match listener.recv(self.config.input_timeout).await {
            Ok(answer) => answer,
            Err(GameError::Timeout) => {
                log::info!("Getting players timed out for {}", owner);
                return Ok(());
            }
            Err(err) => return Err(err),
        };
        self.accept_players(owner, answer.as_text().unwrap_or_default())
            .await
    }

    async fn accept_players(&self, owner: OwnerId, text: &str) -> Result<(), GameError> {
        let players = parse_players(text)?;
        log::info!(
            "{} players received from {}: {}",
            players.len(),
            owner,
            players.join(", ")
        );
        self.store.set_players(owner, players.clone())?;
        self.advance(owner, UserStatus::ConfirmShuffle)?;
        self.gateway.send(owner, prompt::player_list(&players)).await?;
        Ok(())
    }

    /// Reshuffles the stored player order, not the order first typed in.
    async fn shuffle_players(&self, event: &Event) -> Result<(), GameError> {
        let owner = event.sender;
        let mut players = self.store.get_players(owner)?;
        if !self.shuffle(&mut players) {
            log::info!("Shuffle left the order unchanged for {}", owner);
            return Ok(());
        }
        log::info!("Shuffled players for {}: {}", owner, players.join(", "));
        self.store.set_players(owner, players.clone())?;
        self.show(event, prompt::player_list(&players)).await
    }

    async fn confirm_players(&self, event: &Event) -> Result<(), GameError> {
        let owner = event.sender;
        log::info!("Player list confirmed by {}", owner);
        let players = self.store.get_players(owner)?;
        if let Some(message) = event.message {
            self.gateway
                .edit(message, Reply::text(game::format_player_list(&players)))
                .await?;
        }
        self.advance(owner, UserStatus::GettingGameRoles)?;
        self.gateway.send(owner, prompt::enter_roles(players.len())).await?;
        Ok(())
    }

    /// Fixes the role pool once there is exactly one role per player.
    async fn accept_roles(&self, owner: OwnerId, mut roles: Vec<String>) -> Result<(), GameError> {
        let players = self.store.get_players(owner)?;
        log::info!("Received roles from {}: {}", owner, roles.join(", "));
        check_role_count(players.len(), roles.len())?;

        // The box layout must say nothing about the order the roles were typed in
        self.shuffle(&mut roles);
        self.store.set_game_roles(owner, roles)?;
        self.advance(owner, UserStatus::DistributingRoles)?;
        self.gateway.send(owner, prompt::ready()).await?;
        Ok(())
    }

    /// Draws the box grid for whoever is next, the box still open, or the end of the game.
    async fn show_boxes(&self, event: &Event, notice: Option<&str>) -> Result<(), GameError> {
        let game = self.store.get_game(event.sender)?;
        let reply = match game.next_step()? {
            Step::PickBox {
                player,
                round,
                boxes,
            } => prompt::boxes(&player, round, boxes, notice),
            Step::Reveal(selection) => prompt::reveal(&selection),
            Step::Complete => prompt::finished(),
        };
        self.show(event, reply).await
    }

    /// Reveals the role in the chosen box, and records it once the user moves on.
    ///
    /// The open box is stored before it is shown. If the wait for "Next" runs
    /// out, a later "Next" still records this role, and until then every pick
    /// shows the same box again.
    async fn pick_box(&self, event: &Event, round: Option<usize>, index: usize) -> Result<(), GameError> {
        let owner = event.sender;
        let game = self.store.get_game(owner)?;
        let selection = match game
            .select_box(round, index)
            .and_then(|selection| self.store.hold_selection(owner, &selection).map(|_| selection))
        {
            Ok(selection) => selection,
            Err(GameError::StaleSelection) => {
                log::warn!("Stale box {} (round {:?}) picked by {}", index, round, owner);
                return self.show_boxes(event, Some(prompt::STALE_BOX)).await;
            }
            Err(err) => return Err(err),
        };
        if game.pending.is_some() {
            log::info!("Showing {}'s open box again | {}", selection.player, owner);
        } else {
            log::info!(
                "Player {}: {} selected box {} | {}",
                selection.round,
                selection.player,
                index,
                owner
            );
        }

        let next = EventFilter::click_on(owner, Button::Next, event.message);
        let listener = self.gateway.matcher().listen(next);
        self.show(event, prompt::reveal(&selection)).await?;
        match listener.recv(self.config.confirm_timeout).await {
            Ok(_) => self.record(event, &selection).await,
            Err(GameError::Timeout) => {
                log::info!("{} hasn't moved on from {}'s role yet", owner, selection.player);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Handles a "Next" that no reveal was waiting for: records the open box,
    /// if any, then shows what comes next.
    async fn acknowledge(&self, event: &Event) -> Result<(), GameError> {
        match self.store.get_game(event.sender)?.pending {
            Some(selection) => self.record(event, &selection).await,
            None => self.show_boxes(event, None).await,
        }
    }

    async fn record(&self, event: &Event, selection: &Selection) -> Result<(), GameError> {
        let owner = event.sender;
        match self.store.append_assigned_role(owner, selection) {
            Ok(_) => log::info!("Recorded {}'s role | {}", selection.player, owner),
            Err(GameError::StaleSelection) => {
                log::warn!("Pick for {} by {} was overtaken", selection.player, owner);
            }
            Err(err) => return Err(err),
        }
        self.show_boxes(event, None).await
    }

    /// Shows every pairing and forgets the game.
    async fn reveal_all(&self, event: &Event) -> Result<(), GameError> {
        let owner = event.sender;
        let game = self.store.get_game(owner)?;
        if !game.is_complete() {
            log::debug!("{} asked for the roles before every box was opened", owner);
            return Ok(());
        }

        log::info!("Showing roles to {}", owner);
        self.gateway.send(owner, Reply::text(game.format_pairings())).await?;
        if let Some(message) = event.message {
            self.gateway.delete(message).await?;
        }
        self.store.delete_game(owner)?;
        log::info!(
            "Finished game for {} after {}s",
            owner,
            (Utc::now() - game.started).num_seconds()
        );
        Ok(())
    }

    /// Records a new reusable role list. The user's status is restored
    /// afterwards, so an unfinished game carries on where it was.
    async fn new_scenario(&self, owner: OwnerId) -> Result<(), GameError> {
        log::info!("Creating scenario for {}", owner);
        let previous = match self.store.get_status(owner) {
            Ok(status) if status.is_scenario_step() => None,
            Ok(status) => Some(status),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err),
        };
        self.advance(owner, UserStatus::CreatingScenario)?;

        let result = self.build_scenario(owner).await;
        if let Some(status) = previous {
            self.store.set_status(owner, status)?;
        }
        result
    }

    async fn build_scenario(&self, owner: OwnerId) -> Result<(), GameError> {
        self.advance(owner, UserStatus::GettingScenarioRoles)?;
        let mut ask = prompt::enter_scenario_roles();
        let roles = loop {
            let answer = self.gateway.await_event(EventFilter::text(owner), self.config.input_timeout);
            self.gateway.send(owner, ask).await?;
            let answer = answer.await?;
            let roles = parse_lines(answer.as_text().unwrap_or_default());
            if !roles.is_empty() {
                break roles;
            }
            ask = prompt::invalid_input(&GameError::NoRoles);
        };

        self.advance(owner, UserStatus::GettingScenarioName)?;
        let mut ask = prompt::enter_scenario_name();
        loop {
            let answer = self.gateway.await_event(EventFilter::text(owner), self.config.input_timeout);
            self.gateway.send(owner, ask).await?;
            let answer = answer.await?;
            let saved = Scenario::new(answer.as_text().unwrap_or_default(), roles.clone())
                .and_then(|scenario| self.store.save_scenario(&scenario).map(|_| scenario));
            match saved {
                Ok(scenario) => {
                    log::info!("{} saved scenario {:?}", owner, scenario.name);
                    self.gateway.send(owner, prompt::scenario_saved(&scenario)).await?;
                    return Ok(());
                }
                Err(err) if err.is_validation() => ask = prompt::invalid_input(&err),
                Err(err) => return Err(err),
            }
        }
    }

    async fn list_scenarios(&self, owner: OwnerId) -> Result<(), GameError> {
        let scenarios = self.store.scenarios()?;
        self.gateway.send(owner, prompt::scenario_list(&scenarios)).await?;
        Ok(())
    }

    /// Uses a saved scenario as the answer to the role prompt.
    async fn use_scenario(&self, owner: OwnerId, name: &str) -> Result<(), GameError> {
        if self.store.get_status(owner)? != UserStatus::GettingGameRoles {
            log::debug!("{} asked for scenario {:?} outside of role entry", owner, name);
            return Ok(());
        }
        match self.store.get_scenario(name) {
            Ok(scenario) => self.accept_roles(owner, scenario.roles).await,
            Err(GameError::ScenarioNotFound) => {
                self.gateway.send(owner, prompt::unknown_scenario(name)).await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Moves the user to the next status, warning about moves the flow doesn't expect.
    fn advance(&self, owner: OwnerId, next: UserStatus) -> Result<(), GameError> {
        match self.store.get_status(owner) {
            Ok(current) if !current.can_advance_to(next) => {
                log::warn!("Unexpected transition for {}: {} -> {}", owner, current, next);
            }
            Err(err) if !err.is_not_found() => return Err(err),
            _ => {}
        }
        self.store.set_status(owner, next)
    }

    /// Updates the message the event came from, or sends a new one if there isn't one.
    async fn show(&self, event: &Event, reply: Reply) -> Result<(), GameError> {
        match event.message {
            Some(message) => self.gateway.edit(message, reply).await?,
            None => {
                self.gateway.send(event.sender, reply).await?;
            }
        }
        Ok(())
    }

    fn shuffle(&self, items: &mut [String]) -> bool {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        game::shuffle(items, &mut *rng)
    }
}
