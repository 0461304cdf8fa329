use super::GameStore;
use crate::error::GameError;
use crate::game::{Game, OwnerId, Scenario, UserStatus};
use dashmap::{mapref::entry::Entry, DashMap};

/// A [GameStore] that keeps everything in memory.
#[derive(Default)]
pub struct MemoryStore {
    games: DashMap<OwnerId, Game>,
    status: DashMap<OwnerId, UserStatus>,
    scenarios: DashMap<String, Scenario>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameStore for MemoryStore {
    fn get_game(&self, owner: OwnerId) -> Result<Game, GameError> {
        self.games
            .get(&owner)
            .map(|game| game.clone())
            .ok_or(GameError::GameNotFound)
    }

    fn has_unfinished_game(&self, owner: OwnerId) -> Result<bool, GameError> {
        Ok(self.games.contains_key(&owner))
    }

    fn create_game(&self, owner: OwnerId, players: Vec<String>) -> Result<(), GameError> {
        match self.games.entry(owner) {
            Entry::Occupied(_) => Err(GameError::GameExists),
            Entry::Vacant(entry) => {
                entry.insert(Game::new(owner, players));
                Ok(())
            }
        }
    }

    fn delete_game(&self, owner: OwnerId) -> Result<(), GameError> {
        self.games
            .remove(&owner)
            .map(|_| ())
            .ok_or(GameError::GameNotFound)
    }

    fn update_game(
        &self,
        owner: OwnerId,
        mutation: &mut dyn FnMut(&mut Game) -> Result<(), GameError>,
    ) -> Result<Game, GameError> {
        // The shard stays locked for the whole read-modify-write
        let mut entry = self.games.get_mut(&owner).ok_or(GameError::GameNotFound)?;
        let mut game = entry.clone();
        mutation(&mut game)?;
        *entry = game.clone();
        Ok(game)
    }

    fn get_status(&self, owner: OwnerId) -> Result<UserStatus, GameError> {
        self.status
            .get(&owner)
            .map(|status| *status)
            .ok_or(GameError::StatusNotFound)
    }

    fn set_status(&self, owner: OwnerId, status: UserStatus) -> Result<(), GameError> {
        self.status.insert(owner, status);
        Ok(())
    }

    fn save_scenario(&self, scenario: &Scenario) -> Result<(), GameError> {
        match self.scenarios.entry(scenario.name.clone()) {
            Entry::Occupied(_) => Err(GameError::ScenarioExists),
            Entry::Vacant(entry) => {
                entry.insert(scenario.clone());
                Ok(())
            }
        }
    }

    fn get_scenario(&self, name: &str) -> Result<Scenario, GameError> {
        self.scenarios
            .get(name)
            .map(|scenario| scenario.clone())
            .ok_or(GameError::ScenarioNotFound)
    }

    fn scenarios(&self) -> Result<Vec<Scenario>, GameError> {
        let mut scenarios: Vec<_> = self.scenarios.iter().map(|s| s.value().clone()).collect();
        scenarios.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(scenarios)
    }

    fn num_games(&self) -> usize {
        self.games.len()
    }
}
