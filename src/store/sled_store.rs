use super::{decode, encode, GameStore};
use crate::error::GameError;
use crate::game::{Game, OwnerId, Scenario, UserStatus};

/// A [GameStore] persisted to disk, so games survive a server restart.
#[derive(Clone)]
pub struct SledStore {
    games: sled::Tree,
    status: sled::Tree,
    scenarios: sled::Tree,
}

impl SledStore {
    pub fn new(db: sled::Db) -> Result<Self, GameError> {
        Ok(Self {
            games: db.open_tree("games")?,
            status: db.open_tree("status")?,
            scenarios: db.open_tree("scenarios")?,
        })
    }
}

fn key(owner: OwnerId) -> [u8; 8] {
    owner.to_be_bytes()
}

impl GameStore for SledStore {
    fn get_game(&self, owner: OwnerId) -> Result<Game, GameError> {
        let bytes = self.games.get(key(owner))?.ok_or(GameError::GameNotFound)?;
        decode(&bytes)
    }

    fn has_unfinished_game(&self, owner: OwnerId) -> Result<bool, GameError> {
        Ok(self.games.contains_key(key(owner))?)
    }

    fn create_game(&self, owner: OwnerId, players: Vec<String>) -> Result<(), GameError> {
        let game = encode(&Game::new(owner, players))?;
        self.games
            .compare_and_swap(key(owner), None::<&[u8]>, Some(game))?
            .map_err(|_| GameError::GameExists)
    }

    fn delete_game(&self, owner: OwnerId) -> Result<(), GameError> {
        self.games.remove(key(owner))?.ok_or(GameError::GameNotFound)?;
        Ok(())
    }

    fn update_game(
        &self,
        owner: OwnerId,
        mutation: &mut dyn FnMut(&mut Game) -> Result<(), GameError>,
    ) -> Result<Game, GameError> {
        loop {
            let current = self.games.get(key(owner))?.ok_or(GameError::GameNotFound)?;
            let mut game: Game = decode(&current)?;
            mutation(&mut game)?;
            let swapped = self
                .games
                .compare_and_swap(key(owner), Some(&current), Some(encode(&game)?))?;
            match swapped {
                Ok(()) => return Ok(game),
                Err(_) => log::warn!("Concurrent write to game {}, retrying", owner),
            }
        }
    }

    fn get_status(&self, owner: OwnerId) -> Result<UserStatus, GameError> {
        let bytes = self.status.get(key(owner))?.ok_or(GameError::StatusNotFound)?;
        decode(&bytes)
    }

    fn set_status(&self, owner: OwnerId, status: UserStatus) -> Result<(), GameError> {
        self.status.insert(key(owner), encode(&status)?)?;
        Ok(())
    }

    fn save_scenario(&self, scenario: &Scenario) -> Result<(), GameError> {
        self.scenarios
            .compare_and_swap(scenario.name.as_bytes(), None::<&[u8]>, Some(encode(scenario)?))?
            .map_err(|_| GameError::ScenarioExists)
    }

    fn get_scenario(&self, name: &str) -> Result<Scenario, GameError> {
        let bytes = self
            .scenarios
            .get(name.as_bytes())?
            .ok_or(GameError::ScenarioNotFound)?;
        decode(&bytes)
    }

    fn scenarios(&self) -> Result<Vec<Scenario>, GameError> {
        // Keys are the names, and sled iterates in key order
        self.scenarios
            .iter()
            .values()
            .map(|bytes| decode(&bytes?))
            .collect()
    }

    fn num_games(&self) -> usize {
        self.games.len()
    }
}
