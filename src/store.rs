pub use self::memory::MemoryStore;
pub use self::sled_store::SledStore;
use crate::error::GameError;
use crate::game::{Game, OwnerId, Scenario, Selection, UserStatus};
use serde::{de::DeserializeOwned, Serialize};

mod memory;
mod sled_store;

/// Where games, user statuses and scenarios live between events.
///
/// Every per-owner write is atomic; lookups for an owner with no record fail
/// with one of the `NotFound` errors so callers can decide what to do.
pub trait GameStore: Send + Sync {
    /// Gets the owner's whole game record.
    fn get_game(&self, owner: OwnerId) -> Result<Game, GameError>;

    /// Whether the owner has a game that hasn't been finished or discarded.
    fn has_unfinished_game(&self, owner: OwnerId) -> Result<bool, GameError>;

    /// Creates a game. Fails with [GameError::GameExists] rather than overwrite one.
    fn create_game(&self, owner: OwnerId, players: Vec<String>) -> Result<(), GameError>;

    fn delete_game(&self, owner: OwnerId) -> Result<(), GameError>;

    /// Applies `mutation` to the owner's game as a single read-modify-write.
    /// Nothing is written if the mutation fails.
    fn update_game(
        &self,
        owner: OwnerId,
        mutation: &mut dyn FnMut(&mut Game) -> Result<(), GameError>,
    ) -> Result<Game, GameError>;

    fn get_status(&self, owner: OwnerId) -> Result<UserStatus, GameError>;

    fn set_status(&self, owner: OwnerId, status: UserStatus) -> Result<(), GameError>;

    /// Saves a new scenario. Fails with [GameError::ScenarioExists] if the name is taken.
    fn save_scenario(&self, scenario: &Scenario) -> Result<(), GameError>;

    fn get_scenario(&self, name: &str) -> Result<Scenario, GameError>;

    /// All saved scenarios, ordered by name.
    fn scenarios(&self) -> Result<Vec<Scenario>, GameError>;

    /// Number of games currently stored.
    fn num_games(&self) -> usize;

    fn get_players(&self, owner: OwnerId) -> Result<Vec<String>, GameError> {
        Ok(self.get_game(owner)?.players)
    }

    fn set_players(&self, owner: OwnerId, players: Vec<String>) -> Result<(), GameError> {
        self.update_game(owner, &mut |game| game.set_players(players.clone()))?;
        Ok(())
    }

    fn get_roles(&self, owner: OwnerId) -> Result<Vec<String>, GameError> {
        Ok(self.get_game(owner)?.roles)
    }

    /// Fixes the role pool, checking it against the player count.
    fn set_game_roles(&self, owner: OwnerId, roles: Vec<String>) -> Result<(), GameError> {
        self.update_game(owner, &mut |game| game.set_roles(roles.clone()))?;
        Ok(())
    }

    fn get_assigned_roles(&self, owner: OwnerId) -> Result<Vec<String>, GameError> {
        Ok(self.get_game(owner)?.assigned_roles)
    }

    fn set_assigned_roles(&self, owner: OwnerId, assigned: Vec<String>) -> Result<(), GameError> {
        self.update_game(owner, &mut |game| {
            game.assigned_roles = assigned.clone();
            game.pending = None;
            Ok(())
        })?;
        Ok(())
    }

    /// Remembers an opened box until it is acknowledged.
    fn hold_selection(&self, owner: OwnerId, selection: &Selection) -> Result<Game, GameError> {
        self.update_game(owner, &mut |game| game.hold(selection))
    }

    /// Records an acknowledged box pick, refusing it if another pick landed first.
    fn append_assigned_role(&self, owner: OwnerId, selection: &Selection) -> Result<Game, GameError> {
        self.update_game(owner, &mut |game| game.assign(selection))
    }
}

/// Serialises a stored record. Every tree goes through this pair.
fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, GameError> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, GameError> {
    Ok(serde_json::from_slice(bytes)?)
}
