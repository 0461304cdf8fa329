use crate::gateway::GatewayError;
use thiserror::Error;

/// The result of attempting to perform an invalid operation on a game, a status or a scenario.
#[derive(Error, Debug)]
pub enum GameError {
    #[error("game does not exist")]
    GameNotFound,
    #[error("no status is recorded for this user")]
    StatusNotFound,
    #[error("no scenario exists with the given name")]
    ScenarioNotFound,
    #[error("a game is already in progress for this user")]
    GameExists,
    #[error("a scenario with this name already exists")]
    ScenarioExists,
    #[error("the player list is empty")]
    NoPlayers,
    #[error("the role list is empty")]
    NoRoles,
    #[error("{expected} roles expected; received {received}")]
    RoleCountMismatch { expected: usize, received: usize },
    #[error("invalid scenario name")]
    InvalidScenarioName,
    #[error("the selected box is no longer available")]
    StaleSelection,
    #[error("every role has already been assigned")]
    DistributionComplete,
    #[error("timed out waiting for a reply")]
    Timeout,
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("could not encode or decode a stored record: {0}")]
    Codec(#[from] serde_json::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl GameError {
    /// Whether this error means the requested record simply doesn't exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GameError::GameNotFound | GameError::StatusNotFound | GameError::ScenarioNotFound
        )
    }

    /// Whether this error should be answered with a re-prompt rather than silence.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GameError::NoPlayers
                | GameError::NoRoles
                | GameError::RoleCountMismatch { .. }
                | GameError::InvalidScenarioName
                | GameError::ScenarioExists
        )
    }
}
