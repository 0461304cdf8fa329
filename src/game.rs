pub use self::distribution::{Selection, Step};
pub use self::scenario::{Scenario, MAX_NAME_LEN as MAX_SCENARIO_NAME_LEN};
pub use self::shuffle::shuffle;
pub use self::status::UserStatus;
use crate::error::GameError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod distribution;
mod scenario;
mod shuffle;
mod status;
mod test;

/// Identity of the user that owns a game, as reported by the messaging gateway.
pub type OwnerId = i64;

/// A single role-assignment session.
///
/// `assigned_roles` is a log of the roles handed out so far, in player order,
/// so its length is always the index of the next player to serve.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Game {
    pub owner: OwnerId,
    pub players: Vec<String>,
    pub roles: Vec<String>,
    pub assigned_roles: Vec<String>,
    /// A box that has been opened but not yet acknowledged with "Next".
    #[serde(default)]
    pub pending: Option<Selection>,
    /// Timestamp that the game was created.
    pub started: DateTime<Utc>,
}

impl Game {
    /// Creates a new game for the given owner.
    pub fn new(owner: OwnerId, players: Vec<String>) -> Self {
        Self {
            owner,
            players,
            roles: vec![],
            assigned_roles: vec![],
            pending: None,
            started: Utc::now(),
        }
    }

    pub fn num_players(&self) -> usize {
        self.players.len()
    }

    /// Replaces the player list. Not allowed once roles have been fixed.
    pub fn set_players(&mut self, players: Vec<String>) -> Result<(), GameError> {
        if players.is_empty() {
            return Err(GameError::NoPlayers);
        }
        if !self.roles.is_empty() {
            return Err(GameError::DistributionComplete);
        }
        self.players = players;
        Ok(())
    }

    /// Fixes the role pool for this game, checking there is exactly one role per player.
    pub fn set_roles(&mut self, roles: Vec<String>) -> Result<(), GameError> {
        check_role_count(self.num_players(), roles.len())?;
        self.roles = roles;
        self.assigned_roles.clear();
        self.pending = None;
        Ok(())
    }

    /// Whether every player has been given a role.
    pub fn is_complete(&self) -> bool {
        !self.roles.is_empty() && self.assigned_roles.len() == self.roles.len()
    }
}

/// Checks that a role list of length `received` matches `expected` players.
pub fn check_role_count(expected: usize, received: usize) -> Result<(), GameError> {
    if received == 0 {
        return Err(GameError::NoRoles);
    }
    if expected != received {
        return Err(GameError::RoleCountMismatch { expected, received });
    }
    Ok(())
}

/// Splits a chat message into one entry per line, trimming whitespace and dropping blank lines.
pub fn parse_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Parses a list of player names, one per line.
pub fn parse_players(text: &str) -> Result<Vec<String>, GameError> {
    let players = parse_lines(text);
    if players.is_empty() {
        return Err(GameError::NoPlayers);
    }
    Ok(players)
}

/// Formats the numbered player list shown alongside the shuffle/confirm controls.
pub fn format_player_list(players: &[String]) -> String {
    players
        .iter()
        .enumerate()
        .map(|(idx, player)| format!("{:02} - {}", idx + 1, player))
        .collect::<Vec<_>>()
        .join("\n")
}
