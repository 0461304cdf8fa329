use serde::{Deserialize, Serialize};
use std::fmt;

/// The step of the conversation a user is currently in.
///
/// Kept apart from [super::Game] because a user has a status before any game
/// exists, and while building a scenario.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Debug, Hash)]
pub enum UserStatus {
    CreatingGame,
    GettingPlayers,
    ConfirmShuffle,
    GettingGameRoles,
    DistributingRoles,
    CreatingScenario,
    GettingScenarioRoles,
    GettingScenarioName,
}

impl UserStatus {
    /// Whether the conversation may move from this status to `next`.
    ///
    /// The two entry points, [UserStatus::CreatingGame] and
    /// [UserStatus::CreatingScenario], are reachable from anywhere.
    pub fn can_advance_to(self, next: UserStatus) -> bool {
        use UserStatus::*;
        match (self, next) {
            (_, CreatingGame) | (_, CreatingScenario) => true,
            (CreatingGame, GettingPlayers) => true,
            (GettingPlayers, ConfirmShuffle) => true,
            (ConfirmShuffle, ConfirmShuffle) => true,
            (ConfirmShuffle, GettingGameRoles) => true,
            (GettingGameRoles, DistributingRoles) => true,
            (CreatingScenario, GettingScenarioRoles) => true,
            (GettingScenarioRoles, GettingScenarioName) => true,
            _ => false,
        }
    }

    /// Whether this status belongs to building a scenario rather than running a game.
    pub fn is_scenario_step(self) -> bool {
        matches!(
            self,
            UserStatus::CreatingScenario
                | UserStatus::GettingScenarioRoles
                | UserStatus::GettingScenarioName
        )
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UserStatus::CreatingGame => "CreatingGame",
            UserStatus::GettingPlayers => "GettingPlayers",
            UserStatus::ConfirmShuffle => "ConfirmShuffle",
            UserStatus::GettingGameRoles => "GettingGameRoles",
            UserStatus::DistributingRoles => "DistributingRoles",
            UserStatus::CreatingScenario => "CreatingScenario",
            UserStatus::GettingScenarioRoles => "GettingScenarioRoles",
            UserStatus::GettingScenarioName => "GettingScenarioName",
        };
        f.write_str(name)
    }
}
