use crate::error::GameError;
use serde::{Deserialize, Serialize};

/// Longest scenario name accepted, in characters.
pub const MAX_NAME_LEN: usize = 64;

/// A named role list that can be reused across games.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    pub roles: Vec<String>,
}

impl Scenario {
    /// Creates a scenario, checking the name is a single non-empty line.
    pub fn new(name: &str, roles: Vec<String>) -> Result<Self, GameError> {
        let name = name.trim();
        if name.is_empty() || name.contains('\n') || name.chars().count() > MAX_NAME_LEN {
            return Err(GameError::InvalidScenarioName);
        }
        if roles.is_empty() {
            return Err(GameError::NoRoles);
        }
        Ok(Self {
            name: name.to_string(),
            roles,
        })
    }
}
