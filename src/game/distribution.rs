use super::Game;
use crate::error::GameError;
use serde::{Deserialize, Serialize};

/// What the owner has to do next while roles are being handed out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// `player` must open one of `boxes` unlabelled boxes.
    /// `round` is the number of roles assigned so far; it identifies this box layout.
    PickBox {
        player: String,
        round: usize,
        boxes: usize,
    },
    /// A box is open and waits for the owner to move on.
    Reveal(Selection),
    /// Every player holds a role.
    Complete,
}

/// A box that has been opened but whose role is not yet recorded.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Selection {
    pub round: usize,
    pub player: String,
    pub role: String,
}

/// Removes one occurrence of each assigned role from the full pool.
pub fn remaining_roles(roles: &[String], assigned: &[String]) -> Vec<String> {
    let mut remaining = roles.to_vec();
    for role in assigned {
        if let Some(idx) = remaining.iter().position(|r| r == role) {
            remaining.remove(idx);
        }
    }
    remaining
}

impl Game {
    /// The roles not yet handed out, in pool order.
    pub fn remaining_roles(&self) -> Vec<String> {
        remaining_roles(&self.roles, &self.assigned_roles)
    }

    /// Index of the player who is served next.
    pub fn next_player(&self) -> usize {
        self.assigned_roles.len()
    }

    /// Works out the next prompt purely from the persisted state, so a resumed
    /// session shows exactly what an uninterrupted one would have.
    pub fn next_step(&self) -> Result<Step, GameError> {
        if self.roles.is_empty() {
            return Err(GameError::NoRoles);
        }
        if let Some(pending) = &self.pending {
            return Ok(Step::Reveal(pending.clone()));
        }
        let remaining = self.remaining_roles();
        if remaining.is_empty() {
            return Ok(Step::Complete);
        }
        let round = self.next_player();
        let player = self
            .players
            .get(round)
            .cloned()
            .ok_or(GameError::DistributionComplete)?;
        Ok(Step::PickBox {
            player,
            round,
            boxes: remaining.len(),
        })
    }

    /// Resolves a box pick against the current layout without recording it.
    ///
    /// `round` is the layout the box was rendered for, if the client reported it.
    /// Picks made against an older layout, or outside the current one, are refused.
    /// While a box is open every pick resolves to that box.
    pub fn select_box(&self, round: Option<usize>, index: usize) -> Result<Selection, GameError> {
        let current = self.next_player();
        if self.is_complete() {
            return Err(GameError::DistributionComplete);
        }
        if let Some(pending) = &self.pending {
            return Ok(pending.clone());
        }
        if round.is_some_and(|round| round != current) {
            return Err(GameError::StaleSelection);
        }
        let role = self
            .remaining_roles()
            .into_iter()
            .nth(index)
            .ok_or(GameError::StaleSelection)?;
        let player = self
            .players
            .get(current)
            .cloned()
            .ok_or(GameError::DistributionComplete)?;
        Ok(Selection {
            round: current,
            player,
            role,
        })
    }

    /// Marks `selection` as the open box, so it is the only one the current
    /// player can end up with.
    pub fn hold(&mut self, selection: &Selection) -> Result<(), GameError> {
        match &self.pending {
            Some(pending) if pending == selection => return Ok(()),
            Some(_) => return Err(GameError::StaleSelection),
            None => {}
        }
        self.check_selection(selection)?;
        self.pending = Some(selection.clone());
        Ok(())
    }

    /// Records an acknowledged selection, moving on to the next player.
    pub fn assign(&mut self, selection: &Selection) -> Result<(), GameError> {
        if self.pending.as_ref().is_some_and(|pending| pending != selection) {
            return Err(GameError::StaleSelection);
        }
        self.check_selection(selection)?;
        self.assigned_roles.push(selection.role.clone());
        self.pending = None;
        Ok(())
    }

    fn check_selection(&self, selection: &Selection) -> Result<(), GameError> {
        if self.is_complete() {
            return Err(GameError::DistributionComplete);
        }
        if selection.round != self.next_player() {
            return Err(GameError::StaleSelection);
        }
        if !self.remaining_roles().contains(&selection.role) {
            return Err(GameError::StaleSelection);
        }
        Ok(())
    }

    /// The `(player, role)` pairs handed out so far, in player order.
    pub fn pairings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.players
            .iter()
            .zip(self.assigned_roles.iter())
            .map(|(player, role)| (&player[..], &role[..]))
    }

    /// Formats the final list of who got what.
    pub fn format_pairings(&self) -> String {
        self.pairings()
            .enumerate()
            .map(|(idx, (player, role))| format!("{:02} - {}: {}", idx + 1, player, role))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
