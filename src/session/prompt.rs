use crate::error::GameError;
use crate::event::Button;
use crate::game::{format_player_list, Scenario, Selection, MAX_SCENARIO_NAME_LEN};
use crate::gateway::{ButtonSpec, Reply, BOX_COLUMNS};

pub fn already_in_game() -> Reply {
    Reply::text("You have a game in progress. Do you want to end the game and start a new one?").row(vec![
        ButtonSpec::new("Yes", Button::AlreadyGameYes),
        ButtonSpec::new("No", Button::AlreadyGameNo),
    ])
}

pub fn kept_game() -> Reply {
    Reply::text("No answer received; your current game is unchanged.")
}

pub fn enter_players() -> Reply {
    Reply::text("Please enter player names, one name per line:")
}

/// The numbered player list, with controls to reshuffle or accept it.
pub fn player_list(players: &[String]) -> Reply {
    Reply::text(format_player_list(players)).row(vec![
        ButtonSpec::new("Shuffle", Button::ShuffleList),
        ButtonSpec::new("Confirm", Button::ConfirmList),
    ])
}

pub fn enter_roles(num_players: usize) -> Reply {
    Reply::text(format!(
        "Please enter {} roles, one role per line",
        num_players
    ))
}

pub fn ready() -> Reply {
    Reply::text("Ready!").row(vec![ButtonSpec::new("Start", Button::StartDistribution)])
}

/// One unlabelled box per remaining role.
pub fn boxes(player: &str, round: usize, boxes: usize, notice: Option<&str>) -> Reply {
    let text = match notice {
        Some(notice) => format!("{}\n\n{}\nPlease select a box:", notice, player),
        None => format!("{}\nPlease select a box:", player),
    };
    let buttons = (0..boxes)
        .map(|index| {
            ButtonSpec::new(
                "📦",
                Button::RolePick {
                    round: Some(round),
                    index,
                },
            )
        })
        .collect();
    Reply::text(text).grid(buttons, BOX_COLUMNS)
}

pub fn reveal(selection: &Selection) -> Reply {
    Reply::text(format!("{}\nYour role:\n{}", selection.player, selection.role))
        .row(vec![ButtonSpec::new("Next ⏭️", Button::Next)])
}

pub fn finished() -> Reply {
    Reply::text("Finish").row(vec![ButtonSpec::new("Roles", Button::ShowRole)])
}

pub const STALE_BOX: &str = "That box is no longer available.";

pub fn enter_scenario_roles() -> Reply {
    Reply::text("Please enter the scenario's roles, one role per line:")
}

pub fn enter_scenario_name() -> Reply {
    Reply::text("Please enter a name for the scenario:")
}

pub fn scenario_saved(scenario: &Scenario) -> Reply {
    Reply::text(format!(
        "Saved scenario \"{}\" with {} roles.",
        scenario.name,
        scenario.roles.len()
    ))
}

pub fn scenario_list(scenarios: &[Scenario]) -> Reply {
    if scenarios.is_empty() {
        return Reply::text("No scenarios saved yet.");
    }
    let lines: Vec<_> = scenarios
        .iter()
        .map(|s| format!("{} ({} roles)", s.name, s.roles.len()))
        .collect();
    Reply::text(lines.join("\n"))
}

pub fn unknown_scenario(name: &str) -> Reply {
    Reply::text(format!("There is no scenario called \"{}\".", name))
}

/// Explains why the last input was refused, asking for it again.
pub fn invalid_input(err: &GameError) -> Reply {
    let text = match err {
        GameError::RoleCountMismatch { expected, received } => format!(
            "{} roles expected; you entered {}. Please try again.",
            expected, received
        ),
        GameError::NoPlayers => "Please enter at least one player name.".to_string(),
        GameError::NoRoles => "Please enter at least one role.".to_string(),
        GameError::InvalidScenarioName => format!(
            "Scenario names must be a single line of at most {} characters.",
            MAX_SCENARIO_NAME_LEN
        ),
        GameError::ScenarioExists => {
            "A scenario with that name already exists. Please choose another name.".to_string()
        }
        other => format!("{}. Please try again.", other),
    };
    Reply::text(text)
}
