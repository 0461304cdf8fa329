use crate::game::OwnerId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a message the gateway delivered, so it can later be edited or deleted.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct MessageHandle {
    pub owner: OwnerId,
    pub id: u64,
}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.id)
    }
}

/// Something a user did, as reported by the messaging gateway.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Event {
    /// The user that sent the message or clicked the button.
    pub sender: OwnerId,
    /// The message sent, or the message carrying the clicked button.
    pub message: Option<MessageHandle>,
    pub kind: EventKind,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum EventKind {
    Command(Command),
    Text(String),
    Button(Button),
}

/// A chat line starting with a command prefix.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Command {
    NewGame,
    NewScenario,
    Scenarios,
    UseScenario(String),
    Unknown(String),
}

/// The payload of a clicked button.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Button {
    AlreadyGameYes,
    AlreadyGameNo,
    ShuffleList,
    ConfirmList,
    StartDistribution,
    /// A box in the distribution grid. `round` is the number of roles that had
    /// been assigned when the grid was drawn, if the payload carries it.
    RolePick {
        round: Option<usize>,
        index: usize,
    },
    Next,
    ShowRole,
}

impl Event {
    pub fn text(sender: OwnerId, message: Option<MessageHandle>, text: &str, prefixes: &[char]) -> Self {
        Self {
            sender,
            message,
            kind: EventKind::parse_text(text, prefixes),
        }
    }

    pub fn button(sender: OwnerId, message: Option<MessageHandle>, button: Button) -> Self {
        Self {
            sender,
            message,
            kind: EventKind::Button(button),
        }
    }

    pub fn as_button(&self) -> Option<Button> {
        match &self.kind {
            EventKind::Button(button) => Some(*button),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl EventKind {
    /// Classifies a chat line as a command or as plain text.
    pub fn parse_text(text: &str, prefixes: &[char]) -> Self {
        let trimmed = text.trim_start();
        match trimmed.chars().next() {
            Some(c) if prefixes.contains(&c) => {
                EventKind::Command(Command::parse(&trimmed[c.len_utf8()..]))
            }
            _ => EventKind::Text(text.to_string()),
        }
    }
}

impl Command {
    /// Parses the text following the command prefix.
    pub fn parse(body: &str) -> Self {
        let (name, args) = match body.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (body, ""),
        };
        // Group chats address commands as `/newgame@SomeBot`
        let name = name.split('@').next().unwrap_or(name).to_lowercase();
        match name.as_str() {
            "newgame" | "ng" | "sg" => Command::NewGame,
            "newscenario" | "ns" => Command::NewScenario,
            "scenarios" => Command::Scenarios,
            "scenario" if !args.is_empty() => Command::UseScenario(args.to_string()),
            _ => Command::Unknown(name),
        }
    }
}

impl Button {
    /// Parses a button payload.
    pub fn parse(data: &str) -> Option<Self> {
        let button = match data {
            "already_game_yes" => Button::AlreadyGameYes,
            "already_game_no" => Button::AlreadyGameNo,
            "shuffle_list" => Button::ShuffleList,
            "confirm_list" => Button::ConfirmList,
            "start_distribution" => Button::StartDistribution,
            "next" => Button::Next,
            "show_role" | "show_roles" => Button::ShowRole,
            other => {
                let rest = other.strip_prefix("role_")?;
                match rest.split_once('_') {
                    Some((round, index)) => Button::RolePick {
                        round: Some(round.parse().ok()?),
                        index: index.parse().ok()?,
                    },
                    None => Button::RolePick {
                        round: None,
                        index: rest.parse().ok()?,
                    },
                }
            }
        };
        Some(button)
    }

    /// The payload sent back when this button is clicked.
    pub fn data(&self) -> String {
        match self {
            Button::AlreadyGameYes => "already_game_yes".into(),
            Button::AlreadyGameNo => "already_game_no".into(),
            Button::ShuffleList => "shuffle_list".into(),
            Button::ConfirmList => "confirm_list".into(),
            Button::StartDistribution => "start_distribution".into(),
            Button::RolePick {
                round: Some(round),
                index,
            } => format!("role_{}_{}", round, index),
            Button::RolePick { round: None, index } => format!("role_{}", index),
            Button::Next => "next".into(),
            Button::ShowRole => "show_role".into(),
        }
    }
}
