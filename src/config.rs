use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is unspecified")]
    Missing(&'static str),
    #[error("{0} is invalid: {1:?}")]
    Invalid(&'static str, String),
}

/// Server settings, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    /// Port the websocket gateway listens on.
    pub port: u16,
    /// Port for the HTTP stats endpoint, if it should run.
    pub api_port: Option<u16>,
    /// Directory of the sled database.
    pub db_path: String,
    /// How long to wait for a button answer (yes/no, next).
    pub confirm_timeout: Duration,
    /// How long to wait for typed input (player names, scenarios).
    pub input_timeout: Duration,
    /// Characters that turn a chat line into a command.
    pub command_prefixes: Vec<char>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 0,
            api_port: None,
            db_path: "narrator.db".to_string(),
            confirm_timeout: Duration::from_secs(60),
            input_timeout: Duration::from_secs(300),
            command_prefixes: vec!['.', '/'],
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let port = parse(&lookup, "PORT")?.ok_or(ConfigError::Missing("PORT"))?;
        let api_port = parse(&lookup, "API_PORT")?;
        let db_path = lookup("DB_PATH").unwrap_or(defaults.db_path);
        let confirm_timeout = parse(&lookup, "CONFIRM_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.confirm_timeout);
        let input_timeout = parse(&lookup, "INPUT_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.input_timeout);
        let command_prefixes = match lookup("COMMAND_PREFIXES") {
            Some(prefixes) if prefixes.trim().is_empty() => {
                return Err(ConfigError::Invalid("COMMAND_PREFIXES", prefixes));
            }
            Some(prefixes) => prefixes.trim().chars().collect(),
            None => defaults.command_prefixes,
        };
        Ok(Self {
            port,
            api_port,
            db_path,
            confirm_timeout,
            input_timeout,
            command_prefixes,
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(name, value)),
    }
}
