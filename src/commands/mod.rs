// Text commands (`.z`, `nami`) and slash commands

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod help;
pub mod parser;

use crate::{Data, Error};

/// Slash commands registered at startup
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![help::help(), config::config(), errors::errors()]
}
