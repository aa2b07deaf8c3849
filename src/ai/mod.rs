//! Locally simulated autonomous players.

pub mod bot;

pub use bot::{BotBrain, BotManager, BotState};
