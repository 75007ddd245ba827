//! Event handling and user interactions for relay-bot.
//!
//! This module provides functionality for handling chat events:
//! - Parsing incoming @-mentions
//! - Recording messages and retrieving recent history
//! - Coordinating responses between services (LLM, database, chat)

pub mod mention;
