//! Core components, types, and utilities for the relay-bot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - The system directive and prompt composition for LLM interactions.
//! - The failure taxonomy and fallback replies.
//! - Common types and result handling.

pub mod config;
pub mod error;
pub mod prompts;
pub mod types;
