//! Core of the bot: update dispatch, command parsing, access control and
//! reply correlation.
//!
//! This crate is intentionally framework-agnostic. The chat transport lives
//! behind [`messaging::port::MessagingPort`], implemented in adapter crates.

pub mod bot;
pub mod builtins;
pub mod commands;
pub mod debounce;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod firewall;
pub mod formatting;
pub mod ledger;
pub mod logging;
pub mod messaging;
pub mod processor;
pub mod settings;
pub mod silence;
pub mod users;

pub use errors::{Error, Result};
