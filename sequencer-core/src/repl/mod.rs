//! Operator console shared between the emulator front-ends.
//!
//! Lines are lexed and parsed by [`grammar`] against the static command
//! table in [`catalog`], then dispatched by [`commands::CommandExecutor`].

pub mod catalog;
pub mod commands;
pub mod grammar;
pub mod status;
