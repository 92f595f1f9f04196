//! Shared types for the now-playing widget: catalog records, the command and
//! snapshot wire types, configuration, platform paths and the state store.

pub mod catalog;
pub mod config;
pub mod platform;
pub mod protocol;
pub mod state;
