//! Command handlers

pub mod config;
pub mod snippet;
pub mod watch;
