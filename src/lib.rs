//! trakbot library: the command dispatcher, sessions and tracker plumbing
//! behind the `trakbot` binary. Exposed for integration tests.

pub mod bot;
pub mod channel;
pub mod commands;
pub mod config;
pub mod context;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod session;
pub mod tracker;
