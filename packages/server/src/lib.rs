// Campus Platform - Moderation & Realtime Chat Core
//
// This crate provides the text moderation engine used by forum submissions
// and the WebSocket chat dispatcher used by school chat rooms.
//
// Infrastructure traits live in kernel/, domain logic in domains/*/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
