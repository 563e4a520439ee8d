// HTTP routes
pub mod admin;
pub mod chat;
pub mod health;
pub mod moderation;

pub use admin::*;
pub use chat::*;
pub use health::*;
pub use moderation::*;
