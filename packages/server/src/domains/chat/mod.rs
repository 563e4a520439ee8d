pub mod dispatcher;
pub mod envelope;
pub mod errors;
pub mod history;
pub mod models;
pub mod registry;

pub use dispatcher::{ChatConnection, ChatDispatcher, ConnectionState, InboundFrame};
pub use envelope::{ChatEnvelope, InboundMessage};
pub use errors::ChatError;
pub use history::{room_key_for_school, ChatHistory, HistoryQuery};
pub use registry::{ConnectionHandle, ConnectionId, RoomRegistry};
