//! Host-side collaborators for agents.
//!
//! An agent never owns its storage. It reads recent events, creates new ones,
//! refreshes expirations and writes log lines through the `AgentHost` trait.
//!
//! Two hosts ship here: `MemoryAgentHost` (tests, dry runs) and `PgAgentHost`
//! (Postgres, one `agent_id` per instance).

pub mod host;
pub mod interpolate;
pub mod memory;
pub mod store;
pub mod types;

pub use host::AgentHost;
pub use interpolate::interpolate;
pub use memory::MemoryAgentHost;
pub use store::{migrate, PgAgentHost};
pub use types::{AgentLog, LogLevel, StoredEvent};
