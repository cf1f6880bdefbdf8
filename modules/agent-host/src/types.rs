//! Core types shared by every host implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event as persisted by the host. Returned by all read methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: i64,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// `None` means the event never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

impl LogLevel {
    /// Numeric level stored in the `agent_logs` table.
    pub fn as_i16(self) -> i16 {
        match self {
            LogLevel::Info => 3,
            LogLevel::Error => 4,
        }
    }

    pub fn from_i16(level: i16) -> Self {
        if level >= 4 {
            LogLevel::Error
        } else {
            LogLevel::Info
        }
    }
}

/// One line of the agent's log, as shown to operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLog {
    pub level: LogLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}
