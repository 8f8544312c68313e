use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How intrusive the companion is allowed to be right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    /// Minimize disturbance. Only DO_NOT_DISTURB actions are delivered.
    Silent,
    /// Gentle reminders.
    Light,
    /// Proactive suggestions.
    Active,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Silent, Mode::Light, Mode::Active];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Silent => "SILENT",
            Mode::Light => "LIGHT",
            Mode::Active => "ACTIVE",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Mode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SILENT" => Ok(Mode::Silent),
            "LIGHT" => Ok(Mode::Light),
            "ACTIVE" => Ok(Mode::Active),
            other => Err(UnknownVariant {
                kind: "mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Snapshot of what the user is doing, as sent to the decision backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Context {
    /// Free-text user input. Must not be blank.
    #[serde(default)]
    pub user_text: String,
    /// Epoch millis. 0 means "now" and is filled in server-side.
    #[serde(default)]
    pub timestamp: i64,
    pub mode: Mode,
    /// Opaque key/value signals (e.g. "focus_app", "focus_minutes")
    #[serde(default)]
    pub signals: HashMap<String, String>,
    #[serde(default)]
    pub history_summary: String,
}

impl Context {
    pub fn new(user_text: impl Into<String>, mode: Mode) -> Self {
        Self {
            user_text: user_text.into(),
            timestamp: 0,
            mode,
            signals: HashMap::new(),
            history_summary: String::new(),
        }
    }
}
