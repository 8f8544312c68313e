use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::context::UnknownVariant;

/// The behavioral recommendation delivered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    DoNotDisturb,
    Encourage,
    TaskBreakdown,
    RestReminder,
    Reframe,
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        ActionType::DoNotDisturb,
        ActionType::Encourage,
        ActionType::TaskBreakdown,
        ActionType::RestReminder,
        ActionType::Reframe,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::DoNotDisturb => "DO_NOT_DISTURB",
            ActionType::Encourage => "ENCOURAGE",
            ActionType::TaskBreakdown => "TASK_BREAKDOWN",
            ActionType::RestReminder => "REST_REMINDER",
            ActionType::Reframe => "REFRAME",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DO_NOT_DISTURB" => Ok(ActionType::DoNotDisturb),
            "ENCOURAGE" => Ok(ActionType::Encourage),
            "TASK_BREAKDOWN" => Ok(ActionType::TaskBreakdown),
            "REST_REMINDER" => Ok(ActionType::RestReminder),
            "REFRAME" => Ok(ActionType::Reframe),
            other => Err(UnknownVariant {
                kind: "action_type",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(RiskLevel::Low),
            "MEDIUM" => Ok(RiskLevel::Medium),
            "HIGH" => Ok(RiskLevel::High),
            other => Err(UnknownVariant {
                kind: "risk_level",
                value: other.to_string(),
            }),
        }
    }
}

/// A validated action. Only the safety gateway constructs these from
/// backend output, so every `Action` that reaches a caller has passed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Action {
    pub action_type: ActionType,
    pub message: String,
    /// Always within [0, 1]
    pub confidence: f64,
    pub cost: f64,
    pub risk_level: RiskLevel,
}

/// An action exactly as the decision backend returned it.
///
/// The backend is opaque, so enum-like fields stay raw strings here and are
/// checked by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CandidateAction {
    pub action_type: String,
    #[serde(default)]
    pub message: String,
    pub confidence: f64,
    #[serde(default)]
    pub cost: f64,
    pub risk_level: String,
}

impl From<&Action> for CandidateAction {
    fn from(action: &Action) -> Self {
        Self {
            action_type: action.action_type.as_str().to_string(),
            message: action.message.clone(),
            confidence: action.confidence,
            cost: action.cost,
            risk_level: action.risk_level.as_str().to_string(),
        }
    }
}
