//! Safety gateway: deterministic checks between the decision backend and the
//! caller.
//!
//! Rules run in a fixed order and the first one that fires decides the
//! outcome:
//!
//! 1. invalid action (`invalid_action_type`, `invalid_risk_level`,
//!    `invalid_confidence`) → fixed safe action
//! 2. HIGH risk → fixed safe action
//! 3. SILENT mode with anything but DO_NOT_DISTURB → fixed quiet action
//! 4. low quality (blank message or confidence < 0.5) → blank messages are
//!    replaced with the safe action, low confidence is only annotated
//!
//! The gateway never fails. Whatever the backend sent, the caller receives
//! an `Action` whose risk is not HIGH and whose confidence is in [0, 1].

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::actions::{Action, ActionType, CandidateAction, RiskLevel};
use crate::context::{Context, Mode};

pub const SAFE_MESSAGE: &str =
    "This suggestion was held back by the safety gateway. Nothing is needed from you right now.";
pub const SILENT_MESSAGE: &str = "Staying quiet. You can ask for help anytime.";

pub const BLOCK_SUFFIX: &str = ":gateway_block";
pub const SILENT_SUFFIX: &str = ":gateway_silent";

pub const MIN_CONFIDENCE: f64 = 0.5;

/// Why the gateway touched an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverrideReason {
    InvalidActionType,
    InvalidRiskLevel,
    InvalidConfidence,
    HighRiskBlocked,
    ModeSilentOverride,
    LowQualityAction,
}

impl OverrideReason {
    pub fn as_str(self) -> &'static str {
        match self {
            OverrideReason::InvalidActionType => "invalid_action_type",
            OverrideReason::InvalidRiskLevel => "invalid_risk_level",
            OverrideReason::InvalidConfidence => "invalid_confidence",
            OverrideReason::HighRiskBlocked => "high_risk_blocked",
            OverrideReason::ModeSilentOverride => "mode_silent_override",
            OverrideReason::LowQualityAction => "low_quality_action",
        }
    }
}

/// Audit entry produced once per request. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GatewayDecision {
    /// What the backend proposed, verbatim
    pub original_action: CandidateAction,
    /// What the caller receives
    pub final_action: Action,
    pub override_reason: Option<OverrideReason>,
    /// True when `final_action` differs from what the backend proposed
    pub overridden: bool,
}

impl GatewayDecision {
    /// Policy version to report for this decision, derived from the
    /// backend's. Gateway-originated actions carry a suffix so consumers can
    /// tell them apart from backend-originated ones.
    pub fn policy_version(&self, upstream: &str) -> String {
        if !self.overridden {
            return upstream.to_string();
        }
        match self.override_reason {
            Some(OverrideReason::ModeSilentOverride) => format!("{upstream}{SILENT_SUFFIX}"),
            Some(_) => format!("{upstream}{BLOCK_SUFFIX}"),
            None => upstream.to_string(),
        }
    }
}

/// The action delivered whenever the backend's proposal cannot be used.
pub fn safe_action() -> Action {
    Action {
        action_type: ActionType::DoNotDisturb,
        message: SAFE_MESSAGE.to_string(),
        confidence: 1.0,
        cost: 0.0,
        risk_level: RiskLevel::Low,
    }
}

fn silent_action() -> Action {
    Action {
        action_type: ActionType::DoNotDisturb,
        message: SILENT_MESSAGE.to_string(),
        confidence: 1.0,
        cost: 0.0,
        risk_level: RiskLevel::Low,
    }
}

/// Checks enum membership and confidence bounds, in priority order.
fn check_valid(candidate: &CandidateAction) -> Result<Action, OverrideReason> {
    let action_type = candidate
        .action_type
        .parse::<ActionType>()
        .map_err(|_| OverrideReason::InvalidActionType)?;
    let risk_level = candidate
        .risk_level
        .parse::<RiskLevel>()
        .map_err(|_| OverrideReason::InvalidRiskLevel)?;
    if !(0.0..=1.0).contains(&candidate.confidence) {
        return Err(OverrideReason::InvalidConfidence);
    }

    Ok(Action {
        action_type,
        message: candidate.message.clone(),
        confidence: candidate.confidence,
        cost: candidate.cost,
        risk_level,
    })
}

fn replaced(
    candidate: &CandidateAction,
    action: Action,
    reason: OverrideReason,
) -> (Action, GatewayDecision) {
    let decision = GatewayDecision {
        original_action: candidate.clone(),
        final_action: action.clone(),
        override_reason: Some(reason),
        overridden: true,
    };
    (action, decision)
}

/// Run the gateway over a backend proposal.
pub fn evaluate(context: &Context, candidate: &CandidateAction) -> (Action, GatewayDecision) {
    let action = match check_valid(candidate) {
        Ok(action) => action,
        Err(reason) => return replaced(candidate, safe_action(), reason),
    };

    if action.risk_level == RiskLevel::High {
        return replaced(candidate, safe_action(), OverrideReason::HighRiskBlocked);
    }

    if context.mode == Mode::Silent && action.action_type != ActionType::DoNotDisturb {
        return replaced(
            candidate,
            silent_action(),
            OverrideReason::ModeSilentOverride,
        );
    }

    if action.message.trim().is_empty() {
        return replaced(candidate, safe_action(), OverrideReason::LowQualityAction);
    }

    let override_reason = if action.confidence < MIN_CONFIDENCE {
        Some(OverrideReason::LowQualityAction)
    } else {
        None
    };
    let decision = GatewayDecision {
        original_action: candidate.clone(),
        final_action: action.clone(),
        override_reason,
        overridden: false,
    };
    (action, decision)
}
