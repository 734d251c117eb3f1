//! Trigger vocabulary for the workflow state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Named action that may move the machine from one state to another.
///
/// Wire names are fixed and case-sensitive. The two conditional advance
/// triggers bracket the optional scaffolding phase; which one applies at
/// `planning_verified` is decided by the engine's feature flag, never by
/// the static table alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    SubmitForAiReview,
    AiApproves,
    RequestRevision,
    HumanApproves,
    Advance,
    AdvanceToScaffold,
    AdvanceToCode,
}

impl Trigger {
    pub const ALL: [Trigger; 7] = [
        Trigger::SubmitForAiReview,
        Trigger::AiApproves,
        Trigger::RequestRevision,
        Trigger::HumanApproves,
        Trigger::Advance,
        Trigger::AdvanceToScaffold,
        Trigger::AdvanceToCode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::SubmitForAiReview => "submit_for_ai_review",
            Trigger::AiApproves => "ai_approves",
            Trigger::RequestRevision => "request_revision",
            Trigger::HumanApproves => "human_approves",
            Trigger::Advance => "advance",
            Trigger::AdvanceToScaffold => "advance_to_scaffold",
            Trigger::AdvanceToCode => "advance_to_code",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Trigger::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Trigger {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Trigger::parse(s).ok_or_else(|| CoreError::UnknownTrigger(s.to_string()))
    }
}

impl Serialize for Trigger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Trigger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_round_trip() {
        for trigger in Trigger::ALL {
            assert_eq!(trigger.as_str().parse::<Trigger>().unwrap(), trigger);
        }
    }

    #[test]
    fn test_trigger_names_are_case_sensitive() {
        assert!("Submit_For_Ai_Review".parse::<Trigger>().is_err());
        assert!("advance_to_code".parse::<Trigger>().is_ok());
    }
}
